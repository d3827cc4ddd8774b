//! The built-in function library.

use std::cmp::Ordering;
use std::fmt::Write as _;

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use regex::Regex;
use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};

use super::{ArgType, Function, FunctionTable};
use crate::{
    ast::BinOp,
    data_array::DataArray,
    evaluator::{EvalContext, EvalError, MAX_STRING_BYTES},
    temporal,
    value::{Link, Object, Value, Widget},
};

type Output = Result<Value, EvalError>;

fn mismatch(name: &str, args: &[Value]) -> EvalError {
    EvalError::NoImplementation {
        name: name.to_string(),
        types: args.iter().map(|arg| arg.type_name().to_string()).collect(),
    }
}

fn null(_: &EvalContext<'_>, _: &[Value]) -> Output {
    Ok(Value::Null)
}

/// First argument unchanged.
fn identity(_: &EvalContext<'_>, args: &[Value]) -> Output {
    Ok(args.first().cloned().unwrap_or(Value::Null))
}

fn regex(pattern: &str) -> Result<Regex, EvalError> {
    Regex::new(pattern).map_err(|e| EvalError::InvalidRegex {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// The elements of a lone list argument, or the arguments themselves.
fn spread(args: &[Value]) -> &[Value] {
    match args {
        [Value::Array(items)] => items,
        _ => args,
    }
}

fn non_negative(n: f64) -> usize {
    if n.is_finite() && n > 0.0 { n as usize } else { 0 }
}

// ========================================
// Constructors
// ========================================

fn length(_: &EvalContext<'_>, args: &[Value]) -> Output {
    let len = match args {
        [Value::Array(items)] => items.len(),
        [Value::Object(map)] => map.len(),
        [Value::String(s)] => s.chars().count(),
        _ => 0,
    };
    Ok(Value::from(len))
}

fn list(_: &EvalContext<'_>, args: &[Value]) -> Output {
    Ok(Value::Array(args.to_vec()))
}

fn object(_: &EvalContext<'_>, args: &[Value]) -> Output {
    if args.len() % 2 != 0 {
        return Err(EvalError::Message(
            "object() requires an even number of arguments (key, value, ...)".to_string(),
        ));
    }

    let mut result = Object::new();
    for pair in args.chunks(2) {
        match &pair[0] {
            Value::String(key) => {
                result.insert(key.clone(), pair[1].clone());
            }
            other => {
                return Err(EvalError::TypeError(format!(
                    "object() keys must be strings, got {}",
                    other.type_name()
                )));
            }
        }
    }
    Ok(Value::Object(result))
}

fn link(ctx: &EvalContext<'_>, args: &[Value]) -> Output {
    let base = match args.first() {
        Some(Value::String(path)) => Link::file(ctx.links().normalize(path)),
        Some(Value::Link(link)) => link.clone(),
        _ => return Err(mismatch("link", args)),
    };
    match args.get(1) {
        Some(Value::String(display)) => Ok(Value::Link(base.with_display(display.clone()))),
        Some(Value::Null) | None => Ok(Value::Link(base)),
        Some(_) => Err(mismatch("link", args)),
    }
}

fn embed(_: &EvalContext<'_>, args: &[Value]) -> Output {
    match args {
        [Value::Link(link)] => Ok(Value::Link(link.clone().to_embed(true))),
        [Value::Link(link), Value::Boolean(flag)] => Ok(Value::Link(link.clone().to_embed(*flag))),
        _ => Err(mismatch("embed", args)),
    }
}

fn elink(_: &EvalContext<'_>, args: &[Value]) -> Output {
    match args {
        [Value::String(url)] => Ok(Value::Widget(Widget::ExternalLink {
            url: url.clone(),
            display: None,
        })),
        [Value::String(url), Value::String(display)] => Ok(Value::Widget(Widget::ExternalLink {
            url: url.clone(),
            display: Some(display.clone()),
        })),
        _ => Err(mismatch("elink", args)),
    }
}

fn date_from_string(_: &EvalContext<'_>, args: &[Value]) -> Output {
    match args {
        [Value::String(text)] => Ok(temporal::parse_date(text).map_or(Value::Null, Value::Date)),
        _ => Err(mismatch("date", args)),
    }
}

/// A link whose file name is a date, e.g. `[[2021-04-18]]`.
fn date_from_link(_: &EvalContext<'_>, args: &[Value]) -> Output {
    match args {
        [Value::Link(link)] => {
            let name = Link::file(link.path.clone()).display_name();
            Ok(temporal::parse_date_literal(&name).map_or(Value::Null, Value::Date))
        }
        _ => Err(mismatch("date", args)),
    }
}

/// `date(text, format)` with a strftime-style format.
fn date_with_format(_: &EvalContext<'_>, args: &[Value]) -> Output {
    let [Value::String(text), Value::String(format)] = args else {
        return Err(mismatch("date", args));
    };
    Ok(parse_with_format(text, format).map_or(Value::Null, Value::Date))
}

fn parse_with_format(text: &str, format: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(date) = DateTime::parse_from_str(text, format) {
        return Some(date);
    }
    let naive = NaiveDateTime::parse_from_str(text, format)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, format)
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })?;
    Local
        .from_local_datetime(&naive)
        .single()
        .map(|date| date.fixed_offset())
}

fn dur(_: &EvalContext<'_>, args: &[Value]) -> Output {
    match args {
        [Value::String(text)] => Ok(temporal::parse_duration_literal(text)
            .map_or(Value::Null, Value::Duration)),
        _ => Err(mismatch("dur", args)),
    }
}

/// First number found in a string, e.g. `number("costs 4.5 dollars")`.
fn number(_: &EvalContext<'_>, args: &[Value]) -> Output {
    let [Value::String(text)] = args else {
        return Err(mismatch("number", args));
    };
    let pattern = regex(r"-?[0-9]+(\.[0-9]+)?")?;
    Ok(pattern
        .find(text)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map_or(Value::Null, Value::Number))
}

fn string(ctx: &EvalContext<'_>, args: &[Value]) -> Output {
    match args {
        [value] => Ok(Value::String(ctx.render(value))),
        _ => Err(mismatch("string", args)),
    }
}

// ========================================
// Numbers
// ========================================

fn round_to(n: f64, digits: u32) -> f64 {
    Decimal::from_f64(n)
        .map(|d| d.round_dp_with_strategy(digits, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|d| d.to_f64())
        .unwrap_or_else(|| {
            let scale = 10f64.powi(digits as i32);
            (n * scale).round() / scale
        })
}

fn round(_: &EvalContext<'_>, args: &[Value]) -> Output {
    match args {
        [Value::Number(n)] => Ok(Value::Number(round_to(*n, 0))),
        [Value::Number(n), Value::Number(digits)] => {
            Ok(Value::Number(round_to(*n, non_negative(*digits).min(28) as u32)))
        }
        _ => Err(mismatch("round", args)),
    }
}

fn floor(_: &EvalContext<'_>, args: &[Value]) -> Output {
    match args {
        [Value::Number(n)] => Ok(Value::Number(n.floor())),
        _ => Err(mismatch("floor", args)),
    }
}

fn ceil(_: &EvalContext<'_>, args: &[Value]) -> Output {
    match args {
        [Value::Number(n)] => Ok(Value::Number(n.ceil())),
        _ => Err(mismatch("ceil", args)),
    }
}

fn extreme(ctx: &EvalContext<'_>, args: &[Value], wanted: Ordering) -> Value {
    let mut best: Option<&Value> = None;
    for value in spread(args) {
        best = match best {
            Some(current) if ctx.compare(value, current) != wanted => Some(current),
            _ => Some(value),
        };
    }
    best.cloned().unwrap_or(Value::Null)
}

fn min(ctx: &EvalContext<'_>, args: &[Value]) -> Output {
    Ok(extreme(ctx, args, Ordering::Less))
}

fn max(ctx: &EvalContext<'_>, args: &[Value]) -> Output {
    Ok(extreme(ctx, args, Ordering::Greater))
}

/// Folds with a binary operator, skipping nulls. No operands gives null.
fn fold(ctx: &EvalContext<'_>, items: &[Value], op: BinOp) -> Output {
    let mut acc: Option<Value> = None;
    for item in items.iter().filter(|item| !item.is_null()) {
        acc = Some(match acc {
            None => item.clone(),
            Some(current) => ctx.evaluate_binary(&current, op, item)?,
        });
    }
    Ok(acc.unwrap_or(Value::Null))
}

fn reduce(ctx: &EvalContext<'_>, args: &[Value]) -> Output {
    let [Value::Array(items), Value::String(symbol)] = args else {
        return Err(mismatch("reduce", args));
    };
    match BinOp::from_symbol(symbol) {
        Some(
            op @ (BinOp::Add
            | BinOp::Subtract
            | BinOp::Multiply
            | BinOp::Divide
            | BinOp::And
            | BinOp::Or),
        ) => fold(ctx, items, op),
        _ => Err(EvalError::Message(format!(
            "reduce() does not support the operator '{}'; use one of + - * / & |",
            symbol
        ))),
    }
}

fn sum(ctx: &EvalContext<'_>, args: &[Value]) -> Output {
    match args {
        [Value::Array(items)] => fold(ctx, items, BinOp::Add),
        _ => Err(mismatch("sum", args)),
    }
}

fn product(ctx: &EvalContext<'_>, args: &[Value]) -> Output {
    match args {
        [Value::Array(items)] => fold(ctx, items, BinOp::Multiply),
        _ => Err(mismatch("product", args)),
    }
}

fn average(ctx: &EvalContext<'_>, args: &[Value]) -> Output {
    let [Value::Array(items)] = args else {
        return Err(mismatch("average", args));
    };
    let count = items.iter().filter(|item| !item.is_null()).count();
    if count == 0 {
        return Ok(Value::Null);
    }
    let total = fold(ctx, items, BinOp::Add)?;
    ctx.evaluate_binary(&total, BinOp::Divide, &Value::from(count))
}

// ========================================
// Dates
// ========================================

fn striptime(_: &EvalContext<'_>, args: &[Value]) -> Output {
    match args {
        [Value::Date(date)] => Ok(Value::Date(temporal::start_of_day(*date))),
        _ => Err(mismatch("striptime", args)),
    }
}

fn dateformat(_: &EvalContext<'_>, args: &[Value]) -> Output {
    let [Value::Date(date), Value::String(format)] = args else {
        return Err(mismatch("dateformat", args));
    };
    let mut out = String::new();
    write!(out, "{}", date.format(format))
        .map_err(|_| EvalError::Message(format!("Invalid date format '{}'", format)))?;
    Ok(Value::String(out))
}

fn localtime(_: &EvalContext<'_>, args: &[Value]) -> Output {
    match args {
        [Value::Date(date)] => Ok(Value::Date(date.with_timezone(&Local).fixed_offset())),
        _ => Err(mismatch("localtime", args)),
    }
}

// ========================================
// Containment
// ========================================

fn fuzzy_contains(ctx: &EvalContext<'_>, haystack: &Value, needle: &Value, fold_case: bool) -> bool {
    match (haystack, needle) {
        (Value::String(s), Value::String(n)) if fold_case => {
            s.to_lowercase().contains(&n.to_lowercase())
        }
        (Value::String(s), Value::String(n)) => s.contains(n.as_str()),
        (Value::Array(items), _) => items
            .iter()
            .any(|item| fuzzy_contains(ctx, item, needle, fold_case)),
        (Value::Object(map), Value::String(key)) => map.contains_key(key),
        (Value::Link(link), Value::String(key)) => ctx
            .links()
            .resolve(&link.path)
            .is_some_and(|page| page.contains_key(key)),
        _ => ctx.compare(haystack, needle) == Ordering::Equal,
    }
}

fn contains(ctx: &EvalContext<'_>, args: &[Value]) -> Output {
    match args {
        [haystack, needle] => Ok(Value::Boolean(fuzzy_contains(ctx, haystack, needle, false))),
        _ => Err(mismatch("contains", args)),
    }
}

fn icontains(ctx: &EvalContext<'_>, args: &[Value]) -> Output {
    match args {
        [haystack, needle] => Ok(Value::Boolean(fuzzy_contains(ctx, haystack, needle, true))),
        _ => Err(mismatch("icontains", args)),
    }
}

/// Exact containment: list elements must equal the needle.
fn econtains(ctx: &EvalContext<'_>, args: &[Value]) -> Output {
    let found = match args {
        [Value::String(s), Value::String(n)] => s.contains(n.as_str()),
        [Value::Array(items), needle] => items
            .iter()
            .any(|item| ctx.compare(item, needle) == Ordering::Equal),
        [Value::Object(map), Value::String(key)] => map.contains_key(key),
        [haystack, needle] => ctx.compare(haystack, needle) == Ordering::Equal,
        _ => return Err(mismatch("econtains", args)),
    };
    Ok(Value::Boolean(found))
}

fn containsword(_: &EvalContext<'_>, args: &[Value]) -> Output {
    let [Value::String(text), Value::String(word)] = args else {
        return Err(mismatch("containsword", args));
    };
    let pattern = regex(&format!(r"(?i)\b{}\b", regex::escape(word)))?;
    Ok(Value::Boolean(pattern.is_match(text)))
}

fn extract(_: &EvalContext<'_>, args: &[Value]) -> Output {
    let Some((Value::Object(source), keys)) = args.split_first() else {
        return Err(mismatch("extract", args));
    };
    let mut result = Object::new();
    for key in keys {
        let Value::String(key) = key else {
            return Err(EvalError::TypeError(format!(
                "extract() keys must be strings, got {}",
                key.type_name()
            )));
        };
        if let Some(value) = source.get(key) {
            result.insert(key.clone(), value.clone());
        }
    }
    Ok(Value::Object(result))
}

// ========================================
// Lists
// ========================================

fn reverse(_: &EvalContext<'_>, args: &[Value]) -> Output {
    match args {
        [Value::Array(items)] => Ok(DataArray::from(items.clone()).reverse().into()),
        [Value::String(s)] => Ok(Value::String(s.chars().rev().collect())),
        _ => Err(mismatch("reverse", args)),
    }
}

fn sort(ctx: &EvalContext<'_>, args: &[Value]) -> Output {
    let [Value::Array(items)] = args else {
        return Err(mismatch("sort", args));
    };
    Ok(DataArray::from(items.clone()).sort_by(|a, b| ctx.compare(a, b)).into())
}

fn join(ctx: &EvalContext<'_>, args: &[Value]) -> Output {
    let (items, separator) = match args {
        [Value::Array(items)] => (items, ", "),
        [Value::Array(items), Value::String(sep)] => (items, sep.as_str()),
        [value] => return Ok(Value::String(ctx.render(value))),
        _ => return Err(mismatch("join", args)),
    };
    Ok(Value::String(
        items
            .iter()
            .map(|item| ctx.render(item))
            .collect::<Vec<_>>()
            .join(separator),
    ))
}

fn any(_: &EvalContext<'_>, args: &[Value]) -> Output {
    Ok(Value::Boolean(spread(args).iter().any(Value::is_truthy)))
}

fn all(_: &EvalContext<'_>, args: &[Value]) -> Output {
    Ok(Value::Boolean(spread(args).iter().all(Value::is_truthy)))
}

fn none(_: &EvalContext<'_>, args: &[Value]) -> Output {
    Ok(Value::Boolean(!spread(args).iter().any(Value::is_truthy)))
}

fn unique(ctx: &EvalContext<'_>, args: &[Value]) -> Output {
    let [Value::Array(items)] = args else {
        return Err(mismatch("unique", args));
    };
    Ok(DataArray::from(items.clone()).distinct(|a, b| ctx.compare(a, b)).into())
}

fn nonnull(_: &EvalContext<'_>, args: &[Value]) -> Output {
    Ok(DataArray::from(spread(args).to_vec()).filter(|v| !v.is_null()).into())
}

fn flatten_into(items: &[Value], depth: usize, out: &mut Vec<Value>) {
    for item in items {
        match item {
            Value::Array(inner) if depth > 0 => flatten_into(inner, depth - 1, out),
            other => out.push(other.clone()),
        }
    }
}

fn flat(_: &EvalContext<'_>, args: &[Value]) -> Output {
    let (items, depth) = match args {
        [Value::Array(items)] => (items, 1),
        [Value::Array(items), Value::Number(depth)] => (items, non_negative(*depth)),
        _ => return Err(mismatch("flat", args)),
    };
    let mut out = Vec::new();
    flatten_into(items, depth, &mut out);
    Ok(Value::Array(out))
}

// ========================================
// Strings
// ========================================

/// Full-string match: the pattern is implicitly anchored at both ends.
fn regexmatch(_: &EvalContext<'_>, args: &[Value]) -> Output {
    match args {
        [Value::String(pattern), Value::String(text)] => {
            let anchored = regex(&format!("^(?:{})$", pattern))?;
            Ok(Value::Boolean(anchored.is_match(text)))
        }
        [Value::String(_), _] => Ok(Value::Boolean(false)),
        _ => Err(mismatch("regexmatch", args)),
    }
}

fn regextest(_: &EvalContext<'_>, args: &[Value]) -> Output {
    match args {
        [Value::String(pattern), Value::String(text)] => Ok(Value::Boolean(regex(pattern)?.is_match(text))),
        [Value::String(_), _] => Ok(Value::Boolean(false)),
        _ => Err(mismatch("regextest", args)),
    }
}

fn regexreplace(_: &EvalContext<'_>, args: &[Value]) -> Output {
    let [Value::String(text), Value::String(pattern), Value::String(replacement)] = args else {
        return Err(mismatch("regexreplace", args));
    };
    Ok(Value::String(
        regex(pattern)?
            .replace_all(text, replacement.as_str())
            .into_owned(),
    ))
}

fn replace(_: &EvalContext<'_>, args: &[Value]) -> Output {
    let [Value::String(text), Value::String(pattern), Value::String(replacement)] = args else {
        return Err(mismatch("replace", args));
    };
    Ok(Value::String(text.replace(pattern.as_str(), replacement)))
}

fn lower(_: &EvalContext<'_>, args: &[Value]) -> Output {
    match args {
        [Value::String(s)] => Ok(Value::String(s.to_lowercase())),
        _ => Err(mismatch("lower", args)),
    }
}

fn upper(_: &EvalContext<'_>, args: &[Value]) -> Output {
    match args {
        [Value::String(s)] => Ok(Value::String(s.to_uppercase())),
        _ => Err(mismatch("upper", args)),
    }
}

fn split(_: &EvalContext<'_>, args: &[Value]) -> Output {
    let (text, delimiter, limit) = match args {
        [Value::String(text), Value::String(delimiter)] => (text, delimiter, usize::MAX),
        [Value::String(text), Value::String(delimiter), Value::Number(limit)] => {
            (text, delimiter, non_negative(*limit))
        }
        _ => return Err(mismatch("split", args)),
    };
    let pattern = regex(delimiter)?;
    Ok(Value::Array(
        pattern
            .split(text)
            .take(limit)
            .map(|part| Value::String(part.to_string()))
            .collect(),
    ))
}

fn startswith(_: &EvalContext<'_>, args: &[Value]) -> Output {
    match args {
        [Value::String(s), Value::String(prefix)] => Ok(Value::Boolean(s.starts_with(prefix.as_str()))),
        _ => Err(mismatch("startswith", args)),
    }
}

fn endswith(_: &EvalContext<'_>, args: &[Value]) -> Output {
    match args {
        [Value::String(s), Value::String(suffix)] => Ok(Value::Boolean(s.ends_with(suffix.as_str()))),
        _ => Err(mismatch("endswith", args)),
    }
}

fn pad(name: &str, args: &[Value], left: bool) -> Output {
    let (text, width, padding) = match args {
        [Value::String(text), Value::Number(width)] => (text, *width, " "),
        [Value::String(text), Value::Number(width), Value::String(padding)] => {
            (text, *width, padding.as_str())
        }
        _ => return Err(mismatch(name, args)),
    };

    let current = text.chars().count();
    // Widths count characters of up to four bytes each
    if width.is_finite() && width > (MAX_STRING_BYTES / 4) as f64 {
        return Err(EvalError::StringTooLong);
    }
    let width = non_negative(width);
    if current >= width || padding.is_empty() {
        return Ok(Value::String(text.clone()));
    }

    let fill: String = padding.chars().cycle().take(width - current).collect();
    Ok(Value::String(if left {
        fill + text
    } else {
        format!("{}{}", text, fill)
    }))
}

fn padleft(_: &EvalContext<'_>, args: &[Value]) -> Output {
    pad("padleft", args, true)
}

fn padright(_: &EvalContext<'_>, args: &[Value]) -> Output {
    pad("padright", args, false)
}

/// Character range `[start, end)`; bounds are clamped and swapped if reversed.
fn substring(_: &EvalContext<'_>, args: &[Value]) -> Output {
    let (text, start, end) = match args {
        [Value::String(text), Value::Number(start)] => (text, *start, f64::INFINITY),
        [Value::String(text), Value::Number(start), Value::Number(end)] => (text, *start, *end),
        _ => return Err(mismatch("substring", args)),
    };
    let chars: Vec<char> = text.chars().collect();
    let clamp = |n: f64| {
        if n.is_nan() || n < 0.0 {
            0
        } else {
            (n as usize).min(chars.len())
        }
    };
    let (mut from, mut to) = (clamp(start), clamp(end));
    if from > to {
        std::mem::swap(&mut from, &mut to);
    }
    Ok(Value::String(chars[from..to].iter().collect()))
}

fn truncate(_: &EvalContext<'_>, args: &[Value]) -> Output {
    let (text, length, suffix) = match args {
        [Value::String(text), Value::Number(length)] => (text, *length, "..."),
        [Value::String(text), Value::Number(length), Value::String(suffix)] => {
            (text, *length, suffix.as_str())
        }
        _ => return Err(mismatch("truncate", args)),
    };
    let length = non_negative(length);
    if text.chars().count() <= length {
        return Ok(Value::String(text.clone()));
    }
    let keep = length.saturating_sub(suffix.chars().count());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(suffix);
    Ok(Value::String(out))
}

// ========================================
// Utility
// ========================================

fn default(_: &EvalContext<'_>, args: &[Value]) -> Output {
    match args {
        [Value::Null, fallback] => Ok(fallback.clone()),
        [value, _] => Ok(value.clone()),
        _ => Err(mismatch("default", args)),
    }
}

fn choice(_: &EvalContext<'_>, args: &[Value]) -> Output {
    match args {
        [condition, then, otherwise] => Ok(if condition.is_truthy() {
            then.clone()
        } else {
            otherwise.clone()
        }),
        _ => Err(mismatch("choice", args)),
    }
}

fn type_of(_: &EvalContext<'_>, args: &[Value]) -> Output {
    match args {
        [value] => Ok(Value::from(value.type_name())),
        _ => Err(mismatch("typeof", args)),
    }
}

fn isnull(_: &EvalContext<'_>, args: &[Value]) -> Output {
    match args {
        [value] => Ok(Value::Boolean(value.is_null())),
        _ => Err(mismatch("isnull", args)),
    }
}

/// Link metadata: `display`, `embed`, `path`, `subpath` and `type`.
fn meta(_: &EvalContext<'_>, args: &[Value]) -> Output {
    let [Value::Link(link)] = args else {
        return Err(mismatch("meta", args));
    };
    let mut result = Object::new();
    result.insert("display".to_string(), link.display.clone().into());
    result.insert("embed".to_string(), Value::Boolean(link.embed));
    result.insert("path".to_string(), Value::String(link.path.clone()));
    result.insert("subpath".to_string(), link.subpath.clone().into());
    result.insert("type".to_string(), Value::from(link.kind.name()));
    Ok(Value::Object(result))
}

/// The built-in function table.
pub fn standard() -> FunctionTable {
    use ArgType as T;

    let mut table = FunctionTable::new();
    table
        .register(Function::builder("length").add(&[T::Any], length).build())
        .register(Function::builder("list").vararg(list).build())
        .register(Function::builder("object").vararg(object).build())
        .register(
            Function::builder("link")
                .add(&[T::String], link)
                .add(&[T::Link], link)
                .add(&[T::String, T::String], link)
                .add(&[T::Link, T::String], link)
                .add(&[T::Null], null)
                .add(&[T::Null, T::Any], null)
                .vectorize(1, &[0])
                .vectorize(2, &[0])
                .build(),
        )
        .register(
            Function::builder("embed")
                .add(&[T::Link], embed)
                .add(&[T::Link, T::Boolean], embed)
                .add(&[T::Null], null)
                .add(&[T::Null, T::Any], null)
                .vectorize(1, &[0])
                .vectorize(2, &[0])
                .build(),
        )
        .register(
            Function::builder("elink")
                .add(&[T::String], elink)
                .add(&[T::String, T::String], elink)
                .add(&[T::Null], null)
                .add(&[T::Null, T::Any], null)
                .vectorize(1, &[0])
                .vectorize(2, &[0])
                .build(),
        )
        .register(
            Function::builder("date")
                .add(&[T::Date], identity)
                .add(&[T::String], date_from_string)
                .add(&[T::Link], date_from_link)
                .add(&[T::String, T::String], date_with_format)
                .add(&[T::Any], null)
                .add(&[T::Any, T::Any], null)
                .vectorize(1, &[0])
                .vectorize(2, &[0])
                .build(),
        )
        .register(
            Function::builder("dur")
                .add(&[T::Duration], identity)
                .add(&[T::String], dur)
                .add(&[T::Any], null)
                .vectorize(1, &[0])
                .build(),
        )
        .register(
            Function::builder("number")
                .add(&[T::Number], identity)
                .add(&[T::String], number)
                .add(&[T::Any], null)
                .vectorize(1, &[0])
                .build(),
        )
        .register(Function::builder("string").add(&[T::Any], string).build())
        .register(
            Function::builder("round")
                .add(&[T::Number], round)
                .add(&[T::Number, T::Number], round)
                .add(&[T::Null], null)
                .add(&[T::Null, T::Any], null)
                .vectorize(1, &[0])
                .vectorize(2, &[0])
                .build(),
        )
        .register(
            Function::builder("floor")
                .add(&[T::Number], floor)
                .add(&[T::Null], null)
                .vectorize(1, &[0])
                .build(),
        )
        .register(
            Function::builder("ceil")
                .add(&[T::Number], ceil)
                .add(&[T::Null], null)
                .vectorize(1, &[0])
                .build(),
        )
        .register(Function::builder("min").vararg(min).build())
        .register(Function::builder("max").vararg(max).build())
        .register(Function::builder("reduce").add(&[T::Array, T::String], reduce).build())
        .register(
            Function::builder("sum")
                .add(&[T::Array], sum)
                .add(&[T::Any], identity)
                .build(),
        )
        .register(
            Function::builder("product")
                .add(&[T::Array], product)
                .add(&[T::Any], identity)
                .build(),
        )
        .register(
            Function::builder("average")
                .add(&[T::Array], average)
                .add(&[T::Any], identity)
                .build(),
        )
        .register(
            Function::builder("striptime")
                .add(&[T::Date], striptime)
                .add(&[T::Null], null)
                .vectorize(1, &[0])
                .build(),
        )
        .register(
            Function::builder("dateformat")
                .add(&[T::Date, T::String], dateformat)
                .add(&[T::Null, T::String], null)
                .vectorize(2, &[0])
                .build(),
        )
        .register(
            Function::builder("localtime")
                .add(&[T::Date], localtime)
                .add(&[T::Null], null)
                .vectorize(1, &[0])
                .build(),
        )
        .register(Function::builder("contains").add(&[T::Any, T::Any], contains).build())
        .register(Function::builder("icontains").add(&[T::Any, T::Any], icontains).build())
        .register(Function::builder("econtains").add(&[T::Any, T::Any], econtains).build())
        .register(
            Function::builder("containsword")
                .add(&[T::String, T::String], containsword)
                .add(&[T::Null, T::Any], null)
                .vectorize(2, &[0])
                .build(),
        )
        .register(Function::builder("extract").vararg(extract).build())
        .register(
            Function::builder("reverse")
                .add(&[T::Array], reverse)
                .add(&[T::String], reverse)
                .add(&[T::Null], null)
                .build(),
        )
        .register(
            Function::builder("sort")
                .add(&[T::Array], sort)
                .add(&[T::Null], null)
                .build(),
        )
        .register(
            Function::builder("join")
                .add(&[T::Array], join)
                .add(&[T::Array, T::String], join)
                .add(&[T::Any], join)
                .build(),
        )
        .register(Function::builder("any").vararg(any).build())
        .register(Function::builder("all").vararg(all).build())
        .register(Function::builder("none").vararg(none).build())
        .register(Function::builder("unique").add(&[T::Array], unique).build())
        .register(Function::builder("nonnull").vararg(nonnull).build())
        .register(
            Function::builder("flat")
                .add(&[T::Array], flat)
                .add(&[T::Array, T::Number], flat)
                .build(),
        )
        .register(
            Function::builder("regexmatch")
                .add(&[T::String, T::Any], regexmatch)
                .vectorize(2, &[1])
                .build(),
        )
        .register(
            Function::builder("regextest")
                .add(&[T::String, T::Any], regextest)
                .vectorize(2, &[1])
                .build(),
        )
        .register(
            Function::builder("regexreplace")
                .add(&[T::String, T::String, T::String], regexreplace)
                .add(&[T::Null, T::Any, T::Any], null)
                .vectorize(3, &[0])
                .build(),
        )
        .register(
            Function::builder("replace")
                .add(&[T::String, T::String, T::String], replace)
                .add(&[T::Null, T::Any, T::Any], null)
                .vectorize(3, &[0])
                .build(),
        )
        .register(
            Function::builder("lower")
                .add(&[T::String], lower)
                .add(&[T::Null], null)
                .vectorize(1, &[0])
                .build(),
        )
        .register(
            Function::builder("upper")
                .add(&[T::String], upper)
                .add(&[T::Null], null)
                .vectorize(1, &[0])
                .build(),
        )
        .register(
            Function::builder("split")
                .add(&[T::String, T::String], split)
                .add(&[T::String, T::String, T::Number], split)
                .add(&[T::Null, T::Any], null)
                .vectorize(2, &[0])
                .vectorize(3, &[0])
                .build(),
        )
        .register(
            Function::builder("startswith")
                .add(&[T::String, T::String], startswith)
                .add(&[T::Null, T::Any], null)
                .vectorize(2, &[0])
                .build(),
        )
        .register(
            Function::builder("endswith")
                .add(&[T::String, T::String], endswith)
                .add(&[T::Null, T::Any], null)
                .vectorize(2, &[0])
                .build(),
        )
        .register(
            Function::builder("padleft")
                .add(&[T::String, T::Number], padleft)
                .add(&[T::String, T::Number, T::String], padleft)
                .vectorize(2, &[0])
                .vectorize(3, &[0])
                .build(),
        )
        .register(
            Function::builder("padright")
                .add(&[T::String, T::Number], padright)
                .add(&[T::String, T::Number, T::String], padright)
                .vectorize(2, &[0])
                .vectorize(3, &[0])
                .build(),
        )
        .register(
            Function::builder("substring")
                .add(&[T::String, T::Number], substring)
                .add(&[T::String, T::Number, T::Number], substring)
                .vectorize(2, &[0])
                .vectorize(3, &[0])
                .build(),
        )
        .register(
            Function::builder("truncate")
                .add(&[T::String, T::Number], truncate)
                .add(&[T::String, T::Number, T::String], truncate)
                .vectorize(2, &[0])
                .vectorize(3, &[0])
                .build(),
        )
        .register(
            Function::builder("default")
                .add(&[T::Any, T::Any], default)
                .vectorize(2, &[0, 1])
                .build(),
        )
        .register(Function::builder("ldefault").add(&[T::Any, T::Any], default).build())
        .register(
            Function::builder("choice")
                .add(&[T::Any, T::Any, T::Any], choice)
                .vectorize(3, &[0])
                .build(),
        )
        .register(Function::builder("typeof").add(&[T::Any], type_of).build())
        .register(Function::builder("isnull").add(&[T::Any], isnull).build())
        .register(
            Function::builder("meta")
                .add(&[T::Link], meta)
                .add(&[T::Null], null)
                .vectorize(1, &[0])
                .build(),
        )
        .alias("array", "list");
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::NoLinks;
    use crate::library::Library;
    use crate::settings::QuerySettings;

    fn call(name: &str, args: Vec<Value>) -> Output {
        let library = Library::default();
        let settings = QuerySettings::default();
        let ctx = EvalContext::new(&NoLinks, &library, &settings);
        ctx.call(name, &args)
    }

    fn strings(items: &[&str]) -> Value {
        Value::Array(items.iter().map(|s| Value::from(*s)).collect())
    }

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(call("round", vec![Value::Number(2.5)]).unwrap(), Value::Number(3.0));
        assert_eq!(call("round", vec![Value::Number(-2.5)]).unwrap(), Value::Number(-3.0));
        assert_eq!(
            call("round", vec![Value::Number(1.23456), Value::Number(2.0)]).unwrap(),
            Value::Number(1.23)
        );
    }

    #[test]
    fn test_reduce_skips_nulls() {
        let items = Value::Array(vec![Value::Number(1.0), Value::Null, Value::Number(2.0)]);
        assert_eq!(
            call("reduce", vec![items.clone(), Value::from("+")]).unwrap(),
            Value::Number(3.0)
        );
        assert_eq!(call("sum", vec![Value::Array(vec![Value::Null])]).unwrap(), Value::Null);
        assert!(call("reduce", vec![items, Value::from("<")]).is_err());
    }

    #[test]
    fn test_pad_and_truncate() {
        assert_eq!(
            call("padleft", vec![Value::from("7"), Value::Number(3.0), Value::from("0")]).unwrap(),
            Value::from("007")
        );
        assert_eq!(
            call("truncate", vec![Value::from("abcdefgh"), Value::Number(5.0)]).unwrap(),
            Value::from("ab...")
        );
    }

    #[test]
    fn test_pad_width_is_bounded() {
        for name in ["padleft", "padright"] {
            assert_eq!(
                call(name, vec![Value::from("x"), Value::Number(1e20)]),
                Err(EvalError::StringTooLong)
            );
        }
        assert_eq!(
            call("padright", vec![Value::from("x"), Value::Number(-5.0)]).unwrap(),
            Value::from("x")
        );
    }

    #[test]
    fn test_split_with_limit() {
        assert_eq!(
            call(
                "split",
                vec![Value::from("a, b, c"), Value::from(", "), Value::Number(2.0)]
            )
            .unwrap(),
            strings(&["a", "b"])
        );
    }

    #[test]
    fn test_containsword_is_case_insensitive() {
        assert_eq!(
            call("containsword", vec![Value::from("Hello World"), Value::from("world")]).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            call("containsword", vec![Value::from("Helloworld"), Value::from("world")]).unwrap(),
            Value::Boolean(false)
        );
    }
}
