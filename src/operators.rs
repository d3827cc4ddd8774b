//! Binary operator dispatch on operand types.
//!
//! Each implementation is registered under `(operator, left type, right
//! type)`; either type may be [`ArgType::Any`]. Lookup tries the exact pair
//! first, then a wildcard on the right, then on the left, then both.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};

use crate::{
    ast::BinOp,
    evaluator::{EvalContext, EvalError, MAX_STRING_BYTES},
    functions::ArgType,
    temporal,
    value::{Object, Value},
};

pub type BinaryOpImpl =
    Arc<dyn Fn(&Value, &Value, &EvalContext<'_>) -> Result<Value, EvalError> + Send + Sync>;

pub type Comparator = fn(&Value, &Value, &EvalContext<'_>) -> Ordering;

const COMPARISONS: [BinOp; 6] = [
    BinOp::Equal,
    BinOp::NotEqual,
    BinOp::LessThan,
    BinOp::GreaterThan,
    BinOp::LessEqual,
    BinOp::GreaterEqual,
];

#[derive(Default, Clone)]
pub struct OperatorTable {
    map: HashMap<(BinOp, ArgType, ArgType), BinaryOpImpl>,
}

impl OperatorTable {
    pub fn builder() -> OperatorTableBuilder {
        OperatorTableBuilder::default()
    }

    fn lookup(&self, op: BinOp, left: ArgType, right: ArgType) -> Option<&BinaryOpImpl> {
        self.map
            .get(&(op, left, right))
            .or_else(|| self.map.get(&(op, left, ArgType::Any)))
            .or_else(|| self.map.get(&(op, ArgType::Any, right)))
            .or_else(|| self.map.get(&(op, ArgType::Any, ArgType::Any)))
    }

    pub fn apply(
        &self,
        op: BinOp,
        left: &Value,
        right: &Value,
        ctx: &EvalContext<'_>,
    ) -> Result<Value, EvalError> {
        match self.lookup(op, ArgType::of(left), ArgType::of(right)) {
            Some(implementation) => implementation(left, right, ctx),
            None => Err(EvalError::UnsupportedOperator {
                op,
                left: left.type_name(),
                right: right.type_name(),
            }),
        }
    }
}

#[derive(Default)]
pub struct OperatorTableBuilder {
    table: OperatorTable,
}

impl OperatorTableBuilder {
    pub fn register<F>(mut self, op: BinOp, left: ArgType, right: ArgType, f: F) -> Self
    where
        F: Fn(&Value, &Value, &EvalContext<'_>) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.table.map.insert((op, left, right), implementation(f));
        self
    }

    /// Registers `f` for both operand orders; `f` always sees the `left`
    /// typed operand first.
    pub fn register_commutative<F>(mut self, op: BinOp, left: ArgType, right: ArgType, f: F) -> Self
    where
        F: Fn(&Value, &Value, &EvalContext<'_>) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        let f = implementation(f);
        let swapped = Arc::clone(&f);
        self.table.map.insert((op, left, right), f);
        self.table
            .map
            .insert((op, right, left), implementation(move |a, b, ctx| swapped(b, a, ctx)));
        self
    }

    /// Registers all six comparison operators for a type pair using one
    /// comparator.
    pub fn compare(mut self, left: ArgType, right: ArgType, comparator: Comparator) -> Self {
        for op in COMPARISONS {
            self = self.register(op, left, right, move |a, b, ctx| {
                Ok(Value::Boolean(ordering_satisfies(op, comparator(a, b, ctx))))
            });
        }
        self
    }

    pub fn build(self) -> OperatorTable {
        self.table
    }
}

fn implementation<F>(f: F) -> BinaryOpImpl
where
    F: Fn(&Value, &Value, &EvalContext<'_>) -> Result<Value, EvalError> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn ordering_satisfies(op: BinOp, ordering: Ordering) -> bool {
    match op {
        BinOp::Equal => ordering == Ordering::Equal,
        BinOp::NotEqual => ordering != Ordering::Equal,
        BinOp::LessThan => ordering == Ordering::Less,
        BinOp::GreaterThan => ordering == Ordering::Greater,
        BinOp::LessEqual => ordering != Ordering::Greater,
        BinOp::GreaterEqual => ordering != Ordering::Less,
        _ => false,
    }
}

/// Arithmetic through `Decimal` where both operands fit, so `0.1 + 0.2`
/// stays `0.3`.
fn decimal_arith(op: BinOp, a: f64, b: f64) -> f64 {
    if let Some(x) = Decimal::from_f64(a)
        && let Some(y) = Decimal::from_f64(b)
    {
        let result = match op {
            BinOp::Add => x.checked_add(y),
            BinOp::Subtract => x.checked_sub(y),
            BinOp::Multiply => x.checked_mul(y),
            _ => None,
        };
        if let Some(r) = result.and_then(|d| d.to_f64()) {
            return r;
        }
    }
    match op {
        BinOp::Add => a + b,
        BinOp::Subtract => a - b,
        _ => a * b,
    }
}

fn numbers(a: &Value, b: &Value) -> Result<(f64, f64), EvalError> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Ok((*x, *y)),
        _ => Err(EvalError::TypeError(format!(
            "Expected two numbers, got {} and {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn number_op(op: BinOp) -> impl Fn(&Value, &Value, &EvalContext<'_>) -> Result<Value, EvalError> {
    move |a, b, _| {
        let (x, y) = numbers(a, b)?;
        let result = match op {
            BinOp::Divide | BinOp::Modulo if y == 0.0 => return Err(EvalError::DivisionByZero),
            BinOp::Divide => x / y,
            BinOp::Modulo => x % y,
            _ => decimal_arith(op, x, y),
        };
        Ok(Value::Number(result))
    }
}

fn date_shift(
    date: &Value,
    dur: &Value,
    sign: f64,
) -> Result<Value, EvalError> {
    match (date, dur) {
        (Value::Date(date), Value::Duration(dur)) => temporal::shift(*date, dur, sign)
            .map(Value::Date)
            .ok_or_else(|| EvalError::Message("Date arithmetic out of range".to_string())),
        _ => Err(EvalError::TypeError("Expected a date and a duration".to_string())),
    }
}

/// `text * n`. Negative and non-finite counts repeat nothing.
fn repeat(text: &str, n: f64) -> Result<Value, EvalError> {
    if !n.is_finite() || n < 1.0 || text.is_empty() {
        return Ok(Value::String(String::new()));
    }
    if n.trunc() > (MAX_STRING_BYTES / text.len()) as f64 {
        return Err(EvalError::StringTooLong);
    }
    Ok(Value::String(text.repeat(n.trunc() as usize)))
}

fn to_null(_: &Value, _: &Value, _: &EvalContext<'_>) -> Result<Value, EvalError> {
    Ok(Value::Null)
}

/// The operator table every engine starts with.
pub fn standard() -> OperatorTable {
    let mut builder = OperatorTable::builder();

    for op in [
        BinOp::Add,
        BinOp::Subtract,
        BinOp::Multiply,
        BinOp::Divide,
        BinOp::Modulo,
    ] {
        builder = builder
            .register(op, ArgType::Number, ArgType::Number, number_op(op))
            // Arithmetic on a missing value yields a missing value
            .register_commutative(op, ArgType::Null, ArgType::Number, to_null)
            .register_commutative(op, ArgType::Null, ArgType::Date, to_null)
            .register_commutative(op, ArgType::Null, ArgType::Duration, to_null)
            .register(op, ArgType::Null, ArgType::Null, to_null);
    }

    builder
        // Strings
        .register(BinOp::Add, ArgType::String, ArgType::Any, |a, b, ctx| {
            Ok(Value::String(format!("{}{}", ctx.render(a), ctx.render(b))))
        })
        .register(BinOp::Add, ArgType::Any, ArgType::String, |a, b, ctx| {
            Ok(Value::String(format!("{}{}", ctx.render(a), ctx.render(b))))
        })
        .register_commutative(BinOp::Multiply, ArgType::String, ArgType::Number, |a, b, _| match (a, b) {
            (Value::String(s), Value::Number(n)) => repeat(s, *n),
            _ => Err(EvalError::TypeError("Expected a string and a number".to_string())),
        })
        // Dates and durations
        .register(BinOp::Subtract, ArgType::Date, ArgType::Date, |a, b, _| match (a, b) {
            (Value::Date(x), Value::Date(y)) => Ok(Value::Duration(temporal::difference(*x, *y))),
            _ => Err(EvalError::TypeError("Expected two dates".to_string())),
        })
        .register_commutative(BinOp::Add, ArgType::Date, ArgType::Duration, |a, b, _| date_shift(a, b, 1.0))
        .register(BinOp::Subtract, ArgType::Date, ArgType::Duration, |a, b, _| date_shift(a, b, -1.0))
        .register(BinOp::Add, ArgType::Duration, ArgType::Duration, |a, b, _| match (a, b) {
            (Value::Duration(x), Value::Duration(y)) => Ok(Value::Duration(x.plus(y))),
            _ => Err(EvalError::TypeError("Expected two durations".to_string())),
        })
        .register(BinOp::Subtract, ArgType::Duration, ArgType::Duration, |a, b, _| match (a, b) {
            (Value::Duration(x), Value::Duration(y)) => Ok(Value::Duration(x.minus(y))),
            _ => Err(EvalError::TypeError("Expected two durations".to_string())),
        })
        .register_commutative(BinOp::Multiply, ArgType::Duration, ArgType::Number, |a, b, _| match (a, b) {
            (Value::Duration(d), Value::Number(n)) => Ok(Value::Duration(d.scale(*n))),
            _ => Err(EvalError::TypeError("Expected a duration and a number".to_string())),
        })
        .register(BinOp::Divide, ArgType::Duration, ArgType::Number, |a, b, _| match (a, b) {
            (Value::Duration(_), Value::Number(n)) if *n == 0.0 => Err(EvalError::DivisionByZero),
            (Value::Duration(d), Value::Number(n)) => Ok(Value::Duration(d.scale(1.0 / n))),
            _ => Err(EvalError::TypeError("Expected a duration and a number".to_string())),
        })
        // Containers
        .register(BinOp::Add, ArgType::Array, ArgType::Array, |a, b, _| match (a, b) {
            (Value::Array(x), Value::Array(y)) => {
                Ok(Value::Array(x.iter().chain(y.iter()).cloned().collect()))
            }
            _ => Err(EvalError::TypeError("Expected two lists".to_string())),
        })
        .register(BinOp::Add, ArgType::Object, ArgType::Object, |a, b, _| match (a, b) {
            (Value::Object(x), Value::Object(y)) => {
                let mut merged: Object = x.clone();
                for (key, value) in y {
                    merged.insert(key.clone(), value.clone());
                }
                Ok(Value::Object(merged))
            }
            _ => Err(EvalError::TypeError("Expected two objects".to_string())),
        })
        // Logic works on truthiness of anything
        .register(BinOp::And, ArgType::Any, ArgType::Any, |a, b, _| {
            Ok(Value::Boolean(a.is_truthy() && b.is_truthy()))
        })
        .register(BinOp::Or, ArgType::Any, ArgType::Any, |a, b, _| {
            Ok(Value::Boolean(a.is_truthy() || b.is_truthy()))
        })
        // Links compare by normalized path
        .compare(ArgType::Link, ArgType::Link, |a, b, ctx| ctx.compare(a, b))
        // Everything else falls back to the total order
        .compare(ArgType::Any, ArgType::Any, |a, b, ctx| ctx.compare(a, b))
        .build()
}
