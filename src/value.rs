use std::cmp::Ordering;
use std::fmt;
use std::fmt::Write as _;

use chrono::{DateTime, FixedOffset, Timelike};
use indexmap::IndexMap;

use crate::settings::QuerySettings;
pub use crate::temporal::Duration;

/// Field name to value mapping. Lookup ignores insertion order; display keeps it.
pub type Object = IndexMap<String, Value>;

/// A runtime value produced by evaluating a field.
///
/// Every value is exactly one of these variants. Containers nest freely but
/// never form cycles, so `clone()` is always a full structural copy.
///
/// # Examples
///
/// ```
/// use quarry::Value;
///
/// let list = Value::Array(vec![Value::Number(1.0), Value::from("two")]);
/// assert!(list.is_truthy());
/// assert_eq!(list.to_string(), "1, two");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    /// Double-precision number
    Number(f64),
    String(String),
    /// Calendar timestamp with a fixed offset
    Date(DateTime<FixedOffset>),
    Duration(Duration),
    /// Reference to a document or a location inside one
    Link(Link),
    Array(Vec<Value>),
    Object(Object),
    /// Presentation-only values that the engine passes through untouched
    Widget(Widget),
}

/// The type tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LiteralType {
    Null,
    Boolean,
    Number,
    String,
    Date,
    Duration,
    Link,
    Array,
    Object,
    Widget,
}

impl LiteralType {
    pub fn name(self) -> &'static str {
        match self {
            LiteralType::Null => "null",
            LiteralType::Boolean => "boolean",
            LiteralType::Number => "number",
            LiteralType::String => "string",
            LiteralType::Date => "date",
            LiteralType::Duration => "duration",
            LiteralType::Link => "link",
            LiteralType::Array => "array",
            LiteralType::Object => "object",
            LiteralType::Widget => "widget",
        }
    }
}

impl fmt::Display for LiteralType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a link points at inside its target file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LinkKind {
    File,
    Header,
    Block,
}

impl LinkKind {
    pub fn name(self) -> &'static str {
        match self {
            LinkKind::File => "file",
            LinkKind::Header => "header",
            LinkKind::Block => "block",
        }
    }
}

/// A link to a document, optionally to a header or block within it.
///
/// Two links are equal when path, kind and subpath agree; display text and
/// the embed flag are presentation details. Links are never resolved here:
/// the target document is looked up through a
/// [`LinkHandler`](crate::evaluator::LinkHandler) when indexed.
#[derive(Debug, Clone, Eq)]
pub struct Link {
    pub path: String,
    pub display: Option<String>,
    pub subpath: Option<String>,
    pub kind: LinkKind,
    pub embed: bool,
}

impl PartialEq for Link {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.kind == other.kind && self.subpath == other.subpath
    }
}

impl Link {
    pub fn file(path: impl Into<String>) -> Self {
        Link {
            path: path.into(),
            display: None,
            subpath: None,
            kind: LinkKind::File,
            embed: false,
        }
    }

    pub fn header(path: impl Into<String>, header: impl Into<String>) -> Self {
        Link {
            subpath: Some(header.into()),
            kind: LinkKind::Header,
            ..Link::file(path)
        }
    }

    pub fn block(path: impl Into<String>, block: impl Into<String>) -> Self {
        Link {
            subpath: Some(block.into()),
            kind: LinkKind::Block,
            ..Link::file(path)
        }
    }

    /// Parses the inside of `[[...]]`: `path`, `path|display`,
    /// `path#Header`, `path#^block`.
    pub fn parse_inner(text: &str) -> Self {
        let (target, display) = match text.split_once('|') {
            Some((target, display)) => (target.trim(), Some(display.trim().to_string())),
            None => (text.trim(), None),
        };

        let mut link = match target.split_once('#') {
            Some((path, sub)) => match sub.strip_prefix('^') {
                Some(block) => Link::block(path.trim(), block.trim()),
                None => Link::header(path.trim(), sub.trim()),
            },
            None => Link::file(target),
        };
        link.display = display;
        link
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn to_embed(mut self, embed: bool) -> Self {
        self.embed = embed;
        self
    }

    /// Display text, falling back to the subpath, then the file name
    /// without its extension.
    pub fn display_name(&self) -> String {
        if let Some(display) = &self.display {
            return display.clone();
        }
        if let Some(subpath) = &self.subpath {
            return subpath.clone();
        }
        let name = self.path.rsplit('/').next().unwrap_or(&self.path);
        name.strip_suffix(".md").unwrap_or(name).to_string()
    }

    /// `[[path#subpath|display]]`, with a leading `!` for embeds.
    pub fn markdown(&self) -> String {
        let mut out = String::new();
        if self.embed {
            out.push('!');
        }
        out.push_str("[[");
        out.push_str(&self.path);
        match (self.kind, &self.subpath) {
            (LinkKind::Header, Some(sub)) => {
                out.push('#');
                out.push_str(sub);
            }
            (LinkKind::Block, Some(sub)) => {
                out.push_str("#^");
                out.push_str(sub);
            }
            _ => {}
        }
        if let Some(display) = &self.display {
            out.push('|');
            out.push_str(display);
        }
        out.push_str("]]");
        out
    }
}

/// Opaque presentation values.
#[derive(Debug, Clone, PartialEq)]
pub enum Widget {
    /// A key/value pair rendered as `key: value` (LIST output with a format).
    ListPair { key: Box<Value>, value: Box<Value> },
    /// A link to an external URL.
    ExternalLink { url: String, display: Option<String> },
}

impl Widget {
    fn render(&self, settings: &QuerySettings) -> String {
        match self {
            Widget::ListPair { key, value } => {
                format!("{}: {}", key.render(settings), value.render(settings))
            }
            Widget::ExternalLink { url, display } => display.clone().unwrap_or_else(|| url.clone()),
        }
    }
}

/// Formats a number the way users expect: whole numbers without a fraction.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Locale-style string ordering: case-insensitive first, exact code points
/// as the tie-break so the order stays total.
fn compare_strings(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn compare_numbers(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

impl Value {
    pub fn literal_type(&self) -> LiteralType {
        match self {
            Value::Null => LiteralType::Null,
            Value::Boolean(_) => LiteralType::Boolean,
            Value::Number(_) => LiteralType::Number,
            Value::String(_) => LiteralType::String,
            Value::Date(_) => LiteralType::Date,
            Value::Duration(_) => LiteralType::Duration,
            Value::Link(_) => LiteralType::Link,
            Value::Array(_) => LiteralType::Array,
            Value::Object(_) => LiteralType::Object,
            Value::Widget(_) => LiteralType::Widget,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.literal_type().name()
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Truthiness used by WHERE, `!`, `&`, `|` and `choice`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Date(date) => date.timestamp_millis() != 0,
            Value::Duration(dur) => !dur.is_zero(),
            Value::Link(link) => !link.path.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Object(map) => !map.is_empty(),
            Value::Widget(_) => true,
        }
    }

    /// Structural copy. Equivalent to `clone()`; named for call sites that
    /// depend on the copy not aliasing the source.
    pub fn deep_copy(&self) -> Value {
        self.clone()
    }

    /// Total order over all values, without link normalization.
    pub fn compare(&self, other: &Value) -> Ordering {
        self.compare_with(other, &|path: &str| path.to_string())
    }

    /// Total order over all values. Values of different types order by type
    /// (null first); link paths are passed through `normalize` before comparing.
    pub fn compare_with(&self, other: &Value, normalize: &dyn Fn(&str) -> String) -> Ordering {
        let (left, right) = (self.literal_type(), other.literal_type());
        if left != right {
            return left.cmp(&right);
        }

        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => compare_numbers(*a, *b),
            (Value::String(a), Value::String(b)) => compare_strings(a, b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Duration(a), Value::Duration(b)) => compare_numbers(a.as_millis(), b.as_millis()),
            (Value::Link(a), Value::Link(b)) => normalize(&a.path)
                .cmp(&normalize(&b.path))
                .then_with(|| a.kind.cmp(&b.kind))
                .then_with(|| a.subpath.cmp(&b.subpath)),
            (Value::Array(a), Value::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.compare_with(y, normalize);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Object(a), Value::Object(b)) => {
                let mut a_keys: Vec<&String> = a.keys().collect();
                let mut b_keys: Vec<&String> = b.keys().collect();
                a_keys.sort();
                b_keys.sort();
                for (ka, kb) in a_keys.iter().zip(b_keys.iter()) {
                    let ord = ka.cmp(kb).then_with(|| a[*ka].compare_with(&b[*kb], normalize));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a_keys.len().cmp(&b_keys.len())
            }
            (Value::Widget(a), Value::Widget(b)) => {
                let settings = QuerySettings::default();
                a.render(&settings).cmp(&b.render(&settings))
            }
            _ => Ordering::Equal,
        }
    }

    /// Renders the value for people, using the configured formats.
    pub fn render(&self, settings: &QuerySettings) -> String {
        match self {
            Value::Null => settings.render_null_as.clone(),
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Date(date) => {
                let is_midnight = date.hour() == 0
                    && date.minute() == 0
                    && date.second() == 0
                    && date.nanosecond() == 0;
                let format = if is_midnight {
                    &settings.date_format
                } else {
                    &settings.date_time_format
                };
                let mut out = String::new();
                match write!(out, "{}", date.format(format)) {
                    Ok(()) => out,
                    Err(_) => date.to_rfc3339(),
                }
            }
            Value::Duration(dur) => dur.render(),
            Value::Link(link) => link.display_name(),
            Value::Array(items) => items
                .iter()
                .map(|v| v.render(settings))
                .collect::<Vec<_>>()
                .join(", "),
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v.render(settings)))
                .collect::<Vec<_>>()
                .join(", "),
            Value::Widget(widget) => widget.render(settings),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(&QuerySettings::default()))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Object> for Value {
    fn from(map: Object) -> Self {
        Value::Object(map)
    }
}

impl From<Link> for Value {
    fn from(link: Link) -> Self {
        Value::Link(link)
    }
}

impl From<Duration> for Value {
    fn from(dur: Duration) -> Self {
        Value::Duration(dur)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(date: DateTime<FixedOffset>) -> Self {
        Value::Date(date)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_markdown() {
        assert_eq!(Link::file("a.md").markdown(), "[[a.md]]");
        assert_eq!(
            Link::header("a.md", "Goals").with_display("goals").markdown(),
            "[[a.md#Goals|goals]]"
        );
        assert_eq!(Link::block("a.md", "x1").to_embed(true).markdown(), "![[a.md#^x1]]");
    }

    #[test]
    fn test_links_ignore_display_for_equality() {
        assert_eq!(Link::file("a").with_display("A"), Link::file("a"));
        assert_ne!(Link::file("a"), Link::header("a", "h"));
    }

    #[test]
    fn test_render() {
        let settings = QuerySettings::default();
        assert_eq!(Value::Null.render(&settings), "-");
        assert_eq!(Value::Number(3.0).render(&settings), "3");
        assert_eq!(Value::Number(2.5).render(&settings), "2.5");
        assert_eq!(Value::Link(Link::file("notes/Plan.md")).render(&settings), "Plan");
        assert_eq!(
            Value::Array(vec![Value::from("a"), Value::Null]).render(&settings),
            "a, -"
        );
    }

    #[test]
    fn test_containers_are_truthy_when_non_empty() {
        assert!(Value::Array(vec![Value::Null]).is_truthy());
        assert!(!Value::Array(vec![]).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("0").is_truthy());
    }

    #[test]
    fn test_types_order_before_values() {
        assert_eq!(Value::Null.compare(&Value::Boolean(false)), Ordering::Less);
        assert_eq!(Value::Number(100.0).compare(&Value::from("1")), Ordering::Less);
        assert_eq!(Value::from("b").compare(&Value::from("A")), Ordering::Greater);
        assert_eq!(Value::from("a").compare(&Value::from("A")), Ordering::Greater);
    }
}
