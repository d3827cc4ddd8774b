use std::cmp::Ordering;
use std::sync::Arc;

use thiserror::Error;

use crate::{
    ast::{BinOp, Field},
    data_array::DataArray,
    library::Library,
    settings::QuerySettings,
    temporal,
    value::{Object, Value},
};

/// Access to linked documents.
///
/// Links are stored by path only; the evaluator goes through this trait
/// whenever it has to look inside one or decide whether two spellings name
/// the same document.
pub trait LinkHandler {
    /// Metadata of the linked document, if it exists.
    fn resolve(&self, path: &str) -> Option<Object>;

    /// Canonical form of a path, used when comparing links.
    fn normalize(&self, path: &str) -> String;

    fn exists(&self, path: &str) -> bool;
}

/// A link handler for contexts without any documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLinks;

impl LinkHandler for NoLinks {
    fn resolve(&self, _path: &str) -> Option<Object> {
        None
    }

    fn normalize(&self, path: &str) -> String {
        path.to_string()
    }

    fn exists(&self, _path: &str) -> bool {
        false
    }
}

/// Largest string that repetition or padding may build.
pub const MAX_STRING_BYTES: usize = 16 * 1024 * 1024;

/// Errors that can occur while evaluating a field.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// Type mismatch or invalid operation for the given type
    #[error("Type error: {0}")]
    TypeError(String),

    /// No operator registered for this combination of operand types
    #[error("No implementation found for '{left} {op} {right}'")]
    UnsupportedOperator {
        op: BinOp,
        left: &'static str,
        right: &'static str,
    },

    #[error("Unrecognized function name '{0}'")]
    UnknownFunction(String),

    /// The function exists but none of its overloads accepts these arguments
    #[error("No implementation of '{name}' found for arguments: {}", .types.join(", "))]
    NoImplementation { name: String, types: Vec<String> },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Invalid regular expression '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },

    #[error("String result would exceed {} bytes", MAX_STRING_BYTES)]
    StringTooLong,

    #[error("{0}")]
    Message(String),
}

/// Everything a field needs to evaluate: global variables (always including
/// `this`), link access, the operator and function tables, and settings.
///
/// Cloning is cheap. Globals are shared until a clone calls [`set`], which
/// copies them first, so contexts handed to different rows never alias.
///
/// [`set`]: EvalContext::set
#[derive(Clone)]
pub struct EvalContext<'a> {
    globals: Arc<Object>,
    links: &'a dyn LinkHandler,
    library: &'a Library,
    settings: &'a QuerySettings,
}

impl<'a> EvalContext<'a> {
    pub fn new(
        links: &'a dyn LinkHandler,
        library: &'a Library,
        settings: &'a QuerySettings,
    ) -> Self {
        let mut globals = Object::new();
        globals.insert("this".to_string(), Value::Object(Object::new()));
        EvalContext {
            globals: Arc::new(globals),
            links,
            library,
            settings,
        }
    }

    /// Sets the origin document's fields, visible as `this`.
    pub fn with_this(mut self, this: Object) -> Self {
        self.set("this", Value::Object(this));
        self
    }

    /// Binds a global variable in this context only.
    pub fn set(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        Arc::make_mut(&mut self.globals).insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    pub fn globals(&self) -> &Object {
        &self.globals
    }

    pub fn links(&self) -> &'a dyn LinkHandler {
        self.links
    }

    pub fn library(&self) -> &'a Library {
        self.library
    }

    pub fn settings(&self) -> &'a QuerySettings {
        self.settings
    }

    /// Renders a value with this context's settings.
    pub fn render(&self, value: &Value) -> String {
        value.render(self.settings)
    }

    /// Total order with link paths normalized through the link handler.
    pub fn compare(&self, left: &Value, right: &Value) -> Ordering {
        left.compare_with(right, &|path: &str| self.links.normalize(path))
    }

    /// Evaluates a field against an optional row.
    ///
    /// Variables resolve against the row first, then `row` (the row itself),
    /// then globals. Unknown names evaluate to null.
    ///
    /// # Examples
    ///
    /// ```
    /// use quarry::{parse_field, EvalContext, Library, NoLinks, QuerySettings, Value};
    ///
    /// let library = Library::default();
    /// let settings = QuerySettings::default();
    /// let ctx = EvalContext::new(&NoLinks, &library, &settings);
    ///
    /// let field = parse_field("12 + 8 - 4 / 2").unwrap();
    /// assert_eq!(ctx.evaluate(&field, None).unwrap(), Value::Number(18.0));
    /// ```
    pub fn evaluate(&self, field: &Field, data: Option<&Object>) -> Result<Value, EvalError> {
        match field {
            Field::Literal(value) => Ok(value.clone()),
            Field::Variable(name) => Ok(self.lookup(name, data)),
            Field::Negated(inner) => {
                let value = self.evaluate(inner, data)?;
                Ok(Value::Boolean(!value.is_truthy()))
            }
            Field::Binary { left, op, right } => {
                let left = self.evaluate(left, data)?;
                let right = self.evaluate(right, data)?;
                self.evaluate_binary(&left, *op, &right)
            }
            Field::List(items) => items
                .iter()
                .map(|item| self.evaluate(item, data))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Field::Object(entries) => {
                let mut object = Object::new();
                for (key, value) in entries {
                    object.insert(key.clone(), self.evaluate(value, data)?);
                }
                Ok(Value::Object(object))
            }
            Field::Index { object, index } => {
                let object = self.evaluate(object, data)?;
                let index = self.evaluate(index, data)?;
                self.index(&object, &index)
            }
            Field::Function { func, args } => {
                let name = match func.as_ref() {
                    Field::Variable(name) => name,
                    other => {
                        return Err(EvalError::TypeError(format!(
                            "Cannot call {:?} as a function",
                            other
                        )));
                    }
                };
                let args = args
                    .iter()
                    .map(|arg| self.evaluate(arg, data))
                    .collect::<Result<Vec<_>, _>>()?;
                self.call(name, &args)
            }
        }
    }

    fn lookup(&self, name: &str, data: Option<&Object>) -> Value {
        if let Some(data) = data {
            if let Some(value) = data.get(name) {
                return value.clone();
            }
            if name == "row" {
                return Value::Object(data.clone());
            }
        }
        self.globals.get(name).cloned().unwrap_or(Value::Null)
    }

    /// Applies a binary operator through the operator table.
    pub fn evaluate_binary(
        &self,
        left: &Value,
        op: BinOp,
        right: &Value,
    ) -> Result<Value, EvalError> {
        self.library.operators.apply(op, left, right, self)
    }

    /// Calls a function from the function table by name.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, EvalError> {
        self.library.functions.call(name, args, self)
    }

    /// `object[index]`, also used for `object.name`.
    pub fn index(&self, object: &Value, index: &Value) -> Result<Value, EvalError> {
        if index.is_null() {
            return Ok(Value::Null);
        }

        match (object, index) {
            (Value::Null, _) => Ok(Value::Null),
            (Value::Object(map), Value::String(key)) => {
                Ok(map.get(key).cloned().unwrap_or(Value::Null))
            }
            (Value::Object(_), other) => Err(EvalError::TypeError(format!(
                "Can only index objects with strings, got {}",
                other.type_name()
            ))),
            (Value::Link(link), Value::String(key)) => Ok(self
                .links
                .resolve(&link.path)
                .and_then(|page| page.get(key).cloned())
                .unwrap_or(Value::Null)),
            (Value::Link(_), other) => Err(EvalError::TypeError(format!(
                "Can only index links with strings, got {}",
                other.type_name()
            ))),
            (Value::Array(items), Value::Number(n)) => {
                if *n < 0.0 || n.fract() != 0.0 {
                    return Ok(Value::Null);
                }
                Ok(items.get(*n as usize).cloned().unwrap_or(Value::Null))
            }
            // Property access on a list maps over its elements
            (Value::Array(items), Value::String(key)) => Ok(DataArray::from(items.clone())
                .to(key, |item, _| self.index(item, index).ok())
                .into()),
            (Value::String(s), Value::Number(n)) => {
                if *n < 0.0 || n.fract() != 0.0 {
                    return Ok(Value::Null);
                }
                Ok(s.chars()
                    .nth(*n as usize)
                    .map(|ch| Value::String(ch.to_string()))
                    .unwrap_or(Value::Null))
            }
            (Value::Date(date), Value::String(key)) => {
                Ok(temporal::date_component(date, key).map_or(Value::Null, Value::Number))
            }
            (Value::Duration(dur), Value::String(key)) => {
                Ok(dur.component(key).map_or(Value::Null, Value::Number))
            }
            _ => Ok(Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Field;

    #[test]
    fn test_row_shadows_globals() {
        let library = Library::default();
        let settings = QuerySettings::default();
        let mut ctx = EvalContext::new(&NoLinks, &library, &settings);
        ctx.set("status", Value::from("global"));

        let mut row = Object::new();
        row.insert("status".to_string(), Value::from("row"));

        let field = Field::variable("status");
        assert_eq!(ctx.evaluate(&field, Some(&row)).unwrap(), Value::from("row"));
        assert_eq!(ctx.evaluate(&field, None).unwrap(), Value::from("global"));
        assert_eq!(
            ctx.evaluate(&Field::property(Field::variable("row"), "status"), Some(&row))
                .unwrap(),
            Value::from("row")
        );
    }

    #[test]
    fn test_set_does_not_leak_into_clones() {
        let library = Library::default();
        let settings = QuerySettings::default();
        let base = EvalContext::new(&NoLinks, &library, &settings);
        let mut child = base.clone();
        child.set("x", Value::Number(1.0));

        assert!(base.get("x").is_none());
        assert_eq!(child.get("x"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn test_index_array_by_property() {
        let library = Library::default();
        let settings = QuerySettings::default();
        let ctx = EvalContext::new(&NoLinks, &library, &settings);

        let mut a = Object::new();
        a.insert("n".to_string(), Value::Number(1.0));
        let list = Value::Array(vec![Value::Object(a), Value::Number(5.0)]);

        assert_eq!(
            ctx.index(&list, &Value::from("n")).unwrap(),
            Value::Array(vec![Value::Number(1.0), Value::Null])
        );
        assert_eq!(ctx.index(&list, &Value::Number(7.0)).unwrap(), Value::Null);
    }
}
