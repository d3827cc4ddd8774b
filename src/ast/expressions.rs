use indexmap::IndexMap;

use crate::ast::BinOp;
use crate::value::Value;

/// Abstract Syntax Tree node representing a parsed field (expression).
///
/// The tree is immutable once parsed and is evaluated against many rows.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// A constant value
    ///
    /// # Examples
    /// ```text
    /// 42
    /// "hello"
    /// [[Some Page]]
    /// date(2021-04-18)
    /// dur(3 days)
    /// ```
    Literal(Value),

    /// Variable lookup; a missing name evaluates to null
    ///
    /// # Examples
    /// ```text
    /// status
    /// due-date
    /// ```
    Variable(String),

    /// Binary operation (arithmetic, comparison, logical)
    Binary {
        left: Box<Field>,
        op: BinOp,
        right: Box<Field>,
    },

    /// Function call. The callee is itself a field; only variables are
    /// callable today.
    ///
    /// # Example
    /// ```text
    /// contains(file.tags, "#project")
    /// ```
    Function { func: Box<Field>, args: Vec<Field> },

    /// Indexing, covering both `.prop` and `[expr]`
    ///
    /// # Examples
    /// ```text
    /// file.name
    /// file.tags[0]
    /// row["due date"]
    /// ```
    Index { object: Box<Field>, index: Box<Field> },

    /// Boolean negation (`!`)
    Negated(Box<Field>),

    /// List literal
    ///
    /// # Example
    /// ```text
    /// [1, 2, status]
    /// ```
    List(Vec<Field>),

    /// Object literal
    ///
    /// # Example
    /// ```text
    /// { name: file.name, "due date": due }
    /// ```
    Object(IndexMap<String, Field>),
}

impl Field {
    pub fn literal(value: impl Into<Value>) -> Self {
        Field::Literal(value.into())
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Field::Variable(name.into())
    }

    pub fn binary(left: Field, op: BinOp, right: Field) -> Self {
        Field::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn index(object: Field, index: Field) -> Self {
        Field::Index {
            object: Box::new(object),
            index: Box::new(index),
        }
    }

    /// `object.name`
    pub fn property(object: Field, name: impl Into<String>) -> Self {
        Field::index(object, Field::Literal(Value::String(name.into())))
    }

    pub fn call(name: impl Into<String>, args: Vec<Field>) -> Self {
        Field::Function {
            func: Box::new(Field::Variable(name.into())),
            args,
        }
    }

    pub fn negate(field: Field) -> Self {
        Field::Negated(Box::new(field))
    }
}
