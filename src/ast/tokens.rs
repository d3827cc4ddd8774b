use std::fmt;

use chrono::{DateTime, FixedOffset};

use crate::value::{Duration, Link};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    /// Number (always double precision)
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 3.14
    /// ```
    Number(f64),

    /// String literal enclosed in double or single quotes
    ///
    /// # Examples
    /// ```text
    /// "hello"
    /// "work/projects"
    /// ```
    String(String),

    /// Boolean values (`true`, `false`, any case)
    Boolean(bool),

    /// Null value
    Null,

    /// Link literal
    ///
    /// # Examples
    /// ```text
    /// [[Some Page]]
    /// [[Some Page#Header|shown]]
    /// ![[Embedded]]
    /// ```
    Link(Link),

    /// Tag, including the leading `#`
    ///
    /// # Examples
    /// ```text
    /// #project
    /// #project/active
    /// ```
    Tag(String),

    /// Date literal written as `date(...)`
    ///
    /// # Examples
    /// ```text
    /// date(2021-04-18)
    /// date(today)
    /// ```
    Date(DateTime<FixedOffset>),

    /// Duration literal written as `dur(...)`
    ///
    /// # Examples
    /// ```text
    /// dur(3 days)
    /// dur(1 hour, 30 minutes)
    /// ```
    Duration(Duration),

    // Identifiers
    /// Variable, function or keyword name
    ///
    /// Starts with a letter or underscore, continues with letters, digits,
    /// underscores or dashes.
    ///
    /// # Examples
    /// ```text
    /// status
    /// due-date
    /// WHERE
    /// ```
    Identifier(String),

    // Operators
    /// Addition or string concatenation
    Plus,

    /// Subtraction or unary minus
    Minus,

    /// Multiplication
    Star,

    /// Division
    Slash,

    /// Modulo
    Percent,

    // Comparison
    /// Equality (`=` or `==`)
    Eq,

    /// Inequality
    NotEq,

    /// Less than
    Lt,

    /// Greater than
    Gt,

    /// Less than or equal
    LtEq,

    /// Greater than or equal
    GtEq,

    // Logical
    /// `and` (any case) or `&`
    And,

    /// `or` (any case) or `|`
    Or,

    /// Negation
    Bang,

    // Delimiters
    /// Left bracket for indexing and list literals
    LBracket,

    /// Right bracket
    RBracket,

    /// Left parenthesis for grouping or function calls
    LParen,

    /// Right parenthesis
    RParen,

    /// Left brace for object literals
    LBrace,

    /// Right brace
    RBrace,

    /// Dot for property access
    Dot,

    /// Comma for separating arguments, fields and elements
    Comma,

    /// Colon for object literal key-value pairs
    Colon,

    /// End of input
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "number {}", n),
            Token::String(s) => write!(f, "string \"{}\"", s),
            Token::Boolean(b) => write!(f, "'{}'", b),
            Token::Null => f.write_str("'null'"),
            Token::Link(link) => write!(f, "link {}", link.markdown()),
            Token::Tag(tag) => write!(f, "tag {}", tag),
            Token::Date(_) => f.write_str("date literal"),
            Token::Duration(_) => f.write_str("duration literal"),
            Token::Identifier(name) => write!(f, "'{}'", name),
            Token::Plus => f.write_str("'+'"),
            Token::Minus => f.write_str("'-'"),
            Token::Star => f.write_str("'*'"),
            Token::Slash => f.write_str("'/'"),
            Token::Percent => f.write_str("'%'"),
            Token::Eq => f.write_str("'='"),
            Token::NotEq => f.write_str("'!='"),
            Token::Lt => f.write_str("'<'"),
            Token::Gt => f.write_str("'>'"),
            Token::LtEq => f.write_str("'<='"),
            Token::GtEq => f.write_str("'>='"),
            Token::And => f.write_str("'and'"),
            Token::Or => f.write_str("'or'"),
            Token::Bang => f.write_str("'!'"),
            Token::LBracket => f.write_str("'['"),
            Token::RBracket => f.write_str("']'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::LBrace => f.write_str("'{'"),
            Token::RBrace => f.write_str("'}'"),
            Token::Dot => f.write_str("'.'"),
            Token::Comma => f.write_str("','"),
            Token::Colon => f.write_str("':'"),
            Token::Eof => f.write_str("end of input"),
        }
    }
}
