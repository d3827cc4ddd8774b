use indexmap::IndexMap;
use thiserror::Error;

use crate::{
    ast::{
        BinOp, Field, LinkDirection, NamedField, Query, QueryHeader, QueryOperation, SortDirection,
        SortField, Source, SourceOp, Token,
    },
    lexer::{LexError, Lexer, Position, Spanned},
    value::Value,
};

/// Clause keywords that cannot be used as bare variable names.
const RESERVED: &[&str] = &["FROM", "WHERE", "LIMIT", "GROUP", "FLATTEN", "SORT", "HAVING"];

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at {position}")]
pub struct ParseError {
    pub message: String,
    pub position: Position,
}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        ParseError {
            message: err.message,
            position: err.position,
        }
    }
}

pub struct Parser {
    lexer: Lexer,
    tokens: Vec<Spanned>,
    index: usize,
}

impl Parser {
    /// Tokenizes the whole input up front; lexing errors surface here.
    pub fn new(mut lexer: Lexer) -> Result<Self, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let spanned = lexer.next_spanned()?;
            let done = spanned.token == Token::Eof;
            tokens.push(spanned);
            if done {
                break;
            }
        }
        Ok(Parser {
            lexer,
            tokens,
            index: 0,
        })
    }

    fn current(&self) -> &Token {
        self.token_at(self.index)
    }

    fn token_at(&self, index: usize) -> &Token {
        self.tokens
            .get(index)
            .or_else(|| self.tokens.last())
            .map(|spanned| &spanned.token)
            .unwrap_or(&Token::Eof)
    }

    fn current_start(&self) -> usize {
        self.tokens
            .get(self.index)
            .or_else(|| self.tokens.last())
            .map_or(0, |spanned| spanned.start)
    }

    /// End offset of the most recently consumed token.
    fn previous_end(&self) -> usize {
        match self.index.checked_sub(1).and_then(|i| self.tokens.get(i)) {
            Some(spanned) => spanned.end,
            None => 0,
        }
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.index < self.tokens.len() {
            self.index += 1;
        }
        token
    }

    fn check(&self, token: &Token) -> bool {
        std::mem::discriminant(self.current()) == std::mem::discriminant(token)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            position: self.lexer.position_at(self.current_start()),
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        if !self.check(&expected) {
            return Err(self.error(format!("Expected {}, got {}", expected, self.current())));
        }
        self.advance();
        Ok(())
    }

    /// True when the current token is the identifier `word`, ignoring case.
    fn at_keyword(&self, word: &str) -> bool {
        matches!(self.current(), Token::Identifier(name) if name.eq_ignore_ascii_case(word))
    }

    fn at_keyword_ahead(&self, offset: usize, word: &str) -> bool {
        matches!(self.token_at(self.index + offset), Token::Identifier(name) if name.eq_ignore_ascii_case(word))
    }

    /// An identifier directly followed by `(`, as in `sort(rows)`. Reserved
    /// words in this position name a function rather than a clause.
    fn at_call(&self) -> bool {
        let (Some(ident), Some(paren)) = (self.tokens.get(self.index), self.tokens.get(self.index + 1))
        else {
            return false;
        };
        matches!(ident.token, Token::Identifier(_))
            && paren.token == Token::LParen
            && ident.end == paren.start
    }

    fn expect_keyword(&mut self, word: &str) -> Result<(), ParseError> {
        if !self.at_keyword(word) {
            return Err(self.error(format!("Expected '{}', got {}", word, self.current())));
        }
        self.advance();
        Ok(())
    }

    fn expect_identifier(&mut self, what: &str) -> Result<String, ParseError> {
        match self.current() {
            Token::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            other => Err(self.error(format!("Expected {}, got {}", what, other))),
        }
    }

    /// Parse primary expressions (atoms): literals, variables, lists,
    /// objects and parenthesized fields
    fn parse_primary(&mut self) -> Result<Field, ParseError> {
        match self.current().clone() {
            Token::Number(n) => {
                self.advance();
                Ok(Field::Literal(Value::Number(n)))
            }
            Token::String(s) => {
                self.advance();
                Ok(Field::Literal(Value::String(s)))
            }
            Token::Boolean(b) => {
                self.advance();
                Ok(Field::Literal(Value::Boolean(b)))
            }
            Token::Null => {
                self.advance();
                Ok(Field::Literal(Value::Null))
            }
            Token::Link(link) => {
                self.advance();
                Ok(Field::Literal(Value::Link(link)))
            }
            // Tags are plain strings outside of FROM
            Token::Tag(tag) => {
                self.advance();
                Ok(Field::Literal(Value::String(tag)))
            }
            Token::Date(date) => {
                self.advance();
                Ok(Field::Literal(Value::Date(date)))
            }
            Token::Duration(dur) => {
                self.advance();
                Ok(Field::Literal(Value::Duration(dur)))
            }
            Token::Identifier(name) => {
                if !self.at_call() && RESERVED.iter().any(|word| name.eq_ignore_ascii_case(word)) {
                    return Err(self.error(format!(
                        "'{}' is a reserved keyword; use row.{} to refer to a field with this name",
                        name, name
                    )));
                }
                self.advance();
                Ok(Field::Variable(name))
            }
            Token::LParen => {
                self.advance();
                let field = self.parse_expression()?;
                self.expect(Token::RParen)?;
                Ok(field)
            }
            Token::LBracket => {
                self.advance();
                self.parse_list_literal()
            }
            Token::LBrace => {
                self.advance();
                self.parse_object_literal()
            }
            token => Err(self.error(format!("Unexpected {} in expression", token))),
        }
    }

    fn parse_list_literal(&mut self) -> Result<Field, ParseError> {
        let mut elements = vec![];

        while !self.check(&Token::RBracket) {
            elements.push(self.parse_expression()?);

            if !self.check(&Token::RBracket) {
                self.expect(Token::Comma)?;
            }
        }

        self.expect(Token::RBracket)?;
        Ok(Field::List(elements))
    }

    fn parse_object_literal(&mut self) -> Result<Field, ParseError> {
        let mut pairs = IndexMap::new();

        while !self.check(&Token::RBrace) {
            let key = match self.current() {
                Token::String(s) => s.clone(),
                Token::Identifier(s) => s.clone(),
                other => {
                    return Err(self.error(format!(
                        "Expected string or identifier as object key, got {}",
                        other
                    )));
                }
            };
            self.advance();
            self.expect(Token::Colon)?;

            let value = self.parse_expression()?;
            pairs.insert(key, value);

            if !self.check(&Token::RBrace) {
                self.expect(Token::Comma)?;
            }
        }

        self.expect(Token::RBrace)?;
        Ok(Field::Object(pairs))
    }

    /// Postfix chain: `.name`, `[expr]` and `(args)`, applied left to right
    fn parse_postfix(&mut self) -> Result<Field, ParseError> {
        let mut field = self.parse_primary()?;

        loop {
            match self.current() {
                Token::Dot => {
                    self.advance();
                    let name = self.expect_identifier("field name after '.'")?;
                    field = Field::property(field, name);
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(Token::RBracket)?;
                    field = Field::index(field, index);
                }
                Token::LParen => {
                    self.advance();
                    let mut args = vec![];
                    while !self.check(&Token::RParen) {
                        args.push(self.parse_expression()?);
                        if !self.check(&Token::RParen) {
                            self.expect(Token::Comma)?;
                        }
                    }
                    self.expect(Token::RParen)?;
                    field = Field::Function {
                        func: Box::new(field),
                        args,
                    };
                }
                _ => break,
            }
        }
        Ok(field)
    }

    fn parse_unary(&mut self) -> Result<Field, ParseError> {
        match self.current() {
            Token::Bang => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Field::negate(operand))
            }
            Token::Minus => {
                self.advance();
                match self.parse_unary()? {
                    Field::Literal(Value::Number(n)) => Ok(Field::Literal(Value::Number(-n))),
                    // Works for numbers and durations alike
                    operand => Ok(Field::binary(
                        Field::Literal(Value::Number(-1.0)),
                        BinOp::Multiply,
                        operand,
                    )),
                }
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Field, ParseError> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.current() {
                Token::Star => BinOp::Multiply,
                Token::Slash => BinOp::Divide,
                Token::Percent => BinOp::Modulo,
                _ => break,
            };

            self.advance();
            let right = self.parse_unary()?;
            left = Field::binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Field, ParseError> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Subtract,
                _ => break,
            };

            self.advance();
            let right = self.parse_multiplicative()?;
            left = Field::binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Field, ParseError> {
        let mut left = self.parse_additive()?;

        loop {
            let op = match self.current() {
                Token::Eq => BinOp::Equal,
                Token::NotEq => BinOp::NotEqual,
                Token::Lt => BinOp::LessThan,
                Token::Gt => BinOp::GreaterThan,
                Token::LtEq => BinOp::LessEqual,
                Token::GtEq => BinOp::GreaterEqual,
                _ => break,
            };

            self.advance();
            let right = self.parse_additive()?;
            left = Field::binary(left, op, right);
        }
        Ok(left)
    }

    /// `and` and `or` share one precedence level
    fn parse_logical(&mut self) -> Result<Field, ParseError> {
        let mut left = self.parse_comparison()?;

        loop {
            let op = match self.current() {
                Token::And => BinOp::And,
                Token::Or => BinOp::Or,
                _ => break,
            };

            self.advance();
            let right = self.parse_comparison()?;
            left = Field::binary(left, op, right);
        }
        Ok(left)
    }

    pub fn parse_expression(&mut self) -> Result<Field, ParseError> {
        self.parse_logical()
    }

    /// Parses a standalone field, requiring the whole input to be consumed.
    pub fn parse(&mut self) -> Result<Field, ParseError> {
        let field = self.parse_expression()?;
        self.expect(Token::Eof)?;
        Ok(field)
    }

    /// Parses a field and names it after `AS`, or after its own source text.
    fn parse_named_field(&mut self) -> Result<NamedField, ParseError> {
        let start = self.current_start();
        let field = self.parse_expression()?;
        let text = self.lexer.slice(start, self.previous_end());

        if self.at_keyword("AS") {
            self.advance();
            let name = match self.current() {
                Token::String(s) => s.clone(),
                Token::Identifier(s) => s.clone(),
                other => return Err(self.error(format!("Expected a name after AS, got {}", other))),
            };
            self.advance();
            Ok(NamedField::new(name, field))
        } else {
            Ok(NamedField::new(text.trim(), field))
        }
    }
}

impl Parser {
    fn parse_source_atom(&mut self) -> Result<Source, ParseError> {
        match self.current().clone() {
            Token::Tag(tag) => {
                self.advance();
                Ok(Source::Tag(tag))
            }
            Token::String(folder) => {
                self.advance();
                Ok(Source::Folder(folder))
            }
            Token::Link(link) => {
                self.advance();
                Ok(Source::Link {
                    file: link.path,
                    direction: LinkDirection::Incoming,
                })
            }
            Token::Identifier(name) if name.eq_ignore_ascii_case("outgoing") => {
                self.advance();
                self.expect(Token::LParen)?;
                let file = match self.current() {
                    Token::Link(link) => link.path.clone(),
                    other => {
                        return Err(self.error(format!("Expected a link in outgoing(), got {}", other)));
                    }
                };
                self.advance();
                self.expect(Token::RParen)?;
                Ok(Source::Link {
                    file,
                    direction: LinkDirection::Outgoing,
                })
            }
            Token::Minus | Token::Bang => {
                self.advance();
                Ok(Source::negate(self.parse_source_atom()?))
            }
            Token::LParen => {
                self.advance();
                let source = self.parse_source()?;
                self.expect(Token::RParen)?;
                Ok(source)
            }
            token => Err(self.error(format!(
                "Expected a tag, folder, link or outgoing([[link]]) source, got {}",
                token
            ))),
        }
    }

    /// Source expression as written after FROM
    pub fn parse_source(&mut self) -> Result<Source, ParseError> {
        let mut left = self.parse_source_atom()?;

        loop {
            let op = match self.current() {
                Token::And => SourceOp::And,
                Token::Or => SourceOp::Or,
                _ => break,
            };

            self.advance();
            let right = self.parse_source_atom()?;
            left = Source::binary(left, op, right);
        }
        Ok(left)
    }

    fn at_clause_boundary(&self) -> bool {
        self.check(&Token::Eof)
            || (!self.at_call() && RESERVED.iter().any(|word| self.at_keyword(word)))
    }

    fn parse_without_id(&mut self) -> Result<bool, ParseError> {
        if self.at_keyword("WITHOUT") && self.at_keyword_ahead(1, "ID") {
            self.advance();
            self.advance();
            return Ok(false);
        }
        Ok(true)
    }

    fn parse_header(&mut self) -> Result<QueryHeader, ParseError> {
        let keyword = match self.current() {
            Token::Identifier(name) => name.to_uppercase(),
            other => {
                return Err(self.error(format!(
                    "Expected a query type (TABLE, LIST, TASK or CALENDAR), got {}",
                    other
                )));
            }
        };

        match keyword.as_str() {
            "TABLE" => {
                self.advance();
                let show_id = self.parse_without_id()?;
                let mut fields = vec![];
                if !self.at_clause_boundary() {
                    fields.push(self.parse_named_field()?);
                    while self.check(&Token::Comma) {
                        self.advance();
                        fields.push(self.parse_named_field()?);
                    }
                }
                Ok(QueryHeader::Table { fields, show_id })
            }
            "LIST" => {
                self.advance();
                let show_id = self.parse_without_id()?;
                let format = if self.at_clause_boundary() {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                Ok(QueryHeader::List { format, show_id })
            }
            "TASK" => {
                self.advance();
                Ok(QueryHeader::Task)
            }
            "CALENDAR" => {
                self.advance();
                let field = self.parse_named_field()?;
                Ok(QueryHeader::Calendar { field })
            }
            _ => Err(self.error(format!(
                "Expected a query type (TABLE, LIST, TASK or CALENDAR), got {}",
                self.current()
            ))),
        }
    }

    fn parse_sort_fields(&mut self) -> Result<Vec<SortField>, ParseError> {
        let mut fields = vec![];
        loop {
            let field = self.parse_expression()?;
            let direction = if self.at_keyword("ASC") || self.at_keyword("ASCENDING") {
                self.advance();
                SortDirection::Ascending
            } else if self.at_keyword("DESC") || self.at_keyword("DESCENDING") {
                self.advance();
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            };
            fields.push(SortField { field, direction });

            if !self.check(&Token::Comma) {
                break;
            }
            self.advance();
        }
        Ok(fields)
    }

    /// Parse a complete query
    ///
    /// FROM clauses are OR-ed together wherever they appear. Consecutive
    /// WHERE (or HAVING) clauses are AND-ed into one operation, consecutive
    /// SORT clauses join their field lists.
    pub fn parse_query(&mut self) -> Result<Query, ParseError> {
        let header = self.parse_header()?;
        let mut source = Source::Empty;
        let mut operations: Vec<QueryOperation> = vec![];

        while !self.check(&Token::Eof) {
            let keyword = match self.current() {
                Token::Identifier(name) => name.to_uppercase(),
                other => {
                    return Err(self.error(format!("Expected a query clause, got {}", other)));
                }
            };

            match keyword.as_str() {
                "FROM" => {
                    self.advance();
                    source = source.or(self.parse_source()?);
                }
                "WHERE" => {
                    self.advance();
                    let clause = self.parse_expression()?;
                    match operations.last_mut() {
                        Some(QueryOperation::Where(existing)) => {
                            *existing = Field::binary(existing.clone(), BinOp::And, clause);
                        }
                        _ => operations.push(QueryOperation::Where(clause)),
                    }
                }
                "HAVING" => {
                    self.advance();
                    let clause = self.parse_expression()?;
                    match operations.last_mut() {
                        Some(QueryOperation::Having(existing)) => {
                            *existing = Field::binary(existing.clone(), BinOp::And, clause);
                        }
                        _ => operations.push(QueryOperation::Having(clause)),
                    }
                }
                "SORT" => {
                    self.advance();
                    let fields = self.parse_sort_fields()?;
                    match operations.last_mut() {
                        Some(QueryOperation::Sort(existing)) => existing.extend(fields),
                        _ => operations.push(QueryOperation::Sort(fields)),
                    }
                }
                "LIMIT" => {
                    self.advance();
                    operations.push(QueryOperation::Limit(self.parse_expression()?));
                }
                "FLATTEN" => {
                    self.advance();
                    operations.push(QueryOperation::Flatten(self.parse_named_field()?));
                }
                "GROUP" => {
                    self.advance();
                    self.expect_keyword("BY")?;
                    operations.push(QueryOperation::Group(self.parse_named_field()?));
                }
                _ => {
                    return Err(self.error(format!(
                        "Unrecognized query operation '{}'; expected FROM, WHERE, SORT, LIMIT, FLATTEN, GROUP BY or HAVING",
                        keyword
                    )));
                }
            }
        }

        Ok(Query {
            header,
            source,
            operations,
        })
    }
}
