// tests/lexer_tests.rs

use quarry::ast::Token;
use quarry::lexer::Lexer;
use quarry::value::{Link, LinkKind};

fn tokens(input: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(input);
    let mut out = Vec::new();
    loop {
        let token = lexer.next_token().unwrap();
        if token == Token::Eof {
            break;
        }
        out.push(token);
    }
    out
}

fn ident(name: &str) -> Token {
    Token::Identifier(name.to_string())
}

// ============================================================================
// Single Character Tokens
// ============================================================================

#[test]
fn test_single_char_tokens() {
    let test_cases = vec![
        ("&", Token::And),
        ("|", Token::Or),
        ("!", Token::Bang),
        ("+", Token::Plus),
        ("-", Token::Minus),
        ("*", Token::Star),
        ("/", Token::Slash),
        ("%", Token::Percent),
        ("(", Token::LParen),
        (")", Token::RParen),
        ("[", Token::LBracket),
        ("]", Token::RBracket),
        ("{", Token::LBrace),
        ("}", Token::RBrace),
        (".", Token::Dot),
        (",", Token::Comma),
        (":", Token::Colon),
        ("<", Token::Lt),
        (">", Token::Gt),
        ("=", Token::Eq),
    ];

    for (input, expected) in test_cases {
        let mut lexer = Lexer::new(input);
        let token = lexer.next_token().unwrap();
        assert_eq!(token, expected, "Failed for input: {}", input);
        assert_eq!(lexer.next_token().unwrap(), Token::Eof);
    }
}

// ============================================================================
// Two Character Tokens
// ============================================================================

#[test]
fn test_two_char_tokens() {
    let test_cases = vec![
        ("==", Token::Eq),
        ("!=", Token::NotEq),
        ("<=", Token::LtEq),
        (">=", Token::GtEq),
    ];

    for (input, expected) in test_cases {
        let mut lexer = Lexer::new(input);
        assert_eq!(lexer.next_token().unwrap(), expected, "Failed for input: {}", input);
        assert_eq!(lexer.next_token().unwrap(), Token::Eof);
    }
}

// ============================================================================
// Literals
// ============================================================================

#[test]
fn test_numbers() {
    assert_eq!(tokens("42"), vec![Token::Number(42.0)]);
    assert_eq!(tokens("3.25"), vec![Token::Number(3.25)]);
    // A trailing dot is field access, not a fraction
    assert_eq!(tokens("1.x"), vec![Token::Number(1.0), Token::Dot, ident("x")]);
    assert_eq!(tokens("-7"), vec![Token::Minus, Token::Number(7.0)]);
}

#[test]
fn test_strings_and_escapes() {
    assert_eq!(tokens(r#""hello""#), vec![Token::String("hello".to_string())]);
    assert_eq!(
        tokens(r#""say \"hi\"\n""#),
        vec![Token::String("say \"hi\"\n".to_string())]
    );
    assert_eq!(tokens("'single'"), vec![Token::String("single".to_string())]);
}

#[test]
fn test_keywords_are_case_insensitive() {
    assert_eq!(
        tokens("AND or True FALSE Null"),
        vec![
            Token::And,
            Token::Or,
            Token::Boolean(true),
            Token::Boolean(false),
            Token::Null
        ]
    );
}

#[test]
fn test_identifiers_allow_dashes() {
    assert_eq!(tokens("due-date"), vec![ident("due-date")]);
    assert_eq!(tokens("a - b"), vec![ident("a"), Token::Minus, ident("b")]);
    assert_eq!(tokens("_private2"), vec![ident("_private2")]);
}

#[test]
fn test_tags() {
    assert_eq!(tokens("#project"), vec![Token::Tag("#project".to_string())]);
    assert_eq!(
        tokens("#project/active"),
        vec![Token::Tag("#project/active".to_string())]
    );
}

// ============================================================================
// Links
// ============================================================================

#[test]
fn test_links() {
    assert_eq!(tokens("[[Home]]"), vec![Token::Link(Link::file("Home"))]);

    match &tokens("[[Notes/Plan#Goals|the goals]]")[0] {
        Token::Link(link) => {
            assert_eq!(link.path, "Notes/Plan");
            assert_eq!(link.kind, LinkKind::Header);
            assert_eq!(link.subpath.as_deref(), Some("Goals"));
            assert_eq!(link.display.as_deref(), Some("the goals"));
            assert!(!link.embed);
        }
        other => panic!("expected a link, got {:?}", other),
    }

    match &tokens("[[Plan#^abc123]]")[0] {
        Token::Link(link) => assert_eq!(link.kind, LinkKind::Block),
        other => panic!("expected a link, got {:?}", other),
    }
}

#[test]
fn test_embedded_link() {
    match &tokens("![[diagram.png]]")[0] {
        Token::Link(link) => {
            assert!(link.embed);
            assert_eq!(link.path, "diagram.png");
        }
        other => panic!("expected a link, got {:?}", other),
    }
}

#[test]
fn test_list_literal_is_not_a_link() {
    assert_eq!(
        tokens("[1, [2]]"),
        vec![
            Token::LBracket,
            Token::Number(1.0),
            Token::Comma,
            Token::LBracket,
            Token::Number(2.0),
            Token::RBracket,
            Token::RBracket
        ]
    );
}

// ============================================================================
// Date and Duration Literals
// ============================================================================

#[test]
fn test_date_literal() {
    let toks = tokens("date(2021-04-18)");
    assert_eq!(toks.len(), 1);
    match &toks[0] {
        Token::Date(date) => assert_eq!(date.format("%Y-%m-%d").to_string(), "2021-04-18"),
        other => panic!("expected a date, got {:?}", other),
    }
}

#[test]
fn test_date_shorthand() {
    assert!(matches!(tokens("date(today)")[..], [Token::Date(_)]));
}

#[test]
fn test_duration_literal() {
    match &tokens("dur(3 days, 2 hours)")[..] {
        [Token::Duration(dur)] => {
            assert_eq!(dur.days, 3.0);
            assert_eq!(dur.hours, 2.0);
        }
        other => panic!("expected a duration, got {:?}", other),
    }
}

#[test]
fn test_date_call_falls_back_to_function() {
    // Not a literal body, so `date` stays an ordinary call
    assert_eq!(
        tokens("date(due)"),
        vec![ident("date"), Token::LParen, ident("due"), Token::RParen]
    );
    assert_eq!(
        tokens(r#"date("2021-04-18")"#),
        vec![
            ident("date"),
            Token::LParen,
            Token::String("2021-04-18".to_string()),
            Token::RParen
        ]
    );
}

// ============================================================================
// Whole Queries
// ============================================================================

#[test]
fn test_query_tokens() {
    assert_eq!(
        tokens("TABLE file.name FROM #tag WHERE x >= 2"),
        vec![
            ident("TABLE"),
            ident("file"),
            Token::Dot,
            ident("name"),
            ident("FROM"),
            Token::Tag("#tag".to_string()),
            ident("WHERE"),
            ident("x"),
            Token::GtEq,
            Token::Number(2.0)
        ]
    );
}

// ============================================================================
// Errors and Positions
// ============================================================================

#[test]
fn test_unterminated_string() {
    let mut lexer = Lexer::new(r#""never closed"#);
    let err = lexer.next_token().unwrap_err();
    assert!(err.message.contains("Unterminated string"));
    assert_eq!(err.position.line, 1);
    assert_eq!(err.position.column, 1);
}

#[test]
fn test_unterminated_link() {
    let mut lexer = Lexer::new("x [[open");
    lexer.next_token().unwrap();
    let err = lexer.next_token().unwrap_err();
    assert!(err.message.contains("Unterminated link"));
    assert_eq!(err.position.column, 3);
}

#[test]
fn test_unexpected_character() {
    let mut lexer = Lexer::new("a ^ b");
    lexer.next_token().unwrap();
    let err = lexer.next_token().unwrap_err();
    assert!(err.to_string().contains("Unexpected character '^'"));
    assert!(err.to_string().ends_with("line 1, column 3"));
}

#[test]
fn test_spans_cover_token_text() {
    let mut lexer = Lexer::new("  lower(name)");
    let spanned = lexer.next_spanned().unwrap();
    assert_eq!(spanned.token, ident("lower"));
    assert_eq!(lexer.slice(spanned.start, spanned.end), "lower");
    assert_eq!(lexer.position_at(spanned.start).column, 3);
}
