// tests/parser_tests.rs

use pretty_assertions::assert_eq;
use quarry::ast::{
    BinOp, Field, LinkDirection, NamedField, QueryHeader, QueryOperation, Source, SourceOp,
    SortDirection,
};
use quarry::lexer::Lexer;
use quarry::parser::Parser;
use quarry::value::{Link, Value};
use quarry::{parse_field, parse_query};

fn field(input: &str) -> Field {
    parse_field(input).unwrap_or_else(|e| panic!("failed to parse {:?}: {}", input, e))
}

fn source(input: &str) -> Source {
    Parser::new(Lexer::new(input)).unwrap().parse_source().unwrap()
}

fn num(n: f64) -> Field {
    Field::literal(n)
}

fn var(name: &str) -> Field {
    Field::variable(name)
}

// ============================================================================
// Literals
// ============================================================================

#[test]
fn test_literals() {
    assert_eq!(field("42"), num(42.0));
    assert_eq!(field("\"hi\""), Field::literal("hi"));
    assert_eq!(field("true"), Field::literal(true));
    assert_eq!(field("null"), Field::Literal(Value::Null));
    assert_eq!(field("[[Home]]"), Field::literal(Link::file("Home")));
    assert_eq!(field("#tag"), Field::literal("#tag"));
}

#[test]
fn test_negative_number_folds() {
    assert_eq!(field("-3"), num(-3.0));
    assert_eq!(
        field("-x"),
        Field::binary(num(-1.0), BinOp::Multiply, var("x"))
    );
}

#[test]
fn test_list_and_object_literals() {
    assert_eq!(
        field("[1, \"a\", []]"),
        Field::List(vec![num(1.0), Field::literal("a"), Field::List(vec![])])
    );

    match field("{ a: 1, \"b c\": x }") {
        Field::Object(map) => {
            assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "b c"]);
            assert_eq!(map["b c"], var("x"));
        }
        other => panic!("expected an object, got {:?}", other),
    }
}

// ============================================================================
// Precedence
// ============================================================================

#[test]
fn test_multiplicative_binds_tighter() {
    // 12 + 8 - 4 / 2  =>  (12 + 8) - (4 / 2)
    assert_eq!(
        field("12 + 8 - 4 / 2"),
        Field::binary(
            Field::binary(num(12.0), BinOp::Add, num(8.0)),
            BinOp::Subtract,
            Field::binary(num(4.0), BinOp::Divide, num(2.0)),
        )
    );
}

#[test]
fn test_comparison_below_arithmetic() {
    assert_eq!(
        field("a + 1 >= b"),
        Field::binary(
            Field::binary(var("a"), BinOp::Add, num(1.0)),
            BinOp::GreaterEqual,
            var("b"),
        )
    );
}

#[test]
fn test_and_or_share_a_level() {
    // Left to right: (a or b) and c
    assert_eq!(
        field("a or b and c"),
        Field::binary(
            Field::binary(var("a"), BinOp::Or, var("b")),
            BinOp::And,
            var("c"),
        )
    );
    assert_eq!(field("a & b"), field("a and b"));
    assert_eq!(field("a | b"), field("a or b"));
}

#[test]
fn test_double_equals_is_equals() {
    assert_eq!(field("a == 1"), field("a = 1"));
}

#[test]
fn test_parentheses() {
    assert_eq!(
        field("(1 + 2) * 3"),
        Field::binary(
            Field::binary(num(1.0), BinOp::Add, num(2.0)),
            BinOp::Multiply,
            num(3.0),
        )
    );
}

#[test]
fn test_bang_negates() {
    assert_eq!(field("!done"), Field::negate(var("done")));
    assert_eq!(field("!!done"), Field::negate(Field::negate(var("done"))));
}

// ============================================================================
// Postfix
// ============================================================================

#[test]
fn test_property_and_index_chain() {
    assert_eq!(
        field("file.tags[0]"),
        Field::index(Field::property(var("file"), "tags"), num(0.0))
    );
    assert_eq!(field("a[\"b\"]"), Field::property(var("a"), "b"));
}

#[test]
fn test_function_calls() {
    assert_eq!(
        field("contains(file.name, \"x\")"),
        Field::call(
            "contains",
            vec![Field::property(var("file"), "name"), Field::literal("x")]
        )
    );
    assert_eq!(field("list()"), Field::call("list", vec![]));
}

#[test]
fn test_call_on_property() {
    assert_eq!(
        field("a.b(1)"),
        Field::Function {
            func: Box::new(Field::property(var("a"), "b")),
            args: vec![num(1.0)],
        }
    );
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_reserved_word_in_expression() {
    let err = parse_field("where + 1").unwrap_err();
    assert!(err.message.contains("reserved keyword"));
    assert!(err.message.contains("row.where"));
}

#[test]
fn test_reserved_word_as_function_name() {
    assert_eq!(
        field("sort(list(2, 1))"),
        Field::call("sort", vec![Field::call("list", vec![num(2.0), num(1.0)])])
    );
    assert_eq!(
        field("reverse(sort(x))"),
        Field::call("reverse", vec![Field::call("sort", vec![var("x")])])
    );
    assert!(parse_field("sort + 1").is_err());
}

#[test]
fn test_sort_function_inside_query_clauses() {
    let query = parse_query("TABLE sort(tags) AS ordered SORT file.name").unwrap();
    let QueryHeader::Table { fields, .. } = &query.header else {
        panic!("expected a table header");
    };
    assert_eq!(fields[0].field, Field::call("sort", vec![var("tags")]));
    assert_eq!(query.operations.len(), 1);

    // With a space the keyword still opens a clause
    let query = parse_query("LIST SORT (file.name)").unwrap();
    assert!(matches!(query.header, QueryHeader::List { format: None, .. }));
    assert_eq!(query.operations.len(), 1);
}

#[test]
fn test_trailing_input() {
    let err = parse_field("1 2").unwrap_err();
    assert!(err.message.contains("Expected end of input"));
    assert_eq!(err.position.column, 3);
}

#[test]
fn test_unclosed_paren() {
    assert!(parse_field("(1 + 2").is_err());
    assert!(parse_field("f(1,").is_err());
}

#[test]
fn test_lex_error_surfaces_as_parse_error() {
    let err = parse_field("\"open").unwrap_err();
    assert!(err.message.contains("Unterminated string"));
}

// ============================================================================
// Sources
// ============================================================================

#[test]
fn test_source_atoms() {
    assert_eq!(source("#project"), Source::Tag("#project".to_string()));
    assert_eq!(source("\"notes/daily\""), Source::Folder("notes/daily".to_string()));
    assert_eq!(
        source("[[Home]]"),
        Source::Link {
            file: "Home".to_string(),
            direction: LinkDirection::Incoming
        }
    );
    assert_eq!(
        source("outgoing([[Home]])"),
        Source::Link {
            file: "Home".to_string(),
            direction: LinkDirection::Outgoing
        }
    );
}

#[test]
fn test_source_combinators() {
    assert_eq!(
        source("#a and -\"archive\""),
        Source::binary(
            Source::Tag("#a".to_string()),
            SourceOp::And,
            Source::negate(Source::Folder("archive".to_string())),
        )
    );
    assert_eq!(
        source("!(#a or #b)"),
        Source::negate(Source::binary(
            Source::Tag("#a".to_string()),
            SourceOp::Or,
            Source::Tag("#b".to_string()),
        ))
    );
}

#[test]
fn test_bad_source() {
    let err = Parser::new(Lexer::new("42")).unwrap().parse_source().unwrap_err();
    assert!(err.message.contains("Expected a tag, folder, link"));
}

// ============================================================================
// Query Headers
// ============================================================================

#[test]
fn test_table_header_names() {
    let query = parse_query("TABLE file.name, due AS \"Due date\", length(rows)").unwrap();
    assert_eq!(
        query.header,
        QueryHeader::Table {
            fields: vec![
                NamedField::new("file.name", Field::property(var("file"), "name")),
                NamedField::new("Due date", var("due")),
                NamedField::new("length(rows)", Field::call("length", vec![var("rows")])),
            ],
            show_id: true,
        }
    );
}

#[test]
fn test_without_id() {
    let query = parse_query("TABLE WITHOUT ID a").unwrap();
    assert!(matches!(query.header, QueryHeader::Table { show_id: false, .. }));

    let query = parse_query("list without id a").unwrap();
    assert!(matches!(query.header, QueryHeader::List { show_id: false, format: Some(_) }));
}

#[test]
fn test_bare_headers() {
    assert_eq!(
        parse_query("LIST").unwrap().header,
        QueryHeader::List {
            format: None,
            show_id: true
        }
    );
    assert_eq!(
        parse_query("TABLE FROM #a").unwrap().header,
        QueryHeader::Table {
            fields: vec![],
            show_id: true
        }
    );
    assert_eq!(parse_query("TASK").unwrap().header, QueryHeader::Task);
}

#[test]
fn test_calendar_header() {
    let query = parse_query("CALENDAR file.day").unwrap();
    match query.header {
        QueryHeader::Calendar { field } => assert_eq!(field.name, "file.day"),
        other => panic!("expected a calendar, got {:?}", other),
    }
}

#[test]
fn test_unknown_query_type() {
    let err = parse_query("GRAPH x").unwrap_err();
    assert!(err.message.contains("Expected a query type"));
}

// ============================================================================
// Query Clauses
// ============================================================================

#[test]
fn test_clause_order_is_preserved() {
    let query = parse_query("LIST SORT a LIMIT 3 WHERE b").unwrap();
    let kinds: Vec<&str> = query.operations.iter().map(|op| op.kind()).collect();
    assert_eq!(kinds, vec!["sort", "limit", "where"]);
}

#[test]
fn test_from_clauses_are_or_combined() {
    let query = parse_query("LIST FROM #a WHERE x FROM #b").unwrap();
    assert_eq!(
        query.source,
        Source::binary(
            Source::Tag("#a".to_string()),
            SourceOp::Or,
            Source::Tag("#b".to_string()),
        )
    );
    assert_eq!(query.operations.len(), 1);
}

#[test]
fn test_adjacent_where_clauses_are_and_combined() {
    let query = parse_query("LIST WHERE a WHERE b").unwrap();
    assert_eq!(
        query.operations,
        vec![QueryOperation::Where(Field::binary(var("a"), BinOp::And, var("b")))]
    );

    let query = parse_query("LIST WHERE a SORT c WHERE b").unwrap();
    assert_eq!(query.operations.len(), 3);
}

#[test]
fn test_adjacent_sorts_concatenate() {
    let query = parse_query("LIST SORT a DESC SORT b, c ascending").unwrap();
    match &query.operations[..] {
        [QueryOperation::Sort(fields)] => {
            let directions: Vec<SortDirection> = fields.iter().map(|f| f.direction).collect();
            assert_eq!(
                directions,
                vec![
                    SortDirection::Descending,
                    SortDirection::Ascending,
                    SortDirection::Ascending
                ]
            );
        }
        other => panic!("expected one sort, got {:?}", other),
    }
}

#[test]
fn test_group_and_flatten_names() {
    let query = parse_query("TABLE rows GROUP BY file.folder AS dir FLATTEN file.tags").unwrap();
    assert_eq!(
        query.operations,
        vec![
            QueryOperation::Group(NamedField::new(
                "dir",
                Field::property(var("file"), "folder")
            )),
            QueryOperation::Flatten(NamedField::new(
                "file.tags",
                Field::property(var("file"), "tags")
            )),
        ]
    );
}

#[test]
fn test_having_and_limit() {
    let query = parse_query("LIST GROUP BY a HAVING length(rows) > 1 LIMIT 10").unwrap();
    assert!(matches!(query.operations[1], QueryOperation::Having(_)));
    assert_eq!(query.operations[2], QueryOperation::Limit(num(10.0)));
}

#[test]
fn test_keywords_are_case_insensitive() {
    assert_eq!(
        parse_query("table a from #x where b sort c desc").unwrap(),
        parse_query("TABLE a FROM #x WHERE b SORT c DESC").unwrap()
    );
}

#[test]
fn test_group_requires_by() {
    let err = parse_query("LIST GROUP a").unwrap_err();
    assert!(err.message.contains("Expected 'BY'"));
}

#[test]
fn test_unknown_clause() {
    let err = parse_query("LIST WHERE a ORDER b").unwrap_err();
    assert!(err.message.contains("Unrecognized query operation 'ORDER'"));
    assert_eq!(err.position.column, 14);
}
