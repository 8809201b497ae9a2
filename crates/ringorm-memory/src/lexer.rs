//! Lexer for CQL and SQL command text using logos.

use logos::Logos;

use crate::error::ParseError;
use crate::span::Span;

/// Token types for command text. Keywords are case-insensitive.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    // Statement keywords
    #[token("select", ignore(ascii_case))]
    Select,
    #[token("insert", ignore(ascii_case))]
    Insert,
    #[token("update", ignore(ascii_case))]
    Update,
    #[token("delete", ignore(ascii_case))]
    Delete,

    // Clause keywords
    #[token("from", ignore(ascii_case))]
    From,
    #[token("where", ignore(ascii_case))]
    Where,
    #[token("into", ignore(ascii_case))]
    Into,
    #[token("values", ignore(ascii_case))]
    Values,
    #[token("set", ignore(ascii_case))]
    Set,
    #[token("group", ignore(ascii_case))]
    Group,
    #[token("order", ignore(ascii_case))]
    Order,
    #[token("by", ignore(ascii_case))]
    By,
    #[token("asc", ignore(ascii_case))]
    Asc,
    #[token("desc", ignore(ascii_case))]
    Desc,
    #[token("limit", ignore(ascii_case))]
    Limit,
    #[token("offset", ignore(ascii_case))]
    Offset,
    #[token("allow", ignore(ascii_case))]
    Allow,
    #[token("filtering", ignore(ascii_case))]
    Filtering,
    #[token("using", ignore(ascii_case))]
    Using,
    #[token("ttl", ignore(ascii_case))]
    Ttl,
    #[token("if", ignore(ascii_case))]
    If,
    #[token("exists", ignore(ascii_case))]
    Exists,
    #[token("on", ignore(ascii_case))]
    On,
    #[token("conflict", ignore(ascii_case))]
    Conflict,
    #[token("do", ignore(ascii_case))]
    Do,
    #[token("nothing", ignore(ascii_case))]
    Nothing,
    #[token("as", ignore(ascii_case))]
    As,
    #[token("count", ignore(ascii_case))]
    Count,
    #[token("token", ignore(ascii_case))]
    TokenFn,

    // Logical and predicate keywords
    #[token("and", ignore(ascii_case))]
    And,
    #[token("or", ignore(ascii_case))]
    Or,
    #[token("not", ignore(ascii_case))]
    Not,
    #[token("in", ignore(ascii_case))]
    In,
    #[token("is", ignore(ascii_case))]
    Is,
    #[token("like", ignore(ascii_case))]
    Like,
    #[token("contains", ignore(ascii_case))]
    Contains,
    #[token("key", ignore(ascii_case))]
    Key,

    // Literals
    #[token("true", ignore(ascii_case))]
    True,
    #[token("false", ignore(ascii_case))]
    False,
    #[token("null", ignore(ascii_case))]
    Null,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[regex(r#""([^"]|"")*""#, |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].replace("\"\"", "\"")
    })]
    QuotedIdent(String),

    #[regex(r"'([^']|'')*'", |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].replace("''", "'")
    })]
    String(String),

    #[regex(r"-?[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r"-?[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    #[token("?")]
    Param,

    // Comparison operators
    #[token("=")]
    Eq,
    #[token("!=")]
    #[token("<>")]
    Ne,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,

    // Punctuation
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("*")]
    Star,
    #[token(";")]
    Semicolon,
}

impl Token {
    /// Keywords that may also name a column.
    pub fn soft_keyword(&self) -> Option<&'static str> {
        let name = match self {
            Token::Key => "key",
            Token::Ttl => "ttl",
            Token::Count => "count",
            Token::Exists => "exists",
            Token::Filtering => "filtering",
            Token::Allow => "allow",
            Token::Asc => "asc",
            Token::Desc => "desc",
            Token::Nothing => "nothing",
            Token::Conflict => "conflict",
            Token::Do => "do",
            Token::Values => "values",
            _ => return None,
        };
        Some(name)
    }
}

/// A token with its span in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

/// Tokenize command text, failing on the first unrecognised character.
pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>, ParseError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let span: Span = lexer.span().into();
        match result {
            Ok(token) => tokens.push(SpannedToken { token, span }),
            Err(()) => {
                return Err(ParseError::new(
                    format!("unexpected character sequence '{}'", lexer.slice()),
                    span,
                ))
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn test_select_tokens() {
        assert_eq!(
            kinds("SELECT id FROM posts WHERE a = ?"),
            vec![
                Token::Select,
                Token::Ident("id".into()),
                Token::From,
                Token::Ident("posts".into()),
                Token::Where,
                Token::Ident("a".into()),
                Token::Eq,
                Token::Param,
            ]
        );
    }

    #[test]
    fn test_keywords_ignore_case() {
        assert_eq!(kinds("select Select SELECT"), vec![Token::Select; 3]);
        assert_eq!(kinds("allow filtering"), vec![Token::Allow, Token::Filtering]);
    }

    #[test]
    fn test_quoted_forms() {
        assert_eq!(
            kinds(r#""createdAt" "we""ird" 'it''s'"#),
            vec![
                Token::QuotedIdent("createdAt".into()),
                Token::QuotedIdent("we\"ird".into()),
                Token::String("it's".into()),
            ]
        );
    }

    #[test]
    fn test_numbers_and_operators() {
        assert_eq!(
            kinds("1 -2 3.5 <> != <= >="),
            vec![
                Token::Int(1),
                Token::Int(-2),
                Token::Float(3.5),
                Token::Ne,
                Token::Ne,
                Token::Le,
                Token::Ge,
            ]
        );
    }

    #[test]
    fn test_identifiers_prefixed_by_keywords() {
        assert_eq!(kinds("order_id"), vec![Token::Ident("order_id".into())]);
        assert_eq!(kinds("is_active"), vec![Token::Ident("is_active".into())]);
    }

    #[test]
    fn test_invalid_character() {
        let err = tokenize("SELECT # FROM t").unwrap_err();
        assert_eq!(err.span, Span::new(7, 8));
    }
}
