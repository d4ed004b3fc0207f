// Lexer for binding expressions.
//
// Tokenizes the expression text found in layout attributes, e.g.
// `user.name ?? "anonymous"` or `a > 3 ? a.b : view.getTag(1)`.
// Token rules are logos derives; string and char literals are unescaped in
// callbacks.
//
// Preconditions: none beyond `&str`.
// Postconditions: every byte of the source is covered by a token, skipped
//                 whitespace or a `LexError`.
// Failure modes: stray characters and malformed escapes become `LexError`s
//                and the lexer resumes after them.
// Side effects: none.

use logos::Logos;
use std::fmt;

/// Byte range of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Why a character sequence produced no token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LexErrorKind {
    #[default]
    UnexpectedCharacter,
    IntegerOutOfRange,
}

/// A character sequence no token rule accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Span,
    pub kind: LexErrorKind,
    pub message: String,
}

/// Tokens in source order, and the errors met on the way.
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<(Token, Span)>,
    pub errors: Vec<LexError>,
}

/// Binding expression tokens.
///
/// Identifiers carry no value; use the span to retrieve the text.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(error = LexErrorKind)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    // ── Keywords ──
    #[token("null")]
    Null,
    #[token("true")]
    True,
    #[token("false")]
    False,

    // ── Operators ──
    #[token("??")]
    Coalesce,
    #[token("?")]
    Question,
    #[token(":")]
    Colon,
    #[token("||")]
    OrOr,
    #[token("&&")]
    AndAnd,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("!")]
    Bang,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,

    // ── Literals ──
    /// Floating literal, optional `f`/`d` suffix.
    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?[fFdD]?", parse_float)]
    Float(f64),

    /// Integer literal, optional `L` suffix.
    #[regex(r"[0-9]+[lL]?", parse_int)]
    Int(i64),

    /// String literal in double quotes or backticks.
    #[regex(r#""([^"\\]|\\.)*""#, parse_string)]
    #[regex(r"`([^`\\]|\\.)*`", parse_string)]
    Str(String),

    /// Character literal.
    #[regex(r"'([^'\\]|\\.)'", parse_char)]
    Char(char),

    // ── Identifier ──
    #[regex(r"[a-zA-Z_$][a-zA-Z0-9_$]*")]
    Ident,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Null => write!(f, "null"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Coalesce => write!(f, "??"),
            Token::Question => write!(f, "?"),
            Token::Colon => write!(f, ":"),
            Token::OrOr => write!(f, "||"),
            Token::AndAnd => write!(f, "&&"),
            Token::EqEq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::LtEq => write!(f, "<="),
            Token::GtEq => write!(f, ">="),
            Token::Lt => write!(f, "<"),
            Token::Gt => write!(f, ">"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Bang => write!(f, "!"),
            Token::Dot => write!(f, "."),
            Token::Comma => write!(f, ","),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Float(v) => write!(f, "{v}"),
            Token::Int(v) => write!(f, "{v}"),
            Token::Str(s) => write!(f, "\"{s}\""),
            Token::Char(c) => write!(f, "'{c}'"),
            Token::Ident => write!(f, "<ident>"),
        }
    }
}

// ── Callbacks ──

fn parse_float(lex: &mut logos::Lexer<'_, Token>) -> Option<f64> {
    lex.slice()
        .trim_end_matches(|c: char| matches!(c, 'f' | 'F' | 'd' | 'D'))
        .parse()
        .ok()
}

fn parse_int(lex: &mut logos::Lexer<'_, Token>) -> Result<i64, LexErrorKind> {
    lex.slice()
        .trim_end_matches(|c: char| matches!(c, 'l' | 'L'))
        .parse()
        .map_err(|_| LexErrorKind::IntegerOutOfRange)
}

fn parse_string(lex: &mut logos::Lexer<'_, Token>) -> Option<String> {
    let slice = lex.slice();
    unescape(&slice[1..slice.len() - 1])
}

fn parse_char(lex: &mut logos::Lexer<'_, Token>) -> Option<char> {
    let slice = lex.slice();
    let unescaped = unescape(&slice[1..slice.len() - 1])?;
    let mut chars = unescaped.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

fn unescape(inner: &str) -> Option<String> {
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next()? {
            'n' => result.push('\n'),
            't' => result.push('\t'),
            c @ ('"' | '\'' | '`' | '\\') => result.push(c),
            _ => return None,
        }
    }
    Some(result)
}

// ── Public API ──

/// Lex a binding expression. Never fails outright: bad input shows up in
/// `errors` and lexing resumes after it.
pub fn lex(source: &str) -> LexResult {
    let mut result = LexResult {
        tokens: Vec::new(),
        errors: Vec::new(),
    };
    for (token, range) in Token::lexer(source).spanned() {
        let span = Span {
            start: range.start,
            end: range.end,
        };
        match token {
            Ok(token) => result.tokens.push((token, span)),
            Err(kind) => {
                let text = &source[range];
                let message = match kind {
                    LexErrorKind::UnexpectedCharacter => format!("unexpected character: {text:?}"),
                    LexErrorKind::IntegerOutOfRange => format!("integer literal out of range: {text}"),
                };
                result.errors.push(LexError { span, kind, message });
            }
        }
    }
    result
}

// ── Tests ──
