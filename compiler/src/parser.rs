// Parser for binding expressions.
//
// Parses a token stream (from the lexer) into an `ast::Expr`. Uses chumsky
// combinators. Precedence, loosest first: `?:`, `??`, `||`, `&&`,
// equality, relational, additive, multiplicative, unary, member access.
//
// Preconditions: input is a valid token stream from `lexer::lex()`.
// Postconditions: returns an AST plus any parse errors (non-fatal).
// Failure modes: syntax errors produce `Rich` diagnostics.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::ast::*;
use crate::lexer::Token;

/// Result of parsing: AST plus any errors.
#[derive(Debug)]
pub struct ParseResult {
    pub expr: Option<Expr>,
    pub errors: Vec<Rich<'static, Token, SimpleSpan>>,
}

/// Parse a binding expression. Lexes then parses.
pub fn parse(source: &str) -> ParseResult {
    let lex_result = crate::lexer::lex(source);
    let len = source.len();

    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let parser = expr_parser(source).then_ignore(end());
    let (expr, parse_errors) = parser.parse(stream).into_output_errors();

    let mut all_errors: Vec<Rich<'static, Token, SimpleSpan>> = lex_result
        .errors
        .into_iter()
        .map(|e| {
            let span: SimpleSpan = (e.span.start..e.span.end).into();
            Rich::custom(span, e.message)
        })
        .collect();
    all_errors.extend(parse_errors.into_iter().map(|e| e.into_owned()));

    ParseResult {
        expr,
        errors: all_errors,
    }
}

fn join(lhs: SimpleSpan, rhs: SimpleSpan) -> SimpleSpan {
    (lhs.start()..rhs.end()).into()
}

fn fold_binary(lhs: Expr, (op, rhs): (BinaryOp, Expr)) -> Expr {
    Expr {
        span: join(lhs.span, rhs.span),
        kind: ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
    }
}

// ── Grammar ──
//
// Every rule is built inside `expr_parser` so the `source` reference is
// captured once and shared by all combinators.

fn expr_parser<'tokens, 'src: 'tokens, I>(
    source: &'src str,
) -> impl Parser<'tokens, I, Expr, extra::Err<Rich<'tokens, Token, SimpleSpan>>> + 'src
where
    'tokens: 'src,
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    let ident = just(Token::Ident).map_with(move |_, e| {
        let span: SimpleSpan = e.span();
        Ident {
            name: source[span.start()..span.end()].to_string(),
            span,
        }
    });

    recursive(move |expr| {
        let literal = select! {
            Token::Null => Literal::Null,
            Token::True => Literal::Bool(true),
            Token::False => Literal::Bool(false),
            Token::Int(n) => Literal::Int(n),
            Token::Float(v) => Literal::Float(v),
            Token::Str(s) => Literal::Str(s),
            Token::Char(c) => Literal::Char(c),
        }
        .map_with(|lit, e| Expr {
            kind: ExprKind::Literal(lit),
            span: e.span(),
        });

        let name_ref = ident.clone().map(|id: Ident| Expr {
            span: id.span,
            kind: ExprKind::Ident(id.name),
        });

        let group = expr
            .clone()
            .delimited_by(just(Token::LParen), just(Token::RParen))
            .map_with(|inner, e| Expr {
                kind: ExprKind::Group(Box::new(inner)),
                span: e.span(),
            });

        let atom = literal.or(name_ref).or(group);

        // ── Member access and calls ──

        let args = expr
            .clone()
            .separated_by(just(Token::Comma))
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LParen), just(Token::RParen));

        let member = just(Token::Dot)
            .ignore_then(ident.clone())
            .then(args.or_not())
            .map_with(|(name, args), e| (name, args, e.span()));

        let postfix = atom
            .foldl(
                member.repeated(),
                |receiver: Expr, (name, args, span): (Ident, Option<Vec<Expr>>, SimpleSpan)| {
                    let span = join(receiver.span, span);
                    let kind = match args {
                        Some(args) => ExprKind::Call {
                            target: Box::new(receiver),
                            name,
                            args,
                        },
                        None => ExprKind::Field {
                            receiver: Box::new(receiver),
                            name,
                        },
                    };
                    Expr { kind, span }
                },
            )
            .boxed();

        // ── Unary ──

        let unary_op = select! {
            Token::Bang => UnaryOp::Not,
            Token::Minus => UnaryOp::Neg,
        }
        .map_with(|op, e| (op, e.span()));

        let unary = unary_op
            .repeated()
            .foldr(postfix, |(op, span): (UnaryOp, SimpleSpan), operand: Expr| Expr {
                span: join(span, operand.span),
                kind: ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
            })
            .boxed();

        // ── Binary levels ──

        let product_op = select! {
            Token::Star => BinaryOp::Math(MathOp::Mul),
            Token::Slash => BinaryOp::Math(MathOp::Div),
            Token::Percent => BinaryOp::Math(MathOp::Rem),
        };
        let product = unary
            .clone()
            .foldl(product_op.then(unary).repeated(), fold_binary)
            .boxed();

        let sum_op = select! {
            Token::Plus => BinaryOp::Math(MathOp::Add),
            Token::Minus => BinaryOp::Math(MathOp::Sub),
        };
        let sum = product
            .clone()
            .foldl(sum_op.then(product).repeated(), fold_binary)
            .boxed();

        let relational_op = select! {
            Token::Lt => BinaryOp::Compare(CompareOp::Lt),
            Token::LtEq => BinaryOp::Compare(CompareOp::Le),
            Token::Gt => BinaryOp::Compare(CompareOp::Gt),
            Token::GtEq => BinaryOp::Compare(CompareOp::Ge),
        };
        let relational = sum
            .clone()
            .foldl(relational_op.then(sum).repeated(), fold_binary)
            .boxed();

        let equality_op = select! {
            Token::EqEq => BinaryOp::Compare(CompareOp::Eq),
            Token::NotEq => BinaryOp::Compare(CompareOp::Ne),
        };
        let equality = relational
            .clone()
            .foldl(equality_op.then(relational).repeated(), fold_binary)
            .boxed();

        let and_op = just(Token::AndAnd).to(BinaryOp::Logical(LogicalOp::And));
        let and = equality
            .clone()
            .foldl(and_op.then(equality).repeated(), fold_binary)
            .boxed();

        let or_op = just(Token::OrOr).to(BinaryOp::Logical(LogicalOp::Or));
        let or = and
            .clone()
            .foldl(or_op.then(and).repeated(), fold_binary)
            .boxed();

        let coalesce = or
            .clone()
            .foldl(
                just(Token::Coalesce).ignore_then(or).repeated(),
                |lhs: Expr, rhs: Expr| Expr {
                    span: join(lhs.span, rhs.span),
                    kind: ExprKind::Coalesce {
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                },
            )
            .boxed();

        // ── Ternary (right associative) ──

        let branches = just(Token::Question)
            .ignore_then(expr.clone())
            .then_ignore(just(Token::Colon))
            .then(expr.clone());

        coalesce
            .then(branches.or_not())
            .map(|(predicate, branches)| match branches {
                None => predicate,
                Some((if_true, if_false)) => Expr {
                    span: join(predicate.span, if_false.span),
                    kind: ExprKind::Ternary {
                        predicate: Box::new(predicate),
                        if_true: Box::new(if_true),
                        if_false: Box::new(if_false),
                    },
                },
            })
    })
}

// ── Tests ──
