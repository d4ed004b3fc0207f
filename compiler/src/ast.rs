// AST node types for binding expressions.
//
// The parser produces one `Expr` tree per binding. Trees are unregistered:
// nothing is deduplicated or resolved until the binder lowers them into the
// model. Every node carries a `SimpleSpan` for error reporting.
//
// Preconditions: produced by the parser from a valid or partially-valid token stream.
// Postconditions: each node's span covers the source range of the construct.
// Failure modes: none (data-only module).
// Side effects: none.

use std::fmt;

use chumsky::span::SimpleSpan;

use crate::analyzer::names;
pub use crate::expr::{CompareOp, LogicalOp, MathOp, UnaryOp};

/// Byte-offset span (alias for chumsky's `SimpleSpan`).
pub type Span = SimpleSpan;

/// Identifier with its source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Ident(String),
    Field {
        receiver: Box<Expr>,
        name: Ident,
    },
    Call {
        target: Box<Expr>,
        name: Ident,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Ternary {
        predicate: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
    },
    /// `lhs ?? rhs`
    Coalesce {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Parenthesised expression.
    Group(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Math(MathOp),
    Compare(CompareOp),
    Logical(LogicalOp),
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Math(op) => op.symbol(),
            BinaryOp::Compare(op) => op.symbol(),
            BinaryOp::Logical(op) => op.symbol(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Char(char),
}

impl Literal {
    /// Normalised source text, so `"a"` and `` `a` `` are the same literal.
    pub fn text(&self) -> String {
        match self {
            Literal::Null => "null".to_string(),
            Literal::Bool(b) => b.to_string(),
            Literal::Int(n) => n.to_string(),
            Literal::Float(v) => format!("{v:?}"),
            Literal::Str(s) => format!("{s:?}"),
            Literal::Char(c) => format!("{c:?}"),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Literal::Null => names::OBJECT,
            Literal::Bool(_) => names::BOOLEAN,
            Literal::Int(_) => names::INT,
            Literal::Float(_) => names::DOUBLE,
            Literal::Str(_) => names::STRING,
            Literal::Char(_) => names::CHAR,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Literal(lit) => f.write_str(&lit.text()),
            ExprKind::Ident(name) => f.write_str(name),
            ExprKind::Field { receiver, name } => write!(f, "{receiver}.{}", name.name),
            ExprKind::Call { target, name, args } => {
                write!(f, "{target}.{}(", name.name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            ExprKind::Unary { op, operand } => write!(f, "{}{operand}", op.symbol()),
            ExprKind::Binary { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
            ExprKind::Ternary {
                predicate,
                if_true,
                if_false,
            } => write!(f, "({predicate} ? {if_true} : {if_false})"),
            ExprKind::Coalesce { lhs, rhs } => write!(f, "({lhs} ?? {rhs})"),
            ExprKind::Group(inner) => write!(f, "{inner}"),
        }
    }
}
