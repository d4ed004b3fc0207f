// expr.rs - Expression nodes of the binding model
//
// Every registered expression is one `Expr` record in the model's arena,
// addressed by `ExprId`. Children are ids the node depends on structurally,
// parents are back-references kept only so classification can rewrite the
// graph. Kind-specific data lives in `ExprKind`; the flag machinery is
// shared by all kinds.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use crate::analyzer::{Callable, ModelClass};
use crate::ast::Span;
use crate::flags::{requirement_flag, Flag, FlagSet};

/// Index of a node in the model arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(pub u32);

impl ExprId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

// ── Operators ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MathOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Neg,
}

impl MathOp {
    pub fn symbol(self) -> &'static str {
        match self {
            MathOp::Add => "+",
            MathOp::Sub => "-",
            MathOp::Mul => "*",
            MathOp::Div => "/",
            MathOp::Rem => "%",
        }
    }
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

impl LogicalOp {
    pub fn symbol(self) -> &'static str {
        match self {
            LogicalOp::And => "&&",
            LogicalOp::Or => "||",
        }
    }

    /// Value of the left operand under which the right one is evaluated.
    pub fn continues_on(self) -> bool {
        matches!(self, LogicalOp::And)
    }
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Neg => "-",
        }
    }
}

// ── Node kinds ──────────────────────────────────────────────────────────────

/// Kind-specific payload. Child layout per kind is fixed:
///
/// | kind           | children                      |
/// |----------------|-------------------------------|
/// | `FieldAccess`  | `[receiver]`                  |
/// | `MethodCall`   | `[target, args..]`            |
/// | binary kinds   | `[lhs, rhs]`                  |
/// | `Unary`        | `[operand]`                   |
/// | `Ternary`      | `[predicate, if_true, if_false]` |
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
    /// A layout variable.
    Identifier { name: String },
    /// `unwrap` marks the inner read of an observable wrapper produced when
    /// a field access is split.
    FieldAccess { name: String, unwrap: bool },
    MethodCall { name: String },
    Math(MathOp),
    Comparison(CompareOp),
    Logical(LogicalOp),
    Unary(UnaryOp),
    Ternary,
    /// A class used as a static receiver, reached through an import alias.
    StaticIdentifier { alias: String, qualified: String },
    /// A literal, with its source text and type.
    Symbol { text: String, type_name: String },
}

impl ExprKind {
    /// Ternaries and short-circuit operators: their branches only run for
    /// one value of the predicate.
    pub fn is_conditional(&self) -> bool {
        matches!(self, ExprKind::Ternary | ExprKind::Logical(_))
    }

    /// Canonical key from the kind and the keys of the children, in order.
    pub fn unique_key(&self, children: &[&str]) -> String {
        let child = |i: usize| children.get(i).copied().unwrap_or("");
        match self {
            ExprKind::Identifier { name } => name.clone(),
            ExprKind::FieldAccess { name, unwrap } => {
                let sep = if *unwrap { ".." } else { "." };
                format!("{}{sep}{name}", child(0))
            }
            ExprKind::MethodCall { name } => {
                let args = children.get(1..).unwrap_or_default().join(", ");
                format!("{}.{name}({args})", child(0))
            }
            ExprKind::Math(op) => format!("({} {} {})", child(0), op.symbol(), child(1)),
            ExprKind::Comparison(op) => format!("({} {} {})", child(0), op.symbol(), child(1)),
            ExprKind::Logical(op) => format!("({} {} {})", child(0), op.symbol(), child(1)),
            ExprKind::Unary(op) => format!("{}{}", op.symbol(), child(0)),
            ExprKind::Ternary => format!("({} ? {} : {})", child(0), child(1), child(2)),
            ExprKind::StaticIdentifier { qualified, .. } => format!("static:{qualified}"),
            ExprKind::Symbol { text, .. } => text.clone(),
        }
    }
}

// ── Dependencies ────────────────────────────────────────────────────────────

/// Condition under which a dependency applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guard {
    pub predicate: ExprId,
    pub branch: bool,
}

/// Edge from a node to a node whose value it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    pub target: ExprId,
    /// The target's value must be computed in the same step, before the
    /// dependant (receivers, predicates).
    pub mandatory: bool,
    pub guard: Option<Guard>,
    /// Set once the guard's predicate has been read, so the branch
    /// requirement can reach the target.
    pub(crate) elevated: bool,
}

impl Dependency {
    pub fn unconditional(target: ExprId, mandatory: bool) -> Self {
        Self {
            target,
            mandatory,
            guard: None,
            elevated: false,
        }
    }

    pub fn guarded(target: ExprId, predicate: ExprId, branch: bool) -> Self {
        Self {
            target,
            mandatory: false,
            guard: Some(Guard { predicate, branch }),
            elevated: false,
        }
    }

    pub fn is_elevated(&self) -> bool {
        self.elevated
    }

    /// A guarded edge whose predicate is not known yet.
    pub fn is_pending_guard(&self) -> bool {
        self.guard.is_some() && !self.elevated
    }
}

/// Back-reference from a dependency target to the edge pointing at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependantRef {
    pub dependant: ExprId,
    pub edge: usize,
}

// ── Node record ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Expr {
    pub(crate) id: ExprId,
    pub(crate) kind: ExprKind,
    pub(crate) key: String,
    pub(crate) children: Vec<ExprId>,
    pub(crate) parents: Vec<ExprId>,
    pub(crate) span: Option<Span>,
    /// Declared type of a variable or literal, or qualified name of a
    /// static identifier.
    pub(crate) declared_type: Option<String>,
    pub(crate) binding: bool,
    pub(crate) resolved_type: Option<ModelClass>,
    pub(crate) callable: Option<Callable>,
    pub(crate) dynamic: Option<bool>,
    pub(crate) flag: Option<Flag>,
    pub(crate) requirement_base: Option<Flag>,
    pub(crate) dependencies: Vec<Dependency>,
    pub(crate) dependants: Vec<DependantRef>,
    pub(crate) invalid: FlagSet,
    pub(crate) conditional_read: FlagSet,
    pub(crate) should_read: FlagSet,
    pub(crate) read_so_far: FlagSet,
    pub(crate) read: bool,
}

impl Expr {
    pub(crate) fn new(id: ExprId, kind: ExprKind, key: String, children: Vec<ExprId>) -> Self {
        Self {
            id,
            kind,
            key,
            children,
            parents: Vec::new(),
            span: None,
            declared_type: None,
            binding: false,
            resolved_type: None,
            callable: None,
            dynamic: None,
            flag: None,
            requirement_base: None,
            dependencies: Vec::new(),
            dependants: Vec::new(),
            invalid: FlagSet::new(),
            conditional_read: FlagSet::new(),
            should_read: FlagSet::new(),
            read_so_far: FlagSet::new(),
            read: false,
        }
    }

    pub fn id(&self) -> ExprId {
        self.id
    }

    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn children(&self) -> &[ExprId] {
        &self.children
    }

    pub fn parents(&self) -> &[ExprId] {
        &self.parents
    }

    pub fn span(&self) -> Option<Span> {
        self.span
    }

    /// Root of a parsed binding, consumed by generated code.
    pub fn is_binding(&self) -> bool {
        self.binding
    }

    pub fn resolved_type(&self) -> Option<&ModelClass> {
        self.resolved_type.as_ref()
    }

    /// Member a field access or method call resolved to.
    pub fn callable(&self) -> Option<&Callable> {
        self.callable.as_ref()
    }

    /// Memoized classification; false until classified.
    pub fn is_dynamic(&self) -> bool {
        self.dynamic.unwrap_or(false)
    }

    /// Direct invalidation flag, if the node can be invalidated on its own.
    pub fn flag(&self) -> Option<Flag> {
        self.flag
    }

    pub fn requirement_flag(&self, branch: bool) -> Option<Flag> {
        self.requirement_base
            .map(|base| requirement_flag(base, branch))
    }

    pub fn is_conditional(&self) -> bool {
        self.kind.is_conditional()
    }

    /// Predicate of a conditional.
    pub fn predicate(&self) -> Option<ExprId> {
        if self.is_conditional() {
            self.children.first().copied()
        } else {
            None
        }
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn dependants(&self) -> &[DependantRef] {
        &self.dependants
    }

    pub fn invalid_flags(&self) -> &FlagSet {
        &self.invalid
    }

    /// Every flag under which any consumer may need this node, with branch
    /// requirements standing in for guarded consumers.
    pub fn should_read_with_conditionals(&self) -> &FlagSet {
        &self.conditional_read
    }

    pub fn should_read_flags(&self) -> &FlagSet {
        &self.should_read
    }

    pub fn read_so_far(&self) -> &FlagSet {
        &self.read_so_far
    }

    /// Fully read: no consumer can need it again.
    pub fn is_read(&self) -> bool {
        self.read
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}
