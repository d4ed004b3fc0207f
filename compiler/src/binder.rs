// binder.rs - Lowers parsed binding expressions into the model
//
// A `Binder` owns the model of one layout. Variables and imports are
// declared first; every binding expression is then parsed and lowered
// bottom-up, so equal sub-expressions across bindings share one node.
//
// Name resolution for a bare identifier, in order:
//   1. a declared variable;
//   2. an import alias (static receiver);
//   3. a class known to the resolver (static receiver).
// A dotted chain such as `android.view.View.VISIBLE` resolves its longest
// class-name prefix to a static receiver. `a ?? b` lowers to
// `a == null ? b : a`. Parentheses leave no node behind.
//
// Preconditions: variables and imports are declared before the bindings
//                that use them.
// Postconditions: each lowered root is marked as a binding and classified.
// Failure modes: syntax errors, unknown identifiers and unresolved members
//                are returned as `Diagnostic`s.
// Side effects: none.

use indexmap::IndexMap;

use crate::analyzer::{names, TypeResolver};
use crate::ast::{self, BinaryOp, ExprKind, Span};
use crate::diag::{codes, Diagnostic};
use crate::expr::{CompareOp, ExprId};
use crate::model::{Model, ModelError};
use crate::parser;

pub struct Binder<'r> {
    model: Model,
    resolver: &'r dyn TypeResolver,
    variables: IndexMap<String, ExprId>,
}

impl<'r> Binder<'r> {
    pub fn new(resolver: &'r dyn TypeResolver) -> Self {
        Self {
            model: Model::new(),
            resolver,
            variables: IndexMap::new(),
        }
    }

    /// Declare a layout variable of type `type_name`.
    pub fn add_variable(&mut self, name: &str, type_name: &str) -> Result<ExprId, ModelError> {
        let id = self.model.declare_variable(name, type_name)?;
        self.variables.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn add_import(&mut self, alias: &str, qualified: &str) -> Result<ExprId, ModelError> {
        self.model.add_import(alias, qualified)
    }

    /// Parse `source`, lower it into the model and mark it as a binding.
    pub fn parse(&mut self, source: &str) -> Result<ExprId, Diagnostic> {
        let result = parser::parse(source);
        if let Some(first) = result.errors.first() {
            return Err(Diagnostic::from_parse_error(first));
        }
        let expr = result.expr.ok_or_else(|| {
            Diagnostic::error(codes::SYNTAX, (0..source.len()).into(), "empty binding expression")
        })?;

        let root = self.lower(&expr)?;
        self.model
            .bind(root)
            .map_err(|e| Diagnostic::from_model_error(&e, expr.span))?;
        self.model
            .classify(root, self.resolver)
            .map_err(|e| Diagnostic::from_model_error(&e, expr.span))?;
        tracing::trace!(root = %self.model.expr(root).key(), source, "bound expression");
        Ok(root)
    }

    pub fn seal(&mut self) -> Result<(), ModelError> {
        self.model.seal(self.resolver)
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    pub fn into_model(self) -> Model {
        self.model
    }

    // ── Lowering ────────────────────────────────────────────────────────

    fn lower(&mut self, expr: &ast::Expr) -> Result<ExprId, Diagnostic> {
        let span = expr.span;
        let id = match &expr.kind {
            ExprKind::Group(inner) => return self.lower(inner),
            ExprKind::Literal(lit) => self.model.symbol(&lit.text(), lit.type_name()),
            ExprKind::Ident(name) => return self.lower_name(name, span),
            ExprKind::Field { receiver, name } => {
                if let Some(id) = self.static_path(expr)? {
                    return Ok(id);
                }
                let receiver = self.lower(receiver)?;
                self.model.field(receiver, &name.name)
            }
            ExprKind::Call { target, name, args } => {
                let target = self.lower(target)?;
                let mut lowered = Vec::with_capacity(args.len());
                for arg in args {
                    lowered.push(self.lower(arg)?);
                }
                self.model.method_call(target, &name.name, &lowered)
            }
            ExprKind::Unary { op, operand } => {
                let operand = self.lower(operand)?;
                self.model.unary(*op, operand)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.lower(lhs)?;
                let rhs = self.lower(rhs)?;
                match *op {
                    BinaryOp::Math(op) => self.model.math(lhs, op, rhs),
                    BinaryOp::Compare(op) => self.model.comparison(lhs, op, rhs),
                    BinaryOp::Logical(op) => self.model.logical(lhs, op, rhs),
                }
            }
            ExprKind::Ternary {
                predicate,
                if_true,
                if_false,
            } => {
                let predicate = self.lower(predicate)?;
                let if_true = self.lower(if_true)?;
                let if_false = self.lower(if_false)?;
                self.model.ternary(predicate, if_true, if_false)
            }
            ExprKind::Coalesce { lhs, rhs } => {
                let lhs = self.lower(lhs)?;
                let rhs = self.lower(rhs)?;
                self.coalesce(lhs, rhs, span)
            }
        }
        .map_err(|e| Diagnostic::from_model_error(&e, span))?;
        self.model.set_span(id, span);
        Ok(id)
    }

    fn coalesce(&mut self, lhs: ExprId, rhs: ExprId, span: Span) -> Result<ExprId, ModelError> {
        let null = self.model.symbol("null", names::OBJECT)?;
        let is_null = self.model.comparison(lhs, CompareOp::Eq, null)?;
        self.model.set_span(null, span);
        self.model.set_span(is_null, span);
        self.model.ternary(is_null, rhs, lhs)
    }

    fn lower_name(&mut self, name: &str, span: Span) -> Result<ExprId, Diagnostic> {
        if let Some(&id) = self.variables.get(name) {
            self.model.set_span(id, span);
            return Ok(id);
        }
        let qualified = self
            .model
            .imports()
            .get(name)
            .map(str::to_string)
            .unwrap_or_else(|| name.to_string());
        match self.static_receiver(&qualified, span)? {
            Some(id) => Ok(id),
            None => Err(Diagnostic::error(
                codes::UNKNOWN_IDENTIFIER,
                span,
                format!("unknown identifier `{name}`"),
            )
            .with_hint("declare it as a variable or import its class")),
        }
    }

    /// Static receiver for a dotted class name such as `android.view.View`.
    fn static_path(&mut self, expr: &ast::Expr) -> Result<Option<ExprId>, Diagnostic> {
        let Some(path) = dotted_path(expr) else {
            return Ok(None);
        };
        let root = path.split('.').next().unwrap_or_default();
        if self.variables.contains_key(root) || self.model.imports().get(root).is_some() {
            return Ok(None);
        }
        self.static_receiver(&path, expr.span)
    }

    fn static_receiver(&mut self, qualified: &str, span: Span) -> Result<Option<ExprId>, Diagnostic> {
        let Ok(class) = self.resolver.find_class(qualified) else {
            return Ok(None);
        };
        let id = self
            .model
            .static_identifier_for(&class)
            .map_err(|e| Diagnostic::from_model_error(&e, span))?;
        self.model.set_span(id, span);
        Ok(Some(id))
    }
}

/// `a.b.c` for a chain of plain names, `None` for anything else.
fn dotted_path(expr: &ast::Expr) -> Option<String> {
    match &expr.kind {
        ExprKind::Ident(name) => Some(name.clone()),
        ExprKind::Field { receiver, name } => {
            dotted_path(receiver).map(|prefix| format!("{prefix}.{}", name.name))
        }
        _ => None,
    }
}
