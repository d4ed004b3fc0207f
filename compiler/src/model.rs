// model.rs - Expression graph: registration, classification, sealing
//
// The model owns every expression of one layout in an arena. Registration
// deduplicates by unique key. Classification resolves member accesses
// through a `TypeResolver` and may rewrite the graph (static receivers,
// observable wrappers). Sealing assigns flags, builds dependency edges and
// computes the invalid and conditional-read sets the scheduler works from.
//
// Preconditions: every registered variable has a declared type before seal.
// Postconditions: after `seal`, the structure is frozen and every node has
//                 its dependencies, invalid flags and initial should-read set.
// Failure modes: unresolvable members (`ModelError::Resolution`); misuse of
//                the lifecycle (seal twice, registering after seal).
// Side effects: none.

use indexmap::IndexMap;
use thiserror::Error;

use crate::analyzer::{names, CallableKind, ModelClass, ResolveError, TypeResolver};
use crate::ast::Span;
use crate::expr::{
    CompareOp, DependantRef, Dependency, Expr, ExprId, ExprKind, LogicalOp, MathOp, UnaryOp,
};
use crate::flags::{Flag, FlagAllocator, FlagPurpose, FlagSet};
use crate::imports::ImportRegistry;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model is already sealed")]
    AlreadySealed,
    #[error("model must be sealed before scheduling")]
    NotSealed,
    #[error("cannot register `{key}`: the model is sealed")]
    RegisterAfterSeal { key: String },
    #[error("cannot resolve `{key}`: {source}")]
    Resolution {
        key: String,
        span: Option<Span>,
        #[source]
        source: ResolveError,
    },
    #[error("`{key}` is not dynamic and cannot be scheduled")]
    NotDynamic { key: String },
    #[error("dependency cycle through `{key}`")]
    DependencyCycle { key: String },
    #[error("no read order exists within the pass for: {}", .keys.join(", "))]
    OrderingCycle { keys: Vec<String> },
}

/// Expression graph of one layout.
#[derive(Debug, Default)]
pub struct Model {
    exprs: Vec<Expr>,
    by_key: IndexMap<String, ExprId>,
    imports: ImportRegistry,
    flags: FlagAllocator,
    invalidate_all: Option<Flag>,
    invalidateable_limit: usize,
    /// Dependency targets before their dependants. Filled at seal.
    order: Vec<ExprId>,
    sealed: bool,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    pub fn get(&self, id: ExprId) -> Option<&Expr> {
        self.exprs.get(id.index())
    }

    /// Node registered under `key`.
    pub fn find(&self, key: &str) -> Option<ExprId> {
        self.by_key.get(key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Expr> {
        self.exprs.iter()
    }

    pub fn bindings(&self) -> impl Iterator<Item = ExprId> + '_ {
        self.exprs.iter().filter(|e| e.binding).map(|e| e.id)
    }

    pub fn imports(&self) -> &ImportRegistry {
        &self.imports
    }

    pub fn flags(&self) -> &FlagAllocator {
        &self.flags
    }

    /// Number of dirty bits generated code must allocate.
    pub fn flag_count(&self) -> usize {
        self.flags.len()
    }

    pub fn invalidate_all_flag(&self) -> Option<Flag> {
        self.invalidate_all
    }

    /// Flags below this limit are invalidated from outside; the rest are
    /// branch requirements.
    pub fn invalidateable_limit(&self) -> usize {
        self.invalidateable_limit
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Readable name of a flag: the key of what it invalidates.
    pub fn flag_name(&self, flag: Flag) -> String {
        match self.flags.purpose(flag) {
            Some(FlagPurpose::Invalidation(id)) => self.expr(id).key.clone(),
            Some(FlagPurpose::InvalidateAll) => "INVALIDATE ANY".to_string(),
            Some(FlagPurpose::Requirement { expr, branch }) => {
                let suffix = if branch { "TRUE" } else { "FALSE" };
                format!("{} {suffix}", self.expr(expr).key)
            }
            None => format!("#{flag}"),
        }
    }

    /// Dynamic nodes that still have flags to read.
    pub fn pending_expressions(&self) -> Result<Vec<ExprId>, ModelError> {
        self.ensure_sealed()?;
        Ok(self
            .exprs
            .iter()
            .filter(|e| e.is_dynamic() && !e.read && !e.should_read.is_empty())
            .map(|e| e.id)
            .collect())
    }

    // ── Registration ────────────────────────────────────────────────────

    /// Canonical node for `kind` over `children`. Returns the existing node
    /// when the key is already registered.
    pub fn register(&mut self, kind: ExprKind, children: Vec<ExprId>) -> Result<ExprId, ModelError> {
        let key = {
            let keys: Vec<&str> = children
                .iter()
                .map(|c| self.exprs[c.index()].key.as_str())
                .collect();
            kind.unique_key(&keys)
        };
        if let Some(existing) = self.find(&key) {
            return Ok(existing);
        }
        if self.sealed {
            return Err(ModelError::RegisterAfterSeal { key });
        }
        let id = ExprId(self.exprs.len() as u32);
        for &child in &children {
            let parents = &mut self.exprs[child.index()].parents;
            if !parents.contains(&id) {
                parents.push(id);
            }
        }
        tracing::trace!(%id, key = %key, "register");
        self.by_key.insert(key.clone(), id);
        self.exprs.push(Expr::new(id, kind, key, children));
        Ok(id)
    }

    pub fn identifier(&mut self, name: &str) -> Result<ExprId, ModelError> {
        self.register(
            ExprKind::Identifier {
                name: name.to_string(),
            },
            Vec::new(),
        )
    }

    /// Identifier of a layout variable with its declared type.
    pub fn declare_variable(&mut self, name: &str, type_name: &str) -> Result<ExprId, ModelError> {
        let id = self.identifier(name)?;
        self.ensure_open()?;
        self.exprs[id.index()].declared_type = Some(type_name.to_string());
        Ok(id)
    }

    pub fn field(&mut self, receiver: ExprId, name: &str) -> Result<ExprId, ModelError> {
        self.register(
            ExprKind::FieldAccess {
                name: name.to_string(),
                unwrap: false,
            },
            vec![receiver],
        )
    }

    pub fn method_call(
        &mut self,
        target: ExprId,
        name: &str,
        args: &[ExprId],
    ) -> Result<ExprId, ModelError> {
        let mut children = Vec::with_capacity(args.len() + 1);
        children.push(target);
        children.extend_from_slice(args);
        self.register(
            ExprKind::MethodCall {
                name: name.to_string(),
            },
            children,
        )
    }

    pub fn math(&mut self, lhs: ExprId, op: MathOp, rhs: ExprId) -> Result<ExprId, ModelError> {
        self.register(ExprKind::Math(op), vec![lhs, rhs])
    }

    pub fn comparison(&mut self, lhs: ExprId, op: CompareOp, rhs: ExprId) -> Result<ExprId, ModelError> {
        self.register(ExprKind::Comparison(op), vec![lhs, rhs])
    }

    pub fn logical(&mut self, lhs: ExprId, op: LogicalOp, rhs: ExprId) -> Result<ExprId, ModelError> {
        self.register(ExprKind::Logical(op), vec![lhs, rhs])
    }

    pub fn unary(&mut self, op: UnaryOp, operand: ExprId) -> Result<ExprId, ModelError> {
        self.register(ExprKind::Unary(op), vec![operand])
    }

    pub fn ternary(
        &mut self,
        predicate: ExprId,
        if_true: ExprId,
        if_false: ExprId,
    ) -> Result<ExprId, ModelError> {
        self.register(ExprKind::Ternary, vec![predicate, if_true, if_false])
    }

    /// Literal with its source text and type.
    pub fn symbol(&mut self, text: &str, type_name: &str) -> Result<ExprId, ModelError> {
        let id = self.register(
            ExprKind::Symbol {
                text: text.to_string(),
                type_name: type_name.to_string(),
            },
            Vec::new(),
        )?;
        self.exprs[id.index()].declared_type = Some(type_name.to_string());
        Ok(id)
    }

    /// Import `qualified` under `alias` (renamed on collision) and return its
    /// static identifier.
    pub fn add_import(&mut self, alias: &str, qualified: &str) -> Result<ExprId, ModelError> {
        self.ensure_open()?;
        let alias = self.imports.add(alias, qualified);
        self.static_identifier(alias, qualified)
    }

    /// Static identifier for `class`, importing it on demand.
    pub fn static_identifier_for(&mut self, class: &ModelClass) -> Result<ExprId, ModelError> {
        let key = static_key(&class.name);
        if let Some(existing) = self.find(&key) {
            return Ok(existing);
        }
        if self.sealed {
            return Err(ModelError::RegisterAfterSeal { key });
        }
        let alias = self.imports.alias_for_type(&class.name, class.simple_name());
        let id = self.static_identifier(alias, &class.name)?;
        let expr = &mut self.exprs[id.index()];
        if expr.resolved_type.is_none() {
            expr.resolved_type = Some(class.clone());
        }
        Ok(id)
    }

    fn static_identifier(&mut self, alias: String, qualified: &str) -> Result<ExprId, ModelError> {
        let id = self.register(
            ExprKind::StaticIdentifier {
                alias,
                qualified: qualified.to_string(),
            },
            Vec::new(),
        )?;
        self.exprs[id.index()].declared_type = Some(qualified.to_string());
        Ok(id)
    }

    /// Mark `id` as the root of a binding consumed by generated code.
    pub fn bind(&mut self, id: ExprId) -> Result<(), ModelError> {
        self.ensure_open()?;
        self.exprs[id.index()].binding = true;
        Ok(())
    }

    /// Record where `id` came from, keeping the first position seen.
    pub(crate) fn set_span(&mut self, id: ExprId, span: Span) {
        let expr = &mut self.exprs[id.index()];
        if expr.span.is_none() {
            expr.span = Some(span);
        }
    }

    // ── Classification ──────────────────────────────────────────────────

    /// Resolve the type of `id`, rewriting static receivers and observable
    /// wrappers on the way. Memoized.
    pub fn resolve(&mut self, id: ExprId, resolver: &dyn TypeResolver) -> Result<ModelClass, ModelError> {
        if let Some(class) = &self.exprs[id.index()].resolved_type {
            return Ok(class.clone());
        }
        let kind = self.exprs[id.index()].kind.clone();
        let children = self.exprs[id.index()].children.clone();
        let class = match kind {
            ExprKind::Identifier { name } => {
                let declared = self.exprs[id.index()]
                    .declared_type
                    .clone()
                    .ok_or_else(|| self.resolution_error(id, ResolveError::Untyped(name)))?;
                self.find_class(id, &declared, resolver)?
            }
            ExprKind::StaticIdentifier { qualified, .. } => self.find_class(id, &qualified, resolver)?,
            ExprKind::Symbol { type_name, .. } => self.find_class(id, &type_name, resolver)?,
            ExprKind::FieldAccess { name, .. } => self.resolve_field(id, &name, resolver)?,
            ExprKind::MethodCall { name } => self.resolve_method(id, &name, resolver)?,
            ExprKind::Math(op) => {
                let lhs = self.resolve(children[0], resolver)?;
                let rhs = self.resolve(children[1], resolver)?;
                math_type(op, lhs, rhs)
            }
            ExprKind::Comparison(_) | ExprKind::Logical(_) | ExprKind::Unary(UnaryOp::Not) => {
                for child in children {
                    self.resolve(child, resolver)?;
                }
                ModelClass::plain(names::BOOLEAN)
            }
            ExprKind::Unary(UnaryOp::Neg) => self.resolve(children[0], resolver)?,
            ExprKind::Ternary => {
                self.resolve(children[0], resolver)?;
                let if_true = self.resolve(children[1], resolver)?;
                let if_false = self.resolve(children[2], resolver)?;
                if self.is_null_literal(children[1]) {
                    if_false
                } else {
                    if_true
                }
            }
        };
        self.exprs[id.index()].resolved_type = Some(class.clone());
        Ok(class)
    }

    /// Memoized dynamic/static classification of `id`.
    pub fn classify(&mut self, id: ExprId, resolver: &dyn TypeResolver) -> Result<bool, ModelError> {
        if let Some(dynamic) = self.exprs[id.index()].dynamic {
            return Ok(dynamic);
        }
        self.resolve(id, resolver)?;
        let expr = &self.exprs[id.index()];
        let kind = expr.kind.clone();
        let callable = expr.callable.clone();
        let children = expr.children.clone();

        let mut any_child_dynamic = false;
        for &child in &children {
            any_child_dynamic |= self.classify(child, resolver)?;
        }
        let dynamic = match kind {
            ExprKind::Identifier { .. } => true,
            ExprKind::StaticIdentifier { .. } | ExprKind::Symbol { .. } => false,
            ExprKind::MethodCall { .. } => true,
            ExprKind::FieldAccess { .. } => match callable {
                Some(getter) if getter.kind == CallableKind::Field => {
                    let receiver_dynamic = self.exprs[children[0].index()].is_dynamic();
                    if receiver_dynamic {
                        !getter.is_static || getter.is_dynamic
                    } else {
                        getter.is_dynamic
                    }
                }
                _ => true,
            },
            _ => any_child_dynamic,
        };
        self.exprs[id.index()].dynamic = Some(dynamic);
        Ok(dynamic)
    }

    fn resolve_field(&mut self, id: ExprId, name: &str, resolver: &dyn TypeResolver) -> Result<ModelClass, ModelError> {
        let receiver = self.exprs[id.index()].children[0];
        let receiver_class = self.resolve(receiver, resolver)?;
        let static_receiver = self.is_static_identifier(receiver);
        let getter = resolver
            .find_getter_or_field(&receiver_class, name, static_receiver)
            .map_err(|e| self.resolution_error(id, e))?;

        if getter.is_static && !static_receiver {
            let static_id = self.static_identifier_for(&receiver_class)?;
            tracing::debug!(key = %self.exprs[id.index()].key, "static member through instance");
            self.replace_child(id, 0, static_id);
        }

        if !getter.resolved_type.observable_field {
            let class = getter.resolved_type.clone();
            self.exprs[id.index()].callable = Some(getter);
            return Ok(class);
        }

        // Split into the wrapper access and a `get()` read of it.
        let receiver = self.exprs[id.index()].children[0];
        let inner = self.register(
            ExprKind::FieldAccess {
                name: name.to_string(),
                unwrap: true,
            },
            vec![receiver],
        )?;
        let span = self.exprs[id.index()].span;
        let inner_expr = &mut self.exprs[inner.index()];
        if inner_expr.resolved_type.is_none() {
            inner_expr.resolved_type = Some(getter.resolved_type.clone());
            inner_expr.callable = Some(getter.clone());
            inner_expr.span = inner_expr.span.or(span);
        }
        self.replace_child(id, 0, inner);

        let read = resolver
            .find_getter_or_field(&getter.resolved_type, "get", false)
            .map_err(|e| self.resolution_error(id, e))?;
        let class = read.resolved_type.clone();
        tracing::debug!(key = %self.exprs[id.index()].key, wrapper = %getter.resolved_type.name, "observable field split");
        self.exprs[id.index()].callable = Some(read);
        Ok(class)
    }

    fn resolve_method(&mut self, id: ExprId, name: &str, resolver: &dyn TypeResolver) -> Result<ModelClass, ModelError> {
        let children = self.exprs[id.index()].children.clone();
        let target_class = self.resolve(children[0], resolver)?;
        let mut args = Vec::with_capacity(children.len() - 1);
        for &arg in &children[1..] {
            args.push(self.resolve(arg, resolver)?);
        }
        let static_target = self.is_static_identifier(children[0]);
        let method = resolver
            .find_method(&target_class, name, &args, static_target)
            .map_err(|e| self.resolution_error(id, e))?;

        if method.is_static && !static_target {
            let static_id = self.static_identifier_for(&target_class)?;
            self.replace_child(id, 0, static_id);
        }
        let class = method.resolved_type.clone();
        self.exprs[id.index()].callable = Some(method);
        Ok(class)
    }

    fn find_class(&self, id: ExprId, name: &str, resolver: &dyn TypeResolver) -> Result<ModelClass, ModelError> {
        resolver
            .find_class(name)
            .map_err(|e| self.resolution_error(id, e))
    }

    /// Swap `parent`'s child at `index`, keeping parent links in sync.
    fn replace_child(&mut self, parent: ExprId, index: usize, child: ExprId) {
        let old = self.exprs[parent.index()].children[index];
        if old == child {
            return;
        }
        self.exprs[parent.index()].children[index] = child;
        if !self.exprs[parent.index()].children.contains(&old) {
            self.exprs[old.index()].parents.retain(|p| *p != parent);
        }
        let parents = &mut self.exprs[child.index()].parents;
        if !parents.contains(&parent) {
            parents.push(parent);
        }
    }

    fn is_static_identifier(&self, id: ExprId) -> bool {
        matches!(self.exprs[id.index()].kind, ExprKind::StaticIdentifier { .. })
    }

    fn is_null_literal(&self, id: ExprId) -> bool {
        matches!(&self.exprs[id.index()].kind, ExprKind::Symbol { text, .. } if text == "null")
    }

    fn resolution_error(&self, id: ExprId, source: ResolveError) -> ModelError {
        let expr = &self.exprs[id.index()];
        ModelError::Resolution {
            key: expr.key.clone(),
            span: expr.span,
            source,
        }
    }

    // ── Seal ────────────────────────────────────────────────────────────

    /// Classify every node, allocate flags, build dependencies and compute
    /// the flag sets. One-way.
    pub fn seal(&mut self, resolver: &dyn TypeResolver) -> Result<(), ModelError> {
        if self.sealed {
            return Err(ModelError::AlreadySealed);
        }
        // Classification may register nodes, so the bound moves.
        let mut next = 0;
        while next < self.exprs.len() {
            self.classify(ExprId(next as u32), resolver)?;
            next += 1;
        }

        self.assign_flags();
        self.build_dependencies();
        self.order = self.dependency_order()?;
        self.compute_invalid_flags();
        self.compute_conditional_reads();
        self.sealed = true;
        self.refresh_read_flags();

        tracing::debug!(
            exprs = self.exprs.len(),
            flags = self.flags.len(),
            invalidateable = self.invalidateable_limit,
            "model sealed"
        );
        Ok(())
    }

    fn assign_flags(&mut self) {
        let observables: Vec<ExprId> = self
            .exprs
            .iter()
            .filter(|e| e.is_dynamic() && e.resolved_type.as_ref().is_some_and(|t| t.observable))
            .map(|e| e.id)
            .collect();
        for &id in &observables {
            self.allocate_invalidation(id, "observable");
        }

        let variables: Vec<ExprId> = self
            .exprs
            .iter()
            .filter(|e| matches!(e.kind, ExprKind::Identifier { .. }) && e.flag.is_none())
            .map(|e| e.id)
            .collect();
        for id in variables {
            self.allocate_invalidation(id, "variable");
        }

        for &observable in &observables {
            let parents = self.exprs[observable.index()].parents.clone();
            for parent in parents {
                let expr = &self.exprs[parent.index()];
                let bindable_field = matches!(expr.kind, ExprKind::FieldAccess { .. })
                    && expr.is_dynamic()
                    && expr.callable.as_ref().is_some_and(|c| c.can_be_invalidated());
                if expr.flag.is_none() && bindable_field {
                    self.allocate_invalidation(parent, "bindable field");
                }
            }
        }

        self.invalidate_all = Some(self.flags.allocate(FlagPurpose::InvalidateAll));
        self.invalidateable_limit = self.flags.len();

        for i in 0..self.exprs.len() {
            if self.exprs[i].is_conditional() {
                let id = self.exprs[i].id;
                let base = self.flags.allocate_requirement_pair(id);
                tracing::trace!(key = %self.exprs[i].key, base, "requirement flags");
                self.exprs[i].requirement_base = Some(base);
            }
        }
    }

    fn allocate_invalidation(&mut self, id: ExprId, what: &str) {
        let flag = self.flags.allocate(FlagPurpose::Invalidation(id));
        let expr = &mut self.exprs[id.index()];
        expr.flag = Some(flag);
        tracing::debug!(flag, key = %expr.key, "{what} flag");
    }

    fn build_dependencies(&mut self) {
        for i in 0..self.exprs.len() {
            let expr = &self.exprs[i];
            if !expr.is_dynamic() {
                continue;
            }
            let dynamic = |id: ExprId| self.exprs[id.index()].is_dynamic();
            let children = &expr.children;
            let mut deps = Vec::with_capacity(children.len());
            match &expr.kind {
                ExprKind::Ternary if dynamic(children[0]) => {
                    let predicate = children[0];
                    deps.push(Dependency::unconditional(predicate, true));
                    for (branch, child) in [(true, children[1]), (false, children[2])] {
                        if dynamic(child) {
                            deps.push(Dependency::guarded(child, predicate, branch));
                        }
                    }
                }
                ExprKind::Logical(op) if dynamic(children[0]) => {
                    let predicate = children[0];
                    deps.push(Dependency::unconditional(predicate, true));
                    if dynamic(children[1]) {
                        deps.push(Dependency::guarded(children[1], predicate, op.continues_on()));
                    }
                }
                ExprKind::FieldAccess { .. } | ExprKind::MethodCall { .. } => {
                    for (index, &child) in children.iter().enumerate() {
                        if dynamic(child) {
                            deps.push(Dependency::unconditional(child, index == 0));
                        }
                    }
                }
                _ => {
                    for &child in children {
                        if dynamic(child) {
                            deps.push(Dependency::unconditional(child, false));
                        }
                    }
                }
            }
            self.exprs[i].dependencies = deps;
        }

        for i in 0..self.exprs.len() {
            let dependant = self.exprs[i].id;
            let targets: Vec<ExprId> = self.exprs[i].dependencies.iter().map(|d| d.target).collect();
            for (edge, target) in targets.into_iter().enumerate() {
                self.exprs[target.index()]
                    .dependants
                    .push(DependantRef { dependant, edge });
            }
        }
    }

    /// Order nodes so every dependency target precedes its dependants. A node
    /// met before its targets are placed is deferred to the next sweep.
    fn dependency_order(&self) -> Result<Vec<ExprId>, ModelError> {
        let mut placed = vec![false; self.exprs.len()];
        let mut order = Vec::with_capacity(self.exprs.len());
        let mut waiting: Vec<ExprId> = self.exprs.iter().map(|e| e.id).collect();
        while !waiting.is_empty() {
            let before = waiting.len();
            let mut deferred = Vec::new();
            for id in waiting {
                let ready = self.exprs[id.index()]
                    .dependencies
                    .iter()
                    .all(|d| placed[d.target.index()]);
                if ready {
                    placed[id.index()] = true;
                    order.push(id);
                } else {
                    deferred.push(id);
                }
            }
            if deferred.len() == before {
                return Err(ModelError::DependencyCycle {
                    key: self.exprs[deferred[0].index()].key.clone(),
                });
            }
            waiting = deferred;
        }
        Ok(order)
    }

    fn compute_invalid_flags(&mut self) {
        let all = self.invalidate_all;
        for &id in &self.order {
            let expr = &self.exprs[id.index()];
            let mut invalid = FlagSet::new();
            if let Some(all) = all {
                invalid.insert(all);
            }
            if let Some(flag) = expr.flag {
                invalid.insert(flag);
            }
            for dep in &expr.dependencies {
                invalid.union_with(&self.exprs[dep.target.index()].invalid);
            }
            self.exprs[id.index()].invalid = invalid;
        }
    }

    fn compute_conditional_reads(&mut self) {
        for &id in self.order.iter().rev() {
            let expr = &self.exprs[id.index()];
            let mut set = if expr.binding {
                expr.invalid.clone()
            } else {
                FlagSet::new()
            };
            for r in &expr.dependants {
                let owner = &self.exprs[r.dependant.index()];
                match owner.dependencies[r.edge].guard {
                    None => set.union_with(&owner.conditional_read),
                    Some(guard) => {
                        if let Some(flag) = owner.requirement_flag(guard.branch) {
                            set.insert(flag);
                        }
                    }
                }
            }
            self.exprs[id.index()].conditional_read = set;
        }
    }

    /// Recompute every node's should-read set from its dependants, top down.
    pub(crate) fn refresh_read_flags(&mut self) {
        for &id in self.order.iter().rev() {
            let expr = &self.exprs[id.index()];
            let mut set = FlagSet::new();
            if expr.is_dynamic() && !expr.read {
                if expr.binding {
                    set.union_with(&expr.invalid);
                }
                for r in &expr.dependants {
                    let owner = &self.exprs[r.dependant.index()];
                    let dep = &owner.dependencies[r.edge];
                    match dep.guard {
                        None => set.union_with(&owner.should_read),
                        Some(guard) if dep.elevated && !owner.read => {
                            if let Some(flag) = owner.requirement_flag(guard.branch) {
                                set.insert(flag);
                            }
                        }
                        Some(_) => {}
                    }
                }
                set.intersect_with(&expr.conditional_read);
                set.difference_with(&expr.read_so_far);
            }
            self.exprs[id.index()].should_read = set;
        }
    }

    pub(crate) fn order(&self) -> &[ExprId] {
        &self.order
    }

    pub(crate) fn expr_mut(&mut self, id: ExprId) -> &mut Expr {
        &mut self.exprs[id.index()]
    }

    pub(crate) fn ensure_sealed(&self) -> Result<(), ModelError> {
        if self.sealed {
            Ok(())
        } else {
            Err(ModelError::NotSealed)
        }
    }

    fn ensure_open(&self) -> Result<(), ModelError> {
        if self.sealed {
            Err(ModelError::AlreadySealed)
        } else {
            Ok(())
        }
    }
}

fn static_key(qualified: &str) -> String {
    ExprKind::StaticIdentifier {
        alias: String::new(),
        qualified: qualified.to_string(),
    }
    .unique_key(&[])
}

/// Result type of a binary arithmetic node.
fn math_type(op: MathOp, lhs: ModelClass, rhs: ModelClass) -> ModelClass {
    if op == MathOp::Add && (lhs.is_string() || rhs.is_string()) {
        return ModelClass::plain(names::STRING);
    }
    match (lhs.numeric_rank(), rhs.numeric_rank()) {
        (Some(0), Some(0)) => ModelClass::plain(names::INT),
        (Some(l), Some(r)) if r > l => rhs,
        _ => lhs,
    }
}
