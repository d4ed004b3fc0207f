// schedule.rs - Read schedule generation for a sealed binding model
//
// Runs the pass engine over a sealed `Model`. Each pass selects the dynamic
// expressions that must be read for the flags outstanding so far, orders
// them so receivers and predicates come first, then commits the batch:
// flags move into `read_so_far`, fully consumed nodes become read, and
// guarded branches whose predicate is now known are released for the next
// pass. The loop stops when the next batch would be empty.
//
// Preconditions: `model` is sealed.
// Postconditions: every pass reads each (node, flag) pair at most once; a
//                 branch is never read before its predicate.
// Failure modes: `ModelError::NotSealed`; internal ordering violations.
// Side effects: mutates the read state stored on the model's nodes.

use std::fmt::Write as _;

use crate::expr::{Dependency, Expr, ExprId};
use crate::flags::{Flag, FlagSet};
use crate::model::{Model, ModelError};

// ── Public types ────────────────────────────────────────────────────────────

/// Where the engine is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Sealed model, nothing committed yet.
    Sealed,
    /// `n` passes committed and more remain.
    Pass(usize),
    /// Nothing left to read.
    Exhausted,
}

/// One expression read within a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledRead {
    pub expr: ExprId,
    /// Flags this read consumes.
    pub flags: FlagSet,
    /// Position in the intra-pass order. Reads in a layer only need values
    /// from earlier layers or earlier passes.
    pub layer: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pass {
    pub reads: Vec<ScheduledRead>,
}

/// Complete read plan for a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub passes: Vec<Pass>,
    pub flag_count: usize,
    pub invalidateable_limit: usize,
}

impl Schedule {
    /// Text rendering, one pass per block, reads in order.
    pub fn render(&self, model: &Model) -> String {
        let mut buf = String::new();
        let _ = writeln!(
            buf,
            "flags: {} ({} invalidateable)",
            self.flag_count, self.invalidateable_limit
        );
        for (index, pass) in self.passes.iter().enumerate() {
            let _ = writeln!(buf, "pass {index}:");
            for read in &pass.reads {
                let _ = writeln!(
                    buf,
                    "  [{}] {} {}",
                    read.layer,
                    model.expr(read.expr).key(),
                    read.flags
                );
            }
        }
        buf
    }
}

// ── Engine ──────────────────────────────────────────────────────────────────

pub struct Scheduler<'m> {
    model: &'m mut Model,
    state: SchedulerState,
    committed: usize,
}

impl<'m> Scheduler<'m> {
    pub fn new(model: &'m mut Model) -> Result<Self, ModelError> {
        model.ensure_sealed()?;
        Ok(Self {
            model,
            state: SchedulerState::Sealed,
            committed: 0,
        })
    }

    pub fn model(&self) -> &Model {
        &*self.model
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Dynamic expressions with outstanding should-read flags.
    pub fn pending(&self) -> Result<Vec<ExprId>, ModelError> {
        self.model.pending_expressions()
    }

    /// What must be read this pass: pending expressions with outstanding
    /// flags none of whose dependencies is still waiting on a predicate.
    pub fn filter_should_read(&self, pending: &[ExprId]) -> Vec<ExprId> {
        let blocked = self.blocked();
        pending
            .iter()
            .copied()
            .filter(|&id| {
                let expr = self.model.expr(id);
                !expr.should_read.is_empty() && !self.waits_on(expr, &blocked)
            })
            .collect()
    }

    /// The batch of the current pass.
    pub fn should_read(&self) -> Result<Vec<ExprId>, ModelError> {
        Ok(self.filter_should_read(&self.pending()?))
    }

    /// True if `id` has flags to read and every dependency is already read,
    /// among `just_read`, or was read earlier for every flag `id` needs.
    pub fn should_read_now(&self, id: ExprId, just_read: &[ExprId]) -> bool {
        let expr = self.model.expr(id);
        !expr.should_read.is_empty()
            && expr.dependencies.iter().all(|d| {
                self.model.expr(d.target).read
                    || just_read.contains(&d.target)
                    || (!d.is_pending_guard() && self.covers(expr, d))
            })
    }

    /// Split a batch into layers of `should_read_now` sweeps.
    pub fn order_batch(&self, batch: &[ExprId]) -> Result<Vec<Vec<ExprId>>, ModelError> {
        let mut remaining = batch.to_vec();
        let mut chosen = Vec::with_capacity(batch.len());
        let mut layers = Vec::new();
        while !remaining.is_empty() {
            let (ready, rest): (Vec<ExprId>, Vec<ExprId>) = remaining
                .iter()
                .partition(|&&id| self.should_read_now(id, &chosen));
            if ready.is_empty() {
                return Err(ModelError::OrderingCycle {
                    keys: rest
                        .iter()
                        .map(|&id| self.model.expr(id).key.clone())
                        .collect(),
                });
            }
            chosen.extend_from_slice(&ready);
            layers.push(ready);
            remaining = rest;
        }
        Ok(layers)
    }

    /// Commit the current batch. Returns whether another pass has anything
    /// to read.
    pub fn mark_bits_read(&mut self) -> Result<bool, ModelError> {
        let batch = self.should_read()?;
        if let Some(&id) = batch.iter().find(|&&id| !self.model.expr(id).is_dynamic()) {
            return Err(ModelError::NotDynamic {
                key: self.model.expr(id).key.clone(),
            });
        }
        for &id in &batch {
            let expr = self.model.expr_mut(id);
            let flags = expr.should_read.clone();
            expr.read_so_far.union_with(&flags);
        }
        self.settle_reads();
        self.elevate_guards();
        self.model.refresh_read_flags();
        self.committed += 1;

        let pending = self.pending()?;
        let next = self.filter_should_read(&pending);
        tracing::debug!(
            pass = self.committed,
            read = batch.len(),
            next = next.len(),
            "committed pass"
        );
        if next.is_empty() {
            if !pending.is_empty() {
                let keys: Vec<&str> = pending.iter().map(|&id| self.model.expr(id).key()).collect();
                tracing::warn!(?keys, "expressions left unschedulable");
            }
            self.state = SchedulerState::Exhausted;
            Ok(false)
        } else {
            self.state = SchedulerState::Pass(self.committed);
            Ok(true)
        }
    }

    /// Drive the engine to exhaustion and collect the ordered passes.
    pub fn run(mut self) -> Result<Schedule, ModelError> {
        let mut passes = Vec::new();
        loop {
            let batch = self.should_read()?;
            if batch.is_empty() {
                self.state = SchedulerState::Exhausted;
                break;
            }
            let layers = self.order_batch(&batch)?;
            let reads = layers
                .into_iter()
                .enumerate()
                .flat_map(|(layer, ids)| ids.into_iter().map(move |id| (layer, id)))
                .map(|(layer, id)| ScheduledRead {
                    expr: id,
                    flags: self.model.expr(id).should_read.clone(),
                    layer,
                })
                .collect();
            passes.push(Pass { reads });
            if !self.mark_bits_read()? {
                break;
            }
        }
        Ok(Schedule {
            passes,
            flag_count: self.model.flag_count(),
            invalidateable_limit: self.model.invalidateable_limit(),
        })
    }

    // ── Internals ───────────────────────────────────────────────────────

    /// Per node: unread and unable to be read now, either because it has no
    /// outstanding flags or because something below it is waiting.
    fn blocked(&self) -> Vec<bool> {
        let mut blocked = vec![false; self.model.len()];
        for &id in self.model.order() {
            let expr = self.model.expr(id);
            blocked[id.index()] =
                !expr.read && (expr.should_read.is_empty() || self.waits_on(expr, &blocked));
        }
        blocked
    }

    fn waits_on(&self, expr: &Expr, blocked: &[bool]) -> bool {
        expr.dependencies.iter().any(|d| {
            d.is_pending_guard() || (blocked[d.target.index()] && !self.covers(expr, d))
        })
    }

    /// The target of `dep` has nothing to read this pass and an earlier pass
    /// already read it under every flag `expr` needs it for: the dependant's
    /// own flags on a plain edge, its branch requirement on a guarded one.
    fn covers(&self, expr: &Expr, dep: &Dependency) -> bool {
        let target = self.model.expr(dep.target);
        if !target.should_read.is_empty() {
            return false;
        }
        match dep.guard {
            Some(guard) => expr
                .requirement_flag(guard.branch)
                .is_some_and(|flag| target.read_so_far.contains(flag)),
            None => expr.should_read.is_subset(&target.read_so_far),
        }
    }

    /// Mark nodes read once nothing outside settled branch requirements is
    /// left for them. Repeats until stable, since settling a predicate can
    /// settle the requirements of its branches.
    fn settle_reads(&mut self) {
        loop {
            let mut settled = Vec::new();
            for expr in self.model.iter() {
                if !expr.is_dynamic() || expr.read {
                    continue;
                }
                let mut remaining = expr.conditional_read.clone();
                remaining.difference_with(&expr.read_so_far);
                if remaining
                    .iter()
                    .all(|flag| self.requirement_settled(flag, &expr.read_so_far))
                {
                    settled.push(expr.id);
                }
            }
            if settled.is_empty() {
                break;
            }
            for id in settled {
                tracing::trace!(key = %self.model.expr(id).key, "fully read");
                self.model.expr_mut(id).read = true;
            }
        }
    }

    /// A branch requirement no longer needs reading when the conditional's
    /// predicate is read and every other flag of the conditional was read.
    fn requirement_settled(&self, flag: Flag, read_so_far: &FlagSet) -> bool {
        let Some((conditional, _)) = self.model.flags().requirement(flag) else {
            return false;
        };
        let conditional = self.model.expr(conditional);
        conditional
            .predicate()
            .is_some_and(|p| self.model.expr(p).read)
            && conditional.conditional_read.is_subset(read_so_far)
    }

    /// Release guarded edges whose predicate value is now known: the
    /// predicate is fully read, covers its own invalid flags, or was read for
    /// every flag the conditional was asked for in the committed pass.
    fn elevate_guards(&mut self) {
        let mut released = Vec::new();
        for expr in self.model.iter() {
            for (edge, dep) in expr.dependencies.iter().enumerate() {
                let Some(guard) = dep.guard else { continue };
                if dep.elevated {
                    continue;
                }
                let predicate = self.model.expr(guard.predicate);
                let known_for_pass = !expr.should_read.is_empty()
                    && expr.should_read.is_subset(&predicate.read_so_far);
                if predicate.read || predicate.invalid.is_subset(&predicate.read_so_far) || known_for_pass {
                    released.push((expr.id, edge));
                }
            }
        }
        for (id, edge) in released {
            tracing::trace!(key = %self.model.expr(id).key, edge, "guard elevated");
            self.model.expr_mut(id).dependencies[edge].elevated = true;
        }
    }
}

/// Seal-to-exhaustion shortcut.
pub fn plan(model: &mut Model) -> Result<Schedule, ModelError> {
    Scheduler::new(model)?.run()
}
