// pipeline.rs - Layout analysis from description to read schedule
//
// Reads a layout description (classes, imports, variables, binding
// expressions), builds and seals the model, plans the read schedule and
// packages the result with provenance metadata.
//
// Preconditions: the registry holds every class the layout refers to, or
//                the layout declares them itself.
// Postconditions: on success the model is sealed and fully scheduled.
// Failure modes: malformed JSON, duplicate classes, binding diagnostics,
//                model invariant violations.
// Side effects: none.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analyzer::ModelClass;
use crate::binder::Binder;
use crate::diag::Diagnostic;
use crate::expr::ExprId;
use crate::flags::{FlagPurpose, FlagSet};
use crate::model::{Model, ModelError};
use crate::registry::{ClassDef, ClassRegistry, RegistryError};
use crate::schedule::{self, Schedule};

// ── Layout description ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Layout {
    #[serde(default)]
    pub classes: Vec<ClassDef>,
    #[serde(default)]
    pub imports: Vec<ImportDecl>,
    #[serde(default)]
    pub variables: Vec<VariableDecl>,
    #[serde(default)]
    pub bindings: Vec<String>,
}

impl Layout {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportDecl {
    /// Defaults to the simple name of `ty`.
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VariableDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

// ── Errors ─────────────────────────────────────────────────────────────────

/// A diagnostic tied to the binding expression it was raised for.
#[derive(Debug, Clone)]
pub struct BindingDiagnostic {
    pub binding: usize,
    pub source: String,
    pub diagnostic: Diagnostic,
}

impl BindingDiagnostic {
    pub fn render(&self) -> String {
        self.diagnostic
            .render(&format!("binding[{}]", self.binding), &self.source)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid layout description: {0}")]
    Layout(#[from] serde_json::Error),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("{} binding expression(s) failed", .0.len())]
    Diagnostics(Vec<BindingDiagnostic>),
    #[error(transparent)]
    Model(#[from] ModelError),
}

// ── Provenance ─────────────────────────────────────────────────────────────

/// Provenance metadata for cache keys and reproducible output.
///
/// `source_hash`: SHA-256 of the raw layout description.
/// `registry_fingerprint`: SHA-256 of `ClassRegistry::canonical_json()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub source_hash: [u8; 32],
    pub registry_fingerprint: [u8; 32],
    pub compiler_version: &'static str,
}

impl Provenance {
    pub fn source_hash_hex(&self) -> String {
        bytes_to_hex(&self.source_hash)
    }

    pub fn registry_fingerprint_hex(&self) -> String {
        bytes_to_hex(&self.registry_fingerprint)
    }
}

fn bytes_to_hex(bytes: &[u8; 32]) -> String {
    bytes.iter().fold(String::with_capacity(64), |mut hex, b| {
        let _ = write!(hex, "{b:02x}");
        hex
    })
}

fn sha256(bytes: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&hasher.finalize());
    hash
}

pub fn compute_provenance(source: &str, registry: &ClassRegistry) -> Provenance {
    Provenance {
        source_hash: sha256(source.as_bytes()),
        registry_fingerprint: sha256(registry.canonical_json().as_bytes()),
        compiler_version: env!("CARGO_PKG_VERSION"),
    }
}

// ── Analysis ───────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Analysis {
    pub model: Model,
    pub schedule: Schedule,
    pub provenance: Provenance,
    /// Root of each binding, in declaration order.
    pub bindings: Vec<ExprId>,
}

/// Analyze the layout description in `source`. Classes declared by the
/// layout are added to `registry`.
pub fn compile(source: &str, mut registry: ClassRegistry) -> Result<Analysis, PipelineError> {
    let layout = Layout::from_json(source)?;
    registry.extend(layout.classes.iter().cloned())?;
    let provenance = compute_provenance(source, &registry);
    let (model, schedule, bindings) = analyze(&layout, &registry)?;
    Ok(Analysis {
        model,
        schedule,
        provenance,
        bindings,
    })
}

/// Bind, seal and schedule an already-parsed layout.
pub fn analyze(
    layout: &Layout,
    registry: &ClassRegistry,
) -> Result<(Model, Schedule, Vec<ExprId>), PipelineError> {
    let mut binder = Binder::new(registry);
    for import in &layout.imports {
        let alias = match &import.alias {
            Some(alias) => alias.clone(),
            None => ModelClass::plain(import.ty.as_str()).simple_name().to_string(),
        };
        binder.add_import(&alias, &import.ty)?;
    }
    for variable in &layout.variables {
        binder.add_variable(&variable.name, &variable.ty)?;
    }

    let mut roots = Vec::with_capacity(layout.bindings.len());
    let mut failures = Vec::new();
    for (index, source) in layout.bindings.iter().enumerate() {
        match binder.parse(source) {
            Ok(root) => roots.push(root),
            Err(diagnostic) => failures.push(BindingDiagnostic {
                binding: index,
                source: source.clone(),
                diagnostic,
            }),
        }
    }
    if !failures.is_empty() {
        return Err(PipelineError::Diagnostics(failures));
    }

    binder.seal()?;
    let mut model = binder.into_model();
    let schedule = schedule::plan(&mut model)?;
    tracing::debug!(
        bindings = roots.len(),
        passes = schedule.passes.len(),
        "layout analyzed"
    );
    Ok((model, schedule, roots))
}

// ── Reports ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct Report {
    pub compiler_version: String,
    pub source_hash: String,
    pub registry_fingerprint: String,
    pub flag_count: usize,
    pub invalidateable_limit: usize,
    pub flags: Vec<FlagReport>,
    pub imports: Vec<ImportReport>,
    pub bindings: Vec<usize>,
    pub expressions: Vec<ExprReport>,
    pub passes: Vec<Vec<ReadReport>>,
}

#[derive(Debug, Serialize)]
pub struct FlagReport {
    pub index: usize,
    pub kind: &'static str,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ImportReport {
    pub alias: String,
    pub qualified: String,
}

#[derive(Debug, Serialize)]
pub struct ExprReport {
    pub id: usize,
    pub key: String,
    #[serde(rename = "type")]
    pub ty: Option<String>,
    pub dynamic: bool,
    pub binding: bool,
    pub flag: Option<usize>,
    pub invalid: Vec<usize>,
    pub dependencies: Vec<DependencyReport>,
}

#[derive(Debug, Serialize)]
pub struct DependencyReport {
    pub target: usize,
    pub mandatory: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guard: Option<GuardReport>,
}

#[derive(Debug, Serialize)]
pub struct GuardReport {
    pub predicate: usize,
    pub branch: bool,
}

#[derive(Debug, Serialize)]
pub struct ReadReport {
    pub expr: usize,
    pub key: String,
    pub layer: usize,
    pub flags: Vec<usize>,
}

impl Report {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn flag_list(set: &FlagSet) -> Vec<usize> {
    set.iter().collect()
}

impl Analysis {
    pub fn report(&self) -> Report {
        let model = &self.model;
        let flags = model
            .flags()
            .iter()
            .map(|(index, purpose)| FlagReport {
                index,
                kind: match purpose {
                    FlagPurpose::Invalidation(_) => "invalidate",
                    FlagPurpose::InvalidateAll => "invalidate_all",
                    FlagPurpose::Requirement { .. } => "requirement",
                },
                name: model.flag_name(index),
            })
            .collect();
        let imports = model
            .imports()
            .iter()
            .map(|(alias, qualified)| ImportReport {
                alias: alias.to_string(),
                qualified: qualified.to_string(),
            })
            .collect();
        let expressions = model
            .iter()
            .map(|e| ExprReport {
                id: e.id().index(),
                key: e.key().to_string(),
                ty: e.resolved_type().map(|c| c.name.clone()),
                dynamic: e.is_dynamic(),
                binding: e.is_binding(),
                flag: e.flag(),
                invalid: flag_list(e.invalid_flags()),
                dependencies: e
                    .dependencies()
                    .iter()
                    .map(|d| DependencyReport {
                        target: d.target.index(),
                        mandatory: d.mandatory,
                        guard: d.guard.map(|g| GuardReport {
                            predicate: g.predicate.index(),
                            branch: g.branch,
                        }),
                    })
                    .collect(),
            })
            .collect();
        let passes = self
            .schedule
            .passes
            .iter()
            .map(|pass| {
                pass.reads
                    .iter()
                    .map(|read| ReadReport {
                        expr: read.expr.index(),
                        key: model.expr(read.expr).key().to_string(),
                        layer: read.layer,
                        flags: flag_list(&read.flags),
                    })
                    .collect()
            })
            .collect();

        Report {
            compiler_version: self.provenance.compiler_version.to_string(),
            source_hash: self.provenance.source_hash_hex(),
            registry_fingerprint: self.provenance.registry_fingerprint_hex(),
            flag_count: model.flag_count(),
            invalidateable_limit: model.invalidateable_limit(),
            flags,
            imports,
            bindings: self.bindings.iter().map(|b| b.index()).collect(),
            expressions,
            passes,
        }
    }

    /// One line per flag: index, kind and what it stands for.
    pub fn flag_table(&self) -> String {
        let mut buf = String::new();
        for flag in self.report().flags {
            let _ = writeln!(buf, "{:>4}  {:<14} {}", flag.index, flag.kind, flag.name);
        }
        buf
    }
}
