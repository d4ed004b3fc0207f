// registry.rs - Class metadata registry
//
// Loads the host classes a layout refers to from JSON descriptions and
// answers the model's type questions through `TypeResolver`. Primitive
// types, `java.lang.String` and `java.lang.Object` are always present.
//
// Lookup rules:
//   - a member is searched on the class, then up its `extends` chain;
//   - `name` on a receiver resolves to the first of `getName()`,
//     `isName()`, `name()` and then the field `name`;
//   - a class is observable when it, or any ancestor, is declared
//     observable or an observable field wrapper.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analyzer::{names, Callable, CallableKind, ModelClass, ResolveError, TypeResolver};

// ── Data types ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(default)]
    pub observable: bool,
    #[serde(default)]
    pub observable_field: bool,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub methods: Vec<MethodDef>,
}

impl ClassDef {
    fn builtin(name: &str) -> Self {
        Self {
            name: name.to_string(),
            extends: None,
            observable: false,
            observable_field: false,
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default, rename = "final")]
    pub is_final: bool,
    #[serde(default)]
    pub bindable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default)]
    pub bindable: bool,
}

#[derive(Debug, Deserialize)]
struct ClassFile {
    classes: Vec<ClassDef>,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid class description: {0}")]
    Json(#[from] serde_json::Error),
    #[error("duplicate class `{0}`")]
    DuplicateClass(String),
}

const BUILTINS: &[&str] = &[
    names::BOOLEAN,
    "byte",
    "short",
    names::CHAR,
    names::INT,
    names::LONG,
    names::FLOAT,
    names::DOUBLE,
    "void",
    names::STRING,
    names::OBJECT,
];

// ── Registry ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ClassRegistry {
    classes: IndexMap<String, ClassDef>,
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassRegistry {
    /// Registry holding only the built-in types.
    pub fn new() -> Self {
        let classes = BUILTINS
            .iter()
            .map(|name| (name.to_string(), ClassDef::builtin(name)))
            .collect();
        Self { classes }
    }

    pub fn from_json(text: &str) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.load_json(text)?;
        Ok(registry)
    }

    /// Add the classes of one JSON document. Returns how many were added.
    pub fn load_json(&mut self, text: &str) -> Result<usize, RegistryError> {
        let file: ClassFile = serde_json::from_str(text)?;
        self.extend(file.classes)
    }

    pub fn load_file(&mut self, path: &Path) -> Result<usize, RegistryError> {
        let text = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let added = self.load_json(&text)?;
        tracing::debug!(path = %path.display(), added, "loaded class descriptions");
        Ok(added)
    }

    pub fn extend(&mut self, classes: impl IntoIterator<Item = ClassDef>) -> Result<usize, RegistryError> {
        let mut added = 0;
        for class in classes {
            if self.classes.contains_key(&class.name) {
                return Err(RegistryError::DuplicateClass(class.name));
            }
            self.classes.insert(class.name.clone(), class);
            added += 1;
        }
        Ok(added)
    }

    pub fn lookup(&self, name: &str) -> Option<&ClassDef> {
        self.classes.get(name).or_else(|| {
            let mut by_simple = self
                .classes
                .values()
                .filter(|c| simple_name(&c.name) == name && c.name != name);
            match (by_simple.next(), by_simple.next()) {
                (Some(only), None) => Some(only),
                _ => None,
            }
        })
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDef> {
        self.classes.values()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Stable serialization of every non-builtin class, used for provenance.
    pub fn canonical_json(&self) -> String {
        let user: Vec<&ClassDef> = self
            .classes
            .values()
            .filter(|c| !BUILTINS.contains(&c.name.as_str()))
            .collect();
        serde_json::to_string(&user).unwrap_or_default()
    }

    /// The class followed by its ancestors. Stops at unknown or repeated names.
    fn chain<'a>(&'a self, start: &'a ClassDef) -> Vec<&'a ClassDef> {
        let mut chain = vec![start];
        let mut current = start;
        while let Some(parent) = current.extends.as_deref().and_then(|p| self.lookup(p)) {
            if chain.iter().any(|c| c.name == parent.name) {
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain
    }

    fn model_class(&self, def: &ClassDef) -> ModelClass {
        let chain = self.chain(def);
        ModelClass {
            name: def.name.clone(),
            observable: chain.iter().any(|c| c.observable || c.observable_field),
            observable_field: chain.iter().any(|c| c.observable_field),
        }
    }

    fn class_def(&self, owner: &ModelClass) -> Result<&ClassDef, ResolveError> {
        self.lookup(&owner.name)
            .ok_or_else(|| ResolveError::UnknownClass(owner.name.clone()))
    }

    fn method_callable(&self, method: &MethodDef) -> Result<Callable, ResolveError> {
        Ok(Callable {
            name: method.name.clone(),
            kind: CallableKind::Method,
            is_static: method.is_static,
            is_dynamic: true,
            bindable: method.bindable,
            resolved_type: self.find_class(&method.ty)?,
        })
    }
}

impl TypeResolver for ClassRegistry {
    fn find_class(&self, name: &str) -> Result<ModelClass, ResolveError> {
        self.lookup(name)
            .map(|def| self.model_class(def))
            .ok_or_else(|| ResolveError::UnknownClass(name.to_string()))
    }

    fn find_getter_or_field(
        &self,
        owner: &ModelClass,
        name: &str,
        static_only: bool,
    ) -> Result<Callable, ResolveError> {
        let chain = self.chain(self.class_def(owner)?);
        let capitalized = capitalize(name);
        let getter_names = [format!("get{capitalized}"), format!("is{capitalized}"), name.to_string()];

        for getter in &getter_names {
            let found = chain.iter().flat_map(|c| c.methods.iter()).find(|m| {
                &m.name == getter && m.params.is_empty() && (!static_only || m.is_static)
            });
            if let Some(method) = found {
                return self.method_callable(method);
            }
        }

        let field = chain
            .iter()
            .flat_map(|c| c.fields.iter())
            .find(|f| f.name == name && (!static_only || f.is_static));
        match field {
            Some(field) => Ok(Callable {
                name: field.name.clone(),
                kind: CallableKind::Field,
                is_static: field.is_static,
                is_dynamic: !field.is_final,
                bindable: field.bindable,
                resolved_type: self.find_class(&field.ty)?,
            }),
            None => Err(ResolveError::UnknownMember {
                owner: owner.name.clone(),
                name: name.to_string(),
            }),
        }
    }

    fn find_method(
        &self,
        owner: &ModelClass,
        name: &str,
        args: &[ModelClass],
        static_only: bool,
    ) -> Result<Callable, ResolveError> {
        let chain = self.chain(self.class_def(owner)?);
        let candidates: Vec<&MethodDef> = chain
            .iter()
            .flat_map(|c| c.methods.iter())
            .filter(|m| m.name == name && m.params.len() == args.len() && (!static_only || m.is_static))
            .collect();
        let exact = candidates.iter().find(|m| {
            m.params
                .iter()
                .zip(args)
                .all(|(param, arg)| self.lookup(param).is_some_and(|p| p.name == arg.name))
        });
        match exact.or(candidates.first()) {
            Some(method) => self.method_callable(method),
            None => Err(ResolveError::UnknownMethod {
                owner: owner.name.clone(),
                name: name.to_string(),
                arity: args.len(),
            }),
        }
    }
}

fn simple_name(name: &str) -> &str {
    name.rsplit(|c: char| c == '.' || c == '$').next().unwrap_or(name)
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
