// analyzer.rs - Type resolution interface consumed by the model
//
// The model never inspects classes itself. It asks a `TypeResolver` for the
// class behind a type name and for the member a field access or method call
// binds to, then classifies the node from the returned `Callable`.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: lookups return `ResolveError`; the model treats it as fatal.
// Side effects: none.

use thiserror::Error;

/// Well-known type names.
pub mod names {
    pub const BOOLEAN: &str = "boolean";
    pub const CHAR: &str = "char";
    pub const INT: &str = "int";
    pub const LONG: &str = "long";
    pub const FLOAT: &str = "float";
    pub const DOUBLE: &str = "double";
    pub const STRING: &str = "java.lang.String";
    pub const OBJECT: &str = "java.lang.Object";
}

/// A resolved class as far as the model cares about it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelClass {
    pub name: String,
    /// Instances notify listeners when any bindable property changes.
    pub observable: bool,
    /// A single-value observable wrapper read through `get()`.
    pub observable_field: bool,
}

impl ModelClass {
    /// A plain, non-observable class.
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            observable: false,
            observable_field: false,
        }
    }

    /// Name without package or outer class, used for generated import aliases.
    pub fn simple_name(&self) -> &str {
        self.name
            .rsplit(|c: char| c == '.' || c == '$')
            .next()
            .unwrap_or(self.name.as_str())
    }

    pub fn is_string(&self) -> bool {
        self.name == names::STRING
    }

    /// Rank in the numeric widening order, `None` for non-numeric types.
    pub fn numeric_rank(&self) -> Option<u8> {
        match self.name.as_str() {
            "byte" | "short" | names::CHAR | names::INT => Some(0),
            names::LONG => Some(1),
            names::FLOAT => Some(2),
            names::DOUBLE => Some(3),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallableKind {
    Field,
    Method,
}

/// The member a field access or method call resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Callable {
    pub name: String,
    pub kind: CallableKind,
    pub is_static: bool,
    /// The member's value can change independently of its receiver.
    pub is_dynamic: bool,
    /// Changes are announced to the receiver's listeners.
    pub bindable: bool,
    pub resolved_type: ModelClass,
}

impl Callable {
    pub fn can_be_invalidated(&self) -> bool {
        self.bindable
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("cannot find class `{0}`")]
    UnknownClass(String),
    #[error("cannot find `{name}` on `{owner}`")]
    UnknownMember { owner: String, name: String },
    #[error("cannot find method `{name}` with {arity} argument(s) on `{owner}`")]
    UnknownMethod {
        owner: String,
        name: String,
        arity: usize,
    },
    #[error("identifier `{0}` has no declared type")]
    Untyped(String),
}

/// Host type system as seen by the model.
pub trait TypeResolver {
    fn find_class(&self, name: &str) -> Result<ModelClass, ResolveError>;

    /// Resolve `name` on `owner` as a getter (`getName`, `isName`, `name()`)
    /// or a field. With `static_only`, instance members are ignored.
    fn find_getter_or_field(
        &self,
        owner: &ModelClass,
        name: &str,
        static_only: bool,
    ) -> Result<Callable, ResolveError>;

    fn find_method(
        &self,
        owner: &ModelClass,
        name: &str,
        args: &[ModelClass],
        static_only: bool,
    ) -> Result<Callable, ResolveError>;
}
