// imports.rs - Import aliases for static receivers
//
// Maps short aliases to fully-qualified class names. Explicit imports and
// on-demand imports (created when a static member is reached through an
// instance) share one table. A colliding alias is renamed by appending the
// first free numeral, so `View` becomes `View1`, `View2`, ...
//
// Preconditions: none.
// Postconditions: an alias never maps to two different classes.
// Failure modes: none; collisions are resolved by renaming.
// Side effects: none.

use indexmap::IndexMap;

#[derive(Debug, Clone, Default)]
pub struct ImportRegistry {
    by_alias: IndexMap<String, String>,
}

impl ImportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Import `qualified` as `alias` and return the alias actually used.
    pub fn add(&mut self, alias: &str, qualified: &str) -> String {
        let alias = self.free_alias(alias, qualified);
        self.by_alias
            .entry(alias.clone())
            .or_insert_with(|| qualified.to_string());
        alias
    }

    /// Alias for `qualified`, importing it under `simple_name` when no alias
    /// exists yet.
    pub fn alias_for_type(&mut self, qualified: &str, simple_name: &str) -> String {
        match self.alias_of(qualified) {
            Some(alias) => alias.to_string(),
            None => {
                let alias = self.add(simple_name, qualified);
                tracing::debug!(alias = %alias, qualified, "on-demand import");
                alias
            }
        }
    }

    /// First alias registered for `qualified`.
    pub fn alias_of(&self, qualified: &str) -> Option<&str> {
        self.by_alias
            .iter()
            .find(|(_, q)| q.as_str() == qualified)
            .map(|(alias, _)| alias.as_str())
    }

    /// Qualified class behind an alias.
    pub fn get(&self, alias: &str) -> Option<&str> {
        self.by_alias.get(alias).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_alias
            .iter()
            .map(|(alias, qualified)| (alias.as_str(), qualified.as_str()))
    }

    pub fn len(&self) -> usize {
        self.by_alias.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_alias.is_empty()
    }

    fn free_alias(&self, alias: &str, qualified: &str) -> String {
        let fits = |candidate: &str| match self.by_alias.get(candidate) {
            None => true,
            Some(existing) => existing == qualified,
        };
        if fits(alias) {
            return alias.to_string();
        }
        (1..)
            .map(|n| format!("{alias}{n}"))
            .find(|candidate| fits(candidate))
            .unwrap_or_else(|| alias.to_string())
    }
}
