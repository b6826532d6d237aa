//! Recipe-lookup collaborator boundary.

/// Deterministic item/recipe lookup over static game-data tables.
///
/// Always returns a human-readable string; the not-found case is a string
/// too, so the conversation engine can fold either outcome into a prompt
/// without branching on errors.
pub trait RecipeLookup: Send + Sync {
    fn lookup(&self, item_name: &str) -> String;
}
