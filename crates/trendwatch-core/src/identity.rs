//! Cross-run product identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Normalized `(product name, category)` pair used to match a product across
/// runs.
///
/// Both halves are trimmed, lower-cased, and have internal whitespace runs
/// collapsed to a single space, so `"  Ice  Roller "` in `"Beauty"` and
/// `"ice roller"` in `"beauty"` produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityKey {
    pub name_key: String,
    pub category_key: String,
}

impl IdentityKey {
    #[must_use]
    pub fn new(name: &str, category: &str) -> Self {
        Self {
            name_key: fold(name),
            category_key: fold(category),
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category_key, self.name_key)
    }
}

/// Case- and whitespace-folds a single identity component.
#[must_use]
pub fn fold(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_collapses_whitespace_and_case() {
        assert_eq!(fold("  Ice   Roller\tSET "), "ice roller set");
    }

    #[test]
    fn keys_match_across_formatting_differences() {
        let a = IdentityKey::new("  Ice  Roller ", "Beauty");
        let b = IdentityKey::new("ice roller", "  beauty");
        assert_eq!(a, b);
    }

    #[test]
    fn same_name_in_different_categories_is_distinct() {
        let a = IdentityKey::new("Water Bottle", "Sports");
        let b = IdentityKey::new("Water Bottle", "Home");
        assert_ne!(a, b);
    }

    #[test]
    fn display_is_category_then_name() {
        let key = IdentityKey::new("LED Strip", "Home");
        assert_eq!(key.to_string(), "home/led strip");
    }
}
