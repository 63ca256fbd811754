use std::collections::HashSet;

use thiserror::Error;
use tracing::trace;

use crate::casing::{RESERVED_WORDS, is_valid_id};

/// A candidate was already claimed and there is no suffix to resolve it with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("identifier `{candidate}` is already taken and no collision suffix is configured")]
pub struct NameCollision {
    pub candidate: String,
}

/// Identifiers claimed within one generated module.
#[derive(Debug, Clone)]
pub struct Namespace {
    claimed: HashSet<String>,
    suffix: String,
}

impl Namespace {
    /// Fresh namespace holding the Elm reserved words.
    pub fn new(collision_suffix: &str) -> Self {
        Self::with_reserved(collision_suffix, RESERVED_WORDS)
    }

    pub fn with_reserved(collision_suffix: &str, reserved: &[&str]) -> Self {
        Self {
            claimed: reserved.iter().map(|w| w.to_string()).collect(),
            suffix: collision_suffix.to_string(),
        }
    }

    pub fn is_legal(candidate: &str) -> bool {
        is_valid_id(candidate)
    }

    pub fn is_claimed(&self, id: &str) -> bool {
        self.claimed.contains(id)
    }

    /// Claims `candidate`, suffixing it until free when a suffix is configured.
    ///
    /// # Panics
    /// If `candidate` is not a legal identifier. Casing never produces one, so
    /// reaching this is a bug in the caller.
    pub fn register(&mut self, candidate: &str) -> Result<String, NameCollision> {
        assert!(
            Self::is_legal(candidate),
            "illegal Elm identifier `{candidate}`"
        );
        let mut id = candidate.to_string();
        while self.claimed.contains(&id) {
            if self.suffix.is_empty() {
                return Err(NameCollision {
                    candidate: candidate.to_string(),
                });
            }
            id.push_str(&self.suffix);
            assert!(Self::is_legal(&id), "illegal Elm identifier `{id}`");
            trace!(candidate, suffixed = %id, "identifier collision");
        }
        trace!(%id, "claimed identifier");
        self.claimed.insert(id.clone());
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn collision_appends_suffix() {
        let mut ns = Namespace::new("_");
        assert_eq!(ns.register("Hello").unwrap(), "Hello");
        assert_eq!(ns.register("Hello").unwrap(), "Hello_");
        assert_eq!(ns.register("Hello").unwrap(), "Hello__");
        assert!(ns.is_claimed("Hello_"));
    }

    #[test]
    fn collision_without_suffix_is_an_error() {
        let mut ns = Namespace::new("");
        ns.register("Hello").unwrap();
        let err = ns.register("Hello").unwrap_err();
        assert_eq!(err.candidate, "Hello");
        assert!(err.to_string().contains("Hello"));
    }

    #[test]
    fn reserved_words_are_pre_claimed() {
        let mut ns = Namespace::new("Elm");
        assert_eq!(ns.register("String").unwrap(), "StringElm");
        assert_eq!(ns.register("type").unwrap(), "typeElm");
        assert_eq!(ns.register("Type").unwrap(), "Type");

        let mut ns = Namespace::new("");
        assert!(ns.register("Maybe").is_err());
    }

    #[test]
    fn custom_reserved_set() {
        let mut ns = Namespace::with_reserved("_", &["if"]);
        assert_eq!(ns.register("String").unwrap(), "String");
        assert_eq!(ns.register("if").unwrap(), "if_");
    }

    #[test]
    #[should_panic(expected = "illegal Elm identifier")]
    fn illegal_candidate_panics() {
        let mut ns = Namespace::new("_");
        let _ = ns.register("_Hello");
    }
}
