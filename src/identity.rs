//! Player identities and operator membership.
//!
//! Identities are name-based UUIDs derived the way offline game servers do it:
//! `UUIDv3("OfflinePlayer:" + name)`. The same name always yields the same id,
//! which is all a single-user harness needs. Nothing here is an authority; a
//! multi-user deployment would take ids from a real account source.
use std::collections::{HashMap, HashSet};

use log::info;
use uuid::Uuid;

pub type PlayerId = Uuid;

/// Lazily-populated name ↔ id cache plus the operator set.
#[derive(Debug, Default, Clone)]
pub struct IdentityRegistry {
    by_name: HashMap<String, PlayerId>,
    names: HashMap<PlayerId, String>,
    operators: HashSet<PlayerId>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `local_player` already resolved and holding operator rights.
    pub fn with_operator(local_player: &str) -> Self {
        let mut registry = Self::new();
        let id = registry.resolve(local_player);
        registry.operators.insert(id);
        registry
    }

    /// Deterministic id for a name. Pure; does not touch any cache.
    pub fn derive(name: &str) -> PlayerId {
        Uuid::new_v3(
            &Uuid::NAMESPACE_OID,
            format!("OfflinePlayer:{}", name).as_bytes(),
        )
    }

    /// Id for `name`, caching the pair on first use.
    pub fn resolve(&mut self, name: &str) -> PlayerId {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }
        let id = Self::derive(name);
        self.by_name.insert(name.to_string(), id);
        self.names.insert(id, name.to_string());
        id
    }

    pub fn display_name(&self, id: &PlayerId) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn is_operator(&self, id: &PlayerId) -> bool {
        self.operators.contains(id)
    }

    pub fn operator_count(&self) -> usize {
        self.operators.len()
    }

    /// Returns false when the player already was an operator.
    pub fn grant_operator(&mut self, id: PlayerId) -> bool {
        let added = self.operators.insert(id);
        if added {
            info!("operator granted: {}", self.label(&id));
        }
        added
    }

    /// Returns false when the player was not an operator.
    pub fn revoke_operator(&mut self, id: &PlayerId) -> bool {
        let removed = self.operators.remove(id);
        if removed {
            info!("operator revoked: {}", self.label(id));
        }
        removed
    }

    /// Whether `actor` may act on `target`.
    ///
    /// Operators may do anything. Everyone else is refused operator-only
    /// actions and may otherwise act only on themselves.
    pub fn has_permission(&self, actor: &PlayerId, target: Option<&PlayerId>, requires_operator: bool) -> bool {
        if self.is_operator(actor) {
            return true;
        }
        if requires_operator {
            return false;
        }
        target.map_or(true, |t| t == actor)
    }

    fn label(&self, id: &PlayerId) -> String {
        self.display_name(id)
            .map(str::to_string)
            .unwrap_or_else(|| id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        assert_eq!(IdentityRegistry::derive("alice"), IdentityRegistry::derive("alice"));
        assert_ne!(IdentityRegistry::derive("alice"), IdentityRegistry::derive("bob"));
        assert_eq!(IdentityRegistry::derive("alice").get_version_num(), 3);
    }

    #[test]
    fn resolve_caches_display_name() {
        let mut reg = IdentityRegistry::new();
        let id = reg.resolve("Steve");
        assert_eq!(reg.resolve("Steve"), id);
        assert_eq!(reg.display_name(&id), Some("Steve"));
        assert_eq!(reg.display_name(&IdentityRegistry::derive("nobody")), None);
    }

    #[test]
    fn local_player_starts_as_operator() {
        let mut reg = IdentityRegistry::with_operator("John_Doe");
        let me = reg.resolve("John_Doe");
        let other = reg.resolve("Jane");
        assert!(reg.is_operator(&me));
        assert!(!reg.is_operator(&other));
        assert_eq!(reg.operator_count(), 1);
    }

    #[test]
    fn permission_rules() {
        let mut reg = IdentityRegistry::with_operator("admin");
        let admin = reg.resolve("admin");
        let alice = reg.resolve("alice");
        let bob = reg.resolve("bob");

        assert!(reg.has_permission(&admin, Some(&bob), true));
        assert!(reg.has_permission(&alice, Some(&alice), false));
        assert!(reg.has_permission(&alice, None, false));
        assert!(!reg.has_permission(&alice, Some(&bob), false));
        assert!(!reg.has_permission(&alice, Some(&alice), true));

        assert!(reg.grant_operator(alice));
        assert!(!reg.grant_operator(alice));
        assert!(reg.has_permission(&alice, Some(&bob), true));
        assert!(reg.revoke_operator(&alice));
        assert!(!reg.revoke_operator(&alice));
    }
}
