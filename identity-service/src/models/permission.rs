//! Permission rule value object.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Effect of a matching rule. Deny always wins over allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Allow,
    Deny,
}

/// A single permission rule.
///
/// Immutable value object: rule sets are recomputed, never patched in
/// place. A rule without a `resource_id` is a wildcard over every
/// resource of its type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRule {
    pub resource_type: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<Uuid>,
    pub effect: Effect,
}

impl PermissionRule {
    pub fn allow(resource_type: &str, action: &str) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            action: action.to_string(),
            resource_id: None,
            effect: Effect::Allow,
        }
    }

    pub fn deny(resource_type: &str, action: &str) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            action: action.to_string(),
            resource_id: None,
            effect: Effect::Deny,
        }
    }

    pub fn scoped(mut self, resource_id: Uuid) -> Self {
        self.resource_id = Some(resource_id);
        self
    }

    /// Whether this rule applies to the given query. An action of `"*"`
    /// covers every action on the resource type.
    pub fn matches(&self, resource_type: &str, action: &str, resource_id: Option<Uuid>) -> bool {
        if self.resource_type != resource_type {
            return false;
        }
        if self.action != "*" && self.action != action {
            return false;
        }
        match self.resource_id {
            None => true,
            Some(id) => resource_id == Some(id),
        }
    }
}
