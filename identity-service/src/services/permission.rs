//! Permission evaluation: role baselines merged with per-member
//! overrides, deny-wins, default-deny.

use crate::models::{Effect, PermissionRule, TeamMember, TeamRole};
use crate::services::error::ServiceError;

impl TeamRole {
    /// Baseline rule set for a role. Each role includes everything the
    /// weaker ones can do.
    pub fn rules_for(&self) -> Vec<PermissionRule> {
        let mut rules = vec![
            PermissionRule::allow("team", "view"),
            PermissionRule::allow("team_member", "view"),
        ];

        if matches!(self, TeamRole::Owner | TeamRole::Admin) {
            rules.push(PermissionRule::allow("team", "update"));
            rules.push(PermissionRule::allow("team_member", "invite"));
            rules.push(PermissionRule::allow("team_member", "remove"));
            rules.push(PermissionRule::allow("team_member", "update_role"));
        }

        if matches!(self, TeamRole::Owner) {
            rules.push(PermissionRule::allow("team", "delete"));
            rules.push(PermissionRule::allow("team", "transfer_ownership"));
            rules.push(PermissionRule::allow("team_member", "promote_admin"));
        }

        rules
    }
}

/// Rules granted to platform administrators regardless of membership.
pub fn system_admin_rules() -> Vec<PermissionRule> {
    vec![
        PermissionRule::allow("team", "*"),
        PermissionRule::allow("team_member", "*"),
    ]
}

/// Merge role baseline rules with per-member overrides. When both sets
/// carry a rule for the same (resource_type, action, resource_id) key,
/// a deny on either side wins.
pub fn merge_rules(
    baseline: &[PermissionRule],
    overrides: &[PermissionRule],
) -> Vec<PermissionRule> {
    let mut merged: Vec<PermissionRule> = Vec::with_capacity(baseline.len() + overrides.len());

    for rule in baseline.iter().chain(overrides.iter()) {
        let key = |r: &PermissionRule| {
            (
                r.resource_type.clone(),
                r.action.clone(),
                r.resource_id.map(|id| id.to_string()),
            )
        };
        match merged.iter_mut().find(|existing| key(existing) == key(rule)) {
            Some(existing) => {
                if rule.effect == Effect::Deny {
                    existing.effect = Effect::Deny;
                }
            }
            None => merged.push(rule.clone()),
        }
    }

    merged
}

/// Evaluate a rule set against a requested action. Any matching deny
/// refuses; otherwise any matching allow grants; no match is a refusal.
pub fn evaluate(
    rules: &[PermissionRule],
    resource_type: &str,
    action: &str,
    resource_id: Option<uuid::Uuid>,
) -> bool {
    let matching: Vec<&PermissionRule> = rules
        .iter()
        .filter(|r| r.matches(resource_type, action, resource_id))
        .collect();

    if matching.iter().any(|r| r.effect == Effect::Deny) {
        return false;
    }

    matching.iter().any(|r| r.effect == Effect::Allow)
}

/// Effective rules for one member: role baseline merged with the
/// member's stored overrides.
pub fn effective_rules(member: &TeamMember) -> Vec<PermissionRule> {
    let Some(role) = member.role() else {
        return Vec::new();
    };
    merge_rules(&role.rules_for(), &member.permissions.0)
}

/// Gate a team-scoped action behind the member's effective rules.
pub fn require_team_permission(
    member: &TeamMember,
    resource_type: &str,
    action: &str,
    resource_id: Option<uuid::Uuid>,
) -> Result<(), ServiceError> {
    if evaluate(&effective_rules(member), resource_type, action, resource_id) {
        Ok(())
    } else {
        Err(ServiceError::AccessDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MemberStatus;
    use sqlx::types::Json;
    use uuid::Uuid;

    fn member_with(role: TeamRole, overrides: Vec<PermissionRule>) -> TeamMember {
        let mut m = TeamMember::new(Uuid::new_v4(), Uuid::new_v4(), role, MemberStatus::Active);
        m.permissions = Json(overrides);
        m
    }

    #[test]
    fn default_deny_when_no_rule_matches() {
        assert!(!evaluate(&[], "team", "view", None));

        let rules = vec![PermissionRule::allow("team", "view")];
        assert!(!evaluate(&rules, "team", "delete", None));
        assert!(!evaluate(&rules, "document", "view", None));
    }

    #[test]
    fn deny_wins_over_allow() {
        let rules = vec![
            PermissionRule::allow("team", "update"),
            PermissionRule::deny("team", "update"),
        ];
        assert!(!evaluate(&rules, "team", "update", None));
    }

    #[test]
    fn wildcard_action_matches_everything_for_resource() {
        let rules = vec![PermissionRule::allow("team", "*")];
        assert!(evaluate(&rules, "team", "view", None));
        assert!(evaluate(&rules, "team", "delete", None));
        assert!(!evaluate(&rules, "team_member", "view", None));
    }

    #[test]
    fn scoped_rule_only_matches_its_resource() {
        let id = Uuid::new_v4();
        let other = Uuid::new_v4();
        let rules = vec![PermissionRule::allow("team", "update").scoped(id)];

        assert!(evaluate(&rules, "team", "update", Some(id)));
        assert!(!evaluate(&rules, "team", "update", Some(other)));
        assert!(!evaluate(&rules, "team", "update", None));
    }

    #[test]
    fn unscoped_rule_matches_any_resource_instance() {
        let rules = vec![PermissionRule::allow("team", "update")];
        assert!(evaluate(&rules, "team", "update", Some(Uuid::new_v4())));
        assert!(evaluate(&rules, "team", "update", None));
    }

    #[test]
    fn scoped_deny_beats_unscoped_allow() {
        let id = Uuid::new_v4();
        let rules = vec![
            PermissionRule::allow("team", "update"),
            PermissionRule::deny("team", "update").scoped(id),
        ];
        assert!(!evaluate(&rules, "team", "update", Some(id)));
        assert!(evaluate(&rules, "team", "update", Some(Uuid::new_v4())));
    }

    #[test]
    fn merge_dedupes_and_keeps_deny() {
        let baseline = vec![
            PermissionRule::allow("team", "update"),
            PermissionRule::allow("team", "view"),
        ];
        let overrides = vec![PermissionRule::deny("team", "update")];

        let merged = merge_rules(&baseline, &overrides);
        assert_eq!(merged.len(), 2);
        assert!(!evaluate(&merged, "team", "update", None));
        assert!(evaluate(&merged, "team", "view", None));
    }

    #[test]
    fn role_baselines_are_cumulative() {
        let viewer = TeamRole::Viewer.rules_for();
        assert!(evaluate(&viewer, "team", "view", None));
        assert!(!evaluate(&viewer, "team_member", "invite", None));

        let admin = TeamRole::Admin.rules_for();
        assert!(evaluate(&admin, "team", "view", None));
        assert!(evaluate(&admin, "team_member", "invite", None));
        assert!(!evaluate(&admin, "team", "delete", None));
        assert!(!evaluate(&admin, "team_member", "promote_admin", None));

        let owner = TeamRole::Owner.rules_for();
        assert!(evaluate(&owner, "team", "delete", None));
        assert!(evaluate(&owner, "team", "transfer_ownership", None));
        assert!(evaluate(&owner, "team_member", "promote_admin", None));
    }

    #[test]
    fn override_deny_restricts_an_admin() {
        let member = member_with(TeamRole::Admin, vec![PermissionRule::deny(
            "team_member",
            "remove",
        )]);

        assert!(require_team_permission(&member, "team_member", "invite", None).is_ok());
        assert!(matches!(
            require_team_permission(&member, "team_member", "remove", None),
            Err(ServiceError::AccessDenied)
        ));
    }

    #[test]
    fn override_allow_extends_a_viewer() {
        let member = member_with(TeamRole::Viewer, vec![PermissionRule::allow(
            "team",
            "update",
        )]);

        assert!(require_team_permission(&member, "team", "update", None).is_ok());
        assert!(require_team_permission(&member, "team", "delete", None).is_err());
    }

    #[test]
    fn system_admin_rules_cover_all_team_actions() {
        let rules = system_admin_rules();
        assert!(evaluate(&rules, "team", "delete", Some(Uuid::new_v4())));
        assert!(evaluate(&rules, "team_member", "update_role", None));
    }
}
