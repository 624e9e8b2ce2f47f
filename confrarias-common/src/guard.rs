//! Authorization guard
//!
//! Every mutating or privileged operation asks the guard before touching the
//! store. Rules in precedence order:
//!
//! 1. no actor → `NotAuthenticated`
//! 2. actor email equals the configured admin email → allow
//! 3. action policy: admin-only actions deny; manager actions allow the
//!    confraria's responsible user; owner actions allow the row's author;
//!    authenticated actions allow anyone signed in
//! 4. otherwise deny
//!
//! The guard is pure. Callers must treat a deny as fatal and abort before
//! any mutation.

use crate::error::{Error, Result};
use crate::models::Actor;
use tracing::warn;

/// What the caller is trying to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateSubmission,
    EditSubmission,
    ModerateSubmission,
    ManageCatalog,
    ManageUsers,
    ManageSettings,
    RequestMembership,
    CancelMembership,
    ManageMembership,
    ViewMembers,
    EditConfrariaProfile,
    ManageConfrariaContent,
    GrantSeal,
    RevokeSeal,
    WriteTestimonial,
    DeleteTestimonial,
}

/// Which rule decides an action once the admin override did not apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Policy {
    AdminOnly,
    ConfrariaManager,
    RowOwner,
    Authenticated,
}

impl Action {
    fn policy(&self) -> Policy {
        match self {
            Action::ModerateSubmission
            | Action::ManageCatalog
            | Action::ManageUsers
            | Action::ManageSettings => Policy::AdminOnly,
            Action::ManageMembership
            | Action::ViewMembers
            | Action::EditConfrariaProfile
            | Action::ManageConfrariaContent => Policy::ConfrariaManager,
            Action::EditSubmission | Action::CancelMembership | Action::DeleteTestimonial => {
                Policy::RowOwner
            }
            Action::CreateSubmission
            | Action::RequestMembership
            | Action::GrantSeal
            | Action::RevokeSeal
            | Action::WriteTestimonial => Policy::Authenticated,
        }
    }
}

/// The entity the action addresses, as loaded from the store
///
/// Managerial rights are always derived from the loaded confraria row, never
/// from anything the client claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
    None,
    Confraria { responsible_user_id: Option<&'a str> },
    OwnedBy { user_id: &'a str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    NotAuthenticated,
    NotAuthorized(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Convert a deny into the matching workflow error
    pub fn into_result(self) -> Result<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(DenyReason::NotAuthenticated) => Err(Error::NotAuthenticated),
            Decision::Deny(DenyReason::NotAuthorized(reason)) => Err(Error::NotAuthorized(reason)),
        }
    }
}

/// Policy check service holding the superuser identity
#[derive(Debug, Clone)]
pub struct AuthorizationGuard {
    admin_email: String,
}

impl AuthorizationGuard {
    pub fn new(admin_email: impl Into<String>) -> Self {
        Self {
            admin_email: admin_email.into().trim().to_lowercase(),
        }
    }

    pub fn is_admin(&self, actor: &Actor) -> bool {
        !self.admin_email.is_empty() && actor.email.trim().to_lowercase() == self.admin_email
    }

    pub fn authorize(&self, actor: Option<&Actor>, action: Action, target: Target<'_>) -> Decision {
        let Some(actor) = actor else {
            return Decision::Deny(DenyReason::NotAuthenticated);
        };

        if self.is_admin(actor) {
            return Decision::Allow;
        }

        let allowed = match (action.policy(), target) {
            (Policy::AdminOnly, _) => false,
            (Policy::Authenticated, _) => true,
            (Policy::ConfrariaManager, Target::Confraria { responsible_user_id }) => {
                responsible_user_id == Some(actor.id.as_str())
            }
            (Policy::RowOwner, Target::OwnedBy { user_id }) => user_id == actor.id,
            _ => false,
        };

        if allowed {
            Decision::Allow
        } else {
            Decision::Deny(DenyReason::NotAuthorized(format!("{:?}", action)))
        }
    }

    /// `authorize` followed by `into_result`, logging denials
    pub fn require(&self, actor: Option<&Actor>, action: Action, target: Target<'_>) -> Result<()> {
        let decision = self.authorize(actor, action, target);
        if let Decision::Deny(DenyReason::NotAuthorized(_)) = &decision {
            warn!(
                actor_id = actor.map(|a| a.id.as_str()).unwrap_or("-"),
                action = ?action,
                "Authorization denied"
            );
        }
        decision.into_result()
    }

    /// Shorthand for actions that only need a signed-in caller
    pub fn require_actor<'a>(&self, actor: Option<&'a Actor>) -> Result<&'a Actor> {
        actor.ok_or(Error::NotAuthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> AuthorizationGuard {
        AuthorizationGuard::new("Admin@Confrarias.pt")
    }

    fn admin() -> Actor {
        Actor::new("u-admin", "admin@confrarias.pt")
    }

    fn alice() -> Actor {
        Actor::new("u-alice", "alice@example.pt")
    }

    fn bob() -> Actor {
        Actor::new("u-bob", "bob@example.pt")
    }

    #[test]
    fn test_anonymous_is_not_authenticated() {
        let decision = guard().authorize(None, Action::GrantSeal, Target::None);
        assert_eq!(decision, Decision::Deny(DenyReason::NotAuthenticated));
        assert!(matches!(decision.into_result(), Err(Error::NotAuthenticated)));
    }

    #[test]
    fn test_admin_override_allows_everything() {
        let g = guard();
        let a = admin();
        assert!(g.authorize(Some(&a), Action::ManageCatalog, Target::None).is_allowed());
        assert!(g
            .authorize(
                Some(&a),
                Action::ManageMembership,
                Target::Confraria { responsible_user_id: Some("u-alice") }
            )
            .is_allowed());
        assert!(g
            .authorize(Some(&a), Action::DeleteTestimonial, Target::OwnedBy { user_id: "u-bob" })
            .is_allowed());
    }

    #[test]
    fn test_admin_email_comparison_ignores_case() {
        let g = guard();
        assert!(g.is_admin(&Actor::new("x", "ADMIN@confrarias.pt")));
        assert!(!g.is_admin(&alice()));
    }

    #[test]
    fn test_empty_admin_email_never_matches() {
        let g = AuthorizationGuard::new("");
        assert!(!g.is_admin(&Actor::new("x", "")));
    }

    #[test]
    fn test_manager_rule_uses_responsible_user() {
        let g = guard();
        let owned_by_alice = Target::Confraria { responsible_user_id: Some("u-alice") };

        assert!(g.authorize(Some(&alice()), Action::ManageMembership, owned_by_alice).is_allowed());
        assert_eq!(
            g.authorize(Some(&bob()), Action::ManageMembership, owned_by_alice),
            Decision::Deny(DenyReason::NotAuthorized("ManageMembership".into()))
        );
        assert!(!g
            .authorize(
                Some(&alice()),
                Action::EditConfrariaProfile,
                Target::Confraria { responsible_user_id: None }
            )
            .is_allowed());
    }

    #[test]
    fn test_owner_rule_uses_row_author() {
        let g = guard();
        let target = Target::OwnedBy { user_id: "u-bob" };
        assert!(g.authorize(Some(&bob()), Action::EditSubmission, target).is_allowed());
        assert!(!g.authorize(Some(&alice()), Action::EditSubmission, target).is_allowed());
    }

    #[test]
    fn test_admin_only_denies_regular_users() {
        let g = guard();
        assert!(!g.authorize(Some(&alice()), Action::ModerateSubmission, Target::None).is_allowed());
        assert!(matches!(
            g.require(Some(&alice()), Action::ManageUsers, Target::None),
            Err(Error::NotAuthorized(_))
        ));
    }

    #[test]
    fn test_mismatched_target_denies() {
        let g = guard();
        assert!(!g
            .authorize(Some(&alice()), Action::ManageConfrariaContent, Target::OwnedBy { user_id: "u-alice" })
            .is_allowed());
    }

    #[test]
    fn test_authenticated_actions() {
        let g = guard();
        assert!(g.authorize(Some(&bob()), Action::CreateSubmission, Target::None).is_allowed());
        assert!(g.require_actor(Some(&bob())).is_ok());
        assert!(matches!(g.require_actor(None), Err(Error::NotAuthenticated)));
    }
}
