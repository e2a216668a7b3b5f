//! One-shot authentication of a freshly opened connection.
//!
//! The first frame on every socket must be `{"type":"auth","token":"<bearer>"}`. The gate
//! verifies the token and, for group chat sockets, the caller's membership. It never
//! writes to the transport itself; the session sends the acknowledgement or the
//! diagnostic returned by [`AuthErrorKind::diagnostic`](crate::error::AuthErrorKind::diagnostic).

use events::GroupId;
use log::*;
use std::sync::Arc;

use crate::collaborators::{AuthenticatedUser, GroupDirectory, TokenVerifier};
use crate::error::{AuthErrorKind, Error, HubErrorKind};
use crate::message::AuthFrame;

/// What a socket was opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Direct messages and notifications for the authenticated user.
    User,
    /// Chat for a single group; requires membership.
    Group(GroupId),
}

#[derive(Clone)]
pub struct AuthGate {
    verifier: Arc<dyn TokenVerifier>,
    groups: Arc<dyn GroupDirectory>,
}

impl AuthGate {
    pub fn new(verifier: Arc<dyn TokenVerifier>, groups: Arc<dyn GroupDirectory>) -> Self {
        Self { verifier, groups }
    }

    /// Decides whether the connection that sent `first_frame` may be admitted.
    pub async fn admit(&self, first_frame: &str, scope: Scope) -> Result<AuthenticatedUser, Error> {
        let frame: AuthFrame = serde_json::from_str(first_frame).map_err(|e| {
            debug!("Auth frame is not valid JSON: {e}");
            Error::with_source(HubErrorKind::Auth(AuthErrorKind::MalformedFrame), e)
        })?;

        if frame.kind != "auth" || frame.token.trim().is_empty() {
            debug!("Auth frame of type {:?} carried no usable token", frame.kind);
            return Err(Error::auth(AuthErrorKind::MissingToken));
        }

        let user = self.verifier.verify(frame.token.trim()).await.map_err(|e| {
            Error::with_source(HubErrorKind::Auth(AuthErrorKind::InvalidToken), e)
        })?;

        if let Scope::Group(group_id) = scope {
            match self.groups.is_group_member(user.user_id, group_id).await {
                Ok(true) => {}
                Ok(false) => {
                    info!(
                        "User {} is not a member of group {group_id}; rejecting connection",
                        user.user_id
                    );
                    return Err(Error::auth(AuthErrorKind::NotGroupMember));
                }
                Err(e) => {
                    warn!(
                        "Failed to verify membership of user {} in group {group_id}: {e}",
                        user.user_id
                    );
                    return Err(Error::with_source(
                        HubErrorKind::Auth(AuthErrorKind::MembershipUnavailable),
                        e,
                    ));
                }
            }
        }

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::memory::InMemoryGroupStore;
    use crate::test_support::{FailingDirectory, StaticVerifier};

    fn gate() -> AuthGate {
        AuthGate::new(
            Arc::new(StaticVerifier::with_users([("tok-1", 1, "alice"), ("tok-2", 2, "bob")])),
            Arc::new(InMemoryGroupStore::with_members([(42, vec![1])])),
        )
    }

    fn kind(result: Result<AuthenticatedUser, Error>) -> HubErrorKind {
        result.unwrap_err().error_kind
    }

    #[tokio::test]
    async fn test_valid_token_admits_user_socket() {
        let user = gate()
            .admit(r#"{"type":"auth","token":"tok-2"}"#, Scope::User)
            .await
            .unwrap();
        assert_eq!(user.user_id, 2);
        assert_eq!(user.display_name, "bob");
    }

    #[tokio::test]
    async fn test_member_admitted_to_group_socket() {
        let user = gate()
            .admit(r#"{"type":"auth","token":"tok-1"}"#, Scope::Group(42))
            .await
            .unwrap();
        assert_eq!(user.user_id, 1);
    }

    #[tokio::test]
    async fn test_rejects_malformed_frame() {
        assert_eq!(
            kind(gate().admit("hello", Scope::User).await),
            HubErrorKind::Auth(AuthErrorKind::MalformedFrame)
        );
    }

    #[tokio::test]
    async fn test_rejects_wrong_type() {
        assert_eq!(
            kind(gate().admit(r#"{"type":"login","token":"tok-1"}"#, Scope::User).await),
            HubErrorKind::Auth(AuthErrorKind::MissingToken)
        );
    }

    #[tokio::test]
    async fn test_rejects_empty_or_missing_token() {
        assert_eq!(
            kind(gate().admit(r#"{"type":"auth","token":""}"#, Scope::User).await),
            HubErrorKind::Auth(AuthErrorKind::MissingToken)
        );
        assert_eq!(
            kind(gate().admit(r#"{"type":"auth"}"#, Scope::User).await),
            HubErrorKind::Auth(AuthErrorKind::MissingToken)
        );
    }

    #[tokio::test]
    async fn test_rejects_verifier_failure() {
        assert_eq!(
            kind(gate().admit(r#"{"type":"auth","token":"forged"}"#, Scope::User).await),
            HubErrorKind::Auth(AuthErrorKind::InvalidToken)
        );
    }

    #[tokio::test]
    async fn test_rejects_non_member() {
        assert_eq!(
            kind(gate().admit(r#"{"type":"auth","token":"tok-2"}"#, Scope::Group(42)).await),
            HubErrorKind::Auth(AuthErrorKind::NotGroupMember)
        );
    }

    #[tokio::test]
    async fn test_rejects_when_membership_unavailable() {
        let gate = AuthGate::new(
            Arc::new(StaticVerifier::with_users([("tok-1", 1, "alice")])),
            Arc::new(FailingDirectory),
        );
        assert_eq!(
            kind(gate.admit(r#"{"type":"auth","token":"tok-1"}"#, Scope::Group(42)).await),
            HubErrorKind::Auth(AuthErrorKind::MembershipUnavailable)
        );
    }
}
