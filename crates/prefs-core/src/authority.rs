//! The seam between the store façade and the remote authority.
//!
//! The store never assumes the authority is reachable; every failure mode
//! maps onto one of three recoverable variants and the optimistic local
//! value is kept either way.

use async_trait::async_trait;

use crate::reconcile::UpdateIntent;
use crate::wire::AuthorityFields;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthorityFailure {
    /// Network error or timeout; nothing reached the authority (or nothing
    /// came back).
    #[error("authority_unreachable:{message}")]
    Unreachable { message: String },
    /// The authority answered with a non-2xx status.
    #[error("authority_rejected_{status}:{message}")]
    Rejected { status: u16, message: String },
    /// The authority answered 2xx but the body was not the expected shape.
    /// Treated as an absent response by reconciliation.
    #[error("authority_malformed:{message}")]
    Malformed { message: String },
}

impl AuthorityFailure {
    /// Human-readable message for optional display by the caller.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Unreachable { message }
            | Self::Rejected { message, .. }
            | Self::Malformed { message } => message,
        }
    }
}

/// Remote authority operations. Implemented over HTTP by
/// `tickerdesk-authority-client` and by scripted mocks in tests.
#[async_trait]
pub trait AuthorityTransport: Send + Sync {
    /// Cold-load read: no body, full document back.
    async fn fetch_preferences(&self, user_id: u64) -> Result<AuthorityFields, AuthorityFailure>;

    /// Single-field write; the response is the authority's full document.
    async fn push_preference(
        &self,
        user_id: u64,
        intent: &UpdateIntent,
    ) -> Result<AuthorityFields, AuthorityFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_messages_render_machine_readable() {
        let unreachable = AuthorityFailure::Unreachable {
            message: "connect timeout".to_string(),
        };
        assert_eq!(unreachable.to_string(), "authority_unreachable:connect timeout");

        let rejected = AuthorityFailure::Rejected {
            status: 503,
            message: "maintenance".to_string(),
        };
        assert_eq!(rejected.to_string(), "authority_rejected_503:maintenance");
        assert_eq!(rejected.message(), "maintenance");
    }
}
