//! Per-field synchronization lifecycle.
//!
//! Each in-flight update is an explicit state rather than ad hoc flags, so
//! the keep-optimistic-value-on-failure rule is visible in the type: a field
//! that settles `Unsynced` still holds the user's value locally.

/// Outcome of a settled update round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    /// The authority acknowledged the value (possibly normalized).
    Synced,
    /// The authority was unreachable or rejected the request; the optimistic
    /// value stands locally and durably.
    Unsynced,
}

/// Lifecycle of one preference field's latest update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldSyncState {
    /// No update has touched this field since construction.
    #[default]
    Idle,
    /// The local document carries an optimistic value; the authority call
    /// has not been issued yet.
    Optimistic,
    /// The authority call is in flight.
    Reconciling,
    Settled(SettleOutcome),
}

impl FieldSyncState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Optimistic => "optimistic",
            Self::Reconciling => "reconciling",
            Self::Settled(SettleOutcome::Synced) => "synced",
            Self::Settled(SettleOutcome::Unsynced) => "unsynced",
        }
    }

    /// True while an update round trip has started but not settled.
    #[must_use]
    pub fn in_flight(self) -> bool {
        matches!(self, Self::Optimistic | Self::Reconciling)
    }

    #[must_use]
    pub fn is_unsynced(self) -> bool {
        matches!(self, Self::Settled(SettleOutcome::Unsynced))
    }
}
