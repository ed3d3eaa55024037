//! Core domain for terminal preference synchronization: the preference
//! document and its compiled-in defaults, the wire-name mapping against the
//! upstream preferences API, the field-scoped reconciliation engine, and the
//! transport seam the store façade depends on.
//!
//! Everything here is pure data and pure logic; networking lives in
//! `tickerdesk-authority-client` and lifecycle/persistence in
//! `tickerdesk-prefs-store`.

pub mod authority;
pub mod document;
pub mod reconcile;
pub mod state;
pub mod wire;

pub use authority::{AuthorityFailure, AuthorityTransport};
pub use document::{
    DocumentError, NotificationSound, NumFormat, PrefField, PrefValue, PreferenceDocument,
};
pub use reconcile::{UpdateIntent, reconcile};
pub use state::{FieldSyncState, SettleOutcome};
pub use wire::AuthorityFields;
