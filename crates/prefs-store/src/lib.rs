//! The preference store façade and its collaborators: a durable local slot
//! for the last-known document, an in-process broadcast bus that keeps every
//! live consumer convergent, and the update lifecycle (optimistic apply,
//! authority round trip, field-scoped reconciliation, persistence).

pub mod bus;
pub mod persist;
pub mod store;

pub use bus::{BroadcastMessage, BusSubscription, PreferenceBus};
pub use persist::{
    FilePreferenceStore, MemoryPreferenceStore, PersistError, PersistentStore, StoredPreferences,
};
pub use store::{
    LoadOutcome, LoadSource, PreferenceStore, StoreSubscription, UpdateOutcome, UpdateStatus,
};
