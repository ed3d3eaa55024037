//! The preference store façade.
//!
//! One instance owns one consumer's in-memory document. `update` applies the
//! value optimistically and broadcasts before the authority round trip, then
//! reconciles field-by-field against the response; failures keep the
//! optimistic value and settle the field as unsynced. Same-field updates
//! racing through the network resolve last-write-wins by completion order;
//! a per-field sequence token would close that window but the observed
//! upstream behavior accepts the race, and this store matches it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tickerdesk_prefs_core::{
    AuthorityFailure, AuthorityTransport, DocumentError, FieldSyncState, PrefField, PrefValue,
    PreferenceDocument, SettleOutcome, UpdateIntent, reconcile,
};
use uuid::Uuid;

use crate::bus::{BroadcastMessage, BusSubscription, PreferenceBus};
use crate::persist::PersistentStore;

/// Which source ended up providing the cold-load document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Authority,
    Persisted,
    Defaults,
}

impl LoadSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authority => "authority",
            Self::Persisted => "persisted",
            Self::Defaults => "defaults",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome {
    pub source: LoadSource,
    pub document: PreferenceDocument,
}

/// Result of one update round trip. Network failures are values here, never
/// errors: the caller that ignores the status still holds a locally
/// consistent (if unsynced) document.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateStatus {
    /// The value was already current; nothing happened.
    Noop,
    /// The authority acknowledged the change.
    Synced,
    /// The authority was unreachable, rejected the change, or answered with
    /// garbage; the optimistic value is kept locally and durably.
    Unsynced(AuthorityFailure),
}

impl UpdateStatus {
    #[must_use]
    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced | Self::Noop)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub status: UpdateStatus,
    pub document: PreferenceDocument,
}

type ChangeHandler = Arc<dyn Fn(&PreferenceDocument) + Send + Sync>;

struct Inner {
    document: PreferenceDocument,
    field_states: HashMap<PrefField, FieldSyncState>,
    subscribers: Vec<(Uuid, ChangeHandler)>,
}

impl Inner {
    fn handlers(&self) -> Vec<ChangeHandler> {
        self.subscribers
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect()
    }
}

/// One consumer's view of the preferences document.
///
/// The document is privately owned; other instances converge through full
/// snapshots on the shared [`PreferenceBus`], so no cross-instance locking
/// exists. The interior mutex is never held across an await.
pub struct PreferenceStore {
    user_id: u64,
    origin_id: Uuid,
    transport: Arc<dyn AuthorityTransport>,
    persistence: Arc<dyn PersistentStore>,
    bus: PreferenceBus,
    inner: Arc<Mutex<Inner>>,
    _incoming: BusSubscription,
}

impl PreferenceStore {
    pub fn new(
        user_id: u64,
        transport: Arc<dyn AuthorityTransport>,
        persistence: Arc<dyn PersistentStore>,
        bus: PreferenceBus,
    ) -> Self {
        let origin_id = Uuid::new_v4();
        let inner = Arc::new(Mutex::new(Inner {
            document: PreferenceDocument::default(),
            field_states: HashMap::new(),
            subscribers: Vec::new(),
        }));

        let incoming_inner = Arc::clone(&inner);
        let incoming = bus.subscribe(origin_id, move |message: &BroadcastMessage| {
            let (snapshot, handlers) = {
                let mut inner = lock_inner(&incoming_inner);
                if inner.document == message.preferences {
                    return;
                }
                // Foreign snapshots replace wholesale; merging would require
                // cross-instance ordering the design deliberately avoids.
                inner.document = message.preferences.clone();
                (inner.document.clone(), inner.handlers())
            };
            for handler in &handlers {
                handler(&snapshot);
            }
        });

        Self {
            user_id,
            origin_id,
            transport,
            persistence,
            bus,
            inner,
            _incoming: incoming,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    #[must_use]
    pub fn origin_id(&self) -> Uuid {
        self.origin_id
    }

    #[must_use]
    pub fn document(&self) -> PreferenceDocument {
        lock_inner(&self.inner).document.clone()
    }

    #[must_use]
    pub fn sync_state(&self, field: PrefField) -> FieldSyncState {
        lock_inner(&self.inner)
            .field_states
            .get(&field)
            .copied()
            .unwrap_or_default()
    }

    /// True when no field is mid-flight or settled unsynced.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        let inner = lock_inner(&self.inner);
        inner
            .field_states
            .values()
            .all(|state| !state.in_flight() && !state.is_unsynced())
    }

    /// Registers a change callback. Fires on local updates, cold loads, and
    /// foreign broadcasts; never for no-op updates. The guard unsubscribes
    /// on drop.
    pub fn subscribe(
        &self,
        handler: impl Fn(&PreferenceDocument) + Send + Sync + 'static,
    ) -> StoreSubscription {
        let id = Uuid::new_v4();
        let mut inner = lock_inner(&self.inner);
        inner.subscribers.push((id, Arc::new(handler)));
        StoreSubscription {
            id,
            inner: Arc::clone(&self.inner),
        }
    }

    /// Cold start: authority first, persisted snapshot second, compiled-in
    /// defaults last. Does not broadcast; a cold load is per-instance state
    /// acquisition, not a state change other instances need to hear about.
    pub async fn load(&self) -> LoadOutcome {
        match self.transport.fetch_preferences(self.user_id).await {
            Ok(fields) => {
                let (document, handlers, changed) = {
                    let mut inner = lock_inner(&self.inner);
                    let mut changed = false;
                    for field in PrefField::ALL {
                        if let Some(value) = fields.value_of(field) {
                            match inner.document.apply(field, value) {
                                Ok(applied) => changed |= applied,
                                Err(error) => {
                                    tracing::warn!(
                                        field = field.as_str(),
                                        error = %error,
                                        "skipping undecodable authority field on load"
                                    );
                                }
                            }
                        }
                    }
                    if changed {
                        inner.document.version += 1;
                    }
                    (inner.document.clone(), inner.handlers(), changed)
                };
                self.persist(&document);
                if changed {
                    for handler in &handlers {
                        handler(&document);
                    }
                }
                LoadOutcome {
                    source: LoadSource::Authority,
                    document,
                }
            }
            Err(failure) => {
                tracing::warn!(error = %failure, "cold load failed; falling back to local state");
                self.load_local()
            }
        }
    }

    fn load_local(&self) -> LoadOutcome {
        let persisted = match self.persistence.load() {
            Ok(persisted) => persisted,
            Err(error) => {
                tracing::warn!(error = %error, "persisted preferences unreadable");
                None
            }
        };
        match persisted {
            Some(saved) => {
                let (document, handlers, changed) = {
                    let mut inner = lock_inner(&self.inner);
                    let changed = inner.document != saved;
                    inner.document = saved;
                    (inner.document.clone(), inner.handlers(), changed)
                };
                if changed {
                    for handler in &handlers {
                        handler(&document);
                    }
                }
                LoadOutcome {
                    source: LoadSource::Persisted,
                    document,
                }
            }
            None => LoadOutcome {
                source: LoadSource::Defaults,
                document: self.document(),
            },
        }
    }

    /// The single mutation entry point. Optimistic apply and broadcast,
    /// then a single-field authority request, then field-scoped
    /// reconciliation. Only a type-mismatched value is an `Err`; every
    /// network failure is an `UpdateStatus::Unsynced` value.
    pub async fn update(
        &self,
        field: PrefField,
        value: impl Into<PrefValue>,
    ) -> Result<UpdateOutcome, DocumentError> {
        let value = value.into();
        let intent = UpdateIntent::new(field, value.clone());

        let (optimistic, handlers) = {
            let mut inner = lock_inner(&self.inner);
            let changed = inner.document.apply(field, value)?;
            if !changed {
                return Ok(UpdateOutcome {
                    status: UpdateStatus::Noop,
                    document: inner.document.clone(),
                });
            }
            inner.document.version += 1;
            inner.field_states.insert(field, FieldSyncState::Optimistic);
            (inner.document.clone(), inner.handlers())
        };

        // The UI sees the change before any network traffic.
        for handler in &handlers {
            handler(&optimistic);
        }
        self.bus.emit(&BroadcastMessage {
            origin_id: self.origin_id,
            preferences: optimistic.clone(),
        });

        {
            let mut inner = lock_inner(&self.inner);
            inner
                .field_states
                .insert(field, FieldSyncState::Reconciling);
        }

        let result = self.transport.push_preference(self.user_id, &intent).await;

        let (status, document, adjusted_handlers) = {
            let mut inner = lock_inner(&self.inner);
            let (authority, status) = match result {
                Ok(fields) => (Some(fields), UpdateStatus::Synced),
                Err(failure) => {
                    tracing::warn!(
                        field = field.as_str(),
                        error = %failure,
                        "preference update failed; keeping optimistic value"
                    );
                    (None, UpdateStatus::Unsynced(failure))
                }
            };
            let outcome = if status.is_synced() {
                SettleOutcome::Synced
            } else {
                SettleOutcome::Unsynced
            };
            inner
                .field_states
                .insert(field, FieldSyncState::Settled(outcome));

            // Reconcile against the live document so concurrent updates to
            // other fields are not reverted.
            let reconciled = reconcile(&inner.document, &intent, authority.as_ref());
            let adjusted = reconciled != inner.document;
            if adjusted {
                inner.document = reconciled;
                inner.document.version += 1;
            }
            let handlers = if adjusted { inner.handlers() } else { Vec::new() };
            (status, inner.document.clone(), handlers)
        };

        if !adjusted_handlers.is_empty() {
            tracing::debug!(
                field = field.as_str(),
                "authority normalized the optimistic value"
            );
            for handler in &adjusted_handlers {
                handler(&document);
            }
            self.bus.emit(&BroadcastMessage {
                origin_id: self.origin_id,
                preferences: document.clone(),
            });
        }

        // Persist even on failure so a reload keeps the user's intent.
        self.persist(&document);

        Ok(UpdateOutcome { status, document })
    }

    fn persist(&self, document: &PreferenceDocument) {
        if let Err(error) = self.persistence.store(document) {
            tracing::warn!(error = %error, "preference persistence failed");
        }
    }
}

/// Unsubscribes its change callback when dropped.
pub struct StoreSubscription {
    id: Uuid,
    inner: Arc<Mutex<Inner>>,
}

impl Drop for StoreSubscription {
    fn drop(&mut self) {
        let mut inner = lock_inner(&self.inner);
        inner.subscribers.retain(|(id, _)| *id != self.id);
    }
}

fn lock_inner(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
