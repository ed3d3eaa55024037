//! Field-scoped reconciliation of an optimistic local document against the
//! authority's response.
//!
//! The authority echoes the full document on every write, including defaults
//! and stale values for fields the caller never asked to change. Overwriting
//! the whole local document with that echo would silently revert the user's
//! other settings, so reconciliation is per field: only the field named by
//! the intent may move, and for that field the authority's decoded value
//! outranks the optimistic guess.

use crate::document::{PrefField, PrefValue, PreferenceDocument};
use crate::wire::AuthorityFields;

/// One user-initiated change. Exactly one field per intent; intents are
/// consumed by a single authority round trip and never queued or retried.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateIntent {
    pub field: PrefField,
    pub value: PrefValue,
}

impl UpdateIntent {
    #[must_use]
    pub fn new(field: PrefField, value: impl Into<PrefValue>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }
}

/// Computes the next local document. Precedence, per field:
///
/// 1. intent field + authority echoed it: the authority's decoded value wins
///    (the authority may normalize or reject the requested value);
/// 2. intent field + no response / field absent: the optimistic value stands;
/// 3. any other field: the previous local value wins, whatever the authority
///    echoed for it;
/// 4. defaults are already baked into `previous` (the document is always
///    fully populated), so absence everywhere resolves to the default.
///
/// The version counter is untouched; bumping it is the caller's concern.
#[must_use]
pub fn reconcile(
    previous: &PreferenceDocument,
    intent: &UpdateIntent,
    authority: Option<&AuthorityFields>,
) -> PreferenceDocument {
    let mut next = previous.clone();
    let winner = authority
        .and_then(|fields| fields.value_of(intent.field))
        .unwrap_or_else(|| intent.value.clone());
    // A type mismatch cannot occur for decoded authority values and the
    // intent was validated by the optimistic apply; keep the previous value
    // if it somehow does.
    if next.apply(intent.field, winner).is_err() {
        return previous.clone();
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{NotificationSound, NumFormat};

    fn fields() -> AuthorityFields {
        AuthorityFields::default()
    }

    #[test]
    fn authority_value_wins_on_the_touched_field() {
        let previous = PreferenceDocument::default();
        let intent = UpdateIntent::new(PrefField::DarkMode, false);
        let authority = AuthorityFields {
            // The authority refused the change and echoed the old value.
            dark_mode: Some(true),
            ..fields()
        };
        let next = reconcile(&previous, &intent, Some(&authority));
        assert!(next.dark_mode);
    }

    #[test]
    fn optimistic_value_stands_when_authority_is_absent() {
        let previous = PreferenceDocument::default();
        let intent = UpdateIntent::new(PrefField::DarkMode, false);
        let next = reconcile(&previous, &intent, None);
        assert!(!next.dark_mode);
    }

    #[test]
    fn optimistic_value_stands_when_authority_omits_the_field() {
        let previous = PreferenceDocument::default();
        let intent = UpdateIntent::new(PrefField::FixedScroll, true);
        let authority = AuthorityFields {
            dark_mode: Some(false),
            ..fields()
        };
        let next = reconcile(&previous, &intent, Some(&authority));
        assert!(next.fixed_scroll);
        // dark_mode was not part of the intent: the echo is ignored.
        assert!(next.dark_mode);
    }

    #[test]
    fn untouched_fields_ignore_stale_authority_echoes() {
        let mut previous = PreferenceDocument::default();
        previous.notification_sound = NotificationSound::Chime;
        let intent = UpdateIntent::new(PrefField::DarkMode, false);
        let authority = AuthorityFields {
            dark_mode: Some(false),
            // Stale echoes for fields the intent never named.
            notifications_on: Some(false),
            notification_sound: Some(NotificationSound::Default),
            num_format: Some(NumFormat::Us),
            date_format: Some(String::new()),
            ..fields()
        };
        let next = reconcile(&previous, &intent, Some(&authority));
        assert!(!next.dark_mode);
        assert!(next.notifications_on);
        assert_eq!(next.notification_sound, NotificationSound::Chime);
        assert_eq!(next.num_format, NumFormat::Eu);
        assert_eq!(next.date_format, "DD/MM/YYYY");
    }

    #[test]
    fn num_format_update_keeps_date_format_despite_empty_echo() {
        // Scenario: the authority confirms the number format change but
        // echoes an empty date format; the local date format must survive.
        let previous = PreferenceDocument::default();
        assert_eq!(previous.date_format, "DD/MM/YYYY");
        let intent = UpdateIntent::new(PrefField::NumFormat, NumFormat::Us);
        let authority = AuthorityFields {
            num_format: Some(NumFormat::Us),
            date_format: Some(String::new()),
            ..fields()
        };
        let next = reconcile(&previous, &intent, Some(&authority));
        assert_eq!(next.num_format, NumFormat::Us);
        assert_eq!(next.date_format, "DD/MM/YYYY");
    }

    #[test]
    fn authority_normalization_overrides_the_optimistic_guess() {
        let previous = PreferenceDocument::default();
        let intent = UpdateIntent::new(PrefField::NotificationSound, NotificationSound::Ping);
        let authority = AuthorityFields {
            notification_sound: Some(NotificationSound::Default),
            ..fields()
        };
        let next = reconcile(&previous, &intent, Some(&authority));
        assert_eq!(next.notification_sound, NotificationSound::Default);
    }

    #[test]
    fn reconcile_never_touches_the_version_counter() {
        let mut previous = PreferenceDocument::default();
        previous.version = 9;
        let intent = UpdateIntent::new(PrefField::DarkMode, false);
        let next = reconcile(&previous, &intent, None);
        assert_eq!(next.version, 9);
    }
}
