use serde::{Deserialize, Serialize};

pub const DEFAULT_DATE_FORMAT: &str = "DD/MM/YYYY";

/// The closed set of user preference fields. One field changes per update;
/// the set never grows at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrefField {
    DarkMode,
    FixedScroll,
    NotificationsOn,
    NewWidgetLayout,
    NewRecapsLayout,
    NewResearchFilesLayout,
    NumFormat,
    DateFormat,
    NotificationSound,
}

impl PrefField {
    pub const ALL: [PrefField; 9] = [
        PrefField::DarkMode,
        PrefField::FixedScroll,
        PrefField::NotificationsOn,
        PrefField::NewWidgetLayout,
        PrefField::NewRecapsLayout,
        PrefField::NewResearchFilesLayout,
        PrefField::NumFormat,
        PrefField::DateFormat,
        PrefField::NotificationSound,
    ];

    /// Internal field name, as used by the persisted document shape.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DarkMode => "darkMode",
            Self::FixedScroll => "fixedScroll",
            Self::NotificationsOn => "notificationsOn",
            Self::NewWidgetLayout => "newWidgetLayout",
            Self::NewRecapsLayout => "newRecapsLayout",
            Self::NewResearchFilesLayout => "newResearchFilesLayout",
            Self::NumFormat => "numFormat",
            Self::DateFormat => "dateFormat",
            Self::NotificationSound => "notificationSoundId",
        }
    }
}

/// Number formatting choice. The wire encodes this as 1 (EU) / 0 (US).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumFormat {
    #[serde(rename = "US Format")]
    Us,
    #[default]
    #[serde(rename = "EU Format")]
    Eu,
}

impl NumFormat {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Us => "US Format",
            Self::Eu => "EU Format",
        }
    }

    #[must_use]
    pub fn from_label(raw: &str) -> Option<Self> {
        match raw.trim() {
            "US Format" => Some(Self::Us),
            "EU Format" => Some(Self::Eu),
            _ => None,
        }
    }
}

/// Notification sound choice, persisted by its string id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationSound {
    #[serde(rename = "-1")]
    Silent,
    #[serde(rename = "1")]
    Chime,
    #[serde(rename = "2")]
    Ping,
    #[default]
    #[serde(rename = "0")]
    Default,
}

impl NotificationSound {
    #[must_use]
    pub fn id(self) -> i64 {
        match self {
            Self::Silent => -1,
            Self::Chime => 1,
            Self::Ping => 2,
            Self::Default => 0,
        }
    }

    /// Any id outside the known set falls back to the default sound.
    #[must_use]
    pub fn from_id(id: i64) -> Self {
        match id {
            -1 => Self::Silent,
            1 => Self::Chime,
            2 => Self::Ping,
            _ => Self::Default,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Silent => "Silent",
            Self::Chime => "Chime",
            Self::Ping => "Ping",
            Self::Default => "0",
        }
    }
}

/// A dynamically typed preference value, used by the single mutation entry
/// point and by reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub enum PrefValue {
    Flag(bool),
    NumFormat(NumFormat),
    Text(String),
    Sound(NotificationSound),
}

impl PrefValue {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Flag(_) => "flag",
            Self::NumFormat(_) => "num_format",
            Self::Text(_) => "text",
            Self::Sound(_) => "sound",
        }
    }
}

impl From<bool> for PrefValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<NumFormat> for PrefValue {
    fn from(value: NumFormat) -> Self {
        Self::NumFormat(value)
    }
}

impl From<NotificationSound> for PrefValue {
    fn from(value: NotificationSound) -> Self {
        Self::Sound(value)
    }
}

impl From<&str> for PrefValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PrefValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("pref_type_mismatch:{field}:{got}")]
    TypeMismatch { field: &'static str, got: &'static str },
}

/// The single locally held preferences document. Always fully populated:
/// every field carries a value from construction onward, so "unknown" is the
/// compiled-in default, never a missing key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceDocument {
    pub dark_mode: bool,
    pub fixed_scroll: bool,
    pub notifications_on: bool,
    pub new_widget_layout: bool,
    pub new_recaps_layout: bool,
    pub new_research_files_layout: bool,
    pub num_format: NumFormat,
    pub date_format: String,
    #[serde(rename = "notificationSoundId")]
    pub notification_sound: NotificationSound,
    /// Opaque freshness marker. Bumped on every applied change; never used
    /// for per-field conflict resolution.
    #[serde(default)]
    pub version: u64,
}

impl Default for PreferenceDocument {
    fn default() -> Self {
        Self {
            dark_mode: true,
            fixed_scroll: false,
            notifications_on: true,
            new_widget_layout: false,
            new_recaps_layout: false,
            new_research_files_layout: false,
            num_format: NumFormat::Eu,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            notification_sound: NotificationSound::Default,
            version: 0,
        }
    }
}

impl PreferenceDocument {
    #[must_use]
    pub fn value_of(&self, field: PrefField) -> PrefValue {
        match field {
            PrefField::DarkMode => PrefValue::Flag(self.dark_mode),
            PrefField::FixedScroll => PrefValue::Flag(self.fixed_scroll),
            PrefField::NotificationsOn => PrefValue::Flag(self.notifications_on),
            PrefField::NewWidgetLayout => PrefValue::Flag(self.new_widget_layout),
            PrefField::NewRecapsLayout => PrefValue::Flag(self.new_recaps_layout),
            PrefField::NewResearchFilesLayout => PrefValue::Flag(self.new_research_files_layout),
            PrefField::NumFormat => PrefValue::NumFormat(self.num_format),
            PrefField::DateFormat => PrefValue::Text(self.date_format.clone()),
            PrefField::NotificationSound => PrefValue::Sound(self.notification_sound),
        }
    }

    /// Sets one field from a dynamic value. Returns whether the stored value
    /// actually changed; the version counter is the caller's concern.
    pub fn apply(&mut self, field: PrefField, value: PrefValue) -> Result<bool, DocumentError> {
        let mismatch = || DocumentError::TypeMismatch {
            field: field.as_str(),
            got: value.kind(),
        };
        let changed = match (field, &value) {
            (PrefField::DarkMode, PrefValue::Flag(on)) => {
                let changed = self.dark_mode != *on;
                self.dark_mode = *on;
                changed
            }
            (PrefField::FixedScroll, PrefValue::Flag(on)) => {
                let changed = self.fixed_scroll != *on;
                self.fixed_scroll = *on;
                changed
            }
            (PrefField::NotificationsOn, PrefValue::Flag(on)) => {
                let changed = self.notifications_on != *on;
                self.notifications_on = *on;
                changed
            }
            (PrefField::NewWidgetLayout, PrefValue::Flag(on)) => {
                let changed = self.new_widget_layout != *on;
                self.new_widget_layout = *on;
                changed
            }
            (PrefField::NewRecapsLayout, PrefValue::Flag(on)) => {
                let changed = self.new_recaps_layout != *on;
                self.new_recaps_layout = *on;
                changed
            }
            (PrefField::NewResearchFilesLayout, PrefValue::Flag(on)) => {
                let changed = self.new_research_files_layout != *on;
                self.new_research_files_layout = *on;
                changed
            }
            (PrefField::NumFormat, PrefValue::NumFormat(format)) => {
                let changed = self.num_format != *format;
                self.num_format = *format;
                changed
            }
            (PrefField::DateFormat, PrefValue::Text(text)) => {
                let changed = self.date_format != *text;
                self.date_format = text.clone();
                changed
            }
            (PrefField::NotificationSound, PrefValue::Sound(sound)) => {
                let changed = self.notification_sound != *sound;
                self.notification_sound = *sound;
                changed
            }
            _ => return Err(mismatch()),
        };
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_cold_start_values() {
        let document = PreferenceDocument::default();
        assert!(document.dark_mode);
        assert!(!document.fixed_scroll);
        assert!(document.notifications_on);
        assert_eq!(document.num_format, NumFormat::Eu);
        assert_eq!(document.date_format, "DD/MM/YYYY");
        assert_eq!(document.notification_sound, NotificationSound::Default);
        assert_eq!(document.version, 0);
    }

    #[test]
    fn apply_reports_whether_the_value_changed() {
        let mut document = PreferenceDocument::default();
        let changed = document
            .apply(PrefField::DarkMode, PrefValue::Flag(false))
            .unwrap();
        assert!(changed);
        let unchanged = document
            .apply(PrefField::DarkMode, PrefValue::Flag(false))
            .unwrap();
        assert!(!unchanged);
        assert!(!document.dark_mode);
    }

    #[test]
    fn apply_rejects_mismatched_value_types() {
        let mut document = PreferenceDocument::default();
        let error = document
            .apply(PrefField::DarkMode, PrefValue::Text("oops".to_string()))
            .unwrap_err();
        assert_eq!(
            error,
            DocumentError::TypeMismatch {
                field: "darkMode",
                got: "text",
            }
        );
        // The document is untouched after a rejected apply.
        assert!(document.dark_mode);
    }

    #[test]
    fn value_of_round_trips_through_apply_for_every_field() {
        let mut document = PreferenceDocument::default();
        for field in PrefField::ALL {
            let value = document.value_of(field);
            let changed = document.apply(field, value).unwrap();
            assert!(!changed, "re-applying the current value must be a no-op");
        }
    }

    #[test]
    fn persisted_shape_uses_internal_field_names() {
        let document = PreferenceDocument::default();
        let json = serde_json::to_value(&document).unwrap();
        assert_eq!(json["darkMode"], serde_json::json!(true));
        assert_eq!(json["numFormat"], serde_json::json!("EU Format"));
        assert_eq!(json["dateFormat"], serde_json::json!("DD/MM/YYYY"));
        assert_eq!(json["notificationSoundId"], serde_json::json!("0"));
    }

    #[test]
    fn persisted_shape_round_trips() {
        let mut document = PreferenceDocument::default();
        document.num_format = NumFormat::Us;
        document.notification_sound = NotificationSound::Chime;
        document.version = 7;
        let encoded = serde_json::to_string(&document).unwrap();
        let decoded: PreferenceDocument = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, document);
    }

    #[test]
    fn notification_sound_ids_cover_the_wire_table() {
        assert_eq!(NotificationSound::Silent.id(), -1);
        assert_eq!(NotificationSound::Chime.id(), 1);
        assert_eq!(NotificationSound::Ping.id(), 2);
        assert_eq!(NotificationSound::Default.id(), 0);
        assert_eq!(NotificationSound::from_id(99), NotificationSound::Default);
        assert_eq!(NotificationSound::Silent.label(), "Silent");
        assert_eq!(NotificationSound::Default.label(), "0");
    }
}
