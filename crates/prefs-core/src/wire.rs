//! Wire mapping against the upstream preferences API.
//!
//! Internal field names translate to fixed wire names on the write path, and
//! the authority's full-document responses come back under `LoggedInX`
//! variants of those names. Translation happens only at this boundary; the
//! persisted document keeps internal names.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::document::{NotificationSound, NumFormat, PrefField, PrefValue};

impl PrefField {
    /// Wire field name used in single-field write requests.
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::DarkMode => "darkModeOn",
            Self::FixedScroll => "fixedScrollOn",
            Self::NotificationsOn => "notificationOn",
            Self::NewWidgetLayout => "newWidgetLayout",
            Self::NewRecapsLayout => "recapsStyle",
            Self::NewResearchFilesLayout => "rFilesStyle",
            Self::NumFormat => "numFormat",
            Self::DateFormat => "dateFormat",
            Self::NotificationSound => "notificationSoundId",
        }
    }
}

/// Encodes one preference value the way the wire expects it for the given
/// field: 1/0 for most flags, a plain boolean for `notificationOn`, 1/0 for
/// the number format, raw string passthrough for the date format, and the
/// numeric sound id.
#[must_use]
pub fn encode_wire_value(field: PrefField, value: &PrefValue) -> Value {
    match (field, value) {
        (PrefField::NotificationsOn, PrefValue::Flag(on)) => json!(on),
        (_, PrefValue::Flag(on)) => json!(i64::from(*on)),
        (_, PrefValue::NumFormat(format)) => match format {
            NumFormat::Eu => json!(1),
            NumFormat::Us => json!(0),
        },
        (_, PrefValue::Text(text)) => json!(text),
        (_, PrefValue::Sound(sound)) => json!(sound.id()),
    }
}

/// Builds the write request body: the user id plus exactly the one changed
/// field, never the rest of the document.
#[must_use]
pub fn write_request_body(user_id: u64, field: PrefField, value: &PrefValue) -> Value {
    let mut body = serde_json::Map::new();
    body.insert("userId".to_string(), json!(user_id));
    body.insert(field.wire_name().to_string(), encode_wire_value(field, value));
    Value::Object(body)
}

/// The authority's full-document response shape. Every field is optional and
/// loosely typed; decoding is per-field so one malformed value never poisons
/// the rest of the response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorityPreferencesResponse {
    #[serde(default, rename = "LoggedInDarkModeOn")]
    pub dark_mode_on: Option<Value>,
    #[serde(default, rename = "LoggedInFixedScrollOn")]
    pub fixed_scroll_on: Option<Value>,
    #[serde(default, rename = "LoggedInNotificationOn")]
    pub notification_on: Option<Value>,
    #[serde(default, rename = "LoggedInNewWidgetLayout")]
    pub new_widget_layout: Option<Value>,
    #[serde(default, rename = "LoggedInRecapsStyle")]
    pub recaps_style: Option<Value>,
    #[serde(default, rename = "LoggedInRFilesStyle")]
    pub r_files_style: Option<Value>,
    #[serde(default, rename = "LoggedInNumFormat")]
    pub num_format: Option<Value>,
    #[serde(default, rename = "LoggedInDateFormat")]
    pub date_format: Option<Value>,
    #[serde(default, rename = "LoggedInNotificationSoundId")]
    pub notification_sound_id: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl AuthorityPreferencesResponse {
    #[must_use]
    pub fn decode(&self) -> AuthorityFields {
        AuthorityFields {
            dark_mode: self.dark_mode_on.as_ref().and_then(decode_flag),
            fixed_scroll: self.fixed_scroll_on.as_ref().and_then(decode_flag),
            notifications_on: self.notification_on.as_ref().and_then(decode_flag),
            new_widget_layout: self.new_widget_layout.as_ref().and_then(decode_flag),
            new_recaps_layout: self.recaps_style.as_ref().and_then(decode_flag),
            new_research_files_layout: self.r_files_style.as_ref().and_then(decode_flag),
            num_format: self.num_format.as_ref().and_then(decode_num_format),
            date_format: self.date_format.as_ref().and_then(decode_text),
            notification_sound: self.notification_sound_id.as_ref().and_then(decode_sound),
        }
    }
}

/// Decoded per-field view of an authority response. `None` means the
/// authority did not mention the field (or sent something undecodable);
/// reconciliation treats both identically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthorityFields {
    pub dark_mode: Option<bool>,
    pub fixed_scroll: Option<bool>,
    pub notifications_on: Option<bool>,
    pub new_widget_layout: Option<bool>,
    pub new_recaps_layout: Option<bool>,
    pub new_research_files_layout: Option<bool>,
    pub num_format: Option<NumFormat>,
    pub date_format: Option<String>,
    pub notification_sound: Option<NotificationSound>,
}

impl AuthorityFields {
    #[must_use]
    pub fn value_of(&self, field: PrefField) -> Option<PrefValue> {
        match field {
            PrefField::DarkMode => self.dark_mode.map(PrefValue::Flag),
            PrefField::FixedScroll => self.fixed_scroll.map(PrefValue::Flag),
            PrefField::NotificationsOn => self.notifications_on.map(PrefValue::Flag),
            PrefField::NewWidgetLayout => self.new_widget_layout.map(PrefValue::Flag),
            PrefField::NewRecapsLayout => self.new_recaps_layout.map(PrefValue::Flag),
            PrefField::NewResearchFilesLayout => {
                self.new_research_files_layout.map(PrefValue::Flag)
            }
            PrefField::NumFormat => self.num_format.map(PrefValue::NumFormat),
            PrefField::DateFormat => self.date_format.clone().map(PrefValue::Text),
            PrefField::NotificationSound => self.notification_sound.map(PrefValue::Sound),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        PrefField::ALL.iter().all(|field| self.value_of(*field).is_none())
    }
}

fn decode_flag(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(on) => Some(*on),
        Value::Number(number) => number.as_i64().map(|n| n != 0),
        Value::String(text) => match text.trim() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn decode_num_format(raw: &Value) -> Option<NumFormat> {
    match decode_flag(raw) {
        Some(true) => Some(NumFormat::Eu),
        Some(false) => Some(NumFormat::Us),
        None => match raw {
            Value::String(text) => NumFormat::from_label(text),
            _ => None,
        },
    }
}

fn decode_text(raw: &Value) -> Option<String> {
    match raw {
        Value::String(text) => Some(text.clone()),
        _ => None,
    }
}

fn decode_sound(raw: &Value) -> Option<NotificationSound> {
    match raw {
        Value::Number(number) => number.as_i64().map(NotificationSound::from_id),
        Value::String(text) => text.trim().parse::<i64>().ok().map(NotificationSound::from_id),
        _ => None,
    }
}
