//! Record under mutation.
//!
//! The host hands over the pending field values of a ticket or followup. Only a
//! handful of fields matter to the cleaner; everything else is carried through
//! untouched.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const NAME: &str = "name";
const CONTENT: &str = "content";
const MAILGATE: &str = "_mailgate";
const FILENAMES: &str = "_filename";
const TAGS: &str = "_tag";

/// Field values of a ticket or followup about to be written.
///
/// A known field sent as `null` stays in `extra` under its own key, so the
/// key is still present on the way back and still counts for
/// [`has_mail_attachments`](Self::has_mail_attachments). `_mailgate` keeps
/// any value, `null` included.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct MutatingRecord {
    /// Title.
    pub name: Option<String>,

    /// Body, stored entity-encoded.
    pub content: Option<String>,

    /// Present when the record comes from the mail gateway.
    pub mailgate: Option<Value>,

    /// Staged attachment file names, in mail order.
    pub filenames: Option<Vec<String>>,

    /// Inline tokens, parallel to `filenames`.
    pub tags: Option<Vec<String>>,

    /// Every other field.
    pub extra: Map<String, Value>,
}

fn take_field<T: DeserializeOwned>(
    fields: &mut Map<String, Value>,
    key: &str,
) -> std::result::Result<Option<T>, serde_json::Error> {
    match fields.remove(key) {
        None => Ok(None),
        Some(Value::Null) => {
            fields.insert(key.to_string(), Value::Null);
            Ok(None)
        },
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| serde::de::Error::custom(format!("field `{key}`: {e}"))),
    }
}

impl TryFrom<Map<String, Value>> for MutatingRecord {
    type Error = serde_json::Error;

    fn try_from(mut fields: Map<String, Value>) -> std::result::Result<Self, Self::Error> {
        let name = take_field(&mut fields, NAME)?;
        let content = take_field(&mut fields, CONTENT)?;
        let mailgate = fields.remove(MAILGATE);
        let filenames = take_field(&mut fields, FILENAMES)?;
        let tags = take_field(&mut fields, TAGS)?;
        Ok(Self {
            name,
            content,
            mailgate,
            filenames,
            tags,
            extra: fields,
        })
    }
}

impl From<MutatingRecord> for Map<String, Value> {
    fn from(record: MutatingRecord) -> Self {
        let mut fields = record.extra;
        if let Some(name) = record.name {
            fields.insert(NAME.to_string(), Value::String(name));
        }
        if let Some(content) = record.content {
            fields.insert(CONTENT.to_string(), Value::String(content));
        }
        if let Some(mailgate) = record.mailgate {
            fields.insert(MAILGATE.to_string(), mailgate);
        }
        if let Some(filenames) = record.filenames {
            fields.insert(FILENAMES.to_string(), Value::from(filenames));
        }
        if let Some(tags) = record.tags {
            fields.insert(TAGS.to_string(), Value::from(tags));
        }
        fields
    }
}

impl MutatingRecord {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the title.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Marks the record as coming from the mail gateway.
    #[must_use]
    pub fn via_mailgate(mut self, mailgate_id: i64) -> Self {
        self.mailgate = Some(Value::from(mailgate_id));
        self
    }

    /// Sets staged attachments and their inline tokens.
    #[must_use]
    pub fn with_attachments<F, T>(mut self, filenames: F, tags: T) -> Self
    where
        F: IntoIterator,
        F::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        self.filenames = Some(filenames.into_iter().map(Into::into).collect());
        let tags: Vec<String> = tags.into_iter().map(Into::into).collect();
        self.tags = (!tags.is_empty()).then_some(tags);
        self
    }

    /// Returns true if the record carries what the attachment pass needs:
    /// the mail gateway key, a title key and a non-empty attachment list.
    ///
    /// Key presence is what counts; `null` values qualify.
    #[must_use]
    pub fn has_mail_attachments(&self) -> bool {
        self.mailgate.is_some()
            && (self.name.is_some() || self.extra.contains_key(NAME))
            && self.filenames.as_ref().is_some_and(|f| !f.is_empty())
    }

    /// Parses a record from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the payload is not a JSON object of
    /// the expected shape.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidInput(format!("record: {e}")))
    }

    /// Serializes the record to JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a carried field cannot be serialized.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidInput(format!("record: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_carries_unknown_fields() {
        let json = r#"{"name":"t","content":"c","entities_id":3,"_users_id_requester":7}"#;
        let record = MutatingRecord::from_json(json).unwrap();
        assert_eq!(record.name.as_deref(), Some("t"));
        assert_eq!(record.extra.get("entities_id"), Some(&Value::from(3)));

        let back: Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
        assert_eq!(back["_users_id_requester"], Value::from(7));
        assert!(back.get("_filename").is_none());
    }

    #[test]
    fn test_mail_markers() {
        let json = r#"{"name":"t","_mailgate":1,"_filename":["a.png"],"_tag":["T1"]}"#;
        let record = MutatingRecord::from_json(json).unwrap();
        assert!(record.has_mail_attachments());
        assert_eq!(record.tags, Some(vec!["T1".to_string()]));
    }

    #[test]
    fn test_mail_markers_incomplete() {
        let no_gate = MutatingRecord::new()
            .with_name("t")
            .with_attachments(["a.png"], Vec::<String>::new());
        assert!(!no_gate.has_mail_attachments());

        let empty = MutatingRecord::new()
            .with_name("t")
            .via_mailgate(1)
            .with_attachments(Vec::<String>::new(), Vec::<String>::new());
        assert!(!empty.has_mail_attachments());

        let no_name = MutatingRecord::new()
            .via_mailgate(1)
            .with_attachments(["a.png"], ["T1"]);
        assert!(!no_name.has_mail_attachments());
    }

    #[test]
    fn test_null_keys_survive_round_trip() {
        let json = r#"{"name":null,"content":null,"_tag":null,"status":2}"#;
        let record = MutatingRecord::from_json(json).unwrap();
        assert_eq!(record.name, None);
        assert_eq!(record.tags, None);

        let back: Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
        assert_eq!(back, serde_json::from_str::<Value>(json).unwrap());
    }

    #[test]
    fn test_null_mailgate_and_title_still_qualify() {
        let json = r#"{"name":null,"_mailgate":null,"_filename":["a.png"]}"#;
        let record = MutatingRecord::from_json(json).unwrap();
        assert_eq!(record.mailgate, Some(Value::Null));
        assert!(record.has_mail_attachments());

        let back: Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
        assert!(back.as_object().unwrap().contains_key("_mailgate"));
    }

    #[test]
    fn test_set_field_replaces_null() {
        let mut record = MutatingRecord::from_json(r#"{"name":null}"#).unwrap();
        record.name = Some("t".to_string());
        let back: Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
        assert_eq!(back["name"], Value::from("t"));
    }

    #[test]
    fn test_wrong_type_names_field() {
        let err = MutatingRecord::from_json(r#"{"_filename":"a.png"}"#).unwrap_err();
        assert!(err.to_string().contains("_filename"));
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(matches!(
            MutatingRecord::from_json("[1,2]"),
            Err(Error::InvalidInput(_))
        ));
    }
}
