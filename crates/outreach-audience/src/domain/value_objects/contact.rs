//! Contact record as seen by this core
//!
//! A flat bag of field values plus the subscription flag. Records are
//! produced by the contact store and the duplicate detector and are never
//! mutated here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{Email, EntityId, ScalarValue};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRecord {
    pub id: EntityId,
    #[serde(default)]
    pub fields: HashMap<String, ScalarValue>,
    #[serde(default)]
    pub unsubscribed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ContactRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: EntityId::from_string(id),
            fields: HashMap::new(),
            unsubscribed: false,
            created_at: None,
        }
    }

    /// Builder-style field setter
    pub fn with(mut self, field_key: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        self.fields.insert(field_key.into(), value.into());
        self
    }

    pub fn unsubscribed(mut self) -> Self {
        self.unsubscribed = true;
        self
    }

    pub fn value(&self, field_key: &str) -> Option<&ScalarValue> {
        self.fields.get(field_key)
    }

    /// Whether the value stored under `email_field` is a deliverable address
    pub fn has_valid_email(&self, email_field: &str) -> bool {
        self.value(email_field)
            .and_then(ScalarValue::as_text)
            .map(Email::is_deliverable)
            .unwrap_or(false)
    }
}
