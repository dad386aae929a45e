// SPDX-License-Identifier: MIT OR Apache-2.0

use super::value::AttributeValue;
use crate::core::error::{CepError, CepResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A shared reference to an immutable event.
///
/// Partial matches hold events through this handle so that an event bound into
/// many partial matches is never copied.
pub type SharedEvent = Arc<Event>;

/// An immutable, timestamped stream event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event type name, matched against primitive pattern structures
    pub event_type: Arc<str>,
    /// Event time in milliseconds
    pub timestamp: i64,
    /// Event payload
    pub payload: HashMap<String, AttributeValue>,
}

impl Event {
    pub fn new(event_type: impl Into<Arc<str>>, timestamp: i64) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp,
            payload: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Build an event from a JSON object payload
    pub fn from_json(
        event_type: impl Into<Arc<str>>,
        timestamp: i64,
        payload: &serde_json::Value,
    ) -> CepResult<Self> {
        let object = payload.as_object().ok_or_else(|| {
            CepError::invalid_pattern(format!("event payload must be a JSON object, got {}", payload))
        })?;
        let payload = object
            .iter()
            .map(|(k, v)| (k.clone(), AttributeValue::from_json(v)))
            .collect();
        Ok(Self {
            event_type: event_type.into(),
            timestamp,
            payload,
        })
    }

    #[inline]
    pub fn get(&self, attribute: &str) -> Option<&AttributeValue> {
        self.payload.get(attribute)
    }

    pub fn into_shared(self) -> SharedEvent {
        Arc::new(self)
    }
}
