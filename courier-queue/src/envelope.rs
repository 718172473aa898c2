//! The wire-level unit placed onto a queue.
//!
//! A [`QueueEnvelope`] carries the serialized mail message as an opaque
//! payload, plus the metadata a downstream delivery worker needs: the
//! original recipient list (under [`RECIPIENTS_PROPERTY`]), the priority,
//! the delivery mode and an optional time-to-live.
//!
//! Envelopes travel between processes as bincode frames, see
//! [`QueueEnvelope::encode`] and [`QueueEnvelope::decode`].

use std::{collections::BTreeMap, time::Duration};

use courier_common::RecipientAddress;
use serde::{Deserialize, Serialize};

use crate::error::SerializationError;

/// Property under which the original recipient list travels.
pub const RECIPIENTS_PROPERTY: &str = "addresses";

/// Message priority, `0` (lowest) to `9` (highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Priority(u8);

impl Priority {
    pub const LOWEST: Self = Self(0);
    pub const LOW: Self = Self(1);
    pub const DEFAULT: Self = Self(5);
    pub const HIGH: Self = Self(8);
    pub const HIGHEST: Self = Self(9);

    /// Clamp an arbitrary integer into the valid priority range.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "The value is clamped into 0..=9 first"
    )]
    pub const fn clamped(value: i64) -> Self {
        let v = if value < Self::LOWEST.0 as i64 {
            Self::LOWEST.0 as i64
        } else if value > Self::HIGHEST.0 as i64 {
            Self::HIGHEST.0 as i64
        } else {
            value
        };
        Self(v as u8)
    }

    pub const fn get(self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryMode {
    /// The broker must not lose the envelope once the send is committed.
    #[default]
    Persistent,
    NonPersistent,
}

/// A typed envelope property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyValue {
    String(String),
    Long(i64),
    Boolean(bool),
    Addresses(Vec<RecipientAddress>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEnvelope {
    payload: Vec<u8>,
    properties: BTreeMap<String, PropertyValue>,
    delivery_mode: DeliveryMode,
    priority: Priority,
    time_to_live_ms: Option<u64>,
}

impl QueueEnvelope {
    /// A persistent envelope with default priority and no expiry.
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            payload,
            properties: BTreeMap::new(),
            delivery_mode: DeliveryMode::default(),
            priority: Priority::default(),
            time_to_live_ms: None,
        }
    }

    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub const fn with_delivery_mode(mut self, mode: DeliveryMode) -> Self {
        self.delivery_mode = mode;
        self
    }

    /// `None` means the envelope never expires.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        reason = "TTLs beyond u64::MAX milliseconds are not meaningful"
    )]
    pub fn with_time_to_live(mut self, ttl: Option<Duration>) -> Self {
        self.time_to_live_ms = ttl.map(|ttl| ttl.as_millis() as u64);
        self
    }

    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn with_recipients(self, recipients: Vec<RecipientAddress>) -> Self {
        self.with_property(RECIPIENTS_PROPERTY, PropertyValue::Addresses(recipients))
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    pub const fn priority(&self) -> Priority {
        self.priority
    }

    pub const fn delivery_mode(&self) -> DeliveryMode {
        self.delivery_mode
    }

    pub fn time_to_live(&self) -> Option<Duration> {
        self.time_to_live_ms.map(Duration::from_millis)
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    pub const fn properties(&self) -> &BTreeMap<String, PropertyValue> {
        &self.properties
    }

    /// The recipient list attached under [`RECIPIENTS_PROPERTY`], if any.
    pub fn recipients(&self) -> Option<&[RecipientAddress]> {
        match self.properties.get(RECIPIENTS_PROPERTY) {
            Some(PropertyValue::Addresses(addresses)) => Some(addresses),
            _ => None,
        }
    }

    ///
    /// Encode the envelope into a self-contained frame.
    ///
    /// # Errors
    ///
    /// If bincode fails to encode the envelope.
    ///
    pub fn encode(&self) -> Result<Vec<u8>, SerializationError> {
        Ok(bincode::serde::encode_to_vec(
            self,
            bincode::config::standard(),
        )?)
    }

    ///
    /// Decode a frame produced by [`encode`](Self::encode).
    ///
    /// # Errors
    ///
    /// If the frame is corrupted or carries trailing bytes.
    ///
    pub fn decode(frame: &[u8]) -> Result<Self, SerializationError> {
        let (envelope, read) =
            bincode::serde::decode_from_slice::<Self, _>(frame, bincode::config::standard())?;

        if read == frame.len() {
            Ok(envelope)
        } else {
            Err(SerializationError::TrailingBytes(frame.len() - read))
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn priority_clamps_into_range() {
        assert_eq!(Priority::clamped(-4), Priority::LOWEST);
        assert_eq!(Priority::clamped(0).get(), 0);
        assert_eq!(Priority::clamped(7).get(), 7);
        assert_eq!(Priority::clamped(9), Priority::HIGHEST);
        assert_eq!(Priority::clamped(i64::MAX), Priority::HIGHEST);
        assert_eq!(Priority::default().get(), 5);
    }

    #[test]
    fn new_envelope_defaults() {
        let envelope = QueueEnvelope::new(b"payload".to_vec());

        assert_eq!(envelope.priority(), Priority::DEFAULT);
        assert_eq!(envelope.delivery_mode(), DeliveryMode::Persistent);
        assert_eq!(envelope.time_to_live(), None);
        assert_eq!(envelope.recipients(), None);
    }

    #[test]
    fn recipients_survive_the_wire() {
        let recipients = vec![
            RecipientAddress::rfc822("alice@example.com"),
            RecipientAddress::news("comp.mail.misc"),
        ];
        let envelope = QueueEnvelope::new(b"Subject: hi\r\n\r\nbody".to_vec())
            .with_priority(Priority::HIGH)
            .with_time_to_live(Some(Duration::from_millis(5000)))
            .with_recipients(recipients.clone());

        let decoded = QueueEnvelope::decode(&envelope.encode().expect("encodes")).expect("decodes");

        assert_eq!(decoded, envelope);
        assert_eq!(decoded.recipients(), Some(recipients.as_slice()));
        assert_eq!(decoded.time_to_live(), Some(Duration::from_millis(5000)));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(QueueEnvelope::decode(&[0xff; 3]).is_err());

        let mut frame = QueueEnvelope::new(Vec::new()).encode().expect("encodes");
        frame.push(0);
        assert!(matches!(
            QueueEnvelope::decode(&frame),
            Err(SerializationError::TrailingBytes(1))
        ));
    }

    #[test]
    fn non_address_property_is_not_recipients() {
        let envelope = QueueEnvelope::new(Vec::new())
            .with_property(RECIPIENTS_PROPERTY, PropertyValue::String("nope".into()));
        assert_eq!(envelope.recipients(), None);
    }
}
