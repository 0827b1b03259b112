//! Inbound event normalisation.
//!
//! Server events arrive with heterogeneous payload shapes: the payload may
//! carry the entity directly, or nest it under a named field (a
//! `consultation`, `campaign`, `report` or `referral` key). Each shape is an
//! explicit variant here, so the id-fallback logic stays exhaustive rather
//! than ad-hoc field probing.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Canonical client-side notification record.
///
/// `id` is the deduplication key: the nested entity's id when present, else
/// the top-level payload id, else a synthesised `{type}-{millis}` fallback.
/// The fallback guarantees uniqueness only in the absence of true duplicates
/// from reconnection; see the duplicate-redelivery test below.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Notification {
    pub id: String,
    pub event_type: String,
    pub message: String,
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

/// Payload shape, one variant per event family.
enum EventBody<'a> {
    Consultation(&'a Value),
    Campaign(&'a Value),
    Report(&'a Value),
    Referral(&'a Value),
    /// The payload carries the entity directly (or nothing recognisable).
    Plain,
}

fn classify<'a>(event_type: &str, payload: &'a Value) -> EventBody<'a> {
    let family = event_type.split(':').next().unwrap_or_default();
    let nested = payload.get(family).filter(|v| v.is_object());
    match (family, nested) {
        ("consultation", Some(entity)) => EventBody::Consultation(entity),
        ("campaign", Some(entity)) => EventBody::Campaign(entity),
        ("report", Some(entity)) => EventBody::Report(entity),
        ("referral", Some(entity)) => EventBody::Referral(entity),
        _ => EventBody::Plain,
    }
}

/// Normalises a raw inbound event into a canonical [`Notification`].
///
/// `raw` is the full event object as received; its `payload` field is used
/// when present, otherwise the event itself is treated as the payload.
pub fn normalize(raw: &Value, received_at: DateTime<Utc>) -> Notification {
    let event_type = raw
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let payload = raw.get("payload").unwrap_or(raw);

    let entity = match classify(&event_type, payload) {
        EventBody::Consultation(entity)
        | EventBody::Campaign(entity)
        | EventBody::Report(entity)
        | EventBody::Referral(entity) => Some(entity),
        EventBody::Plain => None,
    };

    Notification {
        id: dedup_id(&event_type, entity, payload, received_at),
        event_type: event_type.clone(),
        message: message_for(&event_type, raw, payload, entity),
        data: payload.clone(),
        created_at: received_at,
    }
}

/// Dedup id precedence: nested entity id, top-level payload id, synthesised
/// fallback.
fn dedup_id(
    event_type: &str,
    entity: Option<&Value>,
    payload: &Value,
    received_at: DateTime<Utc>,
) -> String {
    entity
        .and_then(|e| id_field(e))
        .or_else(|| id_field(payload))
        .unwrap_or_else(|| format!("{}-{}", event_type, received_at.timestamp_millis()))
}

fn id_field(value: &Value) -> Option<String> {
    match value.get("id") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Message precedence: explicit event message, payload message, nested
/// entity title/name/type, generic fallback.
fn message_for(event_type: &str, raw: &Value, payload: &Value, entity: Option<&Value>) -> String {
    if let Some(message) = text_field(raw, "message") {
        return message;
    }
    if !std::ptr::eq(raw, payload) {
        if let Some(message) = text_field(payload, "message") {
            return message;
        }
    }
    if let Some(entity) = entity {
        for field in ["title", "name", "type"] {
            if let Some(text) = text_field(entity, field) {
                return text;
            }
        }
    }
    format!("{} event received", event_type)
}

fn text_field(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
