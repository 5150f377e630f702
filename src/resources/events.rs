//! Email events (`/v3/events`)

use super::{at, field, field_or, text, ApiContext};
use crate::error::Result;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Largest page the events API accepts
const PAGE_LIMIT: u32 = 300;

/// Event types exported by [`EventsService::fetch_all_event_types`]
pub const EVENT_TYPES: [&str; 10] = [
    "accepted",
    "rejected",
    "delivered",
    "failed",
    "opened",
    "clicked",
    "unsubscribed",
    "complained",
    "stored",
    "temporary_failed",
];

// ============================================================================
// Records
// ============================================================================

/// Normalized event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub id: Option<String>,
    pub timestamp: Option<Value>,
    pub event: Option<String>,
    pub message: MessageInfo,
    pub recipient: Option<String>,
    pub recipient_domain: Option<String>,
    pub delivery_status: DeliveryStatus,
    pub tracking: TrackingInfo,
    pub campaigns: Value,
    pub tags: Value,
    pub user_variables: Value,
    pub smtp: SmtpInfo,
    pub flags: EventFlags,
    pub storage: Option<StorageRef>,
    pub geolocation: Option<Geolocation>,
    pub raw: Value,
}

/// Message headers of interest
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageInfo {
    pub message_id: Option<String>,
    pub subject: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub size: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryStatus {
    pub description: Option<String>,
    pub code: Option<Value>,
    pub reason: Option<String>,
    pub severity: Option<String>,
}

/// Client details recorded for opens and clicks
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingInfo {
    pub user_agent: Option<String>,
    pub client_type: Option<String>,
    pub client_name: Option<String>,
    pub client_os: Option<String>,
    pub device_type: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SmtpInfo {
    pub envelope: Option<Value>,
    pub routes: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFlags {
    pub is_authenticated: Option<bool>,
    pub is_system_test: Option<bool>,
    pub is_test_mode: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageRef {
    pub url: Option<String>,
    pub key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Geolocation {
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
}

// ============================================================================
// Mapping
// ============================================================================

/// Map a raw event into an [`EventRecord`]
///
/// Delivery and client details are read from their nested objects first
/// (`delivery-status`, `client-info`), then from top-level fields. The
/// top-level `message` is the message envelope and never a delivery
/// description.
pub fn map_event(event: &Value) -> EventRecord {
    let header = |name: &str| at(event, &["message", "headers", name]).and_then(as_string);
    let delivery = |key: &str| at(event, &["delivery-status", key]).or_else(|| event.get(key));
    let client = |key: &str| {
        at(event, &["client-info", key])
            .or_else(|| event.get(key))
            .and_then(as_string)
    };
    let geo = |key: &str| {
        at(event, &["geolocation", key])
            .or_else(|| event.get(key))
            .and_then(as_string)
    };
    let flag = |key: &str| at(event, &["flags", key]).and_then(Value::as_bool);

    EventRecord {
        id: text(event, "id"),
        timestamp: field(event, "timestamp"),
        event: text(event, "event"),
        message: MessageInfo {
            message_id: header("message-id"),
            subject: header("subject"),
            from: header("from"),
            to: header("to"),
            size: at(event, &["message", "size"]).cloned(),
        },
        recipient: text(event, "recipient"),
        recipient_domain: text(event, "recipient-domain"),
        delivery_status: DeliveryStatus {
            description: delivery("description")
                .or_else(|| at(event, &["delivery-status", "message"]))
                .and_then(as_string),
            code: delivery("code").filter(|v| !v.is_null()).cloned(),
            reason: text(event, "reason"),
            severity: text(event, "severity"),
        },
        tracking: TrackingInfo {
            user_agent: client("user-agent"),
            client_type: client("client-type"),
            client_name: client("client-name"),
            client_os: client("client-os"),
            device_type: client("device-type"),
            country: geo("country"),
            region: geo("region"),
            city: geo("city"),
            url: text(event, "url"),
        },
        campaigns: field_or(event, "campaigns", json!([])),
        tags: field_or(event, "tags", json!([])),
        user_variables: field_or(event, "user-variables", json!({})),
        smtp: SmtpInfo {
            envelope: field(event, "envelope"),
            routes: field(event, "routes"),
        },
        flags: EventFlags {
            is_authenticated: flag("is-authenticated"),
            is_system_test: flag("is-system-test"),
            is_test_mode: flag("is-test-mode"),
        },
        storage: event.get("storage").filter(|s| s.is_object()).map(|s| StorageRef {
            url: text(s, "url"),
            key: text(s, "key"),
        }),
        geolocation: event
            .get("geolocation")
            .filter(|g| g.is_object())
            .map(|g| Geolocation {
                country: text(g, "country"),
                region: text(g, "region"),
                city: text(g, "city"),
            }),
        raw: event.clone(),
    }
}

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ============================================================================
// Service
// ============================================================================

/// Fetches the event log
#[derive(Debug, Clone)]
pub struct EventsService {
    ctx: ApiContext,
}

impl EventsService {
    pub fn new(ctx: ApiContext) -> Self {
        Self { ctx }
    }

    /// First page URL: page limit, date range and optional type filter
    pub fn events_url(&self, event_type: Option<&str>) -> Result<String> {
        let mut params = vec![("limit", PAGE_LIMIT.to_string())];
        if let Some(begin) = &self.ctx.begin {
            params.push(("begin", begin.clone()));
        }
        if let Some(end) = &self.ctx.end {
            params.push(("end", end.clone()));
        }
        if let Some(event) = event_type {
            params.push(("event", event.to_string()));
        }
        self.ctx.v3_url("/events", &params)
    }

    /// Every event in the configured range
    pub async fn fetch_events(&self) -> Result<Vec<EventRecord>> {
        self.fetch_filtered(None).await
    }

    /// Events of a single type
    pub async fn fetch_events_by_type(&self, event_type: &str) -> Result<Vec<EventRecord>> {
        self.fetch_filtered(Some(event_type)).await
    }

    /// Events grouped by type; a failed type yields an empty list
    pub async fn fetch_all_event_types(&self) -> BTreeMap<String, Vec<EventRecord>> {
        let mut by_type = BTreeMap::new();
        for event_type in EVENT_TYPES {
            let events = match self.fetch_events_by_type(event_type).await {
                Ok(events) => events,
                Err(e) => {
                    warn!("Failed to fetch {} events: {}", event_type, e);
                    Vec::new()
                }
            };
            by_type.insert(event_type.to_string(), events);
        }
        by_type
    }

    async fn fetch_filtered(&self, event_type: Option<&str>) -> Result<Vec<EventRecord>> {
        let url = self.events_url(event_type)?;
        let raw = self.ctx.fetch_all(&url).await?;
        let events: Vec<EventRecord> = raw.iter().map(map_event).collect();
        info!("Fetched {} events", events.len());
        Ok(events)
    }
}
