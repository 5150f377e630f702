//! Mailgun resource fetchers
//!
//! Each service builds resource-specific URLs, drives the [`Paginator`],
//! maps raw records with pure functions and, where the API splits an
//! entity across endpoints, enriches parents with their sub-resources.
//!
//! Enrichment is best effort: a failed sub-fetch is logged and replaced by
//! `null` or `[]`, while a failed primary fetch propagates to the caller.

mod domains;
mod events;
mod lists;
mod stats;
mod suppressions;
mod templates;

pub use domains::{
    map_domain, map_ip_allowlist_entry, map_smtp_credential, DomainConnection, DomainRecord,
    DomainTrackingFlags, DomainVerification, DomainsService, EnrichedDomain, IpAllowlistEntry,
    SmtpCredential, MASKED,
};
pub use events::{
    map_event, DeliveryStatus, EventFlags, EventRecord, EventsService, Geolocation, MessageInfo,
    SmtpInfo, StorageRef, TrackingInfo, EVENT_TYPES,
};
pub use lists::{
    map_list, map_list_member, EnrichedList, ListMember, ListRecord, ListsService, Subscription,
};
pub use stats::{
    calculate_aggregates, calculate_rate, calculate_trends, process_stats, Aggregates,
    ComprehensiveStats, Rates, StatsPeriod, StatsQuery, StatsReport, StatsService, TimeRange,
    Trend, TrendDirection, DELIVERY_EVENTS, ENGAGEMENT_EVENTS, STATS_EVENTS,
};
pub use suppressions::{
    bounce_description, bounce_severity, classify_bounce, map_bounce, map_complaint,
    map_unsubscribe, map_whitelist, BounceRecord, BounceSeverity, BounceType, ComplaintRecord,
    SuppressionSet, SuppressionsService, UnsubscribeRecord, WhitelistRecord,
};
pub use templates::{
    format_bytes, map_template, map_template_details, map_template_version, ContentSize,
    EnrichedTemplate, TemplateContent, TemplateDetails, TemplateRecord, TemplateVersion,
    TemplatesService, VersionMetadata, VersionRef,
};

use crate::config::ExportConfig;
use crate::error::{Result, ResultExt};
use crate::http::{HttpClient, RateGate};
use crate::pagination::{Paginator, PaginatorConfig};
use crate::types::{JsonValue, ResourceKind};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

// ============================================================================
// Shared Context
// ============================================================================

/// Everything a resource service needs to talk to the API
#[derive(Debug, Clone)]
pub struct ApiContext {
    /// Retrying, rate-gated client
    pub client: HttpClient,
    /// Paginator over the same client
    pub paginator: Paginator,
    /// `https://host/v3`
    pub base_url_v3: String,
    /// `https://host/v4`
    pub base_url_v4: String,
    /// Sending domain the domain-scoped resources belong to
    pub domain: String,
    /// RFC 2822 range start
    pub begin: Option<String>,
    /// RFC 2822 range end
    pub end: Option<String>,
    /// Export unsubscribed list members too
    pub include_unsubscribed: bool,
    /// Fan-out width for per-entity fetches
    pub max_concurrent: usize,
}

impl ApiContext {
    /// Build the context, its rate gate and its client from configuration
    pub fn from_config(config: &ExportConfig) -> Result<Self> {
        let gate = RateGate::new(config.rate_gate_config())?;
        let client = HttpClient::new(config.http_client_config(), gate)?;
        Self::with_client(config, client)
    }

    /// Build the context around an existing client
    pub fn with_client(config: &ExportConfig, client: HttpClient) -> Result<Self> {
        Ok(Self {
            paginator: Paginator::with_config(client.clone(), mailgun_paging()),
            client,
            base_url_v3: config.base_url_v3(),
            base_url_v4: config.base_url_v4(),
            domain: config.require_domain()?.to_string(),
            begin: config.begin_rfc2822(),
            end: config.end_rfc2822(),
            include_unsubscribed: config.export.include_unsubscribed,
            max_concurrent: config.http.max_concurrent.max(1),
        })
    }

    /// URL under the v3 API
    pub fn v3_url(&self, path: &str, params: &[(&str, String)]) -> Result<String> {
        self.client
            .url_with_query(&format!("{}{}", self.base_url_v3, path), params)
    }

    /// URL under the v4 API
    pub fn v4_url(&self, path: &str, params: &[(&str, String)]) -> Result<String> {
        self.client
            .url_with_query(&format!("{}{}", self.base_url_v4, path), params)
    }

    /// Single GET, parsed as JSON
    pub async fn get_json(&self, url: &str) -> Result<Value> {
        self.client.fetch_json(url).await
    }

    /// Every record reachable from `url`
    pub async fn fetch_all(&self, url: &str) -> Result<Vec<Value>> {
        self.paginator.fetch_all(url).await
    }
}

/// Mailgun keeps returning `paging.next` after the last record, so an empty
/// page ends the collection
pub fn mailgun_paging() -> PaginatorConfig {
    PaginatorConfig::default().with_stop_on_empty_page(true)
}

// ============================================================================
// Resource Dispatch
// ============================================================================

/// All resource services over one shared context
#[derive(Debug, Clone)]
pub struct MailgunResources {
    pub events: EventsService,
    pub domains: DomainsService,
    pub suppressions: SuppressionsService,
    pub lists: ListsService,
    pub templates: TemplatesService,
    pub stats: StatsService,
}

impl MailgunResources {
    /// Create every service over `ctx`
    pub fn new(ctx: ApiContext) -> Self {
        Self {
            events: EventsService::new(ctx.clone()),
            domains: DomainsService::new(ctx.clone()),
            suppressions: SuppressionsService::new(ctx.clone()),
            lists: ListsService::new(ctx.clone()),
            templates: TemplatesService::new(ctx.clone()),
            stats: StatsService::new(ctx),
        }
    }

    /// Full export payload for one resource kind
    pub async fn fetch(&self, kind: ResourceKind) -> Result<JsonValue> {
        match kind {
            ResourceKind::Events => to_json(kind, &self.events.fetch_events().await?),
            ResourceKind::Suppressions => {
                to_json(kind, &self.suppressions.fetch_all_suppressions().await)
            }
            ResourceKind::Domains => to_json(kind, &self.domains.fetch_all_domain_data().await?),
            ResourceKind::Lists => to_json(kind, &self.lists.fetch_all_lists_with_members().await?),
            ResourceKind::Templates => {
                to_json(kind, &self.templates.fetch_all_templates_with_versions().await?)
            }
            ResourceKind::Stats => to_json(kind, &self.stats.fetch_comprehensive_stats().await),
        }
    }
}

pub(crate) fn to_json<T: Serialize>(kind: ResourceKind, value: &T) -> Result<JsonValue> {
    serde_json::to_value(value).with_context(|| format!("Failed to serialize {kind}"))
}

// ============================================================================
// Helpers
// ============================================================================

/// Keep a sub-fetch result, or log and drop the failure
pub(crate) fn or_null<T>(what: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Failed to fetch {}: {}", what, e);
            None
        }
    }
}

/// Keep a list sub-fetch result, or log and fall back to empty
pub(crate) fn or_empty<T>(what: &str, result: Result<Vec<T>>) -> Vec<T> {
    or_null(what, result).unwrap_or_default()
}

/// Take `body[key]` when present and non-null, else the body itself
pub(crate) fn unwrap_envelope(mut body: Value, key: &str) -> Value {
    match body.get_mut(key).map(Value::take) {
        Some(inner) if !inner.is_null() => inner,
        _ => body,
    }
}

/// String field, if present
pub(crate) fn text(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Any non-null field, cloned
pub(crate) fn field(value: &Value, key: &str) -> Option<Value> {
    value.get(key).filter(|v| !v.is_null()).cloned()
}

/// Field at a nested path
pub(crate) fn at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(value, |current, key| current.get(key))
        .filter(|v| !v.is_null())
}

/// Field or a default value when missing or null
pub(crate) fn field_or(value: &Value, key: &str, default: Value) -> Value {
    field(value, key).unwrap_or(default)
}

/// Loose truthiness for boolean-ish flags
pub(crate) fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}
