//! Suppression lists: bounces, complaints, unsubscribes and whitelists

use super::{field, field_or, or_empty, text, ApiContext};
use crate::error::Result;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

/// SMTP codes with a known meaning, matched by substring
const BOUNCE_DESCRIPTIONS: [(&str, &str); 8] = [
    ("550", "Mailbox unavailable or does not exist"),
    ("551", "User not local; please try another path"),
    (
        "552",
        "Requested mail action aborted: exceeded storage allocation",
    ),
    ("553", "Requested action not taken: mailbox name not allowed"),
    ("554", "Transaction failed"),
    ("450", "Requested mail action not taken: mailbox unavailable"),
    ("451", "Requested action aborted: local error in processing"),
    (
        "452",
        "Requested action not taken: insufficient system storage",
    ),
];

const HIGH_SEVERITY_CODES: [&str; 5] = ["550", "551", "552", "553", "554"];
const MEDIUM_SEVERITY_CODES: [&str; 3] = ["450", "451", "452"];

// ============================================================================
// Classification
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BounceType {
    /// 5xx
    Permanent,
    /// 4xx
    Temporary,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BounceSeverity {
    High,
    Medium,
    Low,
    Unknown,
}

/// SMTP code as text; missing, empty and zero codes count as absent
fn code_text(code: Option<&Value>) -> Option<String> {
    match code? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}

pub fn classify_bounce(code: Option<&Value>) -> BounceType {
    match code_text(code) {
        Some(c) if c.starts_with('5') => BounceType::Permanent,
        Some(c) if c.starts_with('4') => BounceType::Temporary,
        _ => BounceType::Unknown,
    }
}

pub fn bounce_severity(code: Option<&Value>) -> BounceSeverity {
    let Some(code) = code_text(code) else {
        return BounceSeverity::Unknown;
    };
    if HIGH_SEVERITY_CODES.iter().any(|c| code.contains(c)) {
        BounceSeverity::High
    } else if MEDIUM_SEVERITY_CODES.iter().any(|c| code.contains(c)) {
        BounceSeverity::Medium
    } else {
        BounceSeverity::Low
    }
}

pub fn bounce_description(code: Option<&Value>) -> String {
    let Some(code) = code_text(code) else {
        return "Unknown bounce reason".to_string();
    };
    BOUNCE_DESCRIPTIONS
        .iter()
        .find(|(known, _)| code.contains(known))
        .map_or_else(
            || format!("SMTP Error Code: {code}"),
            |(_, description)| (*description).to_string(),
        )
}

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BounceRecord {
    pub address: Option<String>,
    pub code: Option<Value>,
    pub error: Option<String>,
    pub created_at: Option<String>,
    pub bounce_type: BounceType,
    pub severity: BounceSeverity,
    pub description: String,
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintRecord {
    pub address: Option<String>,
    pub created_at: Option<String>,
    pub complaint_type: String,
    pub source: String,
    pub severity: String,
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsubscribeRecord {
    pub address: Option<String>,
    pub created_at: Option<String>,
    pub tags: Value,
    pub method: String,
    pub source: String,
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhitelistRecord {
    pub address: Option<String>,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub created_at: Option<String>,
    pub reason: String,
    pub raw: Value,
}

/// The four suppression lists of one domain
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SuppressionSet {
    pub bounces: Vec<BounceRecord>,
    pub complaints: Vec<ComplaintRecord>,
    pub unsubscribes: Vec<UnsubscribeRecord>,
    pub whitelists: Vec<WhitelistRecord>,
}

impl SuppressionSet {
    /// Entries across all four lists
    pub fn total(&self) -> usize {
        self.bounces.len() + self.complaints.len() + self.unsubscribes.len() + self.whitelists.len()
    }
}

// ============================================================================
// Mapping
// ============================================================================

pub fn map_bounce(bounce: &Value) -> BounceRecord {
    let code = bounce.get("code");
    BounceRecord {
        address: text(bounce, "address"),
        code: field(bounce, "code"),
        error: text(bounce, "error"),
        created_at: text(bounce, "created_at"),
        bounce_type: classify_bounce(code),
        severity: bounce_severity(code),
        description: bounce_description(code),
        raw: bounce.clone(),
    }
}

/// Complaints arrive through feedback loops and are always high severity
pub fn map_complaint(complaint: &Value) -> ComplaintRecord {
    ComplaintRecord {
        address: text(complaint, "address"),
        created_at: text(complaint, "created_at"),
        complaint_type: non_empty(complaint, "type").unwrap_or_else(|| "unknown".to_string()),
        source: "feedback_loop".to_string(),
        severity: "high".to_string(),
        raw: complaint.clone(),
    }
}

pub fn map_unsubscribe(unsubscribe: &Value) -> UnsubscribeRecord {
    UnsubscribeRecord {
        address: text(unsubscribe, "address"),
        created_at: text(unsubscribe, "created_at"),
        tags: field_or(unsubscribe, "tags", json!([])),
        method: non_empty(unsubscribe, "method").unwrap_or_else(|| "unknown".to_string()),
        source: non_empty(unsubscribe, "source").unwrap_or_else(|| "manual".to_string()),
        raw: unsubscribe.clone(),
    }
}

pub fn map_whitelist(entry: &Value) -> WhitelistRecord {
    WhitelistRecord {
        address: non_empty(entry, "address").or_else(|| text(entry, "value")),
        entry_type: non_empty(entry, "type").unwrap_or_else(|| "address".to_string()),
        created_at: text(entry, "created_at"),
        reason: non_empty(entry, "reason").unwrap_or_else(|| "manual".to_string()),
        raw: entry.clone(),
    }
}

fn non_empty(value: &Value, key: &str) -> Option<String> {
    text(value, key).filter(|s| !s.is_empty())
}

// ============================================================================
// Service
// ============================================================================

/// Fetches a domain's suppression lists
#[derive(Debug, Clone)]
pub struct SuppressionsService {
    ctx: ApiContext,
}

impl SuppressionsService {
    pub fn new(ctx: ApiContext) -> Self {
        Self { ctx }
    }

    async fn fetch_list<T>(&self, list: &str, map: fn(&Value) -> T) -> Result<Vec<T>> {
        let url = self.ctx.v3_url(&format!("/{}/{list}", self.ctx.domain), &[])?;
        let records: Vec<T> = self.ctx.fetch_all(&url).await?.iter().map(map).collect();
        info!("Fetched {} {}", records.len(), list);
        Ok(records)
    }

    pub async fn fetch_bounces(&self) -> Result<Vec<BounceRecord>> {
        self.fetch_list("bounces", map_bounce).await
    }

    pub async fn fetch_complaints(&self) -> Result<Vec<ComplaintRecord>> {
        self.fetch_list("complaints", map_complaint).await
    }

    pub async fn fetch_unsubscribes(&self) -> Result<Vec<UnsubscribeRecord>> {
        self.fetch_list("unsubscribes", map_unsubscribe).await
    }

    pub async fn fetch_whitelists(&self) -> Result<Vec<WhitelistRecord>> {
        self.fetch_list("whitelists", map_whitelist).await
    }

    /// All four lists; a failed list is logged and left empty
    pub async fn fetch_all_suppressions(&self) -> SuppressionSet {
        SuppressionSet {
            bounces: or_empty("bounces", self.fetch_bounces().await),
            complaints: or_empty("complaints", self.fetch_complaints().await),
            unsubscribes: or_empty("unsubscribes", self.fetch_unsubscribes().await),
            whitelists: or_empty("whitelists", self.fetch_whitelists().await),
        }
    }
}
