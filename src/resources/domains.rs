//! Sending domains (`/v3/domains`) and their per-domain settings

use super::{field, or_empty, or_null, text, truthy, unwrap_envelope, ApiContext};
use crate::error::Result;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

/// Placeholder written instead of any password
pub const MASKED: &str = "***MASKED***";

// ============================================================================
// Records
// ============================================================================

/// Normalized domain
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainRecord {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub domain_type: Option<String>,
    pub state: Option<String>,
    pub created_at: Option<String>,
    pub smtp_login: Option<String>,
    pub smtp_password: Option<String>,
    pub verification: DomainVerification,
    pub spam_action: Option<String>,
    pub tracking: DomainTrackingFlags,
    pub connection: DomainConnection,
    pub web_scheme: Option<String>,
    pub web_prefix: Option<String>,
    #[serde(rename = "inboundDNSSubdomain")]
    pub inbound_dns_subdomain: Option<String>,
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainVerification {
    pub is_verified: bool,
    pub spf_valid: Option<Value>,
    pub dkim_valid: Option<Value>,
    pub skip_verification: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainTrackingFlags {
    pub clicks: bool,
    pub opens: bool,
    pub unsubscribes: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainConnection {
    #[serde(rename = "requireTLS")]
    pub require_tls: bool,
    pub skip_verification: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmtpCredential {
    pub login: Option<String>,
    pub created_at: Option<String>,
    pub mailbox: Option<String>,
    pub state: Option<String>,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IpAllowlistEntry {
    pub address: Option<String>,
    pub created_at: Option<String>,
    pub comment: String,
}

/// Domain with its sub-resources; failed parts are `null` or `[]`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedDomain {
    #[serde(flatten)]
    pub domain: DomainRecord,
    pub details: Option<DomainRecord>,
    pub tracking_settings: Option<Value>,
    pub dns: Option<Value>,
    pub smtp_credentials: Vec<SmtpCredential>,
    pub ip_allowlist: Vec<IpAllowlistEntry>,
}

// ============================================================================
// Mapping
// ============================================================================

/// Map a raw domain, masking the SMTP password everywhere it appears
pub fn map_domain(domain: &Value) -> DomainRecord {
    let has_password = domain
        .get("smtp_password")
        .is_some_and(|p| !p.is_null() && p != "");

    let mut raw = domain.clone();
    if has_password {
        if let Some(password) = raw.get_mut("smtp_password") {
            *password = Value::String(MASKED.to_string());
        }
    }

    DomainRecord {
        name: text(domain, "name"),
        domain_type: text(domain, "type"),
        state: text(domain, "state"),
        created_at: text(domain, "created_at"),
        smtp_login: text(domain, "smtp_login"),
        smtp_password: has_password.then(|| MASKED.to_string()),
        verification: DomainVerification {
            is_verified: domain.get("state").and_then(Value::as_str) == Some("active"),
            spf_valid: field(domain, "spf_valid"),
            dkim_valid: field(domain, "dkim_valid"),
            skip_verification: field(domain, "skip_verification"),
        },
        spam_action: text(domain, "spam_action"),
        tracking: DomainTrackingFlags {
            clicks: truthy(domain.get("tracking_clicks")),
            opens: truthy(domain.get("tracking_opens")),
            unsubscribes: truthy(domain.get("tracking_unsubscribes")),
        },
        connection: DomainConnection {
            require_tls: truthy(domain.get("require_tls")),
            skip_verification: truthy(domain.get("skip_verification")),
        },
        web_scheme: text(domain, "web_scheme"),
        web_prefix: text(domain, "web_prefix"),
        inbound_dns_subdomain: text(domain, "inbound_dns_subdomain"),
        raw,
    }
}

/// Map an SMTP credential; the password is never exported
pub fn map_smtp_credential(credential: &Value) -> SmtpCredential {
    SmtpCredential {
        login: text(credential, "login"),
        created_at: text(credential, "created_at"),
        mailbox: text(credential, "mailbox"),
        state: text(credential, "state"),
        password: MASKED.to_string(),
    }
}

pub fn map_ip_allowlist_entry(entry: &Value) -> IpAllowlistEntry {
    IpAllowlistEntry {
        address: text(entry, "address"),
        created_at: text(entry, "created_at"),
        comment: text(entry, "comment").unwrap_or_default(),
    }
}

// ============================================================================
// Service
// ============================================================================

/// Fetches domains and their settings
#[derive(Debug, Clone)]
pub struct DomainsService {
    ctx: ApiContext,
}

impl DomainsService {
    pub fn new(ctx: ApiContext) -> Self {
        Self { ctx }
    }

    /// All domains on the account
    pub async fn fetch_domains(&self) -> Result<Vec<DomainRecord>> {
        let url = self.ctx.v3_url("/domains", &[])?;
        let domains: Vec<DomainRecord> = self
            .ctx
            .fetch_all(&url)
            .await?
            .iter()
            .map(map_domain)
            .collect();
        info!("Fetched {} domains", domains.len());
        Ok(domains)
    }

    pub async fn fetch_domain_details(&self, name: &str) -> Result<DomainRecord> {
        let url = self.ctx.v3_url(&format!("/domains/{name}"), &[])?;
        let body = self.ctx.get_json(&url).await?;
        Ok(map_domain(&unwrap_envelope(body, "domain")))
    }

    pub async fn fetch_domain_tracking(&self, name: &str) -> Result<Value> {
        let url = self.ctx.v3_url(&format!("/domains/{name}/tracking"), &[])?;
        let body = self.ctx.get_json(&url).await?;
        Ok(unwrap_envelope(body, "tracking"))
    }

    /// DNS verification status
    pub async fn fetch_domain_dns(&self, name: &str) -> Result<Value> {
        let url = self.ctx.v3_url(&format!("/domains/{name}/verify"), &[])?;
        self.ctx.get_json(&url).await
    }

    pub async fn fetch_smtp_credentials(&self, name: &str) -> Result<Vec<SmtpCredential>> {
        let url = self.ctx.v3_url(&format!("/{name}/credentials"), &[])?;
        let raw = self.ctx.fetch_all(&url).await?;
        Ok(raw.iter().map(map_smtp_credential).collect())
    }

    pub async fn fetch_ip_allowlist(&self, name: &str) -> Result<Vec<IpAllowlistEntry>> {
        let url = self.ctx.v3_url(&format!("/{name}/ips"), &[])?;
        let raw = self.ctx.fetch_all(&url).await?;
        Ok(raw.iter().map(map_ip_allowlist_entry).collect())
    }

    /// Attach every sub-resource, fetched concurrently
    pub async fn enrich_domain(&self, domain: DomainRecord) -> EnrichedDomain {
        let Some(name) = domain.name.clone() else {
            return EnrichedDomain {
                domain,
                details: None,
                tracking_settings: None,
                dns: None,
                smtp_credentials: Vec::new(),
                ip_allowlist: Vec::new(),
            };
        };

        let (details, tracking, dns, credentials, ips) = futures::join!(
            self.fetch_domain_details(&name),
            self.fetch_domain_tracking(&name),
            self.fetch_domain_dns(&name),
            self.fetch_smtp_credentials(&name),
            self.fetch_ip_allowlist(&name),
        );

        EnrichedDomain {
            domain,
            details: or_null(&format!("details for {name}"), details),
            tracking_settings: or_null(&format!("tracking settings for {name}"), tracking),
            dns: or_null(&format!("DNS records for {name}"), dns),
            smtp_credentials: or_empty(&format!("SMTP credentials for {name}"), credentials),
            ip_allowlist: or_empty(&format!("IP allowlist for {name}"), ips),
        }
    }

    /// Every domain with its sub-resources
    pub async fn fetch_all_domain_data(&self) -> Result<Vec<EnrichedDomain>> {
        let domains = self.fetch_domains().await?;
        let mut enriched = Vec::with_capacity(domains.len());
        for domain in domains {
            info!(
                "Enriching domain {}",
                domain.name.as_deref().unwrap_or("(unnamed)")
            );
            enriched.push(self.enrich_domain(domain).await);
        }
        Ok(enriched)
    }
}
