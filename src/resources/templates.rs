//! Templates (`/v4/{domain}/templates`) with every stored version

use super::{field, field_or, or_empty, or_null, text, unwrap_envelope, ApiContext};
use crate::error::Result;
use futures::stream::{self, StreamExt};
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{info, warn};

/// Any Handlebars expression: `{{ ... }}`
static HANDLEBARS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{[\s\S]*?\}\}").expect("valid handlebars regex"));

/// First token of a Handlebars expression
static VARIABLE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([^}\s]+)[\s\S]*?\}\}").expect("valid variable regex")
});

const CONTENT_FIELDS: [&str; 4] = ["template", "subject", "text", "html"];

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRecord {
    pub name: Option<String>,
    pub description: Option<String>,
    pub created_at: Option<String>,
    pub id: Option<String>,
    pub version_count: Value,
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDetails {
    pub name: Option<String>,
    pub description: Option<String>,
    pub created_at: Option<String>,
    pub id: Option<String>,
    pub version: VersionRef,
    pub raw: Value,
}

/// Active version summary carried by template details
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionRef {
    pub tag: Option<String>,
    pub engine: Option<String>,
    pub mjml: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateVersion {
    pub tag: Option<String>,
    pub engine: Option<String>,
    pub created_at: Option<String>,
    pub comment: Option<String>,
    pub content: TemplateContent,
    pub headers: Value,
    pub mjml: Value,
    pub metadata: VersionMetadata,
    pub raw: Value,
    /// Set when the full version could not be fetched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateContent {
    pub template: Option<String>,
    pub subject: Option<String>,
    pub text: Option<String>,
    pub html: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionMetadata {
    pub size: ContentSize,
    pub has_variables: bool,
    pub variable_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentSize {
    pub bytes: usize,
    pub kb: String,
    pub readable: String,
}

/// Template with its details and full versions
///
/// `versionCount` is overwritten with the number of versions exported.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedTemplate {
    #[serde(flatten)]
    pub template: TemplateRecord,
    pub details: Option<TemplateDetails>,
    pub versions: Vec<TemplateVersion>,
}

// ============================================================================
// Mapping
// ============================================================================

fn created_at(value: &Value) -> Option<String> {
    text(value, "createdAt").or_else(|| text(value, "created_at"))
}

pub fn map_template(template: &Value) -> TemplateRecord {
    TemplateRecord {
        name: text(template, "name"),
        description: text(template, "description"),
        created_at: created_at(template),
        id: text(template, "id"),
        version_count: field_or(template, "version_count", json!(0)),
        raw: template.clone(),
    }
}

pub fn map_template_details(template: &Value) -> TemplateDetails {
    let version = template.get("version").unwrap_or(&Value::Null);
    TemplateDetails {
        name: text(template, "name"),
        description: text(template, "description"),
        created_at: created_at(template),
        id: text(template, "id"),
        version: VersionRef {
            tag: text(version, "tag"),
            engine: text(version, "engine"),
            mjml: field(version, "mjml"),
        },
        raw: template.clone(),
    }
}

pub fn map_template_version(version: &Value) -> TemplateVersion {
    TemplateVersion {
        tag: text(version, "tag"),
        engine: text(version, "engine"),
        created_at: created_at(version),
        comment: text(version, "comment"),
        content: TemplateContent {
            template: text(version, "template"),
            subject: text(version, "subject"),
            text: text(version, "text"),
            html: text(version, "html"),
        },
        headers: field_or(version, "headers", json!({})),
        mjml: field_or(version, "mjml", json!(false)),
        metadata: version_metadata(version),
        raw: version.clone(),
        error: None,
    }
}

fn version_metadata(version: &Value) -> VersionMetadata {
    let parts: Vec<&str> = CONTENT_FIELDS
        .iter()
        .map(|key| version.get(key).and_then(Value::as_str).unwrap_or(""))
        .collect();
    let bytes: usize = parts.iter().map(|p| p.len()).sum();
    let content = parts.join(" ");

    let variables: HashSet<&str> = VARIABLE_REGEX
        .captures_iter(&content)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();

    VersionMetadata {
        size: ContentSize {
            bytes,
            kb: format!("{:.2}", bytes as f64 / 1024.0),
            readable: format_bytes(bytes),
        },
        has_variables: HANDLEBARS_REGEX.is_match(&content),
        variable_count: variables.len(),
    }
}

/// Human-readable size: `0 Bytes`, `512 Bytes`, `1.5 KB`, `2 MB`
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let bytes = bytes as f64;
    let exponent = (bytes.ln() / 1024f64.ln()).floor().clamp(0.0, 3.0) as i32;
    let value = bytes / 1024f64.powi(exponent);
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[exponent as usize])
}

/// Expand a `{template: {versions: [...]}}` envelope into its versions
fn unwrap_versions(record: Value) -> Vec<Value> {
    match record.pointer("/template/versions") {
        Some(Value::Array(versions)) => versions.clone(),
        _ if record.get("template").is_some() => Vec::new(),
        _ => vec![record],
    }
}

// ============================================================================
// Service
// ============================================================================

/// Fetches templates and versions from the v4 API
#[derive(Debug, Clone)]
pub struct TemplatesService {
    ctx: ApiContext,
}

impl TemplatesService {
    pub fn new(ctx: ApiContext) -> Self {
        Self { ctx }
    }

    fn template_path(&self, suffix: &str) -> String {
        format!("/{}/templates{suffix}", self.ctx.domain)
    }

    /// All templates of the domain
    pub async fn fetch_templates(&self) -> Result<Vec<TemplateRecord>> {
        let url = self.ctx.v4_url(&self.template_path(""), &[])?;
        let templates: Vec<TemplateRecord> = self
            .ctx
            .fetch_all(&url)
            .await?
            .iter()
            .map(map_template)
            .collect();
        info!("Fetched {} templates", templates.len());
        Ok(templates)
    }

    pub async fn fetch_template_details(&self, name: &str) -> Result<TemplateDetails> {
        let url = self
            .ctx
            .v4_url(&self.template_path(&format!("/{name}")), &[])?;
        let body = self.ctx.get_json(&url).await?;
        Ok(map_template_details(&unwrap_envelope(body, "template")))
    }

    /// Version summaries, following pagination across envelopes
    pub async fn fetch_template_versions(&self, name: &str) -> Result<Vec<TemplateVersion>> {
        let url = self
            .ctx
            .v4_url(&self.template_path(&format!("/{name}/versions")), &[])?;
        let raw = self
            .ctx
            .paginator
            .fetch_all_with(&url, unwrap_versions)
            .await?;
        Ok(raw.iter().map(map_template_version).collect())
    }

    /// One version with its content
    pub async fn fetch_template_version(&self, name: &str, tag: &str) -> Result<TemplateVersion> {
        let url = self
            .ctx
            .v4_url(&self.template_path(&format!("/{name}/versions/{tag}")), &[])?;
        let body = unwrap_envelope(self.ctx.get_json(&url).await?, "template");
        Ok(map_template_version(&unwrap_envelope(body, "version")))
    }

    /// Replace each summary with its full version, `max_concurrent` at a time
    ///
    /// Order is preserved. A version that cannot be fetched keeps its
    /// summary and records the error.
    pub async fn fetch_version_contents(
        &self,
        name: &str,
        versions: Vec<TemplateVersion>,
    ) -> Vec<TemplateVersion> {
        stream::iter(versions)
            .map(|summary| async move {
                let Some(tag) = summary.tag.clone() else {
                    return summary;
                };
                match self.fetch_template_version(name, &tag).await {
                    Ok(full) => full,
                    Err(e) => {
                        warn!("Failed to fetch version {} of {}: {}", tag, name, e);
                        TemplateVersion {
                            error: Some(e.to_string()),
                            ..summary
                        }
                    }
                }
            })
            .buffered(self.ctx.max_concurrent)
            .collect()
            .await
    }

    /// Attach details and every version's content
    pub async fn enrich_template(&self, mut template: TemplateRecord) -> EnrichedTemplate {
        let Some(name) = template.name.clone() else {
            template.version_count = json!(0);
            return EnrichedTemplate {
                template,
                details: None,
                versions: Vec::new(),
            };
        };

        let (details, versions) = futures::join!(
            self.fetch_template_details(&name),
            self.fetch_template_versions(&name),
        );
        let summaries = or_empty(&format!("versions of {name}"), versions);
        let versions = self.fetch_version_contents(&name, summaries).await;

        template.version_count = json!(versions.len());
        EnrichedTemplate {
            template,
            details: or_null(&format!("details for template {name}"), details),
            versions,
        }
    }

    /// Every template with details and versions
    pub async fn fetch_all_templates_with_versions(&self) -> Result<Vec<EnrichedTemplate>> {
        let templates = self.fetch_templates().await?;
        let mut enriched = Vec::with_capacity(templates.len());
        for template in templates {
            enriched.push(self.enrich_template(template).await);
        }
        Ok(enriched)
    }
}
