//! Mailing lists (`/v3/lists`) and their members

use super::{field, field_or, or_empty, or_null, text, truthy, unwrap_envelope, ApiContext};
use crate::error::Result;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

/// Page size for list members
const MEMBERS_PAGE_LIMIT: u32 = 100;

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRecord {
    pub address: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub access_level: Option<String>,
    pub created_at: Option<String>,
    pub members_count: Option<Value>,
    pub reply_preference: Option<String>,
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMember {
    pub address: Option<String>,
    pub name: Option<String>,
    pub subscribed: Option<bool>,
    pub subscribed_at: Option<Value>,
    pub vars: Value,
    pub subscription: Subscription,
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub status: String,
    pub opted_in: bool,
    pub opted_in_at: Option<Value>,
}

/// List with its members and stats
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedList {
    #[serde(flatten)]
    pub list: ListRecord,
    pub members: Vec<ListMember>,
    pub stats: Option<Value>,
    pub member_count: usize,
}

// ============================================================================
// Mapping
// ============================================================================

pub fn map_list(list: &Value) -> ListRecord {
    ListRecord {
        address: text(list, "address"),
        name: text(list, "name"),
        description: text(list, "description"),
        access_level: text(list, "access_level"),
        created_at: text(list, "created_at"),
        members_count: field(list, "members_count"),
        reply_preference: text(list, "reply_preference"),
        raw: list.clone(),
    }
}

pub fn map_list_member(member: &Value) -> ListMember {
    let subscribed = member.get("subscribed").and_then(Value::as_bool);
    ListMember {
        address: text(member, "address"),
        name: text(member, "name"),
        subscribed,
        subscribed_at: field(member, "subscribed_at"),
        vars: field_or(member, "vars", json!({})),
        subscription: Subscription {
            status: if subscribed == Some(true) {
                "subscribed"
            } else {
                "unsubscribed"
            }
            .to_string(),
            opted_in: truthy(member.get("opted_in")),
            opted_in_at: field(member, "opted_in_at"),
        },
        raw: member.clone(),
    }
}

// ============================================================================
// Service
// ============================================================================

/// Fetches mailing lists and members
#[derive(Debug, Clone)]
pub struct ListsService {
    ctx: ApiContext,
}

impl ListsService {
    pub fn new(ctx: ApiContext) -> Self {
        Self { ctx }
    }

    /// All mailing lists on the account
    pub async fn fetch_lists(&self) -> Result<Vec<ListRecord>> {
        let url = self.ctx.v3_url("/lists", &[])?;
        let lists: Vec<ListRecord> = self.ctx.fetch_all(&url).await?.iter().map(map_list).collect();
        info!("Fetched {} mailing lists", lists.len());
        Ok(lists)
    }

    /// Members of one list, subscribed only unless `include_unsubscribed`
    pub async fn fetch_list_members(
        &self,
        address: &str,
        include_unsubscribed: bool,
    ) -> Result<Vec<ListMember>> {
        let mut params = Vec::with_capacity(2);
        if !include_unsubscribed {
            params.push(("subscribed", "yes".to_string()));
        }
        params.push(("limit", MEMBERS_PAGE_LIMIT.to_string()));

        let url = self.ctx.v3_url(&format!("/lists/{address}/members"), &params)?;
        let members: Vec<ListMember> = self
            .ctx
            .fetch_all(&url)
            .await?
            .iter()
            .map(map_list_member)
            .collect();
        info!("Fetched {} members for list {}", members.len(), address);
        Ok(members)
    }

    pub async fn fetch_list_stats(&self, address: &str) -> Result<Value> {
        let url = self.ctx.v3_url(&format!("/lists/{address}/stats"), &[])?;
        let body = self.ctx.get_json(&url).await?;
        Ok(unwrap_envelope(body, "stats"))
    }

    /// Attach members and stats, fetched concurrently
    pub async fn enrich_list(&self, list: ListRecord, include_unsubscribed: bool) -> EnrichedList {
        let Some(address) = list.address.clone() else {
            return EnrichedList {
                list,
                members: Vec::new(),
                stats: None,
                member_count: 0,
            };
        };

        let (members, stats) = futures::join!(
            self.fetch_list_members(&address, include_unsubscribed),
            self.fetch_list_stats(&address),
        );
        let members = or_empty(&format!("members of {address}"), members);

        EnrichedList {
            list,
            member_count: members.len(),
            members,
            stats: or_null(&format!("stats for {address}"), stats),
        }
    }

    /// Every list with its members, honouring the configured subscription filter
    pub async fn fetch_all_lists_with_members(&self) -> Result<Vec<EnrichedList>> {
        let lists = self.fetch_lists().await?;
        let mut enriched = Vec::with_capacity(lists.len());
        for list in lists {
            enriched.push(self.enrich_list(list, self.ctx.include_unsubscribed).await);
        }
        Ok(enriched)
    }

    /// Lists whose address belongs to `domain`
    pub async fn fetch_lists_by_domain(&self, domain: &str) -> Result<Vec<ListRecord>> {
        let suffix = format!("@{domain}");
        let lists = self.fetch_lists().await?;
        Ok(lists
            .into_iter()
            .filter(|l| l.address.as_deref().is_some_and(|a| a.ends_with(&suffix)))
            .collect())
    }
}
