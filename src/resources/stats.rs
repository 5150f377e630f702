//! Sending statistics (`/v3/{domain}/stats/total`) with derived metrics

use super::{field, ApiContext};
use crate::error::Result;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Events requested for general stats
pub const STATS_EVENTS: [&str; 7] = [
    "accepted",
    "delivered",
    "failed",
    "opened",
    "clicked",
    "unsubscribed",
    "complained",
];

pub const ENGAGEMENT_EVENTS: [&str; 4] = ["opened", "clicked", "unsubscribed", "complained"];

pub const DELIVERY_EVENTS: [&str; 4] = ["accepted", "delivered", "failed", "temporary_failed"];

/// Per-period counters, in output order
const COUNT_METRICS: [&str; 8] = [
    "accepted",
    "delivered",
    "failed",
    "opened",
    "clicked",
    "unsubscribed",
    "complained",
    "stored",
];

/// Counters compared by [`calculate_trends`]
const TREND_METRICS: [&str; 5] = ["accepted", "delivered", "failed", "opened", "clicked"];

/// Fewer periods than this produce no trends
const MIN_TREND_PERIODS: usize = 4;

// ============================================================================
// Query
// ============================================================================

/// Event filter and optional tag for one stats request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsQuery {
    pub events: Vec<String>,
    pub tag: Option<String>,
}

impl Default for StatsQuery {
    fn default() -> Self {
        Self::for_events(&STATS_EVENTS)
    }
}

impl StatsQuery {
    pub fn for_events(events: &[&str]) -> Self {
        Self {
            events: events.iter().map(|e| (*e).to_string()).collect(),
            tag: None,
        }
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

// ============================================================================
// Report Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeRange {
    pub start: Option<Value>,
    pub end: Option<Value>,
    pub resolution: Option<Value>,
}

/// Percentages with two decimals
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rates {
    pub delivery_rate: f64,
    pub open_rate: f64,
    pub click_rate: f64,
    pub bounce_rate: f64,
    pub complaint_rate: f64,
    pub unsubscribe_rate: f64,
}

impl Rates {
    fn from_counts(count: impl Fn(&str) -> u64) -> Self {
        let delivered = count("delivered");
        let accepted = count("accepted");
        Self {
            delivery_rate: calculate_rate(delivered, accepted),
            open_rate: calculate_rate(count("opened"), delivered),
            click_rate: calculate_rate(count("clicked"), delivered),
            bounce_rate: calculate_rate(count("failed"), accepted),
            complaint_rate: calculate_rate(count("complained"), delivered),
            unsubscribe_rate: calculate_rate(count("unsubscribed"), delivered),
        }
    }
}

/// One resolution bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsPeriod {
    pub time: Option<Value>,
    pub accepted: u64,
    pub delivered: u64,
    pub failed: u64,
    pub opened: u64,
    pub clicked: u64,
    pub unsubscribed: u64,
    pub complained: u64,
    pub stored: u64,
    #[serde(flatten)]
    pub rates: Rates,
}

impl StatsPeriod {
    fn from_raw(stat: &Value) -> Self {
        let count = |metric: &str| metric_total(stat.get(metric));
        Self {
            time: field(stat, "time"),
            accepted: count("accepted"),
            delivered: count("delivered"),
            failed: count("failed"),
            opened: count("opened"),
            clicked: count("clicked"),
            unsubscribed: count("unsubscribed"),
            complained: count("complained"),
            stored: count("stored"),
            rates: Rates::from_counts(count),
        }
    }

    /// Counter by metric name; unknown names count as zero
    pub fn count(&self, metric: &str) -> u64 {
        match metric {
            "accepted" => self.accepted,
            "delivered" => self.delivered,
            "failed" => self.failed,
            "opened" => self.opened,
            "clicked" => self.clicked,
            "unsubscribed" => self.unsubscribed,
            "complained" => self.complained,
            "stored" => self.stored,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

/// Second-half average against first-half average
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trend {
    pub change: i64,
    pub change_percent: f64,
    pub trend: TrendDirection,
}

/// Totals, overall rates, per-period averages and trends
///
/// Every map is empty and `overallRates` absent when there are no periods.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregates {
    pub totals: BTreeMap<String, u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_rates: Option<Rates>,
    pub averages: BTreeMap<String, u64>,
    pub trends: BTreeMap<String, Trend>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    pub time_range: TimeRange,
    pub stats: Vec<StatsPeriod>,
    pub aggregates: Aggregates,
}

/// General, engagement and delivery stats; failed parts are `null`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComprehensiveStats {
    pub general: Option<StatsReport>,
    pub engagement: BTreeMap<String, Option<StatsReport>>,
    pub delivery: BTreeMap<String, Option<StatsReport>>,
    pub generated_at: String,
}

// ============================================================================
// Processing
// ============================================================================

/// Counter of one metric: its `total`, else the sum of nested `total`s
///
/// `failed` reports `{temporary: {...}, permanent: {total}}` without a
/// top-level total on some accounts.
fn metric_total(metric: Option<&Value>) -> u64 {
    match metric {
        Some(Value::Number(n)) => n.as_f64().map_or(0, |f| f.max(0.0) as u64),
        Some(Value::Object(map)) => match map.get("total") {
            Some(total @ Value::Number(_)) => metric_total(Some(total)),
            _ => map
                .values()
                .filter(|v| v.is_object())
                .map(|v| metric_total(v.get("total")))
                .sum(),
        },
        _ => 0,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `numerator / denominator` as a percentage with two decimals
pub fn calculate_rate(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    round2(numerator as f64 / denominator as f64 * 100.0)
}

/// Turn a raw `stats/total` response into a [`StatsReport`]
pub fn process_stats(data: &Value) -> StatsReport {
    let stats: Vec<StatsPeriod> = data
        .get("stats")
        .and_then(Value::as_array)
        .map(|periods| periods.iter().map(StatsPeriod::from_raw).collect())
        .unwrap_or_default();

    StatsReport {
        time_range: TimeRange {
            start: field(data, "start"),
            end: field(data, "end"),
            resolution: field(data, "resolution"),
        },
        aggregates: calculate_aggregates(&stats),
        stats,
    }
}

pub fn calculate_aggregates(stats: &[StatsPeriod]) -> Aggregates {
    if stats.is_empty() {
        return Aggregates::default();
    }

    let totals: BTreeMap<String, u64> = COUNT_METRICS
        .iter()
        .map(|metric| {
            let sum = stats.iter().map(|s| s.count(metric)).sum();
            ((*metric).to_string(), sum)
        })
        .collect();

    let periods = stats.len() as f64;
    let averages = totals
        .iter()
        .map(|(metric, total)| (metric.clone(), (*total as f64 / periods).round() as u64))
        .collect();

    let total = |metric: &str| totals.get(metric).copied().unwrap_or(0);
    let overall_rates = Rates::from_counts(total);

    Aggregates {
        overall_rates: Some(overall_rates),
        averages,
        trends: calculate_trends(stats),
        totals,
    }
}

/// Compare the first half of the periods with the second half
pub fn calculate_trends(stats: &[StatsPeriod]) -> BTreeMap<String, Trend> {
    if stats.len() < MIN_TREND_PERIODS {
        return BTreeMap::new();
    }

    let (first, second) = stats.split_at(stats.len() / 2);
    let average = |half: &[StatsPeriod], metric: &str| {
        half.iter().map(|s| s.count(metric) as f64).sum::<f64>() / half.len() as f64
    };

    TREND_METRICS
        .iter()
        .map(|metric| {
            let before = average(first, metric);
            let change = average(second, metric) - before;
            let change_percent = if before > 0.0 {
                change / before * 100.0
            } else {
                0.0
            };
            let trend = if change > 0.0 {
                TrendDirection::Up
            } else if change < 0.0 {
                TrendDirection::Down
            } else {
                TrendDirection::Stable
            };
            let trend = Trend {
                change: change.round() as i64,
                change_percent: round2(change_percent),
                trend,
            };
            ((*metric).to_string(), trend)
        })
        .collect()
}

// ============================================================================
// Service
// ============================================================================

/// Fetches and processes domain statistics
#[derive(Debug, Clone)]
pub struct StatsService {
    ctx: ApiContext,
}

impl StatsService {
    pub fn new(ctx: ApiContext) -> Self {
        Self { ctx }
    }

    /// Request URL: one `event` parameter per event, daily over 30 days
    pub fn stats_url(&self, query: &StatsQuery) -> Result<String> {
        let mut params: Vec<(&str, String)> =
            query.events.iter().map(|e| ("event", e.clone())).collect();
        params.push(("resolution", "day".to_string()));
        params.push(("duration", "30d".to_string()));
        if let Some(start) = &self.ctx.begin {
            params.push(("start", start.clone()));
        }
        if let Some(end) = &self.ctx.end {
            params.push(("end", end.clone()));
        }
        if let Some(tag) = &query.tag {
            params.push(("tag", tag.clone()));
        }
        self.ctx
            .v3_url(&format!("/{}/stats/total", self.ctx.domain), &params)
    }

    pub async fn fetch_stats(&self, query: &StatsQuery) -> Result<StatsReport> {
        let url = self.stats_url(query)?;
        let body = self.ctx.get_json(&url).await?;
        let report = process_stats(&body);
        info!(
            "Fetched {} stats periods for {}",
            report.stats.len(),
            self.ctx.domain
        );
        Ok(report)
    }

    pub async fn fetch_stats_by_tag(&self, tag: &str) -> Result<StatsReport> {
        self.fetch_stats(&StatsQuery::default().tag(tag)).await
    }

    /// One report per engagement event
    pub async fn fetch_engagement_stats(&self) -> BTreeMap<String, Option<StatsReport>> {
        self.fetch_per_event(&ENGAGEMENT_EVENTS).await
    }

    /// One report per delivery event
    pub async fn fetch_delivery_stats(&self) -> BTreeMap<String, Option<StatsReport>> {
        self.fetch_per_event(&DELIVERY_EVENTS).await
    }

    async fn fetch_per_event(&self, events: &[&str]) -> BTreeMap<String, Option<StatsReport>> {
        let mut reports = BTreeMap::new();
        for event in events {
            let report = match self.fetch_stats(&StatsQuery::for_events(&[event])).await {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!("Failed to fetch {} stats: {}", event, e);
                    None
                }
            };
            reports.insert((*event).to_string(), report);
        }
        reports
    }

    /// General, engagement and delivery stats fetched concurrently
    pub async fn fetch_comprehensive_stats(&self) -> ComprehensiveStats {
        let default_query = StatsQuery::default();
        let (general, engagement, delivery) = futures::join!(
            self.fetch_stats(&default_query),
            self.fetch_engagement_stats(),
            self.fetch_delivery_stats(),
        );

        ComprehensiveStats {
            general: super::or_null("general stats", general),
            engagement,
            delivery,
            generated_at: Utc::now().to_rfc3339(),
        }
    }
}
