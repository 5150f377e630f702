//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputArgs};
use crate::config::{load_config, parse_date, ExportConfig};
use crate::engine::{ExportEngine, ExportReport};
use crate::error::{Error, Result};
use crate::http::RateGate;
use crate::output::{export_timestamp, FileExporter};
use crate::resources::{ApiContext, DomainsService, EventsService, StatsQuery, StatsService};
use crate::types::{OptionStringExt, ResourceKind};
use std::time::Instant;
use tracing::{debug, info};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Export { select, output } => self.export(&select.kinds(), output).await,
            Commands::Events { event_type, output } => {
                self.events(event_type.as_deref(), output).await
            }
            Commands::Stats {
                comprehensive,
                output,
            } => self.stats(*comprehensive, output).await,
            Commands::Status => self.status().await,
            Commands::Test => self.test().await,
        }
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Layer defaults, the config file, then environment and flags
    pub fn build_config(&self, output: Option<&OutputArgs>) -> Result<ExportConfig> {
        let mut config = match &self.cli.config {
            Some(path) => {
                debug!("Loading config from {}", path.display());
                load_config(path)?
            }
            None => ExportConfig::default(),
        };

        // an exported-but-empty variable does not override the file
        let cli = &self.cli;
        if let Some(key) = cli.api_key.clone().none_if_empty() {
            config.api_key = Some(key);
        }
        if let Some(domain) = cli.domain.clone().none_if_empty() {
            config.domain = Some(domain);
        }
        if let Some(region) = cli.region {
            config.region = region;
        }
        if let Some(host) = cli.api_host.clone().none_if_empty() {
            config.api_host = Some(host);
        }
        if let Some(rate) = cli.rate_limit {
            config.http.rate_limit = rate;
        }
        if let Some(max) = cli.max_concurrent {
            config.http.max_concurrent = max;
        }

        if let Some(output) = output {
            if let Some(format) = output.format {
                config.export.format = format;
            }
            if let Some(dir) = output.output.clone().none_if_empty() {
                config.export.output_dir = dir;
            }
            if let Some(from) = &output.date_from {
                config.export.date_from = Some(parse_date(from)?);
            }
            if let Some(to) = &output.date_to {
                config.export.date_to = Some(parse_date(to)?);
            }
            if output.include_unsubscribed {
                config.export.include_unsubscribed = true;
            }
        }

        Ok(config)
    }

    fn validated_config(&self, output: Option<&OutputArgs>) -> Result<ExportConfig> {
        let config = self.build_config(output)?;
        config.validate()?;
        Ok(config)
    }

    // ========================================================================
    // Commands
    // ========================================================================

    async fn export(&self, kinds: &[ResourceKind], output: &OutputArgs) -> Result<()> {
        let config = self.validated_config(Some(output))?;
        let engine = ExportEngine::from_config(&config)?;

        info!(
            "Exporting {} to {} as {}",
            config.domain.as_deref().unwrap_or_default(),
            engine.exporter().destination().describe(),
            config.export.format
        );

        let report = engine.run(kinds, config.export.format).await?;
        print_report(&report);

        if report.is_success() {
            Ok(())
        } else {
            Err(Error::Other(format!(
                "{} of {} data types failed to export",
                report.failure_count(),
                report.outcomes.len()
            )))
        }
    }

    async fn events(&self, event_type: Option<&str>, output: &OutputArgs) -> Result<()> {
        let config = self.validated_config(Some(output))?;
        let service = EventsService::new(ApiContext::from_config(&config)?);
        let exporter = FileExporter::from_settings(&config.export)?;
        let start = Instant::now();

        let (data_type, events) = match event_type {
            Some(kind) => (format!("events_{kind}"), service.fetch_events_by_type(kind).await?),
            None => ("events".to_string(), service.fetch_events().await?),
        };
        let data = serde_json::to_value(&events)?;

        let files = exporter
            .export_data(&data, &data_type, config.export.format, &export_timestamp())
            .await?;
        print_files(events.len(), &files, start);
        Ok(())
    }

    async fn stats(&self, comprehensive: bool, output: &OutputArgs) -> Result<()> {
        let config = self.validated_config(Some(output))?;
        let service = StatsService::new(ApiContext::from_config(&config)?);
        let exporter = FileExporter::from_settings(&config.export)?;
        let start = Instant::now();

        let (data_type, data) = if comprehensive {
            let stats = service.fetch_comprehensive_stats().await;
            ("stats_comprehensive", serde_json::to_value(&stats)?)
        } else {
            let report = service.fetch_stats(&StatsQuery::default()).await?;
            ("stats", serde_json::to_value(&report)?)
        };

        // stats are a single document: JSON regardless of the requested format
        let files = vec![
            exporter
                .export_json(&data, data_type, &export_timestamp())
                .await?,
        ];
        print_files(1, &files, start);
        Ok(())
    }

    async fn status(&self) -> Result<()> {
        let config = self.build_config(None)?;
        let gate = RateGate::new(config.rate_gate_config())?;
        let status = gate.status().await;

        println!("Rate limit status:");
        println!(
            "  Requests in window: {}/{}",
            status.requests_in_window, status.limit
        );
        println!("  Remaining:          {}", status.remaining);
        println!("  Available slots:    {}", status.available_slots);
        println!();
        println!("Configuration:");
        println!("  API key:        {}", config.masked_api_key());
        println!(
            "  Domain:         {}",
            config.domain.as_deref().unwrap_or("(not set)")
        );
        println!("  Region:         {}", config.region);
        println!("  API host:       {}", config.api_host());
        println!("  Max concurrent: {}", config.http.max_concurrent);
        println!("  Max retries:    {}", config.http.max_retries);
        println!("  Output:         {}", config.export.output_dir);
        println!("  Format:         {}", config.export.format);
        Ok(())
    }

    async fn test(&self) -> Result<()> {
        let config = self.validated_config(None)?;
        let service = DomainsService::new(ApiContext::from_config(&config)?);

        println!("Testing connection to {}...", config.api_host());
        match service.fetch_domains().await {
            Ok(domains) => {
                println!("Connection OK: {} domains found", domains.len());
                Ok(())
            }
            Err(e) => {
                println!("Connection failed: {e}");
                if let Some(hint) = failure_hint(&e) {
                    println!("Hint: {hint}");
                }
                Err(e)
            }
        }
    }
}

/// Advice for common credential mistakes
pub fn failure_hint(error: &Error) -> Option<&'static str> {
    match error.status() {
        Some(401) => Some("check MAILGUN_API_KEY"),
        Some(404) => Some("check MAILGUN_DOMAIN and MAILGUN_REGION"),
        _ => None,
    }
}

fn print_report(report: &ExportReport) {
    println!();
    println!("Export summary ({})", report.timestamp);
    for outcome in &report.outcomes {
        let mark = if outcome.is_success() { "ok" } else { "FAILED" };
        println!(
            "  {:<6} {:<13} {:>8} records  {:>7}",
            mark,
            outcome.kind.as_str(),
            outcome.record_count,
            outcome.duration_label()
        );
        for error in &outcome.errors {
            println!("         {error}");
        }
    }
    println!(
        "Total: {} records in {} files",
        report.total_records(),
        report.total_files()
    );
    if let Some(path) = &report.summary_path {
        println!("Summary: {path}");
    }
}

fn print_files(records: usize, files: &[String], start: Instant) {
    println!(
        "Exported {} records in {:.1}s",
        records,
        start.elapsed().as_secs_f64()
    );
    for file in files {
        println!("  {file}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExportFormat, Region};
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["mailgun-export"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    fn output_of(cli: &Cli) -> Option<&OutputArgs> {
        match &cli.command {
            Commands::Export { output, .. }
            | Commands::Events { output, .. }
            | Commands::Stats { output, .. } => Some(output),
            Commands::Status | Commands::Test => None,
        }
    }

    #[test]
    fn test_export_selection_defaults_to_all() {
        let cli = parse(&["export"]);
        let Commands::Export { select, .. } = &cli.command else {
            panic!("expected export");
        };
        assert_eq!(select.kinds(), ResourceKind::ALL.to_vec());
    }

    #[test]
    fn test_export_selection_keeps_order() {
        let cli = parse(&["export", "--stats", "--events", "--lists"]);
        let Commands::Export { select, .. } = &cli.command else {
            panic!("expected export");
        };
        assert_eq!(
            select.kinds(),
            vec![ResourceKind::Events, ResourceKind::Lists, ResourceKind::Stats]
        );

        let cli = parse(&["export", "--all", "--events"]);
        let Commands::Export { select, .. } = &cli.command else {
            panic!("expected export");
        };
        assert_eq!(select.kinds().len(), ResourceKind::ALL.len());
    }

    #[test]
    fn test_flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "api_key: key-file\ndomain: file.example.com\nhttp:\n  rate_limit: 60\nexport:\n  format: csv"
        )
        .unwrap();

        let config_path = file.path().display().to_string();
        let cli = parse(&[
            "-C",
            config_path.as_str(),
            "--domain",
            "flag.example.com",
            "--region",
            "EU",
            "export",
            "--format",
            "parquet",
            "--date-from",
            "2024-01-01",
            "--output",
            "/tmp/out",
        ]);
        let runner = Runner::new(cli);

        let config = runner.build_config(None).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("key-file"));
        assert_eq!(config.domain.as_deref(), Some("flag.example.com"));
        assert_eq!(config.region, Region::Eu);
        assert_eq!(config.http.rate_limit, 60);
        assert_eq!(config.export.format, ExportFormat::Csv);

        let config = runner.build_config(output_of(&runner.cli)).unwrap();
        assert_eq!(config.export.format, ExportFormat::Parquet);
        assert_eq!(config.export.output_dir, "/tmp/out");
    }

    #[test]
    fn test_empty_values_do_not_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "api_key: key-file\ndomain: file.example.com").unwrap();

        let config_path = file.path().display().to_string();
        let cli = parse(&[
            "-C",
            config_path.as_str(),
            "--api-key",
            "",
            "--domain",
            "",
            "export",
            "--output",
            "",
        ]);
        let runner = Runner::new(cli);
        let config = runner.build_config(output_of(&runner.cli)).unwrap();

        assert_eq!(config.api_key.as_deref(), Some("key-file"));
        assert_eq!(config.domain.as_deref(), Some("file.example.com"));
        assert_eq!(config.export.output_dir, "./exports");
    }

    #[test]
    fn test_output_flags_applied() {
        let cli = parse(&[
            "--api-key",
            "key-x",
            "--domain",
            "mg.example.com",
            "events",
            "--type",
            "failed",
            "--format",
            "both",
            "--date-from",
            "2024-01-01",
            "--date-to",
            "2024-01-31",
            "-o",
            "s3://bucket/exports",
        ]);
        let runner = Runner::new(cli);
        let config = runner.build_config(output_of(&runner.cli)).unwrap();

        assert_eq!(config.export.format, ExportFormat::Both);
        assert_eq!(config.export.output_dir, "s3://bucket/exports");
        assert_eq!(
            config.begin_rfc2822().as_deref(),
            Some("Mon, 1 Jan 2024 00:00:00 +0000")
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_bad_date_is_rejected() {
        let cli = parse(&["stats", "--date-from", "01/02/2024"]);
        let runner = Runner::new(cli);
        assert!(runner.build_config(output_of(&runner.cli)).is_err());
    }

    #[test]
    fn test_failure_hints() {
        assert_eq!(
            failure_hint(&Error::http_status(401, "Forbidden")),
            Some("check MAILGUN_API_KEY")
        );
        assert!(failure_hint(&Error::http_status(404, "")).is_some());
        assert_eq!(failure_hint(&Error::http_status(500, "")), None);
        assert_eq!(failure_hint(&Error::config("x")), None);
    }
}
