use std::{
    io::{self, Write},
    sync::Arc,
};

use anyhow::{Context, Result};
use reqwest::Client;

use crate::{
    config::AppConfig,
    domain::ReportLine,
    infrastructure::shutdown::Shutdown,
    report::{start_spam_report, SpamReport},
    services::{HttpBackend, Services, SimulatedBackend},
};

pub struct SpamReportApp {
    config: Arc<AppConfig>,
    services: Services,
    shutdown: Shutdown,
}

impl SpamReportApp {
    pub fn initialize(config: AppConfig, shutdown: Shutdown) -> Result<Self> {
        let services = build_services(&config)?;
        Ok(Self::with_services(config, services, shutdown))
    }

    pub fn with_services(config: AppConfig, services: Services, shutdown: Shutdown) -> Self {
        Self {
            config: Arc::new(config),
            services,
            shutdown,
        }
    }

    /// Generates the report and prints it to stdout.
    pub async fn run(self, emails: Vec<String>) -> Result<()> {
        let Some(report) = self.generate(emails).await? else {
            return Ok(());
        };
        let stdout = io::stdout();
        let mut out = io::BufWriter::new(stdout.lock());
        write_report(&mut out, &report.lines).context("failed to write report")?;
        Ok(())
    }

    /// Returns `None` when a shutdown signal arrives before the pipeline drains.
    pub async fn generate(&self, emails: Vec<String>) -> Result<Option<SpamReport>> {
        let mut shutdown = self.shutdown.subscribe();
        let settings = self.config.pipeline;
        tracing::info!(
            emails = emails.len(),
            max_batch_users = settings.max_batch_users,
            max_concurrent_classifications = settings.max_concurrent_classifications,
            batch_workers = settings.batch_workers,
            "spam report started"
        );

        let mut running = start_spam_report(emails, &self.services, &settings)
            .context("invalid pipeline settings")?;
        let mut lines = Vec::new();
        loop {
            tokio::select! {
                line = running.next_line() => match line {
                    Some(line) => lines.push(line),
                    None => break,
                },
                _ = shutdown.notified() => {
                    match running.abort().await {
                        Ok(stats) => tracing::warn!(
                            lines = stats.report_lines,
                            "shutdown requested (CTRL+C / SIGTERM) after the pipeline drained; discarding report"
                        ),
                        Err(err) => tracing::warn!(
                            error = %err,
                            "shutdown requested (CTRL+C / SIGTERM); pipeline stopped"
                        ),
                    }
                    return Ok(None);
                }
            }
        }

        let report = running
            .finish(lines)
            .await
            .context("spam report pipeline failed")?;
        Ok(Some(report))
    }
}

fn build_services(config: &AppConfig) -> Result<Services> {
    match &config.service.base_url {
        Some(base_url) => {
            let http = Client::builder()
                .user_agent(format!("spam-report/{}", env!("CARGO_PKG_VERSION")))
                .timeout(config.service.timeout)
                .build()?;
            let backend = HttpBackend::new(http, base_url)
                .with_context(|| format!("invalid SERVICE_BASE_URL {base_url}"))?;
            tracing::info!(target: "services", base_url = %base_url, "using http backend");
            Ok(Services::from_backend(Arc::new(backend)))
        }
        None => {
            tracing::info!(target: "services", "SERVICE_BASE_URL not set; using simulated backend");
            let backend = SimulatedBackend::new(&config.pipeline, &config.simulation);
            Ok(Services::from_backend(Arc::new(backend)))
        }
    }
}

pub fn write_report<W: Write>(out: &mut W, lines: &[ReportLine]) -> io::Result<()> {
    for line in lines {
        writeln!(out, "{line}")?;
    }
    out.flush()
}
