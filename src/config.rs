use std::str::FromStr;

use regex::Regex;
use serde::Deserialize;

const WEBHOOK_PATTERN: &str = r"^https://discord\.com/api/webhooks/\d+/";
const ROLE_ID_PATTERN: &str = r"^\d+$";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub rollup: RollupConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_pool_size: u32,
}

/// Cron expressions (seconds first), evaluated in UTC.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub sample_cron: String,
    pub report_cron: String,
    pub rollup_cron: String,
    /// A job run taking longer than this is abandoned.
    pub job_timeout_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            sample_cron: "0 */5 * * * *".into(),
            report_cron: "0 1 0 * * *".into(),
            rollup_cron: "0 0 5 * * *".into(),
            job_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RollupConfig {
    /// Raw samples younger than this stay at full resolution.
    pub raw_retention_hours: u32,
}

impl Default for RollupConfig {
    fn default() -> Self {
        Self {
            raw_retention_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub document_name: String,
    pub summary_days: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            document_name: "modqueue-tools/queuestats".into(),
            summary_days: 28,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub enabled: bool,
    pub queue_size_threshold: u32,
    /// 0 disables the item age check.
    pub item_age_threshold_hours: u32,
    /// 0 disables the per-post check.
    pub per_post_percent_threshold: f64,
    pub webhook_url: Option<String>,
    pub role_id: Option<String>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            queue_size_threshold: 30,
            item_age_threshold_hours: 24,
            per_post_percent_threshold: 40.0,
            webhook_url: None,
            role_id: None,
        }
    }
}

impl AlertConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.queue_size_threshold >= 1,
            "alerts.queue_size_threshold must be at least 1, got {}",
            self.queue_size_threshold
        );
        anyhow::ensure!(
            self.per_post_percent_threshold >= 0.0,
            "alerts.per_post_percent_threshold must be >= 0, got {}",
            self.per_post_percent_threshold
        );
        if let Some(url) = &self.webhook_url {
            anyhow::ensure!(
                Regex::new(WEBHOOK_PATTERN)?.is_match(url),
                "alerts.webhook_url is not a valid Discord webhook URL: {}",
                url
            );
        }
        if let Some(role) = &self.role_id {
            anyhow::ensure!(
                Regex::new(ROLE_ID_PATTERN)?.is_match(role),
                "alerts.role_id must be numeric, got {:?}",
                role
            );
        }
        Ok(())
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.database.path.is_empty(),
            "database.path must be non-empty"
        );
        anyhow::ensure!(
            self.database.max_pool_size > 0,
            "database.max_pool_size must be > 0, got {}",
            self.database.max_pool_size
        );
        for (key, expr) in [
            ("schedule.sample_cron", &self.schedule.sample_cron),
            ("schedule.report_cron", &self.schedule.report_cron),
            ("schedule.rollup_cron", &self.schedule.rollup_cron),
        ] {
            cron::Schedule::from_str(expr)
                .map_err(|e| anyhow::anyhow!("{} is not a valid cron expression: {}", key, e))?;
        }
        anyhow::ensure!(
            self.schedule.job_timeout_secs > 0,
            "schedule.job_timeout_secs must be > 0, got {}",
            self.schedule.job_timeout_secs
        );
        anyhow::ensure!(
            self.rollup.raw_retention_hours >= 1,
            "rollup.raw_retention_hours must be at least 1, got {}",
            self.rollup.raw_retention_hours
        );
        anyhow::ensure!(
            !self.report.document_name.is_empty(),
            "report.document_name must be non-empty"
        );
        anyhow::ensure!(
            self.report.summary_days > 0,
            "report.summary_days must be > 0, got {}",
            self.report.summary_days
        );
        self.alerts.validate()?;
        Ok(())
    }
}
