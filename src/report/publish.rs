// Publishing the rendered report to a persistent named document.
// Only a confirmed NotFound may create; a failed lookup skips this run.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

const REVISION_REASON: &str = "Updated queue statistics";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Inherit,
    MaintainersOnly,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Inherit => "inherit",
            Permission::MaintainersOnly => "maintainers_only",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inherit" => Ok(Permission::Inherit),
            "maintainers_only" => Ok(Permission::MaintainersOnly),
            other => anyhow::bail!("unknown permission {:?}", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DocumentSettings {
    pub listed: bool,
    pub permission: Permission,
}

/// Applied once, when the document is first created.
pub const INITIAL_SETTINGS: DocumentSettings = DocumentSettings {
    listed: true,
    permission: Permission::MaintainersOnly,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub name: String,
    pub content: String,
    pub settings: DocumentSettings,
}

/// Outcome of an existence check. A lookup failure is not the same as absence.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentLookup {
    Found(Document),
    NotFound,
    TransientError(String),
}

#[async_trait]
pub trait DocumentPublisher: Send + Sync {
    async fn fetch(&self, name: &str) -> DocumentLookup;
    /// Creates the document with its settings in one step. Fails if the name already exists.
    async fn create(
        &self,
        name: &str,
        content: &str,
        reason: &str,
        settings: DocumentSettings,
    ) -> anyhow::Result<()>;
    async fn update(&self, name: &str, content: &str, reason: &str) -> anyhow::Result<()>;
    async fn set_settings(&self, name: &str, settings: DocumentSettings) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Created,
    Updated,
    Skipped,
}

pub async fn publish_report(
    publisher: &dyn DocumentPublisher,
    name: &str,
    content: &str,
) -> anyhow::Result<PublishOutcome> {
    match publisher.fetch(name).await {
        DocumentLookup::Found(_) => {
            publisher.update(name, content, REVISION_REASON).await?;
            info!(document = %name, "report updated");
            Ok(PublishOutcome::Updated)
        }
        DocumentLookup::NotFound => {
            publisher
                .create(name, content, REVISION_REASON, INITIAL_SETTINGS)
                .await?;
            info!(document = %name, "report created");
            Ok(PublishOutcome::Created)
        }
        DocumentLookup::TransientError(e) => {
            warn!(document = %name, error = %e, "document lookup failed; report not published");
            Ok(PublishOutcome::Skipped)
        }
    }
}
