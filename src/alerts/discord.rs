// Discord webhook notifier.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use super::{Alert, Notifier};

#[derive(Clone)]
pub struct DiscordWebhook {
    url: String,
    client: Client,
}

impl DiscordWebhook {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: Client::new(),
        }
    }

    fn payload(alert: &Alert) -> serde_json::Value {
        let description = alert
            .conditions
            .iter()
            .map(|c| format!("- {}", c))
            .collect::<Vec<_>>()
            .join("\n");
        let content = alert
            .role_id
            .as_ref()
            .map(|role| format!("<@&{}>", role))
            .unwrap_or_default();
        let roles: Vec<&String> = alert.role_id.iter().collect();
        json!({
            "content": content,
            "embeds": [{
                "title": alert.title,
                "description": description,
            }],
            "allowed_mentions": { "roles": roles },
        })
    }
}

#[async_trait]
impl Notifier for DiscordWebhook {
    async fn send(&self, alert: &Alert) -> anyhow::Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&Self::payload(alert))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!("webhook returned {}: {}", status, body);
        }
        Ok(())
    }
}
