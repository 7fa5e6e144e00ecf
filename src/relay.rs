//! The decode -> filter -> enrich -> format -> deliver pipeline

use tokio::task::JoinHandle;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use crate::RelayConfig;
use crate::error::Result;
use crate::event::{BuildEvent, decode_build_event};
use crate::github::GithubClient;
use crate::slack::{LinkTargets, NotificationMessage, SlackWebhook, build_message};

/// What a single invocation did
#[derive(Debug)]
pub enum Outcome {
    /// Status not in the allow-list; nothing was sent.
    Skipped { build_id: String, status: String },
    /// Notification handed to the delivery task.
    Dispatched {
        message: NotificationMessage,
        delivery: JoinHandle<()>,
    },
}

pub struct Relay {
    config: RelayConfig,
    github: GithubClient,
    slack: SlackWebhook,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Self {
        let http = reqwest::Client::new();
        let github = GithubClient::new(
            http.clone(),
            &config.github_api_url,
            &config.github_org,
            &config.github_access_token,
        );
        let slack = SlackWebhook::new(http, &config.slack_webhook_url);
        Self {
            config,
            github,
            slack,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Handle one encoded build event. Only a malformed payload is an error.
    pub async fn handle_payload(&self, data: &str) -> Result<Outcome> {
        let span = info_span!("invocation", invocation_id = %Uuid::now_v7());
        self.invoke(data).instrument(span).await
    }

    async fn invoke(&self, data: &str) -> Result<Outcome> {
        let event = decode_build_event(data)?;
        Ok(self.handle_event(event).await)
    }

    pub async fn handle_event(&self, event: BuildEvent) -> Outcome {
        if !event.should_notify() {
            info!(build_id = %event.id, status = %event.status, "Status not notified; skipping");
            return Outcome::Skipped {
                build_id: event.id,
                status: event.status,
            };
        }

        let commit = if self.config.enrich_commits {
            Some(self.github.enrich(event.repo_name(), event.commit_sha()).await)
        } else {
            None
        };

        let message = build_message(
            &event,
            commit.as_ref(),
            LinkTargets {
                github_web_url: &self.config.github_web_url,
                github_org: &self.config.github_org,
                trigger_urls: &self.config.trigger_name_to_url_mapping,
            },
        );

        info!(
            build_id = %event.id,
            status = %event.status,
            repo = event.repo_name(),
            "Dispatching build notification"
        );
        let delivery = self.slack.dispatch(message.clone());

        Outcome::Dispatched { message, delivery }
    }
}
