//! Slack message formatting and webhook delivery

use serde::Serialize;
use std::collections::HashMap;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, warn};

use crate::error::{RelayError, Result};
use crate::event::BuildEvent;
use crate::github::CommitInfo;

/// Incoming-webhook message body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationMessage {
    pub text: String,
    pub mrkdwn: bool,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attachment {
    pub title: String,
    pub title_link: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub title: String,
    pub value: String,
}

impl Field {
    fn new(title: &str, value: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            value: value.into(),
        }
    }
}

/// Where links in the message point to
#[derive(Debug, Clone, Copy)]
pub struct LinkTargets<'a> {
    /// Base URL of the GitHub web UI, e.g. `https://github.com`
    pub github_web_url: &'a str,
    pub github_org: &'a str,
    /// Trigger name -> deployed site
    pub trigger_urls: &'a HashMap<String, String>,
}

/// Build the notification for one build event.
///
/// `commit` is `None` when enrichment is disabled; the trigger, message and author
/// fields are then left out entirely.
pub fn build_message(
    event: &BuildEvent,
    commit: Option<&CommitInfo>,
    links: LinkTargets<'_>,
) -> NotificationMessage {
    let repo_name = event.repo_name();
    let sha = event.commit_sha();
    let trigger_name = event.trigger_name();

    let mut build_fields = vec![
        Field::new("Status", event.status.as_str()),
        Field::new("Environment", format!("`{}`", event.project_id)),
    ];

    let mut commit_fields = Vec::with_capacity(4);
    if let Some(info) = commit {
        build_fields.push(Field::new("Trigger", format!("`{}`", trigger_name)));
        commit_fields.push(Field::new("Message", format!("*{}*", info.message)));
        commit_fields.push(Field::new("Author", info.author_name.as_str()));
    }
    commit_fields.push(Field::new("Branch", event.branch_name()));
    commit_fields.push(Field::new("Repository", repo_name));

    let mut attachments = vec![
        Attachment {
            title: "View Build Logs".to_string(),
            title_link: event.log_url.clone(),
            fields: build_fields,
        },
        Attachment {
            title: format!("Commit - {}", sha),
            title_link: format!(
                "{}/{}/{}/commit/{}",
                links.github_web_url.trim_end_matches('/'),
                links.github_org,
                repo_name,
                sha
            ),
            fields: commit_fields,
        },
    ];

    if let Some(url) = links.trigger_urls.get(trigger_name) {
        attachments.push(Attachment {
            title: "View Website".to_string(),
            title_link: url.clone(),
            fields: Vec::new(),
        });
    }

    NotificationMessage {
        text: format!("Build - `{}`", event.id),
        mrkdwn: true,
        attachments,
    }
}

/// Slack incoming webhook
#[derive(Debug, Clone)]
pub struct SlackWebhook {
    http: reqwest::Client,
    url: String,
}

impl SlackWebhook {
    pub fn new(http: reqwest::Client, url: &str) -> Self {
        Self {
            http,
            url: url.to_string(),
        }
    }

    /// POST the message and wait for the response.
    pub async fn send(&self, message: &NotificationMessage) -> Result<()> {
        let resp = self
            .http
            .post(&self.url)
            .json(message)
            .send()
            .await
            .map_err(|e| RelayError::Delivery(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(RelayError::Delivery(format!("webhook returned {}: {}", status, text)));
        }
        Ok(())
    }

    /// Send the message on a detached task.
    ///
    /// Delivery is at-most-once and unconfirmed: callers are not expected to await the
    /// handle, and a process shut down before the task runs drops the notification.
    pub fn dispatch(&self, message: NotificationMessage) -> JoinHandle<()> {
        let webhook = self.clone();
        tokio::spawn(async move {
            match webhook.send(&message).await {
                Ok(()) => debug!("Delivered notification '{}'", message.text),
                Err(e) => warn!("Notification '{}' was not delivered: {}", message.text, e),
            }
        }
        .in_current_span())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Substitutions;
    use serde_json::json;

    fn sample_event() -> BuildEvent {
        BuildEvent {
            id: "b1".to_string(),
            project_id: "p1".to_string(),
            status: "SUCCESS".to_string(),
            log_url: "http://logs".to_string(),
            substitutions: Substitutions {
                commit_sha: "abc123".to_string(),
                branch_name: "main".to_string(),
                repo_name: "org_repo".to_string(),
                trigger_name: "backend".to_string(),
                ..Default::default()
            },
        }
    }

    fn trigger_urls() -> HashMap<String, String> {
        HashMap::from([("backend".to_string(), "https://api.example.com".to_string())])
    }

    fn links(trigger_urls: &HashMap<String, String>) -> LinkTargets<'_> {
        LinkTargets {
            github_web_url: "https://github.com",
            github_org: "acme",
            trigger_urls,
        }
    }

    #[test]
    fn enriched_message_matches_expected_layout() {
        let urls = trigger_urls();
        let commit = CommitInfo {
            message: "fix bug".to_string(),
            author_name: "Jane".to_string(),
        };

        let message = build_message(&sample_event(), Some(&commit), links(&urls));

        let expected = json!({
            "text": "Build - `b1`",
            "mrkdwn": true,
            "attachments": [
                {
                    "title": "View Build Logs",
                    "title_link": "http://logs",
                    "fields": [
                        { "title": "Status", "value": "SUCCESS" },
                        { "title": "Environment", "value": "`p1`" },
                        { "title": "Trigger", "value": "`backend`" }
                    ]
                },
                {
                    "title": "Commit - abc123",
                    "title_link": "https://github.com/acme/repo/commit/abc123",
                    "fields": [
                        { "title": "Message", "value": "*fix bug*" },
                        { "title": "Author", "value": "Jane" },
                        { "title": "Branch", "value": "main" },
                        { "title": "Repository", "value": "repo" }
                    ]
                },
                {
                    "title": "View Website",
                    "title_link": "https://api.example.com"
                }
            ]
        });
        assert_eq!(serde_json::to_value(&message).unwrap(), expected);
    }

    #[test]
    fn unmapped_trigger_yields_two_attachments() {
        let urls = trigger_urls();
        let mut event = sample_event();
        event.substitutions.trigger_name = "nightly".to_string();

        let message = build_message(&event, Some(&CommitInfo::default()), links(&urls));
        assert_eq!(message.attachments.len(), 2);
        assert!(message.attachments.iter().all(|a| a.title != "View Website"));
    }

    #[test]
    fn basic_variant_omits_enrichment_fields() {
        let urls = HashMap::new();
        let message = build_message(&sample_event(), None, links(&urls));

        let build_titles: Vec<_> = message.attachments[0].fields.iter().map(|f| f.title.as_str()).collect();
        let commit_titles: Vec<_> = message.attachments[1].fields.iter().map(|f| f.title.as_str()).collect();
        assert_eq!(build_titles, ["Status", "Environment"]);
        assert_eq!(commit_titles, ["Branch", "Repository"]);
    }

    #[test]
    fn placeholder_commit_is_rendered_verbatim() {
        let urls = HashMap::new();
        let message = build_message(&sample_event(), Some(&CommitInfo::placeholder()), links(&urls));

        let commit_fields = &message.attachments[1].fields;
        assert_eq!(commit_fields[0].value, "*[ERROR WHILE FETCHING COMMIT INFO]*");
        assert_eq!(commit_fields[1].value, "");
    }

    #[test]
    fn empty_event_passes_through_empty_strings() {
        let urls = HashMap::new();
        let message = build_message(&BuildEvent::default(), None, links(&urls));

        assert_eq!(message.text, "Build - ``");
        assert_eq!(message.attachments[0].title_link, "");
        assert_eq!(message.attachments[0].fields[1].value, "``");
        assert_eq!(message.attachments[1].title, "Commit - ");
    }
}
