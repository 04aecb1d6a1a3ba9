//! Discord-style webhook notifications.
//!
//! Delivery is fire-and-forget: each POST runs on its own short-lived
//! thread, and the outcome comes back to the loop only so it can be logged.
//! There is no retry and no backoff.

use std::sync::mpsc::Sender;
use std::thread;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::debug;

use crate::fleet::LoopEvent;

const COLOR_CONNECTED: u32 = 0x57F287;
const COLOR_DISCONNECTED: u32 = 0xED4245;
const COLOR_RECONNECTING: u32 = 0xFEE75C;
const COLOR_DIED: u32 = 0x992D22;
const COLOR_STATS: u32 = 0x3498DB;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Connected,
    Disconnected,
    Reconnecting,
    Died,
}

impl StatusKind {
    fn describe(self) -> (&'static str, &'static str, u32) {
        match self {
            Self::Connected => ("🟢", "connected to the server", COLOR_CONNECTED),
            Self::Disconnected => ("🔴", "was disconnected", COLOR_DISCONNECTED),
            Self::Reconnecting => ("🟡", "is reconnecting", COLOR_RECONNECTING),
            Self::Died => ("💀", "died", COLOR_DIED),
        }
    }
}

/// Something worth telling the webhook about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Status {
        account: String,
        kind: StatusKind,
    },
    Stats {
        account: String,
        balance: String,
        shards: String,
    },
}

impl Notification {
    pub fn account(&self) -> &str {
        match self {
            Self::Status { account, .. } | Self::Stats { account, .. } => account,
        }
    }

    fn embed(&self, timestamp: String) -> Embed {
        match self {
            Self::Status { account, kind } => {
                let (icon, verb, color) = kind.describe();
                Embed {
                    title: format!("{icon} {account}"),
                    description: Some(format!("`{account}` {verb}.")),
                    color,
                    fields: Vec::new(),
                    timestamp,
                }
            }
            Self::Stats {
                account,
                balance,
                shards,
            } => Embed {
                title: format!("💰 Status: {account}"),
                description: None,
                color: COLOR_STATS,
                fields: vec![
                    EmbedField {
                        name: "💵 Balance".to_string(),
                        value: format!("`{balance}`"),
                        inline: true,
                    },
                    EmbedField {
                        name: "✨ Shards".to_string(),
                        value: format!("`{shards}`"),
                        inline: true,
                    },
                ],
                timestamp,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Embed {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub color: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    pub timestamp: String,
}

/// Request body for one webhook call.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WebhookPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub embeds: Vec<Embed>,
}

impl WebhookPayload {
    pub fn build(notification: &Notification, mention: Option<&str>, timestamp: String) -> Self {
        Self {
            content: mention.map(|id| format!("<@{id}>")),
            embeds: vec![notification.embed(timestamp)],
        }
    }
}

/// Result of one delivery attempt, reported back to the loop for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookOutcome {
    pub account: String,
    pub result: Result<u16, String>,
}

/// Sink for notifications.
pub trait Notifier {
    fn notify(&mut self, notification: Notification);
}

/// Used when no webhook URL is configured.
pub struct Disabled;

impl Notifier for Disabled {
    fn notify(&mut self, notification: Notification) {
        debug!(account = notification.account(), "no webhook url; dropping notification");
    }
}

/// POSTs payloads with `ureq`, one thread per call.
pub struct WebhookClient {
    url: String,
    mention: Option<String>,
    outcomes: Sender<LoopEvent>,
}

impl WebhookClient {
    pub fn new(url: String, mention: Option<String>, outcomes: Sender<LoopEvent>) -> Self {
        Self {
            url,
            mention,
            outcomes,
        }
    }
}

impl Notifier for WebhookClient {
    fn notify(&mut self, notification: Notification) {
        let payload = WebhookPayload::build(
            &notification,
            self.mention.as_deref(),
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        let url = self.url.clone();
        let outcomes = self.outcomes.clone();
        let account = notification.account().to_string();

        let spawned = thread::Builder::new()
            .name("webhook".to_string())
            .spawn(move || {
                let result = match ureq::post(&url).send_json(&payload) {
                    Ok(response) => Ok(response.status()),
                    Err(ureq::Error::Status(code, _)) => Err(format!("HTTP {code}")),
                    Err(e) => Err(e.to_string()),
                };
                let _ = outcomes.send(LoopEvent::Webhook(WebhookOutcome { account, result }));
            });
        if let Err(e) = spawned {
            debug!(error = %e, "failed to start webhook thread");
        }
    }
}

#[cfg(test)]
pub mod recording {
    //! Notifier that keeps everything it is handed, for fleet tests.

    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[derive(Default, Clone)]
    pub struct Recorder {
        pub sent: Rc<RefCell<Vec<Notification>>>,
    }

    impl Recorder {
        pub fn stats_for(&self, account: &str) -> Vec<(String, String)> {
            self.sent
                .borrow()
                .iter()
                .filter_map(|n| match n {
                    Notification::Stats {
                        account: who,
                        balance,
                        shards,
                    } if who == account => Some((balance.clone(), shards.clone())),
                    _ => None,
                })
                .collect()
        }

        pub fn statuses_for(&self, account: &str) -> Vec<StatusKind> {
            self.sent
                .borrow()
                .iter()
                .filter_map(|n| match n {
                    Notification::Status { account: who, kind } if who == account => Some(*kind),
                    _ => None,
                })
                .collect()
        }
    }

    impl Notifier for Recorder {
        fn notify(&mut self, notification: Notification) {
            self.sent.borrow_mut().push(notification);
        }
    }
}
