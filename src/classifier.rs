//! Chat line classification.
//!
//! Server chat is the only signal the bots get about where they are in the
//! login / queue / join flow, so every cleaned line is run through an ordered
//! table of rules. Each rule yields at most one [`ChatTag`]; rules are
//! evaluated independently, so one line can raise several tags (a welcome
//! message that also mentions a balance, for instance).
//!
//! A rule holds one or more matchers. The first matcher that fires wins and
//! the rest of that rule is skipped, which is how the mutually exclusive
//! teleport request wordings are handled.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::config::{PatternsConfig, TeleportKind};

/// Semantic events recognised in a chat line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatTag {
    /// A dollar amount, e.g. `$1.5K`.
    Balance(String),
    /// Shard count following "current balance is".
    Shards(String),
    LoginPrompt,
    LoginSuccess,
    QueueConfirmed,
    WorldJoined,
    TeleportRequest(TeleportRequest),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeleportRequest {
    pub requester: String,
    pub kind: TeleportKind,
}

type TagBuilder = fn(&Captures) -> Option<ChatTag>;

enum Matcher {
    /// Case-insensitive substring match against any phrase (stored lowercase).
    Phrases { phrases: Vec<String>, tag: ChatTag },
    /// Regex match; the builder turns captures into a tag.
    Pattern { regex: Regex, build: TagBuilder },
}

impl Matcher {
    fn phrases(phrases: &[String], tag: ChatTag) -> Self {
        Self::Phrases {
            phrases: phrases
                .iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            tag,
        }
    }

    fn pattern(regex: &str, build: TagBuilder) -> Self {
        Self::Pattern {
            regex: Regex::new(regex).unwrap(),
            build,
        }
    }

    fn apply(&self, line: &str, lowered: &str) -> Option<ChatTag> {
        match self {
            Self::Phrases { phrases, tag } => phrases
                .iter()
                .any(|p| lowered.contains(p.as_str()))
                .then(|| tag.clone()),
            Self::Pattern { regex, build } => regex.captures(line).and_then(|caps| build(&caps)),
        }
    }
}

struct Rule {
    name: &'static str,
    matchers: Vec<Matcher>,
}

/// Ordered classification table.
pub struct ChatRules {
    rules: Vec<Rule>,
}

fn capture(caps: &Captures, group: usize) -> Option<String> {
    caps.get(group).map(|m| m.as_str().to_string())
}

fn teleport(caps: &Captures, kind: TeleportKind) -> Option<ChatTag> {
    let requester = caps
        .iter()
        .skip(1)
        .flatten()
        .next()
        .map(|m| m.as_str().to_string())?;
    Some(ChatTag::TeleportRequest(TeleportRequest { requester, kind }))
}

impl ChatRules {
    /// Build the rule table. Phrase lists come from config; the extraction
    /// patterns are fixed.
    pub fn new(patterns: &PatternsConfig) -> Self {
        Self {
            rules: vec![
                Rule {
                    name: "balance",
                    matchers: vec![Matcher::pattern(r"\$[0-9][0-9.,]*[KMB]?", |caps| {
                        let amount = caps.get(0)?.as_str();
                        Some(ChatTag::Balance(
                            amount.trim_end_matches(['.', ',']).to_string(),
                        ))
                    })],
                },
                Rule {
                    name: "shards",
                    matchers: vec![Matcher::pattern(
                        r"(?i)current balance is\D*?([0-9]+(?:\.[0-9]+)?[KMB]?)",
                        |caps| capture(caps, 1).map(ChatTag::Shards),
                    )],
                },
                Rule {
                    name: "login-prompt",
                    matchers: vec![Matcher::phrases(
                        &patterns.login_prompt,
                        ChatTag::LoginPrompt,
                    )],
                },
                Rule {
                    name: "login-success",
                    matchers: vec![Matcher::phrases(
                        &patterns.login_success,
                        ChatTag::LoginSuccess,
                    )],
                },
                Rule {
                    name: "queue-confirmed",
                    matchers: vec![Matcher::phrases(
                        &patterns.queue_confirmed,
                        ChatTag::QueueConfirmed,
                    )],
                },
                Rule {
                    name: "world-joined",
                    matchers: vec![Matcher::phrases(
                        &patterns.world_joined,
                        ChatTag::WorldJoined,
                    )],
                },
                Rule {
                    name: "teleport-request",
                    matchers: vec![
                        Matcher::pattern(
                            r"(?i)\b(\w{1,16}) has requested that you teleport to them",
                            |caps| teleport(caps, TeleportKind::Here),
                        ),
                        Matcher::pattern(
                            r"(?i)\b(\w{1,16}) has requested to teleport to you",
                            |caps| teleport(caps, TeleportKind::To),
                        ),
                        Matcher::pattern(
                            r"(?i)(?:teleport request from (\w{1,16})|\b(\w{1,16}) (?:wants|would like) to teleport)",
                            |caps| teleport(caps, TeleportKind::Generic),
                        ),
                    ],
                },
            ],
        }
    }

    /// Classify a cleaned chat line. Tags come back in rule order; an empty
    /// vector means "no event".
    pub fn classify(&self, line: &str) -> Vec<ChatTag> {
        let lowered = line.to_lowercase();
        let mut tags = Vec::new();
        for rule in &self.rules {
            if let Some(tag) = rule.matchers.iter().find_map(|m| m.apply(line, &lowered)) {
                tracing::trace!(rule = rule.name, ?tag, "chat rule matched");
                tags.push(tag);
            }
        }
        tags
    }
}

impl Default for ChatRules {
    fn default() -> Self {
        Self::new(&PatternsConfig::default())
    }
}

/// Remove `§` formatting codes and terminal escapes, then trim.
pub fn strip_formatting(input: &str) -> String {
    static FORMAT_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)§[0-9a-fk-orx]|\x1b\[[0-9;?]*[A-Za-z]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)")
            .unwrap()
    });
    FORMAT_RE.replace_all(input, "").trim().to_string()
}
