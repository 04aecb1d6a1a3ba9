//! Per-account session state.
//!
//! A [`Session`] is one connection's worth of state: connection status,
//! login progress, scraped stats, client-side mirrors and the handles of the
//! timers it owns. Chat tags are folded into it with [`Session::apply`],
//! which returns the [`Transition`] that fired so the fleet can schedule
//! the follow-up actions.

use std::fmt;

use tracing::warn;

use crate::classifier::{ChatTag, TeleportRequest};
use crate::client::{ClientError, GameClient, Scoreboard};
use crate::inventory::Window;
use crate::timers::TimerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        };
        f.pad(s)
    }
}

/// How far the account got on the current connection. Only ever raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Progress {
    NotLoggedIn,
    LoginAttempted,
    LoggedIn,
    QueueJoined,
    FullyJoined,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotLoggedIn => "not logged in",
            Self::LoginAttempted => "login sent",
            Self::LoggedIn => "logged in",
            Self::QueueJoined => "in queue",
            Self::FullyJoined => "joined",
        };
        f.pad(s)
    }
}

/// What a chat tag did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// First login prompt on this connection; login should be sent.
    LoginPrompted,
    LoggedIn,
    /// `first` is false when the session was already at or past the queue.
    QueueConfirmed { first: bool },
    FullyJoined,
    BalanceUpdated,
    ShardsUpdated,
    TeleportRequested(TeleportRequest),
}

/// A teleport accepted with a confirmation window still to click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingConfirm {
    pub timeout: TimerId,
}

pub struct Session {
    pub account: String,
    pub generation: u64,
    pub connection: ConnectionStatus,
    pub progress: Progress,
    /// The login command has been scheduled or sent on this connection.
    pub login_attempted: bool,
    /// The post-login queue step has been scheduled on this connection.
    pub queue_sent: bool,
    pub balance: String,
    pub shards: String,
    pub stats_timer: Option<TimerId>,
    pub anti_idle_timer: Option<TimerId>,
    pub pending_confirm: Option<PendingConfirm>,
    pub inventory: Window,
    pub window: Option<Window>,
    pub scoreboard: Option<Scoreboard>,
    client: Box<dyn GameClient>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("account", &self.account)
            .field("generation", &self.generation)
            .field("connection", &self.connection)
            .field("progress", &self.progress)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(account: impl Into<String>, generation: u64, client: Box<dyn GameClient>) -> Self {
        Self {
            account: account.into(),
            generation,
            connection: ConnectionStatus::Connecting,
            progress: Progress::NotLoggedIn,
            login_attempted: false,
            queue_sent: false,
            balance: "$0".to_string(),
            shards: "0".to_string(),
            stats_timer: None,
            anti_idle_timer: None,
            pending_confirm: None,
            inventory: Window::default(),
            window: None,
            scoreboard: None,
            client,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionStatus::Connected
    }

    /// Still attached to a live connection (spawned or not yet).
    pub fn is_live(&self) -> bool {
        self.connection != ConnectionStatus::Disconnected
    }

    /// Whether a timer or event tagged with `generation` still applies.
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Raise progress to `to`. Returns `false` if already there or beyond.
    pub fn raise(&mut self, to: Progress) -> bool {
        if self.progress < to {
            self.progress = to;
            true
        } else {
            false
        }
    }

    /// Fold one classified tag into the session.
    pub fn apply(&mut self, tag: &ChatTag) -> Option<Transition> {
        match tag {
            ChatTag::Balance(value) => {
                self.balance.clone_from(value);
                Some(Transition::BalanceUpdated)
            }
            ChatTag::Shards(value) => {
                self.shards.clone_from(value);
                Some(Transition::ShardsUpdated)
            }
            ChatTag::LoginPrompt => (!self.login_attempted).then(|| {
                self.login_attempted = true;
                self.raise(Progress::LoginAttempted);
                Transition::LoginPrompted
            }),
            ChatTag::LoginSuccess => {
                self.raise(Progress::LoggedIn);
                (!std::mem::replace(&mut self.queue_sent, true)).then_some(Transition::LoggedIn)
            }
            ChatTag::QueueConfirmed => Some(Transition::QueueConfirmed {
                first: self.raise(Progress::QueueJoined),
            }),
            ChatTag::WorldJoined => self
                .raise(Progress::FullyJoined)
                .then_some(Transition::FullyJoined),
            ChatTag::TeleportRequest(request) => {
                Some(Transition::TeleportRequested(request.clone()))
            }
        }
    }

    /// Mark the connection gone and hand back every timer it owned so the
    /// caller can cancel them.
    pub fn disconnect(&mut self) -> Vec<TimerId> {
        self.connection = ConnectionStatus::Disconnected;
        self.window = None;
        [
            self.stats_timer.take(),
            self.anti_idle_timer.take(),
            self.pending_confirm.take().map(|p| p.timeout),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Run one client call, logging failures. Returns whether it went out.
    pub fn call(
        &mut self,
        what: &str,
        f: impl FnOnce(&mut dyn GameClient) -> Result<(), ClientError>,
    ) -> bool {
        match f(self.client.as_mut()) {
            Ok(()) => true,
            Err(e) => {
                warn!(account = %self.account, error = %e, "{what} failed");
                false
            }
        }
    }

    pub fn chat(&mut self, text: &str) -> bool {
        self.call("chat", |c| c.send_chat(text))
    }

    pub fn quit(&mut self) {
        self.client.quit();
    }
}
