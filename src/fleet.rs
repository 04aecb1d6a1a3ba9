//! The fleet engine: owns every session and reacts to loop events.
//!
//! All state lives on the loop thread. Client readers, the console input
//! thread and webhook workers only produce [`LoopEvent`]s; the loop hands
//! each one to [`Fleet::handle`] and fires due timers with
//! [`Fleet::run_due`]. Timer tasks carry the account and connection
//! generation they were scheduled for and re-check both before acting, so a
//! reconnect silently retires everything the old connection left behind.

use std::f32::consts::PI;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::aggregator::MessageAggregator;
use crate::classifier::{strip_formatting, ChatRules, TeleportRequest};
use crate::client::{ClientEvent, ClientFactory, ConnectSpec, Control};
use crate::config::FleetConfig;
use crate::console::{self, Console};
use crate::inventory::Window;
use crate::registry::SessionRegistry;
use crate::session::{ConnectionStatus, PendingConfirm, Progress, Session, Transition};
use crate::timers::TimerQueue;
use crate::webhook::{Notification, Notifier, StatusKind, WebhookOutcome};

/// Everything the loop thread reacts to.
#[derive(Debug)]
pub enum LoopEvent {
    /// Something happened on one account's connection.
    Client {
        account: String,
        generation: u64,
        event: ClientEvent,
    },
    /// An operator line.
    Input(String),
    /// Stdin hit EOF. Sessions keep running.
    InputClosed,
    Webhook(WebhookOutcome),
}

/// Whether the loop should keep going after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
enum Task {
    /// Open a connection for an account (startup stagger).
    Start { account: String },
    /// Announce and reopen a dropped connection.
    Reconnect { account: String },
    /// Print the aggregated chat buffer.
    Flush,
    Session {
        account: String,
        generation: u64,
        action: SessionTask,
    },
}

impl Task {
    fn session(account: &str, generation: u64, action: SessionTask) -> Self {
        Self::Session {
            account: account.to_string(),
            generation,
            action,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionTask {
    Login,
    Queue,
    StatsPoll,
    ShardQuery,
    StatsReport,
    AntiIdle,
    AntiIdleRelease,
    Respawn,
    TeleportAccept { confirm: bool },
    ConfirmTimeout,
}

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

pub struct Fleet {
    pub(crate) config: FleetConfig,
    rules: ChatRules,
    pub(crate) registry: SessionRegistry,
    pub(crate) focus: Option<String>,
    pub(crate) webhook_active: bool,
    aggregator: MessageAggregator,
    timers: TimerQueue<Task>,
    factory: Box<dyn ClientFactory>,
    notifier: Box<dyn Notifier>,
    pub(crate) console: Box<dyn Console>,
    next_generation: u64,
}

impl Fleet {
    pub fn new(
        config: FleetConfig,
        factory: Box<dyn ClientFactory>,
        notifier: Box<dyn Notifier>,
        console: Box<dyn Console>,
    ) -> Self {
        Self {
            rules: ChatRules::new(&config.patterns),
            aggregator: MessageAggregator::new(config.accounts.usernames.len()),
            webhook_active: config.webhook.active_on_start,
            registry: SessionRegistry::new(),
            focus: None,
            timers: TimerQueue::new(),
            factory,
            notifier,
            console,
            next_generation: 0,
            config,
        }
    }

    /// Schedule every configured account, `join_delay_ms` apart.
    pub fn start(&mut self) {
        let gap = ms(self.config.accounts.join_delay_ms);
        let accounts = self.config.accounts.usernames.clone();
        info!(count = accounts.len(), "starting fleet");
        self.console.print(console::info(format!(
            "Starting {} account(s), {}s apart",
            accounts.len(),
            gap.as_secs_f32()
        )));
        for (i, account) in accounts.into_iter().enumerate() {
            self.timers.schedule(gap * i as u32, Task::Start { account });
        }
    }

    pub fn handle(&mut self, event: LoopEvent) -> Flow {
        match event {
            LoopEvent::Client {
                account,
                generation,
                event,
            } => self.on_client_event(&account, generation, event),
            LoopEvent::Input(line) => {
                let flow = self.dispatch(&line);
                if flow == Flow::Continue {
                    let prompt = console::prompt(self.focus.as_deref());
                    self.console.set_prompt(prompt);
                }
                return flow;
            }
            LoopEvent::InputClosed => {
                info!("console input closed");
                self.console.print(console::info(
                    "Console input closed. Sessions keep running; press Ctrl-C to stop.",
                ));
            }
            LoopEvent::Webhook(outcome) => self.on_webhook_outcome(outcome),
        }
        Flow::Continue
    }

    /// Fire every timer due at or before `now`, in deadline order.
    pub fn run_due(&mut self, now: Duration) {
        while let Some((_, task)) = self.timers.pop_until(now) {
            self.fire(task);
        }
        self.timers.advance_to(now);
    }

    /// Time until the next timer, if any is pending.
    pub fn until_next_timer(&mut self) -> Option<Duration> {
        self.timers.until_next()
    }

    /// Ask every live connection to close.
    pub fn shutdown(&mut self) {
        let mut closed = 0;
        for session in self.registry.iter_mut().filter(|s| s.is_live()) {
            session.quit();
            closed += 1;
        }
        info!(closed, "fleet shut down");
    }

    #[cfg(test)]
    pub fn focus(&self) -> Option<&str> {
        self.focus.as_deref()
    }

    /// Sessions a command applies to: the focused one if it exists,
    /// otherwise all of them in startup order.
    pub(crate) fn targets(&self) -> Vec<String> {
        match self.focus.as_deref() {
            Some(name) if self.registry.contains(name) => vec![name.to_string()],
            _ => self.registry.names(),
        }
    }

    pub(crate) fn say(&mut self, line: String) {
        self.console.print(line);
    }

    /// Start or stop anti-idle for one account. Returns the new state, or
    /// `None` if the account can't run it right now.
    pub(crate) fn toggle_anti_idle(&mut self, account: &str) -> Option<bool> {
        let session = self.registry.get_mut(account)?;
        if let Some(id) = session.anti_idle_timer.take() {
            self.timers.cancel(id);
            return Some(false);
        }
        if !session.is_connected() {
            return None;
        }
        let generation = session.generation;
        session.anti_idle_timer = Some(self.timers.schedule(
            ms(self.config.anti_idle.interval_ms),
            Task::session(account, generation, SessionTask::AntiIdle),
        ));
        Some(true)
    }

    fn connect_spec(&self, account: &str) -> ConnectSpec {
        let server = &self.config.server;
        ConnectSpec {
            host: server.host.clone(),
            port: server.port,
            version: server.version.clone(),
            username: account.to_string(),
            auth: server.auth.clone(),
        }
    }

    fn start_session(&mut self, account: &str) {
        self.next_generation += 1;
        let generation = self.next_generation;
        let spec = self.connect_spec(account);
        info!(account, generation, "connecting");

        match self.factory.connect(&spec, generation) {
            Ok(client) => {
                if let Some(mut old) = self.registry.insert(Session::new(account, generation, client)) {
                    for id in old.disconnect() {
                        self.timers.cancel(id);
                    }
                }
                self.console
                    .print(console::info(format!("[~] {account} connecting...")));
            }
            Err(e) => {
                warn!(account, error = %e, "connect failed");
                self.console.print(console::error(format!(
                    "[-] {account} failed to connect: {e}"
                )));
                self.timers.schedule(
                    ms(self.config.timing.reconnect_delay_ms),
                    Task::Reconnect {
                        account: account.to_string(),
                    },
                );
            }
        }
    }

    // ── client events ──

    fn on_client_event(&mut self, account: &str, generation: u64, event: ClientEvent) {
        let live = self
            .registry
            .current_mut(account, generation)
            .is_some_and(|s| s.is_live());
        if !live {
            debug!(account, generation, ?event, "dropping event from stale connection");
            return;
        }
        match event {
            ClientEvent::Spawn => self.on_spawn(account),
            ClientEvent::Death => self.on_death(account, generation),
            ClientEvent::End { reason } => self.on_end(account, &reason),
            ClientEvent::Chat { text } => self.on_chat(account, generation, &text),
            ClientEvent::WindowOpen(window) => self.on_window_open(account, window),
            ClientEvent::WindowClose => {
                if let Some(session) = self.registry.get_mut(account) {
                    session.window = None;
                }
            }
            ClientEvent::Inventory(window) => {
                if let Some(session) = self.registry.get_mut(account) {
                    session.inventory = window;
                }
            }
            ClientEvent::Scoreboard(board) => {
                if let Some(session) = self.registry.get_mut(account) {
                    session.scoreboard = Some(board);
                }
            }
        }
    }

    fn on_spawn(&mut self, account: &str) {
        let Some(session) = self.registry.get_mut(account) else {
            return;
        };
        if session.is_connected() {
            debug!(account, "respawned");
            return;
        }
        session.connection = ConnectionStatus::Connected;
        let generation = session.generation;
        if session.stats_timer.is_none() {
            session.stats_timer = Some(self.timers.schedule(
                ms(self.config.webhook.poll_interval_ms),
                Task::session(account, generation, SessionTask::StatsPoll),
            ));
        }
        if self.config.anti_idle.enabled && session.anti_idle_timer.is_none() {
            session.anti_idle_timer = Some(self.timers.schedule(
                ms(self.config.anti_idle.interval_ms),
                Task::session(account, generation, SessionTask::AntiIdle),
            ));
        }

        info!(account, generation, "spawned");
        self.console
            .print(console::success(format!("[+] {account} spawned")));
        self.notifier.notify(Notification::Status {
            account: account.to_string(),
            kind: StatusKind::Connected,
        });
    }

    fn on_end(&mut self, account: &str, reason: &str) {
        let Some(session) = self.registry.get_mut(account) else {
            return;
        };
        let was_joined = session.progress == Progress::FullyJoined;
        for id in session.disconnect() {
            self.timers.cancel(id);
        }

        warn!(account, reason, "disconnected");
        self.console.print(console::error(format!(
            "[-] {account} disconnected: {reason}"
        )));
        if was_joined {
            self.notifier.notify(Notification::Status {
                account: account.to_string(),
                kind: StatusKind::Disconnected,
            });
        }
        let delay = ms(self.config.timing.reconnect_delay_ms);
        self.console.print(console::info(format!(
            "[~] {account} reconnecting in {}s",
            delay.as_secs()
        )));
        self.timers.schedule(
            delay,
            Task::Reconnect {
                account: account.to_string(),
            },
        );
    }

    fn on_death(&mut self, account: &str, generation: u64) {
        info!(account, "died");
        self.console
            .print(console::error(format!("[x] {account} died, respawning")));
        self.notifier.notify(Notification::Status {
            account: account.to_string(),
            kind: StatusKind::Died,
        });
        self.timers.schedule(
            ms(self.config.timing.respawn_delay_ms),
            Task::session(account, generation, SessionTask::Respawn),
        );
    }

    fn on_chat(&mut self, account: &str, generation: u64, text: &str) {
        let line = strip_formatting(text);
        if line.is_empty() {
            return;
        }
        for tag in self.rules.classify(&line) {
            let Some(session) = self.registry.get_mut(account) else {
                return;
            };
            if let Some(transition) = session.apply(&tag) {
                self.on_transition(account, generation, transition);
            }
        }
        if self.aggregator.record(account, &line) {
            self.timers
                .schedule(ms(self.config.timing.aggregate_window_ms), Task::Flush);
        }
    }

    fn on_transition(&mut self, account: &str, generation: u64, transition: Transition) {
        let timing = &self.config.timing;
        match transition {
            Transition::LoginPrompted => {
                self.console
                    .print(console::info(format!("[?] {account} asked to log in")));
                self.timers.schedule(
                    ms(timing.login_delay_ms),
                    Task::session(account, generation, SessionTask::Login),
                );
            }
            Transition::LoggedIn => {
                info!(account, "logged in");
                self.console
                    .print(console::success(format!("[+] {account} logged in")));
                if self.config.accounts.queue_command.is_some() {
                    self.timers.schedule(
                        ms(timing.queue_delay_ms),
                        Task::session(account, generation, SessionTask::Queue),
                    );
                }
            }
            Transition::QueueConfirmed { first: true } => {
                self.console
                    .print(console::info(format!("[~] {account} is in the queue")));
            }
            Transition::QueueConfirmed { first: false } => {
                debug!(account, "queue confirmation repeated");
            }
            Transition::FullyJoined => {
                info!(account, "fully joined");
                self.console
                    .print(console::success(format!("[*] {account} fully joined")));
            }
            Transition::BalanceUpdated | Transition::ShardsUpdated => {
                debug!(account, "stats updated");
            }
            Transition::TeleportRequested(request) => {
                self.on_teleport_request(account, generation, request);
            }
        }
    }

    fn on_teleport_request(&mut self, account: &str, generation: u64, request: TeleportRequest) {
        let teleport = &self.config.teleport;
        if !teleport.enabled {
            debug!(account, requester = %request.requester, "teleport automation off");
            return;
        }
        if let Some(master) = &teleport.master {
            if !master.eq_ignore_ascii_case(&request.requester) {
                self.console.print(console::info(format!(
                    "[tp] {account} ignored request from {}",
                    request.requester
                )));
                return;
            }
        }
        let confirm = teleport.confirm_kinds.contains(&request.kind);
        self.console.print(console::info(format!(
            "[tp] {account} accepting {:?} request from {}",
            request.kind, request.requester
        )));
        self.timers.schedule(
            ms(self.config.timing.teleport_accept_delay_ms),
            Task::session(account, generation, SessionTask::TeleportAccept { confirm }),
        );
    }

    fn on_window_open(&mut self, account: &str, window: Window) {
        let Some(session) = self.registry.get_mut(account) else {
            return;
        };
        if let Some(pending) = session.pending_confirm {
            match window.find_marker(&self.config.teleport.confirm_item) {
                Some(slot) => {
                    if session.call("confirm click", |c| c.click_slot(slot)) {
                        self.timers.cancel(pending.timeout);
                        session.pending_confirm = None;
                        self.console.print(console::success(format!(
                            "[tp] {account} confirmed teleport (slot {slot})"
                        )));
                    }
                }
                None => debug!(account, title = %window.title, "no confirmation marker in window"),
            }
        }
        if self.focus.as_deref().is_none_or(|f| f == account) {
            self.console.print(console::window(account, &window, true));
        }
        session.window = Some(window);
    }

    fn on_webhook_outcome(&mut self, outcome: WebhookOutcome) {
        let WebhookOutcome { account, result } = outcome;
        match result {
            Ok(status) => {
                debug!(account, status, "webhook delivered");
                self.console
                    .print(console::success(format!("[webhook] sent for {account}")));
            }
            Err(e) => {
                warn!(account, error = %e, "webhook failed");
                self.console
                    .print(console::error(format!("[webhook] {account}: {e}")));
            }
        }
    }

    // ── timers ──

    fn fire(&mut self, task: Task) {
        match task {
            Task::Start { account } => self.start_session(&account),
            Task::Reconnect { account } => {
                self.notifier.notify(Notification::Status {
                    account: account.clone(),
                    kind: StatusKind::Reconnecting,
                });
                self.start_session(&account);
            }
            Task::Flush => {
                for line in self.aggregator.flush() {
                    self.console.print(console::aggregated(&line));
                }
            }
            Task::Session {
                account,
                generation,
                action,
            } => self.run_session_task(&account, generation, action),
        }
    }

    fn run_session_task(&mut self, account: &str, generation: u64, action: SessionTask) {
        let Some(session) = self
            .registry
            .current_mut(account, generation)
            .filter(|s| s.is_live())
        else {
            debug!(account, generation, ?action, "dropping timer for stale session");
            return;
        };
        let timing = &self.config.timing;

        match action {
            SessionTask::Login => {
                let accounts = &self.config.accounts;
                let command = format!("{} {}", accounts.login_command, accounts.password);
                if session.chat(command.trim_end()) {
                    self.console
                        .print(console::info(format!("[>] {account} sent login")));
                }
            }
            SessionTask::Queue => {
                let Some(queue) = &self.config.accounts.queue_command else {
                    return;
                };
                if session.chat(queue) {
                    session.raise(Progress::QueueJoined);
                    self.console
                        .print(console::info(format!("[>] {account} sent {queue}")));
                }
            }
            SessionTask::StatsPoll => {
                if !session.is_connected() {
                    session.stats_timer = None;
                    return;
                }
                session.stats_timer = Some(self.timers.schedule(
                    ms(self.config.webhook.poll_interval_ms),
                    Task::session(account, generation, SessionTask::StatsPoll),
                ));
                if !self.webhook_active {
                    debug!(account, "webhook inactive; skipping stats poll");
                    return;
                }
                session.chat(&self.config.stats.balance_command);
                self.timers.schedule(
                    ms(timing.balance_shard_gap_ms),
                    Task::session(account, generation, SessionTask::ShardQuery),
                );
                self.timers.schedule(
                    ms(timing.stats_report_delay_ms),
                    Task::session(account, generation, SessionTask::StatsReport),
                );
            }
            SessionTask::ShardQuery => {
                if session.is_connected() && self.webhook_active {
                    session.chat(&self.config.stats.shard_command);
                }
            }
            SessionTask::StatsReport => {
                if session.is_connected() && self.webhook_active {
                    self.notifier.notify(Notification::Stats {
                        account: account.to_string(),
                        balance: session.balance.clone(),
                        shards: session.shards.clone(),
                    });
                }
            }
            SessionTask::AntiIdle => {
                if !session.is_connected() {
                    session.anti_idle_timer = None;
                    return;
                }
                session.anti_idle_timer = Some(self.timers.schedule(
                    ms(self.config.anti_idle.interval_ms),
                    Task::session(account, generation, SessionTask::AntiIdle),
                ));
                let mut rng = rand::thread_rng();
                let yaw = rng.gen_range(-PI..PI);
                let pitch = rng.gen_range(-0.5f32..0.5);
                session.call("look", |c| c.look(yaw, pitch));
                if session.call("jump", |c| c.set_control(Control::Jump, true)) {
                    self.timers.schedule(
                        ms(timing.anti_idle_release_ms),
                        Task::session(account, generation, SessionTask::AntiIdleRelease),
                    );
                }
            }
            SessionTask::AntiIdleRelease => {
                session.call("release jump", |c| c.set_control(Control::Jump, false));
            }
            SessionTask::Respawn => {
                session.call("respawn", |c| c.respawn());
            }
            SessionTask::TeleportAccept { confirm } => {
                if !session.chat(&self.config.teleport.accept_command) {
                    return;
                }
                self.console
                    .print(console::success(format!("[tp] {account} accepted teleport")));
                if confirm {
                    if let Some(old) = session.pending_confirm.take() {
                        self.timers.cancel(old.timeout);
                    }
                    let timeout = self.timers.schedule(
                        ms(timing.teleport_confirm_timeout_ms),
                        Task::session(account, generation, SessionTask::ConfirmTimeout),
                    );
                    session.pending_confirm = Some(PendingConfirm { timeout });
                }
            }
            SessionTask::ConfirmTimeout => {
                if session.pending_confirm.take().is_some() {
                    self.console.print(console::error(format!(
                        "[tp] {account} never got a confirmation window"
                    )));
                }
            }
        }
    }
}
