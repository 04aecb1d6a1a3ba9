//! Operator command parsing and dispatch.
//!
//! A console line is either chat (no prefix) or a prefixed command.
//! [`parse`] turns it into an [`Input`] without touching any state;
//! [`Fleet::dispatch`] resolves the target sessions and runs it.

use thiserror::Error;
use tracing::debug;

use crate::console;
use crate::fleet::{Fleet, Flow};
use crate::inventory::{self, STORAGE_SLOTS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotRef {
    Index(usize),
    /// Case-insensitive fragment of an item's name or display name.
    Item(String),
}

impl SlotRef {
    fn parse(arg: &str) -> Self {
        match arg.parse() {
            Ok(index) => Self::Index(index),
            Err(_) => Self::Item(arg.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Focus(Option<String>),
    List,
    StartWebhook,
    StopWebhook,
    Inventory,
    Window,
    Click(SlotRef),
    Drop(SlotRef),
    DropAll,
    Relogin,
    AntiIdle,
    Armor,
    Sort,
    Stats,
    Score,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Empty,
    Chat(String),
    Command(Command),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '{0}', try {1}help")]
    Unknown(String, char),
    #[error("usage: {0}")]
    Usage(String),
}

struct CommandSpec {
    names: &'static [&'static str],
    args: &'static str,
    help: &'static str,
}

const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        names: &["control", "c"],
        args: "[name]",
        help: "focus one bot, or all bots with no name",
    },
    CommandSpec {
        names: &["list", "ls"],
        args: "",
        help: "list sessions and their status",
    },
    CommandSpec {
        names: &["startwebhook"],
        args: "",
        help: "resume stats polling and webhook reports",
    },
    CommandSpec {
        names: &["stopwebhook"],
        args: "",
        help: "pause stats polling and webhook reports",
    },
    CommandSpec {
        names: &["inv", "inventory"],
        args: "",
        help: "show the inventory",
    },
    CommandSpec {
        names: &["gui", "window"],
        args: "",
        help: "show the open window",
    },
    CommandSpec {
        names: &["click"],
        args: "<slot|item>",
        help: "click a slot in the open window",
    },
    CommandSpec {
        names: &["drop"],
        args: "<slot|item>",
        help: "drop a stack from the inventory",
    },
    CommandSpec {
        names: &["dropall"],
        args: "",
        help: "drop everything in the main inventory and hotbar",
    },
    CommandSpec {
        names: &["relogin", "login"],
        args: "",
        help: "send the login command again",
    },
    CommandSpec {
        names: &["afk", "antiafk"],
        args: "",
        help: "toggle anti-idle movement",
    },
    CommandSpec {
        names: &["armor"],
        args: "",
        help: "equip the best armor in the inventory",
    },
    CommandSpec {
        names: &["sort"],
        args: "",
        help: "sort the inventory by item name",
    },
    CommandSpec {
        names: &["stats", "status"],
        args: "",
        help: "show balance and shards",
    },
    CommandSpec {
        names: &["score"],
        args: "",
        help: "show the sidebar scoreboard",
    },
    CommandSpec {
        names: &["help", "h", "?"],
        args: "",
        help: "show this list",
    },
    CommandSpec {
        names: &["quit", "exit", "q"],
        args: "",
        help: "stop every bot and exit",
    },
];

/// Every command name and alias, for tab completion.
pub fn command_names() -> Vec<&'static str> {
    COMMANDS.iter().flat_map(|c| c.names.iter().copied()).collect()
}

fn usage(prefix: char, name: &str) -> CommandError {
    let args = COMMANDS
        .iter()
        .find(|c| c.names.contains(&name))
        .map(|c| c.args)
        .unwrap_or_default();
    CommandError::Usage(format!("{prefix}{name} {args}"))
}

/// Split a console line into chat or a command.
pub fn parse(line: &str, prefix: char) -> Result<Input, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Input::Empty);
    }
    let Some(rest) = line.strip_prefix(prefix) else {
        return Ok(Input::Chat(line.to_string()));
    };

    let (token, arg) = match rest.split_once(char::is_whitespace) {
        Some((token, arg)) => (token, arg.trim()),
        None => (rest, ""),
    };
    let name = token.to_lowercase();
    let arg = (!arg.is_empty()).then(|| arg.to_string());

    let slot = |arg: Option<String>| arg.map(|a| SlotRef::parse(&a)).ok_or_else(|| usage(prefix, &name));
    let command = match name.as_str() {
        "control" | "c" => Command::Focus(arg),
        "list" | "ls" => Command::List,
        "startwebhook" => Command::StartWebhook,
        "stopwebhook" => Command::StopWebhook,
        "inv" | "inventory" => Command::Inventory,
        "gui" | "window" => Command::Window,
        "click" => Command::Click(slot(arg)?),
        "drop" => Command::Drop(slot(arg)?),
        "dropall" => Command::DropAll,
        "relogin" | "login" => Command::Relogin,
        "afk" | "antiafk" => Command::AntiIdle,
        "armor" => Command::Armor,
        "sort" => Command::Sort,
        "stats" | "status" => Command::Stats,
        "score" => Command::Score,
        "help" | "h" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        _ => return Err(CommandError::Unknown(token.to_string(), prefix)),
    };
    Ok(Input::Command(command))
}

impl Fleet {
    /// Run one operator line.
    pub fn dispatch(&mut self, line: &str) -> Flow {
        let prefix = self.config.prefix();
        match parse(line, prefix) {
            Ok(Input::Empty) => {}
            Ok(Input::Chat(text)) => self.broadcast(&text),
            Ok(Input::Command(command)) => {
                debug!(?command, "console command");
                return self.run_command(command);
            }
            Err(e) => self.say(console::error(e.to_string())),
        }
        Flow::Continue
    }

    fn broadcast(&mut self, text: &str) {
        let mut sent = 0;
        for account in self.targets() {
            let Some(session) = self.registry.get_mut(&account) else {
                continue;
            };
            if session.is_connected() && session.chat(text) {
                sent += 1;
            }
        }
        if sent == 0 {
            self.say(console::error("No connected bots to send to"));
        }
    }

    fn run_command(&mut self, command: Command) -> Flow {
        match command {
            Command::Focus(name) => self.set_focus(name),
            Command::List => self.list(),
            Command::StartWebhook => {
                self.webhook_active = true;
                self.say(console::success("Webhook reports started"));
            }
            Command::StopWebhook => {
                self.webhook_active = false;
                self.say(console::info("Webhook reports stopped"));
            }
            Command::Inventory => self.show_windows(false),
            Command::Window => self.show_windows(true),
            Command::Click(slot) => self.click(&slot),
            Command::Drop(slot) => self.drop_item(&slot),
            Command::DropAll => self.drop_all(),
            Command::Relogin => self.relogin(),
            Command::AntiIdle => self.anti_idle(),
            Command::Armor => self.equip_armor(),
            Command::Sort => self.sort_inventory(),
            Command::Stats => self.stats(),
            Command::Score => self.score(),
            Command::Help => self.help(),
            Command::Quit => {
                self.say(console::info("Shutting down"));
                return Flow::Quit;
            }
        }
        Flow::Continue
    }

    fn set_focus(&mut self, name: Option<String>) {
        let Some(name) = name else {
            self.focus = None;
            self.say(console::success("Controlling ALL bots"));
            return;
        };
        match self.registry.resolve(&name).map(str::to_string) {
            Some(account) => {
                self.say(console::success(format!("Controlling {account}")));
                self.focus = Some(account);
            }
            None => {
                let known = self.registry.names().join(", ");
                self.say(console::error(format!(
                    "No bot named '{name}'. Known: {known}"
                )));
            }
        }
    }

    fn list(&mut self) {
        let mut lines = vec![console::info(format!(
            "{} session(s), focus: {}",
            self.registry.len(),
            self.focus.as_deref().unwrap_or("ALL")
        ))];
        for session in self.registry.iter() {
            let marker = if self.focus.as_deref() == Some(session.account.as_str()) {
                "*"
            } else {
                " "
            };
            lines.push(format!(
                " {marker} {:<16} {:<13} {}",
                session.account, session.connection, session.progress
            ));
        }
        for line in lines {
            self.say(line);
        }
    }

    fn show_windows(&mut self, prefer_open: bool) {
        for account in self.targets() {
            let Some(session) = self.registry.get(&account) else {
                continue;
            };
            let window = match (&session.window, prefer_open) {
                (Some(open), true) => open,
                _ => &session.inventory,
            };
            let text = console::window(&account, window, false);
            self.say(text);
        }
    }

    /// Targets with a live spawned client. The rest are reported and skipped.
    fn connected_targets(&mut self) -> Vec<String> {
        let (connected, offline): (Vec<String>, Vec<String>) =
            self.targets().into_iter().partition(|account| {
                self.registry
                    .get(account)
                    .is_some_and(|session| session.is_connected())
            });
        for account in offline {
            self.say(console::error(format!("{account} is not connected")));
        }
        connected
    }

    fn click(&mut self, slot: &SlotRef) {
        for account in self.connected_targets() {
            let Some(session) = self.registry.get_mut(&account) else {
                continue;
            };
            let window = session.window.as_ref().unwrap_or(&session.inventory);
            let resolved = match slot {
                SlotRef::Index(i) if window.has_slot(*i) => Ok(*i),
                SlotRef::Index(i) => Err(format!(
                    "{account}: slot {i} is out of range (0-{})",
                    window.slots.len().saturating_sub(1)
                )),
                SlotRef::Item(fragment) => window
                    .find(fragment)
                    .ok_or_else(|| format!("{account}: no item matching '{fragment}'")),
            };
            let line = match resolved {
                Ok(i) => {
                    let ok = session.call("click", |c| c.click_slot(i));
                    if ok {
                        console::success(format!("{account} clicked slot {i}"))
                    } else {
                        console::error(format!("{account}: click failed"))
                    }
                }
                Err(e) => console::error(e),
            };
            self.say(line);
        }
    }

    fn drop_item(&mut self, slot: &SlotRef) {
        for account in self.connected_targets() {
            let Some(session) = self.registry.get_mut(&account) else {
                continue;
            };
            let inv = &session.inventory;
            let resolved = match slot {
                SlotRef::Index(i) if !inv.has_slot(*i) => {
                    Err(format!("{account}: slot {i} is out of range"))
                }
                SlotRef::Index(i) => match inv.item(*i) {
                    Some(item) => Ok((*i, item.label().to_string())),
                    None => Err(format!("{account}: slot {i} is empty")),
                },
                SlotRef::Item(fragment) => inv
                    .find(fragment)
                    .and_then(|i| inv.item(i).map(|item| (i, item.label().to_string())))
                    .ok_or_else(|| format!("{account}: no item matching '{fragment}'")),
            };
            let line = match resolved {
                Ok((i, label)) => {
                    if session.call("drop", |c| c.drop_slot(i)) {
                        console::success(format!("{account} dropped {label}"))
                    } else {
                        console::error(format!("{account}: drop failed"))
                    }
                }
                Err(e) => console::error(e),
            };
            self.say(line);
        }
    }

    fn drop_all(&mut self) {
        for account in self.connected_targets() {
            let Some(session) = self.registry.get_mut(&account) else {
                continue;
            };
            let slots = session.inventory.occupied(STORAGE_SLOTS);
            let dropped = slots
                .iter()
                .filter(|&&i| session.call("drop", |c| c.drop_slot(i)))
                .count();
            self.say(console::success(format!(
                "{account} dropped {dropped} stack(s)"
            )));
        }
    }

    fn relogin(&mut self) {
        let command = format!(
            "{} {}",
            self.config.accounts.login_command, self.config.accounts.password
        );
        for account in self.targets() {
            let Some(session) = self.registry.get_mut(&account) else {
                continue;
            };
            if !session.is_live() {
                continue;
            }
            if session.chat(command.trim_end()) {
                session.login_attempted = true;
                session.raise(crate::session::Progress::LoginAttempted);
                self.say(console::info(format!("[>] {account} sent login")));
            }
        }
    }

    fn anti_idle(&mut self) {
        for account in self.targets() {
            let line = match self.toggle_anti_idle(&account) {
                Some(true) => console::success(format!("{account} anti-idle on")),
                Some(false) => console::info(format!("{account} anti-idle off")),
                None => console::error(format!("{account} is not connected")),
            };
            self.say(line);
        }
    }

    fn equip_armor(&mut self) {
        for account in self.connected_targets() {
            let Some(session) = self.registry.get_mut(&account) else {
                continue;
            };
            let plan = inventory::armor_plan(&session.inventory);
            let equipped = plan
                .iter()
                .filter(|&&(slot, part)| session.call("equip", |c| c.equip(slot, part)))
                .count();
            let line = if plan.is_empty() {
                console::info(format!("{account} has no better armor"))
            } else {
                console::success(format!("{account} equipped {equipped} piece(s)"))
            };
            self.say(line);
        }
    }

    fn sort_inventory(&mut self) {
        for account in self.connected_targets() {
            let Some(session) = self.registry.get_mut(&account) else {
                continue;
            };
            let swaps = inventory::sort_plan(&session.inventory);
            // pick up a, drop on b (picking b up), put b into a
            let done = swaps
                .iter()
                .filter(|&&(a, b)| {
                    [a, b, a]
                        .iter()
                        .all(|&slot| session.call("click", |c| c.click_slot(slot)))
                })
                .count();
            self.say(console::success(format!(
                "{account} sorted inventory ({done} swap(s))"
            )));
        }
    }

    fn stats(&mut self) {
        let lines: Vec<String> = self
            .registry
            .iter()
            .map(|s| {
                console::info(format!(
                    "{} | Money: {} | Shards: {}",
                    s.account, s.balance, s.shards
                ))
            })
            .collect();
        if lines.is_empty() {
            self.say(console::error("No sessions yet"));
        }
        for line in lines {
            self.say(line);
        }
    }

    fn score(&mut self) {
        for account in self.targets() {
            let Some(session) = self.registry.get(&account) else {
                continue;
            };
            let line = match &session.scoreboard {
                Some(board) => console::scoreboard(&account, board),
                None => console::error(format!("No scoreboard data for {account}")),
            };
            self.say(line);
        }
    }

    fn help(&mut self) {
        let prefix = self.config.prefix();
        let mut lines = vec![console::info("Commands:")];
        for spec in COMMANDS {
            let names = spec
                .names
                .iter()
                .map(|n| format!("{prefix}{n}"))
                .collect::<Vec<_>>()
                .join(", ");
            let usage = format!("{names} {}", spec.args);
            lines.push(format!("  {usage:<32} {}", spec.help));
        }
        lines.push("  anything else is sent as chat".to_string());
        for line in lines {
            self.say(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::Call;
    use crate::client::{ClientEvent, ScoreEntry, Scoreboard};
    use crate::fleet::tests::Harness;
    use crate::inventory::{EquipSlot, Item, Window};

    fn item(name: &str) -> Option<Item> {
        Some(Item {
            name: name.to_string(),
            display_name: String::new(),
            count: 1,
        })
    }

    fn inventory(entries: &[(usize, &str)]) -> Window {
        let mut slots = vec![None; 46];
        for (slot, name) in entries {
            slots[*slot] = item(name);
        }
        Window {
            title: "Inventory".to_string(),
            slots,
        }
    }

    #[test]
    fn parse_splits_chat_and_commands() {
        assert_eq!(parse("   ", '.'), Ok(Input::Empty));
        assert_eq!(parse("hello all", '.'), Ok(Input::Chat("hello all".to_string())));
        assert_eq!(parse(".LS", '.'), Ok(Input::Command(Command::List)));
        assert_eq!(
            parse(".c  Alpha ", '.'),
            Ok(Input::Command(Command::Focus(Some("Alpha".to_string()))))
        );
        assert_eq!(parse(".control", '.'), Ok(Input::Command(Command::Focus(None))));
        assert_eq!(parse("!quit", '!'), Ok(Input::Command(Command::Quit)));
        assert_eq!(parse(".quit", '!'), Ok(Input::Chat(".quit".to_string())));
    }

    #[test]
    fn parse_slot_arguments() {
        assert_eq!(
            parse(".click 13", '.'),
            Ok(Input::Command(Command::Click(SlotRef::Index(13))))
        );
        assert_eq!(
            parse(".drop Diamond Sword", '.'),
            Ok(Input::Command(Command::Drop(SlotRef::Item(
                "Diamond Sword".to_string()
            ))))
        );
        assert_eq!(
            parse(".click", '.'),
            Err(CommandError::Usage(".click <slot|item>".to_string()))
        );
    }

    #[test]
    fn parse_rejects_unknown_commands() {
        assert_eq!(
            parse(".fly high", '.'),
            Err(CommandError::Unknown("fly".to_string(), '.'))
        );
    }

    #[test]
    fn every_alias_parses() {
        for name in command_names() {
            let line = match name {
                "click" | "drop" => format!(".{name} 1"),
                _ => format!(".{name}"),
            };
            assert!(
                matches!(parse(&line, '.'), Ok(Input::Command(_))),
                "{line}"
            );
        }
    }

    #[test]
    fn focus_known_and_unknown() {
        let mut h = Harness::started(&["Alpha", "Bravo"], |_| {});
        h.input(".control Bravo");
        assert_eq!(h.fleet.focus(), Some("Bravo"));
        assert_eq!(*h.console.prompt.borrow(), "Bravo > ");

        h.input(".c nobody");
        assert_eq!(h.fleet.focus(), Some("Bravo"));
        assert!(h.console.saw("No bot named 'nobody'. Known: Alpha, Bravo"));

        h.input(".c alpha");
        assert_eq!(h.fleet.focus(), Some("Alpha"));

        h.input(".c");
        assert_eq!(h.fleet.focus(), None);
        assert_eq!(*h.console.prompt.borrow(), "ALL > ");
    }

    #[test]
    fn chat_goes_to_connected_targets() {
        let mut h = Harness::started(&["Alpha", "Bravo", "Charlie"], |_| {});
        h.event("Alpha", ClientEvent::Spawn);
        h.event("Bravo", ClientEvent::Spawn);

        h.input("hello everyone");
        assert_eq!(h.factory.chats("Alpha"), vec!["hello everyone"]);
        assert_eq!(h.factory.chats("Bravo"), vec!["hello everyone"]);
        assert!(h.factory.chats("Charlie").is_empty());

        h.input(".c Bravo");
        h.input("just me");
        assert_eq!(h.factory.chats("Alpha").len(), 1);
        assert_eq!(h.factory.chats("Bravo"), vec!["hello everyone", "just me"]);
    }

    #[test]
    fn chat_with_nobody_connected_reports() {
        let mut h = Harness::started(&["Alpha"], |_| {});
        h.input("anyone?");
        assert!(h.factory.chats("Alpha").is_empty());
        assert!(h.console.saw("No connected bots"));
    }

    #[test]
    fn unknown_command_changes_nothing() {
        let mut h = Harness::started(&["Alpha"], |_| {});
        h.event("Alpha", ClientEvent::Spawn);
        assert_eq!(h.input(".teleport"), Flow::Continue);
        assert!(h.console.saw("unknown command 'teleport'"));
        assert!(h.factory.calls("Alpha").is_empty());
    }

    #[test]
    fn webhook_toggle() {
        let mut h = Harness::started(&["Alpha"], |_| {});
        h.input(".stopwebhook");
        assert!(!h.fleet.webhook_active);
        h.input(".startwebhook");
        assert!(h.fleet.webhook_active);
    }

    #[test]
    fn list_shows_status() {
        let mut h = Harness::started(&["Alpha", "Bravo"], |_| {});
        h.event("Alpha", ClientEvent::Spawn);
        h.console.clear();
        h.input(".ls");
        let lines = h.console.lines.borrow().clone();
        let alpha = lines.iter().find(|l| l.contains("Alpha ")).unwrap();
        assert!(alpha.contains("connected") && alpha.contains("not logged in"));
        let bravo = lines.iter().find(|l| l.contains("Bravo ")).unwrap();
        assert!(bravo.contains("connecting"));
    }

    #[test]
    fn click_by_slot_and_name() {
        let mut h = Harness::started(&["Alpha"], |_| {});
        h.event("Alpha", ClientEvent::Spawn);
        h.event("Alpha", ClientEvent::WindowOpen(inventory(&[(20, "compass")])));
        h.input(".click 3");
        h.input(".click COMPASS");
        h.input(".click 99");
        h.input(".click emerald");
        assert_eq!(h.factory.calls("Alpha"), vec![Call::Click(3), Call::Click(20)]);
        assert!(h.console.saw("slot 99 is out of range"));
        assert!(h.console.saw("no item matching 'emerald'"));
    }

    #[test]
    fn click_falls_back_to_inventory() {
        let mut h = Harness::started(&["Alpha"], |_| {});
        h.event("Alpha", ClientEvent::Spawn);
        h.event("Alpha", ClientEvent::Inventory(inventory(&[(36, "bread")])));
        h.input(".click bread");
        assert_eq!(h.factory.calls("Alpha"), vec![Call::Click(36)]);
    }

    #[test]
    fn drop_uses_inventory() {
        let mut h = Harness::started(&["Alpha"], |_| {});
        h.event("Alpha", ClientEvent::Spawn);
        h.event(
            "Alpha",
            ClientEvent::Inventory(inventory(&[(9, "dirt"), (10, "stone")])),
        );
        h.event("Alpha", ClientEvent::WindowOpen(inventory(&[(0, "stone")])));
        h.input(".drop stone");
        h.input(".drop 9");
        h.input(".drop 11");
        assert_eq!(h.factory.calls("Alpha"), vec![Call::Drop(10), Call::Drop(9)]);
        assert!(h.console.saw("slot 11 is empty"));
    }

    #[test]
    fn drop_all_empties_storage() {
        let mut h = Harness::started(&["Alpha"], |_| {});
        h.event("Alpha", ClientEvent::Spawn);
        h.event(
            "Alpha",
            ClientEvent::Inventory(inventory(&[(6, "iron_chestplate"), (9, "dirt"), (44, "torch")])),
        );
        h.input(".dropall");
        assert_eq!(h.factory.calls("Alpha"), vec![Call::Drop(9), Call::Drop(44)]);
        assert!(h.console.saw("Alpha dropped 2 stack(s)"));
    }

    #[test]
    fn inventory_commands_skip_offline_bots() {
        let mut h = Harness::started(&["Alpha", "Bravo"], |_| {});
        h.event("Alpha", ClientEvent::Spawn);
        for name in ["Alpha", "Bravo"] {
            h.event(name, ClientEvent::Inventory(inventory(&[(9, "stone"), (10, "apple")])));
        }
        h.input(".click 9");
        h.input(".drop stone");
        h.input(".dropall");
        h.input(".sort");
        assert!(h.factory.calls("Bravo").is_empty());
        assert_eq!(h.console.count("Bravo is not connected"), 4);
        assert!(!h.console.saw("Bravo clicked"));
        assert!(h.console.saw("Alpha clicked slot 9"));
    }

    #[test]
    fn relogin_sends_login_command() {
        let mut h = Harness::started(&["Alpha"], |_| {});
        h.event("Alpha", ClientEvent::Spawn);
        h.input(".relogin");
        assert_eq!(h.factory.chats("Alpha"), vec!["/login secret"]);
        assert_eq!(h.session("Alpha").progress, crate::session::Progress::LoginAttempted);
    }

    #[test]
    fn anti_idle_toggles() {
        let mut h = Harness::started(&["Alpha", "Bravo"], |_| {});
        h.event("Alpha", ClientEvent::Spawn);
        h.input(".afk");
        assert!(h.session("Alpha").anti_idle_timer.is_some());
        assert!(h.console.saw("Alpha anti-idle on"));
        assert!(h.console.saw("Bravo is not connected"));

        h.input(".antiafk");
        assert!(h.session("Alpha").anti_idle_timer.is_none());
        assert!(h.console.saw("Alpha anti-idle off"));
        h.advance(60_000);
        assert!(h.factory.calls("Alpha").is_empty());
    }

    #[test]
    fn armor_equips_plan() {
        let mut h = Harness::started(&["Alpha"], |_| {});
        h.event("Alpha", ClientEvent::Spawn);
        h.event(
            "Alpha",
            ClientEvent::Inventory(inventory(&[(12, "diamond_helmet"), (30, "iron_boots")])),
        );
        h.input(".armor");
        assert_eq!(
            h.factory.calls("Alpha"),
            vec![
                Call::Equip(12, EquipSlot::Head),
                Call::Equip(30, EquipSlot::Feet)
            ]
        );
    }

    #[test]
    fn sort_swaps_with_three_clicks() {
        let mut h = Harness::started(&["Alpha"], |_| {});
        h.event("Alpha", ClientEvent::Spawn);
        h.event(
            "Alpha",
            ClientEvent::Inventory(inventory(&[(9, "stone"), (10, "apple")])),
        );
        h.input(".sort");
        assert_eq!(
            h.factory.calls("Alpha"),
            vec![Call::Click(9), Call::Click(10), Call::Click(9)]
        );
        assert!(h.console.saw("(1 swap(s))"));
    }

    #[test]
    fn stats_lists_every_session() {
        let mut h = Harness::started(&["Alpha", "Bravo"], |_| {});
        h.chat("Alpha", "You have $5.2M");
        h.input(".c Bravo");
        h.input(".stats");
        assert!(h.console.saw("Alpha | Money: $5.2M | Shards: 0"));
        assert!(h.console.saw("Bravo | Money: $0 | Shards: 0"));
    }

    #[test]
    fn score_renders_board() {
        let mut h = Harness::started(&["Alpha"], |_| {});
        h.input(".score");
        assert!(h.console.saw("No scoreboard data for Alpha"));
        h.event(
            "Alpha",
            ClientEvent::Scoreboard(Scoreboard {
                title: "Survival".to_string(),
                entries: vec![ScoreEntry {
                    name: "Kills".to_string(),
                    value: 7,
                }],
            }),
        );
        h.input(".score");
        assert!(h.console.saw("SCOREBOARD: Alpha | Survival"));
    }

    #[test]
    fn help_and_quit() {
        let mut h = Harness::started(&["Alpha"], |_| {});
        assert_eq!(h.input(".?"), Flow::Continue);
        assert!(h.console.saw(".control, .c [name]"));
        assert_eq!(h.input(".EXIT"), Flow::Quit);
    }
}
