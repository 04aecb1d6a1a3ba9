//! Operator console: colored output lines, window rendering, and the
//! rustyline input loop with a focus-aware prompt.
//!
//! Output is produced on the loop thread and handed to rustyline's external
//! printer so it lands above the prompt instead of through it. Input is read
//! on the main thread and forwarded to the loop as [`LoopEvent::Input`].

use std::borrow::Cow::{self, Borrowed, Owned};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, ExternalPrinter, Helper};
use tracing::{debug, warn};

use crate::aggregator::{AggregatedLine, Contributors};
use crate::client::Scoreboard;
use crate::fleet::LoopEvent;
use crate::inventory::Window;

/// Where operator-facing output goes.
pub trait Console {
    fn print(&mut self, line: String);

    /// Replace the input prompt. Takes effect on the next read.
    fn set_prompt(&mut self, _prompt: String) {}
}

/// Console backed by rustyline's external printer, falling back to stdout
/// when the terminal doesn't support one. Prompt changes go back to the
/// input thread over `prompts`.
pub struct Terminal {
    printer: Option<Box<dyn ExternalPrinter + Send>>,
    prompts: Sender<String>,
}

impl Terminal {
    pub fn new(printer: Option<Box<dyn ExternalPrinter + Send>>, prompts: Sender<String>) -> Self {
        Self { printer, prompts }
    }
}

impl Console for Terminal {
    fn print(&mut self, line: String) {
        match self.printer.as_mut() {
            Some(printer) => {
                if let Err(e) = printer.print(line.clone()) {
                    debug!(error = %e, "external printer failed; using stdout");
                    println!("{line}");
                }
            }
            None => println!("{line}"),
        }
    }

    fn set_prompt(&mut self, prompt: String) {
        let _ = self.prompts.send(prompt);
    }
}

/// Console that keeps lines in memory; clones share the same buffer.
#[cfg(test)]
#[derive(Default, Clone)]
pub struct Buffer {
    pub lines: std::rc::Rc<std::cell::RefCell<Vec<String>>>,
    pub prompt: std::rc::Rc<std::cell::RefCell<String>>,
}

#[cfg(test)]
impl Buffer {
    /// Whether any printed line contains `needle`.
    pub fn saw(&self, needle: &str) -> bool {
        self.lines.borrow().iter().any(|l| l.contains(needle))
    }

    pub fn count(&self, needle: &str) -> usize {
        self.lines.borrow().iter().filter(|l| l.contains(needle)).count()
    }

    pub fn clear(&self) {
        self.lines.borrow_mut().clear();
    }
}

#[cfg(test)]
impl Console for Buffer {
    fn print(&mut self, line: String) {
        self.lines.borrow_mut().push(line);
    }

    fn set_prompt(&mut self, prompt: String) {
        *self.prompt.borrow_mut() = prompt;
    }
}

// ── formatting ──

pub fn timestamp() -> String {
    format!("[{}]", Local::now().format("%H:%M:%S"))
        .bright_black()
        .to_string()
}

/// `[HH:MM:SS] text`.
pub fn stamped(text: impl AsRef<str>) -> String {
    format!("{} {}", timestamp(), text.as_ref())
}

pub fn info(text: impl AsRef<str>) -> String {
    stamped(text.as_ref().yellow().to_string())
}

pub fn success(text: impl AsRef<str>) -> String {
    stamped(text.as_ref().green().to_string())
}

pub fn error(text: impl AsRef<str>) -> String {
    stamped(text.as_ref().red().to_string())
}

pub fn prompt(focus: Option<&str>) -> String {
    let target = match focus {
        Some(name) => name.magenta().to_string(),
        None => "ALL".cyan().to_string(),
    };
    format!("{target} {} ", ">".bold())
}

/// One grouped chat line from the aggregator.
pub fn aggregated(line: &AggregatedLine) -> String {
    let body = match &line.contributors {
        Contributors::One(name) => format!("{} {}", format!("<{name}>").magenta(), line.text),
        Contributors::Many(n) => format!("{} {}", format!("<{n} bots>").cyan(), line.text),
        Contributors::All(n) => format!(
            "{} {} {}",
            "<All>".cyan(),
            line.text,
            format!("({n})").yellow()
        ),
    };
    stamped(body)
}

fn banner(text: &str) -> String {
    format!("  {text}  ").on_blue().bold().to_string()
}

const RULE: &str = "============================================";

/// Slot grid, nine slots per row: `[NN:name      ]`.
pub fn window(account: &str, window: &Window, auto: bool) -> String {
    let auto_tag = if auto { "[AUTO] " } else { "" };
    let title = if window.title.is_empty() {
        "Inventory"
    } else {
        window.title.as_str()
    };
    let mut out = format!("\n{}\n", banner(&format!("{auto_tag}GUI: {account} | {title}")));
    for (i, slot) in window.slots.iter().enumerate() {
        let name: String = match slot {
            Some(item) => item.label().chars().take(10).collect(),
            None => "---".to_string(),
        };
        let cell = format!("{name:<10}");
        let cell = if slot.is_some() {
            cell.green()
        } else {
            cell.bright_black()
        };
        out.push_str(&format!(
            "{}{:02}:{}{} ",
            "[".bright_black(),
            i,
            cell,
            "]".bright_black()
        ));
        if (i + 1) % 9 == 0 {
            out.push('\n');
        }
    }
    out.push_str(RULE);
    out
}

/// Sidebar entries, highest score first.
pub fn scoreboard(account: &str, board: &Scoreboard) -> String {
    let mut out = format!("\n{}\n", banner(&format!("SCOREBOARD: {account} | {}", board.title)));
    let mut entries = board.entries.clone();
    entries.sort_by(|a, b| b.value.cmp(&a.value));
    for entry in entries.iter().filter(|e| e.name.chars().count() > 1) {
        out.push_str(&format!(
            "{} {}\n",
            format!("{:<28}", entry.name).cyan(),
            entry.value.to_string().yellow()
        ));
    }
    out.push_str(RULE);
    out
}

// ── input ──

/// Tab completion and hints for console commands and account names.
pub struct CommandHelper {
    prefix: char,
    commands: Vec<String>,
    accounts: Vec<String>,
}

impl CommandHelper {
    pub fn new(prefix: char, commands: &[&str], accounts: &[String]) -> Self {
        Self {
            prefix,
            commands: commands.iter().map(|c| format!("{prefix}{c}")).collect(),
            accounts: accounts.to_vec(),
        }
    }

    fn candidates(&self, line: &str) -> (usize, Vec<String>) {
        if !line.starts_with(self.prefix) {
            return (0, Vec::new());
        }
        match line.split_once(' ') {
            None => (
                0,
                self.commands
                    .iter()
                    .filter(|c| c.starts_with(line))
                    .cloned()
                    .collect(),
            ),
            Some((_, arg)) => {
                let start = line.len() - arg.len();
                let lowered = arg.to_lowercase();
                (
                    start,
                    self.accounts
                        .iter()
                        .filter(|a| a.to_lowercase().starts_with(&lowered))
                        .cloned()
                        .collect(),
                )
            }
        }
    }
}

impl Helper for CommandHelper {}

impl Completer for CommandHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let (start, found) = self.candidates(&line[..pos]);
        Ok((
            start,
            found
                .into_iter()
                .map(|c| Pair {
                    display: c.clone(),
                    replacement: c,
                })
                .collect(),
        ))
    }
}

impl Highlighter for CommandHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with(self.prefix) {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Owned(hint.bright_black().to_string())
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CommandHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];
        if !line.starts_with(self.prefix) || line.contains(' ') {
            return None;
        }
        self.commands
            .iter()
            .find(|c| c.starts_with(line) && c.len() > line.len())
            .map(|c| c[line.len()..].to_string())
    }
}

impl Validator for CommandHelper {}

pub type ConsoleEditor = Editor<CommandHelper, DefaultHistory>;

pub fn editor(helper: CommandHelper) -> Result<ConsoleEditor> {
    let mut rl = Editor::new()?;
    rl.set_helper(Some(helper));
    Ok(rl)
}

/// How long to wait for the loop to answer a line with the next prompt.
const PROMPT_WAIT: Duration = Duration::from_secs(1);

/// Replace `prompt` with the newest queued one, so an answer that missed
/// [`PROMPT_WAIT`] is not shown a line late. Returns `false` once the loop
/// has hung up.
fn take_latest(prompts: &Receiver<String>, prompt: &mut String) -> bool {
    loop {
        match prompts.try_recv() {
            Ok(next) => *prompt = next,
            Err(TryRecvError::Empty) => return true,
            Err(TryRecvError::Disconnected) => return false,
        }
    }
}

/// Read operator lines until EOF, forwarding each to the loop.
///
/// The loop answers every line with the prompt to show next, and drops its
/// end of `prompts` when it shuts down. Ctrl-C is treated as `quit`.
pub fn read_input(
    mut rl: ConsoleEditor,
    prefix: char,
    mut prompt: String,
    prompts: Receiver<String>,
    events: Sender<LoopEvent>,
) {
    loop {
        if !take_latest(&prompts, &mut prompt) {
            return;
        }
        match rl.readline(&prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = rl.add_history_entry(line.as_str());
                }
                if events.send(LoopEvent::Input(line)).is_err() {
                    return;
                }
                match prompts.recv_timeout(PROMPT_WAIT) {
                    Ok(next) => prompt = next,
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => return,
                }
            }
            Err(ReadlineError::Interrupted) => {
                let _ = events.send(LoopEvent::Input(format!("{prefix}quit")));
                return;
            }
            Err(ReadlineError::Eof) => {
                let _ = events.send(LoopEvent::InputClosed);
                return;
            }
            Err(e) => {
                warn!(error = %e, "console read failed");
                let _ = events.send(LoopEvent::InputClosed);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::Item;

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn prompt_reflects_focus() {
        plain();
        assert_eq!(prompt(None), "ALL > ");
        assert_eq!(prompt(Some("Alpha")), "Alpha > ");
    }

    #[test]
    fn aggregated_tags() {
        plain();
        let one = aggregated(&AggregatedLine {
            text: "hi".to_string(),
            contributors: Contributors::One("Alpha".to_string()),
        });
        assert!(one.ends_with("<Alpha> hi"), "{one}");

        let many = aggregated(&AggregatedLine {
            text: "Hello".to_string(),
            contributors: Contributors::Many(2),
        });
        assert!(many.ends_with("<2 bots> Hello"), "{many}");

        let all = aggregated(&AggregatedLine {
            text: "Restarting".to_string(),
            contributors: Contributors::All(3),
        });
        assert!(all.ends_with("<All> Restarting (3)"), "{all}");
    }

    #[test]
    fn stamped_lines_start_with_clock() {
        plain();
        let line = stamped("x");
        assert!(line.starts_with('['));
        assert_eq!(&line[9..], "] x");
    }

    #[test]
    fn window_grid_has_nine_columns() {
        plain();
        let mut slots = vec![None; 18];
        slots[0] = Some(Item {
            name: "diamond_sword".to_string(),
            display_name: "Excalibur the Great".to_string(),
            count: 1,
        });
        let text = window(
            "Alpha",
            &Window {
                title: "Chest".to_string(),
                slots,
            },
            true,
        );
        assert!(text.contains("[AUTO] GUI: Alpha | Chest"));
        assert!(text.contains("[00:Excalibur ]"));
        assert!(text.contains("[17:---       ]"));
        let grid_rows = text.lines().filter(|l| l.starts_with("[00") || l.starts_with("[09")).count();
        assert_eq!(grid_rows, 2);
    }

    #[test]
    fn scoreboard_sorted_descending() {
        plain();
        let board = Scoreboard {
            title: "Stats".to_string(),
            entries: vec![
                crate::client::ScoreEntry {
                    name: "Kills".to_string(),
                    value: 2,
                },
                crate::client::ScoreEntry {
                    name: "Money".to_string(),
                    value: 900,
                },
                crate::client::ScoreEntry {
                    name: " ".to_string(),
                    value: 1000,
                },
            ],
        };
        let text = scoreboard("Alpha", &board);
        let money = text.find("Money").unwrap();
        let kills = text.find("Kills").unwrap();
        assert!(money < kills);
        assert!(!text.contains("1000"));
    }

    #[test]
    fn terminal_sends_prompt_to_input_thread() {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut terminal = Terminal::new(None, tx);
        terminal.set_prompt("Alpha > ".to_string());
        assert_eq!(rx.try_recv().unwrap(), "Alpha > ");
        drop(terminal);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn late_prompts_collapse_to_the_newest() {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut prompt = "> ".to_string();
        assert!(take_latest(&rx, &mut prompt));
        assert_eq!(prompt, "> ");

        tx.send("Alpha > ".to_string()).unwrap();
        tx.send("Bravo > ".to_string()).unwrap();
        assert!(take_latest(&rx, &mut prompt));
        assert_eq!(prompt, "Bravo > ");

        tx.send("ALL > ".to_string()).unwrap();
        drop(tx);
        assert!(!take_latest(&rx, &mut prompt));
        assert_eq!(prompt, "ALL > ");
    }

    #[test]
    fn completes_commands_then_accounts() {
        let helper = CommandHelper::new(
            '.',
            &["control", "click", "inv"],
            &["Alpha".to_string(), "Bravo".to_string()],
        );
        assert_eq!(
            helper.candidates(".c"),
            (0, vec![".control".to_string(), ".click".to_string()])
        );
        assert_eq!(helper.candidates(".control b"), (9, vec!["Bravo".to_string()]));
        assert_eq!(helper.candidates("hello"), (0, Vec::new()));
    }
}
