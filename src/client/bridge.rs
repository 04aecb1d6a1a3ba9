//! JSON-lines bridge client.
//!
//! The game protocol lives in a separate bridge process. Each account opens
//! one TCP connection to it; the first line names the server and account,
//! after that every line is a JSON object: `{"op": ...}` outbound,
//! `{"event": ...}` inbound.
//!
//! Each connection runs a writer thread (owns the socket, drains queued ops)
//! and a reader thread (parses events and forwards them to the loop
//! channel). Nothing here blocks the loop thread: `connect` only queues the
//! handshake.

use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    ClientError, ClientEvent, ClientFactory, ConnectSpec, Control, GameClient, ScoreEntry, Scoreboard,
};
use crate::fleet::LoopEvent;
use crate::inventory::{EquipSlot, Window};

/// Outbound bridge message.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
enum BridgeOp {
    Connect {
        host: String,
        port: u16,
        version: String,
        username: String,
        auth: String,
    },
    Chat {
        text: String,
    },
    Click {
        slot: usize,
    },
    Drop {
        slot: usize,
    },
    Equip {
        slot: usize,
        destination: EquipSlot,
    },
    Respawn,
    Look {
        yaw: f32,
        pitch: f32,
    },
    Control {
        control: Control,
        active: bool,
    },
    Quit,
}

/// Inbound bridge message.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum BridgeEvent {
    Spawn,
    Death,
    End {
        #[serde(default)]
        reason: String,
    },
    Chat {
        text: String,
    },
    WindowOpen {
        window: Window,
    },
    WindowClose,
    Inventory {
        window: Window,
    },
    Scoreboard {
        #[serde(default)]
        title: String,
        #[serde(default)]
        entries: Vec<ScoreEntry>,
    },
}

impl From<BridgeEvent> for ClientEvent {
    fn from(event: BridgeEvent) -> Self {
        match event {
            BridgeEvent::Spawn => ClientEvent::Spawn,
            BridgeEvent::Death => ClientEvent::Death,
            BridgeEvent::End { reason } => ClientEvent::End { reason },
            BridgeEvent::Chat { text } => ClientEvent::Chat { text },
            BridgeEvent::WindowOpen { window } => ClientEvent::WindowOpen(window),
            BridgeEvent::WindowClose => ClientEvent::WindowClose,
            BridgeEvent::Inventory { window } => ClientEvent::Inventory(window),
            BridgeEvent::Scoreboard { title, entries } => {
                ClientEvent::Scoreboard(Scoreboard { title, entries })
            }
        }
    }
}

/// Parse one inbound line. Blank or malformed lines yield `None`.
fn parse_event(line: &str) -> Option<ClientEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<BridgeEvent>(line) {
        Ok(event) => Some(event.into()),
        Err(e) => {
            debug!(error = %e, line, "skipping malformed bridge line");
            None
        }
    }
}

/// Handle for one bridge connection.
pub struct BridgeClient {
    ops: Sender<BridgeOp>,
}

impl BridgeClient {
    fn push(&mut self, op: BridgeOp) -> Result<(), ClientError> {
        self.ops.send(op).map_err(|_| ClientError::Closed)
    }
}

impl GameClient for BridgeClient {
    fn send_chat(&mut self, text: &str) -> Result<(), ClientError> {
        self.push(BridgeOp::Chat {
            text: text.to_string(),
        })
    }

    fn click_slot(&mut self, slot: usize) -> Result<(), ClientError> {
        self.push(BridgeOp::Click { slot })
    }

    fn drop_slot(&mut self, slot: usize) -> Result<(), ClientError> {
        self.push(BridgeOp::Drop { slot })
    }

    fn equip(&mut self, slot: usize, destination: EquipSlot) -> Result<(), ClientError> {
        self.push(BridgeOp::Equip { slot, destination })
    }

    fn respawn(&mut self) -> Result<(), ClientError> {
        self.push(BridgeOp::Respawn)
    }

    fn look(&mut self, yaw: f32, pitch: f32) -> Result<(), ClientError> {
        self.push(BridgeOp::Look { yaw, pitch })
    }

    fn set_control(&mut self, control: Control, active: bool) -> Result<(), ClientError> {
        self.push(BridgeOp::Control { control, active })
    }

    fn quit(&mut self) {
        let _ = self.push(BridgeOp::Quit);
    }
}

/// Opens bridge connections and routes their events into the loop channel.
pub struct BridgeFactory {
    address: String,
    events: Sender<LoopEvent>,
}

impl BridgeFactory {
    pub fn new(address: impl Into<String>, events: Sender<LoopEvent>) -> Self {
        Self {
            address: address.into(),
            events,
        }
    }
}

impl ClientFactory for BridgeFactory {
    fn connect(
        &mut self,
        spec: &ConnectSpec,
        generation: u64,
    ) -> Result<Box<dyn GameClient>, ClientError> {
        let (ops_tx, ops_rx) = mpsc::channel();
        ops_tx
            .send(BridgeOp::Connect {
                host: spec.host.clone(),
                port: spec.port,
                version: spec.version.clone(),
                username: spec.username.clone(),
                auth: spec.auth.clone(),
            })
            .map_err(|_| ClientError::Closed)?;

        let link = Link {
            address: self.address.clone(),
            account: spec.username.clone(),
            generation,
            events: self.events.clone(),
        };
        thread::Builder::new()
            .name(format!("bridge-{}", spec.username))
            .spawn(move || link.run_writer(ops_rx))
            .map_err(|source| ClientError::Connect {
                address: self.address.clone(),
                source,
            })?;

        Ok(Box::new(BridgeClient { ops: ops_tx }))
    }
}

/// Everything the connection threads need to report back.
#[derive(Clone)]
struct Link {
    address: String,
    account: String,
    generation: u64,
    events: Sender<LoopEvent>,
}

impl Link {
    fn emit(&self, event: ClientEvent) -> bool {
        self.events
            .send(LoopEvent::Client {
                account: self.account.clone(),
                generation: self.generation,
                event,
            })
            .is_ok()
    }

    fn run_writer(self, ops: Receiver<BridgeOp>) {
        let mut stream = match TcpStream::connect(&self.address) {
            Ok(stream) => stream,
            Err(e) => {
                warn!(account = %self.account, address = %self.address, error = %e, "bridge connect failed");
                self.emit(ClientEvent::End {
                    reason: format!("bridge unreachable: {e}"),
                });
                return;
            }
        };

        match stream.try_clone() {
            Ok(read_half) => {
                let reader = self.clone();
                let spawned = thread::Builder::new()
                    .name(format!("bridge-read-{}", self.account))
                    .spawn(move || reader.run_reader(read_half));
                if let Err(e) = spawned {
                    self.emit(ClientEvent::End {
                        reason: format!("failed to start reader: {e}"),
                    });
                    return;
                }
            }
            Err(e) => {
                self.emit(ClientEvent::End {
                    reason: format!("failed to clone socket: {e}"),
                });
                return;
            }
        }

        for op in ops {
            let quitting = op == BridgeOp::Quit;
            let line = match serde_json::to_string(&op) {
                Ok(line) => line,
                Err(e) => {
                    warn!(account = %self.account, error = %e, "failed to encode bridge op");
                    continue;
                }
            };
            if let Err(e) = writeln!(stream, "{line}").and_then(|_| stream.flush()) {
                debug!(account = %self.account, error = %e, "bridge write failed");
                break;
            }
            if quitting {
                break;
            }
        }

        // Handle dropped or quit: unblock the reader.
        let _ = stream.shutdown(Shutdown::Both);
    }

    fn run_reader(self, stream: TcpStream) {
        let reader = BufReader::new(stream);
        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    self.emit(ClientEvent::End {
                        reason: e.to_string(),
                    });
                    return;
                }
            };
            let Some(event) = parse_event(&line) else {
                continue;
            };
            let ended = matches!(event, ClientEvent::End { .. });
            if !self.emit(event) || ended {
                return;
            }
        }
        self.emit(ClientEvent::End {
            reason: "bridge closed the connection".to_string(),
        });
    }
}
