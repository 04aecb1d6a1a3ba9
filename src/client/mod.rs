//! Game client seam.
//!
//! The fleet never speaks the game protocol itself. Each account is driven
//! through a [`GameClient`] handle, and everything the server tells the
//! account comes back as a [`ClientEvent`] on the loop channel. The fleet
//! uses these traits to automate sessions without knowing how the protocol
//! is carried.

pub mod bridge;

use thiserror::Error;

use crate::inventory::{EquipSlot, Window};

/// Parameters for opening one account's connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectSpec {
    pub host: String,
    pub port: u16,
    pub version: String,
    pub username: String,
    pub auth: String,
}

/// Movement keys the anti-idle routine can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Control {
    Jump,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct ScoreEntry {
    pub name: String,
    pub value: i64,
}

/// Sidebar scoreboard snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Scoreboard {
    pub title: String,
    pub entries: Vec<ScoreEntry>,
}

/// Things the server tells one account.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Spawn,
    Death,
    End { reason: String },
    Chat { text: String },
    WindowOpen(Window),
    WindowClose,
    Inventory(Window),
    Scoreboard(Scoreboard),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection is closed")]
    Closed,
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Outbound half of one account's connection.
pub trait GameClient {
    fn send_chat(&mut self, text: &str) -> Result<(), ClientError>;

    fn click_slot(&mut self, slot: usize) -> Result<(), ClientError>;

    /// Drop the whole stack in an inventory slot.
    fn drop_slot(&mut self, slot: usize) -> Result<(), ClientError>;

    fn equip(&mut self, slot: usize, destination: EquipSlot) -> Result<(), ClientError>;

    fn respawn(&mut self) -> Result<(), ClientError>;

    fn look(&mut self, yaw: f32, pitch: f32) -> Result<(), ClientError>;

    fn set_control(&mut self, control: Control, active: bool) -> Result<(), ClientError>;

    /// Close the connection. No `End` event is expected afterward.
    fn quit(&mut self);
}

/// Opens connections. `generation` is echoed back on every event so stale
/// connections can be told apart from their replacements.
pub trait ClientFactory {
    fn connect(
        &mut self,
        spec: &ConnectSpec,
        generation: u64,
    ) -> Result<Box<dyn GameClient>, ClientError>;
}

#[cfg(test)]
pub mod fake {
    //! In-memory client that records every call, for fleet tests.

    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Chat(String),
        Click(usize),
        Drop(usize),
        Equip(usize, EquipSlot),
        Respawn,
        Look,
        Control(Control, bool),
        Quit,
    }

    pub type CallLog = Rc<RefCell<Vec<(String, u64, Call)>>>;

    pub struct FakeClient {
        account: String,
        generation: u64,
        log: CallLog,
    }

    impl FakeClient {
        fn record(&self, call: Call) -> Result<(), ClientError> {
            self.log
                .borrow_mut()
                .push((self.account.clone(), self.generation, call));
            Ok(())
        }
    }

    impl GameClient for FakeClient {
        fn send_chat(&mut self, text: &str) -> Result<(), ClientError> {
            self.record(Call::Chat(text.to_string()))
        }

        fn click_slot(&mut self, slot: usize) -> Result<(), ClientError> {
            self.record(Call::Click(slot))
        }

        fn drop_slot(&mut self, slot: usize) -> Result<(), ClientError> {
            self.record(Call::Drop(slot))
        }

        fn equip(&mut self, slot: usize, destination: EquipSlot) -> Result<(), ClientError> {
            self.record(Call::Equip(slot, destination))
        }

        fn respawn(&mut self) -> Result<(), ClientError> {
            self.record(Call::Respawn)
        }

        fn look(&mut self, _yaw: f32, _pitch: f32) -> Result<(), ClientError> {
            self.record(Call::Look)
        }

        fn set_control(&mut self, control: Control, active: bool) -> Result<(), ClientError> {
            self.record(Call::Control(control, active))
        }

        fn quit(&mut self) {
            let _ = self.record(Call::Quit);
        }
    }

    /// Factory handing out [`FakeClient`]s that share one call log.
    #[derive(Default, Clone)]
    pub struct FakeFactory {
        pub log: CallLog,
        pub connects: Rc<RefCell<Vec<(String, u64)>>>,
    }

    impl FakeFactory {
        /// Calls made by `account`, in order.
        pub fn calls(&self, account: &str) -> Vec<Call> {
            self.log
                .borrow()
                .iter()
                .filter(|(who, _, _)| who == account)
                .map(|(_, _, call)| call.clone())
                .collect()
        }

        pub fn chats(&self, account: &str) -> Vec<String> {
            self.calls(account)
                .into_iter()
                .filter_map(|call| match call {
                    Call::Chat(text) => Some(text),
                    _ => None,
                })
                .collect()
        }

        pub fn clear(&self) {
            self.log.borrow_mut().clear();
        }
    }

    impl ClientFactory for FakeFactory {
        fn connect(
            &mut self,
            spec: &ConnectSpec,
            generation: u64,
        ) -> Result<Box<dyn GameClient>, ClientError> {
            self.connects
                .borrow_mut()
                .push((spec.username.clone(), generation));
            Ok(Box::new(FakeClient {
                account: spec.username.clone(),
                generation,
                log: self.log.clone(),
            }))
        }
    }
}
