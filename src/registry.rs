//! Account name → session, in startup order.

use crate::session::Session;

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Vec<Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session, replacing any existing one for the same account in
    /// place so registry order stays the startup order. Returns the replaced
    /// session.
    pub fn insert(&mut self, session: Session) -> Option<Session> {
        match self.position(&session.account) {
            Some(i) => Some(std::mem::replace(&mut self.sessions[i], session)),
            None => {
                self.sessions.push(session);
                None
            }
        }
    }

    pub fn get(&self, account: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.account == account)
    }

    pub fn get_mut(&mut self, account: &str) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.account == account)
    }

    /// Session for `account` only if it is still on `generation`.
    pub fn current_mut(&mut self, account: &str, generation: u64) -> Option<&mut Session> {
        self.get_mut(account).filter(|s| s.is_current(generation))
    }

    /// Case-insensitive lookup of a registered name.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.sessions
            .iter()
            .find(|s| s.account.eq_ignore_ascii_case(name))
            .map(|s| s.account.as_str())
    }

    pub fn contains(&self, account: &str) -> bool {
        self.position(account).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.sessions.iter().map(|s| s.account.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.sessions.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn position(&self, account: &str) -> Option<usize> {
        self.sessions.iter().position(|s| s.account == account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::FakeFactory;
    use crate::client::{ClientFactory, ConnectSpec};

    fn session(factory: &mut FakeFactory, name: &str, generation: u64) -> Session {
        let spec = ConnectSpec {
            host: "localhost".to_string(),
            port: 25565,
            version: "1.20.4".to_string(),
            username: name.to_string(),
            auth: "offline".to_string(),
        };
        Session::new(name, generation, factory.connect(&spec, generation).unwrap())
    }

    #[test]
    fn keeps_startup_order() {
        let mut factory = FakeFactory::default();
        let mut registry = SessionRegistry::new();
        for (i, name) in ["Charlie", "Alpha", "Bravo"].iter().enumerate() {
            assert!(registry.insert(session(&mut factory, name, i as u64)).is_none());
        }
        assert_eq!(registry.names(), vec!["Charlie", "Alpha", "Bravo"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn replacement_keeps_position() {
        let mut factory = FakeFactory::default();
        let mut registry = SessionRegistry::new();
        registry.insert(session(&mut factory, "Alpha", 1));
        registry.insert(session(&mut factory, "Bravo", 2));

        let old = registry.insert(session(&mut factory, "Alpha", 3)).unwrap();
        assert_eq!(old.generation, 1);
        assert_eq!(registry.names(), vec!["Alpha", "Bravo"]);
        assert_eq!(registry.get("Alpha").unwrap().generation, 3);
    }

    #[test]
    fn stale_generation_is_filtered() {
        let mut factory = FakeFactory::default();
        let mut registry = SessionRegistry::new();
        registry.insert(session(&mut factory, "Alpha", 4));
        assert!(registry.current_mut("Alpha", 4).is_some());
        assert!(registry.current_mut("Alpha", 3).is_none());
        assert!(registry.current_mut("Nobody", 4).is_none());
    }

    #[test]
    fn resolve_ignores_case() {
        let mut factory = FakeFactory::default();
        let mut registry = SessionRegistry::new();
        registry.insert(session(&mut factory, "Alpha", 1));
        assert_eq!(registry.resolve("alpha"), Some("Alpha"));
        assert_eq!(registry.resolve("ALPHA"), Some("Alpha"));
        assert_eq!(registry.resolve("alph"), None);
        assert!(registry.contains("Alpha"));
        assert!(!registry.contains("alpha"));
    }
}
