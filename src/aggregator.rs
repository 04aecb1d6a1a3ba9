//! Cross-session chat deduplication for the console.
//!
//! Every bot on the server sees the same broadcast lines at nearly the same
//! moment. Logging each copy per account buries everything else, so lines
//! are buffered for a short window and flushed as one console line per
//! distinct text, tagged with who saw it.

use std::collections::HashMap;

/// Who contributed a flushed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contributors {
    /// Exactly one account saw it.
    One(String),
    /// Several (but not all) accounts saw it.
    Many(usize),
    /// Every configured account saw it (only when there is more than one).
    All(usize),
}

/// One flushed, grouped console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedLine {
    pub text: String,
    pub contributors: Contributors,
}

#[derive(Debug, Clone)]
struct PendingMessage {
    account: String,
    text: String,
}

/// Buffer of chat lines waiting for the next flush.
#[derive(Debug)]
pub struct MessageAggregator {
    buffer: Vec<PendingMessage>,
    flush_scheduled: bool,
    fleet_size: usize,
}

impl MessageAggregator {
    /// `fleet_size` is the number of configured accounts, used to recognise
    /// lines every bot saw.
    pub fn new(fleet_size: usize) -> Self {
        Self {
            buffer: Vec::new(),
            flush_scheduled: false,
            fleet_size,
        }
    }

    /// Buffer a line. Returns `true` when no flush is pending yet and the
    /// caller must schedule one.
    pub fn record(&mut self, account: &str, text: &str) -> bool {
        self.buffer.push(PendingMessage {
            account: account.to_string(),
            text: text.to_string(),
        });
        if self.flush_scheduled {
            false
        } else {
            self.flush_scheduled = true;
            true
        }
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Group the buffer by exact text (first-seen order) and reset.
    pub fn flush(&mut self) -> Vec<AggregatedLine> {
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<String>> = HashMap::new();

        for PendingMessage { account, text } in self.buffer.drain(..) {
            let owners = groups.entry(text.clone()).or_insert_with(|| {
                order.push(text);
                Vec::new()
            });
            if !owners.contains(&account) {
                owners.push(account);
            }
        }
        self.flush_scheduled = false;

        order
            .into_iter()
            .filter_map(|text| {
                let mut owners = groups.remove(&text)?;
                let contributors = match owners.len() {
                    1 => Contributors::One(owners.swap_remove(0)),
                    n if n >= self.fleet_size => Contributors::All(n),
                    n => Contributors::Many(n),
                };
                Some(AggregatedLine { text, contributors })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn first_record_requests_flush_once() {
        let mut agg = MessageAggregator::new(3);
        assert!(agg.record("A", "Hello"));
        assert!(!agg.record("B", "Hello"));
        assert!(!agg.record("C", "Bye"));
        agg.flush();
        assert!(agg.record("A", "again"));
    }

    #[test]
    fn groups_identical_text() {
        let mut agg = MessageAggregator::new(5);
        agg.record("A", "Hello");
        agg.record("B", "Hello");
        agg.record("C", "Bye");
        let lines = agg.flush();
        assert_eq!(
            lines,
            vec![
                AggregatedLine {
                    text: "Hello".to_string(),
                    contributors: Contributors::Many(2),
                },
                AggregatedLine {
                    text: "Bye".to_string(),
                    contributors: Contributors::One("C".to_string()),
                },
            ]
        );
        assert!(agg.is_empty());
    }

    #[test]
    fn every_account_is_tagged_all() {
        let mut agg = MessageAggregator::new(2);
        agg.record("A", "Server restarting");
        agg.record("B", "Server restarting");
        let lines = agg.flush();
        assert_eq!(lines[0].contributors, Contributors::All(2));
    }

    #[test]
    fn single_bot_fleet_never_reports_all() {
        let mut agg = MessageAggregator::new(1);
        agg.record("A", "hi");
        assert_eq!(agg.flush()[0].contributors, Contributors::One("A".to_string()));
    }

    #[test]
    fn repeated_line_from_one_account_is_one_contributor() {
        let mut agg = MessageAggregator::new(3);
        agg.record("A", "spam");
        agg.record("A", "spam");
        let lines = agg.flush();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].contributors, Contributors::One("A".to_string()));
    }

    #[test]
    fn grouping_is_exact_text() {
        let mut agg = MessageAggregator::new(3);
        agg.record("A", "Hello");
        agg.record("B", "hello");
        assert_eq!(agg.flush().len(), 2);
    }

    #[test]
    fn flush_of_empty_buffer_is_empty() {
        let mut agg = MessageAggregator::new(3);
        assert!(agg.flush().is_empty());
    }

    proptest! {
        #[test]
        fn one_line_per_distinct_text(
            entries in prop::collection::vec((0usize..4, 0usize..5), 0..40)
        ) {
            let accounts = ["A", "B", "C", "D"];
            let mut agg = MessageAggregator::new(accounts.len());
            for (who, what) in &entries {
                agg.record(accounts[*who], &format!("msg-{what}"));
            }
            let lines = agg.flush();

            let mut distinct: Vec<String> = Vec::new();
            for (_, what) in &entries {
                let text = format!("msg-{what}");
                if !distinct.contains(&text) {
                    distinct.push(text);
                }
            }
            let texts: Vec<String> = lines.iter().map(|l| l.text.clone()).collect();
            prop_assert_eq!(texts, distinct);

            for line in &lines {
                let mut owners: Vec<&str> = entries
                    .iter()
                    .filter(|(_, what)| format!("msg-{what}") == line.text)
                    .map(|(who, _)| accounts[*who])
                    .collect();
                owners.sort();
                owners.dedup();
                match &line.contributors {
                    Contributors::One(name) => {
                        prop_assert_eq!(owners, vec![name.as_str()]);
                    }
                    Contributors::Many(n) => {
                        prop_assert!(*n > 1 && *n < accounts.len());
                        prop_assert_eq!(owners.len(), *n);
                    }
                    Contributors::All(n) => {
                        prop_assert_eq!(*n, accounts.len());
                        prop_assert_eq!(owners.len(), *n);
                    }
                }
            }
        }
    }
}
