// ABOUTME: Rolling build log kept per app.
// ABOUTME: Fixed-capacity ring of recent lines with a counter of lines dropped off the front.

use serde::Serialize;
use std::collections::VecDeque;

/// Snapshot handed to status pollers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildLogs {
    pub lines: Vec<String>,
    /// Number of the first line in `lines`, counted from the start of the build.
    /// A poller that saw line `n` last has missed lines if this exceeds `n + 1`.
    pub first_line_number: u64,
}

#[derive(Debug, Clone)]
pub struct BuildLog {
    capacity: usize,
    lines: VecDeque<String>,
    first_line_number: u64,
    failed: bool,
}

impl BuildLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            lines: VecDeque::with_capacity(capacity),
            first_line_number: 0,
            failed: false,
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.first_line_number = 0;
        self.failed = false;
    }

    pub fn push(&mut self, line: impl Into<String>) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
            self.first_line_number += 1;
        }
        self.lines.push_back(line.into());
    }

    /// Record a failed build; the message stays visible at the end of the log.
    pub fn mark_failed(&mut self, message: &str) {
        self.push("----------------------");
        self.push("Deploy failed!");
        for line in message.lines() {
            self.push(line);
        }
        self.failed = true;
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn snapshot(&self) -> BuildLogs {
        BuildLogs {
            lines: self.lines.iter().cloned().collect(),
            first_line_number: self.first_line_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn failure_is_appended_and_flagged() {
        let mut log = BuildLog::new(10);
        log.push("Step 1/2");
        log.mark_failed("exit code 1");
        assert!(log.is_failed());
        assert_eq!(log.snapshot().lines.last().unwrap(), "exit code 1");

        log.clear();
        assert!(!log.is_failed());
        assert!(log.is_empty());
    }

    proptest! {
        #[test]
        fn keeps_the_most_recent_lines(capacity in 1usize..20, count in 0usize..100) {
            let mut log = BuildLog::new(capacity);
            for i in 0..count {
                log.push(format!("line {i}"));
            }

            let snapshot = log.snapshot();
            prop_assert_eq!(snapshot.lines.len(), count.min(capacity));
            prop_assert_eq!(snapshot.first_line_number as usize, count.saturating_sub(capacity));
            for (offset, line) in snapshot.lines.iter().enumerate() {
                let expected = format!("line {}", snapshot.first_line_number as usize + offset);
                prop_assert_eq!(line, &expected);
            }
        }
    }
}
