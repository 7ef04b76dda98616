use std::sync::atomic::{AtomicUsize, Ordering};

use crate::domain::{Command, DeadLetterQueue, Error};

/// Logs rejected commands and keeps count of them.
#[derive(Default, Debug)]
pub struct TracingDLQ {
    rejected: AtomicUsize,
}

impl TracingDLQ {
    pub fn rejected(&self) -> usize {
        self.rejected.load(Ordering::Relaxed)
    }
}

impl DeadLetterQueue for TracingDLQ {
    fn report(&self, command: Option<&Command>, error: &Error) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        match command {
            Some(command) => tracing::warn!(
                %command,
                transient = error.is_transient(),
                "rejected: {}",
                error
            ),
            None => tracing::warn!("unreadable script row: {}", error),
        }
    }
}
