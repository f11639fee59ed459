use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::package::TransferPackage;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("recipient '{0}' is unreachable")]
    Unreachable(String),
    #[error("relay error: {0}")]
    Default(#[from] anyhow::Error),
}

/// Delivers packages to a named recipient
///
/// Transport, queuing and presence are the relay's business; packages are opaque
/// to it.
pub trait Relay: Send + Sync {
    fn deliver(&self, recipient: &str, package: TransferPackage) -> Result<(), RelayError>;
}

/// In-memory FIFO mailbox per recipient
#[derive(Debug, Clone, Default)]
pub struct MailboxRelay {
    mailboxes: Arc<Mutex<HashMap<String, VecDeque<TransferPackage>>>>,
}

impl MailboxRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pop the oldest package waiting for `recipient`
    pub fn take(&self, recipient: &str) -> Option<TransferPackage> {
        self.mailboxes
            .lock()
            .get_mut(recipient)
            .and_then(|queue| queue.pop_front())
    }

    pub fn pending(&self, recipient: &str) -> usize {
        self.mailboxes
            .lock()
            .get(recipient)
            .map_or(0, |queue| queue.len())
    }
}

impl Relay for MailboxRelay {
    fn deliver(&self, recipient: &str, package: TransferPackage) -> Result<(), RelayError> {
        tracing::debug!(recipient, file_name = %package.file_name, "queued package");
        self.mailboxes
            .lock()
            .entry(recipient.to_string())
            .or_default()
            .push_back(package);
        Ok(())
    }
}
