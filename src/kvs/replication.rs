//! Replication extension point.
//!
//! The engine calls the hook synchronously after every successful local
//! write. The hook cannot change the outcome of the write.

/// A committed local mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteEvent<'a> {
    Put {
        table: &'a str,
        row: &'a str,
        version: u64,
    },
    Rename {
        from: &'a str,
        to: &'a str,
    },
    Delete {
        table: &'a str,
    },
}

pub trait ReplicationHook: Send + Sync {
    fn after_write(&self, event: &WriteEvent<'_>);
}

/// Replication is disabled: writes stay on this shard.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoReplication;

impl ReplicationHook for NoReplication {
    fn after_write(&self, event: &WriteEvent<'_>) {
        tracing::trace!("Replication disabled, skipping {:?}", event);
    }
}
