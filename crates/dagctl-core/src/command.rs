//! The external [`Command`] queue.
//!
//! FIFO, many-producer/single-consumer. Consumers are the decision
//! loops at well-defined drain points; commands not consumed at a drain
//! point remain enqueued for the next one. Adapted from
//! `langgraph_core::command`'s `Command` builder, generalized from
//! graph-node navigation to workflow control.

use crate::error::{ExecutorError, Result};
use crate::task::Dag;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Continue,
    Abort {
        reason: String,
    },
    InjectTasks {
        dag_fragment: Dag,
    },
    ReplanDag {
        new_requirement: String,
    },
    SkipLayer,
    ModifyArgs {
        task_id: String,
        arguments: serde_json::Value,
    },
    CheckpointResponse {
        checkpoint_id: String,
        acknowledged: bool,
    },
    ApprovalResponse {
        approved: bool,
        feedback: Option<String>,
    },
    PermissionEscalationResponse {
        task_id: String,
        approved: bool,
        elevated_permissions: Vec<String>,
    },
}

impl Command {
    /// Typed shape validation performed at enqueue time.
    pub fn validate(&self) -> Result<()> {
        match self {
            Command::Abort { reason } if reason.trim().is_empty() => {
                Err(ExecutorError::InvalidCommand("abort reason must not be empty".into()))
            }
            Command::ModifyArgs { task_id, .. } if task_id.trim().is_empty() => {
                Err(ExecutorError::InvalidCommand("modify_args requires a task_id".into()))
            }
            Command::PermissionEscalationResponse { task_id, .. } if task_id.trim().is_empty() => {
                Err(ExecutorError::InvalidCommand(
                    "permission_escalation_response requires a task_id".into(),
                ))
            }
            _ => Ok(()),
        }
    }
}

/// FIFO queue of [`Command`]s. Enqueue is non-blocking (an unbounded
/// channel); consumption happens only at the scheduler's drain points.
#[derive(Debug)]
pub struct CommandQueue {
    sender: mpsc::UnboundedSender<Command>,
    receiver: mpsc::UnboundedReceiver<Command>,
}

impl CommandQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self { sender, receiver }
    }

    pub fn handle(&self) -> CommandSender {
        CommandSender { sender: self.sender.clone() }
    }

    /// Drain every command currently buffered, in FIFO order, without
    /// blocking.
    pub fn drain(&mut self) -> Vec<Command> {
        let mut out = Vec::new();
        while let Ok(cmd) = self.receiver.try_recv() {
            out.push(cmd);
        }
        out
    }

    /// Await exactly one command, subject to a timeout. Used by decision
    /// gates awaiting a specific response type.
    pub async fn recv_timeout(&mut self, timeout: std::time::Duration) -> Option<Command> {
        tokio::time::timeout(timeout, self.receiver.recv()).await.ok().flatten()
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable producer handle for [`CommandQueue`].
#[derive(Debug, Clone)]
pub struct CommandSender {
    sender: mpsc::UnboundedSender<Command>,
}

impl CommandSender {
    pub fn enqueue(&self, command: Command) -> Result<()> {
        command.validate()?;
        self.sender
            .send(command)
            .map_err(|_| ExecutorError::InvalidCommand("command queue closed".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_abort() {
        let cmd = Command::Abort { reason: String::new() };
        assert!(cmd.validate().is_err());
    }

    #[tokio::test]
    async fn drains_in_fifo_order() {
        let mut queue = CommandQueue::new();
        let handle = queue.handle();
        handle.enqueue(Command::Continue).unwrap();
        handle.enqueue(Command::SkipLayer).unwrap();
        let drained = queue.drain();
        assert!(matches!(drained[0], Command::Continue));
        assert!(matches!(drained[1], Command::SkipLayer));
    }
}
