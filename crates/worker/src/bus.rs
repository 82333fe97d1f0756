use tokio::sync::mpsc;
use tracing::debug;

use tradepilot_core::{Command, CommandRequest, CommandResponse, Error, Result};

/// Channel pair carrying tagged command requests into the worker.
///
/// One producer side can be cloned freely; the single consumer serves
/// requests strictly in arrival order. Replies travel on the per-request
/// oneshot, so they are correlated by construction.
pub struct CommandBus {
    pub tx: mpsc::Sender<CommandRequest>,
    pub rx: mpsc::Receiver<CommandRequest>,
}

impl CommandBus {
    pub fn new(buffer_size: usize) -> Self {
        let (tx, rx) = mpsc::channel(buffer_size);
        Self { tx, rx }
    }

    pub fn split(self) -> (mpsc::Sender<CommandRequest>, mpsc::Receiver<CommandRequest>) {
        (self.tx, self.rx)
    }
}

/// Caller-side handle: sends one command and waits for its reply.
#[derive(Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<CommandRequest>,
}

impl ControlHandle {
    pub fn new(tx: mpsc::Sender<CommandRequest>) -> Self {
        Self { tx }
    }

    /// Dispatch a command and await its correlated reply. There is no
    /// timeout here: `open` legitimately takes as long as login plus
    /// template load take.
    pub async fn dispatch(&self, command: Command) -> Result<CommandResponse> {
        let (request, reply_rx) = CommandRequest::new(command);
        let id = request.id;
        debug!(id = %id, command = %command, "Dispatching command");

        self.tx
            .send(request)
            .await
            .map_err(|_| Error::Session("Worker is not running".to_string()))?;

        match reply_rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::Session(format!(
                "Worker dropped request {}",
                id
            ))),
        }
    }
}
