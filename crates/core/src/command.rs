use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::Result;
use crate::market::MarketSnapshot;

/// Operations the browser worker accepts over its command channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Launch the browser, log in, load the trading template.
    Open,
    /// Read the quote panel of the active instrument tab.
    GetData,
    /// Capture the chart area as a PNG.
    Screenshot,
    /// Tear the browser down and stop the worker.
    Close,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Open => "open",
            Command::GetData => "get_data",
            Command::Screenshot => "screenshot",
            Command::Close => "close",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Command::Open),
            "get_data" => Some(Command::GetData),
            "screenshot" => Some(Command::Screenshot),
            "close" => Some(Command::Close),
            _ => None,
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the worker sends back. Every command gets exactly one response.
#[derive(Debug)]
pub enum CommandResponse {
    Opened(String),
    MarketData(MarketSnapshot),
    Screenshot(Vec<u8>),
    Closed(String),
}

impl CommandResponse {
    /// Short form for logs. Screenshot payloads are summarized, not dumped.
    pub fn summary(&self) -> String {
        match self {
            CommandResponse::Opened(msg) => msg.clone(),
            CommandResponse::MarketData(snapshot) => {
                format!("{} last={}", snapshot.future_code, snapshot.last_price)
            }
            CommandResponse::Screenshot(bytes) => format!("{} bytes png", bytes.len()),
            CommandResponse::Closed(msg) => msg.clone(),
        }
    }
}

/// A tagged request: the command plus a dedicated reply channel.
///
/// Requests flow over a single mpsc sender into the worker. The worker
/// serves them strictly in arrival order and answers each on its own
/// oneshot, so a caller always gets the reply to the request it sent.
#[derive(Debug)]
pub struct CommandRequest {
    pub id: Uuid,
    pub command: Command,
    pub reply: oneshot::Sender<Result<CommandResponse>>,
}

impl CommandRequest {
    pub fn new(command: Command) -> (Self, oneshot::Receiver<Result<CommandResponse>>) {
        let (reply, rx) = oneshot::channel();
        (
            Self {
                id: Uuid::new_v4(),
                command,
                reply,
            },
            rx,
        )
    }
}
