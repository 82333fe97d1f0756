pub mod command;
pub mod config;
pub mod error;
pub mod extract;
pub mod labels;
pub mod market;
pub mod notify;
pub mod paths;

pub use command::{Command, CommandRequest, CommandResponse};
pub use config::Config;
pub use error::{Error, Result};
pub use extract::{BlockDocument, ExtractError, FieldExtractor, QuotePanelExtractor};
pub use labels::UiText;
pub use market::{ActiveTab, MarketSnapshot};
pub use notify::{NotificationKind, TradeStatus};
pub use paths::Paths;
