pub mod cdp;
pub mod chrome;
pub mod console;
pub mod page;
pub mod session;

pub use console::{ConsoleDriver, TradingConsole};
pub use session::BrowserSession;
