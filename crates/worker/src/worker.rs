//! The command worker: one task, one driver, strictly sequential service.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use tradepilot_browser::ConsoleDriver;
use tradepilot_core::{Command, CommandRequest, CommandResponse, Result};

/// Serves commands from the bus one at a time, sending exactly one reply
/// per request. `Close` is terminal: after its reply the loop ends and
/// the driver is dropped with it.
pub struct Worker {
    driver: Box<dyn ConsoleDriver>,
    rx: mpsc::Receiver<CommandRequest>,
}

impl Worker {
    pub fn new(driver: Box<dyn ConsoleDriver>, rx: mpsc::Receiver<CommandRequest>) -> Self {
        Self { driver, rx }
    }

    pub async fn run(mut self) {
        info!("Command worker started");
        while let Some(request) = self.rx.recv().await {
            let command = request.command;
            debug!(id = %request.id, command = %command, "Handling command");

            let result = self.handle(command).await;
            if let Err(e) = &result {
                warn!(command = %command, error = %e, "Command failed");
            }

            if request.reply.send(result).is_err() {
                warn!(id = %request.id, "Reply receiver dropped");
            }

            if command == Command::Close {
                break;
            }
        }
        info!("Command worker stopped");
    }

    async fn handle(&mut self, command: Command) -> Result<CommandResponse> {
        match command {
            Command::Open => self.driver.open().await.map(CommandResponse::Opened),
            Command::GetData => self
                .driver
                .market_data()
                .await
                .map(CommandResponse::MarketData),
            Command::Screenshot => self
                .driver
                .chart_screenshot()
                .await
                .map(CommandResponse::Screenshot),
            Command::Close => self.driver.close().await.map(CommandResponse::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{CommandBus, ControlHandle};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tradepilot_core::{Error, MarketSnapshot};

    /// Test double mirroring the real driver's session guards, with call
    /// counters observable from the outside.
    struct MockDriver {
        opened: bool,
        fail_open: bool,
        launches: Arc<AtomicUsize>,
        data_reads: Arc<AtomicUsize>,
        screenshots: Arc<AtomicUsize>,
    }

    impl MockDriver {
        fn new() -> (Self, Arc<AtomicUsize>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
            let launches = Arc::new(AtomicUsize::new(0));
            let data_reads = Arc::new(AtomicUsize::new(0));
            let screenshots = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    opened: false,
                    fail_open: false,
                    launches: launches.clone(),
                    data_reads: data_reads.clone(),
                    screenshots: screenshots.clone(),
                },
                launches,
                data_reads,
                screenshots,
            )
        }

        fn snapshot() -> MarketSnapshot {
            MarketSnapshot {
                future_code: "MNQ".to_string(),
                future_series_name: "SEP25".to_string(),
                last_label: "LAST".to_string(),
                last_price: 18350.75,
                price_change: "-12.25".to_string(),
                bid_label: "BID".to_string(),
                bid_price: 18345.50,
                bid_volume: 2,
                ask_label: "ASK".to_string(),
                ask_price: 18351.00,
                ask_volume: 5,
                position_label: "POSITION".to_string(),
                contract_volume: 0,
                cost_price: 0.0,
            }
        }
    }

    #[async_trait]
    impl ConsoleDriver for MockDriver {
        async fn open(&mut self) -> tradepilot_core::Result<String> {
            if self.opened {
                return Err(Error::Session("Browser session already open".to_string()));
            }
            if self.fail_open {
                return Err(Error::Browser("launch exploded".to_string()));
            }
            self.launches.fetch_add(1, Ordering::SeqCst);
            self.opened = true;
            Ok("Webpage opened and logged in".to_string())
        }

        async fn market_data(&mut self) -> tradepilot_core::Result<MarketSnapshot> {
            if !self.opened {
                return Err(Error::Session("No browser session open".to_string()));
            }
            self.data_reads.fetch_add(1, Ordering::SeqCst);
            Ok(Self::snapshot())
        }

        async fn chart_screenshot(&mut self) -> tradepilot_core::Result<Vec<u8>> {
            if !self.opened {
                return Err(Error::Session("No browser session open".to_string()));
            }
            self.screenshots.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0x89, 0x50, 0x4E, 0x47])
        }

        async fn close(&mut self) -> tradepilot_core::Result<String> {
            self.opened = false;
            Ok("Browser closed".to_string())
        }
    }

    fn spawn_worker(driver: MockDriver) -> (ControlHandle, tokio::task::JoinHandle<()>) {
        let (tx, rx) = CommandBus::new(8).split();
        let task = tokio::spawn(Worker::new(Box::new(driver), rx).run());
        (ControlHandle::new(tx), task)
    }

    #[tokio::test]
    async fn test_open_data_close_in_order() {
        let (driver, launches, data_reads, _) = MockDriver::new();
        let (control, task) = spawn_worker(driver);

        match control.dispatch(Command::Open).await.unwrap() {
            CommandResponse::Opened(msg) => assert_eq!(msg, "Webpage opened and logged in"),
            other => panic!("unexpected: {:?}", other),
        }
        match control.dispatch(Command::GetData).await.unwrap() {
            CommandResponse::MarketData(snapshot) => assert_eq!(snapshot.future_code, "MNQ"),
            other => panic!("unexpected: {:?}", other),
        }
        match control.dispatch(Command::Close).await.unwrap() {
            CommandResponse::Closed(msg) => assert_eq!(msg, "Browser closed"),
            other => panic!("unexpected: {:?}", other),
        }

        task.await.unwrap();
        assert_eq!(launches.load(Ordering::SeqCst), 1);
        assert_eq!(data_reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_queued_requests_answered_in_arrival_order() {
        let (driver, ..) = MockDriver::new();
        let (tx, rx) = CommandBus::new(8).split();
        let task = tokio::spawn(Worker::new(Box::new(driver), rx).run());

        // Queue all three before any is served.
        let (open_req, open_rx) = CommandRequest::new(Command::Open);
        let (data_req, data_rx) = CommandRequest::new(Command::GetData);
        let (close_req, close_rx) = CommandRequest::new(Command::Close);
        tx.send(open_req).await.unwrap();
        tx.send(data_req).await.unwrap();
        tx.send(close_req).await.unwrap();

        assert!(matches!(
            open_rx.await.unwrap().unwrap(),
            CommandResponse::Opened(_)
        ));
        assert!(matches!(
            data_rx.await.unwrap().unwrap(),
            CommandResponse::MarketData(_)
        ));
        assert!(matches!(
            close_rx.await.unwrap().unwrap(),
            CommandResponse::Closed(_)
        ));
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_double_open_guard() {
        let (driver, launches, ..) = MockDriver::new();
        let (control, task) = spawn_worker(driver);

        control.dispatch(Command::Open).await.unwrap();
        let err = control.dispatch(Command::Open).await.unwrap_err();
        assert!(matches!(err, Error::Session(_)));
        assert_eq!(launches.load(Ordering::SeqCst), 1);

        control.dispatch(Command::Close).await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_data_without_session_never_reads() {
        let (driver, _, data_reads, screenshots) = MockDriver::new();
        let (control, task) = spawn_worker(driver);

        assert!(control.dispatch(Command::GetData).await.is_err());
        assert!(control.dispatch(Command::Screenshot).await.is_err());
        assert_eq!(data_reads.load(Ordering::SeqCst), 0);
        assert_eq!(screenshots.load(Ordering::SeqCst), 0);

        control.dispatch(Command::Close).await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_close_is_terminal() {
        let (driver, ..) = MockDriver::new();
        let (control, task) = spawn_worker(driver);

        control.dispatch(Command::Close).await.unwrap();
        task.await.unwrap();

        // The worker is gone; dispatch can no longer be delivered.
        let err = control.dispatch(Command::Open).await.unwrap_err();
        assert!(matches!(err, Error::Session(_)));
    }

    #[tokio::test]
    async fn test_failed_open_reply_keeps_worker_alive() {
        let (mut driver, launches, ..) = MockDriver::new();
        driver.fail_open = true;
        let (control, task) = spawn_worker(driver);

        let err = control.dispatch(Command::Open).await.unwrap_err();
        assert!(matches!(err, Error::Browser(_)));
        assert_eq!(launches.load(Ordering::SeqCst), 0);

        // Worker still serves follow-up commands after the failure.
        control.dispatch(Command::Close).await.unwrap();
        task.await.unwrap();
    }
}
