//! Supervisor: owns at most one worker task and its control handle.

use tokio::task::JoinHandle;
use tracing::{info, warn};

use tradepilot_browser::ConsoleDriver;
use tradepilot_core::{Command, CommandResponse, Error, Result};

use crate::bus::{CommandBus, ControlHandle};
use crate::worker::Worker;

/// Builds a fresh driver for each worker generation.
pub type DriverFactory = Box<dyn Fn() -> Result<Box<dyn ConsoleDriver>> + Send + Sync>;

struct WorkerHandle {
    control: ControlHandle,
    task: JoinHandle<()>,
}

/// Front door for the control surface. Spawns a worker on `open`, routes
/// `data`/`screenshot` to it, and joins it on `close`. Guard errors carry
/// the messages clients display verbatim.
pub struct Supervisor {
    make_driver: DriverFactory,
    worker: Option<WorkerHandle>,
}

impl Supervisor {
    pub fn new(make_driver: DriverFactory) -> Self {
        Self {
            make_driver,
            worker: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Spawn a fresh worker and run the open sequence. If opening fails
    /// the worker is torn down again, so a later `open` starts clean.
    pub async fn open(&mut self) -> Result<CommandResponse> {
        if self.worker.is_some() {
            return Err(Error::Session("Browser already opened".to_string()));
        }

        let driver = (self.make_driver)()?;
        let (tx, rx) = CommandBus::new(8).split();
        let control = ControlHandle::new(tx);
        let task = tokio::spawn(Worker::new(driver, rx).run());
        info!("Worker spawned");

        match control.dispatch(Command::Open).await {
            Ok(response) => {
                self.worker = Some(WorkerHandle { control, task });
                Ok(response)
            }
            Err(e) => {
                warn!(error = %e, "Open failed, tearing worker down");
                if let Err(close_err) = control.dispatch(Command::Close).await {
                    warn!(error = %close_err, "Teardown close failed");
                }
                if let Err(join_err) = task.await {
                    warn!(error = %join_err, "Worker join failed");
                }
                Err(e)
            }
        }
    }

    pub async fn data(&mut self) -> Result<CommandResponse> {
        let worker = self
            .worker
            .as_ref()
            .ok_or_else(|| Error::Session("Please open the browser first".to_string()))?;
        worker.control.dispatch(Command::GetData).await
    }

    pub async fn screenshot(&mut self) -> Result<CommandResponse> {
        let worker = self
            .worker
            .as_ref()
            .ok_or_else(|| Error::Session("Please open the browser first".to_string()))?;
        worker.control.dispatch(Command::Screenshot).await
    }

    /// Dispatch `close`, then join the finished worker task.
    pub async fn close(&mut self) -> Result<CommandResponse> {
        let worker = self
            .worker
            .take()
            .ok_or_else(|| Error::Session("Browser not opened".to_string()))?;

        let response = worker.control.dispatch(Command::Close).await;
        if let Err(join_err) = worker.task.await {
            warn!(error = %join_err, "Worker join failed");
        }
        info!("Worker stopped");
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use tradepilot_core::MarketSnapshot;

    struct ScriptedDriver {
        opened: Arc<AtomicBool>,
        fail_open: bool,
    }

    #[async_trait]
    impl ConsoleDriver for ScriptedDriver {
        async fn open(&mut self) -> Result<String> {
            if self.fail_open {
                return Err(Error::Browser("no chrome here".to_string()));
            }
            self.opened.store(true, Ordering::SeqCst);
            Ok("Webpage opened and logged in".to_string())
        }

        async fn market_data(&mut self) -> Result<MarketSnapshot> {
            Err(Error::Session("No browser session open".to_string()))
        }

        async fn chart_screenshot(&mut self) -> Result<Vec<u8>> {
            Ok(vec![1, 2, 3])
        }

        async fn close(&mut self) -> Result<String> {
            self.opened.store(false, Ordering::SeqCst);
            Ok("Browser closed".to_string())
        }
    }

    fn factory(fail_open: bool, built: Arc<AtomicUsize>) -> (DriverFactory, Arc<AtomicBool>) {
        let opened = Arc::new(AtomicBool::new(false));
        let flag = opened.clone();
        let make: DriverFactory = Box::new(move || {
            built.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedDriver {
                opened: flag.clone(),
                fail_open,
            }) as Box<dyn ConsoleDriver>)
        });
        (make, opened)
    }

    #[tokio::test]
    async fn test_open_then_close() {
        let built = Arc::new(AtomicUsize::new(0));
        let (make, opened) = factory(false, built.clone());
        let mut supervisor = Supervisor::new(make);

        assert!(!supervisor.is_running());
        supervisor.open().await.unwrap();
        assert!(supervisor.is_running());
        assert!(opened.load(Ordering::SeqCst));
        assert_eq!(built.load(Ordering::SeqCst), 1);

        match supervisor.close().await.unwrap() {
            CommandResponse::Closed(msg) => assert_eq!(msg, "Browser closed"),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(!supervisor.is_running());
        assert!(!opened.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_second_open_is_guarded() {
        let built = Arc::new(AtomicUsize::new(0));
        let (make, _) = factory(false, built.clone());
        let mut supervisor = Supervisor::new(make);

        supervisor.open().await.unwrap();
        let err = supervisor.open().await.unwrap_err();
        match err {
            Error::Session(msg) => assert_eq!(msg, "Browser already opened"),
            other => panic!("unexpected: {:?}", other),
        }
        // No second driver was built.
        assert_eq!(built.load(Ordering::SeqCst), 1);
        supervisor.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_guards_without_worker() {
        let built = Arc::new(AtomicUsize::new(0));
        let (make, _) = factory(false, built.clone());
        let mut supervisor = Supervisor::new(make);

        match supervisor.data().await.unwrap_err() {
            Error::Session(msg) => assert_eq!(msg, "Please open the browser first"),
            other => panic!("unexpected: {:?}", other),
        }
        match supervisor.screenshot().await.unwrap_err() {
            Error::Session(msg) => assert_eq!(msg, "Please open the browser first"),
            other => panic!("unexpected: {:?}", other),
        }
        match supervisor.close().await.unwrap_err() {
            Error::Session(msg) => assert_eq!(msg, "Browser not opened"),
            other => panic!("unexpected: {:?}", other),
        }
        // The factory never ran: nothing touched a driver.
        assert_eq!(built.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_open_allows_retry() {
        let built = Arc::new(AtomicUsize::new(0));
        let (make, opened) = factory(true, built.clone());
        let mut supervisor = Supervisor::new(make);

        let err = supervisor.open().await.unwrap_err();
        assert!(matches!(err, Error::Browser(_)));
        assert!(!supervisor.is_running());
        assert!(!opened.load(Ordering::SeqCst));

        // A clean retry builds a fresh driver.
        let err = supervisor.open().await.unwrap_err();
        assert!(matches!(err, Error::Browser(_)));
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }
}
