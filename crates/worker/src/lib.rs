//! Worker crate: single-consumer command loop around a console driver,
//! plus the supervisor that owns the worker's lifecycle.

pub mod bus;
pub mod supervisor;
pub mod worker;

pub use bus::{CommandBus, ControlHandle};
pub use supervisor::{DriverFactory, Supervisor};
pub use worker::Worker;
