pub mod checks;
pub mod config;
pub mod error;
pub mod labels;
pub mod poller;
pub mod util;

pub use checks::{CheckFailure, CheckOutcome, Checker};
pub use error::{ManagerError, ManagerResult};
pub use poller::manager::{AsyncManager, PollerArgs};
pub use poller::messages::{CheckResult, FinishedCallback, InterfaceStatus, PollerItem};
