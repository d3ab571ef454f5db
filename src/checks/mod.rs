//! Protocol check boundary
//!
//! The poller core never speaks a monitoring protocol itself. Each protocol is a
//! [`Checker`] that turns one [`PollerItem`] into a [`CheckOutcome`]; workers only
//! schedule, time out and report those calls.

use async_trait::async_trait;

use crate::config::CheckConfig;
use crate::labels::ResultCode;
use crate::poller::messages::PollerItem;

pub mod tcp;

/// Why a check did not produce a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckFailure {
    pub code: ResultCode,
    pub message: String,
}

/// Result of one protocol check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub value: Result<String, CheckFailure>,

    /// Interface the check ran against, with the item key that addressed it
    pub interface: Option<(u64, Option<String>)>,
}

impl CheckOutcome {
    pub fn success(value: impl Into<String>) -> Self {
        Self {
            value: Ok(value.into()),
            interface: None,
        }
    }

    pub fn failure(code: ResultCode, message: impl Into<String>) -> Self {
        Self {
            value: Err(CheckFailure {
                code,
                message: message.into(),
            }),
            interface: None,
        }
    }

    /// Binds the outcome to a host interface, so availability gets updated
    pub fn on_interface(mut self, interfaceid: u64, key: Option<String>) -> Self {
        self.interface = Some((interfaceid, key));
        self
    }

    pub fn code(&self) -> ResultCode {
        match &self.value {
            Ok(_) => ResultCode::Succeed,
            Err(failure) => failure.code,
        }
    }
}

/// A protocol-specific poller
///
/// Implementations are shared by every worker thread and called concurrently.
#[async_trait]
pub trait Checker: Send + Sync + 'static {
    /// Per-thread setup, run on the worker thread before it reports as started
    fn init_worker(&self, _ordinal: usize) -> anyhow::Result<()> {
        Ok(())
    }

    /// Performs one check; failures are reported in the outcome, not raised
    async fn check(&self, item: &PollerItem, config: &CheckConfig) -> CheckOutcome;
}
