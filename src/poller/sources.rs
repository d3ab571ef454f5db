//! Configuration and persistence collaborators of the poller core
//!
//! - **ItemSource**: hands out items whose next check is due (queue refill)
//!   and takes requeued items back into its schedule
//! - **AvailabilitySink**: persists harvested interface availability

use std::sync::{Mutex, PoisonError};

use tracing::{info, trace, warn};

use crate::config::ItemConfig;
use crate::labels::ResultCode;

use super::messages::{InterfaceStatus, PollerItem};

/// Source of newly due items, consulted when the queue is synced
pub trait ItemSource: Send + Sync {
    /// Items due at `now`, at most `limit` of them
    fn due_items(&self, now: i64, limit: usize) -> Vec<PollerItem>;

    /// Takes back items the driver requeued; they become due again per the
    /// source's own schedule, not immediately
    fn requeue_items(&self, items: &[PollerItem], now: i64);
}

/// Destination for interface availability observations
pub trait AvailabilitySink: Send + Sync {
    fn update_interfaces(&self, interfaces: Vec<InterfaceStatus>) -> anyhow::Result<()>;
}

#[derive(Debug)]
struct ScheduledItem {
    itemid: u64,
    delay: i64,
    nextcheck: i64,
    lastclock: i64,
}

/// Schedules a fixed set of items by their configured delay
#[derive(Debug)]
pub struct StaticItemSource {
    items: Mutex<Vec<ScheduledItem>>,
}

impl StaticItemSource {
    /// Every item becomes due at `now`
    pub fn new(items: &[ItemConfig], now: i64) -> Self {
        let items = items
            .iter()
            .map(|item| ScheduledItem {
                itemid: item.itemid,
                delay: item.delay.max(1) as i64,
                nextcheck: now,
                lastclock: 0,
            })
            .collect();

        Self {
            items: Mutex::new(items),
        }
    }
}

impl ItemSource for StaticItemSource {
    fn due_items(&self, now: i64, limit: usize) -> Vec<PollerItem> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);

        items
            .iter_mut()
            .filter(|item| item.nextcheck <= now)
            .take(limit)
            .map(|item| {
                let due = PollerItem::new(item.itemid, ResultCode::Succeed.code(), item.lastclock);
                item.lastclock = now;
                item.nextcheck = now + item.delay;
                due
            })
            .collect()
    }

    fn requeue_items(&self, requeued: &[PollerItem], now: i64) {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);

        for returned in requeued {
            let Some(item) = items.iter_mut().find(|item| item.itemid == returned.itemid) else {
                trace!("item {} is not scheduled, dropping it", returned.itemid);
                continue;
            };

            item.lastclock = returned.lastclock;
            item.nextcheck = now + item.delay;
        }
    }
}

/// Reports availability changes to the log instead of a database
#[derive(Debug, Default)]
pub struct LoggingAvailability;

impl AvailabilitySink for LoggingAvailability {
    fn update_interfaces(&self, interfaces: Vec<InterfaceStatus>) -> anyhow::Result<()> {
        for interface in interfaces {
            if interface.is_available() {
                info!(
                    "interface {} is available (item {})",
                    interface.interfaceid, interface.itemid
                );
            } else {
                warn!(
                    "interface {} is unavailable: {} ({}, item key \"{}\")",
                    interface.interfaceid,
                    interface.error.as_deref().unwrap_or("unknown error"),
                    ResultCode::label(interface.errcode),
                    interface.key_orig.as_deref().unwrap_or_default()
                );
            }
        }

        Ok(())
    }
}
