//! TCP service availability probe
//!
//! Connects to the configured address and reports "1" when the handshake
//! completes. Nothing is sent over the connection.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::net::{TcpSocket, TcpStream};
use tracing::{instrument, trace};

use crate::config::{CheckConfig, ItemConfig};
use crate::labels::ResultCode;
use crate::poller::messages::PollerItem;

use super::{CheckOutcome, Checker};

#[derive(Debug, Clone)]
struct Target {
    address: String,
    interfaceid: Option<u64>,
    key: Option<String>,
}

#[derive(Debug, Default)]
pub struct TcpServiceCheck {
    targets: HashMap<u64, Target>,
}

impl TcpServiceCheck {
    pub fn new(items: &[ItemConfig]) -> Self {
        let targets = items
            .iter()
            .map(|item| {
                (
                    item.itemid,
                    Target {
                        address: item.address.clone(),
                        interfaceid: item.interfaceid,
                        key: item.key.clone(),
                    },
                )
            })
            .collect();

        Self { targets }
    }

    async fn connect(&self, address: &str, source_ip: Option<IpAddr>) -> Result<()> {
        let addr: SocketAddr = tokio::net::lookup_host(address)
            .await
            .context("cannot resolve address")?
            .next()
            .context("address resolved to nothing")?;

        let _stream = match source_ip {
            Some(source_ip) => {
                let socket = if addr.is_ipv4() {
                    TcpSocket::new_v4()?
                } else {
                    TcpSocket::new_v6()?
                };
                socket
                    .bind(SocketAddr::new(source_ip, 0))
                    .context("cannot bind source address")?;
                socket.connect(addr).await.context("cannot connect")?
            }
            None => TcpStream::connect(addr).await.context("cannot connect")?,
        };

        Ok(())
    }
}

#[async_trait]
impl Checker for TcpServiceCheck {
    #[instrument(skip(self, config), fields(itemid = item.itemid))]
    async fn check(&self, item: &PollerItem, config: &CheckConfig) -> CheckOutcome {
        let Some(target) = self.targets.get(&item.itemid) else {
            return CheckOutcome::failure(
                ResultCode::ConfigError,
                format!("item {} is not configured", item.itemid),
            );
        };

        trace!("connecting to {}", target.address);

        let outcome = match tokio::time::timeout(
            config.timeout,
            self.connect(&target.address, config.source_ip),
        )
        .await
        {
            Ok(Ok(())) => CheckOutcome::success("1"),
            Ok(Err(e)) => CheckOutcome::failure(
                ResultCode::NetworkError,
                format!("{}: {:#}", target.address, e),
            ),
            Err(_) => CheckOutcome::failure(
                ResultCode::TimeoutError,
                format!(
                    "{}: timed out after {}s",
                    target.address,
                    config.timeout.as_secs()
                ),
            ),
        };

        match target.interfaceid {
            Some(interfaceid) => outcome.on_interface(interfaceid, target.key.clone()),
            None => outcome,
        }
    }
}
