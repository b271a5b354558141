//! Turns configured servers into live status
//!
//! Every expected failure (bad address, timeout, refused connection, garbage
//! reply) collapses to `None` here. The cause is reported through the
//! [`ErrorPolicy`] and never reaches players.

use crate::directory::ServerEntry;
use crate::error::QueryError;
use crate::policy::ErrorPolicy;
use crate::query::{InfoResponse, PlayerResponse, QueryConnector, QuerySession};
use log::debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

type QueryFuture<'s, T> = Pin<Box<dyn Future<Output = Result<T, QueryError>> + Send + 's>>;

pub const QUERY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Splits `host:port`. Exactly one colon, a non-empty host and a port in
/// 1..=65535 are required.
pub fn parse_address(raw: &str) -> Result<(&str, u16), QueryError> {
    let malformed = || QueryError::MalformedAddress(raw.to_string());

    let mut parts = raw.split(':');
    let (host, port) = match (parts.next(), parts.next(), parts.next()) {
        (Some(host), Some(port), None) => (host, port),
        _ => return Err(malformed()),
    };

    if host.is_empty() || port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }

    match port.parse::<u16>() {
        Ok(port) if port > 0 => Ok((host, port)),
        _ => Err(malformed()),
    }
}

/// Address shown to players: the alias when one is set, else the query address
pub fn resolve_connect_address(server: &ServerEntry) -> &str {
    match server.alias_address.as_deref() {
        Some(alias) if !alias.is_empty() => alias,
        _ => &server.address,
    }
}

/// Stateless apart from configuration; clones share the connector and can
/// query concurrently.
#[derive(Clone)]
pub struct QueryResolver {
    connector: Arc<dyn QueryConnector>,
    policy: ErrorPolicy,
    timeout: Duration,
}

impl QueryResolver {
    pub fn new(connector: Arc<dyn QueryConnector>, policy: ErrorPolicy) -> Self {
        Self {
            connector,
            policy,
            timeout: QUERY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Queries `server.address`, never the alias
    pub async fn fetch_info(&self, server: &ServerEntry) -> Option<InfoResponse> {
        if !server.is_usable() {
            return None;
        }

        let (host, port) = match parse_address(&server.address) {
            Ok(parsed) => parsed,
            Err(_) => {
                self.policy.report(format_args!(
                    "Invalid IP address or port format for server {}: {}",
                    server.display_name, server.address
                ));
                return None;
            }
        };

        match self
            .query(host, port, |session| session.get_info())
            .await
        {
            Ok(info) => Some(info),
            Err(e) => {
                self.policy.report(format_args!(
                    "Failed to query server {} ({}): {}",
                    server.display_name, server.address, e
                ));
                None
            }
        }
    }

    pub async fn fetch_players(&self, address: &str) -> Option<PlayerResponse> {
        let (host, port) = match parse_address(address) {
            Ok(parsed) => parsed,
            Err(_) => {
                self.policy
                    .report(format_args!("Invalid game IP format: {address}"));
                return None;
            }
        };

        match self
            .query(host, port, |session| session.get_players())
            .await
        {
            Ok(roster) => Some(roster),
            Err(e) => {
                self.policy.report(format_args!(
                    "Failed to query server players from {address}: {e}"
                ));
                None
            }
        }
    }

    /// Opens a session, runs `op` under the timeout and disconnects whatever
    /// the outcome. Dropping the returned future drops the session, which
    /// releases its socket.
    async fn query<T, F>(&self, host: &str, port: u16, op: F) -> Result<T, QueryError>
    where
        F: for<'s> FnOnce(&'s mut Box<dyn QuerySession>) -> QueryFuture<'s, T>,
    {
        let mut session = time::timeout(
            self.timeout,
            self.connector.connect(host, port, self.timeout),
        )
        .await
        .map_err(|_| QueryError::Timeout(self.timeout))??;

        let result = time::timeout(self.timeout, op(&mut session))
            .await
            .unwrap_or(Err(QueryError::Timeout(self.timeout)));

        if let Err(e) = session.disconnect().await {
            debug!("Disconnect from {host}:{port} failed: {e}");
        }

        result
    }
}
