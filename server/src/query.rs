//! Boundary to the server query protocol
//!
//! The resolver talks to remote servers only through [`QueryConnector`] and the
//! [`QuerySession`] it hands out. The production implementation lives in
//! [`crate::a2s`]; tests substitute in-process fakes.

use crate::error::QueryError;
use async_trait::async_trait;
use std::time::Duration;

/// Server-info half of a live status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoResponse {
    pub name: String,
    pub map: String,
    pub players: u8,
    pub max_players: u8,
    pub bots: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerEntry {
    pub name: String,
    pub score: i32,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayerResponse {
    pub players: Vec<PlayerEntry>,
}

/// Formats a connection time as `mm:ss`, or `h:mm:ss` past the hour
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

#[async_trait]
pub trait QueryConnector: Send + Sync {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<Box<dyn QuerySession>, QueryError>;
}

#[async_trait]
pub trait QuerySession: Send {
    async fn get_info(&mut self) -> Result<InfoResponse, QueryError>;

    async fn get_players(&mut self) -> Result<PlayerResponse, QueryError>;

    /// Releases the session. Safe to call more than once.
    async fn disconnect(&mut self) -> Result<(), QueryError>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(0)), "00:00");
        assert_eq!(format_duration(Duration::from_secs(62)), "01:02");
        assert_eq!(format_duration(Duration::from_secs_f32(599.9)), "09:59");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1:02:03");
    }
}
