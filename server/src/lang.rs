//! Player-facing text

use crate::query::{format_duration, InfoResponse, PlayerEntry};

pub const MODE_MENU_TITLE: &str = "Select a mode";
pub const ALL_SERVERS_TITLE: &str = "Servers";
pub const SHOW_INFO_ACTION: &str = "Show connect info";
pub const SHOW_PLAYERS_ACTION: &str = "Show players";
pub const INVALID_MODE: &str = "Invalid mode selected.";
pub const NO_SERVERS: &str = "No servers are configured.";

pub fn chat_advertisement(info: &InfoResponse, connect_address: &str) -> String {
    format!(
        "[Servers] {} | Map: {} | Players: {}/{} | connect {}",
        info.name, info.map, info.players, info.max_players, connect_address
    )
}

pub fn servers_menu_title(mode: &str) -> String {
    format!("Servers: {mode}")
}

pub fn server_menu_title(display_name: &str) -> String {
    display_name.to_string()
}

pub fn players_menu_title(display_name: &str) -> String {
    format!("Players on {display_name}")
}

pub fn server_online_label(display_name: &str, info: &InfoResponse) -> String {
    format!("{display_name} ({}/{})", info.players, info.max_players)
}

pub fn server_offline_label(display_name: &str) -> String {
    format!("{display_name} (Offline)")
}

pub fn server_offline(display_name: &str) -> String {
    format!("{display_name} is currently offline.")
}

pub fn connect_message(info: &InfoResponse, connect_address: &str) -> String {
    format!(
        "{} | Map: {} | Players: {}/{} | connect {}",
        info.name, info.map, info.players, info.max_players, connect_address
    )
}

pub fn player_label(player: &PlayerEntry) -> String {
    format!(
        "{} | {} | {}",
        player.name,
        player.score,
        format_duration(player.duration)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn info() -> InfoResponse {
        InfoResponse {
            name: "AWP #1".to_string(),
            map: "awp_lego_2".to_string(),
            players: 3,
            max_players: 10,
            bots: 0,
        }
    }

    #[test]
    fn test_server_labels() {
        assert_eq!(server_online_label("AWP #1", &info()), "AWP #1 (3/10)");
        assert_eq!(server_offline_label("AWP #1"), "AWP #1 (Offline)");
    }

    #[test]
    fn test_messages_use_given_address() {
        let message = chat_advertisement(&info(), "203.0.113.1:27016");
        assert!(message.contains("awp_lego_2"));
        assert!(message.contains("3/10"));
        assert!(message.ends_with("connect 203.0.113.1:27016"));

        let message = connect_message(&info(), "127.0.0.1:27015");
        assert!(message.ends_with("connect 127.0.0.1:27015"));
    }

    #[test]
    fn test_player_label() {
        let player = PlayerEntry {
            name: "alice".to_string(),
            score: 12,
            duration: Duration::from_secs(95),
        };
        assert_eq!(player_label(&player), "alice | 12 | 01:35");
    }
}
