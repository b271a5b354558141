use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_PACKET_SIZE: usize = 8192;
pub const HEARTBEAT_INTERVAL_MS: u64 = 2000;

pub const SERVERS_COMMAND: &str = "servers";
const SERVERS_COMMAND_ALIAS: &str = "css_servers";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Connect {
        client_version: u32,
    },
    Command {
        name: String,
    },
    Select {
        menu_id: u32,
        option: usize,
    },
    Back {
        menu_id: u32,
    },
    CloseMenu,
    Heartbeat,
    Disconnect,

    Connected {
        client_id: u32,
    },
    Menu {
        menu_id: u32,
        title: String,
        entries: Vec<MenuEntry>,
        has_parent: bool,
    },
    MenuClosed,
    Chat {
        text: String,
    },
    Disconnected {
        reason: String,
    },
}

/// One line of a menu as shown to a viewer. Disabled entries are informational
/// and selecting them does nothing.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MenuEntry {
    pub label: String,
    pub disabled: bool,
}

impl MenuEntry {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            disabled: false,
        }
    }

    pub fn disabled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            disabled: true,
        }
    }
}

/// Matches the directory command, case-insensitively, with or without the
/// console prefix.
pub fn is_servers_command(name: &str) -> bool {
    let name = name.trim();
    name.eq_ignore_ascii_case(SERVERS_COMMAND) || name.eq_ignore_ascii_case(SERVERS_COMMAND_ALIAS)
}
