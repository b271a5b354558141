//! # Server Directory Host Library
//!
//! This library lets viewers connected to one host browse a directory of
//! other game servers, grouped into modes, with live occupancy fetched on
//! demand, and broadcasts periodic advertisements cycling through the
//! directory.
//!
//! ## Core Responsibilities
//!
//! ### Directory
//! The configured modes and servers form an immutable [`config::Snapshot`].
//! A reload builds a whole new snapshot and swaps it in; nothing ever sees
//! settings from one generation with servers from another.
//!
//! ### Live Status
//! [`resolver::QueryResolver`] turns a configured server into live status
//! through a bounded query. Bad addresses, timeouts and refused connections
//! all become "unavailable" and are only ever logged, subject to
//! [`policy::ErrorPolicy`].
//!
//! ### Advertisement
//! [`scheduler::AdvertisementScheduler`] picks the next server on a fixed
//! interval, round-robin or at random, and broadcasts it to every viewer
//! when the query succeeds.
//!
//! ### Menus
//! Every viewer gets an independent [`menu::MenuNavigator`]:
//! mode list, server list, server detail and player list, with back
//! navigation returning to the exact frame the viewer left.
//!
//! ## Module Organization
//!
//! - `config`: JSON configuration, validation and snapshots
//! - `directory`: modes and servers in configured order
//! - `query`, `a2s`: the query protocol boundary and its UDP implementation
//! - `resolver`, `policy`: status resolution and diagnostics gating
//! - `scheduler`, `menu`, `lang`: advertisements, navigation and their text
//! - `viewer_manager`, `network`: the UDP host viewers connect to
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Loads servers_info.json (created with defaults if missing) and
//!     // accepts up to 64 viewers
//!     let mut server = Server::new("127.0.0.1:8080", "servers_info.json", 64).await?;
//!
//!     // Runs until Ctrl+C; SIGHUP reloads the configuration
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! The host runs these concurrent tasks:
//! - **Network Receiver**: listens for viewer packets
//! - **Network Sender**: delivers menus, chat lines and broadcasts
//! - **Timeout Checker**: drops silent viewers and their menu sessions
//! - **Advertisement Scheduler**: one per configuration generation
//! - **Menu Tasks**: one per viewer request, holding only that viewer's session

pub mod a2s;
pub mod config;
pub mod directory;
pub mod error;
pub mod lang;
pub mod menu;
pub mod network;
pub mod policy;
pub mod query;
pub mod resolver;
pub mod scheduler;
pub mod viewer_manager;
