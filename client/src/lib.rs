//! # Directory Viewer Library
//!
//! A terminal viewer for the server directory host. It connects over UDP,
//! forwards the `servers` command, prints each menu the host sends as a
//! numbered list and sends the viewer's picks back.
//!
//! ## Module Organization
//!
//! ### Input Module (`input`)
//! Parses typed lines into menu picks, navigation and host commands. Chat
//! style prefixes (`!servers`, `/css_servers`) are accepted.
//!
//! ### Display Module (`display`)
//! Renders menus and chat lines as plain text to any writer.
//!
//! ### Network Module (`network`)
//! Owns the UDP socket and the event loop over host packets, stdin lines and
//! the heartbeat timer. It remembers the menu on screen so picks are sent
//! with the right menu id; the host ignores picks for any other menu.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::new("127.0.0.1:8080").await?;
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

pub mod display;
pub mod input;
pub mod network;
