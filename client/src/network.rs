use crate::display::{render_chat, render_menu};
use crate::input::{parse_line, ViewerInput, HELP};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{MenuEntry, Packet, HEARTBEAT_INTERVAL_MS, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UdpSocket;
use tokio::time::interval;

/// The menu currently on screen
#[derive(Debug, Clone, PartialEq)]
pub struct ShownMenu {
    pub menu_id: u32,
    pub entries: Vec<MenuEntry>,
    pub has_parent: bool,
}

/// What to send for one line of input, given the menu on screen
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Send(Packet),
    Print(&'static str),
    Quit,
    Nothing,
}

pub fn action_for(input: ViewerInput, menu: Option<&ShownMenu>) -> Action {
    match input {
        ViewerInput::Command(name) => Action::Send(Packet::Command { name }),
        ViewerInput::Select(option) => match menu {
            Some(menu) => match menu.entries.get(option) {
                Some(entry) if !entry.disabled => Action::Send(Packet::Select {
                    menu_id: menu.menu_id,
                    option,
                }),
                Some(_) => Action::Nothing,
                None => Action::Print("No such option."),
            },
            None => Action::Print("No menu is open. Type `servers` to open one."),
        },
        ViewerInput::Back => match menu {
            Some(menu) => Action::Send(Packet::Back {
                menu_id: menu.menu_id,
            }),
            None => Action::Nothing,
        },
        ViewerInput::Close => match menu {
            Some(_) => Action::Send(Packet::CloseMenu),
            None => Action::Nothing,
        },
        ViewerInput::Help => Action::Print(HELP),
        ViewerInput::Quit => Action::Quit,
        ViewerInput::Empty => Action::Nothing,
    }
}

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    client_id: Option<u32>,
    connected: bool,
    menu: Option<ShownMenu>,
}

impl Client {
    pub async fn new(server_addr: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            client_id: None,
            connected: false,
            menu: None,
        })
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to host...");

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
        };
        self.send_packet(&packet).await?;

        Ok(())
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    /// Returns false once the host has dropped us
    fn handle_packet(&mut self, packet: Packet, out: &mut impl Write) -> io::Result<bool> {
        match packet {
            Packet::Connected { client_id } => {
                info!("Connected! Viewer ID: {}", client_id);
                self.client_id = Some(client_id);
                self.connected = true;
                writeln!(out, "Connected. Type `servers` to browse, `help` for help.")?;
            }

            Packet::Menu {
                menu_id,
                title,
                entries,
                has_parent,
            } => {
                render_menu(out, &title, &entries, has_parent)?;
                self.menu = Some(ShownMenu {
                    menu_id,
                    entries,
                    has_parent,
                });
            }

            Packet::MenuClosed => {
                self.menu = None;
                writeln!(out, "Menu closed.")?;
            }

            Packet::Chat { text } => render_chat(out, &text)?,

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                writeln!(out, "Disconnected: {}", reason)?;
                self.connected = false;
                self.client_id = None;
                self.menu = None;
                return Ok(false);
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }

        Ok(true)
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let mut heartbeat_interval = interval(Duration::from_millis(HEARTBEAT_INTERVAL_MS));
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut buffer = vec![0u8; MAX_PACKET_SIZE];
        let mut stdout = io::stdout();

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, addr)) if addr == self.server_addr => {
                            match deserialize::<Packet>(&buffer[0..len]) {
                                Ok(packet) => {
                                    if !self.handle_packet(packet, &mut stdout)? {
                                        break;
                                    }
                                }
                                Err(e) => warn!("Failed to deserialize packet: {}", e),
                            }
                        },
                        Ok((_, addr)) => debug!("Ignoring packet from {}", addr),
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };

                    match action_for(parse_line(&line), self.menu.as_ref()) {
                        Action::Send(packet) => {
                            if let Err(e) = self.send_packet(&packet).await {
                                error!("Error sending packet: {}", e);
                            }
                        }
                        Action::Print(text) => writeln!(stdout, "{}", text)?,
                        Action::Quit => break,
                        Action::Nothing => {}
                    }
                },

                _ = heartbeat_interval.tick() => {
                    if self.connected {
                        if let Err(e) = self.send_packet(&Packet::Heartbeat).await {
                            error!("Error sending heartbeat: {}", e);
                        }
                    }
                },
            }
        }

        if self.connected {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }

        Ok(())
    }
}
