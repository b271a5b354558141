//! Host network layer handling viewer UDP traffic, menus and advertisements

use crate::a2s::A2sConnector;
use crate::config::{self, Snapshot};
use crate::menu::{MenuEvent, MenuNavigator, MenuState};
use crate::query::QueryConnector;
use crate::resolver::QueryResolver;
use crate::scheduler::{AdvertisementScheduler, Broadcaster};
use crate::viewer_manager::{SessionSlot, ViewerManager};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{is_servers_command, Packet, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ViewerTimeout { viewer_id: u32 },
    /// Re-read the configuration file
    Reload,
    Shutdown,
}

/// Messages queued for the sender task
#[derive(Debug)]
pub enum OutboundMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
    },
}

/// Delivers advertisements as chat packets to every connected viewer
pub struct ChatBroadcaster {
    outbound_tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl Broadcaster for ChatBroadcaster {
    fn broadcast(&self, text: String) {
        if let Err(e) = self.outbound_tx.send(OutboundMessage::BroadcastPacket {
            packet: Packet::Chat { text },
        }) {
            error!("Failed to queue advertisement: {}", e);
        }
    }
}

/// Menu input forwarded to a viewer's session
#[derive(Debug, Clone, Copy, PartialEq)]
enum MenuRequest {
    Open,
    Select { menu_id: u32, option: usize },
    Back { menu_id: u32 },
    Close,
}

pub fn event_packet(event: MenuEvent) -> Packet {
    match event {
        MenuEvent::Show(view) => Packet::Menu {
            menu_id: view.menu_id,
            title: view.title,
            entries: view.entries,
            has_parent: view.has_parent,
        },
        MenuEvent::Notice(text) => Packet::Chat { text },
        MenuEvent::Closed => Packet::MenuClosed,
    }
}

/// Applies one request to a viewer's session while holding only that
/// viewer's lock. A session that ends up closed is dropped; its menu id
/// numbering carries over to the next one.
async fn run_menu_request(
    slot: SessionSlot,
    request: MenuRequest,
    snapshot: Arc<Snapshot>,
    resolver: QueryResolver,
) -> Option<MenuEvent> {
    let mut guard = slot.lock().await;
    let session = &mut *guard;

    let event = match request {
        MenuRequest::Open => {
            let first_menu_id = session
                .navigator
                .as_ref()
                .map_or(session.next_menu_id, MenuNavigator::next_menu_id);
            let navigator = session.navigator.insert(
                MenuNavigator::new(snapshot, resolver).with_first_menu_id(first_menu_id),
            );
            Some(navigator.open().await)
        }
        MenuRequest::Select { menu_id, option } => match session.navigator.as_mut() {
            Some(navigator) => navigator.select(menu_id, option).await,
            None => None,
        },
        MenuRequest::Back { menu_id } => session
            .navigator
            .as_mut()
            .and_then(|navigator| navigator.back(menu_id)),
        MenuRequest::Close => session.navigator.as_mut().map(|navigator| navigator.close()),
    };

    if let Some(next_menu_id) = session.navigator.as_ref().map(MenuNavigator::next_menu_id) {
        session.next_menu_id = next_menu_id;
    }
    if session
        .navigator
        .as_ref()
        .is_some_and(|navigator| navigator.state() == MenuState::Closed)
    {
        session.navigator = None;
    }

    event
}

/// Directory host coordinating viewers, menus and the advertisement scheduler
pub struct Server {
    socket: Arc<UdpSocket>,
    viewers: Arc<RwLock<ViewerManager>>,
    snapshot: Arc<Snapshot>,
    config_path: PathBuf,
    connector: Arc<dyn QueryConnector>,
    scheduler: Option<JoinHandle<()>>,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    outbound_tx: mpsc::UnboundedSender<OutboundMessage>,
    outbound_rx: mpsc::UnboundedReceiver<OutboundMessage>,
}

impl Server {
    /// Binds `addr` and loads the configuration at `config_path`, creating it
    /// with defaults when missing
    pub async fn new(
        addr: &str,
        config_path: impl Into<PathBuf>,
        max_viewers: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = config_path.into();
        let snapshot = config::load_snapshot(&config_path, 1)?;
        Self::with_snapshot(addr, snapshot, config_path, max_viewers).await
    }

    pub async fn with_snapshot(
        addr: &str,
        snapshot: Snapshot,
        config_path: PathBuf,
        max_viewers: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Directory host listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            viewers: Arc::new(RwLock::new(ViewerManager::new(max_viewers))),
            snapshot: Arc::new(snapshot),
            config_path,
            connector: Arc::new(A2sConnector),
            scheduler: None,
            server_tx,
            server_rx,
            outbound_tx,
            outbound_rx,
        })
    }

    /// Replaces the query connector used by menus and advertisements
    pub fn with_connector(mut self, connector: Arc<dyn QueryConnector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Sender for control messages such as [`ServerMessage::Reload`]
    pub fn control(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    pub fn generation(&self) -> u64 {
        self.snapshot.generation
    }

    fn resolver(&self) -> QueryResolver {
        QueryResolver::new(
            Arc::clone(&self.connector),
            self.snapshot.settings.error_policy(),
        )
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let viewers = Arc::clone(&self.viewers);
        let mut outbound_rx =
            std::mem::replace(&mut self.outbound_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                match message {
                    OutboundMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    OutboundMessage::BroadcastPacket { packet } => {
                        let viewer_addrs = {
                            let viewers_guard = viewers.read().await;
                            viewers_guard.get_viewer_addrs()
                        };

                        for (viewer_id, addr) in viewer_addrs {
                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to viewer {}: {}", viewer_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that drops viewers gone silent, with their menu sessions
    fn spawn_timeout_checker(&self) {
        let viewers = Arc::clone(&self.viewers);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut viewers_guard = viewers.write().await;
                    viewers_guard.check_timeouts()
                };

                for viewer_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ViewerTimeout { viewer_id }) {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        });
    }

    /// Forwards SIGHUP as a reload request
    #[cfg(unix)]
    fn spawn_reload_listener(&self) {
        use tokio::signal::unix::{signal, SignalKind};

        let server_tx = self.server_tx.clone();
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(hangup) => hangup,
            Err(e) => {
                warn!("SIGHUP reload unavailable: {}", e);
                return;
            }
        };

        tokio::spawn(async move {
            while hangup.recv().await.is_some() {
                if server_tx.send(ServerMessage::Reload).is_err() {
                    break;
                }
            }
        });
    }

    #[cfg(not(unix))]
    fn spawn_reload_listener(&self) {}

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self
            .outbound_tx
            .send(OutboundMessage::SendPacket { packet, addr })
        {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    /// Starts the advertisement scheduler for the current snapshot, stopping
    /// the previous one
    fn restart_scheduler(&mut self) {
        if let Some(handle) = self.scheduler.take() {
            handle.abort();
        }

        let scheduler = AdvertisementScheduler::new(Arc::clone(&self.snapshot), self.resolver());
        let broadcaster = Arc::new(ChatBroadcaster {
            outbound_tx: self.outbound_tx.clone(),
        });
        self.scheduler = Some(tokio::spawn(scheduler.run(broadcaster)));
    }

    /// Swaps in a freshly loaded snapshot. Open menu sessions keep the one
    /// they started with.
    fn reload(&mut self) {
        let generation = self.snapshot.generation + 1;
        match config::load_snapshot(&self.config_path, generation) {
            Ok(snapshot) => {
                self.snapshot = Arc::new(snapshot);
                self.restart_scheduler();
                info!("Configuration reloaded (generation {})", generation);
            }
            Err(e) => error!(
                "Reload failed, keeping generation {}: {}",
                self.snapshot.generation, e
            ),
        }
    }

    /// Runs menu work on its own task so a slow query never stalls the loop
    fn spawn_menu_request(&self, slot: SessionSlot, request: MenuRequest, addr: SocketAddr) {
        let snapshot = Arc::clone(&self.snapshot);
        let resolver = self.resolver();
        let outbound_tx = self.outbound_tx.clone();

        tokio::spawn(async move {
            if let Some(event) = run_menu_request(slot, request, snapshot, resolver).await {
                let packet = event_packet(event);
                if let Err(e) = outbound_tx.send(OutboundMessage::SendPacket { packet, addr }) {
                    error!("Failed to queue menu packet: {}", e);
                }
            }
        });
    }

    /// Processes one viewer packet
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        if let Packet::Connect { client_version } = packet {
            self.handle_connect(client_version, addr).await;
            return;
        }

        let viewer = {
            let mut viewers = self.viewers.write().await;
            viewers.find_viewer_by_addr(addr).and_then(|viewer_id| {
                viewers.touch(viewer_id);
                viewers.session(viewer_id).map(|slot| (viewer_id, slot))
            })
        };

        let Some((viewer_id, slot)) = viewer else {
            debug!("Packet from unknown viewer at {}", addr);
            return;
        };

        let request = match packet {
            Packet::Heartbeat => return,
            Packet::Command { name } => {
                if !is_servers_command(&name) {
                    debug!("Viewer {} sent unknown command {:?}", viewer_id, name);
                    return;
                }
                MenuRequest::Open
            }
            Packet::Select { menu_id, option } => MenuRequest::Select { menu_id, option },
            Packet::Back { menu_id } => MenuRequest::Back { menu_id },
            Packet::CloseMenu => MenuRequest::Close,
            Packet::Disconnect => {
                let mut viewers = self.viewers.write().await;
                viewers.remove_viewer(&viewer_id);
                return;
            }
            _ => {
                warn!("Unexpected packet type from viewer at {}", addr);
                return;
            }
        };

        self.spawn_menu_request(slot, request, addr);
    }

    async fn handle_connect(&mut self, client_version: u32, addr: SocketAddr) {
        info!(
            "Viewer connecting from {} (version: {})",
            addr, client_version
        );

        if client_version != PROTOCOL_VERSION {
            self.send_packet(
                Packet::Disconnected {
                    reason: "Protocol version mismatch".to_string(),
                },
                addr,
            );
            return;
        }

        let viewer_id = {
            let mut viewers = self.viewers.write().await;

            // Remove existing connection if present
            if let Some(existing_id) = viewers.find_viewer_by_addr(addr) {
                info!("Removing existing viewer {} from {}", existing_id, addr);
                viewers.remove_viewer(&existing_id);
            }

            viewers.add_viewer(addr)
        };

        let response = match viewer_id {
            Some(client_id) => Packet::Connected { client_id },
            None => Packet::Disconnected {
                reason: "Server full".to_string(),
            },
        };
        self.send_packet(response, addr);
    }

    /// Tells every viewer the host is going away. Sent directly on the socket
    /// since the sender task may not get another turn.
    async fn shutdown(&mut self) {
        if let Some(handle) = self.scheduler.take() {
            handle.abort();
        }

        let viewer_addrs = {
            let viewers = self.viewers.read().await;
            viewers.get_viewer_addrs()
        };

        let packet = Packet::Disconnected {
            reason: "Server shutting down".to_string(),
        };
        for (viewer_id, addr) in viewer_addrs {
            if let Err(e) = Self::send_packet_impl(&self.socket, &packet, addr).await {
                debug!("Failed to notify viewer {} of shutdown: {}", viewer_id, e);
            }
        }
    }

    /// Main host loop
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();
        self.spawn_reload_listener();
        self.restart_scheduler();

        info!(
            "Directory host started with {} servers in {} modes",
            self.snapshot.directory.server_count(),
            self.snapshot.directory.modes().len()
        );

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ViewerTimeout { viewer_id }) => {
                            info!("Viewer {} timed out", viewer_id);
                        },
                        Some(ServerMessage::Reload) => self.reload(),
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Directory host shutting down");
                            break;
                        }
                    }
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, shutting down");
                    break;
                },
            }
        }

        self.shutdown().await;
        Ok(())
    }
}
