//! Per-viewer menu navigation
//!
//! A [`MenuNavigator`] keeps an explicit stack of built frames. Opening a
//! submenu pushes a frame and going back pops it and shows the stored parent
//! again, so a viewer returns to exactly the frame they left. Every shown frame
//! gets a fresh menu id; input that names any other id is stale and ignored.
//!
//! ```text
//! Closed -> ModeList -> ServerList -> ServerDetail -> PlayerList
//!             (skipped when categories are off)
//! ```

use crate::config::Snapshot;
use crate::directory::ServerEntry;
use crate::error::DirectoryError;
use crate::lang;
use crate::query::InfoResponse;
use crate::resolver::{resolve_connect_address, QueryResolver};
use log::{debug, warn};
use shared::MenuEntry;
use std::sync::Arc;
use tokio::task::JoinSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuState {
    Closed,
    ModeList,
    ServerList,
    ServerDetail,
    PlayerList,
}

/// What the viewer should be shown
#[derive(Debug, Clone, PartialEq)]
pub struct MenuView {
    pub menu_id: u32,
    pub title: String,
    pub entries: Vec<MenuEntry>,
    pub has_parent: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MenuEvent {
    Show(MenuView),
    /// One-off chat line; the current menu stays open
    Notice(String),
    Closed,
}

#[derive(Debug, Clone)]
enum MenuAction {
    OpenMode(String),
    OpenServer {
        server: ServerEntry,
        info: InfoResponse,
    },
    ServerOffline(String),
    ShowConnectInfo {
        info: InfoResponse,
        connect_address: String,
    },
    ShowPlayers {
        address: String,
        display_name: String,
    },
    Inert,
}

#[derive(Debug)]
struct MenuFrame {
    state: MenuState,
    title: String,
    entries: Vec<MenuEntry>,
    actions: Vec<MenuAction>,
}

impl MenuFrame {
    fn new(state: MenuState, title: String) -> Self {
        Self {
            state,
            title,
            entries: Vec::new(),
            actions: Vec::new(),
        }
    }

    fn push(&mut self, entry: MenuEntry, action: MenuAction) {
        self.entries.push(entry);
        self.actions.push(action);
    }
}

pub struct MenuNavigator {
    snapshot: Arc<Snapshot>,
    resolver: QueryResolver,
    frames: Vec<MenuFrame>,
    next_menu_id: u32,
    shown: Option<u32>,
}

impl MenuNavigator {
    /// The snapshot is fixed for the life of the session, even across reloads.
    pub fn new(snapshot: Arc<Snapshot>, resolver: QueryResolver) -> Self {
        Self {
            snapshot,
            resolver,
            frames: Vec::new(),
            next_menu_id: 1,
            shown: None,
        }
    }

    /// Continues numbering from an earlier session of the same viewer so its
    /// old menu ids never become current again
    pub fn with_first_menu_id(mut self, menu_id: u32) -> Self {
        self.next_menu_id = menu_id.max(1);
        self
    }

    /// Id the next shown frame will get
    pub fn next_menu_id(&self) -> u32 {
        self.next_menu_id
    }

    pub fn state(&self) -> MenuState {
        self.frames
            .last()
            .map_or(MenuState::Closed, |frame| frame.state)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn shown_menu_id(&self) -> Option<u32> {
        self.shown
    }

    pub fn generation(&self) -> u64 {
        self.snapshot.generation
    }

    /// Entry point of the servers command. Starts over from the top level.
    pub async fn open(&mut self) -> MenuEvent {
        self.frames.clear();
        self.shown = None;

        let snapshot = Arc::clone(&self.snapshot);
        let directory = &snapshot.directory;

        if directory.is_empty() {
            debug!("{}", DirectoryError::EmptyDirectory);
            return MenuEvent::Notice(lang::NO_SERVERS.to_string());
        }

        if snapshot.settings.show_categories {
            let mut frame = MenuFrame::new(MenuState::ModeList, lang::MODE_MENU_TITLE.to_string());
            for mode in directory.modes() {
                frame.push(MenuEntry::new(mode), MenuAction::OpenMode(mode.to_string()));
            }
            self.push(frame)
        } else {
            let servers = directory
                .all_servers()
                .into_iter()
                .map(|(_, server)| server.clone())
                .collect();
            let frame = self
                .build_server_list(lang::ALL_SERVERS_TITLE.to_string(), servers)
                .await;
            self.push(frame)
        }
    }

    /// Opens the server list of one mode on top of the current frame
    pub async fn open_mode(&mut self, mode: &str) -> MenuEvent {
        let servers = match self.snapshot.directory.servers_in(mode) {
            Ok(servers) => servers.into_iter().cloned().collect(),
            Err(e) => {
                debug!("Mode selection rejected: {e}");
                return MenuEvent::Notice(lang::INVALID_MODE.to_string());
            }
        };

        let frame = self
            .build_server_list(lang::servers_menu_title(mode), servers)
            .await;
        self.push(frame)
    }

    /// Runs the action behind `option` of the shown menu. `None` means there
    /// is nothing to send back: stale id, out of range or inert entry.
    pub async fn select(&mut self, menu_id: u32, option: usize) -> Option<MenuEvent> {
        if !self.is_current(menu_id) {
            return None;
        }

        let action = self.frames.last()?.actions.get(option)?.clone();
        match action {
            MenuAction::OpenMode(mode) => Some(self.open_mode(&mode).await),
            MenuAction::OpenServer { server, info } => Some(self.open_server(&server, &info)),
            MenuAction::ServerOffline(display_name) => {
                Some(MenuEvent::Notice(lang::server_offline(&display_name)))
            }
            MenuAction::ShowConnectInfo {
                info,
                connect_address,
            } => Some(MenuEvent::Notice(lang::connect_message(
                &info,
                &connect_address,
            ))),
            MenuAction::ShowPlayers {
                address,
                display_name,
            } => Some(self.open_players(&address, &display_name).await),
            MenuAction::Inert => None,
        }
    }

    /// Pops the shown frame and shows its parent as it was built
    pub fn back(&mut self, menu_id: u32) -> Option<MenuEvent> {
        if !self.is_current(menu_id) {
            return None;
        }

        self.frames.pop();
        if self.frames.is_empty() {
            self.shown = None;
            Some(MenuEvent::Closed)
        } else {
            Some(MenuEvent::Show(self.show_top()))
        }
    }

    pub fn close(&mut self) -> MenuEvent {
        self.frames.clear();
        self.shown = None;
        MenuEvent::Closed
    }

    fn is_current(&self, menu_id: u32) -> bool {
        if self.shown == Some(menu_id) {
            true
        } else {
            debug!(
                "Ignoring input for stale menu {menu_id} (shown: {:?})",
                self.shown
            );
            false
        }
    }

    fn push(&mut self, frame: MenuFrame) -> MenuEvent {
        self.frames.push(frame);
        MenuEvent::Show(self.show_top())
    }

    fn show_top(&mut self) -> MenuView {
        let menu_id = self.next_menu_id;
        self.next_menu_id = self.next_menu_id.wrapping_add(1).max(1);
        self.shown = Some(menu_id);

        let has_parent = self.frames.len() > 1;
        let frame = &self.frames[self.frames.len() - 1];
        MenuView {
            menu_id,
            title: frame.title.clone(),
            entries: frame.entries.clone(),
            has_parent,
        }
    }

    /// Queries every server concurrently; results are laid out in directory
    /// order regardless of completion order.
    async fn build_server_list(&self, title: String, servers: Vec<ServerEntry>) -> MenuFrame {
        let mut tasks = JoinSet::new();
        for (index, server) in servers.iter().cloned().enumerate() {
            let resolver = self.resolver.clone();
            tasks.spawn(async move { (index, resolver.fetch_info(&server).await) });
        }

        let mut results = vec![None; servers.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, info)) => results[index] = info,
                Err(e) => warn!("Server list query task failed: {e}"),
            }
        }

        let mut frame = MenuFrame::new(MenuState::ServerList, title);
        for (server, info) in servers.into_iter().zip(results) {
            match info {
                Some(info) => frame.push(
                    MenuEntry::new(lang::server_online_label(&server.display_name, &info)),
                    MenuAction::OpenServer { server, info },
                ),
                None => frame.push(
                    MenuEntry::new(lang::server_offline_label(&server.display_name)),
                    MenuAction::ServerOffline(server.display_name),
                ),
            }
        }
        frame
    }

    /// Built from the info fetched for the server list entry
    fn open_server(&mut self, server: &ServerEntry, info: &InfoResponse) -> MenuEvent {
        let mut frame = MenuFrame::new(
            MenuState::ServerDetail,
            lang::server_menu_title(&server.display_name),
        );
        frame.push(
            MenuEntry::new(lang::SHOW_INFO_ACTION),
            MenuAction::ShowConnectInfo {
                info: info.clone(),
                connect_address: resolve_connect_address(server).to_string(),
            },
        );
        if info.players > 0 {
            frame.push(
                MenuEntry::new(lang::SHOW_PLAYERS_ACTION),
                MenuAction::ShowPlayers {
                    address: server.address.clone(),
                    display_name: server.display_name.clone(),
                },
            );
        }
        self.push(frame)
    }

    /// Fetches the roster fresh on every entry
    async fn open_players(&mut self, address: &str, display_name: &str) -> MenuEvent {
        let Some(roster) = self.resolver.fetch_players(address).await else {
            return MenuEvent::Notice(lang::server_offline(display_name));
        };

        let mut frame =
            MenuFrame::new(MenuState::PlayerList, lang::players_menu_title(display_name));
        for player in &roster.players {
            frame.push(
                MenuEntry::disabled(lang::player_label(player)),
                MenuAction::Inert,
            );
        }
        self.push(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::directory::{Mode, ServerDirectory};
    use crate::policy::ErrorPolicy;
    use crate::query::fake::FakeConnector;
    use std::time::Duration;

    fn sample_directory() -> ServerDirectory {
        ServerDirectory::new(vec![
            Mode::new(
                "AWP",
                vec![
                    ServerEntry::new("server1", "127.0.0.1:27015", "AWP #1"),
                    ServerEntry::new("server2", "127.0.0.1:27016", "AWP #2"),
                ],
            ),
            Mode::new(
                "PUBLIC",
                vec![ServerEntry::new("server1", "127.0.0.1:27017", "Public #1")
                    .with_alias("203.0.113.1:27016")],
            ),
        ])
    }

    fn sample_connector() -> FakeConnector {
        FakeConnector::new()
            .online("127.0.0.1:27015", "AWP #1", 0, 10)
            .refused("127.0.0.1:27016")
            .online("127.0.0.1:27017", "Public #1", 3, 10)
    }

    fn navigator_with(
        directory: ServerDirectory,
        show_categories: bool,
        connector: FakeConnector,
    ) -> (MenuNavigator, Arc<FakeConnector>) {
        let snapshot = Arc::new(Snapshot {
            generation: 1,
            directory,
            settings: Settings {
                advertise_interval: Duration::from_secs(60),
                ordered_advertisement: true,
                show_categories,
                log_query_errors: false,
            },
        });
        let connector = Arc::new(connector);
        let resolver = QueryResolver::new(connector.clone(), ErrorPolicy::new(false))
            .with_timeout(Duration::from_millis(50));
        (MenuNavigator::new(snapshot, resolver), connector)
    }

    fn navigator() -> MenuNavigator {
        navigator_with(sample_directory(), true, sample_connector()).0
    }

    fn expect_view(event: Option<MenuEvent>) -> MenuView {
        match event {
            Some(MenuEvent::Show(view)) => view,
            other => panic!("Expected a menu, got {other:?}"),
        }
    }

    fn labels(view: &MenuView) -> Vec<&str> {
        view.entries.iter().map(|entry| entry.label.as_str()).collect()
    }

    #[tokio::test]
    async fn test_open_shows_modes() {
        let mut navigator = navigator();
        let view = expect_view(Some(navigator.open().await));

        assert_eq!(navigator.state(), MenuState::ModeList);
        assert_eq!(view.title, lang::MODE_MENU_TITLE);
        assert_eq!(labels(&view), vec!["AWP", "PUBLIC"]);
        assert!(!view.has_parent);
    }

    #[tokio::test]
    async fn test_server_list_labels_and_order() {
        let mut navigator = navigator();
        let modes = expect_view(Some(navigator.open().await));
        let servers = expect_view(navigator.select(modes.menu_id, 0).await);

        assert_eq!(navigator.state(), MenuState::ServerList);
        assert_eq!(servers.title, "Servers: AWP");
        assert_eq!(labels(&servers), vec!["AWP #1 (0/10)", "AWP #2 (Offline)"]);
        assert!(servers.has_parent);
    }

    #[tokio::test]
    async fn test_offline_server_shows_notice_and_stays() {
        let mut navigator = navigator();
        let modes = expect_view(Some(navigator.open().await));
        let servers = expect_view(navigator.select(modes.menu_id, 0).await);

        let event = navigator.select(servers.menu_id, 1).await;
        assert_eq!(
            event,
            Some(MenuEvent::Notice("AWP #2 is currently offline.".to_string()))
        );
        assert_eq!(navigator.state(), MenuState::ServerList);
        assert_eq!(navigator.shown_menu_id(), Some(servers.menu_id));
    }

    #[tokio::test]
    async fn test_empty_server_has_only_connect_action() {
        let mut navigator = navigator();
        let modes = expect_view(Some(navigator.open().await));
        let servers = expect_view(navigator.select(modes.menu_id, 0).await);
        let detail = expect_view(navigator.select(servers.menu_id, 0).await);

        assert_eq!(navigator.state(), MenuState::ServerDetail);
        assert_eq!(labels(&detail), vec![lang::SHOW_INFO_ACTION]);
    }

    #[tokio::test]
    async fn test_connect_info_uses_alias() {
        let mut navigator = navigator();
        let modes = expect_view(Some(navigator.open().await));
        let servers = expect_view(navigator.select(modes.menu_id, 1).await);
        let detail = expect_view(navigator.select(servers.menu_id, 0).await);

        assert_eq!(
            labels(&detail),
            vec![lang::SHOW_INFO_ACTION, lang::SHOW_PLAYERS_ACTION]
        );
        match navigator.select(detail.menu_id, 0).await {
            Some(MenuEvent::Notice(text)) => assert!(text.ends_with("connect 203.0.113.1:27016")),
            other => panic!("Expected connect info, got {other:?}"),
        }
        assert_eq!(navigator.state(), MenuState::ServerDetail);
    }

    #[tokio::test]
    async fn test_player_list_and_back_to_same_detail() {
        let (mut navigator, connector) =
            navigator_with(sample_directory(), true, sample_connector());
        let modes = expect_view(Some(navigator.open().await));
        let servers = expect_view(navigator.select(modes.menu_id, 1).await);
        let detail = expect_view(navigator.select(servers.menu_id, 0).await);
        let queries_before = connector.connect_count();

        let players = expect_view(navigator.select(detail.menu_id, 1).await);
        assert_eq!(navigator.state(), MenuState::PlayerList);
        assert_eq!(players.title, "Players on Public #1");
        assert_eq!(players.entries.len(), 3);
        assert!(players.entries.iter().all(|entry| entry.disabled));
        assert_eq!(connector.connect_count(), queries_before + 1);
        // Roster is queried on the real address, not the alias
        assert_eq!(connector.queried().last().unwrap(), "127.0.0.1:27017");

        assert_eq!(navigator.select(players.menu_id, 0).await, None);

        let back = expect_view(navigator.back(players.menu_id));
        assert_eq!(navigator.state(), MenuState::ServerDetail);
        assert_eq!(back.title, detail.title);
        assert_eq!(back.entries, detail.entries);
        assert_ne!(back.menu_id, detail.menu_id);
        assert_eq!(connector.connect_count(), queries_before + 1);
    }

    #[tokio::test]
    async fn test_back_walks_to_closed() {
        let mut navigator = navigator();
        let modes = expect_view(Some(navigator.open().await));
        let servers = expect_view(navigator.select(modes.menu_id, 0).await);

        let modes_again = expect_view(navigator.back(servers.menu_id));
        assert_eq!(labels(&modes_again), vec!["AWP", "PUBLIC"]);
        assert_eq!(navigator.state(), MenuState::ModeList);

        assert_eq!(navigator.back(modes_again.menu_id), Some(MenuEvent::Closed));
        assert_eq!(navigator.state(), MenuState::Closed);
        assert_eq!(navigator.depth(), 0);
    }

    #[tokio::test]
    async fn test_stale_menu_id_ignored() {
        let mut navigator = navigator();
        let modes = expect_view(Some(navigator.open().await));
        let _servers = expect_view(navigator.select(modes.menu_id, 0).await);

        assert_eq!(navigator.select(modes.menu_id, 1).await, None);
        assert_eq!(navigator.back(modes.menu_id), None);
        assert_eq!(navigator.state(), MenuState::ServerList);
    }

    #[tokio::test]
    async fn test_continued_numbering_skips_old_ids() {
        let mut first = navigator();
        let modes = expect_view(Some(first.open().await));
        expect_view(first.select(modes.menu_id, 0).await);

        let mut second = navigator().with_first_menu_id(first.next_menu_id());
        let reopened = expect_view(Some(second.open().await));

        assert!(reopened.menu_id > modes.menu_id);
        assert_eq!(second.select(modes.menu_id, 1).await, None);
        assert_eq!(second.state(), MenuState::ModeList);
    }

    #[tokio::test]
    async fn test_mode_list_hides_modes_without_usable_servers() {
        let directory = ServerDirectory::new(vec![
            Mode::new("SURF", vec![ServerEntry::new("server1", "127.0.0.1:27018", "")]),
            Mode::new(
                "AWP",
                vec![ServerEntry::new("server1", "127.0.0.1:27015", "AWP #1")],
            ),
        ]);
        let (mut navigator, _) = navigator_with(directory, true, sample_connector());

        let view = expect_view(Some(navigator.open().await));
        assert_eq!(labels(&view), vec!["AWP"]);
    }

    #[tokio::test]
    async fn test_out_of_range_option_ignored() {
        let mut navigator = navigator();
        let modes = expect_view(Some(navigator.open().await));
        assert_eq!(navigator.select(modes.menu_id, 9).await, None);
        assert_eq!(navigator.state(), MenuState::ModeList);
    }

    #[tokio::test]
    async fn test_flat_mode_skips_mode_list() {
        let (mut navigator, _) = navigator_with(sample_directory(), false, sample_connector());
        let view = expect_view(Some(navigator.open().await));

        assert_eq!(navigator.state(), MenuState::ServerList);
        assert_eq!(view.title, lang::ALL_SERVERS_TITLE);
        assert_eq!(
            labels(&view),
            vec!["AWP #1 (0/10)", "AWP #2 (Offline)", "Public #1 (3/10)"]
        );
        assert!(!view.has_parent);

        assert_eq!(navigator.back(view.menu_id), Some(MenuEvent::Closed));
    }

    #[tokio::test]
    async fn test_unknown_mode_notice() {
        let mut navigator = navigator();
        navigator.open().await;

        assert_eq!(
            navigator.open_mode("SURF").await,
            MenuEvent::Notice(lang::INVALID_MODE.to_string())
        );
        assert_eq!(navigator.state(), MenuState::ModeList);
    }

    #[tokio::test]
    async fn test_empty_directory_notice() {
        let (mut navigator, _) =
            navigator_with(ServerDirectory::default(), true, FakeConnector::new());
        assert_eq!(
            navigator.open().await,
            MenuEvent::Notice(lang::NO_SERVERS.to_string())
        );
        assert_eq!(navigator.state(), MenuState::Closed);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let mut first = navigator();
        let mut second = navigator();

        let modes = expect_view(Some(first.open().await));
        expect_view(first.select(modes.menu_id, 0).await);
        expect_view(Some(second.open().await));

        assert_eq!(first.state(), MenuState::ServerList);
        assert_eq!(second.state(), MenuState::ModeList);

        first.close();
        assert_eq!(first.state(), MenuState::Closed);
        assert_eq!(second.state(), MenuState::ModeList);
    }
}
