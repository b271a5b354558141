//! Connected viewer tracking for the directory host
//!
//! Handles:
//! - Viewer connection lifecycle (connect, disconnect, timeout)
//! - Capacity limits and address lookup
//! - Ownership of each viewer's menu session
//!
//! A viewer's session sits behind its own lock so menu work for one viewer
//! never waits on another.

use crate::menu::MenuNavigator;
use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const VIEWER_TIMEOUT: Duration = Duration::from_secs(15);

/// Menu state of one viewer
#[derive(Default)]
pub struct ViewerSession {
    /// Empty while the viewer is not browsing
    pub navigator: Option<MenuNavigator>,
    /// Numbering for the next navigator, kept across close and re-open
    pub next_menu_id: u32,
}

pub type SessionSlot = Arc<Mutex<ViewerSession>>;

/// A connected viewer
pub struct Viewer {
    /// Unique viewer identifier assigned by the host
    pub id: u32,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this viewer
    pub last_seen: Instant,
    pub session: SessionSlot,
}

impl Viewer {
    pub fn new(id: u32, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            session: Arc::default(),
        }
    }

    /// Returns true if nothing was heard from the viewer within `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected viewers
///
/// Viewer ids start at 1 and are never reused within one host run.
pub struct ViewerManager {
    viewers: HashMap<u32, Viewer>,
    next_viewer_id: u32,
    max_viewers: usize,
}

impl ViewerManager {
    pub fn new(max_viewers: usize) -> Self {
        Self {
            viewers: HashMap::new(),
            next_viewer_id: 1,
            max_viewers,
        }
    }

    /// Returns the new viewer id, or None when the host is full
    pub fn add_viewer(&mut self, addr: SocketAddr) -> Option<u32> {
        if self.viewers.len() >= self.max_viewers {
            return None;
        }

        let viewer_id = self.next_viewer_id;
        self.next_viewer_id += 1;

        info!("Viewer {} connected from {}", viewer_id, addr);
        self.viewers.insert(viewer_id, Viewer::new(viewer_id, addr));

        Some(viewer_id)
    }

    /// Removes a viewer together with its menu session
    pub fn remove_viewer(&mut self, viewer_id: &u32) -> bool {
        if let Some(viewer) = self.viewers.remove(viewer_id) {
            info!("Viewer {} disconnected", viewer.id);
            true
        } else {
            false
        }
    }

    pub fn find_viewer_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.viewers
            .iter()
            .find(|(_, viewer)| viewer.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Marks the viewer as alive. Returns false for unknown ids.
    pub fn touch(&mut self, viewer_id: u32) -> bool {
        if let Some(viewer) = self.viewers.get_mut(&viewer_id) {
            viewer.last_seen = Instant::now();
            true
        } else {
            false
        }
    }

    pub fn session(&self, viewer_id: u32) -> Option<SessionSlot> {
        self.viewers
            .get(&viewer_id)
            .map(|viewer| Arc::clone(&viewer.session))
    }

    /// Removes viewers that have been silent longer than [`VIEWER_TIMEOUT`]
    /// and returns their ids
    pub fn check_timeouts(&mut self) -> Vec<u32> {
        self.remove_silent(VIEWER_TIMEOUT)
    }

    fn remove_silent(&mut self, timeout: Duration) -> Vec<u32> {
        let timed_out: Vec<u32> = self
            .viewers
            .iter()
            .filter(|(_, viewer)| viewer.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for viewer_id in &timed_out {
            self.remove_viewer(viewer_id);
        }

        timed_out
    }

    /// All viewer ids with their addresses, for broadcasting
    pub fn get_viewer_addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.viewers
            .iter()
            .map(|(id, viewer)| (*id, viewer.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.viewers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.viewers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    #[test]
    fn test_viewer_creation() {
        let addr = test_addr();
        let viewer = Viewer::new(1, addr);

        assert_eq!(viewer.id, 1);
        assert_eq!(viewer.addr, addr);
        assert!(viewer.session.try_lock().unwrap().navigator.is_none());
    }

    #[test]
    fn test_viewer_timeout() {
        let mut viewer = Viewer::new(1, test_addr());

        assert!(!viewer.is_timed_out(Duration::from_secs(1)));

        viewer.last_seen = Instant::now() - Duration::from_secs(2);

        assert!(viewer.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_viewer_manager_creation() {
        let manager = ViewerManager::new(5);
        assert_eq!(manager.max_viewers, 5);
        assert!(manager.is_empty());
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_add_multiple_viewers() {
        let mut manager = ViewerManager::new(3);

        let viewer_id1 = manager.add_viewer(test_addr()).unwrap();
        let viewer_id2 = manager.add_viewer(test_addr2()).unwrap();

        assert_eq!(viewer_id1, 1);
        assert_eq!(viewer_id2, 2);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_add_viewer_max_capacity() {
        let mut manager = ViewerManager::new(1);

        assert!(manager.add_viewer(test_addr()).is_some());
        assert!(manager.add_viewer(test_addr2()).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_viewer() {
        let mut manager = ViewerManager::new(2);
        let viewer_id = manager.add_viewer(test_addr()).unwrap();

        assert!(manager.remove_viewer(&viewer_id));
        assert!(manager.is_empty());
        assert!(!manager.remove_viewer(&viewer_id));
        assert!(manager.session(viewer_id).is_none());
    }

    #[test]
    fn test_find_viewer_by_addr() {
        let mut manager = ViewerManager::new(2);
        let viewer_id1 = manager.add_viewer(test_addr()).unwrap();
        let _viewer_id2 = manager.add_viewer(test_addr2()).unwrap();

        assert_eq!(manager.find_viewer_by_addr(test_addr()), Some(viewer_id1));

        let unknown_addr: SocketAddr = "192.168.1.1:9999".parse().unwrap();
        assert_eq!(manager.find_viewer_by_addr(unknown_addr), None);
    }

    #[test]
    fn test_sessions_are_per_viewer() {
        let mut manager = ViewerManager::new(2);
        let viewer_id1 = manager.add_viewer(test_addr()).unwrap();
        let viewer_id2 = manager.add_viewer(test_addr2()).unwrap();

        let first = manager.session(viewer_id1).unwrap();
        let second = manager.session(viewer_id2).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));

        // Holding one viewer's session does not block the other
        let _guard = first.try_lock().unwrap();
        assert!(second.try_lock().is_ok());
    }

    #[test]
    fn test_silent_viewers_removed() {
        let mut manager = ViewerManager::new(2);
        let viewer_id1 = manager.add_viewer(test_addr()).unwrap();
        let viewer_id2 = manager.add_viewer(test_addr2()).unwrap();

        manager.viewers.get_mut(&viewer_id1).unwrap().last_seen =
            Instant::now() - Duration::from_secs(20);

        assert_eq!(manager.check_timeouts(), vec![viewer_id1]);
        assert_eq!(manager.len(), 1);
        assert!(manager.touch(viewer_id2));
        assert!(!manager.touch(viewer_id1));
    }
}
