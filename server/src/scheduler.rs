//! Periodic advertisement of directory servers
//!
//! One scheduler lives for one configuration generation. Reloading replaces
//! it, which also resets the round-robin position and picks up a new
//! interval.

use crate::config::Snapshot;
use crate::error::DirectoryError;
use crate::lang;
use crate::resolver::{resolve_connect_address, QueryResolver};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Fire-and-forget delivery of one line to every connected viewer
pub trait Broadcaster: Send + Sync {
    fn broadcast(&self, text: String);
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Broadcast { index: usize, message: String },
    EmptyDirectory,
    Unavailable { index: usize },
}

pub struct AdvertisementScheduler {
    snapshot: Arc<Snapshot>,
    resolver: QueryResolver,
    last_index: Option<usize>,
    rng: StdRng,
}

impl AdvertisementScheduler {
    pub fn new(snapshot: Arc<Snapshot>, resolver: QueryResolver) -> Self {
        Self {
            snapshot,
            resolver,
            last_index: None,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic random selection, for tests
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn last_index(&self) -> Option<usize> {
        self.last_index
    }

    /// Round-robin after the last pick when ordered, uniform otherwise.
    /// Returns `None` without touching any state when `count` is zero.
    pub fn select_next(&mut self, count: usize) -> Option<usize> {
        if count == 0 {
            return None;
        }

        let index = if self.snapshot.settings.ordered_advertisement {
            self.last_index.map_or(0, |last| (last + 1) % count)
        } else {
            self.rng.gen_range(0..count)
        };
        self.last_index = Some(index);
        Some(index)
    }

    /// One select, query and broadcast cycle. A failed query is not retried.
    pub async fn tick(&mut self, broadcaster: &dyn Broadcaster) -> TickOutcome {
        let snapshot = Arc::clone(&self.snapshot);
        let servers = snapshot.directory.all_servers();

        let Some(index) = self.select_next(servers.len()) else {
            debug!("Skipping advertisement: {}", DirectoryError::EmptyDirectory);
            return TickOutcome::EmptyDirectory;
        };

        let (mode, server) = servers[index];
        match self.resolver.fetch_info(server).await {
            Some(info) => {
                let message = lang::chat_advertisement(&info, resolve_connect_address(server));
                debug!("Advertising {mode}.{} (index {index})", server.key);
                broadcaster.broadcast(message.clone());
                TickOutcome::Broadcast { index, message }
            }
            None => TickOutcome::Unavailable { index },
        }
    }

    /// Ticks every advertisement interval until the task is aborted. The first
    /// advertisement goes out one full interval after start.
    pub async fn run(mut self, broadcaster: Arc<dyn Broadcaster>) {
        let period = self.snapshot.settings.advertise_interval;
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Advertisement scheduler started for generation {} ({:.1}s, {})",
            self.snapshot.generation,
            period.as_secs_f32(),
            if self.snapshot.settings.ordered_advertisement {
                "ordered"
            } else {
                "random"
            }
        );

        loop {
            interval.tick().await;
            let outcome = self.tick(broadcaster.as_ref()).await;
            debug!("Advertisement tick: {:?}", outcome);
        }
    }
}
