//! Test Helper Utilities
//!
//! Shared fixtures for wkmp-rec integration tests: a scripted engine, a
//! counting gateway and catalog seeding.

#![allow(dead_code)]

use chrono::Utc;
use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use wkmp_rec::diagnostics::DiagnosticsHub;
use wkmp_rec::engine::{ModelEngine, ModelSnapshot, RecModel};
use wkmp_rec::error::RecError;
use wkmp_rec::gateway::{DataGateway, MemoryGateway};
use wkmp_rec::outcome::AsyncOutcome;
use wkmp_rec::service::{SupervisorHandle, SupervisorStatus};
use wkmp_rec::types::{Rating, Song, SongId, User, UserId};
use wkmp_rec::RecContext;

/// Ranks the same song ids for every user
#[derive(Debug)]
pub struct FixedRankModel {
    ranking: Vec<SongId>,
}

impl RecModel for FixedRankModel {
    fn recommend(&self, _user_id: UserId, count: usize) -> anyhow::Result<Vec<SongId>> {
        Ok(self.ranking.iter().copied().take(count).collect())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Engine with injectable failures and call counters
pub struct ScriptedEngine {
    ranking: Vec<SongId>,
    fail_load: AtomicBool,
    fail_train: AtomicBool,
    fail_persist: AtomicBool,
    train_delay: Duration,
    pub loads: AtomicUsize,
    pub trains: AtomicUsize,
    pub persists: AtomicUsize,
}

impl ScriptedEngine {
    /// Nothing persisted: every load fails
    pub fn empty(ranking: Vec<SongId>) -> Self {
        Self {
            ranking,
            fail_load: AtomicBool::new(true),
            fail_train: AtomicBool::new(false),
            fail_persist: AtomicBool::new(false),
            train_delay: Duration::ZERO,
            loads: AtomicUsize::new(0),
            trains: AtomicUsize::new(0),
            persists: AtomicUsize::new(0),
        }
    }

    /// A persisted model exists: loads succeed
    pub fn with_persisted_model(ranking: Vec<SongId>) -> Self {
        let engine = Self::empty(ranking);
        engine.fail_load.store(false, Ordering::SeqCst);
        engine
    }

    pub fn with_train_delay(mut self, delay: Duration) -> Self {
        self.train_delay = delay;
        self
    }

    pub fn with_failing_persists(self) -> Self {
        self.fail_persist.store(true, Ordering::SeqCst);
        self
    }

    /// Make subsequent trains fail (or succeed again)
    pub fn set_train_failure(&self, fail: bool) {
        self.fail_train.store(fail, Ordering::SeqCst);
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn trains(&self) -> usize {
        self.trains.load(Ordering::SeqCst)
    }

    pub fn persists(&self) -> usize {
        self.persists.load(Ordering::SeqCst)
    }

    fn snapshot(&self) -> ModelSnapshot {
        ModelSnapshot::new(
            FixedRankModel {
                ranking: self.ranking.clone(),
            },
            Uuid::new_v4(),
            Utc::now(),
        )
    }
}

impl ModelEngine for ScriptedEngine {
    fn train(&self, _ratings: &[Rating]) -> anyhow::Result<ModelSnapshot> {
        self.trains.fetch_add(1, Ordering::SeqCst);
        if !self.train_delay.is_zero() {
            std::thread::sleep(self.train_delay);
        }
        if self.fail_train.load(Ordering::SeqCst) {
            anyhow::bail!("simulated training failure");
        }
        Ok(self.snapshot())
    }

    fn load_latest(&self) -> anyhow::Result<ModelSnapshot> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_load.load(Ordering::SeqCst) {
            anyhow::bail!("simulated load failure");
        }
        Ok(self.snapshot())
    }

    fn persist(&self, _model: &ModelSnapshot) -> anyhow::Result<()> {
        self.persists.fetch_add(1, Ordering::SeqCst);
        if self.fail_persist.load(Ordering::SeqCst) {
            anyhow::bail!("simulated disk failure");
        }
        Ok(())
    }
}

/// Gateway counting appends per kind, optionally failing rating appends
pub struct CountingGateway {
    inner: Arc<MemoryGateway>,
    fail_ratings: bool,
    pub users: AtomicUsize,
    pub songs: AtomicUsize,
    pub ratings: AtomicUsize,
}

impl CountingGateway {
    pub fn new(inner: Arc<MemoryGateway>) -> Self {
        Self {
            inner,
            fail_ratings: false,
            users: AtomicUsize::new(0),
            songs: AtomicUsize::new(0),
            ratings: AtomicUsize::new(0),
        }
    }

    pub fn failing_ratings(inner: Arc<MemoryGateway>) -> Self {
        Self {
            fail_ratings: true,
            ..Self::new(inner)
        }
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

impl DataGateway for CountingGateway {
    fn append_user(&self, user: User) -> AsyncOutcome<()> {
        self.users.fetch_add(1, Ordering::SeqCst);
        self.inner.append_user(user)
    }

    fn append_song(&self, song: Song) -> AsyncOutcome<()> {
        self.songs.fetch_add(1, Ordering::SeqCst);
        self.inner.append_song(song)
    }

    fn append_rating(&self, rating: Rating) -> AsyncOutcome<()> {
        self.ratings.fetch_add(1, Ordering::SeqCst);
        if self.fail_ratings {
            return AsyncOutcome::failed(RecError::underlying(anyhow::anyhow!(
                "simulated storage failure"
            )));
        }
        self.inner.append_rating(rating)
    }

    fn read_ratings_for_training(&self) -> AsyncOutcome<Vec<Rating>> {
        self.inner.read_ratings_for_training()
    }
}

pub fn user(id: UserId) -> User {
    User {
        id,
        locale: Some("en-US".to_string()),
        segment: "free".to_string(),
    }
}

pub fn song(id: SongId) -> Song {
    Song {
        id,
        title: format!("Song {id}"),
        artist: format!("Artist {}", id % 3),
        album: None,
        tags: vec!["rock".to_string()],
        duration_secs: 180.0 + id as f64,
    }
}

/// Store with users `1..=users` and songs `1..=songs`
pub async fn seeded_store(users: i64, songs: i64) -> Arc<MemoryGateway> {
    let store = Arc::new(MemoryGateway::new());
    for id in 1..=users {
        store.append_user(user(id)).await.unwrap();
    }
    for id in 1..=songs {
        store.append_song(song(id)).await.unwrap();
    }
    store
}

pub fn context(
    store: Arc<MemoryGateway>,
    engine: Arc<ScriptedEngine>,
    diagnostics: Arc<DiagnosticsHub>,
) -> RecContext {
    RecContext::in_memory(store, engine, diagnostics)
}

/// Poll until the supervisor holds a model
pub async fn wait_for_model(supervisor: &SupervisorHandle) -> ModelSnapshot {
    for _ in 0..300 {
        if let Some(model) = supervisor.latest_model().await.unwrap() {
            return model;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("supervisor never installed a model");
}

/// Poll until no model task and no slave is in flight
pub async fn wait_for_idle(supervisor: &SupervisorHandle) -> SupervisorStatus {
    for _ in 0..300 {
        let status = supervisor.status().await.unwrap();
        if status.workers_in_flight == 0 && !status.model_task_in_flight {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("supervisor never drained its workers");
}

/// Poll until `condition` holds or give up after ~3 s
pub async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..300 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
