//! In-memory gateway and catalog
//!
//! Same semantics as the SQLite gateway, kept in process. Used for
//! `--in-memory` runs and tests.

use super::{CatalogResolver, DataGateway};
use crate::error::RecError;
use crate::outcome::{AsyncOutcome, Outcome};
use crate::types::{Rating, Song, SongId, SongSummary, User, UserId};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
pub struct MemoryGateway {
    users: RwLock<HashMap<UserId, User>>,
    songs: RwLock<HashMap<SongId, Song>>,
    ratings: RwLock<Vec<Rating>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_count(&self) -> usize {
        self.users.read().map(|users| users.len()).unwrap_or(0)
    }

    pub fn song_count(&self) -> usize {
        self.songs.read().map(|songs| songs.len()).unwrap_or(0)
    }

    /// Appended ratings, including superseded ones
    pub fn rating_count(&self) -> usize {
        self.ratings.read().map(|ratings| ratings.len()).unwrap_or(0)
    }

    fn insert_user(&self, user: User) -> Outcome<()> {
        write(&self.users)?.insert(user.id, user);
        Ok(())
    }

    fn insert_song(&self, song: Song) -> Outcome<()> {
        write(&self.songs)?.insert(song.id, song);
        Ok(())
    }

    fn insert_rating(&self, rating: Rating) -> Outcome<()> {
        write(&self.ratings)?.push(rating);
        Ok(())
    }

    fn latest_ratings(&self) -> Outcome<Vec<Rating>> {
        let ratings = read(&self.ratings)?;

        let mut latest: HashMap<(UserId, SongId), usize> = HashMap::new();
        for (position, rating) in ratings.iter().enumerate() {
            latest.insert((rating.user_id, rating.song_id), position);
        }

        let mut positions: Vec<usize> = latest.into_values().collect();
        positions.sort_unstable();
        Ok(positions.into_iter().map(|p| ratings[p]).collect())
    }

    fn user(&self, user_id: UserId) -> Outcome<Option<User>> {
        Ok(read(&self.users)?.get(&user_id).cloned())
    }

    fn summaries(&self, song_ids: &[SongId]) -> Outcome<Vec<SongSummary>> {
        let songs = read(&self.songs)?;
        Ok(song_ids
            .iter()
            .filter_map(|id| songs.get(id).map(Song::summary))
            .collect())
    }
}

fn read<T>(lock: &RwLock<T>) -> Outcome<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| RecError::underlying(anyhow::anyhow!("memory store lock poisoned")))
}

fn write<T>(lock: &RwLock<T>) -> Outcome<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| RecError::underlying(anyhow::anyhow!("memory store lock poisoned")))
}

impl DataGateway for MemoryGateway {
    fn append_user(&self, user: User) -> AsyncOutcome<()> {
        AsyncOutcome::ready(self.insert_user(user))
    }

    fn append_song(&self, song: Song) -> AsyncOutcome<()> {
        AsyncOutcome::ready(self.insert_song(song))
    }

    fn append_rating(&self, rating: Rating) -> AsyncOutcome<()> {
        AsyncOutcome::ready(self.insert_rating(rating))
    }

    fn read_ratings_for_training(&self) -> AsyncOutcome<Vec<Rating>> {
        AsyncOutcome::ready(self.latest_ratings())
    }
}

impl CatalogResolver for MemoryGateway {
    fn resolve_user(&self, user_id: UserId) -> AsyncOutcome<Option<User>> {
        AsyncOutcome::ready(self.user(user_id))
    }

    fn resolve_songs(&self, song_ids: &[SongId]) -> AsyncOutcome<Vec<SongSummary>> {
        AsyncOutcome::ready(self.summaries(song_ids))
    }
}
