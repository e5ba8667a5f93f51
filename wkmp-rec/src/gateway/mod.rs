//! Data-access boundary
//!
//! [`DataGateway`] appends training data and reads it back for training;
//! [`CatalogResolver`] turns ids into descriptive records for serving. Both
//! return [`AsyncOutcome`]s so callers never block on storage.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryGateway;
pub use sqlite::SqliteGateway;

use crate::outcome::AsyncOutcome;
use crate::types::{Rating, Song, SongId, SongSummary, User, UserId};

pub trait DataGateway: Send + Sync {
    fn append_user(&self, user: User) -> AsyncOutcome<()>;

    fn append_song(&self, song: Song) -> AsyncOutcome<()>;

    fn append_rating(&self, rating: Rating) -> AsyncOutcome<()>;

    /// Latest rating per (user, song) pair
    fn read_ratings_for_training(&self) -> AsyncOutcome<Vec<Rating>>;
}

pub trait CatalogResolver: Send + Sync {
    fn resolve_user(&self, user_id: UserId) -> AsyncOutcome<Option<User>>;

    /// Summaries for the known ids among `song_ids`, in request order
    ///
    /// Unknown ids are silently left out.
    fn resolve_songs(&self, song_ids: &[SongId]) -> AsyncOutcome<Vec<SongSummary>>;
}
