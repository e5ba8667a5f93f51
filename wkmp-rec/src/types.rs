//! Records and request/response types

use crate::error::RecError;
use crate::outcome::{Outcome, OutcomeExt};
use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type SongId = i64;

/// Songs returned when a request does not specify a count
pub const DEFAULT_RECOMMENDATION_COUNT: usize = 10;

/// Listener record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub locale: Option<String>,
    /// Categorical attribute (subscription tier, cohort, ...)
    #[serde(default)]
    pub segment: String,
}

/// Catalog record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: SongId,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub duration_secs: f64,
}

impl Song {
    pub fn summary(&self) -> SongSummary {
        SongSummary {
            id: self.id,
            title: self.title.clone(),
            artist: self.artist.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// Descriptive song record handed back to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongSummary {
    pub id: SongId,
    pub title: String,
    pub artist: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub song_id: SongId,
    pub value: f32,
}

impl Rating {
    pub fn new(user_id: UserId, song_id: SongId, value: f32) -> Self {
        Self {
            user_id,
            song_id,
            value,
        }
    }
}

/// Training-data mutation forwarded by the supervisor to a slave worker
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    AddUser(User),
    AddSong(Song),
    AddRating(Rating),
}

impl Mutation {
    pub fn kind(&self) -> &'static str {
        match self {
            Mutation::AddUser(_) => "user",
            Mutation::AddSong(_) => "song",
            Mutation::AddRating(_) => "rating",
        }
    }

    /// Id of the primary entity (the user for ratings)
    pub fn entity_id(&self) -> i64 {
        match self {
            Mutation::AddUser(user) => user.id,
            Mutation::AddSong(song) => song.id,
            Mutation::AddRating(rating) => rating.user_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub user_id: UserId,
    pub count: usize,
}

impl RecommendationRequest {
    /// Validated request; `count` must be positive
    pub fn new(user_id: UserId, count: usize) -> Outcome<Self> {
        let request: Outcome<Self> = Ok(Self { user_id, count });
        request.filter_or(
            |request| request.count > 0,
            |_| RecError::InvalidRequest("count must be a positive integer".to_string()),
        )
    }

    /// Request with [`DEFAULT_RECOMMENDATION_COUNT`]
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id,
            count: DEFAULT_RECOMMENDATION_COUNT,
        }
    }
}

/// Ranked songs for one user, at most `count` long
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub user_id: UserId,
    pub songs: Vec<SongSummary>,
}
