//! SQLite-backed gateway and catalog
//!
//! Users and songs are upserted by id (latest write wins); ratings are
//! append-only and training reads the latest value per (user, song) pair.

use super::{CatalogResolver, DataGateway};
use crate::error::RecError;
use crate::outcome::{AsyncOutcome, Outcome};
use crate::types::{Rating, Song, SongId, SongSummary, User, UserId};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct SqliteGateway {
    pool: SqlitePool,
}

impl SqliteGateway {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl DataGateway for SqliteGateway {
    fn append_user(&self, user: User) -> AsyncOutcome<()> {
        let pool = self.pool.clone();
        AsyncOutcome::from_future(async move { save_user(&pool, &user).await })
    }

    fn append_song(&self, song: Song) -> AsyncOutcome<()> {
        let pool = self.pool.clone();
        AsyncOutcome::from_future(async move { save_song(&pool, &song).await })
    }

    fn append_rating(&self, rating: Rating) -> AsyncOutcome<()> {
        let pool = self.pool.clone();
        AsyncOutcome::from_future(async move { save_rating(&pool, &rating).await })
    }

    fn read_ratings_for_training(&self) -> AsyncOutcome<Vec<Rating>> {
        let pool = self.pool.clone();
        AsyncOutcome::from_future(async move { load_latest_ratings(&pool).await })
    }
}

impl CatalogResolver for SqliteGateway {
    fn resolve_user(&self, user_id: UserId) -> AsyncOutcome<Option<User>> {
        let pool = self.pool.clone();
        AsyncOutcome::from_future(async move { load_user(&pool, user_id).await })
    }

    fn resolve_songs(&self, song_ids: &[SongId]) -> AsyncOutcome<Vec<SongSummary>> {
        let pool = self.pool.clone();
        let song_ids = song_ids.to_vec();
        AsyncOutcome::from_future(async move { load_song_summaries(&pool, &song_ids).await })
    }
}

async fn save_user(pool: &SqlitePool, user: &User) -> Outcome<()> {
    sqlx::query(
        r#"
        INSERT INTO users (id, locale, segment, created_at, updated_at)
        VALUES (?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        ON CONFLICT(id) DO UPDATE SET
            locale = excluded.locale,
            segment = excluded.segment,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(user.id)
    .bind(&user.locale)
    .bind(&user.segment)
    .execute(pool)
    .await?;

    Ok(())
}

async fn save_song(pool: &SqlitePool, song: &Song) -> Outcome<()> {
    let tags = serde_json::to_string(&song.tags).map_err(RecError::underlying)?;

    sqlx::query(
        r#"
        INSERT INTO songs (id, title, artist, album, tags, duration_secs, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            artist = excluded.artist,
            album = excluded.album,
            tags = excluded.tags,
            duration_secs = excluded.duration_secs,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(song.id)
    .bind(&song.title)
    .bind(&song.artist)
    .bind(&song.album)
    .bind(tags)
    .bind(song.duration_secs)
    .execute(pool)
    .await?;

    Ok(())
}

async fn save_rating(pool: &SqlitePool, rating: &Rating) -> Outcome<()> {
    sqlx::query("INSERT INTO ratings (user_id, song_id, value) VALUES (?, ?, ?)")
        .bind(rating.user_id)
        .bind(rating.song_id)
        .bind(f64::from(rating.value))
        .execute(pool)
        .await?;

    Ok(())
}

async fn load_latest_ratings(pool: &SqlitePool) -> Outcome<Vec<Rating>> {
    let rows = sqlx::query(
        r#"
        SELECT r.user_id, r.song_id, r.value
        FROM ratings r
        JOIN (
            SELECT MAX(seq) AS seq
            FROM ratings
            GROUP BY user_id, song_id
        ) latest ON r.seq = latest.seq
        ORDER BY r.seq
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| Rating {
            user_id: row.get("user_id"),
            song_id: row.get("song_id"),
            value: row.get::<f64, _>("value") as f32,
        })
        .collect())
}

async fn load_user(pool: &SqlitePool, user_id: UserId) -> Outcome<Option<User>> {
    let row = sqlx::query("SELECT id, locale, segment FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| User {
        id: row.get("id"),
        locale: row.get("locale"),
        segment: row.get("segment"),
    }))
}

async fn load_song_summaries(pool: &SqlitePool, song_ids: &[SongId]) -> Outcome<Vec<SongSummary>> {
    if song_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut query: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT id, title, artist, tags FROM songs WHERE id IN (");
    let mut ids = query.separated(", ");
    for id in song_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated(")");

    let rows = query.build().fetch_all(pool).await?;

    let mut by_id = HashMap::with_capacity(rows.len());
    for row in rows {
        let tags: String = row.get("tags");
        let summary = SongSummary {
            id: row.get("id"),
            title: row.get("title"),
            artist: row.get("artist"),
            tags: serde_json::from_str(&tags).map_err(RecError::underlying)?,
        };
        by_id.insert(summary.id, summary);
    }

    Ok(song_ids.iter().filter_map(|id| by_id.remove(id)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wkmp_common::db::init_memory_database;

    async fn gateway() -> SqliteGateway {
        SqliteGateway::new(init_memory_database().await.unwrap())
    }

    fn song(id: SongId, title: &str) -> Song {
        Song {
            id,
            title: title.to_string(),
            artist: "Test Artist".to_string(),
            album: None,
            tags: vec!["jazz".to_string()],
            duration_secs: 180.0,
        }
    }

    #[tokio::test]
    async fn user_roundtrip_and_upsert() {
        let gateway = gateway().await;
        let user = User {
            id: 1,
            locale: Some("en-GB".to_string()),
            segment: "free".to_string(),
        };
        gateway.append_user(user.clone()).await.unwrap();
        assert_eq!(gateway.resolve_user(1).await.unwrap(), Some(user));

        let upgraded = User {
            id: 1,
            locale: None,
            segment: "premium".to_string(),
        };
        gateway.append_user(upgraded.clone()).await.unwrap();
        assert_eq!(gateway.resolve_user(1).await.unwrap(), Some(upgraded));

        assert_eq!(gateway.resolve_user(2).await.unwrap(), None);
    }

    #[tokio::test]
    async fn resolve_songs_keeps_request_order_and_drops_unknown() {
        let gateway = gateway().await;
        for (id, title) in [(1, "One"), (2, "Two"), (3, "Three")] {
            gateway.append_song(song(id, title)).await.unwrap();
        }

        let summaries = gateway.resolve_songs(&[3, 99, 1]).await.unwrap();
        let ids: Vec<SongId> = summaries.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(summaries[0].tags, vec!["jazz".to_string()]);

        assert!(gateway.resolve_songs(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn training_read_returns_latest_rating_per_pair() {
        let gateway = gateway().await;
        gateway.append_rating(Rating::new(1, 10, 2.0)).await.unwrap();
        gateway.append_rating(Rating::new(1, 11, 4.0)).await.unwrap();
        gateway.append_rating(Rating::new(1, 10, 5.0)).await.unwrap();

        let ratings = gateway.read_ratings_for_training().await.unwrap();
        assert_eq!(
            ratings,
            vec![Rating::new(1, 11, 4.0), Rating::new(1, 10, 5.0)]
        );
    }
}
