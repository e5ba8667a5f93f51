//! Biased matrix factorization trained with stochastic gradient descent
//!
//! Prediction for a (user, song) pair is
//! `global_mean + user_bias + song_bias + <user_factors, song_factors>`.
//! Users the model never saw are served by song bias alone, which ranks songs
//! by how well they were rated overall.
//!
//! Models are persisted as `model-<unix ms>-<model id>.json` under the model
//! directory; the zero-padded timestamp makes lexical order chronological.

use super::{ModelEngine, ModelSnapshot, RecModel};
use crate::types::{Rating, SongId, UserId};
use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// Hyper-parameters for [`FactorizationModel::fit`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Latent dimensions per user/song
    #[serde(default = "default_factors")]
    pub factors: usize,
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,
    #[serde(default = "default_regularization")]
    pub regularization: f32,
    /// Seed for factor initialisation and epoch shuffling
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_factors() -> usize {
    16
}

fn default_epochs() -> usize {
    40
}

fn default_learning_rate() -> f32 {
    0.01
}

fn default_regularization() -> f32 {
    0.05
}

fn default_seed() -> u64 {
    42
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            factors: default_factors(),
            epochs: default_epochs(),
            learning_rate: default_learning_rate(),
            regularization: default_regularization(),
            seed: default_seed(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorizationModel {
    global_mean: f32,
    user_factors: HashMap<UserId, Vec<f32>>,
    user_bias: HashMap<UserId, f32>,
    song_factors: HashMap<SongId, Vec<f32>>,
    song_bias: HashMap<SongId, f32>,
    /// Songs each user already rated; never recommended back to them
    rated: HashMap<UserId, HashSet<SongId>>,
}

impl FactorizationModel {
    /// Train on `ratings`; non-finite values are skipped
    pub fn fit(ratings: &[Rating], config: &TrainingConfig) -> Self {
        let mut user_index: HashMap<UserId, usize> = HashMap::new();
        let mut song_index: HashMap<SongId, usize> = HashMap::new();
        let mut users: Vec<UserId> = Vec::new();
        let mut songs: Vec<SongId> = Vec::new();
        let mut observations: Vec<(usize, usize, f32)> = Vec::with_capacity(ratings.len());
        let mut rated: HashMap<UserId, HashSet<SongId>> = HashMap::new();

        for rating in ratings.iter().filter(|r| r.value.is_finite()) {
            let u = *user_index.entry(rating.user_id).or_insert_with(|| {
                users.push(rating.user_id);
                users.len() - 1
            });
            let s = *song_index.entry(rating.song_id).or_insert_with(|| {
                songs.push(rating.song_id);
                songs.len() - 1
            });
            observations.push((u, s, rating.value));
            rated.entry(rating.user_id).or_default().insert(rating.song_id);
        }

        let global_mean = if observations.is_empty() {
            0.0
        } else {
            observations.iter().map(|(_, _, v)| v).sum::<f32>() / observations.len() as f32
        };

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut p: Vec<Vec<f32>> = (0..users.len())
            .map(|_| init_factors(&mut rng, config.factors))
            .collect();
        let mut q: Vec<Vec<f32>> = (0..songs.len())
            .map(|_| init_factors(&mut rng, config.factors))
            .collect();
        let mut bu = vec![0.0f32; users.len()];
        let mut bi = vec![0.0f32; songs.len()];

        let lr = config.learning_rate;
        let reg = config.regularization;
        let mut squared_error = 0.0f32;

        for _ in 0..config.epochs {
            observations.shuffle(&mut rng);
            squared_error = 0.0;

            for &(u, s, value) in &observations {
                let err = value - (global_mean + bu[u] + bi[s] + dot(&p[u], &q[s]));
                squared_error += err * err;

                bu[u] += lr * (err - reg * bu[u]);
                bi[s] += lr * (err - reg * bi[s]);

                for (pu, qi) in p[u].iter_mut().zip(q[s].iter_mut()) {
                    let (pu_old, qi_old) = (*pu, *qi);
                    *pu += lr * (err * qi_old - reg * pu_old);
                    *qi += lr * (err * pu_old - reg * qi_old);
                }
            }
        }

        if !observations.is_empty() {
            debug!(
                rmse = (squared_error / observations.len() as f32).sqrt(),
                epochs = config.epochs,
                "Final training epoch error"
            );
        }

        Self {
            global_mean,
            user_factors: users.iter().copied().zip(p).collect(),
            user_bias: users.iter().copied().zip(bu).collect(),
            song_factors: songs.iter().copied().zip(q).collect(),
            song_bias: songs.into_iter().zip(bi).collect(),
            rated,
        }
    }

    pub fn user_count(&self) -> usize {
        self.user_factors.len()
    }

    pub fn song_count(&self) -> usize {
        self.song_bias.len()
    }

    fn score(&self, user_id: UserId, song_id: SongId, song_bias: f32) -> f32 {
        match self.user_factors.get(&user_id) {
            Some(user_factors) => {
                let user_bias = self.user_bias.get(&user_id).copied().unwrap_or(0.0);
                let interaction = self
                    .song_factors
                    .get(&song_id)
                    .map_or(0.0, |song_factors| dot(user_factors, song_factors));
                self.global_mean + user_bias + song_bias + interaction
            }
            None => song_bias,
        }
    }
}

impl RecModel for FactorizationModel {
    fn recommend(&self, user_id: UserId, count: usize) -> anyhow::Result<Vec<SongId>> {
        let already_rated = self.rated.get(&user_id);

        let mut scored: Vec<(SongId, f32)> = self
            .song_bias
            .iter()
            .filter(|(song_id, _)| already_rated.map_or(true, |rated| !rated.contains(*song_id)))
            .map(|(&song_id, &bias)| (song_id, self.score(user_id, song_id, bias)))
            .collect();

        // Ties broken by id so rankings are deterministic
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        Ok(scored.into_iter().take(count).map(|(id, _)| id).collect())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn init_factors(rng: &mut StdRng, factors: usize) -> Vec<f32> {
    (0..factors).map(|_| rng.gen_range(-0.05..0.05)).collect()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[derive(Deserialize)]
struct PersistedModel {
    model_id: Uuid,
    trained_at: DateTime<Utc>,
    model: FactorizationModel,
}

#[derive(Serialize)]
struct PersistedModelRef<'a> {
    model_id: Uuid,
    trained_at: DateTime<Utc>,
    model: &'a FactorizationModel,
}

/// [`ModelEngine`] backed by [`FactorizationModel`] and JSON files
pub struct FactorizationEngine {
    model_dir: PathBuf,
    config: TrainingConfig,
}

impl FactorizationEngine {
    pub fn new(model_dir: impl Into<PathBuf>, config: TrainingConfig) -> Self {
        Self {
            model_dir: model_dir.into(),
            config,
        }
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Persisted model files, oldest first
    fn model_files(&self) -> anyhow::Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.model_dir)
            .with_context(|| format!("reading model directory {}", self.model_dir.display()))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if is_model_file(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

fn model_file_name(model: &ModelSnapshot) -> String {
    format!(
        "model-{:013}-{}.json",
        model.trained_at().timestamp_millis(),
        model.model_id()
    )
}

fn is_model_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with("model-") && name.ends_with(".json"))
}

impl ModelEngine for FactorizationEngine {
    fn train(&self, ratings: &[Rating]) -> anyhow::Result<ModelSnapshot> {
        let started = Instant::now();
        let model = FactorizationModel::fit(ratings, &self.config);

        info!(
            ratings = ratings.len(),
            users = model.user_count(),
            songs = model.song_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Trained factorization model"
        );

        Ok(ModelSnapshot::new(model, Uuid::new_v4(), Utc::now()))
    }

    fn load_latest(&self) -> anyhow::Result<ModelSnapshot> {
        let files = self.model_files()?;
        let Some(latest) = files.last() else {
            bail!("no persisted model in {}", self.model_dir.display());
        };

        let bytes = std::fs::read(latest).with_context(|| format!("reading {}", latest.display()))?;
        let persisted: PersistedModel = serde_json::from_slice(&bytes)
            .with_context(|| format!("decoding {}", latest.display()))?;

        info!(
            model_id = %persisted.model_id,
            path = %latest.display(),
            "Loaded persisted model"
        );

        Ok(ModelSnapshot::new(
            persisted.model,
            persisted.model_id,
            persisted.trained_at,
        ))
    }

    fn persist(&self, model: &ModelSnapshot) -> anyhow::Result<()> {
        let concrete = model
            .downcast_ref::<FactorizationModel>()
            .context("model was not produced by the factorization engine")?;

        std::fs::create_dir_all(&self.model_dir)
            .with_context(|| format!("creating model directory {}", self.model_dir.display()))?;

        let path = self.model_dir.join(model_file_name(model));
        let tmp_path = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec(&PersistedModelRef {
            model_id: model.model_id(),
            trained_at: model.trained_at(),
            model: concrete,
        })?;

        // Write-then-rename so load_latest never sees a half-written file
        std::fs::write(&tmp_path, bytes)
            .with_context(|| format!("writing {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &path)
            .with_context(|| format!("renaming to {}", path.display()))?;

        info!(model_id = %model.model_id(), path = %path.display(), "Persisted model");
        Ok(())
    }
}
