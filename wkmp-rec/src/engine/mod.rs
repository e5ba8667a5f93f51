//! Training/inference boundary
//!
//! The supervisor never looks inside a model: it only holds a
//! [`ModelSnapshot`] and hands clones of it to serving workers. All
//! [`ModelEngine`] calls block and are run on the blocking pool by slave
//! workers.

pub mod factorization;

pub use factorization::{FactorizationEngine, FactorizationModel, TrainingConfig};

use crate::types::{Rating, SongId, UserId};
use chrono::{DateTime, Utc};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Trained artifact able to rank songs for a user
pub trait RecModel: Send + Sync + fmt::Debug {
    /// Up to `count` song ids, best first
    fn recommend(&self, user_id: UserId, count: usize) -> anyhow::Result<Vec<SongId>>;

    /// Engines downcast through this to reach their concrete model type
    fn as_any(&self) -> &dyn Any;
}

/// Training, loading and persisting of models
pub trait ModelEngine: Send + Sync {
    fn train(&self, ratings: &[Rating]) -> anyhow::Result<ModelSnapshot>;

    /// Most recently persisted model
    fn load_latest(&self) -> anyhow::Result<ModelSnapshot>;

    fn persist(&self, model: &ModelSnapshot) -> anyhow::Result<()>;
}

/// Immutable, cheaply clonable reference to a trained model
#[derive(Clone)]
pub struct ModelSnapshot {
    model: Arc<dyn RecModel>,
    model_id: Uuid,
    trained_at: DateTime<Utc>,
}

impl ModelSnapshot {
    pub fn new<M>(model: M, model_id: Uuid, trained_at: DateTime<Utc>) -> Self
    where
        M: RecModel + 'static,
    {
        Self {
            model: Arc::new(model),
            model_id,
            trained_at,
        }
    }

    pub fn model_id(&self) -> Uuid {
        self.model_id
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    pub fn recommend(&self, user_id: UserId, count: usize) -> anyhow::Result<Vec<SongId>> {
        self.model.recommend(user_id, count)
    }

    pub fn downcast_ref<M: RecModel + 'static>(&self) -> Option<&M> {
        self.model.as_any().downcast_ref::<M>()
    }
}

impl fmt::Debug for ModelSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSnapshot")
            .field("model_id", &self.model_id)
            .field("trained_at", &self.trained_at)
            .finish()
    }
}
