//! Hands finished sessions to the run store under the signed-in user.

mod identity;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use log::{error, info, warn};
use thiserror::Error;

use crate::models::IntervalRun;

pub use identity::{IdentityProvider, StaticIdentity};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PersistError {
    #[error("no user is signed in")]
    NotAuthenticated,
    #[error("failed to store run: {0}")]
    Persistence(String),
}

/// Append-only store for finished runs.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Writes `run` under `collection_path` and returns the id the store assigned.
    async fn create(&self, user_id: &str, collection_path: &str, run: &IntervalRun) -> Result<String>;
}

pub fn runs_collection_path(user_id: &str) -> String {
    format!("users/{user_id}/runs")
}

#[derive(Clone)]
pub struct SessionPersister {
    store: Arc<dyn RunStore>,
    identity: Arc<dyn IdentityProvider>,
}

impl SessionPersister {
    pub fn new(store: Arc<dyn RunStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { store, identity }
    }

    /// Saves under the current user. Never retries; the caller keeps `run` and may call again.
    pub async fn save(&self, run: &IntervalRun) -> Result<String, PersistError> {
        let Some(user_id) = self.identity.current_user_id() else {
            warn!("Cannot save run created at {}: no user signed in", run.created_at);
            return Err(PersistError::NotAuthenticated);
        };
        self.save_for_user(run, &user_id).await
    }

    pub async fn save_for_user(&self, run: &IntervalRun, user_id: &str) -> Result<String, PersistError> {
        let collection_path = runs_collection_path(user_id);
        match self.store.create(user_id, &collection_path, run).await {
            Ok(id) => {
                info!(
                    "Saved run {} ({} intervals, {:.1}m) to {}",
                    id,
                    run.intervals.len(),
                    run.total_distance_meters(),
                    collection_path
                );
                Ok(id)
            }
            Err(err) => {
                error!("Failed to save run to {}: {:#}", collection_path, err);
                Err(PersistError::Persistence(format!("{err:#}")))
            }
        }
    }
}
