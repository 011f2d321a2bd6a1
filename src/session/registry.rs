// src/session/registry.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::{error::AppError, session::controller::SessionController};

/// Live sessions keyed by id.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<Uuid, Arc<SessionController>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, controller: SessionController) -> Arc<SessionController> {
        let controller = Arc::new(controller);
        self.inner
            .write()
            .await
            .insert(controller.id(), controller.clone());
        controller
    }

    /// Looks a session up and counts the lookup as client activity.
    pub async fn get(&self, id: Uuid) -> Result<Arc<SessionController>, AppError> {
        let controller = self
            .inner
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Session {} not found", id)))?;
        controller.touch().await;
        Ok(controller)
    }

    /// Tears the session down and forgets it.
    pub async fn remove(&self, id: Uuid) -> Result<(), AppError> {
        let controller = self.get(id).await?;
        controller.teardown().await?;
        self.inner.write().await.remove(&id);
        Ok(())
    }

    /// Drops a session that has already been torn down.
    pub async fn forget(&self, id: Uuid) {
        self.inner.write().await.remove(&id);
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Evicts closed sessions and sessions nobody has touched for `idle_ttl`.
    /// Evicted sessions that are still open are torn down. Returns the number evicted.
    pub async fn sweep(&self, idle_ttl: Duration) -> usize {
        let evicted = {
            let mut sessions = self.inner.write().await;
            let mut stale = Vec::new();
            for (id, controller) in sessions.iter() {
                if controller.is_closed().await || controller.idle_for().await >= idle_ttl {
                    stale.push(*id);
                }
            }
            stale
                .into_iter()
                .filter_map(|id| sessions.remove(&id))
                .collect::<Vec<_>>()
        };

        for controller in &evicted {
            if controller.is_closed().await {
                continue;
            }
            if let Err(e) = controller.teardown().await {
                tracing::warn!(session = %controller.id(), "Evicted session not torn down: {}", e);
            }
        }
        evicted.len()
    }

    /// Runs [`SessionRegistry::sweep`] every `every` until the handle is aborted.
    pub fn spawn_sweeper(&self, every: Duration, idle_ttl: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let evicted = registry.sweep(idle_ttl).await;
                if evicted > 0 {
                    let live = registry.len().await;
                    tracing::info!(evicted, live, "Evicted idle sessions");
                }
            }
        })
    }
}
