//! The running bridge: one vendor session plus the entities built on it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::command::DispatchReport;
use crate::command::SendCommand;
use crate::config::HubspaceConfig;
use crate::entity::Entity;
use crate::entity::EntityError;
use crate::entity::EntitySnapshot;
use crate::entity::Service;
use crate::instantiate;
use crate::instantiate::SetupError;
use crate::poller;
use crate::router;
use crate::vendor::VendorClient;

/// Type alias for the shared entity list
type EntityList = Arc<Mutex<Vec<Entity>>>;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error(transparent)]
    Entity(#[from] EntityError),
}

/// Hubspace bridge
///
/// Owns the vendor client and every entity created from it. Locks are always
/// taken entities first, then client.
pub struct Bridge<C: VendorClient> {
    client: Arc<Mutex<C>>,
    entities: EntityList,
}

impl<C: VendorClient> Clone for Bridge<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            entities: Arc::clone(&self.entities),
        }
    }
}

impl<C: VendorClient + 'static> Bridge<C> {
    pub fn new(client: C) -> Self {
        Self {
            client: Arc::new(Mutex::new(client)),
            entities: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create entities for the configured devices and read their state.
    ///
    /// Replaces any entities from an earlier attempt. Returns the number of
    /// entities created.
    pub async fn setup(&self, config: &HubspaceConfig) -> Result<usize, SetupError> {
        let mut entities = self.entities.lock().await;
        let client = self.client.lock().await;

        let mut created = instantiate::setup(&*client, config).await?;
        for entity in created.iter_mut() {
            entity.refresh(&*client).await;
            info!(
                "Discovered {} entity: {} ({})",
                entity.platform(),
                entity.entity_id,
                entity.name
            );
        }

        *entities = created;
        Ok(entities.len())
    }

    /// Forward a raw function write to the named entities.
    pub async fn send_command(&self, cmd: &SendCommand) -> DispatchReport {
        let entities = self.entities.lock().await;
        let client = self.client.lock().await;
        router::dispatch(&entities, &*client, cmd).await
    }

    /// Run an entity service and return the refreshed entity.
    pub async fn call_service(
        &self,
        entity_id: &str,
        service: &Service,
    ) -> Result<EntitySnapshot, BridgeError> {
        let mut entities = self.entities.lock().await;
        let client = self.client.lock().await;

        let entity = entities
            .iter_mut()
            .find(|e| e.entity_id == entity_id)
            .ok_or_else(|| BridgeError::UnknownEntity(entity_id.to_string()))?;

        entity.call_service(&*client, service).await?;
        Ok(entity.snapshot())
    }

    pub async fn snapshot(&self) -> Vec<EntitySnapshot> {
        self.entities
            .lock()
            .await
            .iter()
            .map(|e| e.snapshot())
            .collect()
    }

    pub async fn entity(&self, entity_id: &str) -> Option<EntitySnapshot> {
        self.entities
            .lock()
            .await
            .iter()
            .find(|e| e.entity_id == entity_id)
            .map(|e| e.snapshot())
    }

    pub async fn poll_once(&self) {
        poller::poll_once(&self.client, &self.entities).await;
    }

    /// Spawn the background poller.
    pub fn spawn_poller(
        &self,
        period: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(poller::run(
            Arc::clone(&self.client),
            Arc::clone(&self.entities),
            period,
            shutdown,
        ))
    }

    pub fn client(&self) -> &Arc<Mutex<C>> {
        &self.client
    }
}
