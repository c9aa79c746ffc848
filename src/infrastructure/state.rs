//! Application state containing repositories and shared resources

use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;

use crate::domain::{CustomerRepository, SupplierRepository, VehicleRepository};
use crate::infrastructure::config::{Config, SyncRole};
use crate::infrastructure::{
    SeaOrmCustomerRepository, SeaOrmSupplierRepository, SeaOrmVehicleRepository,
};
use crate::sync::{self, SyncService};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    pub config: Arc<Config>,
    pub supplier_repo: Arc<dyn SupplierRepository>,
    pub customer_repo: Arc<dyn CustomerRepository>,
    pub vehicle_repo: Arc<dyn VehicleRepository>,
    /// Present in the client role when a remote server is configured
    pub sync_service: Option<Arc<SyncService>>,
}

impl AppState {
    /// Create a new AppState with all repositories initialized
    pub fn new(db: DatabaseConnection, config: Config) -> Self {
        let sync_service = match (config.sync_role, &config.remote) {
            (SyncRole::Client, Some(remote)) => {
                match SyncService::new(db.clone(), remote.clone(), config.sync_batch_size) {
                    Ok(service) => Some(Arc::new(service)),
                    Err(e) => {
                        tracing::error!("❌ Sync disabled: {}", e);
                        None
                    }
                }
            }
            _ => None,
        };

        Self {
            supplier_repo: Arc::new(SeaOrmSupplierRepository::new(db.clone())),
            customer_repo: Arc::new(SeaOrmCustomerRepository::new(db.clone())),
            vehicle_repo: Arc::new(SeaOrmVehicleRepository::new(db.clone())),
            config: Arc::new(config),
            sync_service,
            db,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn is_client(&self) -> bool {
        self.config.sync_role == SyncRole::Client
    }

    /// Record a successful local mutation in the outbox (client role only).
    ///
    /// The mutation is already committed, so a journaling failure is logged
    /// rather than reported to the caller.
    pub async fn journal<T: Serialize>(
        &self,
        entity_type: &str,
        entity_id: &str,
        operation: &str,
        payload: &T,
    ) {
        if !self.is_client() {
            return;
        }

        let payload = match serde_json::to_value(payload) {
            Ok(value) if !value.is_null() => Some(value),
            Ok(_) => None,
            Err(e) => {
                tracing::error!("Cannot serialise {} {} for sync: {}", entity_type, entity_id, e);
                return;
            }
        };

        if let Err(e) =
            sync::log_operation(&self.db, entity_type, entity_id, operation, payload).await
        {
            tracing::error!(
                "Failed to journal {} on {} {}: {}",
                operation,
                entity_type,
                entity_id,
                e
            );
        }
    }
}

// Implement FromRef to allow extracting DatabaseConnection from AppState
impl axum::extract::FromRef<AppState> for DatabaseConnection {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}
