//! Device <-> server synchronisation
//!
//! Devices journal every local mutation into `operation_log` and push it to
//! the server, which replays the operations through the same services
//! (`processor`). Devices then pull every row changed since their last pull
//! and merge it last-write-wins (`merge`, `client`).

pub mod client;
pub mod merge;
pub mod processor;

use sea_orm::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{
    customer, delivery, delivery_item,
    operation_log::{self, Entity as OperationLog},
    product, stock_adjustment, stock_alert, supplier,
    sync_state::{self, Entity as SyncState},
    vehicle,
};
use crate::utils::{new_id, now_timestamp};

pub use client::{SyncReport, SyncService, run_sync_loop};

pub mod entity {
    pub const SUPPLIER: &str = "supplier";
    pub const CUSTOMER: &str = "customer";
    pub const VEHICLE: &str = "vehicle";
    pub const PRODUCT: &str = "product";
    pub const DELIVERY: &str = "delivery";
    pub const DELIVERY_ITEM: &str = "delivery_item";
    pub const STOCK_ADJUSTMENT: &str = "stock_adjustment";
    pub const STOCK_ALERT: &str = "stock_alert";
}

pub mod ops {
    pub const UPSERT: &str = "upsert";
    pub const DELETE: &str = "delete";
    pub const DISPATCH: &str = "dispatch";
    pub const CANCEL: &str = "cancel";
    pub const PROCESS: &str = "process";
    pub const ADJUST: &str = "adjust";
    pub const RESOLVE: &str = "resolve";
}

/// Lifecycle of an `operation_log` row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Pending,
    Pushed,
    Applied,
    Skipped,
    Failed,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Pushed => "pushed",
            OperationStatus::Applied => "applied",
            OperationStatus::Skipped => "skipped",
            OperationStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(OperationStatus::Pending),
            "pushed" => Some(OperationStatus::Pushed),
            "applied" => Some(OperationStatus::Applied),
            "skipped" => Some(OperationStatus::Skipped),
            "failed" => Some(OperationStatus::Failed),
            _ => None,
        }
    }
}

/// One journaled mutation as it travels over the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOperation {
    pub id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub operation: String,
    #[serde(default)]
    pub payload: Option<Value>,
    pub created_at: String,
}

impl From<operation_log::Model> for SyncOperation {
    fn from(model: operation_log::Model) -> Self {
        Self {
            payload: model
                .payload
                .as_deref()
                .and_then(|p| serde_json::from_str(p).ok()),
            id: model.id,
            entity_type: model.entity_type,
            entity_id: model.entity_id,
            operation: model.operation,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushRequest {
    pub operations: Vec<SyncOperation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub id: String,
    pub status: OperationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushResponse {
    pub results: Vec<OperationResult>,
}

/// Rows changed since a point in time, tombstones included
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeSet {
    pub server_time: String,
    #[serde(default)]
    pub suppliers: Vec<supplier::Model>,
    #[serde(default)]
    pub customers: Vec<customer::Model>,
    #[serde(default)]
    pub vehicles: Vec<vehicle::Model>,
    #[serde(default)]
    pub products: Vec<product::Model>,
    #[serde(default)]
    pub deliveries: Vec<delivery::Model>,
    #[serde(default)]
    pub delivery_items: Vec<delivery_item::Model>,
    #[serde(default)]
    pub stock_adjustments: Vec<stock_adjustment::Model>,
    #[serde(default)]
    pub stock_alerts: Vec<stock_alert::Model>,
}

impl ChangeSet {
    pub fn len(&self) -> usize {
        self.suppliers.len()
            + self.customers.len()
            + self.vehicles.len()
            + self.products.len()
            + self.deliveries.len()
            + self.delivery_items.len()
            + self.stock_adjustments.len()
            + self.stock_alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub role: String,
    pub pending_operations: u64,
    pub failed_operations: u64,
    pub last_pulled_at: Option<String>,
    pub remote_url: Option<String>,
}

/// Append an operation to the local journal. Returns the operation id.
pub async fn log_operation<C: ConnectionTrait>(
    db: &C,
    entity_type: &str,
    entity_id: &str,
    operation: &str,
    payload: Option<Value>,
) -> Result<String, DbErr> {
    let id = new_id();
    let log = operation_log::ActiveModel {
        id: Set(id.clone()),
        entity_type: Set(entity_type.to_owned()),
        entity_id: Set(entity_id.to_owned()),
        operation: Set(operation.to_owned()),
        payload: Set(payload.map(|v| v.to_string())),
        status: Set(OperationStatus::Pending.as_str().to_string()),
        error_message: Set(None),
        created_at: Set(now_timestamp()),
        processed_at: Set(None),
    };

    OperationLog::insert(log).exec(db).await?;
    Ok(id)
}

pub async fn count_operations<C: ConnectionTrait>(
    db: &C,
    status: OperationStatus,
) -> Result<u64, DbErr> {
    OperationLog::find()
        .filter(operation_log::Column::Status.eq(status.as_str()))
        .count(db)
        .await
}

pub async fn get_state<C: ConnectionTrait>(db: &C, name: &str) -> Result<Option<String>, DbErr> {
    Ok(SyncState::find_by_id(name.to_owned())
        .one(db)
        .await?
        .map(|s| s.value))
}

pub async fn set_state<C: ConnectionTrait>(db: &C, name: &str, value: &str) -> Result<(), DbErr> {
    let row = sync_state::ActiveModel {
        name: Set(name.to_owned()),
        value: Set(value.to_owned()),
        updated_at: Set(now_timestamp()),
    };

    SyncState::insert(row)
        .on_conflict(
            sea_orm::sea_query::OnConflict::column(sync_state::Column::Name)
                .update_columns([sync_state::Column::Value, sync_state::Column::UpdatedAt])
                .to_owned(),
        )
        .exec(db)
        .await?;
    Ok(())
}
