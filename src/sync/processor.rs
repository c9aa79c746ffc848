//! Server side of the sync: stores pushed operations and replays them.

use sea_orm::*;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::Mutex;

use super::merge::{self, MergeOutcome, SyncRecord};
use super::{ChangeSet, OperationResult, OperationStatus, SyncOperation, entity, ops};
use crate::domain::DomainError;
use crate::models::{
    DeliveryStatus, customer, delivery, delivery_item,
    operation_log::{self, Entity as OperationLog},
    product, stock_adjustment, stock_alert, supplier, vehicle,
};
use crate::services::{delivery_service, product_service, stock_service};
use crate::utils::{now_timestamp, timestamp_before};

// Rows are stamped before their transaction commits, so a pull watermark equal
// to the read time could skip a slow writer. Each pull re-reads this window;
// last-write-wins merging turns the repeats into no-ops.
const PULL_OVERLAP: Duration = Duration::from_secs(5);

// Serialises draining between push requests and the background loop
static DRAIN_LOCK: Mutex<()> = Mutex::const_new(());

#[derive(Debug, Default, Deserialize)]
struct ProcessPayload {
    processed_by: Option<String>,
}

pub async fn run_processor(db: DatabaseConnection) {
    tracing::info!("🔄 Operation Processor started");

    loop {
        match drain(&db).await {
            Ok(0) => tokio::time::sleep(Duration::from_secs(2)).await,
            Ok(n) => tracing::debug!("Processed {} operation(s)", n),
            Err(e) => {
                tracing::error!("❌ Error processing operations: {}", e);
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }
}

/// Store pushed operations. Ids already known are left untouched, so a
/// device re-pushing after a lost response never applies anything twice.
pub async fn store_operations(
    db: &DatabaseConnection,
    operations: &[SyncOperation],
) -> Result<usize, DbErr> {
    let mut stored = 0;
    for op in operations {
        if OperationLog::find_by_id(op.id.clone()).one(db).await?.is_some() {
            tracing::debug!("Operation {} already received", op.id);
            continue;
        }

        operation_log::ActiveModel {
            id: Set(op.id.clone()),
            entity_type: Set(op.entity_type.clone()),
            entity_id: Set(op.entity_id.clone()),
            operation: Set(op.operation.clone()),
            payload: Set(op.payload.as_ref().map(|v| v.to_string())),
            status: Set(OperationStatus::Pending.as_str().to_string()),
            error_message: Set(None),
            created_at: Set(op.created_at.clone()),
            processed_at: Set(None),
        }
        .insert(db)
        .await?;
        stored += 1;
    }
    Ok(stored)
}

/// Current status of the given operations, in the same order
pub async fn operation_results(
    db: &DatabaseConnection,
    ids: &[String],
) -> Result<Vec<OperationResult>, DbErr> {
    let mut results = Vec::with_capacity(ids.len());
    for id in ids {
        let row = OperationLog::find_by_id(id.clone()).one(db).await?;
        results.push(match row {
            Some(row) => OperationResult {
                id: row.id,
                status: OperationStatus::parse(&row.status).unwrap_or(OperationStatus::Failed),
                error: row.error_message,
            },
            None => OperationResult {
                id: id.clone(),
                status: OperationStatus::Failed,
                error: Some("Operation was not stored".to_string()),
            },
        });
    }
    Ok(results)
}

/// Apply every pending operation, oldest first. Returns how many were handled.
pub async fn drain(db: &DatabaseConnection) -> Result<usize, DbErr> {
    let _guard = DRAIN_LOCK.lock().await;

    let mut handled = 0;
    while let Some(op) = OperationLog::find()
        .filter(operation_log::Column::Status.eq(OperationStatus::Pending.as_str()))
        .order_by_asc(operation_log::Column::CreatedAt)
        .order_by_asc(operation_log::Column::Id)
        .one(db)
        .await?
    {
        tracing::info!(
            "⚙️ Processing Op {}: {} on {} {}",
            op.id,
            op.operation,
            op.entity_type,
            op.entity_id
        );
        apply_operation(db, op).await?;
        handled += 1;
    }
    Ok(handled)
}

/// Apply one operation in its own transaction and record the outcome.
/// Storage faults leave the operation pending and stop the drain so the
/// caller retries later; only domain rejections are recorded as failed.
async fn apply_operation(db: &DatabaseConnection, op: operation_log::Model) -> Result<(), DbErr> {
    let txn = db.begin().await?;

    match apply(&txn, &op).await {
        Ok(status) => {
            mark(&txn, op, status, None).await?;
            txn.commit().await?;
        }
        Err(e) if e.is_transient() => {
            txn.rollback().await?;
            tracing::warn!("⏳ Op {} left pending: {}", op.id, e);
            return Err(DbErr::Custom(e.to_string()));
        }
        Err(e) => {
            txn.rollback().await?;
            tracing::error!("❌ Apply Failed for {}: {}", op.id, e);
            mark(db, op, OperationStatus::Failed, Some(e.to_string())).await?;
        }
    }
    Ok(())
}

async fn mark<C: ConnectionTrait>(
    conn: &C,
    op: operation_log::Model,
    status: OperationStatus,
    error: Option<String>,
) -> Result<(), DbErr> {
    let mut active: operation_log::ActiveModel = op.into();
    active.status = Set(status.as_str().to_string());
    active.error_message = Set(error);
    active.processed_at = Set(Some(now_timestamp()));
    active.update(conn).await?;
    Ok(())
}

fn payload<T: DeserializeOwned>(op: &operation_log::Model) -> Result<T, DomainError> {
    let raw = op
        .payload
        .as_deref()
        .ok_or_else(|| DomainError::Validation("Operation has no payload".to_string()))?;
    Ok(serde_json::from_str(raw)?)
}

/// Payload row for upserts, checked against the operation's entity id
fn payload_row<T: DeserializeOwned + SyncRecord>(
    op: &operation_log::Model,
) -> Result<T, DomainError> {
    let row: T = payload(op)?;
    if row.record_id() != op.entity_id {
        return Err(DomainError::Validation(format!(
            "Payload id {} does not match entity {}",
            row.record_id(),
            op.entity_id
        )));
    }
    Ok(row)
}

/// Domain errors that mean "already done" rather than "broken"
fn skipped_on_state(
    result: Result<(), DomainError>,
) -> Result<OperationStatus, DomainError> {
    match result {
        Ok(()) => Ok(OperationStatus::Applied),
        Err(DomainError::InvalidState(reason)) => {
            tracing::info!("Skipping operation: {}", reason);
            Ok(OperationStatus::Skipped)
        }
        Err(e) => Err(e),
    }
}

fn merged(outcome: MergeOutcome) -> OperationStatus {
    if outcome.changed() {
        OperationStatus::Applied
    } else {
        OperationStatus::Skipped
    }
}

async fn apply(
    txn: &DatabaseTransaction,
    op: &operation_log::Model,
) -> Result<OperationStatus, DomainError> {
    let id = op.entity_id.as_str();

    match (op.entity_type.as_str(), op.operation.as_str()) {
        (entity::SUPPLIER, ops::UPSERT | ops::DELETE) => Ok(merged(
            merge::merge_row::<supplier::ActiveModel, _>(txn, &payload_row(op)?).await?,
        )),
        (entity::CUSTOMER, ops::UPSERT | ops::DELETE) => Ok(merged(
            merge::merge_row::<customer::ActiveModel, _>(txn, &payload_row(op)?).await?,
        )),
        (entity::VEHICLE, ops::UPSERT | ops::DELETE) => Ok(merged(
            merge::merge_row::<vehicle::ActiveModel, _>(txn, &payload_row(op)?).await?,
        )),
        (entity::STOCK_ALERT, ops::UPSERT) => Ok(merged(
            merge::merge_row::<stock_alert::ActiveModel, _>(txn, &payload_row(op)?).await?,
        )),
        (entity::PRODUCT, ops::UPSERT) => upsert_product(txn, payload_row(op)?).await,
        (entity::PRODUCT, ops::DELETE) => {
            match product_service::delete_product(txn, id).await {
                Ok(_) => Ok(OperationStatus::Applied),
                Err(DomainError::NotFound(_)) => Ok(OperationStatus::Skipped),
                Err(e) => Err(e),
            }
        }
        (entity::DELIVERY, ops::UPSERT) => upsert_delivery(txn, payload_row(op)?).await,
        (entity::DELIVERY, ops::DISPATCH) => skipped_on_state(
            delivery_service::dispatch_delivery(txn, id).await.map(|_| ()),
        ),
        (entity::DELIVERY, ops::CANCEL) => skipped_on_state(
            delivery_service::cancel_delivery(txn, id).await.map(|_| ()),
        ),
        (entity::DELIVERY, ops::DELETE) => {
            match delivery_service::delete_delivery(txn, id).await {
                Ok(_) => Ok(OperationStatus::Applied),
                Err(DomainError::NotFound(_)) => Ok(OperationStatus::Skipped),
                Err(e) => Err(e),
            }
        }
        (entity::DELIVERY, ops::PROCESS) => {
            let body: ProcessPayload = match op.payload {
                Some(_) => payload(op)?,
                None => ProcessPayload::default(),
            };
            skipped_on_state(
                delivery_service::process_delivery(txn, id, body.processed_by)
                    .await
                    .map(|_| ()),
            )
        }
        (entity::DELIVERY_ITEM, ops::UPSERT | ops::DELETE) => {
            upsert_delivery_item(txn, payload_row(op)?).await
        }
        (entity::STOCK_ADJUSTMENT, ops::UPSERT) => {
            let row: stock_adjustment::Model = payload_row(op)?;
            if merge::find_row::<stock_adjustment::Entity, _>(txn, &row.id)
                .await?
                .is_some()
            {
                return Ok(OperationStatus::Skipped);
            }
            merge::write_row::<stock_adjustment::ActiveModel, _>(txn, &row, false).await?;
            Ok(OperationStatus::Applied)
        }
        (entity::STOCK_ADJUSTMENT, ops::ADJUST) => {
            let mut input: stock_service::AdjustStockInput = payload(op)?;
            input.id = Some(op.entity_id.clone());
            let movement = stock_service::adjust_stock(txn, input).await?;
            Ok(if movement.applied {
                OperationStatus::Applied
            } else {
                OperationStatus::Skipped
            })
        }
        (entity::STOCK_ALERT, ops::RESOLVE) => {
            skipped_on_state(stock_service::resolve_alert(txn, id).await.map(|_| ()))
        }
        (entity_type, operation) => {
            tracing::warn!("⚠️ Unknown operation type: {} {}", entity_type, operation);
            Err(DomainError::Validation(format!(
                "Unsupported operation {} on {}",
                operation, entity_type
            )))
        }
    }
}

/// Stock only moves through deliveries and adjustments, so an existing
/// product keeps the stored quantity whatever the device sent.
async fn upsert_product(
    txn: &DatabaseTransaction,
    mut row: product::Model,
) -> Result<OperationStatus, DomainError> {
    let existing = merge::find_row::<product::Entity, _>(txn, &row.id).await?;
    if let Some(current) = &existing {
        if current.updated_at >= row.updated_at {
            return Ok(OperationStatus::Skipped);
        }
        row.stock_quantity = current.stock_quantity;
    }

    merge::write_row::<product::ActiveModel, _>(txn, &row, existing.is_some()).await?;
    if !row.is_deleted {
        stock_service::evaluate_stock_level(txn, &row, &row.updated_at).await?;
    }
    Ok(OperationStatus::Applied)
}

/// Status changes into or out of `completed` only happen through processing
async fn upsert_delivery(
    txn: &DatabaseTransaction,
    mut row: delivery::Model,
) -> Result<OperationStatus, DomainError> {
    let completed = DeliveryStatus::Completed.as_str();
    let existing = merge::find_row::<delivery::Entity, _>(txn, &row.id).await?;

    match &existing {
        Some(current) => {
            if current.updated_at >= row.updated_at {
                return Ok(OperationStatus::Skipped);
            }
            if current.status == completed || row.status == completed {
                row.status = current.status.clone();
                row.delivered_date = current.delivered_date.clone();
            }
        }
        None => {
            if row.status == completed {
                row.status = DeliveryStatus::Pending.as_str().to_string();
                row.delivered_date = None;
            }
        }
    }

    merge::write_row::<delivery::ActiveModel, _>(txn, &row, existing.is_some()).await?;
    Ok(OperationStatus::Applied)
}

async fn upsert_delivery_item(
    txn: &DatabaseTransaction,
    mut row: delivery_item::Model,
) -> Result<OperationStatus, DomainError> {
    delivery_service::validate_quantity(row.quantity)?;
    let existing = merge::find_row::<delivery_item::Entity, _>(txn, &row.id).await?;
    match &existing {
        Some(current) => {
            if current.updated_at >= row.updated_at {
                return Ok(OperationStatus::Skipped);
            }
            row.is_processed = current.is_processed;
        }
        None => row.is_processed = false,
    }

    merge::write_row::<delivery_item::ActiveModel, _>(txn, &row, existing.is_some()).await?;
    Ok(OperationStatus::Applied)
}

async fn rows_since<E, C>(
    conn: &C,
    column: E::Column,
    since: Option<&str>,
) -> Result<Vec<E::Model>, DbErr>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    let mut query = E::find();
    if let Some(since) = since {
        query = query.filter(column.gte(since));
    }
    query.order_by_asc(column).all(conn).await
}

/// Every row changed at or after `since` (everything when `None`)
pub async fn collect_changes<C: ConnectionTrait>(
    db: &C,
    since: Option<&str>,
) -> Result<ChangeSet, DbErr> {
    let server_time = timestamp_before(PULL_OVERLAP);

    Ok(ChangeSet {
        server_time,
        suppliers: rows_since::<supplier::Entity, _>(db, supplier::Column::UpdatedAt, since)
            .await?,
        customers: rows_since::<customer::Entity, _>(db, customer::Column::UpdatedAt, since)
            .await?,
        vehicles: rows_since::<vehicle::Entity, _>(db, vehicle::Column::UpdatedAt, since).await?,
        products: rows_since::<product::Entity, _>(db, product::Column::UpdatedAt, since).await?,
        deliveries: rows_since::<delivery::Entity, _>(db, delivery::Column::UpdatedAt, since)
            .await?,
        delivery_items: rows_since::<delivery_item::Entity, _>(
            db,
            delivery_item::Column::UpdatedAt,
            since,
        )
        .await?,
        stock_adjustments: rows_since::<stock_adjustment::Entity, _>(
            db,
            stock_adjustment::Column::UpdatedAt,
            since,
        )
        .await?,
        stock_alerts: rows_since::<stock_alert::Entity, _>(
            db,
            stock_alert::Column::UpdatedAt,
            since,
        )
        .await?,
    })
}
