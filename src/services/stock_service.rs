//! Stock Service - manual adjustments and stock alerts

use sea_orm::*;
use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, optional_text};
use crate::models::product::{self, Entity as Product};
use crate::models::stock_adjustment::{self, Entity as StockAdjustment};
use crate::models::stock_alert::{self, Entity as StockAlert};
use crate::models::{AdjustmentReason, AlertType};
use crate::services::product_service::find_live_product;
use crate::utils::{derive_id, new_id, now_timestamp};

/// Largest quantity a single item or adjustment may move
pub const MAX_MOVEMENT: i32 = 1_000_000_000;

/// Input for a manual stock adjustment.
///
/// `id` is optional; devices send their own so the adjustment keeps the same
/// identity when it is replayed on the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustStockInput {
    pub id: Option<String>,
    pub product_id: String,
    pub quantity_change: i32,
    pub reason: String,
    pub notes: Option<String>,
    pub adjusted_by: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StockMovement {
    pub adjustment: stock_adjustment::Model,
    pub product: product::Model,
    pub alert: Option<stock_alert::Model>,
    /// `false` when the adjustment id was already recorded and nothing moved
    pub applied: bool,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct AdjustmentFilter {
    pub product_id: Option<String>,
    pub delivery_id: Option<String>,
    pub reason: Option<String>,
    pub limit: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct AlertFilter {
    pub resolved: Option<bool>,
    pub product_id: Option<String>,
}

/// Apply a manual stock adjustment
pub async fn adjust_stock<C>(db: &C, input: AdjustStockInput) -> Result<StockMovement, DomainError>
where
    C: ConnectionTrait + TransactionTrait,
{
    if input.quantity_change == 0 {
        return Err(DomainError::Validation(
            "quantity_change must not be zero".to_string(),
        ));
    }
    if input.quantity_change.unsigned_abs() > MAX_MOVEMENT.unsigned_abs() {
        return Err(DomainError::Validation(format!(
            "quantity_change cannot exceed {} either way",
            MAX_MOVEMENT
        )));
    }

    let reason: AdjustmentReason = input.reason.parse().map_err(DomainError::Validation)?;
    if !reason.is_manual() {
        return Err(DomainError::Validation(format!(
            "Reason {} is reserved for delivery processing",
            reason.as_str()
        )));
    }

    let txn = db.begin().await?;

    // Replays of an already recorded adjustment are no-ops
    if let Some(id) = &input.id
        && let Some(existing) = StockAdjustment::find_by_id(id.clone()).one(&txn).await?
    {
        let product = Product::find_by_id(existing.product_id.clone())
            .one(&txn)
            .await?
            .ok_or_else(|| DomainError::not_found("Product", &existing.product_id))?;
        tracing::debug!("Adjustment {} already recorded, skipping", id);
        return Ok(StockMovement {
            adjustment: existing,
            product,
            alert: None,
            applied: false,
        });
    }

    let product = find_live_product(&txn, &input.product_id).await?;

    let new_quantity = product
        .stock_quantity
        .checked_add(input.quantity_change)
        .ok_or_else(|| {
            DomainError::Validation(format!("Stock of {} would be out of range", product.sku))
        })?;
    if new_quantity < 0 {
        return Err(DomainError::InsufficientStock {
            product_id: product.id.clone(),
            sku: product.sku.clone(),
            available: product.stock_quantity,
            requested: input.quantity_change.saturating_neg(),
        });
    }

    let now = now_timestamp();
    let adjustment = stock_adjustment::ActiveModel {
        id: Set(input.id.clone().unwrap_or_else(new_id)),
        product_id: Set(product.id.clone()),
        delivery_id: Set(None),
        quantity_change: Set(input.quantity_change),
        previous_quantity: Set(product.stock_quantity),
        new_quantity: Set(new_quantity),
        reason: Set(reason.as_str().to_string()),
        notes: Set(optional_text(input.notes)),
        adjusted_by: Set(input.adjusted_by),
        is_deleted: Set(false),
        deleted_date: Set(None),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
    }
    .insert(&txn)
    .await?;

    let mut active: product::ActiveModel = product.into();
    active.stock_quantity = Set(new_quantity);
    active.updated_at = Set(now);
    let product = active.update(&txn).await?;

    let alert = evaluate_stock_level(&txn, &product, &adjustment.id).await?;

    txn.commit().await?;

    tracing::info!(
        "Stock of {} adjusted by {} ({}): {} -> {}",
        product.sku,
        adjustment.quantity_change,
        adjustment.reason,
        adjustment.previous_quantity,
        adjustment.new_quantity
    );

    Ok(StockMovement {
        adjustment,
        product,
        alert,
        applied: true,
    })
}

/// List stock adjustments, newest first
pub async fn list_adjustments<C: ConnectionTrait>(
    db: &C,
    filter: AdjustmentFilter,
) -> Result<Vec<stock_adjustment::Model>, DomainError> {
    let mut query = StockAdjustment::find().filter(stock_adjustment::Column::IsDeleted.eq(false));

    if let Some(product_id) = filter.product_id {
        query = query.filter(stock_adjustment::Column::ProductId.eq(product_id));
    }
    if let Some(delivery_id) = filter.delivery_id {
        query = query.filter(stock_adjustment::Column::DeliveryId.eq(delivery_id));
    }
    if let Some(reason) = filter.reason {
        query = query.filter(stock_adjustment::Column::Reason.eq(reason));
    }

    query = query
        .order_by_desc(stock_adjustment::Column::CreatedAt)
        .order_by_desc(stock_adjustment::Column::Id);

    if let Some(limit) = filter.limit {
        query = query.limit(limit);
    }

    Ok(query.all(db).await?)
}

/// Bring the product's alerts in line with its current stock level.
///
/// At most one alert stays open per product. `trigger` identifies the change
/// that caused the evaluation (adjustment id, delivery id, product revision)
/// and seeds the id of a newly raised alert. Returns the alert raised, if any.
pub async fn evaluate_stock_level<C: ConnectionTrait>(
    conn: &C,
    product: &product::Model,
    trigger: &str,
) -> Result<Option<stock_alert::Model>, DomainError> {
    let condition = if product.is_deleted {
        None
    } else {
        AlertType::for_level(product.stock_quantity, product.reorder_level)
    };

    let open_alerts = StockAlert::find()
        .filter(stock_alert::Column::ProductId.eq(product.id.as_str()))
        .filter(stock_alert::Column::IsResolved.eq(false))
        .filter(stock_alert::Column::IsDeleted.eq(false))
        .order_by_desc(stock_alert::Column::CreatedAt)
        .all(conn)
        .await?;

    let now = now_timestamp();
    let mut current: Option<stock_alert::Model> = None;

    for alert in open_alerts {
        let matches = condition.is_some_and(|c| c.as_str() == alert.alert_type);
        if matches && current.is_none() {
            current = Some(alert);
        } else {
            tracing::debug!("Resolving stock alert {} for {}", alert.id, product.sku);
            let mut active: stock_alert::ActiveModel = alert.into();
            active.is_resolved = Set(true);
            active.resolved_date = Set(Some(now.clone()));
            active.updated_at = Set(now.clone());
            active.update(conn).await?;
        }
    }

    let Some(alert_type) = condition else {
        return Ok(None);
    };

    if let Some(alert) = current {
        if alert.current_quantity != product.stock_quantity
            || alert.threshold != product.reorder_level
        {
            let mut active: stock_alert::ActiveModel = alert.into();
            active.current_quantity = Set(product.stock_quantity);
            active.threshold = Set(product.reorder_level);
            active.updated_at = Set(now);
            active.update(conn).await?;
        }
        return Ok(None);
    }

    let alert_id = derive_id(&product.id, &format!("{}:{}", alert_type.as_str(), trigger));
    if StockAlert::find_by_id(alert_id.clone())
        .one(conn)
        .await?
        .is_some()
    {
        // Already raised for this trigger (e.g. pulled from the server)
        return Ok(None);
    }

    let alert = stock_alert::ActiveModel {
        id: Set(alert_id),
        product_id: Set(product.id.clone()),
        alert_type: Set(alert_type.as_str().to_string()),
        current_quantity: Set(product.stock_quantity),
        threshold: Set(product.reorder_level),
        is_resolved: Set(false),
        resolved_date: Set(None),
        is_deleted: Set(false),
        deleted_date: Set(None),
        created_at: Set(now.clone()),
        updated_at: Set(now),
    }
    .insert(conn)
    .await?;

    tracing::warn!(
        "Stock alert {} raised for {}: {} on hand, reorder level {}",
        alert.alert_type,
        product.sku,
        product.stock_quantity,
        product.reorder_level
    );

    Ok(Some(alert))
}

/// List stock alerts, newest first
pub async fn list_alerts<C: ConnectionTrait>(
    db: &C,
    filter: AlertFilter,
) -> Result<Vec<stock_alert::Model>, DomainError> {
    let mut query = StockAlert::find().filter(stock_alert::Column::IsDeleted.eq(false));

    if let Some(resolved) = filter.resolved {
        query = query.filter(stock_alert::Column::IsResolved.eq(resolved));
    }
    if let Some(product_id) = filter.product_id {
        query = query.filter(stock_alert::Column::ProductId.eq(product_id));
    }

    Ok(query
        .order_by_desc(stock_alert::Column::CreatedAt)
        .all(db)
        .await?)
}

/// Acknowledge an alert by hand
pub async fn resolve_alert<C: ConnectionTrait>(
    db: &C,
    id: &str,
) -> Result<stock_alert::Model, DomainError> {
    let alert = StockAlert::find_by_id(id.to_owned())
        .filter(stock_alert::Column::IsDeleted.eq(false))
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("Stock alert", id))?;

    if alert.is_resolved {
        return Err(DomainError::InvalidState(
            "Stock alert is already resolved".to_string(),
        ));
    }

    let now = now_timestamp();
    let mut active: stock_alert::ActiveModel = alert.into();
    active.is_resolved = Set(true);
    active.resolved_date = Set(Some(now.clone()));
    active.updated_at = Set(now);

    Ok(active.update(db).await?)
}

/// Count unresolved alerts
pub async fn count_open_alerts<C: ConnectionTrait>(db: &C) -> Result<u64, DomainError> {
    Ok(StockAlert::find()
        .filter(stock_alert::Column::IsDeleted.eq(false))
        .filter(stock_alert::Column::IsResolved.eq(false))
        .count(db)
        .await?)
}
