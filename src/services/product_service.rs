//! Product Service - catalogue management
//!
//! Stock levels are never written here directly: an opening stock goes
//! through an `opening_balance` adjustment and later moves go through
//! deliveries or `stock_service::adjust_stock`.

use sea_orm::sea_query::Expr;
use sea_orm::*;
use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, optional_text, required_text};
use crate::models::product::{self, Entity as Product};
use crate::models::stock_adjustment;
use crate::models::stock_alert;
use crate::models::supplier::{self, Entity as Supplier};
use crate::models::{AdjustmentReason, stock_alert::Entity as StockAlert};
use crate::services::stock_service;
use crate::utils::{derive_id, new_id, now_timestamp};

const DEFAULT_UNIT: &str = "pcs";

/// Filter parameters for listing products
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ProductFilter {
    /// Matches SKU or name
    pub q: Option<String>,
    pub supplier_id: Option<String>,
    /// Only products at or below their reorder level
    pub low_stock: Option<bool>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct PaginatedProducts {
    pub products: Vec<product::Model>,
    pub total: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductInput {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub unit_price: f64,
    pub cost_price: Option<f64>,
    /// Opening stock, recorded as an `opening_balance` adjustment
    pub stock_quantity: Option<i32>,
    pub reorder_level: Option<i32>,
    pub supplier_id: Option<String>,
}

/// Partial product update. `stock_quantity` is deliberately absent.
/// An empty `supplier_id` detaches the supplier.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct UpdateProductInput {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub unit_price: Option<f64>,
    pub cost_price: Option<f64>,
    pub reorder_level: Option<i32>,
    pub supplier_id: Option<String>,
}

/// Everything a product write touched, so callers can journal or display it.
#[derive(Debug, Clone, Serialize)]
pub struct ProductChange {
    pub product: product::Model,
    pub adjustment: Option<stock_adjustment::Model>,
    pub alert: Option<stock_alert::Model>,
}

fn validate_price(field: &str, value: f64) -> Result<f64, DomainError> {
    if !value.is_finite() || value < 0.0 {
        return Err(DomainError::Validation(format!(
            "{} must be zero or positive",
            field
        )));
    }
    Ok(value)
}

fn validate_non_negative(field: &str, value: i32) -> Result<i32, DomainError> {
    if value < 0 {
        return Err(DomainError::Validation(format!(
            "{} must be zero or positive",
            field
        )));
    }
    Ok(value)
}

pub(crate) async fn find_live_product<C: ConnectionTrait>(
    conn: &C,
    id: &str,
) -> Result<product::Model, DomainError> {
    Product::find_by_id(id.to_owned())
        .filter(product::Column::IsDeleted.eq(false))
        .one(conn)
        .await?
        .ok_or_else(|| DomainError::not_found("Product", id))
}

pub(crate) async fn ensure_live_supplier<C: ConnectionTrait>(
    conn: &C,
    id: &str,
) -> Result<supplier::Model, DomainError> {
    Supplier::find_by_id(id.to_owned())
        .filter(supplier::Column::IsDeleted.eq(false))
        .one(conn)
        .await?
        .ok_or_else(|| DomainError::Validation(format!("Supplier {} does not exist", id)))
}

async fn ensure_unique_sku<C: ConnectionTrait>(
    conn: &C,
    sku: &str,
    except_id: Option<&str>,
) -> Result<(), DomainError> {
    let mut query = Product::find()
        .filter(product::Column::Sku.eq(sku))
        .filter(product::Column::IsDeleted.eq(false));
    if let Some(id) = except_id {
        query = query.filter(product::Column::Id.ne(id));
    }

    if query.count(conn).await? > 0 {
        return Err(DomainError::Conflict(format!(
            "A product with SKU {} already exists",
            sku
        )));
    }
    Ok(())
}

/// List non-deleted products
pub async fn list_products<C: ConnectionTrait>(
    db: &C,
    filter: ProductFilter,
) -> Result<PaginatedProducts, DomainError> {
    let mut query = Product::find().filter(product::Column::IsDeleted.eq(false));

    if let Some(q) = &filter.q
        && !q.trim().is_empty()
    {
        let q = q.trim();
        query = query.filter(
            Condition::any()
                .add(product::Column::Sku.contains(q))
                .add(product::Column::Name.contains(q)),
        );
    }

    if let Some(supplier_id) = &filter.supplier_id {
        query = query.filter(product::Column::SupplierId.eq(supplier_id.as_str()));
    }

    if filter.low_stock == Some(true) {
        query = query.filter(
            Expr::col(product::Column::StockQuantity)
                .lte(Expr::col(product::Column::ReorderLevel)),
        );
    }

    query = query.order_by_asc(product::Column::Name);

    let (products, total) = if let Some(limit) = filter.limit {
        let page = filter.page.unwrap_or(0);
        let paginator = query.paginate(db, limit.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page).await?;
        (items, total)
    } else {
        let items = query.all(db).await?;
        let total = items.len() as u64;
        (items, total)
    };

    Ok(PaginatedProducts { products, total })
}

/// Get a single product by ID
pub async fn get_product<C: ConnectionTrait>(
    db: &C,
    id: &str,
) -> Result<product::Model, DomainError> {
    find_live_product(db, id).await
}

/// Create a product, recording the opening stock when there is one
pub async fn create_product<C>(
    db: &C,
    input: CreateProductInput,
    created_by: Option<String>,
) -> Result<ProductChange, DomainError>
where
    C: ConnectionTrait + TransactionTrait,
{
    let sku = required_text("sku", &input.sku)?.to_uppercase();
    let name = required_text("name", &input.name)?;
    let unit_price = validate_price("unit_price", input.unit_price)?;
    let cost_price = input
        .cost_price
        .map(|c| validate_price("cost_price", c))
        .transpose()?;
    let opening_stock = validate_non_negative("stock_quantity", input.stock_quantity.unwrap_or(0))?;
    let reorder_level = validate_non_negative("reorder_level", input.reorder_level.unwrap_or(0))?;
    let supplier_id = optional_text(input.supplier_id);

    let txn = db.begin().await?;

    ensure_unique_sku(&txn, &sku, None).await?;
    if let Some(supplier_id) = &supplier_id {
        ensure_live_supplier(&txn, supplier_id).await?;
    }

    let now = now_timestamp();
    let product_id = new_id();

    let saved = product::ActiveModel {
        id: Set(product_id.clone()),
        sku: Set(sku),
        name: Set(name),
        description: Set(optional_text(input.description)),
        unit: Set(optional_text(input.unit).unwrap_or_else(|| DEFAULT_UNIT.to_string())),
        unit_price: Set(unit_price),
        cost_price: Set(cost_price),
        stock_quantity: Set(opening_stock),
        reorder_level: Set(reorder_level),
        supplier_id: Set(supplier_id),
        is_deleted: Set(false),
        deleted_date: Set(None),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
    }
    .insert(&txn)
    .await?;

    let adjustment = if opening_stock > 0 {
        let adjustment = stock_adjustment::ActiveModel {
            id: Set(derive_id(&product_id, "opening-balance")),
            product_id: Set(product_id.clone()),
            delivery_id: Set(None),
            quantity_change: Set(opening_stock),
            previous_quantity: Set(0),
            new_quantity: Set(opening_stock),
            reason: Set(AdjustmentReason::OpeningBalance.as_str().to_string()),
            notes: Set(None),
            adjusted_by: Set(created_by),
            is_deleted: Set(false),
            deleted_date: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
        Some(adjustment)
    } else {
        None
    };

    let alert = stock_service::evaluate_stock_level(&txn, &saved, &saved.updated_at).await?;

    txn.commit().await?;

    tracing::info!(
        "Created product {} ({}) with opening stock {}",
        saved.sku,
        saved.id,
        saved.stock_quantity
    );

    Ok(ProductChange {
        product: saved,
        adjustment,
        alert,
    })
}

/// Update catalogue fields; a reorder level change re-evaluates alerts
pub async fn update_product<C>(
    db: &C,
    id: &str,
    input: UpdateProductInput,
) -> Result<ProductChange, DomainError>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;

    let existing = find_live_product(&txn, id).await?;
    let previous_reorder_level = existing.reorder_level;
    let mut active: product::ActiveModel = existing.into();

    if let Some(sku) = input.sku {
        let sku = required_text("sku", &sku)?.to_uppercase();
        ensure_unique_sku(&txn, &sku, Some(id)).await?;
        active.sku = Set(sku);
    }
    if let Some(name) = input.name {
        active.name = Set(required_text("name", &name)?);
    }
    if input.description.is_some() {
        active.description = Set(optional_text(input.description));
    }
    if let Some(unit) = optional_text(input.unit) {
        active.unit = Set(unit);
    }
    if let Some(price) = input.unit_price {
        active.unit_price = Set(validate_price("unit_price", price)?);
    }
    if let Some(cost) = input.cost_price {
        active.cost_price = Set(Some(validate_price("cost_price", cost)?));
    }
    if let Some(level) = input.reorder_level {
        active.reorder_level = Set(validate_non_negative("reorder_level", level)?);
    }
    if input.supplier_id.is_some() {
        let supplier_id = optional_text(input.supplier_id);
        if let Some(supplier_id) = &supplier_id {
            ensure_live_supplier(&txn, supplier_id).await?;
        }
        active.supplier_id = Set(supplier_id);
    }
    active.updated_at = Set(now_timestamp());

    let updated = active.update(&txn).await?;

    let alert = if updated.reorder_level != previous_reorder_level {
        stock_service::evaluate_stock_level(&txn, &updated, &updated.updated_at).await?
    } else {
        None
    };

    txn.commit().await?;

    Ok(ProductChange {
        product: updated,
        adjustment: None,
        alert,
    })
}

/// Soft delete a product and close its open alerts
pub async fn delete_product<C>(db: &C, id: &str) -> Result<product::Model, DomainError>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;

    let existing = find_live_product(&txn, id).await?;
    let now = now_timestamp();

    let mut active: product::ActiveModel = existing.into();
    active.is_deleted = Set(true);
    active.deleted_date = Set(Some(now.clone()));
    active.updated_at = Set(now.clone());
    let deleted = active.update(&txn).await?;

    let open_alerts = StockAlert::find()
        .filter(stock_alert::Column::ProductId.eq(id))
        .filter(stock_alert::Column::IsResolved.eq(false))
        .all(&txn)
        .await?;
    for alert in open_alerts {
        let mut active: stock_alert::ActiveModel = alert.into();
        active.is_resolved = Set(true);
        active.resolved_date = Set(Some(now.clone()));
        active.updated_at = Set(now.clone());
        active.update(&txn).await?;
    }

    txn.commit().await?;

    tracing::info!("Soft-deleted product {} ({})", deleted.sku, deleted.id);
    Ok(deleted)
}

/// Count non-deleted products
pub async fn count_products<C: ConnectionTrait>(db: &C) -> Result<u64, DomainError> {
    Ok(Product::find()
        .filter(product::Column::IsDeleted.eq(false))
        .count(db)
        .await?)
}
