//! Delivery Service - incoming/outgoing deliveries and their processing
//!
//! Processing a delivery is the only place where deliveries move stock:
//! it checks availability for outgoing deliveries, applies every item to its
//! product, writes one stock adjustment per item and closes the delivery,
//! all inside one transaction.

use sea_orm::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::domain::{DomainError, optional_text, required_text};
use crate::models::customer::{self, Entity as Customer};
use crate::models::delivery::{self, Entity as Delivery};
use crate::models::delivery_item::{self, Entity as DeliveryItem};
use crate::models::product::{self, Entity as Product};
use crate::models::stock_adjustment;
use crate::models::stock_alert;
use crate::models::supplier::Entity as Supplier;
use crate::models::vehicle::{self, Entity as Vehicle};
use crate::models::{AdjustmentReason, DeliveryStatus, DeliveryType};
use crate::services::product_service::{ensure_live_supplier, find_live_product};
use crate::services::stock_service;
use crate::utils::clock::today_compact;
use crate::utils::{derive_id, new_id, now_timestamp};

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryItemInput {
    pub product_id: String,
    pub quantity: i32,
    pub unit_price: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDeliveryInput {
    /// Generated (`IN-20261019-1A2B3C`) when absent
    pub reference: Option<String>,
    pub delivery_type: String,
    pub supplier_id: Option<String>,
    pub customer_id: Option<String>,
    pub vehicle_id: Option<String>,
    pub scheduled_date: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<DeliveryItemInput>,
}

/// Header update. The delivery type never changes; an empty string clears
/// an optional reference.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct UpdateDeliveryInput {
    pub supplier_id: Option<String>,
    pub customer_id: Option<String>,
    pub vehicle_id: Option<String>,
    pub scheduled_date: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct UpdateItemInput {
    pub quantity: Option<i32>,
    pub unit_price: Option<f64>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct DeliveryFilter {
    #[serde(alias = "type")]
    pub delivery_type: Option<String>,
    pub status: Option<String>,
    pub supplier_id: Option<String>,
    pub customer_id: Option<String>,
    pub vehicle_id: Option<String>,
    /// Scheduled on or after (inclusive, same format as `scheduled_date`)
    pub from: Option<String>,
    /// Scheduled on or before (inclusive)
    pub to: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryItemDetails {
    #[serde(flatten)]
    pub item: delivery_item::Model,
    pub product_sku: Option<String>,
    pub product_name: Option<String>,
}

/// Delivery with items and display names of the linked records
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryWithItems {
    #[serde(flatten)]
    pub delivery: delivery::Model,
    pub supplier_name: Option<String>,
    pub customer_name: Option<String>,
    pub vehicle_registration: Option<String>,
    pub items: Vec<DeliveryItemDetails>,
}

/// Outcome of processing a delivery
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedDelivery {
    pub delivery: delivery::Model,
    pub adjustments: Vec<stock_adjustment::Model>,
    pub alerts: Vec<stock_alert::Model>,
}

fn parse_type(value: &str) -> Result<DeliveryType, DomainError> {
    value.parse().map_err(DomainError::Validation)
}

fn parse_status(value: &str) -> Result<DeliveryStatus, DomainError> {
    value.parse().map_err(DomainError::Internal)
}

pub fn validate_quantity(quantity: i32) -> Result<i32, DomainError> {
    if quantity <= 0 {
        return Err(DomainError::Validation(
            "Item quantity must be greater than zero".to_string(),
        ));
    }
    if quantity > stock_service::MAX_MOVEMENT {
        return Err(DomainError::Validation(format!(
            "Item quantity cannot exceed {}",
            stock_service::MAX_MOVEMENT
        )));
    }
    Ok(quantity)
}

/// Only the product lookup's "missing" case is the caller's fault
fn missing_product(err: DomainError, message: String) -> DomainError {
    match err {
        DomainError::NotFound(_) => DomainError::Validation(message),
        other => other,
    }
}

fn quantity_out_of_range(product_id: &str, reference: &str) -> DomainError {
    DomainError::Validation(format!(
        "Quantity of product {} on delivery {} is out of range",
        product_id, reference
    ))
}

fn validate_unit_price(price: Option<f64>) -> Result<Option<f64>, DomainError> {
    match price {
        Some(p) if !p.is_finite() || p < 0.0 => Err(DomainError::Validation(
            "unit_price must be zero or positive".to_string(),
        )),
        other => Ok(other),
    }
}

/// Incoming deliveries come from a supplier, outgoing ones go to a customer;
/// never both.
fn check_parties(
    delivery_type: DeliveryType,
    supplier_id: &Option<String>,
    customer_id: &Option<String>,
) -> Result<(), DomainError> {
    match delivery_type {
        DeliveryType::Incoming => {
            if supplier_id.is_none() {
                return Err(DomainError::Validation(
                    "Incoming deliveries require a supplier".to_string(),
                ));
            }
            if customer_id.is_some() {
                return Err(DomainError::Validation(
                    "Incoming deliveries cannot have a customer".to_string(),
                ));
            }
        }
        DeliveryType::Outgoing => {
            if customer_id.is_none() {
                return Err(DomainError::Validation(
                    "Outgoing deliveries require a customer".to_string(),
                ));
            }
            if supplier_id.is_some() {
                return Err(DomainError::Validation(
                    "Outgoing deliveries cannot have a supplier".to_string(),
                ));
            }
        }
    }
    Ok(())
}

async fn ensure_live_customer<C: ConnectionTrait>(
    conn: &C,
    id: &str,
) -> Result<customer::Model, DomainError> {
    Customer::find_by_id(id.to_owned())
        .filter(customer::Column::IsDeleted.eq(false))
        .one(conn)
        .await?
        .ok_or_else(|| DomainError::Validation(format!("Customer {} does not exist", id)))
}

async fn ensure_usable_vehicle<C: ConnectionTrait>(
    conn: &C,
    id: &str,
) -> Result<vehicle::Model, DomainError> {
    let vehicle = Vehicle::find_by_id(id.to_owned())
        .filter(vehicle::Column::IsDeleted.eq(false))
        .one(conn)
        .await?
        .ok_or_else(|| DomainError::Validation(format!("Vehicle {} does not exist", id)))?;

    if !vehicle.is_active {
        return Err(DomainError::Validation(format!(
            "Vehicle {} is not active",
            vehicle.registration_number
        )));
    }
    Ok(vehicle)
}

async fn check_references<C: ConnectionTrait>(
    conn: &C,
    supplier_id: &Option<String>,
    customer_id: &Option<String>,
    vehicle_id: &Option<String>,
) -> Result<(), DomainError> {
    if let Some(id) = supplier_id {
        ensure_live_supplier(conn, id).await?;
    }
    if let Some(id) = customer_id {
        ensure_live_customer(conn, id).await?;
    }
    if let Some(id) = vehicle_id {
        ensure_usable_vehicle(conn, id).await?;
    }
    Ok(())
}

async fn find_live_delivery<C: ConnectionTrait>(
    conn: &C,
    id: &str,
) -> Result<delivery::Model, DomainError> {
    Delivery::find_by_id(id.to_owned())
        .filter(delivery::Column::IsDeleted.eq(false))
        .one(conn)
        .await?
        .ok_or_else(|| DomainError::not_found("Delivery", id))
}

/// Load a delivery that can still be edited
async fn find_open_delivery<C: ConnectionTrait>(
    conn: &C,
    id: &str,
) -> Result<delivery::Model, DomainError> {
    let delivery = find_live_delivery(conn, id).await?;
    let status = parse_status(&delivery.status)?;
    if !status.is_open() {
        return Err(DomainError::InvalidState(format!(
            "Delivery {} is {} and can no longer be changed",
            delivery.reference, delivery.status
        )));
    }
    Ok(delivery)
}

async fn live_items<C: ConnectionTrait>(
    conn: &C,
    delivery_id: &str,
) -> Result<Vec<delivery_item::Model>, DomainError> {
    Ok(DeliveryItem::find()
        .filter(delivery_item::Column::DeliveryId.eq(delivery_id))
        .filter(delivery_item::Column::IsDeleted.eq(false))
        .order_by_asc(delivery_item::Column::CreatedAt)
        .order_by_asc(delivery_item::Column::Id)
        .all(conn)
        .await?)
}

async fn insert_item<C: ConnectionTrait>(
    conn: &C,
    delivery_id: &str,
    input: DeliveryItemInput,
) -> Result<delivery_item::Model, DomainError> {
    let quantity = validate_quantity(input.quantity)?;
    let unit_price = validate_unit_price(input.unit_price)?;
    find_live_product(conn, &input.product_id)
        .await
        .map_err(|e| {
            missing_product(e, format!("Product {} does not exist", input.product_id))
        })?;

    let now = now_timestamp();
    Ok(delivery_item::ActiveModel {
        id: Set(new_id()),
        delivery_id: Set(delivery_id.to_string()),
        product_id: Set(input.product_id),
        quantity: Set(quantity),
        unit_price: Set(unit_price),
        is_processed: Set(false),
        is_deleted: Set(false),
        deleted_date: Set(None),
        created_at: Set(now.clone()),
        updated_at: Set(now),
    }
    .insert(conn)
    .await?)
}

async fn with_details<C: ConnectionTrait>(
    conn: &C,
    delivery: delivery::Model,
) -> Result<DeliveryWithItems, DomainError> {
    let items = live_items(conn, &delivery.id).await?;

    let product_ids: Vec<String> = items.iter().map(|i| i.product_id.clone()).collect();
    let mut products: HashMap<String, product::Model> = HashMap::new();
    if !product_ids.is_empty() {
        for p in Product::find()
            .filter(product::Column::Id.is_in(product_ids))
            .all(conn)
            .await?
        {
            products.insert(p.id.clone(), p);
        }
    }

    let supplier_name = match &delivery.supplier_id {
        Some(id) => Supplier::find_by_id(id.clone())
            .one(conn)
            .await?
            .map(|s| s.name),
        None => None,
    };
    let customer_name = match &delivery.customer_id {
        Some(id) => Customer::find_by_id(id.clone())
            .one(conn)
            .await?
            .map(|c| c.name),
        None => None,
    };
    let vehicle_registration = match &delivery.vehicle_id {
        Some(id) => Vehicle::find_by_id(id.clone())
            .one(conn)
            .await?
            .map(|v| v.registration_number),
        None => None,
    };

    let items = items
        .into_iter()
        .map(|item| {
            let product = products.get(&item.product_id);
            DeliveryItemDetails {
                product_sku: product.map(|p| p.sku.clone()),
                product_name: product.map(|p| p.name.clone()),
                item,
            }
        })
        .collect();

    Ok(DeliveryWithItems {
        delivery,
        supplier_name,
        customer_name,
        vehicle_registration,
        items,
    })
}

/// List deliveries, newest first
pub async fn list_deliveries<C: ConnectionTrait>(
    db: &C,
    filter: DeliveryFilter,
) -> Result<Vec<delivery::Model>, DomainError> {
    let mut condition = Condition::all().add(delivery::Column::IsDeleted.eq(false));

    if let Some(delivery_type) = filter.delivery_type {
        condition = condition.add(delivery::Column::DeliveryType.eq(delivery_type));
    }
    if let Some(status) = filter.status {
        condition = condition.add(delivery::Column::Status.eq(status));
    }
    if let Some(supplier_id) = filter.supplier_id {
        condition = condition.add(delivery::Column::SupplierId.eq(supplier_id));
    }
    if let Some(customer_id) = filter.customer_id {
        condition = condition.add(delivery::Column::CustomerId.eq(customer_id));
    }
    if let Some(vehicle_id) = filter.vehicle_id {
        condition = condition.add(delivery::Column::VehicleId.eq(vehicle_id));
    }
    if let Some(from) = filter.from {
        condition = condition.add(delivery::Column::ScheduledDate.gte(from));
    }
    if let Some(to) = filter.to {
        condition = condition.add(delivery::Column::ScheduledDate.lte(to));
    }

    Ok(Delivery::find()
        .filter(condition)
        .order_by_desc(delivery::Column::CreatedAt)
        .all(db)
        .await?)
}

/// Get a delivery with its items
pub async fn get_delivery<C: ConnectionTrait>(
    db: &C,
    id: &str,
) -> Result<DeliveryWithItems, DomainError> {
    let delivery = find_live_delivery(db, id).await?;
    with_details(db, delivery).await
}

/// Create a delivery, optionally with its items
pub async fn create_delivery<C>(
    db: &C,
    input: CreateDeliveryInput,
) -> Result<DeliveryWithItems, DomainError>
where
    C: ConnectionTrait + TransactionTrait,
{
    let delivery_type = parse_type(&input.delivery_type)?;
    let supplier_id = optional_text(input.supplier_id);
    let customer_id = optional_text(input.customer_id);
    let vehicle_id = optional_text(input.vehicle_id);
    check_parties(delivery_type, &supplier_id, &customer_id)?;

    let txn = db.begin().await?;

    check_references(&txn, &supplier_id, &customer_id, &vehicle_id).await?;

    let id = new_id();
    let reference = match optional_text(input.reference) {
        Some(reference) => required_text("reference", &reference)?,
        None => format!(
            "{}-{}-{}",
            delivery_type.reference_prefix(),
            today_compact(),
            id[..6].to_uppercase()
        ),
    };

    let taken = Delivery::find()
        .filter(delivery::Column::Reference.eq(reference.as_str()))
        .count(&txn)
        .await?;
    if taken > 0 {
        return Err(DomainError::Conflict(format!(
            "Delivery reference {} is already used",
            reference
        )));
    }

    let now = now_timestamp();
    let saved = delivery::ActiveModel {
        id: Set(id.clone()),
        reference: Set(reference),
        delivery_type: Set(delivery_type.as_str().to_string()),
        supplier_id: Set(supplier_id),
        customer_id: Set(customer_id),
        vehicle_id: Set(vehicle_id),
        scheduled_date: Set(optional_text(input.scheduled_date)),
        delivered_date: Set(None),
        status: Set(DeliveryStatus::Pending.as_str().to_string()),
        notes: Set(optional_text(input.notes)),
        is_deleted: Set(false),
        deleted_date: Set(None),
        created_at: Set(now.clone()),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await?;

    for item in input.items {
        insert_item(&txn, &id, item).await?;
    }

    let created = with_details(&txn, saved).await?;
    txn.commit().await?;

    tracing::info!(
        "Created {} delivery {} with {} item(s)",
        created.delivery.delivery_type,
        created.delivery.reference,
        created.items.len()
    );

    Ok(created)
}

/// Update the header of an open delivery
pub async fn update_delivery<C: ConnectionTrait>(
    db: &C,
    id: &str,
    input: UpdateDeliveryInput,
) -> Result<delivery::Model, DomainError> {
    let existing = find_open_delivery(db, id).await?;
    let delivery_type = parse_type(&existing.delivery_type)?;

    let supplier_id = match input.supplier_id {
        Some(value) => optional_text(Some(value)),
        None => existing.supplier_id.clone(),
    };
    let customer_id = match input.customer_id {
        Some(value) => optional_text(Some(value)),
        None => existing.customer_id.clone(),
    };
    let vehicle_id = match input.vehicle_id {
        Some(value) => optional_text(Some(value)),
        None => existing.vehicle_id.clone(),
    };
    check_parties(delivery_type, &supplier_id, &customer_id)?;

    // Only re-check references that actually changed
    let changed = |new: &Option<String>, old: &Option<String>| {
        if new != old { new.clone() } else { None }
    };
    check_references(
        db,
        &changed(&supplier_id, &existing.supplier_id),
        &changed(&customer_id, &existing.customer_id),
        &changed(&vehicle_id, &existing.vehicle_id),
    )
    .await?;

    let mut active: delivery::ActiveModel = existing.into();
    active.supplier_id = Set(supplier_id);
    active.customer_id = Set(customer_id);
    active.vehicle_id = Set(vehicle_id);
    if input.scheduled_date.is_some() {
        active.scheduled_date = Set(optional_text(input.scheduled_date));
    }
    if input.notes.is_some() {
        active.notes = Set(optional_text(input.notes));
    }
    active.updated_at = Set(now_timestamp());

    Ok(active.update(db).await?)
}

/// Add an item to an open delivery
pub async fn add_item<C: ConnectionTrait>(
    db: &C,
    delivery_id: &str,
    input: DeliveryItemInput,
) -> Result<delivery_item::Model, DomainError> {
    find_open_delivery(db, delivery_id).await?;
    insert_item(db, delivery_id, input).await
}

async fn find_item_of<C: ConnectionTrait>(
    conn: &C,
    delivery_id: &str,
    item_id: &str,
) -> Result<delivery_item::Model, DomainError> {
    DeliveryItem::find_by_id(item_id.to_owned())
        .filter(delivery_item::Column::DeliveryId.eq(delivery_id))
        .filter(delivery_item::Column::IsDeleted.eq(false))
        .one(conn)
        .await?
        .ok_or_else(|| DomainError::not_found("Delivery item", item_id))
}

/// Change quantity or price of an item on an open delivery
pub async fn update_item<C: ConnectionTrait>(
    db: &C,
    delivery_id: &str,
    item_id: &str,
    input: UpdateItemInput,
) -> Result<delivery_item::Model, DomainError> {
    find_open_delivery(db, delivery_id).await?;
    let item = find_item_of(db, delivery_id, item_id).await?;

    let mut active: delivery_item::ActiveModel = item.into();
    if let Some(quantity) = input.quantity {
        active.quantity = Set(validate_quantity(quantity)?);
    }
    if input.unit_price.is_some() {
        active.unit_price = Set(validate_unit_price(input.unit_price)?);
    }
    active.updated_at = Set(now_timestamp());

    Ok(active.update(db).await?)
}

/// Soft delete an item from an open delivery
pub async fn remove_item<C: ConnectionTrait>(
    db: &C,
    delivery_id: &str,
    item_id: &str,
) -> Result<delivery_item::Model, DomainError> {
    find_open_delivery(db, delivery_id).await?;
    let item = find_item_of(db, delivery_id, item_id).await?;

    let now = now_timestamp();
    let mut active: delivery_item::ActiveModel = item.into();
    active.is_deleted = Set(true);
    active.deleted_date = Set(Some(now.clone()));
    active.updated_at = Set(now);

    Ok(active.update(db).await?)
}

async fn set_status<C: ConnectionTrait>(
    conn: &C,
    delivery: delivery::Model,
    status: DeliveryStatus,
) -> Result<delivery::Model, DomainError> {
    let mut active: delivery::ActiveModel = delivery.into();
    active.status = Set(status.as_str().to_string());
    active.updated_at = Set(now_timestamp());
    Ok(active.update(conn).await?)
}

/// Mark a pending delivery as on its way
pub async fn dispatch_delivery<C: ConnectionTrait>(
    db: &C,
    id: &str,
) -> Result<delivery::Model, DomainError> {
    let delivery = find_live_delivery(db, id).await?;
    if parse_status(&delivery.status)? != DeliveryStatus::Pending {
        return Err(DomainError::InvalidState(format!(
            "Only pending deliveries can be dispatched (delivery {} is {})",
            delivery.reference, delivery.status
        )));
    }
    if live_items(db, id).await?.is_empty() {
        return Err(DomainError::Validation(
            "Delivery has no items".to_string(),
        ));
    }

    let updated = set_status(db, delivery, DeliveryStatus::InTransit).await?;
    tracing::info!("Delivery {} dispatched", updated.reference);
    Ok(updated)
}

/// Cancel a delivery that has not been processed
pub async fn cancel_delivery<C: ConnectionTrait>(
    db: &C,
    id: &str,
) -> Result<delivery::Model, DomainError> {
    let delivery = find_open_delivery(db, id).await?;
    let updated = set_status(db, delivery, DeliveryStatus::Cancelled).await?;
    tracing::info!("Delivery {} cancelled", updated.reference);
    Ok(updated)
}

/// Soft delete a delivery and its items. Completed deliveries are kept.
pub async fn delete_delivery<C>(db: &C, id: &str) -> Result<delivery::Model, DomainError>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;

    let delivery = find_live_delivery(&txn, id).await?;
    if parse_status(&delivery.status)? == DeliveryStatus::Completed {
        return Err(DomainError::InvalidState(format!(
            "Delivery {} is completed and part of the stock history",
            delivery.reference
        )));
    }

    let now = now_timestamp();
    for item in live_items(&txn, id).await? {
        let mut active: delivery_item::ActiveModel = item.into();
        active.is_deleted = Set(true);
        active.deleted_date = Set(Some(now.clone()));
        active.updated_at = Set(now.clone());
        active.update(&txn).await?;
    }

    let mut active: delivery::ActiveModel = delivery.into();
    active.is_deleted = Set(true);
    active.deleted_date = Set(Some(now.clone()));
    active.updated_at = Set(now);
    let deleted = active.update(&txn).await?;

    txn.commit().await?;

    tracing::info!("Soft-deleted delivery {}", deleted.reference);
    Ok(deleted)
}

/// Receive (incoming) or ship (outgoing) a delivery.
///
/// Everything happens in one transaction; on any error nothing is written.
pub async fn process_delivery<C>(
    db: &C,
    id: &str,
    processed_by: Option<String>,
) -> Result<ProcessedDelivery, DomainError>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;

    let delivery = find_live_delivery(&txn, id).await?;
    match parse_status(&delivery.status)? {
        DeliveryStatus::Completed => {
            return Err(DomainError::InvalidState(format!(
                "Delivery {} has already been processed",
                delivery.reference
            )));
        }
        DeliveryStatus::Cancelled => {
            return Err(DomainError::InvalidState(format!(
                "Delivery {} is cancelled",
                delivery.reference
            )));
        }
        DeliveryStatus::Pending | DeliveryStatus::InTransit => {}
    }
    let delivery_type = parse_type(&delivery.delivery_type)?;

    let items = live_items(&txn, id).await?;
    if items.is_empty() {
        return Err(DomainError::Validation(
            "Delivery has no items".to_string(),
        ));
    }

    // Total requested per product, keyed in a stable order
    let mut requested: BTreeMap<String, i32> = BTreeMap::new();
    for item in &items {
        validate_quantity(item.quantity)?;
        let total = requested.entry(item.product_id.clone()).or_insert(0);
        *total = total
            .checked_add(item.quantity)
            .ok_or_else(|| quantity_out_of_range(&item.product_id, &delivery.reference))?;
    }

    let mut products: HashMap<String, product::Model> = HashMap::new();
    for product_id in requested.keys() {
        let product = find_live_product(&txn, product_id).await.map_err(|e| {
            missing_product(
                e,
                format!(
                    "Product {} on delivery {} no longer exists",
                    product_id, delivery.reference
                ),
            )
        })?;
        products.insert(product_id.clone(), product);
    }

    if delivery_type == DeliveryType::Outgoing {
        for (product_id, quantity) in &requested {
            let product = &products[product_id];
            if product.stock_quantity < *quantity {
                tracing::warn!(
                    "Cannot ship {}: {} of {} available",
                    delivery.reference,
                    product.stock_quantity,
                    quantity
                );
                return Err(DomainError::InsufficientStock {
                    product_id: product.id.clone(),
                    sku: product.sku.clone(),
                    available: product.stock_quantity,
                    requested: *quantity,
                });
            }
        }
    }

    let reason = match delivery_type {
        DeliveryType::Incoming => AdjustmentReason::DeliveryReceived,
        DeliveryType::Outgoing => AdjustmentReason::DeliveryShipped,
    };
    let direction = delivery_type.stock_direction();
    let now = now_timestamp();

    let mut running: HashMap<String, i32> = products
        .iter()
        .map(|(id, p)| (id.clone(), p.stock_quantity))
        .collect();
    let mut adjustments = Vec::with_capacity(items.len());

    for item in items {
        let change = item
            .quantity
            .checked_mul(direction)
            .ok_or_else(|| quantity_out_of_range(&item.product_id, &delivery.reference))?;
        let previous = running[&item.product_id];
        let next = previous
            .checked_add(change)
            .ok_or_else(|| quantity_out_of_range(&item.product_id, &delivery.reference))?;
        running.insert(item.product_id.clone(), next);

        let adjustment = stock_adjustment::ActiveModel {
            id: Set(derive_id(&item.id, "stock-adjustment")),
            product_id: Set(item.product_id.clone()),
            delivery_id: Set(Some(delivery.id.clone())),
            quantity_change: Set(change),
            previous_quantity: Set(previous),
            new_quantity: Set(next),
            reason: Set(reason.as_str().to_string()),
            notes: Set(Some(format!("Delivery {}", delivery.reference))),
            adjusted_by: Set(processed_by.clone()),
            is_deleted: Set(false),
            deleted_date: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now.clone()),
        }
        .insert(&txn)
        .await?;
        adjustments.push(adjustment);

        let mut active: delivery_item::ActiveModel = item.into();
        active.is_processed = Set(true);
        active.updated_at = Set(now.clone());
        active.update(&txn).await?;
    }

    let mut alerts = Vec::new();
    for (product_id, product) in products {
        let mut active: product::ActiveModel = product.into();
        active.stock_quantity = Set(running[&product_id]);
        active.updated_at = Set(now.clone());
        let updated = active.update(&txn).await?;

        if let Some(alert) =
            stock_service::evaluate_stock_level(&txn, &updated, &delivery.id).await?
        {
            alerts.push(alert);
        }
    }

    let reference = delivery.reference.clone();
    let mut active: delivery::ActiveModel = delivery.into();
    active.status = Set(DeliveryStatus::Completed.as_str().to_string());
    active.delivered_date = Set(Some(now.clone()));
    active.updated_at = Set(now);
    let delivery = active.update(&txn).await?;

    txn.commit().await?;

    tracing::info!(
        "Processed {} delivery {}: {} adjustment(s), {} alert(s)",
        delivery.delivery_type,
        reference,
        adjustments.len(),
        alerts.len()
    );

    Ok(ProcessedDelivery {
        delivery,
        adjustments,
        alerts,
    })
}

/// Count open deliveries of a type (pending or in transit)
pub async fn count_open_deliveries<C: ConnectionTrait>(
    db: &C,
    delivery_type: DeliveryType,
) -> Result<u64, DomainError> {
    Ok(Delivery::find()
        .filter(delivery::Column::IsDeleted.eq(false))
        .filter(delivery::Column::DeliveryType.eq(delivery_type.as_str()))
        .filter(delivery::Column::Status.is_in([
            DeliveryStatus::Pending.as_str(),
            DeliveryStatus::InTransit.as_str(),
        ]))
        .count(db)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_party_rules() {
        let some = Some("x".to_string());
        assert!(check_parties(DeliveryType::Incoming, &some, &None).is_ok());
        assert!(check_parties(DeliveryType::Incoming, &None, &None).is_err());
        assert!(check_parties(DeliveryType::Incoming, &some, &some).is_err());
        assert!(check_parties(DeliveryType::Outgoing, &None, &some).is_ok());
        assert!(check_parties(DeliveryType::Outgoing, &some, &some).is_err());
        assert!(check_parties(DeliveryType::Outgoing, &None, &None).is_err());
    }

    #[test]
    fn test_item_validation() {
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-2).is_err());
        assert_eq!(validate_quantity(3).unwrap(), 3);
        assert!(validate_quantity(stock_service::MAX_MOVEMENT).is_ok());
        assert!(validate_quantity(stock_service::MAX_MOVEMENT + 1).is_err());
        assert!(validate_quantity(i32::MAX).is_err());
        assert!(validate_unit_price(Some(-0.5)).is_err());
        assert_eq!(validate_unit_price(None).unwrap(), None);
    }

    #[test]
    fn test_only_missing_products_become_validation_errors() {
        let missing = missing_product(
            DomainError::not_found("Product", "p-1"),
            "Product p-1 does not exist".to_string(),
        );
        assert_eq!(
            missing,
            DomainError::Validation("Product p-1 does not exist".to_string())
        );

        let broken = missing_product(
            DomainError::Database("disk I/O error".to_string()),
            "Product p-1 does not exist".to_string(),
        );
        assert!(matches!(broken, DomainError::Database(_)));
    }

    #[tokio::test]
    async fn test_add_item_surfaces_storage_errors() {
        use crate::domain::{CreatePartyInput, CustomerRepository};
        use crate::infrastructure::SeaOrmCustomerRepository;

        let db = crate::db::init_db("sqlite::memory:").await.unwrap();
        let customer = SeaOrmCustomerRepository::new(db.clone())
            .create(CreatePartyInput {
                name: "Kiosk".to_string(),
                contact_person: None,
                email: None,
                phone: None,
                address: None,
                notes: None,
            })
            .await
            .unwrap();
        let open = create_delivery(
            &db,
            CreateDeliveryInput {
                reference: None,
                delivery_type: "outgoing".to_string(),
                supplier_id: None,
                customer_id: Some(customer.id),
                vehicle_id: None,
                scheduled_date: None,
                notes: None,
                items: vec![],
            },
        )
        .await
        .unwrap();

        db.execute_unprepared("DROP TABLE products").await.unwrap();
        let err = add_item(
            &db,
            &open.delivery.id,
            DeliveryItemInput {
                product_id: "p-1".to_string(),
                quantity: 1,
                unit_price: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DomainError::Database(_)));
    }
}
