//! Report Service - inventory summary and data export

use sea_orm::*;
use serde::Serialize;
use std::collections::HashMap;

use crate::domain::DomainError;
use crate::models::{
    DeliveryType, customer, delivery, delivery_item,
    product::{self, Entity as Product},
    stock_adjustment, stock_alert,
    supplier::{self, Entity as Supplier},
    vehicle,
};
use crate::services::{delivery_service, product_service, stock_service};
use crate::utils::now_timestamp;

pub const BACKUP_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InventorySummary {
    pub total_products: u64,
    pub low_stock_products: u64,
    pub out_of_stock_products: u64,
    pub open_alerts: u64,
    pub open_incoming_deliveries: u64,
    pub open_outgoing_deliveries: u64,
    pub total_units: i64,
    /// Stock valued at cost price, unit price when no cost is recorded
    pub total_stock_value: f64,
}

/// Full dump of every synchronised table, tombstones included
#[derive(Debug, Serialize)]
pub struct BackupData {
    pub version: String,
    pub timestamp: String,
    pub suppliers: Vec<supplier::Model>,
    pub customers: Vec<customer::Model>,
    pub vehicles: Vec<vehicle::Model>,
    pub products: Vec<product::Model>,
    pub deliveries: Vec<delivery::Model>,
    pub delivery_items: Vec<delivery_item::Model>,
    pub stock_adjustments: Vec<stock_adjustment::Model>,
    pub stock_alerts: Vec<stock_alert::Model>,
}

#[derive(Debug, Serialize)]
struct StockSheetRow<'a> {
    sku: &'a str,
    name: &'a str,
    unit: &'a str,
    stock_quantity: i32,
    reorder_level: i32,
    unit_price: f64,
    supplier: &'a str,
}

async fn live_products<C: ConnectionTrait>(db: &C) -> Result<Vec<product::Model>, DomainError> {
    Ok(Product::find()
        .filter(product::Column::IsDeleted.eq(false))
        .order_by_asc(product::Column::Sku)
        .all(db)
        .await?)
}

pub async fn inventory_summary<C: ConnectionTrait>(
    db: &C,
) -> Result<InventorySummary, DomainError> {
    let products = live_products(db).await?;

    let low_stock_products = products.iter().filter(|p| p.is_low_stock()).count() as u64;
    let out_of_stock_products = products.iter().filter(|p| p.stock_quantity <= 0).count() as u64;
    let total_units = products.iter().map(|p| p.stock_quantity as i64).sum();
    let total_stock_value = products
        .iter()
        .map(|p| p.stock_quantity as f64 * p.cost_price.unwrap_or(p.unit_price))
        .sum();

    Ok(InventorySummary {
        total_products: product_service::count_products(db).await?,
        low_stock_products,
        out_of_stock_products,
        open_alerts: stock_service::count_open_alerts(db).await?,
        open_incoming_deliveries: delivery_service::count_open_deliveries(
            db,
            DeliveryType::Incoming,
        )
        .await?,
        open_outgoing_deliveries: delivery_service::count_open_deliveries(
            db,
            DeliveryType::Outgoing,
        )
        .await?,
        total_units,
        total_stock_value,
    })
}

pub async fn export_backup<C: ConnectionTrait>(db: &C) -> Result<BackupData, DomainError> {
    Ok(BackupData {
        version: BACKUP_VERSION.to_string(),
        timestamp: now_timestamp(),
        suppliers: supplier::Entity::find().all(db).await?,
        customers: customer::Entity::find().all(db).await?,
        vehicles: vehicle::Entity::find().all(db).await?,
        products: Product::find().all(db).await?,
        deliveries: delivery::Entity::find().all(db).await?,
        delivery_items: delivery_item::Entity::find().all(db).await?,
        stock_adjustments: stock_adjustment::Entity::find().all(db).await?,
        stock_alerts: stock_alert::Entity::find().all(db).await?,
    })
}

/// Current stock sheet as CSV, one line per live product ordered by SKU
pub async fn export_stock_csv<C: ConnectionTrait>(db: &C) -> Result<String, DomainError> {
    let products = live_products(db).await?;
    let suppliers: HashMap<String, String> = Supplier::find()
        .all(db)
        .await?
        .into_iter()
        .map(|s| (s.id, s.name))
        .collect();

    let mut writer = csv::Writer::from_writer(Vec::new());
    for p in &products {
        let supplier = p
            .supplier_id
            .as_ref()
            .and_then(|id| suppliers.get(id))
            .map(String::as_str)
            .unwrap_or("");
        writer
            .serialize(StockSheetRow {
                sku: &p.sku,
                name: &p.name,
                unit: &p.unit,
                stock_quantity: p.stock_quantity,
                reorder_level: p.reorder_level,
                unit_price: p.unit_price,
                supplier,
            })
            .map_err(|e| DomainError::Internal(format!("CSV error: {}", e)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| DomainError::Internal(format!("CSV error: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| DomainError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::services::product_service::{CreateProductInput, create_product};

    fn product(sku: &str, stock: i32, reorder: i32, cost: Option<f64>) -> CreateProductInput {
        CreateProductInput {
            sku: sku.to_string(),
            name: format!("Product {}", sku),
            description: None,
            unit: None,
            unit_price: 2.0,
            cost_price: cost,
            stock_quantity: Some(stock),
            reorder_level: Some(reorder),
            supplier_id: None,
        }
    }

    #[tokio::test]
    async fn test_inventory_summary_values_stock() {
        let db = init_db("sqlite::memory:").await.unwrap();
        create_product(&db, product("A-1", 10, 2, Some(1.5)), None)
            .await
            .unwrap();
        create_product(&db, product("B-1", 1, 5, None), None)
            .await
            .unwrap();
        create_product(&db, product("C-1", 0, 0, None), None)
            .await
            .unwrap();

        let summary = inventory_summary(&db).await.unwrap();
        assert_eq!(summary.total_products, 3);
        assert_eq!(summary.low_stock_products, 2);
        assert_eq!(summary.out_of_stock_products, 1);
        assert_eq!(summary.open_alerts, 2);
        assert_eq!(summary.total_units, 11);
        assert!((summary.total_stock_value - 17.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_stock_csv_has_header_and_rows() {
        let db = init_db("sqlite::memory:").await.unwrap();
        create_product(&db, product("ZZ-9", 4, 1, None), None)
            .await
            .unwrap();

        let csv = export_stock_csv(&db).await.unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("sku,name,unit,stock_quantity,reorder_level,unit_price,supplier")
        );
        assert_eq!(lines.next(), Some("ZZ-9,Product ZZ-9,pcs,4,1,2.0,"));
    }
}
