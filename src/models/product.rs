use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    /// Unit of measure shown next to quantities (`pcs`, `kg`, `box`...).
    pub unit: String,
    pub unit_price: f64,
    pub cost_price: Option<f64>,
    /// Quantity on hand. Only moved by delivery processing and stock
    /// adjustments, never by a plain product update.
    pub stock_quantity: i32,
    /// At or below this level the product raises a `low_stock` alert.
    pub reorder_level: i32,
    pub supplier_id: Option<String>,
    pub is_deleted: bool,
    pub deleted_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::supplier::Entity",
        from = "Column::SupplierId",
        to = "super::supplier::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    Supplier,
    #[sea_orm(has_many = "super::delivery_item::Entity")]
    DeliveryItem,
    #[sea_orm(has_many = "super::stock_adjustment::Entity")]
    StockAdjustment,
    #[sea_orm(has_many = "super::stock_alert::Entity")]
    StockAlert,
}

impl Related<super::supplier::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Supplier.def()
    }
}

impl Related<super::delivery_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DeliveryItem.def()
    }
}

impl Related<super::stock_adjustment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockAdjustment.def()
    }
}

impl Related<super::stock_alert::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockAlert.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.reorder_level
    }
}
