use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_alerts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub product_id: String,
    pub alert_type: String,
    pub current_quantity: i32,
    pub threshold: i32,
    pub is_resolved: bool,
    pub resolved_date: Option<String>,
    pub is_deleted: bool,
    pub deleted_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    LowStock,
    OutOfStock,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::LowStock => "low_stock",
            AlertType::OutOfStock => "out_of_stock",
        }
    }

    /// Condition for a stock level, `None` when the level is healthy.
    pub fn for_level(stock_quantity: i32, reorder_level: i32) -> Option<Self> {
        if stock_quantity <= 0 {
            Some(AlertType::OutOfStock)
        } else if stock_quantity <= reorder_level {
            Some(AlertType::LowStock)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_type_for_level() {
        assert_eq!(AlertType::for_level(0, 5), Some(AlertType::OutOfStock));
        assert_eq!(AlertType::for_level(0, 0), Some(AlertType::OutOfStock));
        assert_eq!(AlertType::for_level(5, 5), Some(AlertType::LowStock));
        assert_eq!(AlertType::for_level(3, 5), Some(AlertType::LowStock));
        assert_eq!(AlertType::for_level(6, 5), None);
    }
}
