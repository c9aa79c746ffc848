use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Audit row for every stock movement. Rows are written once and never edited.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_adjustments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub product_id: String,
    pub delivery_id: Option<String>,
    pub quantity_change: i32,
    pub previous_quantity: i32,
    pub new_quantity: i32,
    pub reason: String,
    pub notes: Option<String>,
    pub adjusted_by: Option<String>,
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
    #[sea_orm(
        belongs_to = "super::delivery::Entity",
        from = "Column::DeliveryId",
        to = "super::delivery::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    Delivery,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::delivery::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Delivery.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentReason {
    DeliveryReceived,
    DeliveryShipped,
    OpeningBalance,
    Manual,
    Damaged,
    Lost,
    Found,
    Returned,
    Correction,
}

impl AdjustmentReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentReason::DeliveryReceived => "delivery_received",
            AdjustmentReason::DeliveryShipped => "delivery_shipped",
            AdjustmentReason::OpeningBalance => "opening_balance",
            AdjustmentReason::Manual => "manual",
            AdjustmentReason::Damaged => "damaged",
            AdjustmentReason::Lost => "lost",
            AdjustmentReason::Found => "found",
            AdjustmentReason::Returned => "returned",
            AdjustmentReason::Correction => "correction",
        }
    }

    /// Reasons reserved for delivery processing cannot be used by hand.
    pub fn is_manual(&self) -> bool {
        !matches!(
            self,
            AdjustmentReason::DeliveryReceived | AdjustmentReason::DeliveryShipped
        )
    }
}

impl FromStr for AdjustmentReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delivery_received" => Ok(AdjustmentReason::DeliveryReceived),
            "delivery_shipped" => Ok(AdjustmentReason::DeliveryShipped),
            "opening_balance" => Ok(AdjustmentReason::OpeningBalance),
            "manual" => Ok(AdjustmentReason::Manual),
            "damaged" => Ok(AdjustmentReason::Damaged),
            "lost" => Ok(AdjustmentReason::Lost),
            "found" => Ok(AdjustmentReason::Found),
            "returned" => Ok(AdjustmentReason::Returned),
            "correction" => Ok(AdjustmentReason::Correction),
            other => Err(format!("Unknown adjustment reason: {}", other)),
        }
    }
}
