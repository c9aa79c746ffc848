use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "deliveries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub reference: String,
    /// `incoming` (from a supplier) or `outgoing` (to a customer).
    pub delivery_type: String,
    pub supplier_id: Option<String>,
    pub customer_id: Option<String>,
    pub vehicle_id: Option<String>,
    pub scheduled_date: Option<String>,
    pub delivered_date: Option<String>,
    /// Valid values:
    /// - `pending`: created, items still editable
    /// - `in_transit`: dispatched, items still editable
    /// - `completed`: received/shipped, stock has been moved
    /// - `cancelled`: abandoned before processing
    pub status: String,
    pub notes: Option<String>,
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
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    Customer,
    #[sea_orm(
        belongs_to = "super::vehicle::Entity",
        from = "Column::VehicleId",
        to = "super::vehicle::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    Vehicle,
    #[sea_orm(has_many = "super::delivery_item::Entity")]
    DeliveryItem,
}

impl Related<super::supplier::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Supplier.def()
    }
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::vehicle::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vehicle.def()
    }
}

impl Related<super::delivery_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DeliveryItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryType {
    Incoming,
    Outgoing,
}

impl DeliveryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryType::Incoming => "incoming",
            DeliveryType::Outgoing => "outgoing",
        }
    }

    /// Sign applied to item quantities when the delivery is processed.
    pub fn stock_direction(&self) -> i32 {
        match self {
            DeliveryType::Incoming => 1,
            DeliveryType::Outgoing => -1,
        }
    }

    pub fn reference_prefix(&self) -> &'static str {
        match self {
            DeliveryType::Incoming => "IN",
            DeliveryType::Outgoing => "OUT",
        }
    }
}

impl FromStr for DeliveryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "incoming" => Ok(DeliveryType::Incoming),
            "outgoing" => Ok(DeliveryType::Outgoing),
            other => Err(format!("Unknown delivery type: {}", other)),
        }
    }
}

impl fmt::Display for DeliveryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    InTransit,
    Completed,
    Cancelled,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::InTransit => "in_transit",
            DeliveryStatus::Completed => "completed",
            DeliveryStatus::Cancelled => "cancelled",
        }
    }

    /// Header and items may still change.
    pub fn is_open(&self) -> bool {
        matches!(self, DeliveryStatus::Pending | DeliveryStatus::InTransit)
    }
}

impl FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DeliveryStatus::Pending),
            "in_transit" => Ok(DeliveryStatus::InTransit),
            "completed" => Ok(DeliveryStatus::Completed),
            "cancelled" => Ok(DeliveryStatus::Cancelled),
            other => Err(format!("Unknown delivery status: {}", other)),
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_type_parsing() {
        assert_eq!("incoming".parse::<DeliveryType>(), Ok(DeliveryType::Incoming));
        assert_eq!("outgoing".parse::<DeliveryType>(), Ok(DeliveryType::Outgoing));
        assert!("sideways".parse::<DeliveryType>().is_err());
        assert_eq!(DeliveryType::Outgoing.stock_direction(), -1);
    }

    #[test]
    fn test_open_statuses() {
        assert!(DeliveryStatus::Pending.is_open());
        assert!(DeliveryStatus::InTransit.is_open());
        assert!(!DeliveryStatus::Completed.is_open());
        assert!(!DeliveryStatus::Cancelled.is_open());
        assert_eq!(
            "in_transit".parse::<DeliveryStatus>(),
            Ok(DeliveryStatus::InTransit)
        );
    }
}
