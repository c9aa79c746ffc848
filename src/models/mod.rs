pub mod customer;
pub mod delivery;
pub mod delivery_item;
pub mod operation_log;
pub mod product;
pub mod stock_adjustment;
pub mod stock_alert;
pub mod supplier;
pub mod sync_state;
pub mod user;
pub mod vehicle;

pub use delivery::{DeliveryStatus, DeliveryType};
pub use stock_adjustment::AdjustmentReason;
pub use stock_alert::AlertType;
