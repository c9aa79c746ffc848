//! Services Layer
//!
//! Business workflows extracted from HTTP handlers. Every function is generic
//! over the SeaORM connection so the sync processor can run the same code
//! inside its own transactions.

pub mod delivery_service;
pub mod product_service;
pub mod report_service;
pub mod stock_service;
