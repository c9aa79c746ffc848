pub mod auth;
pub mod customers;
pub mod deliveries;
pub mod error;
pub mod export;
pub mod health;
pub mod products;
pub mod stock;
pub mod suppliers;
pub mod sync;
pub mod vehicles;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::infrastructure::AppState;

pub fn api_router_with_state(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Auth
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::create_admin))
        .route("/auth/me", get(auth::get_me))
        // Reference data
        .route(
            "/suppliers",
            get(suppliers::list_suppliers).post(suppliers::create_supplier),
        )
        .route(
            "/suppliers/:id",
            get(suppliers::get_supplier)
                .put(suppliers::update_supplier)
                .delete(suppliers::delete_supplier),
        )
        .route(
            "/customers",
            get(customers::list_customers).post(customers::create_customer),
        )
        .route(
            "/customers/:id",
            get(customers::get_customer)
                .put(customers::update_customer)
                .delete(customers::delete_customer),
        )
        .route(
            "/vehicles",
            get(vehicles::list_vehicles).post(vehicles::create_vehicle),
        )
        .route(
            "/vehicles/:id",
            get(vehicles::get_vehicle)
                .put(vehicles::update_vehicle)
                .delete(vehicles::delete_vehicle),
        )
        // Products
        .route(
            "/products",
            get(products::list_products).post(products::create_product),
        )
        .route(
            "/products/:id",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        )
        // Deliveries
        .route(
            "/deliveries",
            get(deliveries::list_deliveries).post(deliveries::create_delivery),
        )
        .route(
            "/deliveries/:id",
            get(deliveries::get_delivery)
                .put(deliveries::update_delivery)
                .delete(deliveries::delete_delivery),
        )
        .route("/deliveries/:id/items", post(deliveries::add_item))
        .route(
            "/deliveries/:id/items/:item_id",
            put(deliveries::update_item).delete(deliveries::remove_item),
        )
        .route("/deliveries/:id/dispatch", post(deliveries::dispatch_delivery))
        .route("/deliveries/:id/cancel", post(deliveries::cancel_delivery))
        .route("/deliveries/:id/process", post(deliveries::process_delivery))
        // Stock
        .route(
            "/stock/adjustments",
            get(stock::list_adjustments).post(stock::adjust_stock),
        )
        .route("/stock/alerts", get(stock::list_alerts))
        .route("/stock/alerts/:id/resolve", post(stock::resolve_alert))
        // Reports & export
        .route("/reports/inventory", get(export::inventory_summary))
        .route("/export", get(export::export_data))
        .route("/export/stock.csv", get(export::export_stock_csv))
        // Sync
        .route("/sync/push", post(sync::push_operations))
        .route("/sync/pull", get(sync::pull_changes))
        .route("/sync/status", get(sync::sync_status))
        .route("/sync/run", post(sync::run_sync))
        .with_state(state)
}
