use crate::api;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::health::health_check,
        api::auth::login,
        api::auth::create_admin,
        api::suppliers::create_supplier,
        api::customers::create_customer,
        api::products::create_product,
        api::deliveries::get_delivery,
        api::deliveries::create_delivery,
        api::deliveries::process_delivery,
        api::stock::adjust_stock,
        api::sync::push_operations,
    ),
    tags(
        (name = "stockroute", description = "Stockroute inventory & delivery API")
    )
)]
pub struct ApiDoc;
