use sea_orm::{DatabaseConnection, EntityTrait};
use stockroute::db;
use stockroute::domain::{
    CreatePartyInput, CreateVehicleInput, CustomerRepository, DomainError, SupplierRepository,
    VehicleRepository,
};
use stockroute::infrastructure::{
    SeaOrmCustomerRepository, SeaOrmSupplierRepository, SeaOrmVehicleRepository,
};
use stockroute::models::product;
use stockroute::services::delivery_service::{
    self, CreateDeliveryInput, DeliveryFilter, DeliveryItemInput, UpdateItemInput,
};
use stockroute::services::product_service::{self, CreateProductInput};
use stockroute::services::stock_service::{
    self, AdjustStockInput, AdjustmentFilter, AlertFilter, MAX_MOVEMENT,
};

async fn setup_test_db() -> DatabaseConnection {
    db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB")
}

fn party(name: &str) -> CreatePartyInput {
    CreatePartyInput {
        name: name.to_string(),
        contact_person: None,
        email: None,
        phone: None,
        address: None,
        notes: None,
    }
}

async fn create_product(db: &DatabaseConnection, sku: &str, stock: i32, reorder: i32) -> String {
    product_service::create_product(
        db,
        CreateProductInput {
            sku: sku.to_string(),
            name: format!("Product {}", sku),
            description: None,
            unit: None,
            unit_price: 4.0,
            cost_price: Some(2.0),
            stock_quantity: Some(stock),
            reorder_level: Some(reorder),
            supplier_id: None,
        },
        None,
    )
    .await
    .expect("create product")
    .product
    .id
}

async fn stock_of(db: &DatabaseConnection, product_id: &str) -> i32 {
    product::Entity::find_by_id(product_id.to_string())
        .one(db)
        .await
        .unwrap()
        .unwrap()
        .stock_quantity
}

fn item(product_id: &str, quantity: i32) -> DeliveryItemInput {
    DeliveryItemInput {
        product_id: product_id.to_string(),
        quantity,
        unit_price: None,
    }
}

fn outgoing(customer_id: &str, items: Vec<DeliveryItemInput>) -> CreateDeliveryInput {
    CreateDeliveryInput {
        reference: None,
        delivery_type: "outgoing".to_string(),
        supplier_id: None,
        customer_id: Some(customer_id.to_string()),
        vehicle_id: None,
        scheduled_date: Some("2026-10-20".to_string()),
        notes: None,
        items,
    }
}

#[tokio::test]
async fn test_incoming_delivery_adds_stock() {
    let db = setup_test_db().await;
    let supplier = SeaOrmSupplierRepository::new(db.clone())
        .create(party("Acme"))
        .await
        .unwrap();
    let bolts = create_product(&db, "BOLT", 5, 10).await;
    let nuts = create_product(&db, "NUT", 0, 0).await;

    let created = delivery_service::create_delivery(
        &db,
        CreateDeliveryInput {
            reference: Some("PO-1001".to_string()),
            delivery_type: "incoming".to_string(),
            supplier_id: Some(supplier.id.clone()),
            customer_id: None,
            vehicle_id: None,
            scheduled_date: None,
            notes: None,
            items: vec![item(&bolts, 20), item(&nuts, 7)],
        },
    )
    .await
    .unwrap();
    assert_eq!(created.delivery.reference, "PO-1001");
    assert_eq!(created.items.len(), 2);
    assert_eq!(created.items[0].product_sku.as_deref(), Some("BOLT"));

    let processed =
        delivery_service::process_delivery(&db, &created.delivery.id, Some("alice".to_string()))
            .await
            .unwrap();

    assert_eq!(processed.delivery.status, "completed");
    assert!(processed.delivery.delivered_date.is_some());
    assert_eq!(processed.adjustments.len(), 2);
    assert!(processed
        .adjustments
        .iter()
        .all(|a| a.reason == "delivery_received" && a.adjusted_by.as_deref() == Some("alice")));
    assert_eq!(stock_of(&db, &bolts).await, 25);
    assert_eq!(stock_of(&db, &nuts).await, 7);

    // Both starting alerts (low stock on bolts, out of stock on nuts) are closed
    let open = stock_service::list_alerts(
        &db,
        AlertFilter {
            resolved: Some(false),
            product_id: None,
        },
    )
    .await
    .unwrap();
    assert!(open.is_empty());

    let items = delivery_service::get_delivery(&db, &created.delivery.id)
        .await
        .unwrap()
        .items;
    assert!(items.iter().all(|i| i.item.is_processed));
}

#[tokio::test]
async fn test_outgoing_delivery_checks_stock_first() {
    let db = setup_test_db().await;
    let customer = SeaOrmCustomerRepository::new(db.clone())
        .create(party("Corner Shop"))
        .await
        .unwrap();
    let glue = create_product(&db, "GLUE", 10, 3).await;
    let tape = create_product(&db, "TAPE", 2, 0).await;

    let created = delivery_service::create_delivery(
        &db,
        outgoing(&customer.id, vec![item(&glue, 4), item(&tape, 5)]),
    )
    .await
    .unwrap();
    assert!(created.delivery.reference.starts_with("OUT-"));

    let err = delivery_service::process_delivery(&db, &created.delivery.id, None)
        .await
        .unwrap_err();
    match err {
        DomainError::InsufficientStock {
            sku,
            available,
            requested,
            ..
        } => {
            assert_eq!(sku, "TAPE");
            assert_eq!(available, 2);
            assert_eq!(requested, 5);
        }
        other => panic!("unexpected error: {:?}", other),
    }

    // Nothing moved
    assert_eq!(stock_of(&db, &glue).await, 10);
    assert_eq!(stock_of(&db, &tape).await, 2);
    let still_open = delivery_service::get_delivery(&db, &created.delivery.id)
        .await
        .unwrap();
    assert_eq!(still_open.delivery.status, "pending");

    // Trim the order to what is available and ship it
    let tape_item = still_open
        .items
        .iter()
        .find(|i| i.item.product_id == tape)
        .unwrap();
    delivery_service::update_item(
        &db,
        &created.delivery.id,
        &tape_item.item.id,
        UpdateItemInput {
            quantity: Some(2),
            unit_price: None,
        },
    )
    .await
    .unwrap();

    let processed = delivery_service::process_delivery(&db, &created.delivery.id, None)
        .await
        .unwrap();
    assert!(processed
        .adjustments
        .iter()
        .all(|a| a.reason == "delivery_shipped" && a.quantity_change < 0));
    assert_eq!(stock_of(&db, &glue).await, 6);
    assert_eq!(stock_of(&db, &tape).await, 0);
    assert_eq!(processed.alerts.len(), 1);
    assert_eq!(processed.alerts[0].alert_type, "out_of_stock");
    assert_eq!(processed.alerts[0].product_id, tape);
}

#[tokio::test]
async fn test_same_product_twice_on_one_delivery() {
    let db = setup_test_db().await;
    let customer = SeaOrmCustomerRepository::new(db.clone())
        .create(party("Depot"))
        .await
        .unwrap();
    let pipe = create_product(&db, "PIPE", 5, 0).await;

    // 3 + 3 exceeds the 5 on hand even though each line fits
    let created = delivery_service::create_delivery(
        &db,
        outgoing(&customer.id, vec![item(&pipe, 3), item(&pipe, 3)]),
    )
    .await
    .unwrap();
    let err = delivery_service::process_delivery(&db, &created.delivery.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InsufficientStock { requested: 6, .. }));

    let created = delivery_service::create_delivery(
        &db,
        outgoing(&customer.id, vec![item(&pipe, 2), item(&pipe, 3)]),
    )
    .await
    .unwrap();
    let processed = delivery_service::process_delivery(&db, &created.delivery.id, None)
        .await
        .unwrap();
    let chain: Vec<(i32, i32)> = processed
        .adjustments
        .iter()
        .map(|a| (a.previous_quantity, a.new_quantity))
        .collect();
    assert_eq!(chain, vec![(5, 3), (3, 0)]);
}

#[tokio::test]
async fn test_lifecycle_transitions() {
    let db = setup_test_db().await;
    let customer = SeaOrmCustomerRepository::new(db.clone())
        .create(party("Bistro"))
        .await
        .unwrap();
    let vehicles = SeaOrmVehicleRepository::new(db.clone());
    let van = vehicles
        .create(CreateVehicleInput {
            registration_number: "VAN-01".to_string(),
            make: None,
            model: None,
            capacity_kg: Some(900.0),
            is_active: Some(true),
            notes: None,
        })
        .await
        .unwrap();
    let flour = create_product(&db, "FLOUR", 50, 5).await;

    let mut input = outgoing(&customer.id, vec![]);
    input.vehicle_id = Some(van.id.clone());
    let empty = delivery_service::create_delivery(&db, input).await.unwrap();
    assert_eq!(empty.vehicle_registration.as_deref(), Some("VAN-01"));

    // Dispatch needs at least one item
    let err = delivery_service::dispatch_delivery(&db, &empty.delivery.id)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));

    delivery_service::add_item(&db, &empty.delivery.id, item(&flour, 10))
        .await
        .unwrap();
    let dispatched = delivery_service::dispatch_delivery(&db, &empty.delivery.id)
        .await
        .unwrap();
    assert_eq!(dispatched.status, "in_transit");

    let err = delivery_service::dispatch_delivery(&db, &empty.delivery.id)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidState(_)));

    let cancelled = delivery_service::cancel_delivery(&db, &empty.delivery.id)
        .await
        .unwrap();
    assert_eq!(cancelled.status, "cancelled");

    let err = delivery_service::process_delivery(&db, &empty.delivery.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidState(_)));
    let err = delivery_service::add_item(&db, &empty.delivery.id, item(&flour, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidState(_)));
    assert_eq!(stock_of(&db, &flour).await, 50);

    let listed = delivery_service::list_deliveries(
        &db,
        DeliveryFilter {
            status: Some("cancelled".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(listed.len(), 1);

    // Cancelled deliveries can be removed, completed ones cannot
    delivery_service::delete_delivery(&db, &empty.delivery.id)
        .await
        .unwrap();
    let err = delivery_service::get_delivery(&db, &empty.delivery.id)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound(_)));
}

#[tokio::test]
async fn test_party_rules_and_inactive_vehicle() {
    let db = setup_test_db().await;
    let supplier = SeaOrmSupplierRepository::new(db.clone())
        .create(party("Mill"))
        .await
        .unwrap();
    let vehicle = SeaOrmVehicleRepository::new(db.clone())
        .create(CreateVehicleInput {
            registration_number: "OLD-99".to_string(),
            make: None,
            model: None,
            capacity_kg: None,
            is_active: Some(false),
            notes: None,
        })
        .await
        .unwrap();

    // Outgoing with a supplier instead of a customer
    let err = delivery_service::create_delivery(
        &db,
        CreateDeliveryInput {
            reference: None,
            delivery_type: "outgoing".to_string(),
            supplier_id: Some(supplier.id.clone()),
            customer_id: None,
            vehicle_id: None,
            scheduled_date: None,
            notes: None,
            items: vec![],
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));

    let err = delivery_service::create_delivery(
        &db,
        CreateDeliveryInput {
            reference: None,
            delivery_type: "incoming".to_string(),
            supplier_id: Some(supplier.id.clone()),
            customer_id: None,
            vehicle_id: Some(vehicle.id.clone()),
            scheduled_date: None,
            notes: None,
            items: vec![],
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));

    let err = delivery_service::create_delivery(
        &db,
        CreateDeliveryInput {
            reference: None,
            delivery_type: "sideways".to_string(),
            supplier_id: Some(supplier.id),
            customer_id: None,
            vehicle_id: None,
            scheduled_date: None,
            notes: None,
            items: vec![],
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));
}

#[tokio::test]
async fn test_adjustment_history_per_delivery() {
    let db = setup_test_db().await;
    let supplier = SeaOrmSupplierRepository::new(db.clone())
        .create(party("Farm"))
        .await
        .unwrap();
    let eggs = create_product(&db, "EGGS", 0, 12).await;

    let created = delivery_service::create_delivery(
        &db,
        CreateDeliveryInput {
            reference: None,
            delivery_type: "incoming".to_string(),
            supplier_id: Some(supplier.id),
            customer_id: None,
            vehicle_id: None,
            scheduled_date: None,
            notes: None,
            items: vec![item(&eggs, 6)],
        },
    )
    .await
    .unwrap();
    let processed = delivery_service::process_delivery(&db, &created.delivery.id, None)
        .await
        .unwrap();

    // Still under the reorder level: the out-of-stock alert becomes a low-stock one
    assert_eq!(processed.alerts.len(), 1);
    assert_eq!(processed.alerts[0].alert_type, "low_stock");

    let history = stock_service::list_adjustments(
        &db,
        AdjustmentFilter {
            delivery_id: Some(created.delivery.id.clone()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].quantity_change, 6);
    assert_eq!(history[0].previous_quantity, 0);
    assert_eq!(history[0].new_quantity, 6);
}

fn incoming(supplier_id: &str, items: Vec<DeliveryItemInput>) -> CreateDeliveryInput {
    CreateDeliveryInput {
        reference: None,
        delivery_type: "incoming".to_string(),
        supplier_id: Some(supplier_id.to_string()),
        customer_id: None,
        vehicle_id: None,
        scheduled_date: None,
        notes: None,
        items,
    }
}

#[tokio::test]
async fn test_completed_delivery_cannot_be_deleted() {
    let db = setup_test_db().await;
    let supplier = SeaOrmSupplierRepository::new(db.clone())
        .create(party("Quarry"))
        .await
        .unwrap();
    let sand = create_product(&db, "SAND", 0, 0).await;

    let created = delivery_service::create_delivery(&db, incoming(&supplier.id, vec![item(&sand, 8)]))
        .await
        .unwrap();
    delivery_service::process_delivery(&db, &created.delivery.id, None)
        .await
        .unwrap();

    let err = delivery_service::delete_delivery(&db, &created.delivery.id)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidState(_)));

    let kept = delivery_service::get_delivery(&db, &created.delivery.id)
        .await
        .unwrap();
    assert_eq!(kept.delivery.status, "completed");
    assert!(!kept.delivery.is_deleted);
    assert_eq!(stock_of(&db, &sand).await, 8);
}

#[tokio::test]
async fn test_huge_quantities_are_rejected_without_moving_stock() {
    let db = setup_test_db().await;
    let supplier = SeaOrmSupplierRepository::new(db.clone())
        .create(party("Bulk Co"))
        .await
        .unwrap();
    let customer = SeaOrmCustomerRepository::new(db.clone())
        .create(party("Reseller"))
        .await
        .unwrap();
    let grain = create_product(&db, "GRAIN", 5, 0).await;

    // A single line above the per-movement cap never gets stored
    let err = delivery_service::create_delivery(
        &db,
        outgoing(&customer.id, vec![item(&grain, MAX_MOVEMENT + 1)]),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));

    // Two capped lines sum past what is on hand
    let created = delivery_service::create_delivery(
        &db,
        outgoing(
            &customer.id,
            vec![item(&grain, MAX_MOVEMENT), item(&grain, MAX_MOVEMENT)],
        ),
    )
    .await
    .unwrap();
    let err = delivery_service::process_delivery(&db, &created.delivery.id, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DomainError::InsufficientStock { available: 5, requested: 2_000_000_000, .. }
    ));
    assert_eq!(stock_of(&db, &grain).await, 5);

    // Three capped lines do not fit in a quantity at all
    let created = delivery_service::create_delivery(
        &db,
        incoming(
            &supplier.id,
            vec![
                item(&grain, MAX_MOVEMENT),
                item(&grain, MAX_MOVEMENT),
                item(&grain, MAX_MOVEMENT),
            ],
        ),
    )
    .await
    .unwrap();
    let err = delivery_service::process_delivery(&db, &created.delivery.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));
    assert_eq!(stock_of(&db, &grain).await, 5);

    // Receiving on top of a near-full product overflows the running total
    let silo = create_product(&db, "SILO", 2_000_000_000, 0).await;
    let created = delivery_service::create_delivery(
        &db,
        incoming(&supplier.id, vec![item(&silo, MAX_MOVEMENT)]),
    )
    .await
    .unwrap();
    let err = delivery_service::process_delivery(&db, &created.delivery.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));
    assert_eq!(stock_of(&db, &silo).await, 2_000_000_000);
    let still_open = delivery_service::get_delivery(&db, &created.delivery.id)
        .await
        .unwrap();
    assert_eq!(still_open.delivery.status, "pending");
}

#[tokio::test]
async fn test_adjustment_bounds() {
    let db = setup_test_db().await;
    let silo = create_product(&db, "SILO", 2_000_000_000, 0).await;

    let adjust = |change: i32| AdjustStockInput {
        id: None,
        product_id: silo.clone(),
        quantity_change: change,
        reason: "correction".to_string(),
        notes: None,
        adjusted_by: None,
    };

    let err = stock_service::adjust_stock(&db, adjust(i32::MIN))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));

    let err = stock_service::adjust_stock(&db, adjust(MAX_MOVEMENT))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));

    let movement = stock_service::adjust_stock(&db, adjust(-MAX_MOVEMENT))
        .await
        .unwrap();
    assert_eq!(movement.product.stock_quantity, 1_000_000_000);
    assert_eq!(stock_of(&db, &silo).await, 1_000_000_000);
}

#[tokio::test]
async fn test_deleted_records_cannot_be_referenced() {
    let db = setup_test_db().await;
    let suppliers = SeaOrmSupplierRepository::new(db.clone());
    let customers = SeaOrmCustomerRepository::new(db.clone());
    let vehicles = SeaOrmVehicleRepository::new(db.clone());

    let gone_supplier = suppliers.create(party("Closed Mill")).await.unwrap();
    suppliers.delete(&gone_supplier.id).await.unwrap();
    let gone_customer = customers.create(party("Moved Away")).await.unwrap();
    customers.delete(&gone_customer.id).await.unwrap();
    let gone_van = vehicles
        .create(CreateVehicleInput {
            registration_number: "SOLD-1".to_string(),
            make: None,
            model: None,
            capacity_kg: None,
            is_active: Some(true),
            notes: None,
        })
        .await
        .unwrap();
    vehicles.delete(&gone_van.id).await.unwrap();

    let err = product_service::create_product(
        &db,
        CreateProductInput {
            sku: "FLOUR-2".to_string(),
            name: "Flour".to_string(),
            description: None,
            unit: None,
            unit_price: 1.0,
            cost_price: None,
            stock_quantity: None,
            reorder_level: None,
            supplier_id: Some(gone_supplier.id.clone()),
        },
        None,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));

    let err = delivery_service::create_delivery(&db, incoming(&gone_supplier.id, vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));

    let err = delivery_service::create_delivery(&db, outgoing(&gone_customer.id, vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));

    let customer = customers.create(party("Open Bakery")).await.unwrap();
    let mut with_van = outgoing(&customer.id, vec![]);
    with_van.vehicle_id = Some(gone_van.id.clone());
    let err = delivery_service::create_delivery(&db, with_van)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));

    let retired = create_product(&db, "RETIRED", 4, 0).await;
    product_service::delete_product(&db, &retired).await.unwrap();
    let open = delivery_service::create_delivery(&db, outgoing(&customer.id, vec![]))
        .await
        .unwrap();
    let err = delivery_service::add_item(&db, &open.delivery.id, item(&retired, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));
}
