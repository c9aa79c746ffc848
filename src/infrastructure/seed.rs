use sea_orm::*;

use crate::auth::hash_password;
use crate::domain::{
    CreatePartyInput, CreateVehicleInput, CustomerRepository, DomainError, SupplierRepository,
    VehicleRepository,
};
use crate::infrastructure::{
    SeaOrmCustomerRepository, SeaOrmSupplierRepository, SeaOrmVehicleRepository,
};
use crate::models::{product, user};
use crate::services::delivery_service::{self, CreateDeliveryInput, DeliveryItemInput};
use crate::services::product_service::{self, CreateProductInput};
use crate::utils::now_timestamp;

/// Demo users, reference data, a small catalogue and two open deliveries.
/// Does nothing when products already exist.
pub async fn seed_demo_data(db: &DatabaseConnection) -> Result<(), DomainError> {
    // 1. Users
    for (username, password, role) in [("admin", "admin", "admin"), ("driver", "driver", "user")] {
        let password_hash = hash_password(password).map_err(DomainError::Internal)?;
        let now = now_timestamp();
        let row = user::ActiveModel {
            username: Set(username.to_owned()),
            password_hash: Set(password_hash),
            role: Set(role.to_owned()),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        user::Entity::insert(row)
            .on_conflict(
                sea_orm::sea_query::OnConflict::column(user::Column::Username)
                    .do_nothing()
                    .to_owned(),
            )
            .do_nothing()
            .exec(db)
            .await?;
    }

    if product::Entity::find().count(db).await? > 0 {
        tracing::info!("Catalogue already populated, skipping demo data");
        return Ok(());
    }

    // 2. Reference data
    let suppliers = SeaOrmSupplierRepository::new(db.clone());
    let customers = SeaOrmCustomerRepository::new(db.clone());
    let vehicles = SeaOrmVehicleRepository::new(db.clone());

    let supplier = suppliers
        .create(CreatePartyInput {
            name: "Northwind Fasteners".to_owned(),
            contact_person: Some("Ana Ruiz".to_owned()),
            email: Some("orders@northwind.example".to_owned()),
            phone: Some("+44 20 7946 0000".to_owned()),
            address: Some("12 Dock Road, Leeds".to_owned()),
            notes: None,
        })
        .await?;

    let customer = customers
        .create(CreatePartyInput {
            name: "Harbour Builders".to_owned(),
            contact_person: Some("Tom Reyes".to_owned()),
            email: Some("site@harbour.example".to_owned()),
            phone: None,
            address: Some("Unit 4, Quay Street, Hull".to_owned()),
            notes: Some("Deliveries before 10am".to_owned()),
        })
        .await?;

    let van = vehicles
        .create(CreateVehicleInput {
            registration_number: "LK21 VAN".to_owned(),
            make: Some("Ford".to_owned()),
            model: Some("Transit".to_owned()),
            capacity_kg: Some(1200.0),
            is_active: Some(true),
            notes: None,
        })
        .await?;

    // 3. Catalogue
    let catalogue = [
        ("BOLT-M8", "M8 hex bolt", "box", 4.5, 120, 20),
        ("NUT-M8", "M8 nut", "box", 2.0, 15, 20),
        ("WASH-M8", "M8 washer", "box", 1.2, 0, 10),
    ];

    let mut product_ids = Vec::new();
    for (sku, name, unit, price, stock, reorder) in catalogue {
        let created = product_service::create_product(
            db,
            CreateProductInput {
                sku: sku.to_owned(),
                name: name.to_owned(),
                description: None,
                unit: Some(unit.to_owned()),
                unit_price: price,
                cost_price: Some(price * 0.6),
                stock_quantity: Some(stock),
                reorder_level: Some(reorder),
                supplier_id: Some(supplier.id.clone()),
            },
            Some("seed".to_owned()),
        )
        .await?;
        product_ids.push(created.product.id);
    }

    // 4. One delivery each way, left open
    delivery_service::create_delivery(
        db,
        CreateDeliveryInput {
            reference: None,
            delivery_type: "incoming".to_owned(),
            supplier_id: Some(supplier.id.clone()),
            customer_id: None,
            vehicle_id: None,
            scheduled_date: None,
            notes: Some("Weekly restock".to_owned()),
            items: product_ids
                .iter()
                .skip(1)
                .map(|id| DeliveryItemInput {
                    product_id: id.clone(),
                    quantity: 50,
                    unit_price: None,
                })
                .collect(),
        },
    )
    .await?;

    delivery_service::create_delivery(
        db,
        CreateDeliveryInput {
            reference: None,
            delivery_type: "outgoing".to_owned(),
            supplier_id: None,
            customer_id: Some(customer.id),
            vehicle_id: Some(van.id),
            scheduled_date: None,
            notes: None,
            items: vec![DeliveryItemInput {
                product_id: product_ids[0].clone(),
                quantity: 30,
                unit_price: Some(4.5),
            }],
        },
    )
    .await?;

    Ok(())
}
