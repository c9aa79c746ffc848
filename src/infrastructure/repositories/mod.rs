//! Repository implementations using SeaORM

pub mod customer_repository;
pub mod supplier_repository;
pub mod vehicle_repository;

pub use customer_repository::SeaOrmCustomerRepository;
pub use supplier_repository::SeaOrmSupplierRepository;
pub use vehicle_repository::SeaOrmVehicleRepository;
