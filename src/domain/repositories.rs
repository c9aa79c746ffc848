//! Repository trait definitions
//!
//! These traits define the contract for reference data access.
//! Implementations live in the infrastructure layer.

use async_trait::async_trait;
use serde::Deserialize;

use super::DomainError;
use crate::models::{customer, supplier, vehicle};

/// Filter criteria shared by supplier and customer listings
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PartyFilter {
    /// Matches name, contact person, email or phone
    pub q: Option<String>,
}

/// Input for creating a supplier or a customer
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePartyInput {
    pub name: String,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

/// Partial update for a supplier or a customer.
/// Absent fields are left alone, an empty string clears an optional field.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct UpdatePartyInput {
    pub name: Option<String>,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct VehicleFilter {
    /// Matches registration number, make or model
    pub q: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateVehicleInput {
    pub registration_number: String,
    pub make: Option<String>,
    pub model: Option<String>,
    pub capacity_kg: Option<f64>,
    pub is_active: Option<bool>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct UpdateVehicleInput {
    pub registration_number: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub capacity_kg: Option<f64>,
    pub is_active: Option<bool>,
    pub notes: Option<String>,
}

/// Repository trait for Supplier entity
#[async_trait]
pub trait SupplierRepository: Send + Sync {
    /// Find all non-deleted suppliers matching the filter, ordered by name
    async fn find_all(&self, filter: PartyFilter) -> Result<Vec<supplier::Model>, DomainError>;

    /// Find a supplier by ID (soft-deleted rows are not returned)
    async fn find_by_id(&self, id: &str) -> Result<Option<supplier::Model>, DomainError>;

    async fn create(&self, input: CreatePartyInput) -> Result<supplier::Model, DomainError>;

    async fn update(
        &self,
        id: &str,
        input: UpdatePartyInput,
    ) -> Result<supplier::Model, DomainError>;

    /// Soft delete, returns the tombstone
    async fn delete(&self, id: &str) -> Result<supplier::Model, DomainError>;
}

/// Repository trait for Customer entity
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn find_all(&self, filter: PartyFilter) -> Result<Vec<customer::Model>, DomainError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<customer::Model>, DomainError>;

    async fn create(&self, input: CreatePartyInput) -> Result<customer::Model, DomainError>;

    async fn update(
        &self,
        id: &str,
        input: UpdatePartyInput,
    ) -> Result<customer::Model, DomainError>;

    async fn delete(&self, id: &str) -> Result<customer::Model, DomainError>;
}

/// Repository trait for Vehicle entity
#[async_trait]
pub trait VehicleRepository: Send + Sync {
    async fn find_all(&self, filter: VehicleFilter) -> Result<Vec<vehicle::Model>, DomainError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<vehicle::Model>, DomainError>;

    async fn create(&self, input: CreateVehicleInput) -> Result<vehicle::Model, DomainError>;

    async fn update(
        &self,
        id: &str,
        input: UpdateVehicleInput,
    ) -> Result<vehicle::Model, DomainError>;

    async fn delete(&self, id: &str) -> Result<vehicle::Model, DomainError>;
}

/// Trim a required text field, rejecting blank values.
pub fn required_text(field: &str, value: &str) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

/// Normalise an optional text field: blank becomes `None`.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
