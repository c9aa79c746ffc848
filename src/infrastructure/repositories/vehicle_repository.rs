//! SeaORM implementation of VehicleRepository

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::domain::{
    CreateVehicleInput, DomainError, UpdateVehicleInput, VehicleFilter, VehicleRepository,
    optional_text, required_text,
};
use crate::models::vehicle::{ActiveModel, Column, Entity as VehicleEntity, Model};
use crate::utils::{new_id, now_timestamp};

pub struct SeaOrmVehicleRepository {
    db: DatabaseConnection,
}

impl SeaOrmVehicleRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn find_live(&self, id: &str) -> Result<Model, DomainError> {
        VehicleEntity::find_by_id(id.to_owned())
            .filter(Column::IsDeleted.eq(false))
            .one(&self.db)
            .await?
            .ok_or_else(|| DomainError::not_found("Vehicle", id))
    }
}

fn validate_capacity(capacity_kg: Option<f64>) -> Result<Option<f64>, DomainError> {
    match capacity_kg {
        Some(c) if !(c.is_finite() && c > 0.0) => Err(DomainError::Validation(
            "capacity_kg must be a positive number".to_string(),
        )),
        other => Ok(other),
    }
}

#[async_trait]
impl VehicleRepository for SeaOrmVehicleRepository {
    async fn find_all(&self, filter: VehicleFilter) -> Result<Vec<Model>, DomainError> {
        let mut query = VehicleEntity::find().filter(Column::IsDeleted.eq(false));

        if let Some(active) = filter.active {
            query = query.filter(Column::IsActive.eq(active));
        }

        if let Some(q) = &filter.q
            && !q.trim().is_empty()
        {
            let q = q.trim();
            query = query.filter(
                Condition::any()
                    .add(Column::RegistrationNumber.contains(q))
                    .add(Column::Make.contains(q))
                    .add(Column::Model.contains(q)),
            );
        }

        Ok(query
            .order_by_asc(Column::RegistrationNumber)
            .all(&self.db)
            .await?)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Model>, DomainError> {
        Ok(VehicleEntity::find_by_id(id.to_owned())
            .filter(Column::IsDeleted.eq(false))
            .one(&self.db)
            .await?)
    }

    async fn create(&self, input: CreateVehicleInput) -> Result<Model, DomainError> {
        let registration_number =
            required_text("registration_number", &input.registration_number)?.to_uppercase();
        let capacity_kg = validate_capacity(input.capacity_kg)?;
        let now = now_timestamp();

        let vehicle = ActiveModel {
            id: Set(new_id()),
            registration_number: Set(registration_number),
            make: Set(optional_text(input.make)),
            model: Set(optional_text(input.model)),
            capacity_kg: Set(capacity_kg),
            is_active: Set(input.is_active.unwrap_or(true)),
            notes: Set(optional_text(input.notes)),
            is_deleted: Set(false),
            deleted_date: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
        };

        let saved = vehicle.insert(&self.db).await?;
        tracing::info!(
            "Registered vehicle {} ({})",
            saved.registration_number,
            saved.id
        );
        Ok(saved)
    }

    async fn update(&self, id: &str, input: UpdateVehicleInput) -> Result<Model, DomainError> {
        let existing = self.find_live(id).await?;
        let mut active: ActiveModel = existing.into();

        if let Some(reg) = input.registration_number {
            active.registration_number =
                Set(required_text("registration_number", &reg)?.to_uppercase());
        }
        if input.make.is_some() {
            active.make = Set(optional_text(input.make));
        }
        if input.model.is_some() {
            active.model = Set(optional_text(input.model));
        }
        if input.capacity_kg.is_some() {
            active.capacity_kg = Set(validate_capacity(input.capacity_kg)?);
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        if input.notes.is_some() {
            active.notes = Set(optional_text(input.notes));
        }
        active.updated_at = Set(now_timestamp());

        Ok(active.update(&self.db).await?)
    }

    async fn delete(&self, id: &str) -> Result<Model, DomainError> {
        let existing = self.find_live(id).await?;
        let now = now_timestamp();

        let mut active: ActiveModel = existing.into();
        active.is_deleted = Set(true);
        active.deleted_date = Set(Some(now.clone()));
        active.updated_at = Set(now);

        let deleted = active.update(&self.db).await?;
        tracing::info!("Soft-deleted vehicle {}", deleted.id);
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_capacity() {
        assert!(validate_capacity(Some(-1.0)).is_err());
        assert!(validate_capacity(Some(0.0)).is_err());
        assert!(validate_capacity(Some(f64::NAN)).is_err());
        assert_eq!(validate_capacity(Some(3500.0)).unwrap(), Some(3500.0));
        assert_eq!(validate_capacity(None).unwrap(), None);
    }
}
