//! SeaORM implementation of SupplierRepository

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::domain::{
    CreatePartyInput, DomainError, PartyFilter, SupplierRepository, UpdatePartyInput,
    optional_text, required_text,
};
use crate::models::supplier::{ActiveModel, Column, Entity as SupplierEntity, Model};
use crate::utils::{new_id, now_timestamp};

/// SeaORM-based implementation of SupplierRepository
pub struct SeaOrmSupplierRepository {
    db: DatabaseConnection,
}

impl SeaOrmSupplierRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn find_live(&self, id: &str) -> Result<Model, DomainError> {
        SupplierEntity::find_by_id(id.to_owned())
            .filter(Column::IsDeleted.eq(false))
            .one(&self.db)
            .await?
            .ok_or_else(|| DomainError::not_found("Supplier", id))
    }
}

#[async_trait]
impl SupplierRepository for SeaOrmSupplierRepository {
    async fn find_all(&self, filter: PartyFilter) -> Result<Vec<Model>, DomainError> {
        let mut query = SupplierEntity::find().filter(Column::IsDeleted.eq(false));

        if let Some(q) = &filter.q
            && !q.trim().is_empty()
        {
            let q = q.trim();
            query = query.filter(
                Condition::any()
                    .add(Column::Name.contains(q))
                    .add(Column::ContactPerson.contains(q))
                    .add(Column::Email.contains(q))
                    .add(Column::Phone.contains(q)),
            );
        }

        Ok(query.order_by_asc(Column::Name).all(&self.db).await?)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Model>, DomainError> {
        Ok(SupplierEntity::find_by_id(id.to_owned())
            .filter(Column::IsDeleted.eq(false))
            .one(&self.db)
            .await?)
    }

    async fn create(&self, input: CreatePartyInput) -> Result<Model, DomainError> {
        let name = required_text("name", &input.name)?;
        let now = now_timestamp();

        let supplier = ActiveModel {
            id: Set(new_id()),
            name: Set(name),
            contact_person: Set(optional_text(input.contact_person)),
            email: Set(optional_text(input.email)),
            phone: Set(optional_text(input.phone)),
            address: Set(optional_text(input.address)),
            notes: Set(optional_text(input.notes)),
            is_deleted: Set(false),
            deleted_date: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
        };

        let saved = supplier.insert(&self.db).await?;
        tracing::info!("Created supplier {} ({})", saved.name, saved.id);
        Ok(saved)
    }

    async fn update(&self, id: &str, input: UpdatePartyInput) -> Result<Model, DomainError> {
        let existing = self.find_live(id).await?;
        let mut active: ActiveModel = existing.into();

        if let Some(name) = input.name {
            active.name = Set(required_text("name", &name)?);
        }
        if input.contact_person.is_some() {
            active.contact_person = Set(optional_text(input.contact_person));
        }
        if input.email.is_some() {
            active.email = Set(optional_text(input.email));
        }
        if input.phone.is_some() {
            active.phone = Set(optional_text(input.phone));
        }
        if input.address.is_some() {
            active.address = Set(optional_text(input.address));
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
        tracing::info!("Soft-deleted supplier {}", deleted.id);
        Ok(deleted)
    }
}
