//! Last-write-wins row merging shared by the processor and the client

use sea_orm::*;
use serde::{Serialize, de::DeserializeOwned};

use crate::models::{
    customer, delivery, delivery_item, product, stock_adjustment, stock_alert, supplier, vehicle,
};

/// A synchronised row: identified by a UUID and versioned by `updated_at`
pub trait SyncRecord {
    fn record_id(&self) -> &str;
    fn updated_at(&self) -> &str;
}

macro_rules! impl_sync_record {
    ($($module:ident),* $(,)?) => {
        $(
            impl SyncRecord for $module::Model {
                fn record_id(&self) -> &str {
                    &self.id
                }

                fn updated_at(&self) -> &str {
                    &self.updated_at
                }
            }
        )*
    };
}

impl_sync_record!(
    supplier,
    customer,
    vehicle,
    product,
    delivery,
    delivery_item,
    stock_adjustment,
    stock_alert
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Updated,
    /// The stored row is as new or newer; nothing written
    Stale,
}

impl MergeOutcome {
    pub fn changed(&self) -> bool {
        !matches!(self, MergeOutcome::Stale)
    }
}

pub async fn find_row<E, C>(conn: &C, id: &str) -> Result<Option<E::Model>, DbErr>
where
    E: EntityTrait,
    E::PrimaryKey: PrimaryKeyTrait<ValueType = String>,
    C: ConnectionTrait,
{
    E::find_by_id(id.to_owned()).one(conn).await
}

/// Model type behind an active model
type ModelOf<A> = <<A as ActiveModelTrait>::Entity as EntityTrait>::Model;

/// Write `row` as-is, inserting or overwriting every column
pub async fn write_row<A, C>(conn: &C, row: &ModelOf<A>, exists: bool) -> Result<(), DbErr>
where
    A: ActiveModelTrait + ActiveModelBehavior + Send,
    ModelOf<A>: IntoActiveModel<A> + Serialize + DeserializeOwned,
    C: ConnectionTrait,
{
    let json = serde_json::to_value(row).map_err(|e| DbErr::Json(e.to_string()))?;
    let active = A::from_json(json)?;
    if exists {
        active.update(conn).await?;
    } else {
        active.insert(conn).await?;
    }
    Ok(())
}

/// Store `incoming` unless the local row is at least as recent
pub async fn merge_row<A, C>(conn: &C, incoming: &ModelOf<A>) -> Result<MergeOutcome, DbErr>
where
    A: ActiveModelTrait + ActiveModelBehavior + Send,
    ModelOf<A>: SyncRecord + IntoActiveModel<A> + Serialize + DeserializeOwned,
    <A::Entity as EntityTrait>::PrimaryKey: PrimaryKeyTrait<ValueType = String>,
    C: ConnectionTrait,
{
    match find_row::<A::Entity, C>(conn, incoming.record_id()).await? {
        Some(current) if current.updated_at() >= incoming.updated_at() => Ok(MergeOutcome::Stale),
        Some(_) => {
            write_row::<A, C>(conn, incoming, true).await?;
            Ok(MergeOutcome::Updated)
        }
        None => {
            write_row::<A, C>(conn, incoming, false).await?;
            Ok(MergeOutcome::Inserted)
        }
    }
}

/// Merge a batch; returns how many rows were written
pub async fn merge_rows<A, C>(conn: &C, rows: &[ModelOf<A>]) -> Result<usize, DbErr>
where
    A: ActiveModelTrait + ActiveModelBehavior + Send,
    ModelOf<A>: SyncRecord + IntoActiveModel<A> + Serialize + DeserializeOwned,
    <A::Entity as EntityTrait>::PrimaryKey: PrimaryKeyTrait<ValueType = String>,
    C: ConnectionTrait,
{
    let mut written = 0;
    for row in rows {
        if merge_row::<A, C>(conn, row).await?.changed() {
            written += 1;
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::models::supplier::{ActiveModel as SupplierRow, Entity as Supplier};

    fn supplier(id: &str, name: &str, updated_at: &str) -> supplier::Model {
        supplier::Model {
            id: id.to_string(),
            name: name.to_string(),
            contact_person: None,
            email: None,
            phone: None,
            address: None,
            notes: None,
            is_deleted: false,
            deleted_date: None,
            created_at: "2026-01-01T00:00:00.000000Z".to_string(),
            updated_at: updated_at.to_string(),
        }
    }

    #[tokio::test]
    async fn test_newer_row_wins() {
        let db = init_db("sqlite::memory:").await.unwrap();
        let old = supplier("s-1", "Old name", "2026-01-01T00:00:00.000000Z");
        let new = supplier("s-1", "New name", "2026-01-02T00:00:00.000000Z");

        assert_eq!(
            merge_row::<SupplierRow, _>(&db, &old).await.unwrap(),
            MergeOutcome::Inserted
        );
        assert_eq!(
            merge_row::<SupplierRow, _>(&db, &new).await.unwrap(),
            MergeOutcome::Updated
        );
        assert_eq!(
            merge_row::<SupplierRow, _>(&db, &old).await.unwrap(),
            MergeOutcome::Stale
        );

        let stored = Supplier::find_by_id("s-1".to_string())
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.name, "New name");
    }
}
