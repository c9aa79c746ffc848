use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Sync journal. On a device this is the outbox of local changes waiting to
/// be pushed; on the server it is the inbox of pushed operations.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "operation_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub operation: String,
    pub payload: Option<String>,
    #[sea_orm(default_value = "pending")]
    pub status: String, // pending, pushed, applied, failed, skipped
    pub error_message: Option<String>,
    pub created_at: String,
    pub processed_at: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
