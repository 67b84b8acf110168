use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue, ConnectionTrait};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Scaled per-material requirement recorded with a batch. While the batch is
/// PENDING this quantity is what the batch will draw from inventory.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "batch_material_requirements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub production_batch_id: Uuid,
    pub raw_material_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub required_quantity: Decimal,
    pub unit: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::production_batch::Entity",
        from = "Column::ProductionBatchId",
        to = "super::production_batch::Column::Id"
    )]
    ProductionBatch,
}

impl Related<super::production_batch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductionBatch.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if insert {
            if let ActiveValue::NotSet = self.id {
                self.id = ActiveValue::Set(Uuid::new_v4());
            }

            if let ActiveValue::NotSet = self.created_at {
                self.created_at = ActiveValue::Set(Utc::now());
            }
        }

        Ok(self)
    }
}
