use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue, ConnectionTrait};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// One production run scoped to a single plan and, when created from a
/// recipe, a single recipe.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "production_batches")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub batch_number: String,
    pub production_plan_id: Uuid,
    pub recipe_id: Option<Uuid>,
    pub planned_quantity: i32,
    pub actual_quantity: Option<i32>,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::production_plan::Entity",
        from = "Column::ProductionPlanId",
        to = "super::production_plan::Column::Id"
    )]
    ProductionPlan,
    #[sea_orm(
        belongs_to = "super::recipe::Entity",
        from = "Column::RecipeId",
        to = "super::recipe::Column::Id"
    )]
    Recipe,
    #[sea_orm(has_many = "super::batch_material_requirement::Entity")]
    MaterialRequirements,
}

impl Related<super::production_plan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductionPlan.def()
    }
}

impl Related<super::recipe::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Recipe.def()
    }
}

impl Related<super::batch_material_requirement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MaterialRequirements.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = self.id {
                self.id = ActiveValue::Set(Uuid::new_v4());
            }

            if let ActiveValue::NotSet = self.created_at {
                self.created_at = ActiveValue::Set(now);
            }

            if let ActiveValue::NotSet = self.actual_quantity {
                self.actual_quantity = ActiveValue::Set(None);
            }
        }

        if let ActiveValue::NotSet = self.status {
            self.status = ActiveValue::Set(BatchStatus::Pending.to_string());
        }

        self.updated_at = ActiveValue::Set(now);

        Ok(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Pending,
    InProgress,
    QualityCheck,
    Completed,
    Cancelled,
}
