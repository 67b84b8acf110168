use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue, ConnectionTrait};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// A received quantity of one raw material. Only `quantity` changes after
/// receipt, and never from this service.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_lots")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub raw_material_id: Uuid,
    pub batch_number: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub quantity: rust_decimal::Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub unit_price: rust_decimal::Decimal,
    pub received_at: DateTime<Utc>,
    pub expiry_date: Option<NaiveDate>,
    pub quality_status: String,
    pub supplier_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::raw_material::Entity",
        from = "Column::RawMaterialId",
        to = "super::raw_material::Column::Id"
    )]
    RawMaterial,
}

impl Related<super::raw_material::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RawMaterial.def()
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

            if let ActiveValue::NotSet = self.received_at {
                self.received_at = ActiveValue::Set(now);
            }

            if let ActiveValue::NotSet = self.quality_status {
                self.quality_status = ActiveValue::Set(QualityStatus::Pending.to_string());
            }

            if let ActiveValue::NotSet = self.deleted_at {
                self.deleted_at = ActiveValue::Set(None);
            }
        }

        self.updated_at = ActiveValue::Set(now);

        Ok(self)
    }
}

impl Model {
    /// Lots that are soft-deleted or rejected by quality control never count
    /// toward stock.
    pub fn counts_toward_stock(&self) -> bool {
        self.deleted_at.is_none()
            && !self
                .quality_status
                .eq_ignore_ascii_case(QualityStatus::Rejected.as_ref())
            && self.quantity > rust_decimal::Decimal::ZERO
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityStatus {
    Good,
    Fair,
    Poor,
    Rejected,
    Pending,
}
