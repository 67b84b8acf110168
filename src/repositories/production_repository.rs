use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, DbErr,
    EntityTrait, JoinType, QueryFilter, QueryOrder, QuerySelect, RelationTrait,
};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::inventory_lot::QualityStatus;
use crate::entities::production_batch::BatchStatus;
use crate::entities::{
    batch_material_requirement, inventory_lot, production_batch, production_plan, raw_material,
    recipe, recipe_ingredient,
};
use crate::repositories::{BaseRepository, Repository};

/// Reads from the recipe catalog and inventory ledger, and writes production
/// plans and batches.
///
/// Query methods take any [`ConnectionTrait`] so the same query runs against
/// the pool or inside a transaction.
#[derive(Debug, Clone)]
pub struct ProductionRepository {
    base: BaseRepository,
}

impl ProductionRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn find_recipe<C: ConnectionTrait>(
        conn: &C,
        id: Uuid,
    ) -> Result<Option<recipe::Model>, DbErr> {
        recipe::Entity::find_by_id(id).one(conn).await
    }

    /// Ingredient lines in recipe order
    pub async fn find_recipe_ingredients<C: ConnectionTrait>(
        conn: &C,
        recipe_id: Uuid,
    ) -> Result<Vec<recipe_ingredient::Model>, DbErr> {
        recipe_ingredient::Entity::find()
            .filter(recipe_ingredient::Column::RecipeId.eq(recipe_id))
            .order_by_asc(recipe_ingredient::Column::Position)
            .order_by_asc(recipe_ingredient::Column::Id)
            .all(conn)
            .await
    }

    pub async fn find_materials<C: ConnectionTrait>(
        conn: &C,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, raw_material::Model>, DbErr> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let materials = raw_material::Entity::find()
            .filter(raw_material::Column::Id.is_in(ids.to_vec()))
            .all(conn)
            .await?;
        Ok(materials.into_iter().map(|m| (m.id, m)).collect())
    }

    /// Live, non-rejected lots per material, oldest received first. Empty
    /// lots are dropped later by the availability check.
    ///
    /// With `lock` set the rows are read `FOR UPDATE` on backends that
    /// support it; SQLite serializes writers on its own.
    pub async fn find_stock_lots<C: ConnectionTrait>(
        conn: &C,
        material_ids: &[Uuid],
        lock: bool,
    ) -> Result<HashMap<Uuid, Vec<inventory_lot::Model>>, DbErr> {
        if material_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query = inventory_lot::Entity::find()
            .filter(inventory_lot::Column::RawMaterialId.is_in(material_ids.to_vec()))
            .filter(inventory_lot::Column::DeletedAt.is_null())
            .filter(inventory_lot::Column::QualityStatus.ne(QualityStatus::Rejected.as_ref()))
            .order_by_asc(inventory_lot::Column::ReceivedAt)
            .order_by_asc(inventory_lot::Column::Id);

        if lock && conn.get_database_backend() != DbBackend::Sqlite {
            query = query.lock_exclusive();
        }

        let mut by_material: HashMap<Uuid, Vec<inventory_lot::Model>> = HashMap::new();
        for lot in query.all(conn).await? {
            by_material.entry(lot.raw_material_id).or_default().push(lot);
        }
        Ok(by_material)
    }

    /// Quantity per material recorded against batches that are still PENDING.
    pub async fn pending_reservations<C: ConnectionTrait>(
        conn: &C,
        material_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Decimal>, DbErr> {
        if material_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = batch_material_requirement::Entity::find()
            .join(
                JoinType::InnerJoin,
                batch_material_requirement::Relation::ProductionBatch.def(),
            )
            .filter(batch_material_requirement::Column::RawMaterialId.is_in(material_ids.to_vec()))
            .filter(production_batch::Column::Status.eq(BatchStatus::Pending.as_ref()))
            .all(conn)
            .await?;

        let mut reserved: HashMap<Uuid, Decimal> = HashMap::new();
        for row in rows {
            let held = reserved.entry(row.raw_material_id).or_default();
            *held = held.saturating_add(row.required_quantity);
        }
        Ok(reserved)
    }

    pub async fn insert_plan<C: ConnectionTrait>(
        conn: &C,
        plan: production_plan::ActiveModel,
    ) -> Result<production_plan::Model, DbErr> {
        plan.insert(conn).await
    }

    pub async fn insert_batch<C: ConnectionTrait>(
        conn: &C,
        batch: production_batch::ActiveModel,
    ) -> Result<production_batch::Model, DbErr> {
        batch.insert(conn).await
    }

    pub async fn insert_requirements<C: ConnectionTrait>(
        conn: &C,
        requirements: Vec<batch_material_requirement::ActiveModel>,
    ) -> Result<(), DbErr> {
        for requirement in requirements {
            requirement.insert(conn).await?;
        }
        Ok(())
    }

    pub async fn find_batch(&self, id: Uuid) -> Result<Option<production_batch::Model>, DbErr> {
        production_batch::Entity::find_by_id(id)
            .one(self.get_db())
            .await
    }

    pub async fn find_plan(&self, id: Uuid) -> Result<Option<production_plan::Model>, DbErr> {
        production_plan::Entity::find_by_id(id)
            .one(self.get_db())
            .await
    }
}

impl Repository for ProductionRepository {
    fn get_db(&self) -> &DatabaseConnection {
        self.base.get_db()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use sea_orm::MockDatabase;

    async fn logged_lot_query(backend: DbBackend, lock: bool) -> String {
        let db = MockDatabase::new(backend)
            .append_query_results([Vec::<inventory_lot::Model>::new()])
            .into_connection();
        let lots = ProductionRepository::find_stock_lots(&db, &[Uuid::new_v4()], lock)
            .await
            .unwrap();
        assert!(lots.is_empty());
        format!("{:?}", db.into_transaction_log())
    }

    #[rstest]
    #[case(DbBackend::Postgres, true, true)]
    #[case(DbBackend::Postgres, false, false)]
    #[case(DbBackend::Sqlite, true, false)]
    #[tokio::test]
    async fn lots_are_locked_only_when_asked_and_supported(
        #[case] backend: DbBackend,
        #[case] lock: bool,
        #[case] expect_lock: bool,
    ) {
        let sql = logged_lot_query(backend, lock).await;
        assert_eq!(sql.contains("FOR UPDATE"), expect_lock, "{sql}");
        assert!(sql.contains("inventory_lots"));
    }

    #[tokio::test]
    async fn no_materials_means_no_queries() {
        let db = MockDatabase::new(DbBackend::Postgres).into_connection();
        assert!(ProductionRepository::find_stock_lots(&db, &[], true)
            .await
            .unwrap()
            .is_empty());
        assert!(ProductionRepository::pending_reservations(&db, &[])
            .await
            .unwrap()
            .is_empty());
        assert!(db.into_transaction_log().is_empty());
    }
}
