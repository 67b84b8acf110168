use sea_orm::DbBackend;
use sea_orm_migration::prelude::*;

pub struct Migrator;

/// Quantity and price column. SQLite caps decimal precision at 16 digits.
fn decimal_column<T: IntoIden>(manager: &SchemaManager, column: T) -> ColumnDef {
    let mut def = ColumnDef::new(column);
    match manager.get_database_backend() {
        DbBackend::Sqlite => def.decimal_len(16, 4),
        _ => def.decimal_len(19, 4),
    };
    def
}

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240801_000001_create_recipe_catalog::Migration),
            Box::new(m20240801_000002_create_inventory_lots::Migration),
            Box::new(m20240801_000003_create_production_tables::Migration),
        ]
    }
}

mod m20240801_000001_create_recipe_catalog {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240801_000001_create_recipe_catalog"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(RawMaterials::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RawMaterials::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RawMaterials::Code)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(RawMaterials::Name).string().not_null())
                        .col(ColumnDef::new(RawMaterials::Unit).string().not_null())
                        .col(ColumnDef::new(RawMaterials::Category).string().null())
                        .col(
                            ColumnDef::new(RawMaterials::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RawMaterials::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Recipes::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Recipes::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Recipes::Name).string().not_null())
                        .col(ColumnDef::new(Recipes::Description).text().null())
                        .col(ColumnDef::new(Recipes::ServingSize).integer().not_null())
                        .col(
                            ColumnDef::new(Recipes::PrepTimeMinutes)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Recipes::CookTimeMinutes)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Recipes::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Recipes::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Recipes::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(RecipeIngredients::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RecipeIngredients::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RecipeIngredients::RecipeId).uuid().not_null())
                        .col(
                            ColumnDef::new(RecipeIngredients::RawMaterialId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            super::decimal_column(manager, RecipeIngredients::Quantity)
                                .not_null(),
                        )
                        .col(ColumnDef::new(RecipeIngredients::Unit).string().not_null())
                        .col(ColumnDef::new(RecipeIngredients::Notes).string().null())
                        .col(
                            ColumnDef::new(RecipeIngredients::Position)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(RecipeIngredients::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RecipeIngredients::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_recipe_ingredients_recipe_id")
                                .from(RecipeIngredients::Table, RecipeIngredients::RecipeId)
                                .to(Recipes::Table, Recipes::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_recipe_ingredients_raw_material_id")
                                .from(RecipeIngredients::Table, RecipeIngredients::RawMaterialId)
                                .to(RawMaterials::Table, RawMaterials::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_recipe_ingredients_recipe_id")
                        .table(RecipeIngredients::Table)
                        .col(RecipeIngredients::RecipeId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(RecipeIngredients::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Recipes::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(RawMaterials::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum RawMaterials {
        Table,
        Id,
        Code,
        Name,
        Unit,
        Category,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum Recipes {
        Table,
        Id,
        Name,
        Description,
        ServingSize,
        PrepTimeMinutes,
        CookTimeMinutes,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum RecipeIngredients {
        Table,
        Id,
        RecipeId,
        RawMaterialId,
        Quantity,
        Unit,
        Notes,
        Position,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240801_000002_create_inventory_lots {

    use super::m20240801_000001_create_recipe_catalog::RawMaterials;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240801_000002_create_inventory_lots"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(InventoryLots::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryLots::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryLots::RawMaterialId).uuid().not_null())
                        .col(ColumnDef::new(InventoryLots::BatchNumber).string().null())
                        .col(
                            super::decimal_column(manager, InventoryLots::Quantity)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            super::decimal_column(manager, InventoryLots::UnitPrice)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(InventoryLots::ReceivedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryLots::ExpiryDate).date().null())
                        .col(
                            ColumnDef::new(InventoryLots::QualityStatus)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryLots::SupplierId).uuid().null())
                        .col(ColumnDef::new(InventoryLots::Notes).string().null())
                        .col(
                            ColumnDef::new(InventoryLots::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryLots::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryLots::DeletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_lots_raw_material_id")
                                .from(InventoryLots::Table, InventoryLots::RawMaterialId)
                                .to(RawMaterials::Table, RawMaterials::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_lots_material_received")
                        .table(InventoryLots::Table)
                        .col(InventoryLots::RawMaterialId)
                        .col(InventoryLots::ReceivedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InventoryLots::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum InventoryLots {
        Table,
        Id,
        RawMaterialId,
        BatchNumber,
        Quantity,
        UnitPrice,
        ReceivedAt,
        ExpiryDate,
        QualityStatus,
        SupplierId,
        Notes,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }
}

mod m20240801_000003_create_production_tables {

    use super::m20240801_000001_create_recipe_catalog::{RawMaterials, Recipes};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240801_000003_create_production_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ProductionPlans::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductionPlans::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductionPlans::PlanDate).date().not_null())
                        .col(
                            ColumnDef::new(ProductionPlans::TargetPortions)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductionPlans::Status).string().not_null())
                        .col(ColumnDef::new(ProductionPlans::KitchenId).uuid().null())
                        .col(ColumnDef::new(ProductionPlans::Notes).text().null())
                        .col(ColumnDef::new(ProductionPlans::CreatedBy).string().null())
                        .col(
                            ColumnDef::new(ProductionPlans::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionPlans::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductionBatches::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductionBatches::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionBatches::BatchNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(ProductionBatches::ProductionPlanId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductionBatches::RecipeId).uuid().null())
                        .col(
                            ColumnDef::new(ProductionBatches::PlannedQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionBatches::ActualQuantity)
                                .integer()
                                .null(),
                        )
                        .col(ColumnDef::new(ProductionBatches::Status).string().not_null())
                        .col(ColumnDef::new(ProductionBatches::Notes).text().null())
                        .col(
                            ColumnDef::new(ProductionBatches::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionBatches::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_production_batches_plan_id")
                                .from(ProductionBatches::Table, ProductionBatches::ProductionPlanId)
                                .to(ProductionPlans::Table, ProductionPlans::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_production_batches_recipe_id")
                                .from(ProductionBatches::Table, ProductionBatches::RecipeId)
                                .to(Recipes::Table, Recipes::Id)
                                .on_delete(ForeignKeyAction::SetNull)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_production_batches_status")
                        .table(ProductionBatches::Table)
                        .col(ProductionBatches::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(BatchMaterialRequirements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(BatchMaterialRequirements::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BatchMaterialRequirements::ProductionBatchId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BatchMaterialRequirements::RawMaterialId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            super::decimal_column(
                                manager,
                                BatchMaterialRequirements::RequiredQuantity,
                            )
                            .not_null(),
                        )
                        .col(
                            ColumnDef::new(BatchMaterialRequirements::Unit)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BatchMaterialRequirements::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_batch_material_requirements_batch_id")
                                .from(
                                    BatchMaterialRequirements::Table,
                                    BatchMaterialRequirements::ProductionBatchId,
                                )
                                .to(ProductionBatches::Table, ProductionBatches::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_batch_material_requirements_material_id")
                                .from(
                                    BatchMaterialRequirements::Table,
                                    BatchMaterialRequirements::RawMaterialId,
                                )
                                .to(RawMaterials::Table, RawMaterials::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_batch_material_requirements_material_id")
                        .table(BatchMaterialRequirements::Table)
                        .col(BatchMaterialRequirements::RawMaterialId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(
                    Table::drop()
                        .table(BatchMaterialRequirements::Table)
                        .to_owned(),
                )
                .await?;
            manager
                .drop_table(Table::drop().table(ProductionBatches::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ProductionPlans::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ProductionPlans {
        Table,
        Id,
        PlanDate,
        TargetPortions,
        Status,
        KitchenId,
        Notes,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum ProductionBatches {
        Table,
        Id,
        BatchNumber,
        ProductionPlanId,
        RecipeId,
        PlannedQuantity,
        ActualQuantity,
        Status,
        Notes,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum BatchMaterialRequirements {
        Table,
        Id,
        ProductionBatchId,
        RawMaterialId,
        RequiredQuantity,
        Unit,
        CreatedAt,
    }
}
