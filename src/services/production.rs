//! Impact preview and batch creation from a recipe.

use chrono::{DateTime, NaiveDate, Utc};
use metrics::{counter, histogram};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseConnection, Set};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::ProductionConfig;
use crate::db::transaction::with_transaction;
use crate::entities::production_batch::BatchStatus;
use crate::entities::production_plan::PlanStatus;
use crate::entities::{
    batch_material_requirement, production_batch, production_plan, raw_material, recipe,
};
use crate::errors::ServiceError;
use crate::repositories::ProductionRepository;
use crate::services::inventory_availability::{
    check_availability, checked_sum, AvailabilityError, AvailabilityOptions, AvailabilityReport,
    InsufficientItem, LotDraw, LotSnapshot, MaterialStock, PriceAveraging,
};
use crate::services::recipe_scaling::{scale_recipe, MaterialRequirement, ScaledRecipe, ScalingError};

/// Runtime knobs taken from the `[production]` config section
#[derive(Debug, Clone)]
pub struct ProductionSettings {
    pub reserve_inventory: bool,
    pub price_averaging: PriceAveraging,
    pub batch_number_prefix: String,
}

impl Default for ProductionSettings {
    fn default() -> Self {
        Self::from(&ProductionConfig::default())
    }
}

impl From<&ProductionConfig> for ProductionSettings {
    fn from(cfg: &ProductionConfig) -> Self {
        Self {
            reserve_inventory: cfg.reserve_inventory,
            price_averaging: cfg.price_averaging(),
            batch_number_prefix: cfg.batch_number_prefix.clone(),
        }
    }
}

/// Input for [`ProductionService::create_batch_from_recipe`]
#[derive(Debug, Clone)]
pub struct CreateBatchFromRecipe {
    pub recipe_id: Uuid,
    pub target_portions: Option<i64>,
    pub scheduled_date: NaiveDate,
    pub kitchen_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchInfo {
    pub recipe_id: Uuid,
    pub recipe_name: String,
    pub target_portions: i32,
    pub serving_size: i32,
    pub scaling_factor: Decimal,
    pub base_time_minutes: i32,
    pub estimated_time_minutes: f64,
}

impl From<&ScaledRecipe> for BatchInfo {
    fn from(scaled: &ScaledRecipe) -> Self {
        Self {
            recipe_id: scaled.recipe_id,
            recipe_name: scaled.recipe_name.clone(),
            target_portions: scaled.target_portions,
            serving_size: scaled.serving_size,
            scaling_factor: scaled.scaling_factor,
            base_time_minutes: scaled.base_time_minutes,
            estimated_time_minutes: scaled.estimated_time_minutes,
        }
    }
}

/// Effect of the batch on one material's stock
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InventoryImpact {
    pub raw_material_id: Uuid,
    pub material_name: String,
    pub unit: String,
    pub required: Decimal,
    pub current_stock: Decimal,
    pub reserved: Decimal,
    pub available: Decimal,
    /// `current_stock - required`; negative when stock runs out
    pub stock_after_production: Decimal,
    pub is_available: bool,
    pub shortfall: Decimal,
    pub average_unit_price: Decimal,
    pub estimated_cost: Decimal,
    pub lots: Vec<LotSnapshot>,
    pub planned_draw: Vec<LotDraw>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImpactSummary {
    pub total_materials: usize,
    pub available_materials: usize,
    pub insufficient_materials: usize,
    pub total_estimated_cost: Decimal,
    pub total_shortfall: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImpactPreview {
    pub can_produce: bool,
    pub batch_info: BatchInfo,
    pub inventory_impact: Vec<InventoryImpact>,
    pub insufficient_items: Vec<InsufficientItem>,
    pub summary: ImpactSummary,
}

impl ImpactPreview {
    fn build(scaled: &ScaledRecipe, report: AvailabilityReport) -> Self {
        let summary = ImpactSummary {
            total_materials: report.materials.len(),
            available_materials: report.available_count(),
            insufficient_materials: report.insufficient_items.len(),
            total_estimated_cost: report.total_estimated_cost,
            total_shortfall: report.total_shortfall,
        };

        let inventory_impact = report
            .materials
            .into_iter()
            .map(|m| InventoryImpact {
                stock_after_production: m.current_stock - m.required,
                raw_material_id: m.raw_material_id,
                material_name: m.material_name,
                unit: m.unit,
                required: m.required,
                current_stock: m.current_stock,
                reserved: m.reserved,
                available: m.available,
                is_available: m.is_available,
                shortfall: m.shortfall,
                average_unit_price: m.average_unit_price,
                estimated_cost: m.estimated_cost,
                lots: m.lots,
                planned_draw: m.planned_draw,
            })
            .collect();

        Self {
            can_produce: report.can_produce,
            batch_info: BatchInfo::from(scaled),
            inventory_impact,
            insufficient_items: report.insufficient_items,
            summary,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecipeSummary {
    pub id: Uuid,
    pub name: String,
    pub serving_size: i32,
}

impl From<&recipe::Model> for RecipeSummary {
    fn from(model: &recipe::Model) -> Self {
        Self {
            id: model.id,
            name: model.name.clone(),
            serving_size: model.serving_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanView {
    pub id: Uuid,
    pub plan_date: NaiveDate,
    pub target_portions: i32,
    pub status: String,
    pub kitchen_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<production_plan::Model> for PlanView {
    fn from(model: production_plan::Model) -> Self {
        Self {
            id: model.id,
            plan_date: model.plan_date,
            target_portions: model.target_portions,
            status: model.status,
            kitchen_id: model.kitchen_id,
            notes: model.notes,
            created_by: model.created_by,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchView {
    pub id: Uuid,
    pub batch_number: String,
    pub status: String,
    pub planned_quantity: i32,
    pub actual_quantity: Option<i32>,
    pub notes: Option<String>,
    pub production_plan_id: Uuid,
    pub recipe: Option<RecipeSummary>,
    pub production_plan: PlanView,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScalingInfo {
    pub scaling_factor: Decimal,
    pub ingredient_count: usize,
    pub estimated_cost: Decimal,
    pub estimated_time_minutes: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngredientLine {
    pub raw_material_id: Uuid,
    pub material_name: String,
    pub original_quantity: Decimal,
    pub scaled_quantity: Decimal,
    pub unit: String,
    pub estimated_cost: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatedBatch {
    pub batch: BatchView,
    pub plan: PlanView,
    pub scaling_info: ScalingInfo,
    pub ingredients: Vec<IngredientLine>,
}

/// Batch numbers look like `BATCH-20240801-1A2B3C4D`.
pub fn generate_batch_number(prefix: &str, now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        prefix,
        now.format("%Y%m%d"),
        suffix[..8].to_ascii_uppercase()
    )
}

/// Checks the requested portion count before anything touches the store.
pub fn validate_target_portions(target_portions: Option<i64>) -> Result<i32, ServiceError> {
    let portions = target_portions
        .ok_or_else(|| ServiceError::InvalidArgument("targetPortions is required".to_string()))?;
    if portions <= 0 {
        return Err(ScalingError::InvalidTargetPortions(portions).into());
    }
    i32::try_from(portions).map_err(|_| {
        ServiceError::InvalidArgument(format!("targetPortions {} is too large", portions))
    })
}

fn stock_by_material(
    requirements: &[MaterialRequirement],
    materials: &HashMap<Uuid, raw_material::Model>,
    mut lots: HashMap<Uuid, Vec<crate::entities::inventory_lot::Model>>,
    reservations: &HashMap<Uuid, Decimal>,
) -> HashMap<Uuid, MaterialStock> {
    requirements
        .iter()
        .map(|req| {
            let id = req.raw_material_id;
            let stock = MaterialStock {
                material_name: materials.get(&id).map(|m| m.name.clone()).unwrap_or_default(),
                lots: lots.remove(&id).unwrap_or_default(),
                reserved: reservations.get(&id).copied().unwrap_or_default(),
            };
            (id, stock)
        })
        .collect()
}

/// Loads stock for `requirements` and runs the availability check.
async fn assess<C: ConnectionTrait>(
    conn: &C,
    requirements: &[MaterialRequirement],
    settings: &ProductionSettings,
    lock: bool,
) -> Result<AvailabilityReport, ServiceError> {
    let ids: Vec<Uuid> = requirements.iter().map(|r| r.raw_material_id).collect();

    let materials = ProductionRepository::find_materials(conn, &ids).await?;
    let lots = ProductionRepository::find_stock_lots(conn, &ids, lock).await?;
    let reservations = if settings.reserve_inventory {
        ProductionRepository::pending_reservations(conn, &ids).await?
    } else {
        HashMap::new()
    };

    let stock = stock_by_material(requirements, &materials, lots, &reservations);
    let report = check_availability(
        requirements,
        &stock,
        AvailabilityOptions {
            price_averaging: settings.price_averaging,
        },
    )?;
    Ok(report)
}

/// Per-ingredient cost lines priced from the availability report, with their
/// total.
fn ingredient_lines(
    scaled: &ScaledRecipe,
    report: &AvailabilityReport,
) -> Result<(Vec<IngredientLine>, Decimal), AvailabilityError> {
    let by_material: HashMap<Uuid, (&str, Decimal)> = report
        .materials
        .iter()
        .map(|m| {
            (
                m.raw_material_id,
                (m.material_name.as_str(), m.average_unit_price),
            )
        })
        .collect();

    let lines = scaled
        .ingredients
        .iter()
        .map(|line| {
            let (name, price) = by_material
                .get(&line.raw_material_id)
                .copied()
                .unwrap_or(("", Decimal::ZERO));
            let estimated_cost = line
                .scaled_quantity
                .checked_mul(price)
                .ok_or(AvailabilityError::MaterialOverflow(line.raw_material_id))?;
            Ok(IngredientLine {
                raw_material_id: line.raw_material_id,
                material_name: name.to_string(),
                original_quantity: line.original_quantity,
                scaled_quantity: line.scaled_quantity,
                unit: line.unit.clone(),
                estimated_cost,
            })
        })
        .collect::<Result<Vec<_>, AvailabilityError>>()?;

    let total = checked_sum(lines.iter().map(|line| line.estimated_cost))
        .ok_or(AvailabilityError::TotalOverflow)?;
    Ok((lines, total))
}

fn insert_failed(what: &str) -> impl FnOnce(sea_orm::DbErr) -> ServiceError + '_ {
    move |err| {
        warn!(error = %err, "failed to insert {}", what);
        ServiceError::InternalError(format!("failed to create {}", what))
    }
}

/// Production planning over the recipe catalog and inventory ledger
#[derive(Debug, Clone)]
pub struct ProductionService {
    db: Arc<DatabaseConnection>,
    repository: ProductionRepository,
    settings: ProductionSettings,
}

impl ProductionService {
    pub fn new(db: Arc<DatabaseConnection>, settings: ProductionSettings) -> Self {
        Self {
            repository: ProductionRepository::new(db.clone()),
            db,
            settings,
        }
    }

    pub fn settings(&self) -> &ProductionSettings {
        &self.settings
    }

    async fn load_scaled_recipe(
        &self,
        recipe_id: Uuid,
        target_portions: i32,
    ) -> Result<(recipe::Model, ScaledRecipe), ServiceError> {
        let db = self.db.as_ref();
        let recipe = ProductionRepository::find_recipe(db, recipe_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Recipe {} not found", recipe_id)))?;
        let ingredients = ProductionRepository::find_recipe_ingredients(db, recipe_id).await?;
        let scaled = scale_recipe(&recipe, &ingredients, target_portions)?;
        Ok((recipe, scaled))
    }

    /// Read-only forecast of what producing `target_portions` of a recipe
    /// would do to inventory. Infeasible plans are a normal result.
    #[instrument(skip(self))]
    pub async fn preview_impact(
        &self,
        recipe_id: Uuid,
        target_portions: Option<i64>,
    ) -> Result<ImpactPreview, ServiceError> {
        let portions = validate_target_portions(target_portions)?;
        let (_, scaled) = self.load_scaled_recipe(recipe_id, portions).await?;

        let requirements = scaled.requirements_by_material()?;
        let report = assess(self.db.as_ref(), &requirements, &self.settings, false).await?;

        Ok(ImpactPreview::build(&scaled, report))
    }

    /// Creates a PLANNED production plan with one PENDING batch for the
    /// scaled recipe, provided every material can be covered.
    #[instrument(skip(self, command), fields(recipe_id = %command.recipe_id))]
    pub async fn create_batch_from_recipe(
        &self,
        command: CreateBatchFromRecipe,
    ) -> Result<CreatedBatch, ServiceError> {
        let portions = validate_target_portions(command.target_portions)?;
        let (recipe, scaled) = self.load_scaled_recipe(command.recipe_id, portions).await?;
        if !recipe.is_active {
            return Err(ServiceError::InvalidState(format!(
                "Recipe {} is not active",
                recipe.id
            )));
        }

        let requirements = scaled.requirements_by_material()?;
        let settings = self.settings.clone();
        let batch_number = generate_batch_number(&settings.batch_number_prefix, Utc::now());
        let plan = production_plan::ActiveModel {
            plan_date: Set(command.scheduled_date),
            target_portions: Set(portions),
            status: Set(PlanStatus::Planned.to_string()),
            kitchen_id: Set(command.kitchen_id),
            notes: Set(command.notes.clone()),
            created_by: Set(command.created_by.clone()),
            ..Default::default()
        };
        let recipe_id = recipe.id;
        let notes = command.notes.clone();
        let scaled_for_costing = scaled.clone();

        let outcome = with_transaction(self.db.as_ref(), move |txn| {
            Box::pin(async move {
                let report =
                    assess(txn, &requirements, &settings, settings.reserve_inventory).await?;
                if !report.can_produce {
                    return Err(ServiceError::insufficient_inventory(
                        report.insufficient_items,
                    ));
                }
                let costing = ingredient_lines(&scaled_for_costing, &report)?;

                let plan = ProductionRepository::insert_plan(txn, plan)
                    .await
                    .map_err(insert_failed("production plan"))?;

                let batch = production_batch::ActiveModel {
                    batch_number: Set(batch_number),
                    production_plan_id: Set(plan.id),
                    recipe_id: Set(Some(recipe_id)),
                    planned_quantity: Set(portions),
                    actual_quantity: Set(None),
                    status: Set(BatchStatus::Pending.to_string()),
                    notes: Set(notes),
                    ..Default::default()
                };
                let batch = ProductionRepository::insert_batch(txn, batch)
                    .await
                    .map_err(insert_failed("production batch"))?;

                let snapshot = requirements
                    .iter()
                    .map(|req| batch_material_requirement::ActiveModel {
                        production_batch_id: Set(batch.id),
                        raw_material_id: Set(req.raw_material_id),
                        required_quantity: Set(req.required),
                        unit: Set(req.unit.clone()),
                        ..Default::default()
                    })
                    .collect();
                ProductionRepository::insert_requirements(txn, snapshot)
                    .await
                    .map_err(insert_failed("batch material requirements"))?;

                Ok((batch.id, plan.id, costing))
            })
        })
        .await;

        let (batch_id, plan_id, (ingredients, estimated_cost)) = match outcome {
            Ok(created) => created,
            Err(ServiceError::InsufficientInventory { message, items }) => {
                counter!("sppg_production.insufficient_inventory", 1);
                info!(
                    recipe_id = %recipe_id,
                    target_portions = portions,
                    materials = items.len(),
                    "batch not created: {}",
                    message
                );
                return Err(ServiceError::InsufficientInventory { message, items });
            }
            Err(err) => return Err(err),
        };

        let batch = self
            .repository
            .find_batch(batch_id)
            .await?
            .ok_or_else(|| ServiceError::InternalError("created batch not readable".into()))?;
        let plan = self
            .repository
            .find_plan(plan_id)
            .await?
            .ok_or_else(|| ServiceError::InternalError("created plan not readable".into()))?;
        let recipe = ProductionRepository::find_recipe(self.db.as_ref(), recipe_id).await?;

        counter!("sppg_production.batches_created", 1);
        histogram!("sppg_production.batch.planned_portions", f64::from(portions));
        info!(
            batch_number = %batch.batch_number,
            batch_id = %batch.id,
            target_portions = portions,
            "production batch created"
        );

        Ok(assemble_created_batch(
            batch,
            plan,
            recipe.as_ref(),
            &scaled,
            ingredients,
            estimated_cost,
        ))
    }
}

fn assemble_created_batch(
    batch: production_batch::Model,
    plan: production_plan::Model,
    recipe: Option<&recipe::Model>,
    scaled: &ScaledRecipe,
    ingredients: Vec<IngredientLine>,
    estimated_cost: Decimal,
) -> CreatedBatch {
    let plan = PlanView::from(plan);
    CreatedBatch {
        batch: BatchView {
            id: batch.id,
            batch_number: batch.batch_number,
            status: batch.status,
            planned_quantity: batch.planned_quantity,
            actual_quantity: batch.actual_quantity,
            notes: batch.notes,
            production_plan_id: batch.production_plan_id,
            recipe: recipe.map(RecipeSummary::from),
            production_plan: plan.clone(),
            created_at: batch.created_at,
        },
        plan,
        scaling_info: ScalingInfo {
            scaling_factor: scaled.scaling_factor,
            ingredient_count: scaled.ingredients.len(),
            estimated_cost,
            estimated_time_minutes: scaled.estimated_time_minutes,
        },
        ingredients,
    }
}
