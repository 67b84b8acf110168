//! Proportional recipe scaling.
//!
//! Ingredient quantities are stored for the recipe's canonical serving size;
//! scaling multiplies each of them by `target_portions / serving_size`.
//! Everything here is pure.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::entities::{recipe, recipe_ingredient};
use crate::errors::ServiceError;

/// Minutes added to the base time regardless of how small the batch is.
const MIN_SCALING_OVERHEAD_MINUTES: f64 = 1.0;
/// Minutes of overhead per unit of `ln(scaling_factor)`.
const SCALING_OVERHEAD_PER_LN: f64 = 10.0;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScalingError {
    #[error("target portions must be greater than zero (got {0})")]
    InvalidTargetPortions(i64),

    #[error("recipe serving size must be greater than zero (got {0})")]
    InvalidServingSize(i32),

    #[error("scaled quantity for material {0} is out of range")]
    QuantityOverflow(Uuid),
}

impl From<ScalingError> for ServiceError {
    fn from(err: ScalingError) -> Self {
        match err {
            ScalingError::InvalidTargetPortions(_) | ScalingError::QuantityOverflow(_) => {
                ServiceError::InvalidArgument(err.to_string())
            }
            ScalingError::InvalidServingSize(_) => ServiceError::InvalidState(err.to_string()),
        }
    }
}

/// One recipe line after scaling
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaledIngredient {
    pub ingredient_id: Uuid,
    pub raw_material_id: Uuid,
    pub unit: String,
    pub original_quantity: Decimal,
    pub scaled_quantity: Decimal,
    pub notes: Option<String>,
}

/// Total requirement for one raw material
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialRequirement {
    pub raw_material_id: Uuid,
    pub unit: String,
    pub required: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaledRecipe {
    pub recipe_id: Uuid,
    pub recipe_name: String,
    pub serving_size: i32,
    pub target_portions: i32,
    pub scaling_factor: Decimal,
    pub base_time_minutes: i32,
    pub estimated_time_minutes: f64,
    pub ingredients: Vec<ScaledIngredient>,
}

impl ScaledRecipe {
    /// Folds the scaled lines into one requirement per material, in order of
    /// first appearance. The unit of the first line for a material is kept.
    pub fn requirements_by_material(&self) -> Result<Vec<MaterialRequirement>, ScalingError> {
        let mut requirements: Vec<MaterialRequirement> = Vec::new();
        for line in &self.ingredients {
            match requirements
                .iter_mut()
                .find(|r| r.raw_material_id == line.raw_material_id)
            {
                Some(existing) => {
                    existing.required = existing
                        .required
                        .checked_add(line.scaled_quantity)
                        .ok_or(ScalingError::QuantityOverflow(line.raw_material_id))?;
                }
                None => requirements.push(MaterialRequirement {
                    raw_material_id: line.raw_material_id,
                    unit: line.unit.clone(),
                    required: line.scaled_quantity,
                }),
            }
        }
        Ok(requirements)
    }
}

/// `target_portions / serving_size`, exact to decimal precision.
pub fn scaling_factor(target_portions: i32, serving_size: i32) -> Result<Decimal, ScalingError> {
    if target_portions <= 0 {
        return Err(ScalingError::InvalidTargetPortions(target_portions.into()));
    }
    if serving_size <= 0 {
        return Err(ScalingError::InvalidServingSize(serving_size));
    }
    Ok(Decimal::from(target_portions) / Decimal::from(serving_size))
}

/// Base preparation plus cooking time, with an overhead that grows with the
/// logarithm of the scaling factor and never drops below one minute.
pub fn estimated_time_minutes(base_minutes: i32, scaling_factor: Decimal) -> f64 {
    let factor = scaling_factor.to_f64().unwrap_or(1.0);
    let overhead = if factor > 0.0 {
        (factor.ln() * SCALING_OVERHEAD_PER_LN).max(MIN_SCALING_OVERHEAD_MINUTES)
    } else {
        MIN_SCALING_OVERHEAD_MINUTES
    };
    f64::from(base_minutes) + overhead
}

/// Scales every ingredient of `recipe` to `target_portions`, keeping the
/// order of `ingredients`.
pub fn scale_recipe(
    recipe: &recipe::Model,
    ingredients: &[recipe_ingredient::Model],
    target_portions: i32,
) -> Result<ScaledRecipe, ScalingError> {
    let factor = scaling_factor(target_portions, recipe.serving_size)?;

    let ingredients = ingredients
        .iter()
        .map(|line| {
            let scaled_quantity = line
                .quantity
                .checked_mul(factor)
                .ok_or(ScalingError::QuantityOverflow(line.raw_material_id))?;
            Ok(ScaledIngredient {
                ingredient_id: line.id,
                raw_material_id: line.raw_material_id,
                unit: line.unit.clone(),
                original_quantity: line.quantity,
                scaled_quantity,
                notes: line.notes.clone(),
            })
        })
        .collect::<Result<Vec<_>, ScalingError>>()?;

    let base_time_minutes = recipe
        .prep_time_minutes
        .saturating_add(recipe.cook_time_minutes);

    Ok(ScaledRecipe {
        recipe_id: recipe.id,
        recipe_name: recipe.name.clone(),
        serving_size: recipe.serving_size,
        target_portions,
        scaling_factor: factor,
        base_time_minutes,
        estimated_time_minutes: estimated_time_minutes(base_time_minutes, factor),
        ingredients,
    })
}
