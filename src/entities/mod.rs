//! sea-orm entities backing the recipe catalog, the inventory ledger and
//! production planning.

pub mod batch_material_requirement;
pub mod inventory_lot;
pub mod production_batch;
pub mod production_plan;
pub mod raw_material;
pub mod recipe;
pub mod recipe_ingredient;
