// Pure calculators
pub mod inventory_availability;
pub mod recipe_scaling;

// Store-backed production planning
pub mod production;
