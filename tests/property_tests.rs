//! Property-based tests for the scaling and availability calculators.
//!
//! These check the numeric invariants over a wide range of recipes, stock
//! levels and portion counts.

use std::collections::HashMap;

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use sppg_production::entities::{inventory_lot, recipe, recipe_ingredient};
use sppg_production::services::inventory_availability::{
    check_availability, AvailabilityOptions, MaterialStock, PriceAveraging,
};
use sppg_production::services::recipe_scaling::{scale_recipe, scaling_factor, MaterialRequirement};
use uuid::Uuid;

// Strategies for generating test data
fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..100_000, 0u32..4).prop_map(|(units, scale)| Decimal::new(units, scale))
}

fn price_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..5_000_000, 0u32..3).prop_map(|(units, scale)| Decimal::new(units, scale))
}

fn recipe_model(serving_size: i32) -> recipe::Model {
    recipe::Model {
        id: Uuid::new_v4(),
        name: "Sayur Sop".to_string(),
        description: None,
        serving_size,
        prep_time_minutes: 15,
        cook_time_minutes: 30,
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn ingredient(material: Uuid, quantity: Decimal, position: i32) -> recipe_ingredient::Model {
    recipe_ingredient::Model {
        id: Uuid::new_v4(),
        recipe_id: Uuid::nil(),
        raw_material_id: material,
        quantity,
        unit: "kg".to_string(),
        notes: None,
        position,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn lot(material: Uuid, quantity: Decimal, price: Decimal, age_hours: i64) -> inventory_lot::Model {
    let received = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap() + Duration::hours(age_hours);
    inventory_lot::Model {
        id: Uuid::new_v4(),
        raw_material_id: material,
        batch_number: None,
        quantity,
        unit_price: price,
        received_at: received,
        expiry_date: None,
        quality_status: "GOOD".to_string(),
        supplier_id: None,
        notes: None,
        created_at: received,
        updated_at: received,
        deleted_at: None,
    }
}

// Property: scaling is proportional and order preserving
proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn scaled_quantities_are_proportional(
        serving_size in 1i32..500,
        portions in 1i32..5_000,
        quantities in prop::collection::vec(quantity_strategy(), 0..8),
    ) {
        let recipe = recipe_model(serving_size);
        let lines: Vec<_> = quantities
            .iter()
            .enumerate()
            .map(|(i, q)| ingredient(Uuid::new_v4(), *q, i as i32))
            .collect();

        let scaled = scale_recipe(&recipe, &lines, portions).unwrap();
        let factor = scaling_factor(portions, serving_size).unwrap();

        prop_assert_eq!(scaled.ingredients.len(), lines.len());
        for (line, original) in scaled.ingredients.iter().zip(&lines) {
            prop_assert_eq!(line.ingredient_id, original.id);
            prop_assert_eq!(line.scaled_quantity, original.quantity * factor);
            prop_assert!(line.scaled_quantity >= Decimal::ZERO);
        }
        prop_assert!(scaled.estimated_time_minutes >= f64::from(scaled.base_time_minutes) + 1.0);
    }

    #[test]
    fn canonical_portions_leave_quantities_unchanged(
        serving_size in 1i32..500,
        quantity in quantity_strategy(),
    ) {
        let recipe = recipe_model(serving_size);
        let lines = vec![ingredient(Uuid::new_v4(), quantity, 1)];
        let scaled = scale_recipe(&recipe, &lines, serving_size).unwrap();
        prop_assert_eq!(scaled.scaling_factor, Decimal::ONE);
        prop_assert_eq!(scaled.ingredients[0].scaled_quantity, quantity);
    }

    #[test]
    fn non_positive_portions_always_fail(portions in i32::MIN..=0, serving_size in 1i32..500) {
        let recipe = recipe_model(serving_size);
        prop_assert!(scale_recipe(&recipe, &[], portions).is_err());
    }
}

// Property: availability flags, shortfall and draw plans agree with stock
proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn availability_matches_stock(
        required in quantity_strategy(),
        lots in prop::collection::vec((quantity_strategy(), price_strategy(), 0i64..1_000), 0..6),
        weighted in any::<bool>(),
    ) {
        let material = Uuid::new_v4();
        let lots: Vec<_> = lots
            .into_iter()
            .map(|(q, p, age)| lot(material, q, p, age))
            .collect();
        let stock = HashMap::from([(
            material,
            MaterialStock {
                material_name: "Wortel".to_string(),
                lots: lots.clone(),
                reserved: Decimal::ZERO,
            },
        )]);
        let options = AvailabilityOptions {
            price_averaging: if weighted {
                PriceAveraging::QuantityWeighted
            } else {
                PriceAveraging::LotMean
            },
        };
        let requirement = MaterialRequirement {
            raw_material_id: material,
            unit: "kg".to_string(),
            required,
        };

        let report = check_availability(&[requirement], &stock, options).unwrap();
        let m = &report.materials[0];
        let on_hand: Decimal = lots.iter().map(|l| l.quantity).sum();

        prop_assert_eq!(m.current_stock, on_hand);
        prop_assert_eq!(m.is_available, on_hand >= required);
        prop_assert_eq!(m.shortfall, (required - on_hand).max(Decimal::ZERO));
        prop_assert!(m.shortfall >= Decimal::ZERO);
        prop_assert_eq!(report.can_produce, m.is_available);
        prop_assert_eq!(report.insufficient_items.len(), usize::from(!m.is_available));

        let drawn: Decimal = m.planned_draw.iter().map(|d| d.quantity).sum();
        prop_assert_eq!(drawn, required.min(on_hand));

        for pair in m.lots.windows(2) {
            prop_assert!(pair[0].received_at <= pair[1].received_at);
        }
        prop_assert!(m.lots.iter().all(|l| l.quantity > Decimal::ZERO));
    }

    #[test]
    fn reservations_never_increase_availability(
        required in quantity_strategy(),
        on_hand in quantity_strategy(),
        reserved in quantity_strategy(),
    ) {
        let material = Uuid::new_v4();
        let requirement = MaterialRequirement {
            raw_material_id: material,
            unit: "kg".to_string(),
            required,
        };
        let stock_with = |reserved: Decimal| {
            HashMap::from([(
                material,
                MaterialStock {
                    material_name: "Telur".to_string(),
                    lots: vec![lot(material, on_hand, Decimal::ONE, 0)],
                    reserved,
                },
            )])
        };

        let free = check_availability(&[requirement.clone()], &stock_with(Decimal::ZERO), AvailabilityOptions::default()).unwrap();
        let held = check_availability(&[requirement], &stock_with(reserved), AvailabilityOptions::default()).unwrap();

        prop_assert!(held.materials[0].available <= free.materials[0].available);
        prop_assert!(held.materials[0].available >= Decimal::ZERO);
        prop_assert!(held.materials[0].shortfall >= free.materials[0].shortfall);
        prop_assert!(!held.can_produce || free.can_produce);
    }
}
