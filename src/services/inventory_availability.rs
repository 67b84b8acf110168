//! Availability of scaled requirements against on-hand inventory lots.
//!
//! Lots are consumed oldest-received-first. Nothing in this module mutates a
//! lot; the planned draw only describes what a consumption step would take.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::inventory_lot;
use crate::errors::ServiceError;
use crate::services::recipe_scaling::MaterialRequirement;

/// How the average unit price of a material is derived from its lots
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum PriceAveraging {
    /// Arithmetic mean of eligible lot prices
    #[default]
    LotMean,
    /// Mean weighted by each lot's quantity
    QuantityWeighted,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AvailabilityError {
    #[error("stock or cost figures for material {0} are out of range")]
    MaterialOverflow(Uuid),

    #[error("total estimated cost is out of range")]
    TotalOverflow,
}

impl From<AvailabilityError> for ServiceError {
    fn from(err: AvailabilityError) -> Self {
        ServiceError::InvalidArgument(err.to_string())
    }
}

/// Sum that yields `None` instead of overflowing.
pub fn checked_sum<I>(values: I) -> Option<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |total, value| total.checked_add(value))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AvailabilityOptions {
    pub price_averaging: PriceAveraging,
}

/// Everything known about one material's stock at check time
#[derive(Debug, Clone, Default)]
pub struct MaterialStock {
    pub material_name: String,
    pub lots: Vec<inventory_lot::Model>,
    /// Quantity already held by other pending batches
    pub reserved: Decimal,
}

/// A material that cannot be covered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InsufficientItem {
    pub material_id: Uuid,
    pub material_name: String,
    pub unit: String,
    #[schema(value_type = String, example = "20")]
    pub required: Decimal,
    #[schema(value_type = String, example = "10")]
    pub available: Decimal,
    #[schema(value_type = String, example = "10")]
    pub shortfall: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LotSnapshot {
    pub lot_id: Uuid,
    pub batch_number: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub received_at: DateTime<Utc>,
    pub expiry_date: Option<NaiveDate>,
    pub supplier_id: Option<Uuid>,
    pub quality_status: String,
}

impl From<&inventory_lot::Model> for LotSnapshot {
    fn from(lot: &inventory_lot::Model) -> Self {
        Self {
            lot_id: lot.id,
            batch_number: lot.batch_number.clone(),
            quantity: lot.quantity,
            unit_price: lot.unit_price,
            received_at: lot.received_at,
            expiry_date: lot.expiry_date,
            supplier_id: lot.supplier_id,
            quality_status: lot.quality_status.clone(),
        }
    }
}

/// Quantity a consumption step would take from one lot
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LotDraw {
    pub lot_id: Uuid,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialAvailability {
    pub raw_material_id: Uuid,
    pub material_name: String,
    pub unit: String,
    pub required: Decimal,
    /// Sum of eligible lot quantities
    pub current_stock: Decimal,
    pub reserved: Decimal,
    /// `current_stock - reserved`, floored at zero
    pub available: Decimal,
    pub shortfall: Decimal,
    pub is_available: bool,
    pub average_unit_price: Decimal,
    pub estimated_cost: Decimal,
    /// Eligible lots, oldest first
    pub lots: Vec<LotSnapshot>,
    pub planned_draw: Vec<LotDraw>,
}

impl MaterialAvailability {
    pub fn insufficient_item(&self) -> InsufficientItem {
        InsufficientItem {
            material_id: self.raw_material_id,
            material_name: self.material_name.clone(),
            unit: self.unit.clone(),
            required: self.required,
            available: self.available,
            shortfall: self.shortfall,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailabilityReport {
    pub can_produce: bool,
    pub materials: Vec<MaterialAvailability>,
    pub insufficient_items: Vec<InsufficientItem>,
    pub total_estimated_cost: Decimal,
    pub total_shortfall: Decimal,
}

impl AvailabilityReport {
    pub fn available_count(&self) -> usize {
        self.materials.iter().filter(|m| m.is_available).count()
    }
}

/// Eligible lots for one material, oldest received first (ties by lot id).
pub fn fifo_lots(lots: &[inventory_lot::Model]) -> Vec<&inventory_lot::Model> {
    let mut eligible: Vec<&inventory_lot::Model> =
        lots.iter().filter(|lot| lot.counts_toward_stock()).collect();
    eligible.sort_by(|a, b| {
        a.received_at
            .cmp(&b.received_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    eligible
}

/// Average unit price of `lots`, or `None` when the figures overflow.
pub fn average_unit_price(
    lots: &[&inventory_lot::Model],
    method: PriceAveraging,
) -> Option<Decimal> {
    if lots.is_empty() {
        return Some(Decimal::ZERO);
    }
    match method {
        PriceAveraging::LotMean => checked_sum(lots.iter().map(|lot| lot.unit_price))?
            .checked_div(Decimal::from(lots.len())),
        PriceAveraging::QuantityWeighted => {
            let quantity = checked_sum(lots.iter().map(|lot| lot.quantity))?;
            if quantity.is_zero() {
                return Some(Decimal::ZERO);
            }
            let value = lots.iter().try_fold(Decimal::ZERO, |total, lot| {
                total.checked_add(lot.quantity.checked_mul(lot.unit_price)?)
            })?;
            value.checked_div(quantity)
        }
    }
}

/// FIFO draw of `required` after the oldest `already_reserved` units have
/// been set aside for earlier batches. Stops early when lots run out.
pub fn plan_fifo_draw(
    lots: &[&inventory_lot::Model],
    already_reserved: Decimal,
    required: Decimal,
) -> Vec<LotDraw> {
    let mut skip = already_reserved.max(Decimal::ZERO);
    let mut remaining = required;
    let mut draw = Vec::new();

    for lot in lots {
        if remaining <= Decimal::ZERO {
            break;
        }
        let mut free = lot.quantity;
        if skip > Decimal::ZERO {
            let held = skip.min(free);
            skip -= held;
            free -= held;
        }
        if free <= Decimal::ZERO {
            continue;
        }
        let take = free.min(remaining);
        remaining -= take;
        draw.push(LotDraw {
            lot_id: lot.id,
            quantity: take,
        });
    }

    draw
}

/// Checks every requirement against its material's stock. A material with no
/// entry in `stock` is treated as having no lots.
pub fn check_availability(
    requirements: &[MaterialRequirement],
    stock: &HashMap<Uuid, MaterialStock>,
    options: AvailabilityOptions,
) -> Result<AvailabilityReport, AvailabilityError> {
    let empty = MaterialStock::default();
    let mut materials = Vec::with_capacity(requirements.len());

    for requirement in requirements {
        let entry = stock.get(&requirement.raw_material_id).unwrap_or(&empty);
        let lots = fifo_lots(&entry.lots);
        let overflow = AvailabilityError::MaterialOverflow(requirement.raw_material_id);

        let current_stock =
            checked_sum(lots.iter().map(|lot| lot.quantity)).ok_or(overflow.clone())?;
        let reserved = entry.reserved.max(Decimal::ZERO);
        let available = (current_stock - reserved).max(Decimal::ZERO);
        let shortfall = (requirement.required - available).max(Decimal::ZERO);
        let average_unit_price =
            average_unit_price(&lots, options.price_averaging).ok_or(overflow.clone())?;
        let estimated_cost = requirement
            .required
            .checked_mul(average_unit_price)
            .ok_or(overflow)?;

        let material_name = if entry.material_name.is_empty() {
            requirement.raw_material_id.to_string()
        } else {
            entry.material_name.clone()
        };

        materials.push(MaterialAvailability {
            raw_material_id: requirement.raw_material_id,
            material_name,
            unit: requirement.unit.clone(),
            required: requirement.required,
            current_stock,
            reserved,
            available,
            shortfall,
            is_available: available >= requirement.required,
            average_unit_price,
            estimated_cost,
            planned_draw: plan_fifo_draw(&lots, reserved, requirement.required),
            lots: lots.into_iter().map(LotSnapshot::from).collect(),
        });
    }

    let insufficient_items: Vec<InsufficientItem> = materials
        .iter()
        .filter(|m| !m.is_available)
        .map(MaterialAvailability::insufficient_item)
        .collect();

    Ok(AvailabilityReport {
        can_produce: insufficient_items.is_empty(),
        total_estimated_cost: checked_sum(materials.iter().map(|m| m.estimated_cost))
            .ok_or(AvailabilityError::TotalOverflow)?,
        total_shortfall: checked_sum(materials.iter().map(|m| m.shortfall))
            .ok_or(AvailabilityError::TotalOverflow)?,
        insufficient_items,
        materials,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::inventory_lot::QualityStatus;
    use chrono::{Duration, TimeZone};
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, day, 8, 0, 0).unwrap()
    }

    fn lot(material: Uuid, quantity: Decimal, price: Decimal, received: DateTime<Utc>) -> inventory_lot::Model {
        inventory_lot::Model {
            id: Uuid::new_v4(),
            raw_material_id: material,
            batch_number: None,
            quantity,
            unit_price: price,
            received_at: received,
            expiry_date: None,
            quality_status: QualityStatus::Good.to_string(),
            supplier_id: None,
            notes: None,
            created_at: received,
            updated_at: received,
            deleted_at: None,
        }
    }

    fn requirement(material: Uuid, required: Decimal) -> MaterialRequirement {
        MaterialRequirement {
            raw_material_id: material,
            unit: "kg".into(),
            required,
        }
    }

    fn stock(name: &str, lots: Vec<inventory_lot::Model>) -> MaterialStock {
        MaterialStock {
            material_name: name.into(),
            lots,
            reserved: Decimal::ZERO,
        }
    }

    #[test]
    fn sufficient_stock_across_lots() {
        let rice = Uuid::new_v4();
        let stock = HashMap::from([(
            rice,
            stock(
                "Beras",
                vec![
                    lot(rice, dec!(15), dec!(12000), at(2)),
                    lot(rice, dec!(10), dec!(11000), at(1)),
                ],
            ),
        )]);

        let report = check_availability(
            &[requirement(rice, dec!(20))],
            &stock,
            AvailabilityOptions::default(),
        )
        .unwrap();

        assert!(report.can_produce);
        let m = &report.materials[0];
        assert_eq!(m.current_stock, dec!(25));
        assert_eq!(m.shortfall, Decimal::ZERO);
        assert_eq!(m.average_unit_price, dec!(11500));
        assert_eq!(m.estimated_cost, dec!(230000));
        assert_eq!(m.lots[0].received_at, at(1));
        assert_eq!(m.planned_draw.len(), 2);
        assert_eq!(m.planned_draw[0].quantity, dec!(10));
        assert_eq!(m.planned_draw[1].quantity, dec!(10));
        assert!(report.insufficient_items.is_empty());
    }

    #[test]
    fn shortfall_is_reported_with_material_name() {
        let rice = Uuid::new_v4();
        let stock = HashMap::from([(rice, stock("Beras", vec![lot(rice, dec!(10), dec!(1), at(1))]))]);

        let report = check_availability(
            &[requirement(rice, dec!(20))],
            &stock,
            AvailabilityOptions::default(),
        )
        .unwrap();

        assert!(!report.can_produce);
        assert_eq!(report.total_shortfall, dec!(10));
        assert_eq!(
            report.insufficient_items,
            vec![InsufficientItem {
                material_id: rice,
                material_name: "Beras".into(),
                unit: "kg".into(),
                required: dec!(20),
                available: dec!(10),
                shortfall: dec!(10),
            }]
        );
        assert_eq!(report.materials[0].planned_draw[0].quantity, dec!(10));
    }

    #[test]
    fn rejected_deleted_and_empty_lots_do_not_count() {
        let oil = Uuid::new_v4();
        let mut rejected = lot(oil, dec!(50), dec!(100), at(1));
        rejected.quality_status = "rejected".into();
        let mut deleted = lot(oil, dec!(50), dec!(100), at(1));
        deleted.deleted_at = Some(at(3));
        let empty = lot(oil, dec!(0), dec!(999), at(1));
        let good = lot(oil, dec!(4), dec!(20), at(2));

        let stock = HashMap::from([(oil, stock("Minyak", vec![rejected, deleted, empty, good]))]);
        let report = check_availability(
            &[requirement(oil, dec!(4))],
            &stock,
            AvailabilityOptions::default(),
        )
        .unwrap();

        let m = &report.materials[0];
        assert_eq!(m.current_stock, dec!(4));
        assert_eq!(m.lots.len(), 1);
        assert_eq!(m.average_unit_price, dec!(20));
        assert!(m.is_available);
    }

    #[test]
    fn unknown_material_has_no_stock() {
        let ghost = Uuid::new_v4();
        let report = check_availability(
            &[requirement(ghost, dec!(1))],
            &HashMap::new(),
            AvailabilityOptions::default(),
        )
        .unwrap();
        let m = &report.materials[0];
        assert_eq!(m.current_stock, Decimal::ZERO);
        assert_eq!(m.average_unit_price, Decimal::ZERO);
        assert_eq!(m.material_name, ghost.to_string());
        assert!(!report.can_produce);
    }

    #[test]
    fn zero_requirement_is_always_available() {
        let salt = Uuid::new_v4();
        let report = check_availability(
            &[requirement(salt, Decimal::ZERO)],
            &HashMap::new(),
            AvailabilityOptions::default(),
        )
        .unwrap();
        assert!(report.can_produce);
        assert!(report.materials[0].planned_draw.is_empty());
    }

    #[test]
    fn reservations_reduce_availability_and_shift_draw() {
        let egg = Uuid::new_v4();
        let older = lot(egg, dec!(30), dec!(2), at(1));
        let newer = lot(egg, dec!(30), dec!(2), at(2));
        let newer_id = newer.id;
        let mut entry = stock("Telur", vec![newer, older]);
        entry.reserved = dec!(40);
        let stock = HashMap::from([(egg, entry)]);

        let report = check_availability(
            &[requirement(egg, dec!(25))],
            &stock,
            AvailabilityOptions::default(),
        )
        .unwrap();

        let m = &report.materials[0];
        assert_eq!(m.current_stock, dec!(60));
        assert_eq!(m.reserved, dec!(40));
        assert_eq!(m.available, dec!(20));
        assert_eq!(m.shortfall, dec!(5));
        assert!(!m.is_available);
        assert_eq!(
            m.planned_draw,
            vec![LotDraw {
                lot_id: newer_id,
                quantity: dec!(20)
            }]
        );
    }

    #[rstest]
    #[case(PriceAveraging::LotMean, dec!(15))]
    #[case(PriceAveraging::QuantityWeighted, dec!(18))]
    fn price_averaging_methods(#[case] method: PriceAveraging, #[case] expected: Decimal) {
        let m = Uuid::new_v4();
        let cheap = lot(m, dec!(1), dec!(10), at(1));
        let dear = lot(m, dec!(4), dec!(20), at(2));
        assert_eq!(average_unit_price(&[&cheap, &dear], method), Some(expected));
    }

    #[test]
    fn fifo_ties_break_on_lot_id() {
        let m = Uuid::new_v4();
        let mut a = lot(m, dec!(1), dec!(1), at(1));
        let mut b = lot(m, dec!(1), dec!(1), at(1));
        a.id = Uuid::from_u128(2);
        b.id = Uuid::from_u128(1);
        let c = lot(m, dec!(1), dec!(1), at(1) - Duration::hours(1));

        let lots = vec![a, b, c.clone()];
        let ordered: Vec<Uuid> = fifo_lots(&lots).iter().map(|l| l.id).collect();
        assert_eq!(ordered, vec![c.id, Uuid::from_u128(1), Uuid::from_u128(2)]);
    }

    #[test]
    fn price_averaging_parses_from_config_strings() {
        assert_eq!("lot_mean".parse::<PriceAveraging>().unwrap(), PriceAveraging::LotMean);
        assert_eq!(
            "Quantity_Weighted".parse::<PriceAveraging>().unwrap(),
            PriceAveraging::QuantityWeighted
        );
        assert!("median".parse::<PriceAveraging>().is_err());
        assert_eq!(PriceAveraging::QuantityWeighted.to_string(), "quantity_weighted");
    }

    #[test]
    fn cost_overflow_is_an_error_not_a_panic() {
        let beef = Uuid::new_v4();
        let stock = HashMap::from([(
            beef,
            stock("Daging", vec![lot(beef, dec!(100), Decimal::MAX, at(1))]),
        )]);

        let err = check_availability(
            &[requirement(beef, dec!(2))],
            &stock,
            AvailabilityOptions::default(),
        )
        .unwrap_err();

        assert_eq!(err, AvailabilityError::MaterialOverflow(beef));
        assert_matches::assert_matches!(ServiceError::from(err), ServiceError::InvalidArgument(_));
    }

    #[test]
    fn weighted_price_overflow_is_reported() {
        let m = Uuid::new_v4();
        let huge = lot(m, Decimal::MAX, Decimal::MAX, at(1));
        assert_eq!(average_unit_price(&[&huge], PriceAveraging::QuantityWeighted), None);
        assert_eq!(average_unit_price(&[&huge], PriceAveraging::LotMean), Some(Decimal::MAX));
    }

    #[test]
    fn total_cost_overflow_is_reported() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let half = Decimal::MAX / dec!(2) + dec!(1);
        let stock = HashMap::from([
            (a, stock("Beras", vec![lot(a, dec!(1), half, at(1))])),
            (b, stock("Jagung", vec![lot(b, dec!(1), half, at(1))])),
        ]);

        let err = check_availability(
            &[requirement(a, dec!(1)), requirement(b, dec!(1))],
            &stock,
            AvailabilityOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err, AvailabilityError::TotalOverflow);
    }
}
