//! Rate card and per-class mileage used to settle a trip.
//!
//! Formulas:
//! - `fuel_cost = distance_km / mileage * fuel_cost_per_liter`
//! - `driver_cost = distance_km * driver_cost_per_km`
//! - `customer_charge = distance_km * weight_kg * charge_per_kg_per_km`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::TripRevenue;

/// Fuel price in currency units per litre.
pub const FUEL_COST_PER_LITER: f64 = 110.0;

/// Driver pay in currency units per kilometre.
pub const DRIVER_COST_PER_KM: f64 = 7.0;

/// Customer charge in currency units per kilogram-kilometre.
pub const CHARGE_PER_KG_PER_KM: f64 = 500.0;

/// Vehicle classes with a known fuel economy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleClass {
    #[serde(rename = "HCV")]
    Hcv,
    #[serde(rename = "MCV")]
    Mcv,
    #[serde(rename = "LCV")]
    Lcv,
}

impl VehicleClass {
    /// Kilometres per litre.
    pub fn mileage_km_per_liter(self) -> f64 {
        match self {
            Self::Hcv => 5.0,
            Self::Mcv => 7.0,
            Self::Lcv => 9.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hcv => "HCV",
            Self::Mcv => "MCV",
            Self::Lcv => "LCV",
        }
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown vehicle class '{0}'")]
pub struct UnknownVehicleClass(pub String);

impl FromStr for VehicleClass {
    type Err = UnknownVehicleClass;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "HCV" => Ok(Self::Hcv),
            "MCV" => Ok(Self::Mcv),
            "LCV" => Ok(Self::Lcv),
            _ => Err(UnknownVehicleClass(raw.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("consignment weight '{raw}' is not a non-negative number")]
pub struct InvalidWeight {
    pub raw: String,
}

/// Parse a consignment weight (kilograms) from its transported text form.
pub fn parse_weight_kg(raw: &str) -> Result<f64, InvalidWeight> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
        _ => Err(InvalidWeight {
            raw: raw.to_string(),
        }),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("rate '{field}' must be finite and non-negative")]
pub struct InvalidRateCard {
    pub field: &'static str,
}

/// Per-unit prices applied to a settled trip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateCard {
    pub fuel_cost_per_liter: f64,
    pub driver_cost_per_km: f64,
    pub charge_per_kg_per_km: f64,
}

impl Default for RateCard {
    fn default() -> Self {
        Self {
            fuel_cost_per_liter: FUEL_COST_PER_LITER,
            driver_cost_per_km: DRIVER_COST_PER_KM,
            charge_per_kg_per_km: CHARGE_PER_KG_PER_KM,
        }
    }
}

impl RateCard {
    pub fn validate(&self) -> Result<(), InvalidRateCard> {
        let fields = [
            ("fuel_cost_per_liter", self.fuel_cost_per_liter),
            ("driver_cost_per_km", self.driver_cost_per_km),
            ("charge_per_kg_per_km", self.charge_per_kg_per_km),
        ];
        for (field, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(InvalidRateCard { field });
            }
        }
        Ok(())
    }

    /// Price a trip of `distance_km` carrying `weight_kg` in a vehicle of `class`.
    pub fn settle(
        &self,
        distance_km: f64,
        class: VehicleClass,
        weight_kg: f64,
    ) -> SettlementBreakdown {
        let fuel_consumed_liters = distance_km / class.mileage_km_per_liter();
        SettlementBreakdown {
            distance_km,
            vehicle_class: class,
            weight_kg,
            fuel_consumed_liters,
            fuel_cost: fuel_consumed_liters * self.fuel_cost_per_liter,
            driver_cost: distance_km * self.driver_cost_per_km,
            customer_charge: distance_km * weight_kg * self.charge_per_kg_per_km,
        }
    }
}

/// Every intermediate figure of a settlement, kept for auditing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SettlementBreakdown {
    pub distance_km: f64,
    pub vehicle_class: VehicleClass,
    pub weight_kg: f64,
    pub fuel_consumed_liters: f64,
    pub fuel_cost: f64,
    pub driver_cost: f64,
    pub customer_charge: f64,
}

impl SettlementBreakdown {
    pub fn to_revenue(&self, trip_id: &str) -> TripRevenue {
        TripRevenue {
            trip_id: trip_id.to_string(),
            distance_covered: self.distance_km,
            fuel_cost: self.fuel_cost,
            driver_cost: self.driver_cost,
            customer_charge: self.customer_charge,
            created_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_mapping_is_explicit() {
        assert_eq!("HCV".parse::<VehicleClass>(), Ok(VehicleClass::Hcv));
        assert_eq!(" mcv ".parse::<VehicleClass>(), Ok(VehicleClass::Mcv));
        assert_eq!("LCV".parse::<VehicleClass>(), Ok(VehicleClass::Lcv));
        assert_eq!(VehicleClass::Hcv.mileage_km_per_liter(), 5.0);
        assert_eq!(VehicleClass::Mcv.mileage_km_per_liter(), 7.0);
        assert_eq!(VehicleClass::Lcv.mileage_km_per_liter(), 9.0);

        let err = "Trailer".parse::<VehicleClass>().expect_err("unknown class");
        assert_eq!(err, UnknownVehicleClass("Trailer".to_string()));
    }

    #[test]
    fn settles_reference_trip() {
        let breakdown = RateCard::default().settle(100.0, VehicleClass::Mcv, 2000.0);

        assert!((breakdown.fuel_consumed_liters - 14.286).abs() < 1e-3);
        assert!((breakdown.fuel_cost - 1571.43).abs() < 1e-2);
        assert_eq!(breakdown.driver_cost, 700.0);
        assert_eq!(breakdown.customer_charge, 100_000_000.0);
    }

    #[test]
    fn fuel_cost_grows_with_distance_and_shrinks_with_mileage() {
        let rates = RateCard::default();
        let short = rates.settle(10.0, VehicleClass::Mcv, 1.0);
        let long = rates.settle(20.0, VehicleClass::Mcv, 1.0);
        assert!(long.fuel_cost > short.fuel_cost);

        let heavy = rates.settle(50.0, VehicleClass::Hcv, 1.0);
        let light = rates.settle(50.0, VehicleClass::Lcv, 1.0);
        assert!(heavy.fuel_cost > light.fuel_cost);
        assert!((heavy.fuel_cost - 50.0 / 5.0 * FUEL_COST_PER_LITER).abs() < 1e-9);
    }

    #[test]
    fn driver_cost_and_charge_are_linear() {
        let rates = RateCard::default();
        let breakdown = rates.settle(12.5, VehicleClass::Lcv, 40.0);
        assert_eq!(breakdown.driver_cost, 12.5 * DRIVER_COST_PER_KM);
        assert_eq!(breakdown.customer_charge, 12.5 * 40.0 * CHARGE_PER_KG_PER_KM);
    }

    #[test]
    fn weight_parsing_rejects_garbage() {
        assert_eq!(parse_weight_kg(" 2000 "), Ok(2000.0));
        assert_eq!(parse_weight_kg("0"), Ok(0.0));
        assert!(parse_weight_kg("two tonnes").is_err());
        assert!(parse_weight_kg("-5").is_err());
        assert!(parse_weight_kg("NaN").is_err());
        assert!(parse_weight_kg("").is_err());
    }

    #[test]
    fn rate_card_validation_names_bad_field() {
        let rates = RateCard {
            driver_cost_per_km: f64::INFINITY,
            ..RateCard::default()
        };
        assert_eq!(
            rates.validate(),
            Err(InvalidRateCard {
                field: "driver_cost_per_km"
            })
        );
        assert!(RateCard::default().validate().is_ok());
    }

    #[test]
    fn breakdown_converts_to_revenue_row() {
        let breakdown = RateCard::default().settle(3.0, VehicleClass::Hcv, 10.0);
        let revenue = breakdown.to_revenue("trip-9");
        assert_eq!(revenue.trip_id, "trip-9");
        assert_eq!(revenue.distance_covered, 3.0);
        assert_eq!(revenue.driver_cost, 21.0);
        assert_eq!(revenue.created_at, None);
    }
}
