//! Rows exchanged with the fleet backend.
//!
//! Field names follow the backend's column names so the same types can be
//! decoded from and encoded to PostgREST JSON without a mapping layer.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Lifecycle of a trip. `Ongoing` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Ongoing,
    Completed,
    Cancelled,
    EndedManually,
}

impl TripStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ongoing => "ongoing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::EndedManually => "ended_manually",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Ongoing)
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsignmentStatus {
    Pending,
    Ongoing,
    Completed,
}

/// Shipping priority. Carried through settlement but never priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsignmentType {
    Priority,
    Medium,
    Standard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    Available,
    OnDuty,
    Garage,
}

/// Driver availability as stored by the backend (capitalised values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriverStatus {
    Available,
    Busy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: String,
    pub consignment_id: String,
    pub driver_id: String,
    pub vehicle_id: String,
    pub pickup_address: String,
    pub drop_address: String,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    pub status: TripStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consignment {
    pub id: String,
    /// Payload weight in kilograms, kept as the raw text the backend sent.
    #[serde(deserialize_with = "weight_text")]
    pub weight: String,
    #[serde(rename = "type")]
    pub consignment_type: ConsignmentType,
    pub status: ConsignmentStatus,
    pub pickup_address: String,
    pub drop_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    /// Vehicle class code (`HCV`, `MCV`, `LCV`); parsed at settlement time.
    pub vehicle_type: String,
    pub status: VehicleStatus,
}

/// Financial outcome of one settled trip. Written once per trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRevenue {
    pub trip_id: String,
    /// Kilometres between pickup and drop.
    pub distance_covered: f64,
    pub fuel_cost: f64,
    pub driver_cost: f64,
    pub customer_charge: f64,
    /// Assigned by the backend on insert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDeviationWarning {
    pub id: String,
    pub trip_id: String,
    pub driver_id: String,
    pub consignment_id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub optimal_latitude: Option<f64>,
    #[serde(default)]
    pub optimal_longitude: Option<f64>,
    /// Metres between the observed position and the planned route.
    pub distance_from_route: f64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub admin_acknowledged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub driver_acknowledged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub details: Option<String>,
}

/// The backend stores weight as text on some deployments and numeric on
/// others; both are accepted and kept as text.
fn weight_text<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(numeric::Number),
    }

    Ok(match Raw::deserialize(de)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}

mod numeric {
    use serde::Deserialize;
    use std::fmt;

    /// Integer or float weight as sent by numeric columns.
    #[derive(Deserialize)]
    #[serde(untagged)]
    pub enum Number {
        Int(i64),
        Float(f64),
    }

    impl fmt::Display for Number {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::Int(value) => write!(f, "{value}"),
                Self::Float(value) => write!(f, "{value}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trip_status_uses_backend_spelling() {
        let encoded = serde_json::to_string(&TripStatus::EndedManually).expect("encode");
        assert_eq!(encoded, "\"ended_manually\"");
        assert_eq!(TripStatus::EndedManually.to_string(), "ended_manually");
        assert!(!TripStatus::Ongoing.is_terminal());
        assert!(TripStatus::Cancelled.is_terminal());
    }

    #[test]
    fn driver_status_is_capitalised() {
        let encoded = serde_json::to_string(&DriverStatus::Available).expect("encode");
        assert_eq!(encoded, "\"Available\"");
    }

    #[test]
    fn consignment_weight_accepts_text_and_numbers() {
        let text: Consignment = serde_json::from_value(serde_json::json!({
            "id": "CSG-001",
            "weight": "2000",
            "type": "priority",
            "status": "ongoing",
            "pickup_address": "Depot",
            "drop_address": "Warehouse",
        }))
        .expect("text weight");
        assert_eq!(text.weight, "2000");

        let numeric: Consignment = serde_json::from_value(serde_json::json!({
            "id": "CSG-002",
            "weight": 1250.5,
            "type": "standard",
            "status": "pending",
            "pickup_address": "Depot",
            "drop_address": "Warehouse",
        }))
        .expect("numeric weight");
        assert_eq!(numeric.weight, "1250.5");
    }

    #[test]
    fn revenue_omits_created_at_until_assigned() {
        let revenue = TripRevenue {
            trip_id: "trip-1".to_string(),
            distance_covered: 10.0,
            fuel_cost: 1.0,
            driver_cost: 2.0,
            customer_charge: 3.0,
            created_at: None,
        };
        let encoded = serde_json::to_value(&revenue).expect("encode");
        assert!(encoded.get("created_at").is_none());
    }
}
