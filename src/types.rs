use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt};

/// Free-form categorical value. Clients send `make`/`model`/`transmission`
/// either as strings or as bare numbers (`"model": 2022`).
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Category {
    Text(String),
    Number(serde_json::Number),
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Text(s) => f.write_str(s),
            Category::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for Category {
    fn from(s: &str) -> Self {
        Category::Text(s.to_string())
    }
}

// One telemetry sample as posted by the client. Everything is optional on the
// wire; the normalizer decides what is required.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct TelemetryRecord {
    pub fuel_type: Option<String>,
    pub vehicle_type: Option<String>,
    pub traffic_condition: Option<f64>, // 0 = free, 1 = moderate, 2 = heavy
    pub car_age: Option<f64>,           // years
    pub road_gradient: Option<f64>,     // degrees
    pub cylinders: Option<f64>,
    pub engine_size: Option<f64>,       // litres
    pub speed: Option<f64>,             // km/h
    pub acceleration: Option<f64>,      // m/s²
    pub distance_traveled: Option<f64>, // km
    pub fuel_efficiency: Option<f64>,
    pub make: Option<Category>,
    pub model: Option<Category>,
    pub transmission: Option<Category>,
    // anything else the client sends; numeric values become raw columns
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl TelemetryRecord {
    pub fn is_electric(&self) -> bool {
        self.fuel_type.as_deref() == Some("Electric")
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct EmissionOut {
    pub predicted_emission: f64,
}

// Response of /predict-harsh-driving. Fields that do not apply to the
// outcome are omitted from the JSON body.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct HarshDrivingOut {
    pub harsh_driving: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carbon_emission: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub harsh_emission: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normal_emission: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_emission: Option<f64>,
    pub message: String,
}
