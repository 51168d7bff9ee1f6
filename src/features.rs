//! Feature normalization: telemetry record -> named numeric columns -> vector
//! in the column order a trained model expects.

use std::collections::BTreeMap;

use crate::{
    error::PredictError,
    types::{Category, TelemetryRecord},
};

/// Named columns for one record, before alignment to a model schema.
pub type FeatureMap = BTreeMap<String, f64>;

/// Speed ceiling used when rebuilding a record as "normal" driving (km/h).
pub const CALM_SPEED_CAP: f64 = 60.0;
/// Acceleration band used when rebuilding a record as "normal" driving (m/s²).
pub const CALM_ACCEL_LIMIT: f64 = 2.0;

// ---------- Factor tables ----------

/// kg CO₂ per litre of fuel burnt.
pub fn emission_factor(fuel_type: &str) -> Option<f64> {
    match fuel_type {
        "Petrol" => Some(2.31),
        "Diesel" => Some(2.68),
        "CNG" => Some(2.03),
        "Electric" => Some(0.0),
        _ => None,
    }
}

pub fn vehicle_type_factor(vehicle_type: &str) -> Option<f64> {
    match vehicle_type {
        "Sedan" => Some(1.0),
        "SUV" => Some(1.2),
        "Truck" => Some(1.5),
        "Motorcycle" => Some(0.8),
        _ => None,
    }
}

/// Keyed by the numeric traffic level; non-integral levels have no factor.
pub fn traffic_factor(traffic_condition: f64) -> Option<f64> {
    if traffic_condition == 0.0 {
        Some(1.0)
    } else if traffic_condition == 1.0 {
        Some(1.2)
    } else if traffic_condition == 2.0 {
        Some(1.5)
    } else {
        None
    }
}

pub fn car_age_factor(car_age: f64) -> f64 {
    1.0 + 0.02 * car_age
}

pub fn gradient_factor(road_gradient: f64) -> f64 {
    1.0 + 0.05 * road_gradient
}

pub fn cylinders_factor(cylinders: f64) -> f64 {
    1.0 + (cylinders - 4.0) * 0.05
}

pub fn engine_size_factor(engine_size: f64) -> f64 {
    1.0 + (engine_size - 1.5) * 0.1
}

// ---------- Derivation ----------

fn required<T: Clone>(value: &Option<T>, field: &'static str) -> Result<T, PredictError> {
    value.clone().ok_or(PredictError::MissingField(field))
}

/// Indicator column name for a categorical level, e.g. `fuel_type_Diesel`.
pub fn indicator_column(field: &str, level: &Category) -> String {
    format!("{}_{}", field, level)
}

/// Raw numeric fields, the seven derived factors and one indicator column per
/// categorical field.
///
/// Indicators are emitted for every level the record carries. The reference
/// level and levels never seen in training have no column in the trained
/// schema, so [`order_from_flat`] leaves them all-zero.
pub fn derive_features(rec: &TelemetryRecord) -> Result<FeatureMap, PredictError> {
    let fuel_type = required(&rec.fuel_type, "fuel_type")?;
    let vehicle_type = required(&rec.vehicle_type, "vehicle_type")?;
    let traffic_condition = required(&rec.traffic_condition, "traffic_condition")?;
    let car_age = required(&rec.car_age, "car_age")?;
    let road_gradient = required(&rec.road_gradient, "road_gradient")?;
    let cylinders = required(&rec.cylinders, "cylinders")?;
    let engine_size = required(&rec.engine_size, "engine_size")?;

    let emission = emission_factor(&fuel_type).ok_or_else(|| PredictError::UnknownCategory {
        field: "fuel_type",
        value: fuel_type.clone(),
    })?;
    let vehicle_factor = vehicle_type_factor(&vehicle_type).ok_or_else(|| {
        PredictError::UnknownCategory {
            field: "vehicle_type",
            value: vehicle_type.clone(),
        }
    })?;
    let traffic =
        traffic_factor(traffic_condition).ok_or_else(|| PredictError::UnknownCategory {
            field: "traffic_condition",
            value: traffic_condition.to_string(),
        })?;

    let mut map = FeatureMap::new();

    // extras first so the named fields below always win
    for (k, v) in &rec.extra {
        match v {
            serde_json::Value::Number(n) => {
                if let Some(x) = n.as_f64() {
                    map.insert(k.clone(), x);
                }
            }
            serde_json::Value::Bool(b) => {
                map.insert(k.clone(), if *b { 1.0 } else { 0.0 });
            }
            _ => tracing::debug!("ignoring non-numeric field {}", k),
        }
    }

    let raw = [
        ("traffic_condition", Some(traffic_condition)),
        ("car_age", Some(car_age)),
        ("road_gradient", Some(road_gradient)),
        ("cylinders", Some(cylinders)),
        ("engine_size", Some(engine_size)),
        ("speed", rec.speed),
        ("acceleration", rec.acceleration),
        ("distance_traveled", rec.distance_traveled),
        ("fuel_efficiency", rec.fuel_efficiency),
    ];
    for (name, value) in raw {
        if let Some(x) = value {
            map.insert(name.to_string(), x);
        }
    }

    map.insert("emission_factor".into(), emission);
    map.insert("vehicle_type_factor".into(), vehicle_factor);
    map.insert("traffic_factor".into(), traffic);
    map.insert("car_age_factor".into(), car_age_factor(car_age));
    map.insert("gradient_factor".into(), gradient_factor(road_gradient));
    map.insert("cylinders_factor".into(), cylinders_factor(cylinders));
    map.insert("engine_size_factor".into(), engine_size_factor(engine_size));

    let fuel = Category::Text(fuel_type);
    let vehicle = Category::Text(vehicle_type);
    let categorical = [
        ("fuel_type", Some(&fuel)),
        ("vehicle_type", Some(&vehicle)),
        ("make", rec.make.as_ref()),
        ("model", rec.model.as_ref()),
        ("transmission", rec.transmission.as_ref()),
    ];
    for (field, level) in categorical {
        if let Some(level) = level {
            map.insert(indicator_column(field, level), 1.0);
        }
    }

    Ok(map)
}

// ---------- Feature ordering utility ----------

/// Reindex against a model schema: schema order, zero for absent columns,
/// columns outside the schema dropped.
pub fn order_from_flat(map: &FeatureMap, feat_list: &[String]) -> Vec<f32> {
    let mut v = Vec::with_capacity(feat_list.len());
    for k in feat_list {
        // models take f32; finite values beyond f32::MAX saturate to inf
        v.push(*map.get(k).unwrap_or(&0.0) as f32);
    }
    if tracing::enabled!(tracing::Level::DEBUG) {
        let dropped: Vec<&str> = map
            .keys()
            .filter(|k| !feat_list.contains(k))
            .map(String::as_str)
            .collect();
        if !dropped.is_empty() {
            tracing::debug!("columns outside schema dropped: {:?}", dropped);
        }
    }
    v
}

/// The same trip driven gently: speed capped, acceleration clamped, every
/// other field untouched.
pub fn calm_record(rec: &TelemetryRecord) -> TelemetryRecord {
    let mut calm = rec.clone();
    calm.speed = rec.speed.map(|s| s.min(CALM_SPEED_CAP));
    calm.acceleration = rec
        .acceleration
        .map(|a| a.clamp(-CALM_ACCEL_LIMIT, CALM_ACCEL_LIMIT));
    calm
}
