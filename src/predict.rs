use anyhow::{Context, Result};
use std::sync::Arc;

use crate::{
    config::ServerConfig,
    error::PredictError,
    features::{calm_record, derive_features, order_from_flat, FeatureMap},
    model::{
        load_feat_list, Classifier, Regressor, TorchClassifier, TorchRegressor,
        HARSH_CLASS, HARSH_DEFAULT_FEATURES,
    },
    types::{HarshDrivingOut, TelemetryRecord},
};

pub const MSG_ELECTRIC: &str =
    "Electric Vehicle Detected - Harsh driving detection is not required.";
pub const MSG_HARSH: &str = "Harsh Driving Detected!";
pub const MSG_NORMAL: &str = "Normal Driving";

/// Round to 4 decimal digits, as emissions are reported.
pub fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

/// Outcome of the harsh-driving check for one record. Emissions are in
/// grams CO₂ and unrounded.
#[derive(Debug, Clone, PartialEq)]
pub enum DrivingAssessment {
    Electric,
    Normal,
    Harsh {
        harsh_emission: f64,
        normal_emission: f64,
    },
}

impl DrivingAssessment {
    pub fn extra_emission(&self) -> Option<f64> {
        match self {
            DrivingAssessment::Harsh {
                harsh_emission,
                normal_emission,
            } => Some(harsh_emission - normal_emission),
            _ => None,
        }
    }
}

impl From<DrivingAssessment> for HarshDrivingOut {
    fn from(a: DrivingAssessment) -> Self {
        let extra = a.extra_emission();
        match a {
            DrivingAssessment::Electric => HarshDrivingOut {
                harsh_driving: false,
                carbon_emission: Some(0.0),
                harsh_emission: None,
                normal_emission: None,
                extra_emission: None,
                message: MSG_ELECTRIC.to_string(),
            },
            DrivingAssessment::Normal => HarshDrivingOut {
                harsh_driving: false,
                carbon_emission: None,
                harsh_emission: None,
                normal_emission: None,
                extra_emission: None,
                message: MSG_NORMAL.to_string(),
            },
            DrivingAssessment::Harsh {
                harsh_emission,
                normal_emission,
            } => HarshDrivingOut {
                harsh_driving: true,
                carbon_emission: None,
                harsh_emission: Some(round4(harsh_emission)),
                normal_emission: Some(round4(normal_emission)),
                extra_emission: extra.map(round4),
                message: MSG_HARSH.to_string(),
            },
        }
    }
}

/// Forwards aligned feature vectors to the loaded models. Cheap to clone;
/// the models are shared read-only for the life of the process.
#[derive(Clone)]
pub struct Dispatcher {
    emission: Arc<dyn Regressor>,
    harsh: Arc<dyn Classifier>,
    log_vectors: bool,
}

impl Dispatcher {
    pub fn new(emission: Arc<dyn Regressor>, harsh: Arc<dyn Classifier>) -> Self {
        Self {
            emission,
            harsh,
            log_vectors: false,
        }
    }

    pub fn with_vector_logging(mut self, on: bool) -> Self {
        self.log_vectors = on;
        self
    }

    /// Load both TorchScript models and their schemas as configured.
    pub fn load(cfg: &ServerConfig) -> Result<Self> {
        let emission_feats = load_feat_list(&cfg.emission_meta_path)?;
        let harsh_feats = match &cfg.harsh_meta_path {
            Some(p) => load_feat_list(p)?,
            None => HARSH_DEFAULT_FEATURES.iter().map(|s| s.to_string()).collect(),
        };

        let emission = TorchRegressor::load(&cfg.emission_model_path, emission_feats)
            .context("loading emission model")?;
        tracing::info!(
            "loaded emission model; feat_list[{}]: {:?}",
            emission.feature_names().len(),
            emission.feature_names()
        );
        let harsh = TorchClassifier::load(&cfg.harsh_model_path, harsh_feats)
            .context("loading harsh-driving model")?;
        tracing::info!(
            "loaded harsh-driving model; feat_list[{}]: {:?}",
            harsh.feature_names().len(),
            harsh.feature_names()
        );

        Ok(Self::new(Arc::new(emission), Arc::new(harsh)).with_vector_logging(cfg.log_pred))
    }

    pub fn emission_features(&self) -> &[String] {
        self.emission.feature_names()
    }

    pub fn harsh_features(&self) -> &[String] {
        self.harsh.feature_names()
    }

    fn emission_for(&self, features: &FeatureMap) -> Result<f64, PredictError> {
        let vec = order_from_flat(features, self.emission.feature_names());
        self.log_vector("emission", self.emission.feature_names(), &vec);
        self.emission.predict(&vec).map_err(PredictError::inference)
    }

    /// Emission estimate for one record, unrounded.
    pub fn predict_emission(&self, rec: &TelemetryRecord) -> Result<f64, PredictError> {
        let features = derive_features(rec)?;
        self.emission_for(&features)
    }

    /// Classify the driving style and, when harsh, price the difference
    /// against the same trip driven calmly. Electric vehicles skip both models.
    pub fn assess_driving(&self, rec: &TelemetryRecord) -> Result<DrivingAssessment, PredictError> {
        if rec.fuel_type.is_none() {
            return Err(PredictError::MissingField("fuel_type"));
        }
        if rec.is_electric() {
            return Ok(DrivingAssessment::Electric);
        }
        if rec.speed.is_none() {
            return Err(PredictError::MissingField("speed"));
        }
        if rec.acceleration.is_none() {
            return Err(PredictError::MissingField("acceleration"));
        }

        let features = derive_features(rec)?;
        let style_vec = order_from_flat(&features, self.harsh.feature_names());
        self.log_vector("harsh", self.harsh.feature_names(), &style_vec);
        let class = self
            .harsh
            .classify(&style_vec)
            .map_err(PredictError::inference)?;
        if class != HARSH_CLASS {
            return Ok(DrivingAssessment::Normal);
        }

        let harsh_emission = self.emission_for(&features)?;
        let calm = derive_features(&calm_record(rec))?;
        let normal_emission = self.emission_for(&calm)?;
        tracing::debug!(
            "harsh driving: harsh={:.4} normal={:.4}",
            harsh_emission,
            normal_emission
        );
        Ok(DrivingAssessment::Harsh {
            harsh_emission,
            normal_emission,
        })
    }

    // Debug signal so we can confirm we're not sending all-zeros
    fn log_vector(&self, label: &str, feat_list: &[String], vec: &[f32]) {
        if !self.log_vectors {
            return;
        }
        let nz = vec.iter().filter(|x| **x != 0.0).count();
        let sample: Vec<String> = feat_list
            .iter()
            .zip(vec)
            .take(6)
            .map(|(name, x)| format!("{}={:.3}", name, x))
            .collect();
        tracing::info!(
            "{} in_dim={} nonzero={} sample=[{}]",
            label,
            vec.len(),
            nz,
            sample.join(", ")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding() {
        assert_eq!(round4(231.123456), 231.1235);
        assert_eq!(round4(-0.00004), -0.0);
        assert_eq!(round4(10.0), 10.0);
    }

    #[test]
    fn harsh_response_reports_difference() {
        let out: HarshDrivingOut = DrivingAssessment::Harsh {
            harsh_emission: 300.12346,
            normal_emission: 250.0,
        }
        .into();
        assert!(out.harsh_driving);
        assert_eq!(out.harsh_emission, Some(300.1235));
        assert_eq!(out.normal_emission, Some(250.0));
        assert_eq!(out.extra_emission, Some(50.1235));
        assert_eq!(out.message, MSG_HARSH);
    }

    #[test]
    fn electric_response_reports_zero() {
        let out: HarshDrivingOut = DrivingAssessment::Electric.into();
        assert!(!out.harsh_driving);
        assert_eq!(out.carbon_emission, Some(0.0));
        assert_eq!(out.harsh_emission, None);
    }
}
