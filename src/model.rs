use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{fs, path::Path};
use tch::{kind::Kind, CModule, Device, Tensor};

/// Columns the harsh-driving classifier was trained on when no sidecar says
/// otherwise.
pub const HARSH_DEFAULT_FEATURES: [&str; 4] =
    ["speed", "acceleration", "road_gradient", "traffic_condition"];

/// Class index the harsh-driving classifier uses for aggressive driving.
pub const HARSH_CLASS: i64 = 1;

/// A trained regression model together with the column schema it expects.
pub trait Regressor: Send + Sync {
    fn feature_names(&self) -> &[String];
    fn predict(&self, x: &[f32]) -> Result<f64>;
}

/// A trained classifier together with the column schema it expects.
pub trait Classifier: Send + Sync {
    fn feature_names(&self) -> &[String];
    fn classify(&self, x: &[f32]) -> Result<i64>;
}

#[derive(Deserialize)]
struct MetaJson {
    feat_list: Vec<String>,
    in_dim: Option<usize>,
}

/// Load the column schema from a `meta.json` sidecar.
pub fn load_feat_list(meta_path: &Path) -> Result<Vec<String>> {
    let meta_txt = fs::read_to_string(meta_path)
        .with_context(|| format!("failed to read meta at {}", meta_path.display()))?;
    parse_feat_list(&meta_txt)
        .with_context(|| format!("failed to parse {}", meta_path.display()))
}

fn parse_feat_list(meta_txt: &str) -> Result<Vec<String>> {
    let meta: MetaJson = serde_json::from_str(meta_txt)?;
    if meta.feat_list.is_empty() {
        bail!("feat_list is empty");
    }
    if let Some(in_dim) = meta.in_dim {
        if in_dim != meta.feat_list.len() {
            tracing::warn!(
                "meta.in_dim ({}) != feat_list.len() ({}); using feat_list.len()",
                in_dim,
                meta.feat_list.len()
            );
        }
    }
    Ok(meta.feat_list)
}

/// First value of a regressor's output.
pub fn scalar_from_output(values: &[f64]) -> Result<f64> {
    match values.first() {
        Some(v) => Ok(*v),
        None => bail!("model produced an empty output"),
    }
}

/// One output is the probability of class 1; two outputs are per-class
/// scores and the larger wins.
pub fn class_from_output(values: &[f64]) -> Result<i64> {
    match values {
        [p] => Ok(if *p >= 0.5 { 1 } else { 0 }),
        [s0, s1] => Ok(if s1 > s0 { 1 } else { 0 }),
        _ => bail!("unexpected classifier output width {}", values.len()),
    }
}

// ---------- TorchScript backend ----------

struct TorchModule {
    module: CModule,
    device: Device,
    feat_list: Vec<String>,
}

impl TorchModule {
    fn load(model_path: &Path, feat_list: Vec<String>) -> Result<Self> {
        let device = Device::Cpu;
        let module = CModule::load_on_device(model_path, device)
            .with_context(|| format!("failed to load TorchScript {}", model_path.display()))?;
        Ok(Self {
            module,
            device,
            feat_list,
        })
    }

    /// Forward a single row and return the output flattened.
    fn forward_row(&self, x: &[f32]) -> Result<Vec<f64>> {
        let in_dim = self.feat_list.len();
        if x.len() != in_dim {
            bail!("feature length mismatch: got {}, expected {}", x.len(), in_dim);
        }

        let input = Tensor::from_slice(x)
            .reshape([1, in_dim as i64])
            .to_device(self.device);

        let t = self.module.forward_ts(&[input])?;
        let sz = t.size();
        if sz.first() != Some(&1) {
            bail!("unexpected model output size: {:?}", sz);
        }
        let flat = t.to_kind(Kind::Double).reshape([-1]);
        let n = flat.size()[0];
        Ok((0..n).map(|i| flat.double_value(&[i])).collect())
    }
}

pub struct TorchRegressor {
    inner: TorchModule,
}

impl TorchRegressor {
    pub fn load(model_path: &Path, feat_list: Vec<String>) -> Result<Self> {
        let inner = TorchModule::load(model_path, feat_list)?;
        // Probe with a dummy forward so shape problems surface at startup
        let probe = inner.forward_row(&vec![0.0; inner.feat_list.len()])?;
        scalar_from_output(&probe).context("regressor warmup")?;
        Ok(Self { inner })
    }
}

impl Regressor for TorchRegressor {
    fn feature_names(&self) -> &[String] {
        &self.inner.feat_list
    }

    fn predict(&self, x: &[f32]) -> Result<f64> {
        scalar_from_output(&self.inner.forward_row(x)?)
    }
}

pub struct TorchClassifier {
    inner: TorchModule,
}

impl TorchClassifier {
    pub fn load(model_path: &Path, feat_list: Vec<String>) -> Result<Self> {
        let inner = TorchModule::load(model_path, feat_list)?;
        let probe = inner.forward_row(&vec![0.0; inner.feat_list.len()])?;
        class_from_output(&probe).context("classifier warmup")?;
        Ok(Self { inner })
    }
}

impl Classifier for TorchClassifier {
    fn feature_names(&self) -> &[String] {
        &self.inner.feat_list
    }

    fn classify(&self, x: &[f32]) -> Result<i64> {
        class_from_output(&self.inner.forward_row(x)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_parsing() {
        let feats = parse_feat_list(r#"{"feat_list": ["speed", "acceleration"], "in_dim": 2}"#)
            .unwrap();
        assert_eq!(feats, vec!["speed", "acceleration"]);

        // in_dim is advisory only
        let feats = parse_feat_list(r#"{"feat_list": ["a", "b", "c"], "in_dim": 5}"#).unwrap();
        assert_eq!(feats.len(), 3);

        assert!(parse_feat_list(r#"{"feat_list": []}"#).is_err());
        assert!(parse_feat_list(r#"{"columns": ["a"]}"#).is_err());
    }

    #[test]
    fn missing_meta_file_names_path() {
        let err = load_feat_list(Path::new("/nonexistent/meta.json")).unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/meta.json"));
    }

    #[test]
    fn regressor_output_decoding() {
        assert_eq!(scalar_from_output(&[231.5]).unwrap(), 231.5);
        assert_eq!(scalar_from_output(&[1.0, 2.0]).unwrap(), 1.0);
        assert!(scalar_from_output(&[]).is_err());
    }

    #[test]
    fn classifier_output_decoding() {
        assert_eq!(class_from_output(&[0.73]).unwrap(), HARSH_CLASS);
        assert_eq!(class_from_output(&[0.5]).unwrap(), 1);
        assert_eq!(class_from_output(&[0.2]).unwrap(), 0);
        assert_eq!(class_from_output(&[-1.2, 3.4]).unwrap(), 1);
        assert_eq!(class_from_output(&[0.9, 0.1]).unwrap(), 0);
        assert!(class_from_output(&[0.1, 0.2, 0.7]).is_err());
        assert!(class_from_output(&[]).is_err());
    }
}
