use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
};
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 5000;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub emission_model_path: PathBuf,
    pub emission_meta_path: PathBuf,
    pub harsh_model_path: PathBuf,
    /// Falls back to the built-in classifier columns when unset.
    pub harsh_meta_path: Option<PathBuf>,
    pub bind_addr: SocketAddr,
    pub log_pred: bool,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let path = |key: &'static str| get(key).map(PathBuf::from).ok_or(ConfigError::Missing(key));

        let port = match get("PORT") {
            Some(s) => s
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { key: "PORT", value: s })?,
            None => DEFAULT_PORT,
        };
        let host = match get("HOST") {
            Some(s) => s
                .parse::<IpAddr>()
                .map_err(|_| ConfigError::Invalid { key: "HOST", value: s })?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };

        Ok(Self {
            emission_model_path: path("EMISSION_MODEL_PATH")?,
            emission_meta_path: path("EMISSION_META_PATH")?,
            harsh_model_path: path("HARSH_MODEL_PATH")?,
            harsh_meta_path: get("HARSH_META_PATH").map(PathBuf::from),
            bind_addr: SocketAddr::new(host, port),
            log_pred: get("LOG_PRED").as_deref() == Some("1"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&'static str, &str)]) -> impl Fn(&'static str) -> Option<String> {
        let map: HashMap<&'static str, String> =
            pairs.iter().map(|(k, v)| (*k, v.to_string())).collect();
        move |k: &'static str| map.get(k).cloned()
    }

    const MODELS: [(&str, &str); 3] = [
        ("EMISSION_MODEL_PATH", "models/emission.pt"),
        ("EMISSION_META_PATH", "models/emission.meta.json"),
        ("HARSH_MODEL_PATH", "models/harsh.pt"),
    ];

    #[test]
    fn defaults() {
        let cfg = ServerConfig::from_lookup(lookup(&MODELS)).unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:5000".parse().unwrap());
        assert_eq!(cfg.harsh_meta_path, None);
        assert!(!cfg.log_pred);
        assert_eq!(cfg.emission_model_path, PathBuf::from("models/emission.pt"));
    }

    #[test]
    fn overrides() {
        let mut pairs = MODELS.to_vec();
        pairs.extend([
            ("PORT", "5001"),
            ("HOST", "127.0.0.1"),
            ("HARSH_META_PATH", "models/harsh.meta.json"),
            ("LOG_PRED", "1"),
        ]);
        let cfg = ServerConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(cfg.bind_addr, "127.0.0.1:5001".parse().unwrap());
        assert_eq!(
            cfg.harsh_meta_path,
            Some(PathBuf::from("models/harsh.meta.json"))
        );
        assert!(cfg.log_pred);
    }

    #[test]
    fn missing_model_path() {
        let err = ServerConfig::from_lookup(lookup(&MODELS[..2])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("HARSH_MODEL_PATH"));
    }

    #[test]
    fn bad_port() {
        let mut pairs = MODELS.to_vec();
        pairs.push(("PORT", "http"));
        let err = ServerConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "PORT",
                value: "http".into()
            }
        );
    }
}
