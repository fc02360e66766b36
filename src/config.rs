use std::path::PathBuf;

use config::{Config, Environment, File, Source};
use serde::Deserialize;

use crate::error::Result;

pub const DEFAULT_INDEX_URL: &str =
    "https://www.city.ota.tokyo.jp/seikatsu/kodomo/hoiku/hoikushisetsu_nyukibo/aki-joho.html";
const CONFIG_FILE: &str = "ota_vacancy";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Local development store, no autoscaling registration.
    Local,
    /// Managed deployment; new datasets get capacity autoscaling.
    Managed,
}

/// Which PDF link wins when the index page carries several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LinkPick {
    First,
    Last,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub index_url: String,
    pub backend: Backend,
    pub db_path: PathBuf,
    pub dataset_prefix: String,
    /// When set, every run overwrites this dataset and the version gate is off.
    pub fixed_dataset: Option<String>,
    pub queue_url: Option<String>,
    pub link_pick: LinkPick,
    pub java_bin: String,
    pub tabula_jar: PathBuf,
    pub read_capacity: u32,
    pub write_capacity: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            index_url: DEFAULT_INDEX_URL.to_string(),
            backend: Backend::Managed,
            db_path: PathBuf::from("data/ota.sqlite"),
            dataset_prefix: "ota".to_string(),
            fixed_dataset: None,
            queue_url: None,
            link_pick: LinkPick::First,
            java_bin: "java".to_string(),
            tabula_jar: PathBuf::from("tabula.jar"),
            read_capacity: 5,
            write_capacity: 5,
        }
    }
}

impl Settings {
    /// Defaults, then `ota_vacancy.toml` if present, then `OTA_*` variables.
    pub fn load() -> Result<Self> {
        Self::layered(
            File::with_name(CONFIG_FILE).required(false),
            Environment::with_prefix("OTA"),
        )
    }

    fn layered<S>(file: S, env: Environment) -> Result<Self>
    where
        S: Source + Send + Sync + 'static,
    {
        let defaults = Settings::default();
        let settings = Config::builder()
            .set_default("index_url", defaults.index_url)?
            .set_default("backend", "managed")?
            .set_default("db_path", defaults.db_path.to_string_lossy().to_string())?
            .set_default("dataset_prefix", defaults.dataset_prefix)?
            .set_default("link_pick", "first")?
            .set_default("java_bin", defaults.java_bin)?
            .set_default("tabula_jar", defaults.tabula_jar.to_string_lossy().to_string())?
            .set_default("read_capacity", i64::from(defaults.read_capacity))?
            .set_default("write_capacity", i64::from(defaults.write_capacity))?
            .add_source(file)
            .add_source(env)
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Name of the dataset a run with this version writes to.
    pub fn dataset_name(&self, version: &str) -> String {
        match &self.fixed_dataset {
            Some(name) => name.clone(),
            None => format!("{}{}", self.dataset_prefix, version),
        }
    }

    pub fn is_versioned(&self) -> bool {
        self.fixed_dataset.is_none()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[test]
    fn versioned_dataset_name() {
        let s = Settings::default();
        assert!(s.is_versioned());
        assert_eq!(s.dataset_name("R6-04"), "otaR6-04");
    }

    #[test]
    fn fixed_dataset_ignores_version() {
        let s = Settings {
            fixed_dataset: Some("ota".into()),
            ..Settings::default()
        };
        assert!(!s.is_versioned());
        assert_eq!(s.dataset_name("R6-04"), "ota");
    }

    fn env(pairs: &[(&str, &str)]) -> Environment {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        Environment::with_prefix("OTA").source(Some(map))
    }

    fn toml_file(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn env_overrides_file_overrides_defaults() {
        let file = toml_file(
            "backend = \"local\"\ndataset_prefix = \"nursery\"\nqueue_url = \"http://file/q\"\n",
        );
        let s = Settings::layered(
            File::from(file.path()),
            env(&[("OTA_QUEUE_URL", "http://env/q"), ("OTA_READ_CAPACITY", "7")]),
        )
        .unwrap();

        assert_eq!(s.backend, Backend::Local);
        assert_eq!(s.dataset_prefix, "nursery");
        assert_eq!(s.queue_url.as_deref(), Some("http://env/q"));
        assert_eq!(s.read_capacity, 7u32);
        assert_eq!(s.write_capacity, 5);
        assert_eq!(s.index_url, DEFAULT_INDEX_URL);
        assert_eq!(s.link_pick, LinkPick::First);
        assert_eq!(s.fixed_dataset, None);
    }

    #[test]
    fn missing_file_leaves_defaults() {
        let s = Settings::layered(
            File::with_name("does-not-exist/ota_vacancy").required(false),
            env(&[]),
        )
        .unwrap();
        assert_eq!(s.backend, Backend::Managed);
        assert_eq!(s.db_path, PathBuf::from("data/ota.sqlite"));
        assert_eq!(s.read_capacity, 5);
    }

    #[test]
    fn unknown_backend_is_config_error() {
        let err = Settings::layered(
            File::with_name("does-not-exist/ota_vacancy").required(false),
            env(&[("OTA_BACKEND", "bogus")]),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "config");
    }
}
