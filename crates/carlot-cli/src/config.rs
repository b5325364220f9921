// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use carlot_app::{
    DEFAULT_HIGHLIGHT_THRESHOLD, DEFAULT_TOTAL_LABEL, HighlightPolicy, ReferenceData,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::logging;

const CONFIG_VERSION: i64 = 1;
const APP_NAME: &str = "carlot";
const CONFIG_PATH_ENV: &str = "CARLOT_CONFIG_PATH";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub display: Display,
    #[serde(default)]
    pub reference: Reference,
    #[serde(default)]
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            display: Display::default(),
            reference: Reference::default(),
            logging: Logging::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Display {
    pub highlight_threshold: Option<f64>,
    pub total_label: Option<String>,
}

impl Default for Display {
    fn default() -> Self {
        Self {
            highlight_threshold: Some(DEFAULT_HIGHLIGHT_THRESHOLD),
            total_label: Some(DEFAULT_TOTAL_LABEL.to_owned()),
        }
    }
}

/// Optional replacement for the built-in make/model table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Reference {
    pub categories: Option<Vec<String>>,
    pub subcategories: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Logging {
    pub level: Option<String>,
    pub dir: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set {CONFIG_PATH_ENV} to the config file")
        })?;

        let app_dir = config_root.join(APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and put values under [display], [reference], and [logging]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.version != CONFIG_VERSION {
            bail!(
                "config {} has version {}; expected 1",
                path.display(),
                self.version
            );
        }

        if let Some(threshold) = self.display.highlight_threshold
            && (!threshold.is_finite() || threshold < 0.0)
        {
            bail!(
                "display.highlight_threshold in {} must be a finite non-negative number, got {}",
                path.display(),
                threshold
            );
        }

        if let Some(label) = &self.display.total_label
            && label.trim().is_empty()
        {
            bail!("display.total_label in {} must not be blank", path.display());
        }

        self.reference_data()
            .with_context(|| format!("invalid [reference] table in {}", path.display()))?;

        if let Some(level) = &self.logging.level {
            logging::normalize_level(level)
                .with_context(|| format!("logging.level in {}", path.display()))?;
        }
        if let Some(dir) = &self.logging.dir {
            logging::normalize_log_dir(Path::new(dir))
                .with_context(|| format!("logging.dir in {}", path.display()))?;
        }

        Ok(())
    }

    /// The configured make/model table, or the built-in one when unset.
    pub fn reference_data(&self) -> Result<ReferenceData> {
        match (&self.reference.categories, &self.reference.subcategories) {
            (None, None) => Ok(ReferenceData::builtin()),
            (Some(categories), Some(subcategories)) => {
                Ok(ReferenceData::new(categories.clone(), subcategories.clone())?)
            }
            _ => bail!("reference.categories and reference.subcategories must be set together"),
        }
    }

    pub fn highlight_policy(&self) -> HighlightPolicy {
        HighlightPolicy::new(
            self.display
                .highlight_threshold
                .unwrap_or(DEFAULT_HIGHLIGHT_THRESHOLD),
        )
    }

    pub fn total_label(&self) -> &str {
        self.display
            .total_label
            .as_deref()
            .unwrap_or(DEFAULT_TOTAL_LABEL)
    }

    pub fn log_level(&self) -> &str {
        self.logging
            .level
            .as_deref()
            .unwrap_or(logging::default_log_level())
    }

    pub fn log_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.logging.dir {
            return Ok(PathBuf::from(dir));
        }
        let data_root = dirs::data_dir().ok_or_else(|| {
            anyhow!("cannot resolve data directory; set [logging].dir to an absolute path")
        })?;
        Ok(data_root.join(APP_NAME).join("logs"))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# carlot config\n# Place this file at: {}\n\nversion = 1\n\n[display]\n# Prices at or above this are flagged with {} in the grid\nhighlight_threshold = {}\ntotal_label = \"{}\"\n\n# Optional. Replaces the built-in make/model table; set both keys or neither.\n# [reference]\n# categories = [\"Toyota\", \"Ford\"]\n# [reference.subcategories]\n# Toyota = [\"Corolla\", \"Prius\"]\n# Ford = [\"Fiesta\", \"Mondeo\"]\n\n[logging]\n# trace|debug|info|warn|error\nlevel = \"info\"\n# Optional. Default is the platform data dir (for example ~/.local/share/carlot/logs)\n# dir = \"/absolute/path/to/logs\"\n",
            path.display(),
            carlot_app::HIGHLIGHT_MARKER,
            DEFAULT_HIGHLIGHT_THRESHOLD,
            DEFAULT_TOTAL_LABEL,
        )
    }
}
