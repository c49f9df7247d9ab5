use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info};

use crate::core::config::DetectorConfig;
use crate::core::error::LoadError;
use crate::detection::{Detector, LabelStyle};

/// Reader of the detector registry document.
///
/// Nothing is cached: every call re-reads the file, so edits are seen by
/// the next lookup.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    source: PathBuf,
    style: Arc<LabelStyle>,
}

impl ModelRegistry {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            style: Arc::new(LabelStyle::default()),
        }
    }

    /// Label style handed to every detector this registry builds
    pub fn with_label_style(mut self, style: Arc<LabelStyle>) -> Self {
        self.style = style;
        self
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn label_style(&self) -> Arc<LabelStyle> {
        Arc::clone(&self.style)
    }

    fn read_entries(&self) -> Result<Vec<Value>, LoadError> {
        let text = std::fs::read_to_string(&self.source).map_err(|e| LoadError::Source {
            path: self.source.clone(),
            reason: e.to_string(),
        })?;
        let document: Value = serde_json::from_str(&text).map_err(|e| LoadError::Source {
            path: self.source.clone(),
            reason: e.to_string(),
        })?;

        match document {
            Value::Array(entries) => Ok(entries),
            other => Err(LoadError::Source {
                path: self.source.clone(),
                reason: format!("expected a JSON array of detectors, found {}", json_kind(&other)),
            }),
        }
    }

    /// Build and initialize every entry.
    ///
    /// Entries that fail, and repeats of a name already loaded, are logged
    /// and skipped.
    pub fn load_all(&self) -> Vec<Detector> {
        let entries = match self.read_entries() {
            Ok(entries) => entries,
            Err(e) => {
                error!("{}", e);
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        let mut detectors = Vec::new();
        for (idx, entry) in entries.iter().enumerate() {
            let config = match DetectorConfig::from_entry(entry) {
                Ok(config) => config,
                Err(e) => {
                    error!("Skipping registry entry #{}: {}", idx, e);
                    continue;
                }
            };
            if !seen.insert(config.name.clone()) {
                error!("Skipping registry entry #{}: duplicate name '{}'", idx, config.name);
                continue;
            }

            let name = config.name.clone();
            let mut detector = Detector::from_config(config, self.label_style());
            match detector.init() {
                Ok(()) => detectors.push(detector),
                Err(e) => error!("Skipping detector '{}': {}", name, e),
            }
        }

        info!("Loaded {} of {} registry entries", detectors.len(), entries.len());
        detectors
    }

    /// Non-empty entry names in document order
    pub fn list_names(&self) -> Result<Vec<String>, LoadError> {
        Ok(self
            .read_entries()?
            .iter()
            .filter_map(|entry| entry.get("name").and_then(Value::as_str))
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// First entry whose name matches. `Ok(None)` when there is none.
    pub fn find_config_by_name(&self, name: &str) -> Result<Option<DetectorConfig>, LoadError> {
        let entries = self.read_entries()?;
        let Some(entry) = entries
            .iter()
            .find(|entry| entry.get("name").and_then(Value::as_str) == Some(name))
        else {
            return Ok(None);
        };
        DetectorConfig::from_entry(entry).map(Some)
    }

    /// Build the named detector and load its resources
    pub fn instantiate_by_name(&self, name: &str) -> Result<Detector, LoadError> {
        let config = self
            .find_config_by_name(name)?
            .ok_or_else(|| LoadError::NameNotFound(name.to_string()))?;
        debug!("Instantiating {} detector '{}'", config.kind(), name);

        let mut detector = Detector::from_config(config, self.label_style());
        detector.init()?;
        Ok(detector)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
