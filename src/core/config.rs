use std::path::PathBuf;

use serde_json::Value;

use crate::core::error::LoadError;
use crate::models::DetectorKind;

/// One registry entry, validated enough to pick a detector variant.
///
/// Path emptiness is checked by the detector's `init`, so the precise
/// error for a missing model or graph path comes from one place.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    pub name: String,
    pub params: DetectorParams,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetectorParams {
    Cascade(CascadeParams),
    Network(NetworkParams),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CascadeParams {
    pub face_path: PathBuf,
    pub eyes_path: Option<PathBuf>,
    pub smile_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkParams {
    pub framework: String,
    pub inf_graph_path: PathBuf,
    pub model_path: PathBuf,
    pub class_names_path: PathBuf,
    pub swap_rb: bool,
    pub mean_values: [f32; 3],
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self {
            framework: String::new(),
            inf_graph_path: PathBuf::new(),
            model_path: PathBuf::new(),
            class_names_path: PathBuf::new(),
            swap_rb: false,
            mean_values: [0.0; 3],
        }
    }
}

impl DetectorConfig {
    pub fn kind(&self) -> DetectorKind {
        match self.params {
            DetectorParams::Cascade(_) => DetectorKind::Cascade,
            DetectorParams::Network(_) => DetectorKind::Network,
        }
    }

    /// Build a config from one element of the registry array.
    ///
    /// Only the type decides between success and `TypeNotProvided`. Other
    /// fields are read leniently: a value of the wrong JSON type reads as
    /// empty, `false` or zero, so the detector's `init` reports the precise
    /// path error.
    pub fn from_entry(entry: &Value) -> Result<Self, LoadError> {
        let name = string_field(Some(entry), "name");
        let paths = entry.get("paths");

        let params = match entry.get("type").and_then(Value::as_str) {
            Some("network") => {
                let props = entry.get("properties");
                DetectorParams::Network(NetworkParams {
                    framework: string_field(props, "framework"),
                    inf_graph_path: PathBuf::from(string_field(paths, "inf")),
                    model_path: PathBuf::from(string_field(paths, "model")),
                    class_names_path: PathBuf::from(string_field(paths, "classes")),
                    swap_rb: props
                        .and_then(|p| p.get("swapRB"))
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                    mean_values: mean_triplet(props.and_then(|p| p.get("meanValues"))),
                })
            }
            Some("cascade") => DetectorParams::Cascade(CascadeParams {
                face_path: PathBuf::from(string_field(paths, "face")),
                eyes_path: non_empty_path(string_field(paths, "eyes")),
                smile_path: non_empty_path(string_field(paths, "smile")),
            }),
            _ => return Err(LoadError::TypeNotProvided),
        };

        Ok(Self { name, params })
    }
}

/// String member of `object`; missing or non-string values read as empty
fn string_field(object: Option<&Value>, key: &str) -> String {
    object
        .and_then(|o| o.get(key))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn non_empty_path(value: String) -> Option<PathBuf> {
    if value.trim().is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

/// Missing or non-numeric channels read as zero.
fn mean_triplet(values: Option<&Value>) -> [f32; 3] {
    let mut means = [0.0; 3];
    if let Some(values) = values.and_then(Value::as_array) {
        for (slot, v) in means.iter_mut().zip(values) {
            *slot = v.as_f64().unwrap_or(0.0) as f32;
        }
    }
    means
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_network_entry() {
        let entry = json!({
            "name": "MobileNet",
            "type": "network",
            "properties": { "framework": "onnx", "swapRB": true, "meanValues": [127.5, 127.5, 127.5] },
            "paths": { "inf": "graph.pbtxt", "classes": "coco.txt", "model": "model.rten" }
        });
        let config = DetectorConfig::from_entry(&entry).unwrap();
        assert_eq!(config.name, "MobileNet");
        assert_eq!(config.kind(), DetectorKind::Network);
        let DetectorParams::Network(params) = config.params else {
            panic!("expected network params");
        };
        assert!(params.swap_rb);
        assert_eq!(params.mean_values, [127.5, 127.5, 127.5]);
        assert_eq!(params.model_path, PathBuf::from("model.rten"));
        assert_eq!(params.framework, "onnx");
    }

    #[test]
    fn test_cascade_entry_optional_paths() {
        let entry = json!({
            "name": "Faces",
            "type": "cascade",
            "paths": { "face": "face.json", "eyes": "" }
        });
        let config = DetectorConfig::from_entry(&entry).unwrap();
        let DetectorParams::Cascade(params) = config.params else {
            panic!("expected cascade params");
        };
        assert_eq!(params.face_path, PathBuf::from("face.json"));
        assert_eq!(params.eyes_path, None);
        assert_eq!(params.smile_path, None);
    }

    #[test]
    fn test_missing_or_unknown_type() {
        let missing = json!({ "name": "x", "paths": { "face": "f.json" } });
        assert!(matches!(DetectorConfig::from_entry(&missing), Err(LoadError::TypeNotProvided)));

        let unknown = json!({ "name": "x", "type": "svm" });
        assert!(matches!(DetectorConfig::from_entry(&unknown), Err(LoadError::TypeNotProvided)));
    }

    #[test]
    fn test_short_mean_values() {
        assert_eq!(mean_triplet(Some(&json!([1.0]))), [1.0, 0.0, 0.0]);
        assert_eq!(mean_triplet(Some(&json!([1.0, "x", 3.0]))), [1.0, 0.0, 3.0]);
        assert_eq!(mean_triplet(None), [0.0; 3]);
    }

    #[test]
    fn test_malformed_fields_keep_the_type() {
        let entry = json!({
            "name": "Odd",
            "type": "network",
            "properties": { "swapRB": "true", "meanValues": "127" },
            "paths": { "model": 42, "inf": "" }
        });
        let config = DetectorConfig::from_entry(&entry).unwrap();
        let DetectorParams::Network(params) = config.params else {
            panic!("expected network params");
        };
        assert!(!params.swap_rb);
        assert_eq!(params.mean_values, [0.0; 3]);
        assert!(params.model_path.as_os_str().is_empty());

        let entry = json!({ "type": "cascade", "paths": { "face": "f.json", "eyes": ["e.json"] } });
        let config = DetectorConfig::from_entry(&entry).unwrap();
        let DetectorParams::Cascade(params) = config.params else {
            panic!("expected cascade params");
        };
        assert_eq!(params.eyes_path, None);
    }
}
