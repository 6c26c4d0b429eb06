//! `data.yaml` manifest reader and writer.
//!
//! The manifest carries exactly the keys Ultralytics-style training
//! pipelines expect: `train`, `val`, `nc` and `names`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::YoloKitError;

/// File name of the manifest inside a dataset root.
pub const MANIFEST_FILE: &str = "data.yaml";

/// Contents of a `data.yaml` manifest.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataYaml {
    /// Absolute path of the training images directory.
    #[serde(default)]
    pub train: PathBuf,
    /// Absolute path of the validation images directory.
    #[serde(default)]
    pub val: PathBuf,
    /// Number of classes.
    #[serde(default)]
    pub nc: usize,
    /// Class names, indexed by class id.
    #[serde(deserialize_with = "deserialize_names")]
    pub names: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DataYamlNames {
    Sequence(Vec<String>),
    Mapping(BTreeMap<usize, String>),
}

fn deserialize_names<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let names = match DataYamlNames::deserialize(deserializer)? {
        DataYamlNames::Sequence(names) => names,
        DataYamlNames::Mapping(mapping) => names_from_mapping(mapping),
    };
    Ok(names)
}

/// Densify an `{index: name}` mapping, filling gaps with `class_<index>`.
pub(crate) fn names_from_mapping(mapping: BTreeMap<usize, String>) -> Vec<String> {
    let Some(max_index) = mapping.keys().max().copied() else {
        return Vec::new();
    };

    let mut names = vec![String::new(); max_index + 1];
    for (index, name) in mapping {
        names[index] = name;
    }
    for (index, name) in names.iter_mut().enumerate() {
        if name.trim().is_empty() {
            *name = format!("class_{}", index);
        }
    }
    names
}

/// Write `data.yaml` into `dest`, overwriting any existing manifest.
///
/// `dest` must already contain the `images/train` and `images/val`
/// directories; their absolute paths are recorded in the manifest.
/// Returns the path of the written file.
pub fn write_manifest(dest: &Path, class_names: &[String]) -> Result<PathBuf, YoloKitError> {
    let manifest = DataYaml {
        train: fs::canonicalize(dest.join("images").join("train"))?,
        val: fs::canonicalize(dest.join("images").join("val"))?,
        nc: class_names.len(),
        names: class_names.to_vec(),
    };

    let path = dest.join(MANIFEST_FILE);
    let yaml = serde_yaml::to_string(&manifest).map_err(|source| YoloKitError::ManifestWrite {
        path: path.clone(),
        source,
    })?;
    fs::write(&path, yaml)?;

    Ok(path)
}

/// Read a `data.yaml` manifest.
///
/// `names` may be a sequence or an `{index: name}` mapping; the other keys
/// are optional so that foreign manifests can be used as class-name sources.
pub fn read_manifest(path: &Path) -> Result<DataYaml, YoloKitError> {
    let data = fs::read_to_string(path)?;
    serde_yaml::from_str(&data).map_err(|source| YoloKitError::ManifestParse {
        path: path.to_path_buf(),
        source,
    })
}
