//! Persistence of the artifact bundle: model, scaler and feature list

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::ArtifactPaths;
use crate::error::ChurnError;
use crate::forest::RandomForest;
use crate::scaler::StandardScaler;

/// The three artifacts of one training run. They are only meaningful
/// together and are never mutated after training.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactBundle {
    pub model: RandomForest,
    pub scaler: StandardScaler,
    /// Encoded feature names; their order is the column order of the model
    pub feature_names: Vec<String>,
}

impl ArtifactBundle {
    pub fn new(
        model: RandomForest,
        scaler: StandardScaler,
        feature_names: Vec<String>,
    ) -> Result<Self, ChurnError> {
        let bundle = Self {
            model,
            scaler,
            feature_names,
        };
        bundle.check_consistency()?;
        Ok(bundle)
    }

    /// Write the three artifacts. Each file is written on its own, so a
    /// failure part way through leaves a mixed bundle on disk.
    pub fn save(&self, paths: &ArtifactPaths) -> crate::Result<()> {
        write_json(&paths.model, &self.model)?;
        write_json(&paths.scaler, &self.scaler)?;
        write_json(&paths.features, &self.feature_names)?;
        info!(
            model = %paths.model.display(),
            scaler = %paths.scaler.display(),
            features = %paths.features.display(),
            "artifacts saved"
        );
        Ok(())
    }

    fn check_consistency(&self) -> Result<(), ChurnError> {
        let model = self.model.n_features();
        let scaler = self.scaler.n_features();
        let features = self.feature_names.len();
        if model != features || scaler != features {
            return Err(ChurnError::IncompatibleArtifacts {
                model,
                scaler,
                features,
            });
        }
        Ok(())
    }
}

/// Load a bundle previously written by [`ArtifactBundle::save`]
///
/// Fails if any file is missing or unreadable, if the model or scaler is
/// internally inconsistent, or if the three artifacts disagree on the
/// feature count.
pub fn load_artifacts(paths: &ArtifactPaths) -> crate::Result<ArtifactBundle> {
    let model: RandomForest = read_json(&paths.model)?;
    model
        .validate()
        .with_context(|| format!("invalid model in {}", paths.model.display()))?;
    let scaler: StandardScaler = read_json(&paths.scaler)?;
    scaler
        .validate()
        .with_context(|| format!("invalid scaler in {}", paths.scaler.display()))?;
    let feature_names: Vec<String> = read_json(&paths.features)?;

    let bundle = ArtifactBundle::new(model, scaler, feature_names)?;
    debug!(
        trees = bundle.model.n_trees(),
        features = bundle.feature_names.len(),
        "artifacts loaded"
    );
    Ok(bundle)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> crate::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value)
        .with_context(|| format!("failed to serialize {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> crate::Result<T> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to deserialize {}", path.display()))
}
