//! On-disk artifact contract
//!
//! An artifact directory is a flat set of JSON files with fixed names:
//! `scaler.json`, `imputer.json`, `feature_names.json`, `encoder.json`,
//! one `<ModelName>.json` per trained classifier, and `manifest.json`.
//! Training writes through an [`ArtifactTransaction`] that stages files and
//! swaps them in on commit; prediction reads under a shared lock.

mod lock;
mod manifest;
mod store;

pub use lock::DirectoryLocks;
pub use manifest::{Manifest, FORMAT_VERSION};
pub use store::{
    load_json, ArtifactInfo, ArtifactStore, ArtifactTransaction, ArtifactWriter,
};

use std::fmt;

use crate::training::ModelKind;

/// File extension shared by every artifact
pub const ARTIFACT_EXTENSION: &str = "json";

/// Well-known artifact names within a directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactName {
    Scaler,
    Imputer,
    FeatureNames,
    Encoder,
    Manifest,
    Model(ModelKind),
}

impl ArtifactName {
    /// Artifacts written by the preprocessor
    pub const PREPROCESSING: [ArtifactName; 4] = [
        ArtifactName::Scaler,
        ArtifactName::Imputer,
        ArtifactName::FeatureNames,
        ArtifactName::Encoder,
    ];

    pub fn stem(&self) -> &'static str {
        match self {
            ArtifactName::Scaler => "scaler",
            ArtifactName::Imputer => "imputer",
            ArtifactName::FeatureNames => "feature_names",
            ArtifactName::Encoder => "encoder",
            ArtifactName::Manifest => "manifest",
            ArtifactName::Model(kind) => kind.name(),
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", self.stem(), ARTIFACT_EXTENSION)
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

/// Reject anything that is not a plain file name inside the artifact directory
pub(crate) fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
}
