//! Summary of a dataset preparation run.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Outcome of one [`prepare_dataset`](super::prepare_dataset) run.
///
/// Built once the manifest has been written; nothing mutates it afterwards.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SplitManifest {
    /// Resolved source directory.
    pub source: PathBuf,
    /// Resolved destination root.
    pub destination: PathBuf,
    /// Path of the written `data.yaml`.
    pub manifest_path: PathBuf,
    pub train_count: usize,
    pub val_count: usize,
    /// Training images without a label file, in copy order.
    pub train_missing_labels: Vec<String>,
    /// Validation images without a label file, in copy order.
    pub val_missing_labels: Vec<String>,
    pub class_names: Vec<String>,
    pub num_classes: usize,
}

impl SplitManifest {
    /// Total number of images copied across both partitions.
    pub fn total(&self) -> usize {
        self.train_count + self.val_count
    }

    /// Every image without a label file, training partition first.
    ///
    /// Each image lives in exactly one partition, so names never repeat.
    pub fn missing_label_names(&self) -> impl Iterator<Item = &str> {
        self.train_missing_labels
            .iter()
            .chain(self.val_missing_labels.iter())
            .map(String::as_str)
    }

    /// Number of images without a label file.
    pub fn missing_label_count(&self) -> usize {
        self.train_missing_labels.len() + self.val_missing_labels.len()
    }
}

impl fmt::Display for SplitManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Source: {}", self.source.display())?;
        writeln!(f, "Destination: {}", self.destination.display())?;
        writeln!(f)?;
        writeln!(f, "Summary:")?;
        writeln!(f, "Total images: {}", self.total())?;
        writeln!(
            f,
            "Train images copied: {} (missing labels: {})",
            self.train_count,
            self.train_missing_labels.len()
        )?;
        writeln!(
            f,
            "Val images copied: {} (missing labels: {})",
            self.val_count,
            self.val_missing_labels.len()
        )?;

        if self.missing_label_count() > 0 {
            writeln!(f)?;
            writeln!(f, "Images missing label files:")?;
            for name in self.missing_label_names() {
                writeln!(f, " - {}", name)?;
            }
        }

        writeln!(f)?;
        writeln!(f, "Wrote: {}", self.manifest_path.display())?;
        writeln!(f, "Done.")
    }
}
