//! Human-readable summary of a saved detection.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use super::model::DetectionResult;

/// What [`detect_and_save`](super::detect_and_save) produced.
#[derive(Clone, Debug, Serialize)]
pub struct DetectionReport {
    /// URL or file name of the input.
    pub source: String,
    /// Where the annotated image was written.
    pub output_path: PathBuf,
    pub result: DetectionResult,
}

impl fmt::Display for DetectionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Detected {} objects in {}",
            self.result.len(),
            self.source
        )?;
        for det in self.result.iter() {
            writeln!(
                f,
                "  - {}: {:.2}% at [{:.0}, {:.0}, {:.0}, {:.0}]",
                det.class_name,
                det.confidence * 100.0,
                det.x1,
                det.y1,
                det.x2,
                det.y2
            )?;
        }
        writeln!(f, "Saved to: {}", self.output_path.display())
    }
}
