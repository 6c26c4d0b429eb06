//! Object detection on a single image.
//!
//! The pipeline is load → detect → annotate → save. Inference sits behind
//! [`ObjectDetector`]; [`OnnxDetector`] is the production implementation.

pub mod annotate;
pub mod model;
pub mod onnx;
pub mod report;
pub mod source;

use std::path::{Path, PathBuf};

use ab_glyph::FontVec;
use image::RgbImage;

use crate::error::YoloKitError;

pub use annotate::{annotate, load_font};
pub use model::{non_maximum_suppression, Detection, DetectionResult};
pub use onnx::OnnxDetector;
pub use report::DetectionReport;
pub use source::{load_image, ImageSource};

/// Default weights location of an Ultralytics training run, exported to ONNX.
pub const DEFAULT_MODEL_PATH: &str = "runs/detect/train/weights/best.onnx";

/// Runs inference on one decoded image.
pub trait ObjectDetector {
    /// Detect objects scoring at least `confidence`.
    fn detect(&mut self, image: &RgbImage, confidence: f32)
        -> Result<DetectionResult, YoloKitError>;
}

/// Detection options.
#[derive(Clone, Debug)]
pub struct DetectOptions {
    pub model_path: PathBuf,
    /// Minimum score in `[0, 1]`.
    pub confidence: f32,
    /// NMS overlap threshold in `[0, 1]`.
    pub iou_threshold: f32,
    /// Square model input side, a multiple of 32.
    pub input_size: u32,
    pub max_detections: usize,
    /// `data.yaml` to take class names from.
    pub data_yaml: Option<PathBuf>,
    /// Label font; system fallbacks are tried when unset.
    pub font_path: Option<PathBuf>,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            confidence: 0.25,
            iou_threshold: 0.7,
            input_size: 640,
            max_detections: 300,
            data_yaml: None,
            font_path: None,
        }
    }
}

/// Validate detection options before loading anything.
pub fn validate_detect_options(opts: &DetectOptions) -> Result<(), YoloKitError> {
    if !(0.0..=1.0).contains(&opts.confidence) {
        return Err(YoloKitError::InvalidDetectParams {
            message: format!("--conf must be in [0.0, 1.0], got {}", opts.confidence),
        });
    }

    if !(0.0..=1.0).contains(&opts.iou_threshold) {
        return Err(YoloKitError::InvalidDetectParams {
            message: format!("--iou must be in [0.0, 1.0], got {}", opts.iou_threshold),
        });
    }

    if opts.input_size == 0 || opts.input_size % 32 != 0 {
        return Err(YoloKitError::InvalidDetectParams {
            message: format!(
                "--imgsz must be a positive multiple of 32, got {}",
                opts.input_size
            ),
        });
    }

    if opts.max_detections == 0 {
        return Err(YoloKitError::InvalidDetectParams {
            message: "max detections must be greater than 0".to_string(),
        });
    }

    Ok(())
}

/// Load an image, detect objects and draw them.
///
/// Returns the annotated copy and the detections.
pub fn detect_and_annotate<D: ObjectDetector>(
    source: &ImageSource,
    detector: &mut D,
    confidence: f32,
    font: Option<&FontVec>,
) -> Result<(RgbImage, DetectionResult), YoloKitError> {
    let image = load_image(source)?;
    annotate_image(&image, detector, confidence, font)
}

fn annotate_image<D: ObjectDetector>(
    image: &RgbImage,
    detector: &mut D,
    confidence: f32,
    font: Option<&FontVec>,
) -> Result<(RgbImage, DetectionResult), YoloKitError> {
    let result = detector.detect(image, confidence)?;
    let annotated = annotate(image, &result, font);
    Ok((annotated, result))
}

/// Detect objects with the ONNX model from `opts` and save the annotated image.
///
/// `output` defaults to [`ImageSource::default_output_path`]. The image is
/// loaded before the model, and nothing is written unless every step
/// succeeds.
pub fn detect_and_save(
    source: &ImageSource,
    output: Option<&Path>,
    opts: &DetectOptions,
) -> Result<DetectionReport, YoloKitError> {
    validate_detect_options(opts)?;

    let image = load_image(source)?;
    let mut detector = OnnxDetector::load(opts)?;
    let font = load_font(opts.font_path.as_deref())?;

    save_annotated(
        source,
        &image,
        output,
        &mut detector,
        opts.confidence,
        font.as_ref(),
    )
}

/// [`detect_and_save`] with a caller-supplied detector and font.
pub fn save_detection<D: ObjectDetector>(
    source: &ImageSource,
    output: Option<&Path>,
    detector: &mut D,
    confidence: f32,
    font: Option<&FontVec>,
) -> Result<DetectionReport, YoloKitError> {
    let image = load_image(source)?;
    save_annotated(source, &image, output, detector, confidence, font)
}

fn save_annotated<D: ObjectDetector>(
    source: &ImageSource,
    image: &RgbImage,
    output: Option<&Path>,
    detector: &mut D,
    confidence: f32,
    font: Option<&FontVec>,
) -> Result<DetectionReport, YoloKitError> {
    let output_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| source.default_output_path());

    let (annotated, result) = annotate_image(image, detector, confidence, font)?;
    annotated
        .save(&output_path)
        .map_err(|source| YoloKitError::ImageWrite {
            path: output_path.clone(),
            source,
        })?;

    Ok(DetectionReport {
        source: source.display_name(),
        output_path,
        result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Returns a fixed set of boxes and filters them by confidence.
    struct FixedDetector {
        detections: Vec<Detection>,
        calls: usize,
    }

    impl ObjectDetector for FixedDetector {
        fn detect(
            &mut self,
            image: &RgbImage,
            confidence: f32,
        ) -> Result<DetectionResult, YoloKitError> {
            self.calls += 1;
            Ok(DetectionResult {
                image_width: image.width(),
                image_height: image.height(),
                detections: self
                    .detections
                    .iter()
                    .filter(|d| d.confidence >= confidence)
                    .cloned()
                    .collect(),
            })
        }
    }

    fn fixed_detector() -> FixedDetector {
        FixedDetector {
            detections: vec![
                Detection {
                    x1: 2.0,
                    y1: 2.0,
                    x2: 20.0,
                    y2: 20.0,
                    confidence: 0.9,
                    class_id: 0,
                    class_name: "cat".to_string(),
                },
                Detection {
                    x1: 5.0,
                    y1: 5.0,
                    x2: 15.0,
                    y2: 15.0,
                    confidence: 0.1,
                    class_id: 1,
                    class_name: "dog".to_string(),
                },
            ],
            calls: 0,
        }
    }

    fn write_png(path: &Path) {
        RgbImage::from_pixel(32, 24, Rgb([0, 0, 0]))
            .save(path)
            .expect("save png");
    }

    #[test]
    fn default_options_match_cli_defaults() {
        let opts = DetectOptions::default();
        assert_eq!(opts.model_path, PathBuf::from(DEFAULT_MODEL_PATH));
        assert_eq!(opts.confidence, 0.25);
        assert!(validate_detect_options(&opts).is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let bad_conf = DetectOptions {
            confidence: 1.5,
            ..Default::default()
        };
        assert!(validate_detect_options(&bad_conf).is_err());

        let bad_size = DetectOptions {
            input_size: 100,
            ..Default::default()
        };
        assert!(validate_detect_options(&bad_size).is_err());
    }

    #[test]
    fn save_detection_writes_default_output_next_to_input() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let input = temp.path().join("scene.png");
        write_png(&input);

        let source = ImageSource::Path(input);
        let mut detector = fixed_detector();
        let report =
            save_detection(&source, None, &mut detector, 0.25, None).expect("save detection");

        assert_eq!(report.output_path, temp.path().join("scene_detected.png"));
        assert!(report.output_path.is_file());
        assert_eq!(report.result.len(), 1);
        assert_eq!(report.source, "scene.png");
        assert_eq!(detector.calls, 1);

        let saved = image::open(&report.output_path).expect("open output").to_rgb8();
        assert_ne!(*saved.get_pixel(2, 2), Rgb([0, 0, 0]));
    }

    #[test]
    fn save_detection_honours_explicit_output() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let input = temp.path().join("scene.png");
        write_png(&input);
        let output = temp.path().join("out.png");

        let report = save_detection(
            &ImageSource::Path(input),
            Some(&output),
            &mut fixed_detector(),
            0.05,
            None,
        )
        .expect("save detection");

        assert_eq!(report.output_path, output);
        assert_eq!(report.result.len(), 2);
    }

    #[test]
    fn failed_load_writes_nothing_and_skips_inference() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let missing = temp.path().join("missing.png");
        let mut detector = fixed_detector();

        let err = save_detection(
            &ImageSource::Path(missing),
            None,
            &mut detector,
            0.25,
            None,
        )
        .unwrap_err();

        assert!(matches!(err, YoloKitError::ImageRead { .. }));
        assert_eq!(detector.calls, 0);
        assert!(!temp.path().join("missing_detected.png").exists());
    }

    #[test]
    fn unreachable_url_fails_before_model_load() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let output = temp.path().join("out.jpg");
        let opts = DetectOptions {
            model_path: temp.path().join("missing.onnx"),
            ..Default::default()
        };

        let err = detect_and_save(
            &ImageSource::parse("http://127.0.0.1:9/cat.jpg"),
            Some(&output),
            &opts,
        )
        .unwrap_err();

        assert!(matches!(err, YoloKitError::Download { .. }));
        assert!(!output.exists());
    }

    #[test]
    fn detect_and_annotate_returns_annotated_copy() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let input = temp.path().join("scene.png");
        write_png(&input);

        let (annotated, result) = detect_and_annotate(
            &ImageSource::Path(input),
            &mut fixed_detector(),
            0.25,
            None,
        )
        .expect("detect and annotate");

        assert_eq!(annotated.dimensions(), (32, 24));
        assert_eq!(result.image_width, 32);
        assert_eq!(result.len(), 1);
    }
}
