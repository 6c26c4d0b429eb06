//! ONNX Runtime backed YOLO detector.
//!
//! Expects an Ultralytics-style export: one `[1, 3, S, S]` float input in
//! `[0, 1]` and one `[1, 4 + nc, N]` output of `cx, cy, w, h` followed by
//! per-class scores. Transposed `[1, N, 4 + nc]` outputs are accepted too.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;

use super::model::{non_maximum_suppression, Detection, DetectionResult};
use super::{DetectOptions, ObjectDetector};
use crate::error::YoloKitError;
use crate::prepare::manifest::{names_from_mapping, read_manifest};

const PAD_VALUE: u8 = 114;
const NUM_THREADS: usize = 4;

/// YOLO detector running an ONNX model.
pub struct OnnxDetector {
    session: Session,
    input_name: String,
    class_names: Vec<String>,
    input_size: u32,
    iou_threshold: f32,
    max_detections: usize,
}

impl OnnxDetector {
    /// Load the model at `opts.model_path`.
    ///
    /// Class names come from `opts.data_yaml` when set, otherwise from the
    /// model's `names` metadata, otherwise they fall back to `class_<id>`.
    ///
    /// The ONNX Runtime library is loaded dynamically; set `ORT_DYLIB_PATH`
    /// when it is not on the default library search path.
    pub fn load(opts: &DetectOptions) -> Result<Self, YoloKitError> {
        let path = &opts.model_path;
        if !path.is_file() {
            return Err(YoloKitError::ModelLoad {
                path: path.clone(),
                message: "file not found".to_string(),
            });
        }

        let session = Session::builder()
            .map_err(|e| load_error(path, e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| load_error(path, e))?
            .with_intra_threads(NUM_THREADS)
            .map_err(|e| load_error(path, e))?
            .commit_from_file(path)
            .map_err(|e| load_error(path, e))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| YoloKitError::ModelLoad {
                path: path.clone(),
                message: "model declares no inputs".to_string(),
            })?;

        let class_names = match opts.data_yaml.as_deref() {
            Some(data_yaml) => read_manifest(data_yaml)?.names,
            None => model_class_names(&session),
        };
        log::debug!(
            "loaded {} (input '{}', {} class names)",
            path.display(),
            input_name,
            class_names.len()
        );

        Ok(Self {
            session,
            input_name,
            class_names,
            input_size: opts.input_size,
            iou_threshold: opts.iou_threshold,
            max_detections: opts.max_detections,
        })
    }
}

impl ObjectDetector for OnnxDetector {
    fn detect(
        &mut self,
        image: &RgbImage,
        confidence: f32,
    ) -> Result<DetectionResult, YoloKitError> {
        let letterbox = Letterbox::new(image.width(), image.height(), self.input_size);
        let size = self.input_size as usize;
        let input = Tensor::from_array(([1usize, 3, size, size], letterbox.to_chw(image)))
            .map_err(inference_error)?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(inference_error)?;
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(inference_error)?;
        let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
        log::debug!("inference output shape {:?}", dims);

        let candidates = decode_predictions(&dims, data, confidence, &letterbox, &self.class_names)?;

        Ok(DetectionResult {
            image_width: image.width(),
            image_height: image.height(),
            detections: non_maximum_suppression(
                candidates,
                self.iou_threshold,
                self.max_detections,
            ),
        })
    }
}

fn load_error(path: &Path, err: impl Display) -> YoloKitError {
    YoloKitError::ModelLoad {
        path: PathBuf::from(path),
        message: err.to_string(),
    }
}

fn inference_error(err: impl Display) -> YoloKitError {
    YoloKitError::Inference {
        message: err.to_string(),
    }
}

/// Read class names from the `names` metadata entry Ultralytics writes into
/// its exports, e.g. `{0: 'person', 1: 'bicycle'}`.
fn model_class_names(session: &Session) -> Vec<String> {
    let raw = session
        .metadata()
        .ok()
        .and_then(|metadata| metadata.custom("names").ok().flatten());

    match raw {
        Some(raw) => parse_names_metadata(&raw).unwrap_or_else(|| {
            log::warn!("model 'names' metadata is not a class mapping; using class ids");
            Vec::new()
        }),
        None => Vec::new(),
    }
}

/// The metadata is a Python dict literal, which is also a YAML flow mapping.
fn parse_names_metadata(raw: &str) -> Option<Vec<String>> {
    serde_yaml::from_str::<BTreeMap<usize, String>>(raw)
        .ok()
        .map(names_from_mapping)
}

/// Aspect-preserving resize of a source image into a square model input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    pub source_width: u32,
    pub source_height: u32,
    pub size: u32,
    pub scale: f32,
    pub resized_width: u32,
    pub resized_height: u32,
    pub pad_x: u32,
    pub pad_y: u32,
}

impl Letterbox {
    pub fn new(source_width: u32, source_height: u32, size: u32) -> Self {
        let scale = (size as f32 / source_width.max(1) as f32)
            .min(size as f32 / source_height.max(1) as f32);
        let resized_width = ((source_width as f32 * scale).round() as u32).clamp(1, size);
        let resized_height = ((source_height as f32 * scale).round() as u32).clamp(1, size);

        Self {
            source_width,
            source_height,
            size,
            scale,
            resized_width,
            resized_height,
            pad_x: (size - resized_width) / 2,
            pad_y: (size - resized_height) / 2,
        }
    }

    /// Letterboxed image as planar RGB floats in `[0, 1]`.
    pub fn to_chw(&self, image: &RgbImage) -> Vec<f32> {
        let resized = imageops::resize(
            image,
            self.resized_width,
            self.resized_height,
            FilterType::Triangle,
        );
        let mut canvas = RgbImage::from_pixel(self.size, self.size, Rgb([PAD_VALUE; 3]));
        imageops::overlay(&mut canvas, &resized, self.pad_x as i64, self.pad_y as i64);

        let plane = (self.size * self.size) as usize;
        let mut chw = vec![0.0f32; 3 * plane];
        for (x, y, pixel) in canvas.enumerate_pixels() {
            let offset = (y * self.size + x) as usize;
            for (channel, value) in pixel.0.iter().enumerate() {
                chw[channel * plane + offset] = *value as f32 / 255.0;
            }
        }
        chw
    }

    /// Map a point from model-input space back to source pixels, clipped to
    /// the source image.
    pub fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        let sx = (x - self.pad_x as f32) / self.scale;
        let sy = (y - self.pad_y as f32) / self.scale;
        (
            sx.clamp(0.0, self.source_width as f32),
            sy.clamp(0.0, self.source_height as f32),
        )
    }
}

/// Decode raw YOLO output into source-space candidates above `confidence`.
pub fn decode_predictions(
    dims: &[usize],
    data: &[f32],
    confidence: f32,
    letterbox: &Letterbox,
    class_names: &[String],
) -> Result<Vec<Detection>, YoloKitError> {
    let [batch, a, b] = dims else {
        return Err(YoloKitError::Inference {
            message: format!("expected a 3-d output tensor, got shape {dims:?}"),
        });
    };
    if *batch != 1 {
        return Err(YoloKitError::Inference {
            message: format!("expected batch size 1, got {batch}"),
        });
    }

    // Channels are the smaller axis: 84 x 8400 for COCO at 640.
    let (channels, anchors, transposed) = if a <= b { (*a, *b, false) } else { (*b, *a, true) };
    if channels <= 4 {
        return Err(YoloKitError::Inference {
            message: format!("output needs more than 4 channels, got shape {dims:?}"),
        });
    }
    if data.len() < channels * anchors {
        return Err(YoloKitError::Inference {
            message: format!(
                "output holds {} values, shape {dims:?} needs {}",
                data.len(),
                channels * anchors
            ),
        });
    }

    let value = |channel: usize, anchor: usize| {
        if transposed {
            data[anchor * channels + channel]
        } else {
            data[channel * anchors + anchor]
        }
    };

    let mut candidates = Vec::new();
    for anchor in 0..anchors {
        let (class_id, score) = (4..channels)
            .map(|channel| (channel - 4, value(channel, anchor)))
            .fold((0, f32::NEG_INFINITY), |best, cur| {
                if cur.1 > best.1 {
                    cur
                } else {
                    best
                }
            });
        if score.is_nan() || score < confidence {
            continue;
        }

        let (cx, cy) = (value(0, anchor), value(1, anchor));
        let (w, h) = (value(2, anchor), value(3, anchor));
        let (x1, y1) = letterbox.to_source(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = letterbox.to_source(cx + w / 2.0, cy + h / 2.0);

        candidates.push(Detection {
            x1,
            y1,
            x2,
            y2,
            confidence: score,
            class_id: class_id as u32,
            class_name: class_names
                .get(class_id)
                .cloned()
                .unwrap_or_else(|| format!("class_{class_id}")),
        });
    }

    Ok(candidates)
}
