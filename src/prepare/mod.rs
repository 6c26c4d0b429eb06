//! YOLO dataset preparation.
//!
//! Turns a flat folder of images, same-named `.txt` label files and an
//! optional `classes.txt` into the `images/{train,val}` +
//! `labels/{train,val}` layout with a `data.yaml` manifest.

pub mod manifest;
pub mod report;

use std::fs::{self, FileTimes};
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};
use walkdir::WalkDir;

use crate::error::YoloKitError;

pub use manifest::{read_manifest, write_manifest, DataYaml, MANIFEST_FILE};
pub use report::SplitManifest;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];
const LABEL_EXTENSION: &str = "txt";
const CLASSES_FILE: &str = "classes.txt";

/// Dataset preparation options.
#[derive(Clone, Debug)]
pub struct PrepareOptions {
    /// Folder holding images, labels and `classes.txt`.
    pub src: PathBuf,
    /// Root of the generated dataset.
    pub dest: PathBuf,
    /// Fraction of images assigned to the validation partition.
    pub val_fraction: f64,
    /// Seed for the train/val shuffle.
    pub seed: u64,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            src: PathBuf::from("."),
            dest: PathBuf::from("dataset"),
            val_fraction: 0.2,
            seed: 42,
        }
    }
}

/// The four output directories of a prepared dataset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetLayout {
    pub root: PathBuf,
    pub images_train: PathBuf,
    pub images_val: PathBuf,
    pub labels_train: PathBuf,
    pub labels_val: PathBuf,
}

impl DatasetLayout {
    /// Describe the layout under `root` without touching the filesystem.
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            images_train: root.join("images").join("train"),
            images_val: root.join("images").join("val"),
            labels_train: root.join("labels").join("train"),
            labels_val: root.join("labels").join("val"),
        }
    }

    /// Create all four directories, keeping any that already exist.
    pub fn create(root: &Path) -> Result<Self, YoloKitError> {
        let layout = Self::new(root);
        for dir in [
            &layout.images_train,
            &layout.images_val,
            &layout.labels_train,
            &layout.labels_val,
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(layout)
    }
}

/// Train/val partition of an image set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrainValSplit {
    pub train: Vec<PathBuf>,
    pub val: Vec<PathBuf>,
}

/// Result of copying one partition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CopyOutcome {
    /// Number of images copied.
    pub copied: usize,
    /// File names of images that had no label file, in copy order.
    pub missing_labels: Vec<String>,
}

/// Validate preparation options before touching the filesystem.
pub fn validate_prepare_options(opts: &PrepareOptions) -> Result<(), YoloKitError> {
    validate_val_fraction(opts.val_fraction)
}

fn validate_val_fraction(val_fraction: f64) -> Result<(), YoloKitError> {
    if !(0.0..=1.0).contains(&val_fraction) {
        return Err(YoloKitError::InvalidSplit {
            message: format!("--val must be in the interval [0.0, 1.0], got {val_fraction}"),
        });
    }
    Ok(())
}

/// Prepare a YOLO dataset according to options.
///
/// An empty source folder yields [`YoloKitError::EmptySource`] before the
/// destination is created. Missing labels are reported in the returned
/// manifest and never fail the run.
pub fn prepare_dataset(opts: &PrepareOptions) -> Result<SplitManifest, YoloKitError> {
    validate_prepare_options(opts)?;

    let src = fs::canonicalize(&opts.src).map_err(|_| YoloKitError::SourceNotFound {
        path: opts.src.clone(),
    })?;

    let images = scan_images(&src)?;
    if images.is_empty() {
        return Err(YoloKitError::EmptySource { path: src });
    }

    let class_names = match read_class_names(&src)? {
        Some(names) => names,
        None => {
            log::warn!(
                "{CLASSES_FILE} not found in {}; writing nc: 0. Create it with one class per line.",
                src.display()
            );
            Vec::new()
        }
    };

    let layout = DatasetLayout::create(&opts.dest)?;
    let destination = fs::canonicalize(&layout.root)?;

    let split = split_train_val(&images, opts.val_fraction, opts.seed)?;
    log::debug!(
        "split {} images into {} train / {} val (seed {})",
        images.len(),
        split.train.len(),
        split.val.len(),
        opts.seed
    );

    let train = copy_pairs(&split.train, &layout.images_train, &layout.labels_train)?;
    let val = copy_pairs(&split.val, &layout.images_val, &layout.labels_val)?;

    let manifest_path = write_manifest(&destination, &class_names)?;

    Ok(SplitManifest {
        source: src,
        destination,
        manifest_path,
        train_count: train.copied,
        val_count: val.copied,
        train_missing_labels: train.missing_labels,
        val_missing_labels: val.missing_labels,
        num_classes: class_names.len(),
        class_names,
    })
}

/// List image files directly inside `dir` (no recursion).
///
/// Matches `.jpg`, `.jpeg` and `.png` case-insensitively. The returned order
/// is unspecified.
pub fn scan_images(dir: &Path) -> Result<Vec<PathBuf>, YoloKitError> {
    if !dir.is_dir() {
        return Err(YoloKitError::SourceNotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() > 0 => {
                let path = err.path().unwrap_or(dir).to_path_buf();
                log::warn!("skipping unreadable entry {}: {err}", path.display());
                continue;
            }
            Err(err) => {
                return Err(match err.into_io_error() {
                    Some(io) => YoloKitError::Io(io),
                    None => YoloKitError::SourceNotFound {
                        path: dir.to_path_buf(),
                    },
                })
            }
        };

        if !has_extension(entry.path(), &IMAGE_EXTENSIONS) {
            continue;
        }

        // Symlinks count when their target is a regular file.
        let is_file = if entry.path_is_symlink() {
            match fs::metadata(entry.path()) {
                Ok(meta) => meta.is_file(),
                Err(err) => {
                    log::warn!("skipping broken link {}: {err}", entry.path().display());
                    false
                }
            }
        } else {
            entry.file_type().is_file()
        };

        if is_file {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

/// Read `classes.txt` from `dir`, one class name per line.
///
/// Returns `None` when the file does not exist. Lines are trimmed and blank
/// lines skipped.
pub fn read_class_names(dir: &Path) -> Result<Option<Vec<String>>, YoloKitError> {
    let path = dir.join(CLASSES_FILE);
    if !path.is_file() {
        return Ok(None);
    }

    let data = fs::read_to_string(&path)?;
    let names = data
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    Ok(Some(names))
}

/// Number of validation images for `total` images.
///
/// `floor(total * val_fraction)` clamped to `[1, total]`; zero only for an
/// empty set.
pub fn val_image_count(total: usize, val_fraction: f64) -> usize {
    if total == 0 {
        return 0;
    }

    let raw = (total as f64 * val_fraction).floor() as usize;
    raw.clamp(1, total)
}

/// Split images into train and validation partitions.
///
/// Images are sorted by file name, shuffled with a [`StdRng`] seeded from
/// `seed`, and the first [`val_image_count`] go to validation. The same
/// seed and input set always produce the same split.
pub fn split_train_val(
    images: &[PathBuf],
    val_fraction: f64,
    seed: u64,
) -> Result<TrainValSplit, YoloKitError> {
    validate_val_fraction(val_fraction)?;

    let mut ordered = images.to_vec();
    ordered.sort_by(|a, b| a.file_name().cmp(&b.file_name()).then_with(|| a.cmp(b)));

    let mut rng = StdRng::seed_from_u64(seed);
    ordered.shuffle(&mut rng);

    let n_val = val_image_count(ordered.len(), val_fraction);
    let train = ordered.split_off(n_val);

    Ok(TrainValSplit {
        train,
        val: ordered,
    })
}

/// Copy images and their same-named label files into a partition.
///
/// Labels are looked up next to each image as `<stem>.txt`. An image without
/// one is still copied and its file name pushed onto
/// [`CopyOutcome::missing_labels`].
pub fn copy_pairs(
    images: &[PathBuf],
    images_dst: &Path,
    labels_dst: &Path,
) -> Result<CopyOutcome, YoloKitError> {
    let mut outcome = CopyOutcome::default();

    for image in images {
        let Some(image_name) = image.file_name() else {
            continue;
        };
        copy_with_times(image, &images_dst.join(image_name))?;

        let label = image.with_extension(LABEL_EXTENSION);
        match label.file_name() {
            Some(label_name) if label.is_file() => {
                copy_with_times(&label, &labels_dst.join(label_name))?;
            }
            _ => {
                log::debug!("no label for {}", image.display());
                outcome
                    .missing_labels
                    .push(image_name.to_string_lossy().into_owned());
            }
        }

        outcome.copied += 1;
    }

    Ok(outcome)
}

/// Copy a file, then carry over its access and modification times.
fn copy_with_times(src: &Path, dst: &Path) -> Result<(), YoloKitError> {
    fs::copy(src, dst)?;

    let metadata = fs::metadata(src)?;
    let mut times = FileTimes::new();
    if let Ok(accessed) = metadata.accessed() {
        times = times.set_accessed(accessed);
    }
    if let Ok(modified) = metadata.modified() {
        times = times.set_modified(modified);
    }

    // Read-only sources produce read-only copies; their timestamps stay as copied.
    match fs::OpenOptions::new().write(true).open(dst) {
        Ok(file) => file.set_times(times)?,
        Err(err) => log::debug!("keeping copy times for {}: {err}", dst.display()),
    }

    Ok(())
}

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };

    allowed
        .iter()
        .any(|allowed_ext| ext.eq_ignore_ascii_case(allowed_ext))
}
