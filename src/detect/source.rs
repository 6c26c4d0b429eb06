//! Image sources: local files and HTTP(S) URLs.

use std::fmt;
use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::error::YoloKitError;

/// Timeout for the whole remote fetch, connect through body.
pub const FETCH_TIMEOUT_SECS: u64 = 10;

/// Sent with remote fetches; some image hosts refuse non-browser clients.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[cfg(feature = "remote")]
const MAX_IMAGE_BYTES: u64 = 64 * 1024 * 1024;

/// File name used for annotated output of URL sources.
const URL_OUTPUT_NAME: &str = "url_detected.jpg";

/// Where an input image comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageSource {
    Path(PathBuf),
    Url(String),
}

impl ImageSource {
    /// Classify a user-supplied string: `http://` and `https://` prefixes
    /// mean a URL, anything else is a filesystem path.
    pub fn parse(raw: &str) -> Self {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            Self::Url(raw.to_string())
        } else {
            Self::Path(PathBuf::from(raw))
        }
    }

    pub fn is_url(&self) -> bool {
        matches!(self, Self::Url(_))
    }

    /// Short name for summaries: the URL itself or the file name.
    pub fn display_name(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::Path(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        }
    }

    /// `<stem>_detected<ext>` next to a local input, `url_detected.jpg` in
    /// the working directory for a URL.
    pub fn default_output_path(&self) -> PathBuf {
        match self {
            Self::Url(_) => PathBuf::from(URL_OUTPUT_NAME),
            Self::Path(path) => {
                let stem = path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let ext = path
                    .extension()
                    .map(|ext| format!(".{}", ext.to_string_lossy()))
                    .unwrap_or_default();
                let parent = path.parent().unwrap_or_else(|| Path::new(""));
                parent.join(format!("{stem}_detected{ext}"))
            }
        }
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Load and decode an image as 8-bit RGB. Single attempt, no retry.
pub fn load_image(source: &ImageSource) -> Result<RgbImage, YoloKitError> {
    log::debug!("loading image from {source}");
    match source {
        ImageSource::Path(path) => read_local(path),
        ImageSource::Url(url) => fetch_url(url),
    }
}

fn read_local(path: &Path) -> Result<RgbImage, YoloKitError> {
    let image = image::open(path).map_err(|source| YoloKitError::ImageRead {
        path: path.to_path_buf(),
        message: source.to_string(),
    })?;
    Ok(image.to_rgb8())
}

#[cfg(feature = "remote")]
fn fetch_url(raw: &str) -> Result<RgbImage, YoloKitError> {
    use std::time::Duration;

    let download_error = |message: String| YoloKitError::Download {
        url: raw.to_string(),
        message,
    };

    let url = url::Url::parse(raw).map_err(|source| download_error(source.to_string()))?;

    let config = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(FETCH_TIMEOUT_SECS)))
        .build();
    let agent: ureq::Agent = config.into();

    let mut response = agent
        .get(url.as_str())
        .header("User-Agent", BROWSER_USER_AGENT)
        .call()
        .map_err(|source| download_error(source.to_string()))?;

    let bytes = response
        .body_mut()
        .with_config()
        .limit(MAX_IMAGE_BYTES)
        .read_to_vec()
        .map_err(|source| download_error(source.to_string()))?;
    log::debug!("fetched {} bytes from {}", bytes.len(), url);

    let image = image::load_from_memory(&bytes)
        .map_err(|source| download_error(format!("cannot decode image: {source}")))?;
    Ok(image.to_rgb8())
}

#[cfg(not(feature = "remote"))]
fn fetch_url(raw: &str) -> Result<RgbImage, YoloKitError> {
    Err(YoloKitError::Download {
        url: raw.to_string(),
        message: "yolokit was built without the `remote` feature".to_string(),
    })
}
