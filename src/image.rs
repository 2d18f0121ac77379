// Image Handler: Drive link to uploaded media.
//
// Image problems never fail a row. Anything that prevents a usable asset is
// logged and reported as `None`, and the post goes out without a featured
// image unless the operator supplies another one.

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use rand::Rng;
use regex::Regex;

use crate::error::{CopydeskError, Result};
use crate::publisher::PublishTarget;

/// Image types the publishing target accepts: (MIME type, canonical extension).
pub const SUPPORTED_FORMATS: &[(&str, &str)] = &[
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/jpg", "jpg"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("image/heic", "heic"),
    ("image/heif", "heif"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAsset {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub caption: String,
    pub content_type: String,
}

impl MediaAsset {
    /// Load a local image chosen by the operator.
    pub fn from_path(path: &Path, caption: &str) -> Result<Self> {
        let filename = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| CopydeskError::Image(format!("not a file path: {}", path.display())))?
            .to_string();
        let (content_type, _) = format_for(&filename, "")
            .ok_or_else(|| CopydeskError::Image(format!("unsupported image format: {}", filename)))?;
        let bytes = std::fs::read(path)
            .map_err(|e| CopydeskError::Image(format!("cannot read {}: {}", path.display(), e)))?;

        Ok(Self {
            bytes,
            filename,
            caption: caption.to_string(),
            content_type: content_type.to_string(),
        })
    }
}

/// Metadata of a Drive file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveFile {
    pub name: String,
    pub mime_type: String,
}

/// Read access to hosted image files.
pub trait ImageSource {
    fn file_metadata(&self, file_id: &str) -> Result<DriveFile>;
    fn download(&self, file_id: &str) -> Result<Vec<u8>>;
}

/// Retry behaviour for media uploads.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
    /// Add up to 50% random jitter to each wait.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            jitter: false,
            ..Default::default()
        }
    }
}

/// Drive file id from a shareable link, if the link is a Drive link.
pub fn drive_file_id(link: &str) -> Option<String> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        [r"/file/d/([a-zA-Z0-9_-]+)", r"[?&]id=([a-zA-Z0-9_-]+)"]
            .iter()
            .map(|p| Regex::new(p).expect("valid regex"))
            .collect()
    });

    if !is_drive_host(link) {
        return None;
    }
    patterns
        .iter()
        .find_map(|re| re.captures(link).map(|caps| caps[1].to_string()))
}

fn is_drive_host(link: &str) -> bool {
    let rest = link
        .trim()
        .strip_prefix("https://")
        .or_else(|| link.trim().strip_prefix("http://"))
        .unwrap_or("");
    let host = rest.split(['/', '?']).next().unwrap_or("");
    host == "drive.google.com" || host == "docs.google.com"
}

/// Resolve the content type and extension of a file, preferring the file
/// name's extension over the reported MIME type.
pub fn format_for(name: &str, mime_type: &str) -> Option<(&'static str, &'static str)> {
    let ext = name.rsplit_once('.').map(|(_, e)| e.to_lowercase());
    if let Some(ext) = ext {
        let ext = if ext == "jpeg" { "jpg".to_string() } else { ext };
        if let Some(found) = SUPPORTED_FORMATS.iter().find(|(_, e)| *e == ext) {
            return Some(*found);
        }
    }
    SUPPORTED_FORMATS
        .iter()
        .find(|(m, _)| m.eq_ignore_ascii_case(mime_type))
        .copied()
}

/// Fetch an image from a Drive link. `stem` names the uploaded file.
pub fn fetch_image(source: &dyn ImageSource, link: &str, caption: &str, stem: &str) -> Option<MediaAsset> {
    match try_fetch_image(source, link, caption, stem) {
        Ok(asset) => Some(asset),
        Err(e) => {
            tracing::warn!(link, error = %e, "Image unavailable");
            None
        }
    }
}

fn try_fetch_image(source: &dyn ImageSource, link: &str, caption: &str, stem: &str) -> Result<MediaAsset> {
    let file_id = drive_file_id(link).ok_or_else(|| CopydeskError::Image(format!("not a Drive link: {}", link)))?;
    let meta = source.file_metadata(&file_id)?;

    let (content_type, ext) = format_for(&meta.name, &meta.mime_type).ok_or_else(|| {
        CopydeskError::Image(format!(
            "unsupported image format {} ({}); accepted: PNG, JPEG, GIF, WebP, HEIC, HEIF",
            meta.mime_type, meta.name
        ))
    })?;

    let bytes = source.download(&file_id)?;
    if bytes.is_empty() {
        return Err(CopydeskError::Image(format!("Drive file {} is empty", file_id)));
    }

    Ok(MediaAsset {
        bytes,
        filename: format!("featured_image_{}.{}", stem, ext),
        caption: caption.to_string(),
        content_type: content_type.to_string(),
    })
}

/// Upload with bounded retry. Transient failures (no response, 429, 5xx) are
/// retried with exponential backoff; anything else fails at once.
pub fn upload_image(target: &dyn PublishTarget, asset: &MediaAsset, policy: &RetryPolicy) -> Result<u64> {
    let attempts = policy.max_attempts.max(1);
    let mut backoff = policy.initial_backoff;
    let mut last_error = None;

    for attempt in 1..=attempts {
        match target.upload_media(asset) {
            Ok(id) => {
                tracing::info!(media_id = id, attempt, filename = %asset.filename, "Image uploaded");
                return Ok(id);
            }
            Err(e) if e.is_transient() && attempt < attempts => {
                let wait = if policy.jitter && !backoff.is_zero() {
                    let extra = rand::thread_rng().gen_range(0..=backoff.as_millis() as u64 / 2);
                    backoff + Duration::from_millis(extra)
                } else {
                    backoff
                };
                tracing::warn!(
                    "Image upload failed (attempt {}/{}), retrying in {}ms: {}",
                    attempt,
                    attempts,
                    wait.as_millis(),
                    e
                );
                std::thread::sleep(wait);
                backoff = backoff.mul_f64(policy.backoff_multiplier).min(policy.max_backoff);
                last_error = Some(e);
            }
            Err(e) => {
                last_error = Some(e);
                break;
            }
        }
    }

    Err(CopydeskError::Image(format!(
        "upload of {} failed: {}",
        asset.filename,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::{CreatedPost, Entity, PostPayload, PostState};
    use std::cell::RefCell;
    use std::io::Write;

    struct FakeDrive {
        name: &'static str,
        mime: &'static str,
        downloads: RefCell<u32>,
    }

    impl FakeDrive {
        fn new(name: &'static str, mime: &'static str) -> Self {
            Self {
                name,
                mime,
                downloads: RefCell::new(0),
            }
        }
    }

    impl ImageSource for FakeDrive {
        fn file_metadata(&self, _file_id: &str) -> Result<DriveFile> {
            Ok(DriveFile {
                name: self.name.into(),
                mime_type: self.mime.into(),
            })
        }

        fn download(&self, _file_id: &str) -> Result<Vec<u8>> {
            *self.downloads.borrow_mut() += 1;
            Ok(vec![0x89, b'P', b'N', b'G'])
        }
    }

    /// Replays a scripted sequence of upload results.
    struct ScriptedUploads {
        script: RefCell<Vec<Result<u64>>>,
        calls: RefCell<u32>,
    }

    impl ScriptedUploads {
        fn new(mut script: Vec<Result<u64>>) -> Self {
            script.reverse();
            Self {
                script: RefCell::new(script),
                calls: RefCell::new(0),
            }
        }
    }

    impl PublishTarget for ScriptedUploads {
        fn find_authors(&self, _name: &str) -> Result<Vec<Entity>> {
            unimplemented!()
        }
        fn create_author(&self, _name: &str) -> Result<Entity> {
            unimplemented!()
        }
        fn list_categories(&self) -> Result<Vec<Entity>> {
            unimplemented!()
        }
        fn create_category(&self, _name: &str) -> Result<Entity> {
            unimplemented!()
        }
        fn upload_media(&self, _asset: &MediaAsset) -> Result<u64> {
            *self.calls.borrow_mut() += 1;
            self.script.borrow_mut().pop().expect("script exhausted")
        }
        fn create_post(&self, _payload: &PostPayload) -> Result<CreatedPost> {
            unimplemented!()
        }
        fn fetch_post(&self, _id: u64) -> Result<PostState> {
            unimplemented!()
        }
    }

    fn transient() -> Result<u64> {
        Err(CopydeskError::Publish {
            status: Some(503),
            message: "busy".into(),
        })
    }

    fn asset() -> MediaAsset {
        MediaAsset {
            bytes: vec![1, 2, 3],
            filename: "featured_image_doc.png".into(),
            caption: "caption".into(),
            content_type: "image/png".into(),
        }
    }

    #[test]
    fn test_drive_file_id_patterns() {
        assert_eq!(
            drive_file_id("https://drive.google.com/file/d/1AbC-_x/view?usp=sharing").as_deref(),
            Some("1AbC-_x")
        );
        assert_eq!(drive_file_id("https://drive.google.com/open?id=XYZ").as_deref(), Some("XYZ"));
        assert_eq!(drive_file_id("https://drive.google.com/uc?export=view&id=Q1").as_deref(), Some("Q1"));
        assert_eq!(drive_file_id("https://example.com/file/d/abc/view"), None);
        assert_eq!(drive_file_id("https://drive.google.com/drive/folders"), None);
    }

    #[test]
    fn test_format_prefers_extension() {
        assert_eq!(format_for("photo.JPEG", "application/octet-stream"), Some(("image/jpeg", "jpg")));
        assert_eq!(format_for("photo", "image/webp"), Some(("image/webp", "webp")));
        assert_eq!(format_for("scan.pdf", "application/pdf"), None);
    }

    #[test]
    fn test_fetch_image_builds_asset() {
        let drive = FakeDrive::new("river.png", "image/png");
        let asset = fetch_image(&drive, "https://drive.google.com/file/d/img1/view", "Cutline", "doc1").unwrap();
        assert_eq!(asset.filename, "featured_image_doc1.png");
        assert_eq!(asset.content_type, "image/png");
        assert_eq!(asset.caption, "Cutline");
    }

    #[test]
    fn test_non_image_yields_none_without_download() {
        let drive = FakeDrive::new("notes.pdf", "application/pdf");
        let uploads = ScriptedUploads::new(vec![]);

        let asset = fetch_image(&drive, "https://drive.google.com/file/d/pdf1/view", "", "doc1");
        assert!(asset.is_none());
        assert_eq!(*drive.downloads.borrow(), 0);
        assert_eq!(*uploads.calls.borrow(), 0);
    }

    #[test]
    fn test_non_drive_host_yields_none() {
        let drive = FakeDrive::new("a.png", "image/png");
        assert!(fetch_image(&drive, "https://images.example.com/a.png", "", "doc1").is_none());
        assert_eq!(*drive.downloads.borrow(), 0);
    }

    #[test]
    fn test_upload_recovers_within_bound() {
        let uploads = ScriptedUploads::new(vec![transient(), transient(), Ok(77)]);
        let id = upload_image(&uploads, &asset(), &RetryPolicy::immediate(3)).unwrap();
        assert_eq!(id, 77);
        assert_eq!(*uploads.calls.borrow(), 3);
    }

    #[test]
    fn test_upload_exceeding_bound_fails() {
        let uploads = ScriptedUploads::new(vec![transient(), transient(), transient()]);
        let err = upload_image(&uploads, &asset(), &RetryPolicy::immediate(3)).unwrap_err();
        assert!(matches!(err, CopydeskError::Image(_)));
        assert!(err.to_string().contains("503"));
        assert_eq!(*uploads.calls.borrow(), 3);
    }

    #[test]
    fn test_client_error_not_retried() {
        let uploads = ScriptedUploads::new(vec![Err(CopydeskError::Publish {
            status: Some(415),
            message: "unsupported media".into(),
        })]);
        assert!(upload_image(&uploads, &asset(), &RetryPolicy::immediate(3)).is_err());
        assert_eq!(*uploads.calls.borrow(), 1);
    }

    #[test]
    fn test_local_asset_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.webp");
        std::fs::File::create(&path).unwrap().write_all(b"RIFF").unwrap();

        let asset = MediaAsset::from_path(&path, "Local").unwrap();
        assert_eq!(asset.content_type, "image/webp");
        assert_eq!(asset.filename, "local.webp");
        assert_eq!(asset.bytes, b"RIFF");

        let txt = dir.path().join("notes.txt");
        std::fs::write(&txt, "x").unwrap();
        assert!(MediaAsset::from_path(&txt, "").is_err());
    }
}
