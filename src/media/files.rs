//! Managed media and orphan directories.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use super::ResolvedMedia;

pub struct MediaFiles {
    media_root: PathBuf,
    orphan_root: PathBuf,
}

impl MediaFiles {
    pub fn new(media_root: impl Into<PathBuf>, orphan_root: impl Into<PathBuf>) -> Self {
        Self {
            media_root: media_root.into(),
            orphan_root: orphan_root.into(),
        }
    }

    pub fn media_root(&self) -> &Path {
        &self.media_root
    }

    pub fn orphan_root(&self) -> &Path {
        &self.orphan_root
    }

    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.media_root).await?;
        fs::create_dir_all(&self.orphan_root).await?;
        Ok(())
    }

    /// File name under the media root: `{channel}_{message}_{name}`.
    ///
    /// The sender's name is used when it survives sanitizing, otherwise the
    /// content id plus an extension guessed from the MIME type.
    pub fn file_name_for(&self, media: &ResolvedMedia) -> String {
        let name = media
            .file_name
            .as_deref()
            .and_then(sanitize_filename)
            .unwrap_or_else(|| {
                let id = sanitize_filename(&media.file_id).unwrap_or_else(|| "media".to_string());
                format!("{}.{}", id, extension_for(media.mime_type.as_deref()))
            });
        format!(
            "{}_{}_{}",
            media.locator.channel_id, media.locator.message_id, name
        )
    }

    pub fn media_path(&self, file_name: &str) -> PathBuf {
        self.media_root.join(file_name)
    }

    pub async fn remove(&self, file_name: &str) -> std::io::Result<()> {
        fs::remove_file(self.media_path(file_name)).await
    }

    /// Moves a file from the media root into the orphan root.
    pub async fn quarantine(&self, file_name: &str) -> std::io::Result<PathBuf> {
        self.move_to_orphans(&self.media_path(file_name)).await
    }

    /// Moves any file into the orphan root, keeping its name. Falls back to
    /// copy and delete when the roots sit on different filesystems. Fails
    /// with `AlreadyExists` rather than replace an orphan of the same name.
    pub async fn move_to_orphans(&self, source: &Path) -> std::io::Result<PathBuf> {
        let name = source.file_name().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{:?} has no file name", source),
            )
        })?;
        fs::create_dir_all(&self.orphan_root).await?;
        let dest = self.orphan_root.join(name);
        if fs::try_exists(&dest).await? {
            return Err(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("{:?} is already in orphans", dest),
            ));
        }

        if let Err(e) = fs::rename(source, &dest).await {
            debug!("rename of {:?} failed ({}), copying instead", source, e);
            fs::copy(source, &dest).await?;
            fs::remove_file(source).await?;
        }
        warn!("Moved {:?} to orphans", dest.file_name().unwrap_or(name));
        Ok(dest)
    }
}

fn extension_for(mime_type: Option<&str>) -> &'static str {
    match mime_type {
        Some("video/mp4") => "mp4",
        Some("video/webm") => "webm",
        Some("video/quicktime") => "mov",
        Some("image/jpeg") | None => "jpg",
        Some("image/png") => "png",
        Some("image/gif") => "gif",
        Some("image/webp") => "webp",
        Some("application/pdf") => "pdf",
        Some("application/zip") => "zip",
        Some(_) => "bin",
    }
}

/// Strips any directory part and replaces characters that are unsafe in file
/// names. Returns `None` for names that cannot be made safe.
pub fn sanitize_filename(filename: &str) -> Option<String> {
    let name = Path::new(filename).file_name()?.to_str()?;

    if name.contains('\0') || name.starts_with('.') {
        return None;
    }

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            _ => c,
        })
        .collect();

    (!sanitized.trim().is_empty()).then_some(sanitized)
}
