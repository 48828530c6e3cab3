use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::{ImportError, UploadFormat};

/// An uploaded file written to the upload directory as `<uuid>.<ext>`.
///
/// The file is removed when the guard is dropped, unless it was created with
/// `retain` (debug mode keeps uploads for inspection).
#[derive(Debug)]
pub struct StagedUpload {
    path: PathBuf,
    document_id: Uuid,
    format: UploadFormat,
    retain: bool,
}

impl StagedUpload {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document_id(&self) -> Uuid {
        self.document_id
    }

    pub fn format(&self) -> UploadFormat {
        self.format
    }

    pub fn is_retained(&self) -> bool {
        self.retain
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        if self.retain {
            tracing::debug!(path = %self.path.display(), "Keeping upload (debug mode)");
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Upload removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove upload"
            ),
        }
    }
}

/// Write `content` into `upload_dir`, creating the directory if needed.
pub fn stage_upload(
    upload_dir: &Path,
    document_id: Uuid,
    format: UploadFormat,
    content: &[u8],
    retain: bool,
) -> Result<StagedUpload, ImportError> {
    std::fs::create_dir_all(upload_dir)?;

    let path = upload_dir.join(format!("{}.{}", document_id, format.extension()));
    if let Err(e) = std::fs::write(&path, content) {
        // A failed write can leave a truncated file behind.
        if path.is_file() {
            let _ = std::fs::remove_file(&path);
        }
        return Err(e.into());
    }

    tracing::debug!(
        document_id = %document_id,
        size = content.len(),
        retain,
        "Upload staged"
    );

    Ok(StagedUpload {
        path,
        document_id,
        format,
        retain,
    })
}
