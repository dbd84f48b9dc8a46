//! Renderers for a finished [`Briefing`].
//!
//! # Submodules
//!
//! - [`html`]: Self-contained HTML document, used as the email body
//! - [`pdf`]: Paginated report, attached to the email and saved with `--pdf-output`
//! - [`text`]: Plain-text rendition for the email's text part and `--dry-run`
//! - [`json`]: Pretty JSON debug artifact (`--save-json`)
//!
//! All renderers take the briefing by reference and never modify it.

pub mod html;
pub mod json;
pub mod pdf;
pub mod text;

use crate::models::Briefing;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{error, info, instrument};

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("cannot write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot serialize briefing: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot build PDF: {0}")]
    Pdf(#[from] lopdf::Error),
}

/// Target format of [`render`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Html,
    PlainText,
    Json,
    Pdf,
}

/// Render `briefing` to bytes in the requested format.
pub fn render(briefing: &Briefing, format: Format) -> Result<Vec<u8>, OutputError> {
    Ok(match format {
        Format::Html => html::render_html(briefing).into_bytes(),
        Format::PlainText => text::render_text(briefing).into_bytes(),
        Format::Json => json::to_json(briefing)?.into_bytes(),
        Format::Pdf => pdf::render_pdf(briefing)?,
    })
}

/// Render and write `briefing` to `path`, creating parent directories.
#[instrument(level = "info", skip_all, fields(path = %path.display(), ?format))]
pub async fn save(briefing: &Briefing, format: Format, path: &Path) -> Result<(), OutputError> {
    let bytes = render(briefing, format)?;
    let io_err = |source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    if let Err(e) = fs::write(path, &bytes).await {
        error!(error = %e, "Failed to write briefing");
        return Err(io_err(e));
    }
    info!(bytes = bytes.len(), ?format, "Wrote briefing");
    Ok(())
}
