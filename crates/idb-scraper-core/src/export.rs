//! JSON export of an extraction result

use std::path::Path;

use crate::error::ExportError;
use crate::result::ExtractionResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputStyle {
    /// Two-space indentation
    #[default]
    Pretty,
    Compact,
}

/// Write `result` to `path` as a JSON document, replacing any existing file
pub fn export_to_json(
    result: &ExtractionResult,
    path: &Path,
    style: OutputStyle,
) -> Result<(), ExportError> {
    let mut bytes = match style {
        OutputStyle::Pretty => serde_json::to_vec_pretty(result)?,
        OutputStyle::Compact => serde_json::to_vec(result)?,
    };
    bytes.push(b'\n');

    std::fs::write(path, &bytes).map_err(|source| ExportError::Io {
        path: path.display().to_string(),
        source,
    })?;

    tracing::info!(
        path = %path.display(),
        bytes = bytes.len(),
        "Exported extraction result"
    );

    Ok(())
}
