use eyre::Result;

use skytrack_tracks::ExportFormat;

/// Fetch the list of supported export formats and their description.
///
pub fn list_formats() -> Result<String> {
    Ok(ExportFormat::list())
}
