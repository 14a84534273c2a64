//! Print command - dump an exported buffer as text.

use super::read_buffer;
use anyhow::Result;
use fml_core::Width;
use std::path::Path;

/// Run the print command.
pub fn run<W: Width>(file: &Path) -> Result<()> {
    let buf = read_buffer::<W>(file)?;
    tracing::info!(file = %file.display(), entries = buf.len(), "Printing buffer");
    buf.print()?;
    Ok(())
}
