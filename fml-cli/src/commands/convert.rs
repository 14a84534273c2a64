//! Convert command - re-export a buffer in another transport mode.

use super::{read_buffer, write_output};
use anyhow::Result;
use fml_core::{ExportMode, Width};
use std::path::Path;

/// Run the convert command.
pub fn run<W: Width>(file: &Path, output: &Path, to: ExportMode) -> Result<()> {
    let buf = read_buffer::<W>(file)?;
    let bytes = buf.export(to)?;
    tracing::info!(
        from = %file.display(),
        to = %output.display(),
        mode = %to,
        bytes = bytes.len(),
        "Converted buffer"
    );
    write_output(Some(output), &bytes)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{exported, sample};
    use super::*;
    use fml_core::prelude::*;
    use tempfile::TempDir;

    #[test]
    fn binary_and_text_safe_convert_both_ways() {
        let dir = TempDir::new().unwrap();
        let buf = sample();
        let binary = exported(dir.path(), "in.bin", &buf, ExportMode::Binary);

        let text = dir.path().join("out.txt");
        run::<Wide>(&binary, &text, ExportMode::TextSafe).unwrap();
        let bytes = std::fs::read(&text).unwrap();
        assert_eq!(ExportMode::detect(&bytes), ExportMode::TextSafe);

        let again = dir.path().join("again.bin");
        run::<Wide>(&text, &again, ExportMode::Binary).unwrap();
        assert_eq!(std::fs::read(&again).unwrap(), std::fs::read(&binary).unwrap());
    }
}
