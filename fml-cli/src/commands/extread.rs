//! Extread command - build a buffer from a text dump and export it.

use super::write_output;
use anyhow::{Context, Result};
use fml_core::{ExportMode, FieldBuffer, Width};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Read the first block of `file` into a fresh buffer.
pub fn build<W: Width>(file: &Path) -> Result<FieldBuffer<W>> {
    let reader = File::open(file)
        .map(BufReader::new)
        .with_context(|| format!("Failed to open {}", file.display()))?;

    let mut buf = FieldBuffer::new();
    buf.extread(reader)
        .with_context(|| format!("Failed to read text dump {}", file.display()))?;
    Ok(buf)
}

/// Run the extread command.
pub fn run<W: Width>(file: &Path, output: Option<&Path>, text_safe: bool) -> Result<()> {
    let buf = build::<W>(file)?;
    let mode = if text_safe {
        ExportMode::TextSafe
    } else {
        ExportMode::Binary
    };
    let bytes = buf.export(mode)?;
    tracing::info!(
        file = %file.display(),
        entries = buf.len(),
        %mode,
        bytes = bytes.len(),
        "Exported text dump"
    );
    write_output(output, &bytes)
}

#[cfg(test)]
mod tests {
    use super::super::read_buffer;
    use super::super::test_support::sample;
    use super::*;
    use fml_core::prelude::*;
    use tempfile::TempDir;

    #[test]
    fn text_dump_becomes_an_importable_export() {
        let dir = TempDir::new().unwrap();
        let original = sample();
        let dump = dir.path().join("sample.fml");
        std::fs::write(&dump, original.to_text().unwrap()).unwrap();

        for (file, text_safe) in [("out.bin", false), ("out.txt", true)] {
            let out = dir.path().join(file);
            run::<Wide>(&dump, Some(&out), text_safe).unwrap();
            assert_eq!(read_buffer::<Wide>(&out).unwrap(), original);
        }
    }

    #[test]
    fn bad_lines_are_reported_with_the_file() {
        let dir = TempDir::new().unwrap();
        let dump = dir.path().join("bad.fml");
        std::fs::write(&dump, "COUNT\tnot-a-number\n\n").unwrap();

        let err = build::<Wide>(&dump).unwrap_err();
        assert!(err.to_string().contains("bad.fml"));
        let cause = err.root_cause().to_string();
        assert!(cause.contains("line 1"), "{}", cause);
    }
}
