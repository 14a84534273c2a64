//! CLI command implementations.

pub mod convert;
pub mod eval;
pub mod extread;
pub mod fields;
pub mod print;

use anyhow::{Context, Result};
use fml_core::{ExportMode, FieldBuffer, FieldTable, Width};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Register each table file with the width family's catalog.
pub fn register_tables<W: Width>(paths: &[PathBuf]) -> Result<()> {
    for path in paths {
        let table = FieldTable::from_path(path)
            .with_context(|| format!("Failed to load field table {}", path.display()))?;
        tracing::info!(
            path = %path.display(),
            fields = table.fields.len(),
            width = W::NAME,
            "Registered field table"
        );
        W::catalog().register(table);
    }
    Ok(())
}

/// Import an exported buffer, detecting its transport mode.
pub fn read_buffer<W: Width>(path: &Path) -> Result<FieldBuffer<W>> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let mode = ExportMode::detect(&bytes);
    tracing::debug!(path = %path.display(), %mode, bytes = bytes.len(), "Importing buffer");
    FieldBuffer::import(&bytes, mode)
        .with_context(|| format!("{} is not an exported {} buffer", path.display(), W::NAME))
}

/// Write `bytes` to `output`, or to stdout when no path is given.
pub fn write_output(output: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes)?;
            stdout.flush()?;
            Ok(())
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use fml_core::prelude::*;
    use fml_core::testing::{fixture, register_fixture_tables};
    use std::path::{Path, PathBuf};

    /// A wide buffer with two names, two counts and a price.
    pub fn sample() -> Fml32 {
        register_fixture_tables();
        let mut buf = Fml32::new();
        buf.add(fixture::<Wide>("NAME"), "hello").unwrap();
        buf.add(fixture::<Wide>("NAME"), "world").unwrap();
        buf.add(fixture::<Wide>("COUNT"), 3i64).unwrap();
        buf.add(fixture::<Wide>("COUNT"), 8i64).unwrap();
        buf.add(fixture::<Wide>("PRICE"), 2.5f64).unwrap();
        buf
    }

    /// Export `buf` into `dir/file`.
    pub fn exported(dir: &Path, file: &str, buf: &Fml32, mode: ExportMode) -> PathBuf {
        let path = dir.join(file);
        std::fs::write(&path, buf.export(mode).unwrap()).unwrap();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{exported, sample};
    use super::*;
    use fml_core::prelude::*;
    use tempfile::TempDir;

    #[test]
    fn read_buffer_detects_both_modes() {
        let dir = TempDir::new().unwrap();
        let buf = sample();
        for (file, mode) in [("a.bin", ExportMode::Binary), ("a.txt", ExportMode::TextSafe)] {
            let path = exported(dir.path(), file, &buf, mode);
            assert_eq!(read_buffer::<Wide>(&path).unwrap(), buf);
        }
    }

    #[test]
    fn read_buffer_names_the_file_on_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("junk.bin");
        fs::write(&path, b"not a frame").unwrap();

        let err = read_buffer::<Wide>(&path).unwrap_err();
        assert!(err.to_string().contains("junk.bin"));
        assert!(read_buffer::<Wide>(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn register_tables_reports_bad_files() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("cli_extra.fd");
        fs::write(&good, "CLI_EXTRA_NOTE 900 string\n").unwrap();
        register_tables::<Narrow>(&[good]).unwrap();
        assert!(Narrow::catalog().identifier_for("CLI_EXTRA_NOTE").is_ok());

        let bad = dir.path().join("bad.fd");
        fs::write(&bad, "BROKEN x long\n").unwrap();
        let err = register_tables::<Narrow>(&[bad]).unwrap_err();
        assert!(err.to_string().contains("bad.fd"));
    }

    #[test]
    fn write_output_creates_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.bin");
        write_output(Some(&path), b"abc").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"abc");
    }
}
