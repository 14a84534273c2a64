//! Export and import framing.
//!
//! ```text
//! ┌────────┬─────────┬───────┬──────────────┬─────────────────┬──────────────┬─────────┐
//! │ "FMLX" │ version │ flags │ kind (u8+..) │ subtype (u8+..) │ payload: u32 │ payload │
//! └────────┴─────────┴───────┴──────────────┴─────────────────┴──────────────┴─────────┘
//! ```
//!
//! The payload is the buffer's region with capacity trimmed to the bytes in
//! use. Flag bit 0 marks a null buffer, whose payload is empty. Text-safe
//! mode wraps the whole frame in standard base64.

use super::FieldBuffer;
use crate::arena::BufferKind;
use crate::error::{FmlError, Result};
use crate::types::Width;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::{Cursor, Read};
use std::str::FromStr;

/// Leading bytes of every binary frame.
pub const FRAME_MAGIC: &[u8; 4] = b"FMLX";

/// Current frame version.
pub const FRAME_VERSION: u8 = 1;

const FLAG_NULL: u8 = 0x01;

/// How an exported buffer is represented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ExportMode {
    /// Raw frame bytes.
    #[default]
    Binary,
    /// Base64 of the frame; safe for text channels.
    TextSafe,
}

impl ExportMode {
    /// Guess the mode of exported bytes from their leading magic.
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(FRAME_MAGIC) {
            Self::Binary
        } else {
            Self::TextSafe
        }
    }
}

impl fmt::Display for ExportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binary => f.write_str("binary"),
            Self::TextSafe => f.write_str("text"),
        }
    }
}

impl FromStr for ExportMode {
    type Err = FmlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "binary" | "bin" => Ok(Self::Binary),
            "text" | "text-safe" | "base64" => Ok(Self::TextSafe),
            other => Err(FmlError::Transport {
                cause: format!("unknown export mode '{}'", other),
            }),
        }
    }
}

fn frame_error(cause: impl Into<String>) -> FmlError {
    FmlError::Transport {
        cause: cause.into(),
    }
}

fn write_short_str(out: &mut Vec<u8>, s: &str) -> Result<()> {
    let len = u8::try_from(s.len()).map_err(|_| frame_error(format!("name '{}' too long", s)))?;
    out.push(len);
    out.extend_from_slice(s.as_bytes());
    Ok(())
}

fn read_short_str(cursor: &mut Cursor<&[u8]>, what: &str) -> Result<String> {
    let truncated = |_: std::io::Error| frame_error(format!("truncated {}", what));
    let len = cursor.read_u8().map_err(truncated)?;
    let mut bytes = vec![0u8; len as usize];
    cursor.read_exact(&mut bytes).map_err(truncated)?;
    String::from_utf8(bytes).map_err(|_| frame_error(format!("{} is not UTF-8", what)))
}

impl<W: Width> FieldBuffer<W> {
    fn frame(&self) -> Result<Vec<u8>> {
        let payload = self.region_bytes();
        let payload_len = u32::try_from(payload.len())
            .map_err(|_| frame_error("payload exceeds 4 GiB"))?;

        let mut out = Vec::with_capacity(payload.len() + 32);
        out.extend_from_slice(FRAME_MAGIC);
        out.push(FRAME_VERSION);
        out.push(if self.is_null() { FLAG_NULL } else { 0 });
        write_short_str(&mut out, W::BUFFER_KIND.as_str())?;
        write_short_str(&mut out, "")?;
        out.write_u32::<LittleEndian>(payload_len)
            .map_err(|e| frame_error(e.to_string()))?;
        out.extend_from_slice(&payload);
        Ok(out)
    }

    fn encoded(&self, mode: ExportMode) -> Result<Vec<u8>> {
        let frame = self.frame()?;
        Ok(match mode {
            ExportMode::Binary => frame,
            ExportMode::TextSafe => STANDARD.encode(frame).into_bytes(),
        })
    }

    /// Export into `dest`, returning the bytes written.
    ///
    /// Fails with `SpaceExhausted` when `dest` is too small; `needed` is the
    /// full encoded size.
    pub fn export_into(&self, mode: ExportMode, dest: &mut [u8]) -> Result<usize> {
        let encoded = self.encoded(mode)?;
        if encoded.len() > dest.len() {
            return Err(FmlError::SpaceExhausted {
                needed: encoded.len(),
                available: dest.len(),
            });
        }
        dest[..encoded.len()].copy_from_slice(&encoded);
        Ok(encoded.len())
    }

    /// Export into a fresh vector.
    pub fn export(&self, mode: ExportMode) -> Result<Vec<u8>> {
        let mut out = vec![0u8; self.used()];
        let written = match self.export_into(mode, &mut out) {
            Err(FmlError::SpaceExhausted { needed, available }) => {
                tracing::trace!(needed, available, "Growing export destination");
                out.resize(needed, 0);
                self.export_into(mode, &mut out)?
            }
            other => other?,
        };
        out.truncate(written);
        tracing::debug!(width = W::NAME, %mode, bytes = written, "Exported field buffer");
        Ok(out)
    }

    /// Rebuild a buffer from exported bytes. The result is always indexed.
    pub fn import(bytes: &[u8], mode: ExportMode) -> Result<Self> {
        let frame = match mode {
            ExportMode::Binary => bytes.to_vec(),
            ExportMode::TextSafe => {
                let text = std::str::from_utf8(bytes)
                    .map_err(|_| frame_error("text-safe input is not UTF-8"))?;
                STANDARD
                    .decode(text.trim())
                    .map_err(|e| frame_error(format!("invalid base64: {}", e)))?
            }
        };

        let mut cursor = Cursor::new(frame.as_slice());
        let mut magic = [0u8; 4];
        cursor
            .read_exact(&mut magic)
            .map_err(|_| frame_error("truncated frame header"))?;
        if &magic != FRAME_MAGIC {
            return Err(frame_error("bad frame magic"));
        }
        let version = cursor
            .read_u8()
            .map_err(|_| frame_error("truncated frame header"))?;
        if version != FRAME_VERSION {
            return Err(frame_error(format!("unsupported frame version {}", version)));
        }
        let flags = cursor
            .read_u8()
            .map_err(|_| frame_error("truncated frame header"))?;

        let kind: BufferKind = read_short_str(&mut cursor, "buffer kind")?.parse()?;
        if kind != W::BUFFER_KIND {
            return Err(frame_error(format!(
                "expected {} buffer, frame holds {}",
                W::BUFFER_KIND,
                kind
            )));
        }
        let _subtype = read_short_str(&mut cursor, "subtype")?;

        let payload_len = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| frame_error("truncated payload length"))? as usize;
        let start = cursor.position() as usize;
        let payload = &frame[start..];
        if payload.len() != payload_len {
            return Err(frame_error(format!(
                "payload length {} does not match {} bytes present",
                payload_len,
                payload.len()
            )));
        }

        if flags & FLAG_NULL != 0 {
            if !payload.is_empty() {
                return Err(frame_error("null buffer frame carries a payload"));
            }
            return Ok(Self::new());
        }

        let buf = Self::from_region(payload)?;
        tracing::debug!(width = W::NAME, %mode, entries = buf.len(), "Imported field buffer");
        Ok(buf)
    }
}
