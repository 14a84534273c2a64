//! Human-readable dump and parse.
//!
//! One `name<TAB>value` line per occurrence, in storage order, with a blank
//! line after the last field. Bytes outside printable ASCII are written as
//! `\hh` and a backslash as `\\`. A nested buffer is a `name<TAB>` line
//! followed by its own fields indented one more tab. Fields without a
//! catalog name are written as `(type:number)`.
//!
//! When reading, a line may start with a flag:
//!
//! | flag      | effect                                                       |
//! |-----------|--------------------------------------------------------------|
//! | none, `+` | add the value as a new occurrence                            |
//! | `=`       | set occurrence 0; a value naming a field copies that field   |
//! | `-`       | erase every occurrence (the value is ignored)                |
//! | `#`       | comment                                                      |

use super::{FieldBuffer, MAX_NESTING_DEPTH};
use crate::error::{FmlError, Result};
use crate::types::{FieldId, FieldType, Wide, Width};
use crate::value::{MbString, PtrValue, Value, ViewRecord};
use std::fmt::Write as _;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

impl<W: Width> FieldBuffer<W> {
    /// Write the text form to `out`.
    pub fn print_to(&self, out: &mut dyn Write) -> Result<()> {
        self.check_allocated("print")?;
        write_level(self, 0, out)
            .and_then(|_| writeln!(out))
            .map_err(stream_error)
    }

    /// Write the text form to standard output.
    pub fn print(&self) -> Result<()> {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        self.print_to(&mut lock)
    }

    /// The text form as a string.
    pub fn to_text(&self) -> Result<String> {
        let mut out = Vec::new();
        self.print_to(&mut out)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Apply the lines of `reader` up to the first blank line.
    ///
    /// A null buffer is allocated by the first added field. The lines are
    /// applied to a copy that replaces this buffer only when every line
    /// succeeds, so a failure leaves the buffer as it was.
    pub fn extread(&mut self, reader: impl BufRead) -> Result<()> {
        let mut lines = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(stream_error)?;
            if line.trim().is_empty() {
                break;
            }
            lines.push((idx + 1, line));
        }

        let mut scratch = self.snapshot()?;
        let mut pos = 0;
        read_level(&mut scratch, &lines, &mut pos, 0)?;
        *self = scratch;
        tracing::debug!(lines = lines.len(), entries = self.len(), "Read field buffer text");
        Ok(())
    }
}

fn stream_error(e: io::Error) -> FmlError {
    FmlError::Io {
        path: PathBuf::from("<stream>"),
        cause: e.to_string(),
    }
}

fn label<V: Width>(id: FieldId<V>) -> String {
    V::catalog()
        .name_for(id)
        .unwrap_or_else(|_| format!("({}:{})", id.field_type(), id.number()))
}

fn write_level<V: Width>(buf: &FieldBuffer<V>, depth: usize, out: &mut dyn Write) -> io::Result<()> {
    let indent = "\t".repeat(depth);
    for (id, _, value) in buf.iter() {
        let name = label(id);
        match value {
            Value::Fml(nested) => {
                writeln!(out, "{}{}\t", indent, name)?;
                write_level(&nested, depth + 1, out)?;
            }
            other => writeln!(out, "{}{}\t{}", indent, name, format_value(&other))?,
        }
    }
    Ok(())
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Char(c) => escape(&[*c]),
        Value::String(s) => escape(s.as_bytes()),
        Value::Carray(b) => escape(b),
        Value::MbString(m) => format!("{}:{}", escape(m.encoding.as_bytes()), escape(&m.bytes)),
        Value::View(v) => format!("{}:{}", escape(v.name.as_bytes()), escape(&v.data)),
        Value::Ptr(p) => format!("0x{:x}", p.address),
        other => other.to_string(),
    }
}

fn escape(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(b as char),
            _ => {
                let _ = write!(out, "\\{:02x}", b);
            }
        }
    }
    out
}

fn unescape(text: &str, line: usize) -> Result<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        if bytes.get(i + 1) == Some(&b'\\') {
            out.push(b'\\');
            i += 2;
            continue;
        }
        let byte = text
            .get(i + 1..i + 3)
            .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            .ok_or_else(|| FmlError::TextParse {
                line,
                cause: format!("invalid escape at column {}", i + 1),
            })?;
        out.push(byte);
        i += 3;
    }
    Ok(out)
}

fn resolve<V: Width>(name: &str, line: usize) -> Result<FieldId<V>> {
    let Some(inner) = name.strip_prefix('(').and_then(|n| n.strip_suffix(')')) else {
        return V::catalog().identifier_for(name);
    };

    let bad = || FmlError::TextParse {
        line,
        cause: format!("invalid field reference '{}'", name),
    };
    let (keyword, number) = inner.split_once(':').ok_or_else(bad)?;
    let field_type = FieldType::from_keyword(keyword).ok_or_else(bad)?;
    let number = number.parse().map_err(|_| bad())?;
    FieldId::new(field_type, number)
}

fn parse_number<T: std::str::FromStr>(raw: &str, field_type: FieldType, line: usize) -> Result<T> {
    raw.trim().parse().map_err(|_| FmlError::TextParse {
        line,
        cause: format!("invalid {} value '{}'", field_type, raw),
    })
}

fn split_named(raw: &str, field_type: FieldType, line: usize) -> Result<(String, Vec<u8>)> {
    let (name, data) = raw.split_once(':').ok_or_else(|| FmlError::TextParse {
        line,
        cause: format!("{} value must be '<name>:<data>'", field_type),
    })?;
    let name = String::from_utf8(unescape(name, line)?).map_err(|_| FmlError::TextParse {
        line,
        cause: "name is not valid UTF-8".to_string(),
    })?;
    Ok((name, unescape(data, line)?))
}

fn parse_value(field_type: FieldType, raw: &str, line: usize) -> Result<Value> {
    Ok(match field_type {
        FieldType::Short => Value::Short(parse_number(raw, field_type, line)?),
        FieldType::Long => Value::Long(parse_number(raw, field_type, line)?),
        FieldType::Int => Value::Int(parse_number(raw, field_type, line)?),
        FieldType::Float => Value::Float(parse_number(raw, field_type, line)?),
        FieldType::Double => Value::Double(parse_number(raw, field_type, line)?),
        FieldType::Char => match unescape(raw, line)?.as_slice() {
            [c] => Value::Char(*c),
            _ => {
                return Err(FmlError::TextParse {
                    line,
                    cause: format!("char value must be one byte, got '{}'", raw),
                });
            }
        },
        FieldType::String => {
            Value::String(String::from_utf8(unescape(raw, line)?).map_err(|_| {
                FmlError::TextParse {
                    line,
                    cause: "string is not valid UTF-8".to_string(),
                }
            })?)
        }
        FieldType::Carray => Value::Carray(unescape(raw, line)?),
        FieldType::MbString => {
            let (encoding, bytes) = split_named(raw, field_type, line)?;
            Value::MbString(MbString::new(encoding, bytes))
        }
        FieldType::View => {
            let (name, data) = split_named(raw, field_type, line)?;
            Value::View(ViewRecord::new(name, data))
        }
        FieldType::Ptr => {
            let hex = raw.trim().trim_start_matches("0x");
            let address = u64::from_str_radix(hex, 16).map_err(|_| FmlError::TextParse {
                line,
                cause: format!("invalid pointer '{}'", raw),
            })?;
            Value::Ptr(PtrValue::borrowed(address))
        }
        FieldType::Fml => {
            return Err(FmlError::TextParse {
                line,
                cause: "nested buffers take their fields on the following lines".to_string(),
            });
        }
    })
}

fn read_level<V: Width>(
    buf: &mut FieldBuffer<V>,
    lines: &[(usize, String)],
    pos: &mut usize,
    depth: usize,
) -> Result<()> {
    while let Some((line_no, line)) = lines.get(*pos) {
        let line_no = *line_no;
        let tabs = line.bytes().take_while(|b| *b == b'\t').count();
        if tabs < depth {
            return Ok(());
        }
        if tabs > depth {
            return Err(FmlError::TextParse {
                line: line_no,
                cause: "unexpected indentation".to_string(),
            });
        }
        *pos += 1;

        let content = &line[depth..];
        if content.starts_with('#') {
            continue;
        }
        let (flag, content) = match content.as_bytes().first() {
            Some(b'+') | Some(b'=') | Some(b'-') => (content.as_bytes()[0], &content[1..]),
            _ => (b'+', content),
        };
        let (name, raw) = content.split_once('\t').unwrap_or((content, ""));
        let id = resolve::<V>(name.trim(), line_no)?;

        if flag == b'-' {
            if !buf.is_null() {
                buf.erase_all(id)?;
            }
            continue;
        }

        let value = if id.field_type() == FieldType::Fml {
            if depth >= MAX_NESTING_DEPTH {
                return Err(FmlError::TextParse {
                    line: line_no,
                    cause: format!("buffers nested more than {} levels deep", MAX_NESTING_DEPTH),
                });
            }
            let mut nested = FieldBuffer::<Wide>::new();
            read_level(&mut nested, lines, pos, depth + 1)?;
            Value::Fml(nested)
        } else {
            match copy_source(buf, raw, flag)? {
                Some(value) => value,
                None => parse_value(id.field_type(), raw, line_no)?,
            }
        };

        if flag == b'=' {
            buf.set(id, 0, value)?;
        } else {
            buf.add(id, value)?;
        }
    }
    Ok(())
}

/// For `=` lines whose value names a field, that field's first occurrence.
fn copy_source<V: Width>(buf: &FieldBuffer<V>, raw: &str, flag: u8) -> Result<Option<Value>> {
    if flag != b'=' {
        return Ok(None);
    }
    let Ok(source) = V::catalog().identifier_for(raw.trim()) else {
        return Ok(None);
    };
    buf.value_at(source, 0)?
        .map(Some)
        .ok_or_else(|| FmlError::NotPresent {
            field: raw.trim().to_string(),
            occurrence: 0,
        })
}
