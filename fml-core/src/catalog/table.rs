//! Field table definitions.
//!
//! A field table maps names to field numbers and value types. Tables are
//! read from YAML, JSON or the classic line-oriented text form:
//!
//! ```text
//! # order fields
//! *base 100
//! ORDER_ID     1   long    -   primary key
//! CUSTOMER     2   string  -
//! ```
//!
//! `*base` offsets every following number; `#` lines and blank lines are
//! ignored, as are `$` lines (header passthrough in the text form).

use crate::error::{FmlError, Result};
use crate::types::FieldType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One field definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// The field name.
    pub name: String,
    /// The field number, relative to the table base.
    pub number: u32,
    /// The declared value type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl FieldDef {
    /// Create a definition.
    pub fn new(name: impl Into<String>, number: u32, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            number,
            field_type,
            comment: None,
        }
    }

    /// Attach a description.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// A set of field definitions sharing one numeric base.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldTable {
    /// Offset added to every definition's number.
    #[serde(default)]
    pub base: u32,
    /// The definitions.
    pub fields: Vec<FieldDef>,
}

impl FieldTable {
    /// Create an empty table with base 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base offset.
    pub fn with_base(mut self, base: u32) -> Self {
        self.base = base;
        self
    }

    /// Add a definition.
    pub fn with_field(mut self, def: FieldDef) -> Self {
        self.fields.push(def);
        self
    }

    /// Shorthand for `with_field(FieldDef::new(..))`.
    pub fn field(self, name: impl Into<String>, number: u32, field_type: FieldType) -> Self {
        self.with_field(FieldDef::new(name, number, field_type))
    }

    /// Absolute numbers and types of every definition.
    pub fn resolved(&self) -> impl Iterator<Item = (&str, u64, FieldType)> + '_ {
        self.fields.iter().map(|def| {
            (
                def.name.as_str(),
                self.base as u64 + def.number as u64,
                def.field_type,
            )
        })
    }

    /// Load a table from disk, choosing the format by file extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| FmlError::TableLoad {
            path: path.to_path_buf(),
            cause: e.to_string(),
        })?;

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("yaml") | Some("yml") => Self::from_yaml(&content, path),
            Some("json") => Self::from_json(&content, path),
            _ => Self::parse_text(&content).map_err(|e| match e {
                FmlError::TextParse { line, cause } => FmlError::TableLoad {
                    path: path.to_path_buf(),
                    cause: format!("line {}: {}", line, cause),
                },
                other => other,
            }),
        }
    }

    /// Parse the YAML form.
    pub fn from_yaml(content: &str, origin: &Path) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| FmlError::TableLoad {
            path: origin.to_path_buf(),
            cause: e.to_string(),
        })
    }

    /// Parse the JSON form.
    pub fn from_json(content: &str, origin: &Path) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| FmlError::TableLoad {
            path: origin.to_path_buf(),
            cause: e.to_string(),
        })
    }

    /// Parse the classic text form. The result has base 0 and absolute
    /// numbers, since `*base` may change part way through a file.
    pub fn parse_text(content: &str) -> Result<Self> {
        let mut base: u32 = 0;
        let mut fields = Vec::new();

        for (idx, raw_line) in content.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('$') {
                continue;
            }

            if let Some(rest) = line.strip_prefix("*base") {
                base = rest.trim().parse().map_err(|_| FmlError::TextParse {
                    line: line_no,
                    cause: format!("invalid base '{}'", rest.trim()),
                })?;
                continue;
            }

            let mut parts = line.split_whitespace();
            let (Some(name), Some(number), Some(keyword)) = (parts.next(), parts.next(), parts.next())
            else {
                return Err(FmlError::TextParse {
                    line: line_no,
                    cause: "expected '<name> <number> <type>'".to_string(),
                });
            };

            let number: u32 = number.parse().map_err(|_| FmlError::TextParse {
                line: line_no,
                cause: format!("invalid field number '{}'", number),
            })?;
            let field_type = FieldType::from_keyword(keyword).ok_or_else(|| FmlError::TextParse {
                line: line_no,
                cause: format!("unknown field type '{}'", keyword),
            })?;

            // Remaining tokens: an optional flag column, then a comment.
            let rest: Vec<&str> = parts.collect();
            let comment = match rest.as_slice() {
                [] | [_] => None,
                [_, words @ ..] => Some(words.join(" ")),
            };

            let absolute = base.checked_add(number).ok_or_else(|| FmlError::TextParse {
                line: line_no,
                cause: "field number overflows".to_string(),
            })?;
            fields.push(FieldDef {
                name: name.to_string(),
                number: absolute,
                field_type,
                comment,
            });
        }

        Ok(Self { base: 0, fields })
    }
}

/// A table together with where it came from, for diagnostics.
#[derive(Debug, Clone)]
pub(crate) struct TableSource {
    pub origin: PathBuf,
    pub table: FieldTable,
}
