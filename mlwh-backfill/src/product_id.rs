//! Deterministic product identifiers for PacBio entities.
//!
//! An identifier is the SHA-256 digest of the compact JSON rendering of a
//! [`PacBioEntity`]. Keys are written in declaration order, `tags` is omitted
//! when absent and DEL or any non-ASCII character is escaped as `\uXXXX`, so the
//! digest depends on nothing but the three input values.

use std::io;

use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{field} must be a non-empty string")]
    EmptyField { field: &'static str },
    #[error("failed to serialize entity: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PacBioEntity<'a> {
    run_name: &'a str,
    well_label: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tags: Option<&'a str>,
}

impl<'a> PacBioEntity<'a> {
    /// # Errors
    /// Returns [`Error::EmptyField`] if `run_name` or `well_label` is blank
    pub fn new(run_name: &'a str, well_label: &'a str, tags: Option<&'a str>) -> Result<Self> {
        if run_name.trim().is_empty() {
            return Err(Error::EmptyField { field: "run_name" });
        }

        if well_label.trim().is_empty() {
            return Err(Error::EmptyField { field: "well_label" });
        }

        Ok(Self {
            run_name,
            well_label,
            tags: tags.filter(|t| !t.is_empty()),
        })
    }

    /// # Errors
    pub fn hash_product_id(&self) -> Result<String> {
        let mut json = Vec::new();
        let mut serializer = serde_json::Serializer::with_formatter(&mut json, AsciiFormatter);
        self.serialize(&mut serializer)?;

        Ok(hex::encode(Sha256::digest(&json)))
    }
}

/// Joins the non-empty tag sequences of a product with a comma. A product
/// without tags has no descriptor at all, never an empty string.
#[must_use]
pub fn combine_tags(tag_sequence: Option<&str>, tag2_sequence: Option<&str>) -> Option<String> {
    let tags: Vec<&str> = [tag_sequence, tag2_sequence]
        .into_iter()
        .flatten()
        .filter(|t| !t.is_empty())
        .collect();

    if tags.is_empty() {
        None
    } else {
        Some(tags.join(","))
    }
}

/// Compact JSON formatter that escapes DEL and everything outside ASCII.
struct AsciiFormatter;

impl serde_json::ser::Formatter for AsciiFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if fragment.bytes().all(|b| b < 0x7f) {
            return writer.write_all(fragment.as_bytes());
        }

        let mut utf16 = [0; 2];
        for c in fragment.chars() {
            if c < '\u{7f}' {
                writer.write_all(&[c as u8])?;
                continue;
            }

            for unit in c.encode_utf16(&mut utf16) {
                write!(writer, "\\u{unit:04x}")?;
            }
        }

        Ok(())
    }
}
