//! Address helpers for spreadsheet-style A1 references.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Widest sheet accepted by Excel (XFD).
pub const MAX_COLUMN_COUNT: u32 = 16_384;

/// Errors that can occur when parsing addresses
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("Invalid column: {0}")]
    InvalidColumn(String),
    #[error("Invalid row: {0}")]
    InvalidRow(String),
}

/// A zero-based cell address (row 0 is the first data row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellAddress {
    pub row: u32,
    pub col: u32,
}

impl CellAddress {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Parse from A1 notation, tolerating `$` anchors (e.g. "A1", "$B$2").
    pub fn from_a1(s: &str) -> Result<Self, AddressError> {
        let trimmed = s.trim();
        let body = trimmed.strip_prefix('$').unwrap_or(trimmed);
        let split = body
            .find(|ch: char| !ch.is_ascii_alphabetic())
            .ok_or_else(|| AddressError::InvalidRow(trimmed.to_string()))?;
        let (letters, rest) = body.split_at(split);
        if letters.is_empty() {
            return Err(AddressError::InvalidColumn(trimmed.to_string()));
        }
        let digits = rest.strip_prefix('$').unwrap_or(rest);
        if digits.is_empty() || !digits.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(AddressError::InvalidRow(trimmed.to_string()));
        }
        let row: u32 = digits
            .parse()
            .map_err(|_| AddressError::InvalidRow(trimmed.to_string()))?;
        if row == 0 {
            return Err(AddressError::InvalidRow(trimmed.to_string()));
        }
        Ok(Self {
            row: row - 1,
            col: column_letter_to_index(letters)?,
        })
    }

    /// Convert to A1 notation
    pub fn to_a1(&self) -> String {
        format!("{}{}", column_index_to_letter(self.col), self.row + 1)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1())
    }
}

/// Convert a zero-based column index to letters (0 -> "A", 27 -> "AB").
pub fn column_index_to_letter(index: u32) -> String {
    let mut letters = Vec::new();
    let mut index = index + 1;
    while index > 0 {
        let rem = ((index - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        index = (index - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Convert column letters to a zero-based index ("A" -> 0, "ab" -> 27).
pub fn column_letter_to_index(letters: &str) -> Result<u32, AddressError> {
    let letters = letters.trim().trim_start_matches('$');
    if letters.is_empty() {
        return Err(AddressError::InvalidColumn(letters.to_string()));
    }
    let mut result: u32 = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return Err(AddressError::InvalidColumn(letters.to_string()));
        }
        let value = u32::from(ch.to_ascii_uppercase() as u8 - b'A' + 1);
        result = result
            .checked_mul(26)
            .and_then(|v| v.checked_add(value))
            .ok_or_else(|| AddressError::InvalidColumn(letters.to_string()))?;
    }
    if result > MAX_COLUMN_COUNT {
        return Err(AddressError::InvalidColumn(letters.to_string()));
    }
    Ok(result - 1)
}

/// Quote a sheet name when it cannot appear bare in a formula.
pub fn sanitize_sheet_name(name: &str) -> String {
    if name
        .chars()
        .any(|c| c.is_whitespace() || !(c.is_ascii_alphanumeric() || c == '_' || c == '.'))
        || name.starts_with(|c: char| c.is_ascii_digit())
    {
        return format!("'{}'", name.replace('\'', "''"));
    }
    name.to_string()
}

/// Remove surrounding single quotes and unescape doubled quotes.
pub fn desanitize_sheet_name(name: &str) -> String {
    let trimmed = name.strip_prefix('\'').unwrap_or(name);
    let trimmed = trimmed.strip_suffix('\'').unwrap_or(trimmed);
    trimmed.replace("''", "'")
}
