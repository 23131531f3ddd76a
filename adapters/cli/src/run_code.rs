//! Single-line run codes for sharing a saved run.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use pathforge_world::RunRecord;

const CODE_DOMAIN: &str = "pathforge";
const CODE_VERSION: &str = "v1";

/// Prefix emitted before the grid dimensions and payload.
pub(crate) const CODE_HEADER: &str = "pathforge:v1";
const FIELD_DELIMITER: char = ':';

/// Errors raised while encoding or decoding run codes.
#[derive(Debug, thiserror::Error)]
pub(crate) enum RunCodeError {
    /// The provided string was empty or contained only whitespace.
    #[error("run code was empty")]
    Empty,
    /// A mandatory segment was missing.
    #[error("run code is missing the {0}")]
    Missing(&'static str),
    /// The code used an unexpected prefix segment.
    #[error("run code prefix '{0}' is not supported")]
    InvalidPrefix(String),
    /// The code used an unsupported version identifier.
    #[error("run code version '{0}' is not supported")]
    UnsupportedVersion(String),
    /// The grid dimensions could not be parsed.
    #[error("could not parse grid dimensions '{0}'")]
    InvalidDimensions(String),
    /// The dimensions segment disagrees with the embedded grid.
    #[error("run code declares {declared} but carries a {columns}x{rows} grid")]
    DimensionMismatch {
        /// Dimensions segment as written.
        declared: String,
        /// Columns of the embedded grid.
        columns: u32,
        /// Rows of the embedded grid.
        rows: u32,
    },
    /// The base64 payload could not be decoded.
    #[error("could not decode run payload: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),
    /// The payload is not a run record.
    #[error("could not parse run payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// Encodes a record as `pathforge:v1:{cols}x{rows}:{payload}`.
pub(crate) fn encode(record: &RunRecord) -> Result<String, RunCodeError> {
    let json = serde_json::to_vec(record)?;
    let encoded = STANDARD_NO_PAD.encode(json);
    Ok(format!(
        "{CODE_HEADER}:{}x{}:{encoded}",
        record.grid.cols, record.grid.rows
    ))
}

/// Decodes a record from its run code.
pub(crate) fn decode(value: &str) -> Result<RunRecord, RunCodeError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RunCodeError::Empty);
    }

    let mut parts = trimmed.splitn(4, FIELD_DELIMITER);
    let domain = parts.next().ok_or(RunCodeError::Missing("prefix"))?;
    let version = parts.next().ok_or(RunCodeError::Missing("version"))?;
    let dimensions = parts.next().ok_or(RunCodeError::Missing("grid dimensions"))?;
    let payload = parts.next().ok_or(RunCodeError::Missing("payload"))?;

    if domain != CODE_DOMAIN {
        return Err(RunCodeError::InvalidPrefix(domain.to_owned()));
    }
    if version != CODE_VERSION {
        return Err(RunCodeError::UnsupportedVersion(version.to_owned()));
    }

    let (columns, rows) = parse_dimensions(dimensions)?;
    let bytes = STANDARD_NO_PAD.decode(payload.as_bytes())?;
    let record: RunRecord = serde_json::from_slice(&bytes)?;
    if record.grid.cols != columns || record.grid.rows != rows {
        return Err(RunCodeError::DimensionMismatch {
            declared: dimensions.to_owned(),
            columns: record.grid.cols,
            rows: record.grid.rows,
        });
    }
    Ok(record)
}

fn parse_dimensions(dimensions: &str) -> Result<(u32, u32), RunCodeError> {
    let invalid = || RunCodeError::InvalidDimensions(dimensions.to_owned());
    let (columns, rows) = dimensions.split_once(['x', 'X']).ok_or_else(invalid)?;
    let columns = columns.trim().parse::<u32>().map_err(|_| invalid())?;
    let rows = rows.trim().parse::<u32>().map_err(|_| invalid())?;
    if columns == 0 || rows == 0 {
        return Err(invalid());
    }
    Ok((columns, rows))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use pathforge_core::GameTables;
    use pathforge_world::{GridConfig, World};

    fn record() -> RunRecord {
        let world = World::generate(
            Arc::new(GameTables::default()),
            &GridConfig {
                columns: 14,
                rows: 8,
                seed: 21,
                ..GridConfig::default()
            },
        );
        RunRecord::capture(&world)
    }

    #[test]
    fn codes_carry_header_and_dimensions() {
        let code = encode(&record()).expect("encodes");

        assert!(code.starts_with(&format!("{CODE_HEADER}:14x8:")));
        assert!(!code.ends_with('='));
    }

    #[test]
    fn decoding_recovers_the_record() {
        let original = record();
        let decoded = decode(&format!("  {}\n", encode(&original).expect("encodes")))
            .expect("decodes");
        assert_eq!(decoded, original);
    }

    #[test]
    fn foreign_prefixes_and_versions_are_rejected() {
        assert!(matches!(
            decode("tower:v1:4x4:e30"),
            Err(RunCodeError::InvalidPrefix(prefix)) if prefix == "tower"
        ));
        assert!(matches!(
            decode("pathforge:v9:4x4:e30"),
            Err(RunCodeError::UnsupportedVersion(version)) if version == "v9"
        ));
    }

    #[test]
    fn malformed_segments_are_reported() {
        assert!(matches!(decode("   "), Err(RunCodeError::Empty)));
        assert!(matches!(
            decode("pathforge:v1:4x4"),
            Err(RunCodeError::Missing("payload"))
        ));
        assert!(matches!(
            decode("pathforge:v1:0x4:e30"),
            Err(RunCodeError::InvalidDimensions(_))
        ));
        assert!(matches!(
            decode("pathforge:v1:4x4:!!"),
            Err(RunCodeError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn dimension_segment_must_match_the_grid() {
        let code = encode(&record()).expect("encodes");
        let tampered = code.replacen(":14x8:", ":15x8:", 1);

        assert!(matches!(
            decode(&tampered),
            Err(RunCodeError::DimensionMismatch { columns: 14, rows: 8, .. })
        ));
    }
}
