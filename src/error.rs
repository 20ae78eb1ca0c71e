use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("input file not found or unreadable: {0}")]
    IoMissing(String),

    #[error("region-info format mismatch: expected version {expected}, found {found}")]
    FormatMismatch { expected: u8, found: u8 },

    #[error("invalid geometry for object {0}")]
    GeometryInvalid(String),

    #[error("duplicate id observed while serializing: {0}")]
    DuplicateId(String),

    #[error("internal invariant violated: {0}")]
    Internal(String),
}
