use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Encoding table error at line {line}: {message}")]
    TableLoad { line: usize, message: String },

    #[error("Unknown byte sequence at offset {offset:#x}: {byte:02X}")]
    UnknownByteSequence { offset: usize, byte: u8 },

    #[error("Token cannot be encoded with this table: {0}")]
    UnencodableToken(String),

    #[error("Pointer at {pointer:#x} resolves outside the image: {target:#x}")]
    PointerOutOfRange { pointer: usize, target: i64 },

    #[error("No free range of {needed} bytes available for record {record}")]
    InsufficientSpace { record: String, needed: usize },

    #[error("Write to {start:#x}..{end:#x} overlaps protected region {region}")]
    ProtectedRegionViolation {
        start: usize,
        end: usize,
        region: String,
    },

    #[error("Structural validation failed: {0}")]
    StructuralValidation(String),

    #[error("Patch offset {offset:#x} exceeds the {bits}-bit address width")]
    PatchAddressOverflow { offset: usize, bits: u32 },

    #[error("Invalid patch: {0}")]
    InvalidPatch(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Import error: {0}")]
    Import(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is a "file not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }

    /// Errors that fail a single record without affecting its siblings.
    pub fn is_per_record(&self) -> bool {
        matches!(
            self,
            Error::UnknownByteSequence { .. }
                | Error::UnencodableToken(_)
                | Error::InsufficientSpace { .. }
        )
    }

    /// Errors that abort a reinjection run and force a rollback.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ProtectedRegionViolation { .. }
                | Error::StructuralValidation(_)
                | Error::PointerOutOfRange { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_not_found() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::Io(io_err);
        assert!(err.is_not_found());

        let other_io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err2 = Error::Io(other_io_err);
        assert!(!err2.is_not_found());
    }

    #[test]
    fn test_error_classification() {
        let unencodable = Error::UnencodableToken("é".to_string());
        assert!(unencodable.is_per_record());
        assert!(!unencodable.is_fatal());

        let protected = Error::ProtectedRegionViolation {
            start: 0x10,
            end: 0x20,
            region: "0x0000..0x0018".to_string(),
        };
        assert!(protected.is_fatal());
        assert!(!protected.is_per_record());
    }

    #[test]
    fn test_error_messages_use_hex_offsets() {
        let err = Error::PatchAddressOverflow {
            offset: 0x1000000,
            bits: 24,
        };
        assert_eq!(
            err.to_string(),
            "Patch offset 0x1000000 exceeds the 24-bit address width"
        );
    }
}
