//! Structure read/write error types

use core::fmt;

/// Errors raised while reading or writing a structured record
#[derive(Debug, Clone, PartialEq)]
pub enum StructError {
    /// Ran out of bytes in the middle of a field
    UnexpectedEof,
    /// A list length prefix claims more elements than the stream holds
    InvalidLength { field: &'static str, length: u64 },
    /// A fixed-length list does not have the declared number of elements
    FixedLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    /// A list is too long for its length prefix
    LengthOverflow { field: &'static str, length: usize },
    /// Raised by a custom read/write hook
    Custom(String),
    /// Failure while reading a field, with the structure and field that failed
    Read {
        structure: &'static str,
        field: &'static str,
        source: Box<StructError>,
    },
    /// Failure while writing a field, with the structure and field that failed
    Write {
        structure: &'static str,
        field: &'static str,
        source: Box<StructError>,
    },
    /// IO error from the underlying stream
    IoError(String),
}

impl fmt::Display for StructError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructError::UnexpectedEof => write!(f, "Unexpected end of stream"),
            StructError::InvalidLength { field, length } => write!(
                f,
                "Invalid length {} in field '{}': not enough data in the stream",
                length, field
            ),
            StructError::FixedLength {
                field,
                expected,
                actual,
            } => write!(
                f,
                "Incorrect length in field '{}'. It uses a fixed length of {}, but the object being written has a length of {}.",
                field, expected, actual
            ),
            StructError::LengthOverflow { field, length } => write!(
                f,
                "Length {} of field '{}' does not fit in its length prefix",
                length, field
            ),
            StructError::Custom(message) => write!(f, "{}", message),
            StructError::Read {
                structure,
                field,
                source,
            } => write!(
                f,
                "Error while reading structure {} (field '{}'): {}",
                structure, field, source
            ),
            StructError::Write {
                structure,
                field,
                source,
            } => write!(
                f,
                "Error while writing structure {} (field '{}'): {}",
                structure, field, source
            ),
            StructError::IoError(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for StructError {}

impl From<std::io::Error> for StructError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            StructError::UnexpectedEof
        } else {
            StructError::IoError(e.to_string())
        }
    }
}

impl StructError {
    /// The innermost error, skipping the read/write context wrappers
    pub fn root_cause(&self) -> &StructError {
        match self {
            StructError::Read { source, .. } | StructError::Write { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            StructError::UnexpectedEof.to_string(),
            "Unexpected end of stream"
        );
        assert_eq!(
            StructError::FixedLength {
                field: "life",
                expected: 2,
                actual: 3
            }
            .to_string(),
            "Incorrect length in field 'life'. It uses a fixed length of 2, but the object being written has a length of 3."
        );
        let wrapped = StructError::Read {
            structure: "ResourceId",
            field: "group_id",
            source: Box::new(StructError::UnexpectedEof),
        };
        assert_eq!(
            wrapped.to_string(),
            "Error while reading structure ResourceId (field 'group_id'): Unexpected end of stream"
        );
    }

    #[test]
    fn test_root_cause() {
        let inner = StructError::Custom("bad flags".to_string());
        let wrapped = StructError::Write {
            structure: "Outer",
            field: "inner",
            source: Box::new(StructError::Write {
                structure: "Inner",
                field: "flags",
                source: Box::new(inner.clone()),
            }),
        };
        assert_eq!(wrapped.root_cause(), &inner);
    }

    #[test]
    fn test_from_io_eof() {
        let e = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert_eq!(StructError::from(e), StructError::UnexpectedEof);
    }
}
