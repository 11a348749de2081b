//! Shared types for VideoTube

pub mod error;

pub use error::{AppError, ErrorKind, Result};

use bson::oid::ObjectId;

/// Parse a caller-supplied entity id
///
/// Blank or malformed ids are rejected with `InvalidArgument` before any
/// database access happens.
pub fn parse_object_id(raw: &str, what: &str) -> Result<ObjectId> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidArgument(format!("Invalid {} id", what)));
    }
    ObjectId::parse_str(trimmed)
        .map_err(|_| AppError::InvalidArgument(format!("Invalid {} id", what)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object_id() {
        let id = ObjectId::new();
        assert_eq!(parse_object_id(&id.to_hex(), "video").unwrap(), id);
        assert_eq!(
            parse_object_id(&format!("  {}  ", id.to_hex()), "video").unwrap(),
            id
        );

        assert!(matches!(
            parse_object_id("", "video"),
            Err(AppError::InvalidArgument(_))
        ));
        assert!(matches!(
            parse_object_id("   ", "video"),
            Err(AppError::InvalidArgument(_))
        ));
        assert!(matches!(
            parse_object_id("not-an-id", "video"),
            Err(AppError::InvalidArgument(_))
        ));
    }
}
