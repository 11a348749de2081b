//! Ownership checks for owned documents

use bson::oid::ObjectId;

use crate::db::schemas::{PlaylistDoc, TweetDoc, VideoDoc};
use crate::types::{AppError, Result};

/// A document that belongs to exactly one user
pub trait Owned {
    /// Noun used in error messages
    const KIND: &'static str;

    fn owner(&self) -> ObjectId;
}

impl Owned for VideoDoc {
    const KIND: &'static str = "video";

    fn owner(&self) -> ObjectId {
        self.owner
    }
}

impl Owned for PlaylistDoc {
    const KIND: &'static str = "playlist";

    fn owner(&self) -> ObjectId {
        self.owner
    }
}

impl Owned for TweetDoc {
    const KIND: &'static str = "tweet";

    fn owner(&self) -> ObjectId {
        self.owner
    }
}

pub fn is_owner<T: Owned>(doc: &T, requester: ObjectId) -> bool {
    doc.owner() == requester
}

/// Fail with `Forbidden` unless `requester` owns `doc`
pub fn ensure_owner<T: Owned>(doc: &T, requester: ObjectId) -> Result<()> {
    if is_owner(doc, requester) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "You are not the owner of this {}",
            T::KIND
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_owner() {
        let owner = ObjectId::new();
        let tweet = TweetDoc::new(owner, "hello".into());

        assert!(ensure_owner(&tweet, owner).is_ok());
        let err = ensure_owner(&tweet, ObjectId::new()).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(ref m) if m.contains("tweet")));
    }
}
