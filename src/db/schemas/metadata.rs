//! Timestamps shared by every stored document

use bson::DateTime;
use serde::{Deserialize, Serialize};

/// `createdAt` / `updatedAt` pair, stamped by the collection on insert
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
}

impl Metadata {
    pub fn new() -> Self {
        let now = DateTime::now();
        Self {
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    /// Bump `updatedAt`
    pub fn touch(&mut self) {
        self.updated_at = Some(DateTime::now());
    }
}
