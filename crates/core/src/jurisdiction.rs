//! Electoral jurisdiction of a proxy or request.
//!
//! Rows store `commune_id` and `consulate_id` as two nullable columns; this
//! module is the single place that turns them into a typed value and rejects
//! rows carrying both.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

/// Where a vote is cast: a domestic commune or a consulate abroad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Jurisdiction {
    Commune(DbId),
    Consulate(DbId),
}

impl Jurisdiction {
    /// Build a jurisdiction from the two nullable columns.
    ///
    /// Returns `Ok(None)` when neither is set (only legal for invited
    /// proxies) and a validation error when both are.
    pub fn from_parts(
        commune_id: Option<DbId>,
        consulate_id: Option<DbId>,
    ) -> Result<Option<Self>, CoreError> {
        match (commune_id, consulate_id) {
            (Some(_), Some(_)) => Err(CoreError::Validation(
                "A commune and a consulate cannot both be set".to_string(),
            )),
            (Some(id), None) => Ok(Some(Jurisdiction::Commune(id))),
            (None, Some(id)) => Ok(Some(Jurisdiction::Consulate(id))),
            (None, None) => Ok(None),
        }
    }

    /// Like [`from_parts`](Self::from_parts) but requires exactly one.
    pub fn require(
        commune_id: Option<DbId>,
        consulate_id: Option<DbId>,
    ) -> Result<Self, CoreError> {
        Self::from_parts(commune_id, consulate_id)?.ok_or_else(|| {
            CoreError::Validation("Either a commune or a consulate is required".to_string())
        })
    }

    pub fn commune_id(self) -> Option<DbId> {
        match self {
            Jurisdiction::Commune(id) => Some(id),
            Jurisdiction::Consulate(_) => None,
        }
    }

    pub fn consulate_id(self) -> Option<DbId> {
        match self {
            Jurisdiction::Consulate(id) => Some(id),
            Jurisdiction::Commune(_) => None,
        }
    }

    /// Split back into the `(commune_id, consulate_id)` column pair.
    pub fn into_parts(self) -> (Option<DbId>, Option<DbId>) {
        (self.commune_id(), self.consulate_id())
    }
}
