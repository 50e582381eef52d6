//! Audit trail shared by every persisted row.

use chrono::{DateTime, Utc};
use common::UserId;
use serde::{Deserialize, Serialize};

/// Who created, last updated and soft-deleted a record, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
    pub created_at: DateTime<Utc>,
    pub created_by: UserId,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<UserId>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<UserId>,
}

impl Audit {
    /// Starts an audit trail for a record created now by `actor`.
    pub fn created_by(actor: UserId) -> Self {
        Self {
            created_at: Utc::now(),
            created_by: actor,
            updated_at: None,
            updated_by: None,
            deleted_at: None,
            deleted_by: None,
        }
    }

    /// Records an update by `actor`.
    pub fn touch(&mut self, actor: UserId) {
        self.updated_at = Some(Utc::now());
        self.updated_by = Some(actor);
    }

    /// Records a soft deletion by `actor`.
    pub fn mark_deleted(&mut self, actor: UserId) {
        self.deleted_at = Some(Utc::now());
        self.deleted_by = Some(actor);
    }

    /// A record counts as deleted only when both the timestamp and the actor are set.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some() && self.deleted_by.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_audit_is_not_deleted() {
        let audit = Audit::created_by(UserId::new());
        assert!(!audit.is_deleted());
        assert!(audit.updated_at.is_none());
    }

    #[test]
    fn deletion_needs_both_timestamp_and_actor() {
        let actor = UserId::new();
        let mut audit = Audit::created_by(actor);

        audit.deleted_at = Some(Utc::now());
        assert!(!audit.is_deleted());

        audit.deleted_at = None;
        audit.deleted_by = Some(actor);
        assert!(!audit.is_deleted());

        audit.mark_deleted(actor);
        assert!(audit.is_deleted());
    }

    #[test]
    fn touch_records_actor() {
        let creator = UserId::new();
        let editor = UserId::new();
        let mut audit = Audit::created_by(creator);
        audit.touch(editor);
        assert_eq!(audit.updated_by, Some(editor));
        assert!(audit.updated_at.is_some());
        assert_eq!(audit.created_by, creator);
    }
}
