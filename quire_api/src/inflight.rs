//! Per-kind serialization of mutating submissions.
//!
//! Uploads, share grants and comment posts carry no idempotency key, so a
//! duplicate submission creates a duplicate record. The gates reject a second
//! submission of the same kind while one is outstanding; unrelated kinds
//! proceed concurrently.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::ApiError;

/// The kinds of mutation that are serialized independently
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// Uploading a document
    Upload,
    /// Creating or revoking a share
    Share,
    /// Posting a comment
    Comment,
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MutationKind::Upload => write!(f, "upload"),
            MutationKind::Share => write!(f, "share operation"),
            MutationKind::Comment => write!(f, "comment submission"),
        }
    }
}

/// One slot per mutation kind. Cloning shares the slots.
#[derive(Debug, Clone, Default)]
pub struct MutationGates {
    upload: Arc<Mutex<()>>,
    share: Arc<Mutex<()>>,
    comment: Arc<Mutex<()>>,
}

impl MutationGates {
    /// Claim the slot for a mutation, failing fast if it is already held.
    /// The claim lasts until the returned guard is dropped.
    pub fn begin(&self, kind: MutationKind) -> Result<OwnedMutexGuard<()>, ApiError> {
        let slot = match kind {
            MutationKind::Upload => &self.upload,
            MutationKind::Share => &self.share,
            MutationKind::Comment => &self.comment,
        };
        slot.clone()
            .try_lock_owned()
            .map_err(|_| ApiError::Busy(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_claim_of_same_kind_is_rejected() {
        let gates = MutationGates::default();
        let held = gates.begin(MutationKind::Upload).unwrap();

        match gates.begin(MutationKind::Upload) {
            Err(ApiError::Busy(MutationKind::Upload)) => {}
            other => panic!("expected busy, got {:?}", other.map(|_| ())),
        }

        drop(held);
        gates.begin(MutationKind::Upload).unwrap();
    }

    #[tokio::test]
    async fn unrelated_kinds_run_concurrently() {
        let gates = MutationGates::default();
        let _upload = gates.begin(MutationKind::Upload).unwrap();
        let _share = gates.begin(MutationKind::Share).unwrap();
        let _comment = gates.begin(MutationKind::Comment).unwrap();
    }

    #[tokio::test]
    async fn clones_share_the_same_slots() {
        let gates = MutationGates::default();
        let clone = gates.clone();
        let _held = gates.begin(MutationKind::Comment).unwrap();
        assert!(matches!(
            clone.begin(MutationKind::Comment),
            Err(ApiError::Busy(_))
        ));
    }
}
