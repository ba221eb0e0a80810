//! Request merging.
//!
//! At most one request per shadow sits in the queue. When a new request
//! arrives for a key that already has one, the merger decides what the
//! queue should hold afterwards:
//!
//! - Same-side successive requests collapse to the newest; documents are
//!   cumulative via their version numbers.
//! - Opposite-side requests signal a divergence the merger cannot resolve
//!   locally; they promote to a full reconcile.
//! - A pending full-sync request already subsumes everything else.
//!
//! The merger is a pure function over variant tags; direction filtering
//! happens in the handler before a request is ever enqueued.

use crate::request::SyncRequest;

/// What the queue should hold for a key after merging.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// Keep the existing request; the incoming one is dropped.
    Keep,
    /// Replace the existing request in place.
    Replace(SyncRequest),
}

/// Collapses `incoming` against the already queued `existing` request for
/// the same shadow.
pub fn merge(existing: &SyncRequest, incoming: SyncRequest) -> MergeOutcome {
    debug_assert_eq!(existing.key(), incoming.key(), "merging across shadows");

    // A queued full sync already covers any later request.
    if existing.kind().is_full_sync() {
        return MergeOutcome::Keep;
    }

    // An incoming full sync supersedes whatever is pending.
    if incoming.kind().is_full_sync() {
        return MergeOutcome::Replace(incoming);
    }

    let same_side = existing.kind().is_device_bound() == incoming.kind().is_device_bound();
    if !same_side {
        // Local and cloud edits raced; only a three-way compare can decide.
        return MergeOutcome::Replace(SyncRequest::FullShadow {
            key: existing.key().clone(),
        });
    }

    match (existing, &incoming) {
        // A delete already queued makes a second delete redundant.
        (SyncRequest::LocalDelete { .. }, SyncRequest::LocalDelete { .. })
        | (SyncRequest::CloudDelete { .. }, SyncRequest::CloudDelete { .. }) => MergeOutcome::Keep,
        // Otherwise the newest same-side request wins.
        _ => MergeOutcome::Replace(incoming),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestKind;
    use serde_json::json;
    use shadowsync_document::ShadowKey;

    fn key() -> ShadowKey {
        ShadowKey::new("t1", "s")
    }

    fn request(kind: RequestKind) -> SyncRequest {
        match kind {
            RequestKind::LocalUpdate => SyncRequest::LocalUpdate {
                key: key(),
                document: vec![0x7b],
            },
            RequestKind::LocalDelete => SyncRequest::LocalDelete {
                key: key(),
                payload: vec![0x7b],
            },
            RequestKind::CloudUpdate => SyncRequest::CloudUpdate {
                key: key(),
                document: json!({"state": {}}),
            },
            RequestKind::CloudDelete => SyncRequest::CloudDelete { key: key() },
            RequestKind::FullShadow => SyncRequest::FullShadow { key: key() },
            RequestKind::OverwriteLocal => SyncRequest::OverwriteLocal { key: key() },
            RequestKind::OverwriteCloud => SyncRequest::OverwriteCloud { key: key() },
        }
    }

    /// Expected outcome per the merge table: `Some(kind)` means replace
    /// with that kind, `None` means keep the existing request.
    fn expected(existing: RequestKind, incoming: RequestKind) -> Option<RequestKind> {
        use RequestKind::*;
        if existing.is_full_sync() {
            return None;
        }
        if incoming.is_full_sync() {
            return Some(incoming);
        }
        match (existing, incoming) {
            (LocalUpdate, LocalUpdate) => Some(LocalUpdate),
            (LocalUpdate, LocalDelete) => Some(LocalDelete),
            (LocalDelete, LocalUpdate) => Some(LocalUpdate),
            (LocalDelete, LocalDelete) => None,
            (CloudUpdate, CloudUpdate) => Some(CloudUpdate),
            (CloudUpdate, CloudDelete) => Some(CloudDelete),
            (CloudDelete, CloudUpdate) => Some(CloudUpdate),
            (CloudDelete, CloudDelete) => None,
            // Opposite sides promote to a full reconcile.
            _ => Some(FullShadow),
        }
    }

    #[test]
    fn merge_matches_the_table_for_all_pairs() {
        use RequestKind::*;
        let kinds = [
            LocalUpdate,
            LocalDelete,
            CloudUpdate,
            CloudDelete,
            FullShadow,
            OverwriteLocal,
            OverwriteCloud,
        ];

        for existing_kind in kinds {
            for incoming_kind in kinds {
                let outcome = merge(&request(existing_kind), request(incoming_kind));
                match expected(existing_kind, incoming_kind) {
                    None => assert_eq!(
                        outcome,
                        MergeOutcome::Keep,
                        "({existing_kind}, {incoming_kind})"
                    ),
                    Some(replacement) => match outcome {
                        MergeOutcome::Replace(request) => assert_eq!(
                            request.kind(),
                            replacement,
                            "({existing_kind}, {incoming_kind})"
                        ),
                        MergeOutcome::Keep => {
                            panic!("({existing_kind}, {incoming_kind}) expected replace")
                        }
                    },
                }
            }
        }
    }

    #[test]
    fn newest_same_side_update_wins_with_its_payload() {
        let older = SyncRequest::CloudUpdate {
            key: key(),
            document: json!({"state": {"reported": {"x": 1}}}),
        };
        let newer = SyncRequest::CloudUpdate {
            key: key(),
            document: json!({"state": {"reported": {"x": 2}}}),
        };

        match merge(&older, newer.clone()) {
            MergeOutcome::Replace(request) => assert_eq!(request, newer),
            MergeOutcome::Keep => panic!("expected replace"),
        }
    }

    #[test]
    fn conflict_promotion_keeps_the_key() {
        let existing = request(RequestKind::LocalUpdate);
        match merge(&existing, request(RequestKind::CloudUpdate)) {
            MergeOutcome::Replace(request) => {
                assert_eq!(request.kind(), RequestKind::FullShadow);
                assert_eq!(request.key(), &key());
            }
            MergeOutcome::Keep => panic!("expected promotion"),
        }
    }
}
