// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;
use std::time::Duration;

use purgelog_core::{DocumentId, GENESIS, Identity, MAX_SEQ, ReplicationId, Roles};
use purgelog_store::checkpoints::CheckpointStore;
use purgelog_store::{MemoryStore, SqliteStore};

use crate::auth::memory::{MemoryDocumentIndex, StaticPermissions};
use crate::auth::{DocumentIndex, PermissionProvider};
use crate::config::Config;
use crate::error::{ClientInputError, LogQueryError, PurgeError};
use crate::purged::PurgedDocs;
use crate::service::PurgeService;
use crate::test_utils::{
    FailingDocumentIndex, FailingPermissions, ObservedStore, ScanCall, setup_logging,
};

type TestService<P = StaticPermissions, D = MemoryDocumentIndex> =
    PurgeService<P, D, ObservedStore<MemoryStore>>;

fn permissions() -> StaticPermissions {
    StaticPermissions::new()
        .grant("role1", ["district-1"])
        .grant("role2", ["district-2"])
        .grant("chw", ["district-1"])
}

async fn index() -> MemoryDocumentIndex {
    let index = MemoryDocumentIndex::new();
    index.insert("district-1", "a").await;
    index.insert("district-1", "b").await;
    index.insert("district-2", "c").await;
    index.insert("district-3", "hidden").await;
    index
}

fn service_with<P, D>(permissions: P, documents: D, config: Config) -> TestService<P, D>
where
    P: PermissionProvider,
    D: DocumentIndex,
{
    PurgeService::new(
        permissions,
        documents,
        ObservedStore::new(MemoryStore::new()),
        config,
    )
}

async fn service() -> TestService {
    service_with(permissions(), index().await, Config::default())
}

fn ids(values: &[&str]) -> Vec<DocumentId> {
    values.iter().map(|value| DocumentId::from(*value)).collect()
}

fn documents(values: &[&str]) -> BTreeSet<DocumentId> {
    values.iter().map(|value| DocumentId::from(*value)).collect()
}

#[tokio::test]
async fn fetch_queries_signature_from_genesis() {
    setup_logging();

    let service = service().await;
    let roles = Roles::from(["role1", "role2"]);
    service
        .record_purges(&[roles.clone()], &documents(&["a", "c", "hidden"]))
        .await
        .unwrap();

    let identity = Identity::new("mary", ["role1", "role2"]);
    let result = service
        .get_purged_docs(&identity, None, Some(77))
        .await
        .unwrap();
    assert_eq!(
        result,
        PurgedDocs {
            purged_ids: ids(&["a", "c"]),
            last_seq: 2,
        }
    );

    assert_eq!(
        service.store().scans(),
        vec![ScanCall {
            signature: roles.signature(),
            after: GENESIS,
            limit: Some(77),
        }]
    );
    assert_eq!(service.store().checkpoint_reads(), 0);
    assert_eq!(service.store().checkpoint_writes(), 0);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(
        json,
        serde_json::json!({ "purged_ids": ["a", "c"], "last_seq": 2 })
    );
}

#[tokio::test]
async fn checkpoint_stores_position() {
    let service = service().await;
    let identity = Identity::new("mary", ["role1", "role2"]);

    let ack = service
        .checkpoint(&identity, Some("localDbId"), Some("123"))
        .await
        .unwrap();
    assert!(ack.success);
    assert_eq!(
        serde_json::to_value(ack).unwrap(),
        serde_json::json!({ "success": true })
    );

    let stored = service
        .read_checkpoint(
            &Roles::from(["role2", "role1"]),
            &ReplicationId::new("localDbId").unwrap(),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.signature, Roles::from(["role1", "role2"]).signature());
    assert_eq!(stored.last_seq, 123);
}

#[tokio::test]
async fn checkpoint_requires_replication_id() {
    let service = service().await;
    let identity = Identity::new("mary", ["role1"]);

    for replication_id in [None, Some("")] {
        let err = service
            .checkpoint(&identity, replication_id, Some("5"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PurgeError::ClientInput(ClientInputError::MissingReplicationId)
        ));
        assert!(err.is_client_error());
        assert_eq!(
            err.to_string(),
            "missing required header purgelog-replication-id"
        );
    }

    assert_eq!(service.store().checkpoint_reads(), 0);
    assert_eq!(service.store().checkpoint_writes(), 0);
}

#[tokio::test]
async fn checkpoint_requires_seq() {
    let service = service().await;
    let identity = Identity::new("mary", ["role1"]);

    for seq in [None, Some(""), Some("  ")] {
        let err = service
            .checkpoint(&identity, Some("localDbId"), seq)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PurgeError::ClientInput(ClientInputError::MissingSeq)
        ));
        assert_eq!(err.to_string(), "missing required parameter seq");
    }

    let err = service
        .checkpoint(&identity, Some("localDbId"), Some("my-since-seq"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PurgeError::ClientInput(ClientInputError::InvalidSeq(ref value)) if value == "my-since-seq"
    ));
    assert_eq!(err.status_code(), 400);

    assert_eq!(service.store().checkpoint_writes(), 0);
}

#[tokio::test]
async fn checkpoint_rejects_unrepresentable_seq() {
    let identity = Identity::new("mary", ["chw"]);
    let too_large = (MAX_SEQ + 1).to_string();

    let memory = service().await;
    let sqlite = PurgeService::new(
        permissions(),
        index().await,
        SqliteStore::temporary().await,
        Config::default(),
    );

    for seq in [too_large.as_str(), "18446744073709551615"] {
        let err = memory
            .checkpoint(&identity, Some("phone-1"), Some(seq))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PurgeError::ClientInput(ClientInputError::InvalidSeq(ref value)) if value == seq
        ));
        assert_eq!(err.status_code(), 400);

        let err = sqlite
            .checkpoint(&identity, Some("phone-1"), Some(seq))
            .await
            .unwrap_err();
        assert!(err.is_client_error());
        assert_eq!(err.status_code(), 400);
    }
    assert_eq!(memory.store().checkpoint_writes(), 0);

    // The highest representable position is stored by both backends.
    let max = MAX_SEQ.to_string();
    memory
        .checkpoint(&identity, Some("phone-1"), Some(max.as_str()))
        .await
        .unwrap();
    sqlite
        .checkpoint(&identity, Some("phone-1"), Some(max.as_str()))
        .await
        .unwrap();
    let replication_id = ReplicationId::new("phone-1").unwrap();
    assert_eq!(
        sqlite
            .read_checkpoint(&identity.roles, &replication_id)
            .await
            .unwrap()
            .map(|checkpoint| checkpoint.last_seq),
        Some(MAX_SEQ)
    );
}

#[tokio::test]
async fn checkpoint_is_idempotent() {
    let service = service().await;
    let identity = Identity::new("mary", ["chw"]);
    let replication_id = ReplicationId::new("phone-1").unwrap();

    service
        .checkpoint(&identity, Some("phone-1"), Some("4"))
        .await
        .unwrap();
    let first = service
        .store()
        .inner()
        .get_checkpoint(&identity.signature(), &replication_id)
        .await
        .unwrap();

    service
        .checkpoint(&identity, Some("phone-1"), Some("4"))
        .await
        .unwrap();
    let second = service
        .store()
        .inner()
        .get_checkpoint(&identity.signature(), &replication_id)
        .await
        .unwrap();

    assert_eq!(first, Some(4));
    assert_eq!(first, second);
}

#[tokio::test]
async fn fetch_resumes_after_checkpoint() {
    let service = service().await;
    let chw = Roles::from(["chw"]);
    service
        .record_purges(&[chw.clone()], &documents(&["a"]))
        .await
        .unwrap();
    service
        .record_purges(&[chw.clone()], &documents(&["b"]))
        .await
        .unwrap();

    let identity = Identity::new("mary", ["chw"]);
    let first = service
        .get_purged_docs(&identity, Some("phone-1"), Some(1))
        .await
        .unwrap();
    assert_eq!(first.purged_ids, ids(&["a"]));

    service
        .checkpoint(&identity, Some("phone-1"), Some(first.last_seq.to_string().as_str()))
        .await
        .unwrap();

    let second = service
        .get_purged_docs(&identity, Some("phone-1"), None)
        .await
        .unwrap();
    assert_eq!(second.purged_ids, ids(&["b"]));
    assert!(second.last_seq > first.last_seq);

    // A replica without a checkpoint still reads everything.
    let other = service
        .get_purged_docs(&identity, Some("phone-2"), None)
        .await
        .unwrap();
    assert_eq!(other.purged_ids, ids(&["a", "b"]));

    // An empty replication id reads from the beginning as well.
    let empty = service
        .get_purged_docs(&identity, Some(""), None)
        .await
        .unwrap();
    assert_eq!(empty.purged_ids, ids(&["a", "b"]));
}

#[tokio::test]
async fn identical_role_sets_get_identical_results() {
    let service = service().await;
    service
        .record_purges(
            &[Roles::from(["role1", "role2"])],
            &documents(&["a", "b", "c"]),
        )
        .await
        .unwrap();
    service
        .checkpoint(
            &Identity::new("mary", ["role2", "role1"]),
            Some("shared"),
            Some("1"),
        )
        .await
        .unwrap();

    let mary = service
        .get_purged_docs(&Identity::new("mary", ["role1", "role2"]), Some("shared"), None)
        .await
        .unwrap();
    let john = service
        .get_purged_docs(&Identity::new("john", ["role2", "role1"]), Some("shared"), None)
        .await
        .unwrap();
    assert_eq!(mary, john);
    assert_eq!(mary.purged_ids, ids(&["b", "c"]));
}

#[tokio::test]
async fn chained_fetches_never_repeat() {
    let service = PurgeService::new(
        permissions(),
        index().await,
        SqliteStore::temporary().await,
        Config::new().scan_batch_size(2),
    );
    let identity = Identity::new("mary", ["role1", "role2"]);

    for batch in [vec!["a"], vec!["hidden", "b"], vec!["c"]] {
        service
            .record_purges(&[identity.roles.clone()], &documents(&batch))
            .await
            .unwrap();
    }

    let mut seen = Vec::new();
    loop {
        let result = service
            .get_purged_docs(&identity, Some("localDbId"), Some(1))
            .await
            .unwrap();
        if result.purged_ids.is_empty() {
            break;
        }
        seen.extend(result.purged_ids);
        service
            .checkpoint(&identity, Some("localDbId"), Some(result.last_seq.to_string().as_str()))
            .await
            .unwrap();
    }

    assert_eq!(seen, ids(&["a", "b", "c"]));
    assert_eq!(
        service.current_seq(&identity.roles).await.unwrap(),
        3
    );
}

#[tokio::test]
async fn limits() {
    let service = service_with(
        permissions(),
        index().await,
        Config::new().default_limit(Some(1)),
    );
    service
        .record_purges(&[Roles::from(["chw"])], &documents(&["a", "b"]))
        .await
        .unwrap();
    let identity = Identity::new("mary", ["chw"]);

    let result = service.get_purged_docs(&identity, None, None).await.unwrap();
    assert_eq!(result.purged_ids, ids(&["a"]));

    let result = service
        .get_purged_docs(&identity, None, Some(10))
        .await
        .unwrap();
    assert_eq!(result.purged_ids, ids(&["a", "b"]));

    let err = service
        .get_purged_docs(&identity, None, Some(0))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PurgeError::ClientInput(ClientInputError::InvalidLimit)
    ));
}

#[tokio::test]
async fn unconditional_documents_are_visible_to_everyone() {
    let service = service_with(
        permissions(),
        index().await,
        Config::new().unconditional_doc_id("settings"),
    );
    let nobody = Roles::new();
    service
        .record_purges(&[nobody.clone()], &documents(&["settings", "a"]))
        .await
        .unwrap();

    let result = service
        .get_purged_docs(&Identity::new("guest", nobody), None, None)
        .await
        .unwrap();
    assert_eq!(result.purged_ids, ids(&["settings"]));
}

#[tokio::test]
async fn authorization_failure_stops_the_request() {
    let service = service_with(FailingPermissions, index().await, Config::default());

    let err = service
        .get_purged_docs(&Identity::new("mary", ["chw"]), Some("phone-1"), None)
        .await
        .unwrap_err();
    assert!(err.is_permission_denied());
    assert_eq!(err.status_code(), 403);
    assert!(service.store().scans().is_empty());
    assert_eq!(service.store().checkpoint_reads(), 0);

    let err = service
        .get_purged_docs(&Identity::new("", ["chw"]), None, None)
        .await
        .unwrap_err();
    assert!(err.is_permission_denied());
}

#[tokio::test]
async fn resolution_failure_stops_the_request() {
    let service = service_with(permissions(), FailingDocumentIndex, Config::default());

    let err = service
        .get_purged_docs(&Identity::new("mary", ["chw"]), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, PurgeError::Resolution(_)));
    assert_eq!(err.status_code(), 500);
    assert!(service.store().scans().is_empty());
}

#[tokio::test]
async fn storage_failures_are_passed_through() {
    let service = service().await;
    let identity = Identity::new("mary", ["chw"]);

    service.store().fail_scans(true);
    let err = service
        .get_purged_docs(&identity, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, PurgeError::LogQuery(LogQueryError::Store(_))));
    assert!(!err.is_client_error());
    assert_eq!(service.store().checkpoint_writes(), 0);

    service.store().fail_checkpoints(true);
    let err = service
        .checkpoint(&identity, Some("phone-1"), Some("1"))
        .await
        .unwrap_err();
    assert!(matches!(err, PurgeError::CheckpointWrite(_)));
    assert_eq!(err.status_code(), 500);
}

#[tokio::test(start_paused = true)]
async fn slow_storage_fails_fast() {
    let service = service_with(
        permissions(),
        index().await,
        Config::new().store_timeout(Duration::from_secs(2)),
    );
    service.store().delay(Some(Duration::from_secs(30)));

    let err = service
        .get_purged_docs(&Identity::new("mary", ["chw"]), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, PurgeError::LogQuery(LogQueryError::Timeout(_))));
}

#[tokio::test]
async fn concurrent_requests() {
    let service = service().await;
    service
        .record_purges(&[Roles::from(["chw"])], &documents(&["a", "b"]))
        .await
        .unwrap();

    let identities: Vec<Identity> = (0..8)
        .map(|i| Identity::new(format!("user-{i}"), ["chw"]))
        .collect();
    let requests = identities.iter().enumerate().map(|(i, identity)| {
        let replication_id = format!("phone-{i}");
        let service = &service;
        async move {
            let purged = service
                .get_purged_docs(identity, Some(replication_id.as_str()), None)
                .await?;
            service
                .checkpoint(
                    identity,
                    Some(replication_id.as_str()),
                    Some(purged.last_seq.to_string().as_str()),
                )
                .await?;
            Ok::<_, PurgeError>(purged)
        }
    });

    let results = futures_util::future::join_all(requests).await;
    for result in results {
        assert_eq!(result.unwrap().purged_ids, ids(&["a", "b"]));
    }
    assert_eq!(service.store().checkpoint_writes(), 8);
}
