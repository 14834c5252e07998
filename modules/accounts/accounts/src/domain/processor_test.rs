use std::sync::Arc;

use accounts_sdk::{
    Account, ExternalPeer, Platform, RbacPolicy, ReplicationPolicy, SubleaseToken,
};
use secrecy::SecretString;

use crate::config::{DeletionConfig, DeletionMode};
use crate::domain::drivers::{FederationDriver, PeerAccount, PeerClient, StorageDriver};
use crate::domain::error::{DeletionProgress, DomainError};
use crate::domain::events::{AuditAction, AuditSink, PolicyKind};
use crate::domain::processor::{AccountProcessor, AccountSpec};
use crate::domain::repo::AccountRepository;
use crate::infra::federation::InMemoryFederationDriver;
use crate::infra::objectstore::InMemoryStorageDriver;
use crate::testutils::{CollectingAuditSink, InMemoryAccountRepository, StaticPeerClient};

struct Harness {
    repo: Arc<InMemoryAccountRepository>,
    federation: Arc<InMemoryFederationDriver>,
    storage: Arc<InMemoryStorageDriver>,
    peers: Arc<StaticPeerClient>,
    audit: Arc<CollectingAuditSink>,
    processor: AccountProcessor<InMemoryAccountRepository>,
}

fn harness_with(deletion: DeletionConfig) -> Harness {
    let repo = Arc::new(InMemoryAccountRepository::default());
    let federation = Arc::new(InMemoryFederationDriver::default());
    let storage = Arc::new(InMemoryStorageDriver::default());
    let peers = Arc::new(StaticPeerClient::default());
    let audit = Arc::new(CollectingAuditSink::default());
    let processor = AccountProcessor::new(
        Arc::clone(&repo),
        Arc::clone(&federation) as Arc<dyn FederationDriver>,
        Arc::clone(&storage) as Arc<dyn StorageDriver>,
        Arc::clone(&peers) as Arc<dyn PeerClient>,
        Arc::clone(&audit) as Arc<dyn AuditSink>,
        deletion,
        "registry.example.org".to_owned(),
    );
    Harness {
        repo,
        federation,
        storage,
        peers,
        audit,
        processor,
    }
}

fn harness() -> Harness {
    harness_with(DeletionConfig::default())
}

fn spec(name: &str, tenant: &str) -> AccountSpec {
    AccountSpec {
        name: name.to_owned(),
        auth_tenant_id: tenant.to_owned(),
        ..AccountSpec::default()
    }
}

fn no_token() -> Result<SubleaseToken, DomainError> {
    Ok(SubleaseToken::default())
}

fn no_finalize(_: &Account, _: Option<&Account>) -> Result<(), DomainError> {
    Ok(())
}

async fn put(h: &Harness, spec: AccountSpec) -> Result<Account, DomainError> {
    h.processor
        .create_or_update(spec, Some("correctuser"), no_token, no_finalize)
        .await
}

fn platform(os: &str, arch: &str) -> Platform {
    Platform {
        os: os.to_owned(),
        architecture: arch.to_owned(),
        variant: None,
    }
}

fn rbac(json: serde_json::Value) -> RbacPolicy {
    serde_json::from_value(json).unwrap()
}

#[tokio::test]
async fn create_then_identical_put_is_idempotent() {
    let h = harness();

    let created = put(&h, spec("first", "tenant1")).await.unwrap();
    assert_eq!(created.name, "first");
    assert!(created.rbac_policies.is_empty());
    assert_eq!(h.audit.len(), 1);
    assert_eq!(h.audit.events()[0].action, AuditAction::CreateAccount);
    assert!(h.federation.is_claimed("first"));

    let repeated = put(&h, spec("first", "tenant1")).await.unwrap();
    assert_eq!(repeated.auth_tenant_id, "tenant1");
    // No second audit event for a no-op update.
    assert_eq!(h.audit.len(), 1);
}

#[tokio::test]
async fn other_tenant_cannot_take_over_the_name() {
    let h = harness();
    put(&h, spec("first", "tenant1")).await.unwrap();

    let err = put(&h, spec("first", "tenant2")).await.unwrap_err();
    match err {
        DomainError::Conflict(message) => {
            assert!(message.contains("different tenant"));
        }
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn reserved_and_malformed_names_are_rejected() {
    let h = harness();
    for name in ["keppel-api", "v1", "v042"] {
        let err = put(&h, spec(name, "tenant1")).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)), "name {name:?}");
    }
    let too_long = "x".repeat(49);
    for name in ["", "Uppercase", "has_underscore", too_long.as_str()] {
        let err = put(&h, spec(name, "tenant1")).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)), "name {name:?}");
    }
}

#[tokio::test]
async fn replication_policy_is_immutable() {
    let h = harness();
    h.peers
        .set("peer.example.org", "mirror", PeerAccount::default());

    let mut create = spec("mirror", "tenant1");
    create.replication = Some(ReplicationPolicy::OnFirstUse {
        upstream: "peer.example.org".to_owned(),
    });
    put(&h, create).await.unwrap();

    let mut change = spec("mirror", "tenant1");
    change.replication = Some(ReplicationPolicy::OnFirstUse {
        upstream: "other.example.org".to_owned(),
    });
    let err = put(&h, change).await.unwrap_err();
    match err {
        DomainError::Conflict(message) => {
            assert!(message.contains("cannot change replication policy"));
        }
        other => panic!("expected conflict, got {other:?}"),
    }

    // An unspecified policy inherits instead of conflicting, because
    // clients round-trip GET output into PUT.
    let unchanged = put(&h, spec("mirror", "tenant1")).await.unwrap();
    assert_eq!(
        unchanged.upstream_peer_hostname(),
        Some("peer.example.org"),
    );
}

#[tokio::test]
async fn external_credentials_rotate_only_as_a_pair() {
    let h = harness();

    let external = |username: Option<&str>, password: Option<&str>| {
        Some(ReplicationPolicy::FromExternalOnFirstUse {
            upstream: ExternalPeer {
                url: "registry-1.docker.io".to_owned(),
                username: username.map(str::to_owned),
                password: password.map(SecretString::from),
            },
        })
    };

    let mut create = spec("mirror", "tenant1");
    create.replication = external(Some("foo"), Some("bar"));
    put(&h, create).await.unwrap();

    let mut half_update = spec("mirror", "tenant1");
    half_update.replication = external(Some("baz"), None);
    let err = put(&h, half_update).await.unwrap_err();
    match err {
        DomainError::Validation(message) => {
            assert!(message.contains("without also changing password"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }

    let mut full_update = spec("mirror", "tenant1");
    full_update.replication = external(Some("baz"), Some("qux"));
    put(&h, full_update).await.unwrap();

    let stored = h.repo.get("mirror").unwrap();
    match stored.replication {
        Some(ReplicationPolicy::FromExternalOnFirstUse { upstream }) => {
            assert_eq!(upstream.username.as_deref(), Some("baz"));
            assert_eq!(upstream.password_str(), Some("qux"));
        }
        other => panic!("unexpected replication: {other:?}"),
    }
}

#[tokio::test]
async fn peer_replica_inherits_platform_filter_from_primary() {
    let h = harness();
    let primary_filter = vec![platform("linux", "amd64"), platform("linux", "arm64")];
    h.peers.set(
        "peer.example.org",
        "mirror",
        PeerAccount {
            platform_filter: primary_filter.clone(),
        },
    );

    let mut create = spec("mirror", "tenant1");
    create.replication = Some(ReplicationPolicy::OnFirstUse {
        upstream: "peer.example.org".to_owned(),
    });
    let account = put(&h, create).await.unwrap();
    assert_eq!(account.platform_filter, primary_filter);
}

#[tokio::test]
async fn peer_replica_platform_filter_must_match_primary() {
    let h = harness();
    h.peers.set(
        "peer.example.org",
        "mirror",
        PeerAccount {
            platform_filter: vec![platform("linux", "amd64")],
        },
    );

    let mut create = spec("mirror", "tenant1");
    create.replication = Some(ReplicationPolicy::OnFirstUse {
        upstream: "peer.example.org".to_owned(),
    });
    create.platform_filter = Some(vec![platform("linux", "arm64")]);
    let err = put(&h, create).await.unwrap_err();
    assert!(matches!(err, DomainError::Conflict(_)));
}

#[tokio::test]
async fn platform_filter_is_forbidden_on_primaries_and_immutable_after_creation() {
    let h = harness();

    let mut create = spec("first", "tenant1");
    create.platform_filter = Some(vec![platform("linux", "amd64")]);
    let err = put(&h, create).await.unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));

    // External replicas accept the filter verbatim, once.
    let mut create = spec("mirror", "tenant1");
    create.replication = Some(ReplicationPolicy::FromExternalOnFirstUse {
        upstream: ExternalPeer {
            url: "registry-1.docker.io".to_owned(),
            username: None,
            password: None,
        },
    });
    create.platform_filter = Some(vec![platform("linux", "amd64")]);
    put(&h, create.clone()).await.unwrap();

    create.platform_filter = Some(vec![platform("linux", "arm64")]);
    let err = put(&h, create).await.unwrap_err();
    match err {
        DomainError::Conflict(message) => {
            assert!(message.contains("platform filter"));
        }
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn cidr_in_rbac_policy_is_persisted_canonically() {
    let h = harness();

    let mut create = spec("first", "tenant1");
    create.rbac_policies = vec![rbac(serde_json::json!({
        "match_cidr": "1.2.3.4/16",
        "permissions": ["pull"],
    }))];
    let account = put(&h, create).await.unwrap();
    assert_eq!(account.rbac_policies[0].match_cidr.as_deref(), Some("1.2.0.0/16"));

    let stored = h.repo.get("first").unwrap();
    assert_eq!(stored.rbac_policies[0].match_cidr.as_deref(), Some("1.2.0.0/16"));
}

#[tokio::test]
async fn claiming_an_owned_name_requires_a_sublease_token() {
    let h = harness();
    h.federation.preclaim("mirror");
    h.peers
        .set("peer.example.org", "mirror", PeerAccount::default());

    let mut create = spec("mirror", "tenant1");
    create.replication = Some(ReplicationPolicy::OnFirstUse {
        upstream: "peer.example.org".to_owned(),
    });

    let err = put(&h, create.clone()).await.unwrap_err();
    assert!(matches!(err, DomainError::Forbidden(_)));

    let secret = h
        .federation
        .issue_sublease_token_secret("mirror")
        .await
        .unwrap();
    let token = SubleaseToken {
        account_name: "mirror".to_owned(),
        primary_hostname: "peer.example.org".to_owned(),
        secret,
    };
    h.processor
        .create_or_update(create, Some("correctuser"), move || Ok(token), no_finalize)
        .await
        .unwrap();
}

#[tokio::test]
async fn sublease_callback_is_not_invoked_for_primaries() {
    let h = harness();
    let account = h
        .processor
        .create_or_update(
            spec("first", "tenant1"),
            Some("correctuser"),
            || Err(DomainError::MalformedToken),
            no_finalize,
        )
        .await
        .unwrap();
    assert_eq!(account.name, "first");
}

#[tokio::test]
async fn storage_setup_refusal_is_a_conflict_and_releases_the_claim() {
    let h = harness();
    h.storage.deny_setup("first");

    let err = put(&h, spec("first", "tenant1")).await.unwrap_err();
    assert!(matches!(err, DomainError::Conflict(_)));
    // The name claim must not leak when the creation aborts.
    assert_eq!(h.federation.forfeit_count("first"), 1);
    assert_eq!(h.audit.len(), 0);
}

#[tokio::test]
async fn failed_commit_after_claim_triggers_compensating_forfeit() {
    let h = harness();
    h.repo.set_fail_upserts(true);

    let err = put(&h, spec("first", "tenant1")).await.unwrap_err();
    assert!(matches!(err, DomainError::Internal(_)));
    assert_eq!(h.federation.forfeit_count("first"), 1);
}

#[tokio::test]
async fn finalize_hook_error_propagates_verbatim() {
    let h = harness();
    let err = h
        .processor
        .create_or_update(
            spec("first", "tenant1"),
            Some("correctuser"),
            no_token,
            |_, _| Err(DomainError::Forbidden("managed account".to_owned())),
        )
        .await
        .unwrap_err();
    match err {
        DomainError::Forbidden(message) => assert_eq!(message, "managed account"),
        other => panic!("expected forbidden, got {other:?}"),
    }
}

#[tokio::test]
async fn policy_change_emits_exactly_one_diff_attachment() {
    let h = harness();
    put(&h, spec("first", "tenant1")).await.unwrap();

    let mut update = spec("first", "tenant1");
    update.rbac_policies = vec![rbac(serde_json::json!({
        "match_repository": "foo",
        "permissions": ["anonymous_pull"],
    }))];
    put(&h, update.clone()).await.unwrap();

    let events = h.audit.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].action, AuditAction::UpdateAccount);
    assert_eq!(events[1].attachments.len(), 1);
    assert_eq!(events[1].attachments[0].kind, PolicyKind::Rbac);

    // Identical PUT: no further event.
    put(&h, update).await.unwrap();
    assert_eq!(h.audit.len(), 2);
}

#[tokio::test]
async fn staged_deletion_is_idempotent_and_monotonic() {
    let h = harness();
    put(&h, spec("first", "tenant1")).await.unwrap();

    h.processor
        .delete_account("first", Some("correctuser"))
        .await
        .unwrap();
    let stored = h.repo.get("first").unwrap();
    assert!(stored.is_deleting);
    assert!(stored.next_deletion_attempt_at.is_some());
    assert_eq!(h.audit.len(), 2);

    // Repeat deletion is a silent no-op.
    h.processor
        .delete_account("first", Some("correctuser"))
        .await
        .unwrap();
    assert_eq!(h.audit.len(), 2);

    // No PUT can resurrect a deleting account.
    let err = put(&h, spec("first", "tenant1")).await.unwrap_err();
    assert!(matches!(err, DomainError::Conflict(_)));
    assert!(h.repo.get("first").unwrap().is_deleting);
}

#[tokio::test]
async fn synchronous_deletion_reports_progress_until_drained() {
    let h = harness_with(DeletionConfig {
        mode: DeletionMode::Synchronous,
        ..DeletionConfig::default()
    });
    put(&h, spec("first", "tenant1")).await.unwrap();

    let repo_id = h.repo.add_repo("first", "library/alpine");
    h.repo.add_manifest(repo_id, "sha256:aaa");
    for _ in 0..3 {
        h.repo.add_blob("first");
    }

    let err = h
        .processor
        .delete_account("first", Some("correctuser"))
        .await
        .unwrap_err();
    match err {
        DomainError::DeletionBlocked(DeletionProgress::RemainingManifests { count, next }) => {
            assert_eq!(count, 1);
            assert_eq!(next.len(), 1);
            assert_eq!(next[0].repository, "library/alpine");
            assert_eq!(next[0].digest, "sha256:aaa");
        }
        other => panic!("expected manifest progress, got {other:?}"),
    }
    // The account row is untouched while children remain.
    assert!(h.repo.get("first").is_some());

    h.repo
        .delete_manifest("first", "library/alpine", "sha256:aaa")
        .await
        .unwrap();

    let err = h
        .processor
        .delete_account("first", Some("correctuser"))
        .await
        .unwrap_err();
    match err {
        DomainError::DeletionBlocked(DeletionProgress::RemainingBlobs { count }) => {
            assert_eq!(count, 3);
        }
        other => panic!("expected blob progress, got {other:?}"),
    }
    // First blob progress report schedules an immediate sweep and marks
    // every blob eligible.
    assert!(h.repo.get("first").unwrap().next_blob_sweep_at.is_some());
    assert!(h
        .repo
        .blob_sweep_marks("first")
        .iter()
        .all(Option::is_some));

    h.repo.drain_blobs("first");
    h.processor
        .delete_account("first", Some("correctuser"))
        .await
        .unwrap();
    assert!(h.repo.get("first").is_none());
    assert_eq!(h.federation.forfeit_count("first"), 1);
    assert!(!h.storage.is_active("first"));
}

#[tokio::test]
async fn synchronous_deletion_rolls_back_when_forfeit_fails() {
    let h = harness_with(DeletionConfig {
        mode: DeletionMode::Synchronous,
        ..DeletionConfig::default()
    });
    put(&h, spec("first", "tenant1")).await.unwrap();
    h.federation.set_fail_forfeits(true);

    let err = h
        .processor
        .delete_account("first", Some("correctuser"))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Conflict(_)));
    // Rolled back: the account is still there for a later retry.
    assert!(h.repo.get("first").is_some());
}

#[tokio::test]
async fn synchronous_deletion_can_require_maintenance_first() {
    let h = harness_with(DeletionConfig {
        mode: DeletionMode::Synchronous,
        require_maintenance: true,
        ..DeletionConfig::default()
    });
    put(&h, spec("first", "tenant1")).await.unwrap();

    let err = h
        .processor
        .delete_account("first", Some("correctuser"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DomainError::DeletionBlocked(DeletionProgress::MaintenanceRequired)
    ));
    // The first call staged the account; the retry drains it.
    assert!(h.repo.get("first").unwrap().is_deleting);
    h.processor
        .delete_account("first", Some("correctuser"))
        .await
        .unwrap();
    assert!(h.repo.get("first").is_none());
}

#[tokio::test]
async fn sublease_issuance_works_for_primaries_only() {
    let h = harness();
    let primary = put(&h, spec("first", "tenant1")).await.unwrap();

    let serialized = h.processor.issue_sublease(&primary).await.unwrap();
    let token = SubleaseToken::parse(&serialized).unwrap();
    assert_eq!(token.account_name, "first");
    assert_eq!(token.primary_hostname, "registry.example.org");
    assert!(!token.secret.is_empty());

    let mut replica_spec = spec("mirror", "tenant1");
    replica_spec.replication = Some(ReplicationPolicy::FromExternalOnFirstUse {
        upstream: ExternalPeer {
            url: "registry-1.docker.io".to_owned(),
            username: None,
            password: None,
        },
    });
    let replica = put(&h, replica_spec).await.unwrap();
    let err = h.processor.issue_sublease(&replica).await.unwrap_err();
    assert!(matches!(err, DomainError::BadRequest(_)));
}
