//! The account processor: orchestrates create/update/delete across the
//! store, the federation authority and the storage driver, enforcing the
//! account invariants on the way.

use std::sync::Arc;
use std::sync::OnceLock;

use accounts_sdk::{
    platform_filters_match, Account, ExternalPeer, GcPolicy, Platform, RbacPolicy,
    ReplicationPolicy, SecurityScanPolicy, SubleaseToken, TagPolicy,
};
use chrono::Utc;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::config::{DeletionConfig, DeletionMode};

use super::drivers::{ClaimResult, FederationDriver, PeerClient, StorageDriver};
use super::error::{DeletionProgress, DomainError};
use super::events::{policy_diff_attachments, AuditAction, AuditEvent, AuditSink};
use super::policy;
use super::repo::AccountRepository;

/// The mutable fields a PUT may carry, plus the account name from the
/// URL. `None` means "not specified" where the distinction matters for
/// GET-then-PUT round-trips.
#[derive(Debug, Clone, Default)]
pub struct AccountSpec {
    pub name: String,
    pub auth_tenant_id: String,
    pub replication: Option<ReplicationPolicy>,
    pub platform_filter: Option<Vec<Platform>>,
    pub rbac_policies: Vec<RbacPolicy>,
    pub gc_policies: Vec<GcPolicy>,
    pub tag_policies: Vec<TagPolicy>,
    pub required_labels: Vec<String>,
}

pub struct AccountProcessor<R> {
    repo: Arc<R>,
    federation: Arc<dyn FederationDriver>,
    storage: Arc<dyn StorageDriver>,
    peers: Arc<dyn PeerClient>,
    audit: Arc<dyn AuditSink>,
    deletion: DeletionConfig,
    /// This registry's own hostname, stamped into sublease tokens as the
    /// issuing primary.
    local_hostname: String,
}

fn name_format_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("^[a-z0-9-]{1,48}$").expect("hardcoded regex"))
}

fn reserved_version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("^v[0-9]+$").expect("hardcoded regex"))
}

/// Names that would collide with registry-internal namespaces or API
/// version prefixes.
fn is_reserved_name(name: &str) -> bool {
    name.starts_with("keppel-") || reserved_version_regex().is_match(name)
}

impl<R: AccountRepository> AccountProcessor<R> {
    pub fn new(
        repo: Arc<R>,
        federation: Arc<dyn FederationDriver>,
        storage: Arc<dyn StorageDriver>,
        peers: Arc<dyn PeerClient>,
        audit: Arc<dyn AuditSink>,
        deletion: DeletionConfig,
        local_hostname: String,
    ) -> Self {
        Self {
            repo,
            federation,
            storage,
            peers,
            audit,
            deletion,
            local_hostname,
        }
    }

    #[must_use]
    pub fn repo(&self) -> &Arc<R> {
        &self.repo
    }

    #[must_use]
    pub fn federation(&self) -> &Arc<dyn FederationDriver> {
        &self.federation
    }

    #[must_use]
    pub fn storage(&self) -> &Arc<dyn StorageDriver> {
        &self.storage
    }

    #[must_use]
    pub fn deletion_config(&self) -> &DeletionConfig {
        &self.deletion
    }

    pub async fn get_account(&self, name: &str) -> Result<Option<Account>, DomainError> {
        Ok(self.repo.find(name).await?)
    }

    /// All accounts, ordered by name. The caller filters to its scope.
    pub async fn list_accounts(&self) -> Result<Vec<Account>, DomainError> {
        Ok(self.repo.list().await?)
    }

    /// Create an account or update an existing one.
    ///
    /// `sublease_token` is invoked lazily, only when creating a peer
    /// replica, so callers claiming a fresh primary name never need to
    /// supply a token. `finalize` runs as the last check before the
    /// commit; its error propagates verbatim.
    #[instrument(skip_all, fields(account = %spec.name))]
    pub async fn create_or_update<F, G>(
        &self,
        spec: AccountSpec,
        user_name: Option<&str>,
        sublease_token: F,
        finalize: G,
    ) -> Result<Account, DomainError>
    where
        F: FnOnce() -> Result<SubleaseToken, DomainError>,
        G: FnOnce(&Account, Option<&Account>) -> Result<(), DomainError>,
    {
        let existing = self.repo.find(&spec.name).await?;

        if let Some(existing) = &existing {
            // Changing ownership silently would let one tenant take over
            // another tenant's published image name.
            if existing.auth_tenant_id != spec.auth_tenant_id {
                return Err(DomainError::Conflict(
                    "account name already in use by a different tenant".to_owned(),
                ));
            }
            if existing.is_deleting {
                return Err(DomainError::Conflict(
                    "account is currently being deleted".to_owned(),
                ));
            }
        }

        if is_reserved_name(&spec.name) {
            return Err(DomainError::Validation(format!(
                "account name {:?} is reserved",
                spec.name,
            )));
        }
        if existing.is_none() && !name_format_regex().is_match(&spec.name) {
            return Err(DomainError::Validation(
                "account name must be 1-48 chars of lowercase letters, digits and dashes"
                    .to_owned(),
            ));
        }

        let replication = resolve_replication(existing.as_ref(), spec.replication)?;
        let platform_filter = self
            .resolve_platform_filter(existing.as_ref(), &replication, spec.platform_filter, &spec.name)
            .await?;

        let is_external_replica = matches!(
            replication,
            Some(ReplicationPolicy::FromExternalOnFirstUse { .. })
        );
        let mut rbac_policies = spec.rbac_policies;
        policy::validate_rbac_policies(&mut rbac_policies, is_external_replica)?;
        let mut gc_policies = spec.gc_policies;
        policy::validate_gc_policies(&mut gc_policies)?;
        let mut tag_policies = spec.tag_policies;
        policy::validate_tag_policies(&mut tag_policies)?;
        policy::validate_required_labels(&spec.required_labels)?;

        let new_account = Account {
            name: spec.name.clone(),
            auth_tenant_id: spec.auth_tenant_id,
            replication,
            platform_filter,
            rbac_policies,
            gc_policies,
            tag_policies,
            security_scan_policies: existing
                .as_ref()
                .map(|a| a.security_scan_policies.clone())
                .unwrap_or_default(),
            required_labels: spec.required_labels,
            is_managed: existing.as_ref().is_some_and(|a| a.is_managed),
            is_deleting: false,
            next_deletion_attempt_at: None,
            next_blob_sweep_at: existing.as_ref().and_then(|a| a.next_blob_sweep_at),
        };

        let is_create = existing.is_none();
        if is_create {
            let sublease_secret = match &new_account.replication {
                Some(ReplicationPolicy::OnFirstUse { .. }) => {
                    let token = sublease_token()?;
                    if token.is_null() {
                        None
                    } else {
                        Some(token.secret)
                    }
                }
                _ => None,
            };
            match self
                .federation
                .claim_account_name(&new_account, sublease_secret.as_deref())
                .await
            {
                ClaimResult::Succeeded => {}
                ClaimResult::Failed(reason) => {
                    return Err(DomainError::Forbidden(format!(
                        "failed to claim account name: {reason}"
                    )));
                }
                ClaimResult::Errored(err) => return Err(DomainError::Internal(err)),
            }
        }

        // Past this point the federation authority considers the name
        // ours; every failure must release it again before returning.
        let outcome = self
            .commit_account(new_account, existing, user_name, finalize)
            .await;
        if outcome.is_err() && is_create {
            if let Err(err) = self.federation.forfeit_account_name(&spec.name).await {
                warn!(
                    account = %spec.name,
                    error = %err,
                    "failed to release federation name claim after aborted account creation",
                );
            }
        }
        outcome
    }

    async fn commit_account<G>(
        &self,
        new_account: Account,
        existing: Option<Account>,
        user_name: Option<&str>,
        finalize: G,
    ) -> Result<Account, DomainError>
    where
        G: FnOnce(&Account, Option<&Account>) -> Result<(), DomainError>,
    {
        self.storage
            .can_setup_account(&new_account)
            .await
            .map_err(|err| DomainError::Conflict(err.to_string()))?;

        finalize(&new_account, existing.as_ref())?;

        let changed = match &existing {
            Some(existing) => !accounts_equivalent(existing, &new_account),
            None => true,
        };
        if changed {
            self.repo.upsert(&new_account).await?;
            self.audit.record(AuditEvent {
                action: if existing.is_some() {
                    AuditAction::UpdateAccount
                } else {
                    AuditAction::CreateAccount
                },
                account_name: new_account.name.clone(),
                auth_tenant_id: new_account.auth_tenant_id.clone(),
                user_name: user_name.map(str::to_owned),
                attachments: policy_diff_attachments(existing.as_ref(), &new_account),
                recorded_at: Utc::now(),
            });
            info!(account = %new_account.name, created = existing.is_none(), "account committed");
        }
        Ok(new_account)
    }

    async fn resolve_platform_filter(
        &self,
        existing: Option<&Account>,
        replication: &Option<ReplicationPolicy>,
        requested: Option<Vec<Platform>>,
        name: &str,
    ) -> Result<Vec<Platform>, DomainError> {
        if let Some(existing) = existing {
            return match requested {
                None => Ok(existing.platform_filter.clone()),
                Some(filter) => {
                    if platform_filters_match(&filter, &existing.platform_filter) {
                        Ok(existing.platform_filter.clone())
                    } else {
                        Err(DomainError::Conflict(
                            "cannot change platform filter on existing account".to_owned(),
                        ))
                    }
                }
            };
        }

        match replication {
            Some(ReplicationPolicy::OnFirstUse { upstream }) => {
                let peer_account = self
                    .peers
                    .query_account(upstream, name)
                    .await?
                    .ok_or_else(|| {
                        DomainError::Conflict(format!(
                            "account {name:?} does not exist on upstream {upstream:?}"
                        ))
                    })?;
                match requested {
                    // Inherit the primary's filter if the caller did not
                    // spell one out.
                    None => Ok(peer_account.platform_filter),
                    Some(filter) => {
                        if platform_filters_match(&filter, &peer_account.platform_filter) {
                            Ok(filter)
                        } else {
                            Err(DomainError::Conflict(
                                "platform filter must match the filter of the primary account"
                                    .to_owned(),
                            ))
                        }
                    }
                }
            }
            Some(ReplicationPolicy::FromExternalOnFirstUse { .. }) => {
                Ok(requested.unwrap_or_default())
            }
            None => {
                if requested.as_ref().is_some_and(|f| !f.is_empty()) {
                    return Err(DomainError::Validation(
                        "platform filter is only allowed on replica accounts".to_owned(),
                    ));
                }
                Ok(Vec::new())
            }
        }
    }

    /// Delete an account, or record that it shall be deleted.
    ///
    /// In staged mode the first call flips `is_deleting` and the sweeper
    /// does the rest; repeat calls are no-ops. In synchronous mode the
    /// caller drives the drain and receives progress via
    /// [`DomainError::DeletionBlocked`].
    #[instrument(skip(self, user_name))]
    pub async fn delete_account(
        &self,
        name: &str,
        user_name: Option<&str>,
    ) -> Result<(), DomainError> {
        let Some(account) = self.repo.find(name).await? else {
            // Deletion is idempotent; a missing account is already gone.
            return Ok(());
        };

        match self.deletion.mode {
            DeletionMode::Staged => {
                if account.is_deleting {
                    return Ok(());
                }
                self.repo.mark_for_deletion(name, Utc::now()).await?;
                self.record_deletion_event(&account, user_name);
                Ok(())
            }
            DeletionMode::Synchronous => {
                self.delete_account_synchronously(&account, user_name).await
            }
        }
    }

    async fn delete_account_synchronously(
        &self,
        account: &Account,
        user_name: Option<&str>,
    ) -> Result<(), DomainError> {
        if self.deletion.require_maintenance && !account.is_deleting {
            // The deletion marker doubles as the maintenance flag here:
            // the first DELETE sets it and reports the precondition, the
            // next one drains.
            self.repo
                .mark_for_deletion(&account.name, Utc::now())
                .await?;
            return Err(DomainError::DeletionBlocked(
                DeletionProgress::MaintenanceRequired,
            ));
        }

        let name = account.name.as_str();
        let manifest_count = self.repo.manifest_count(name).await?;
        if manifest_count > 0 {
            let next = self.repo.top_level_manifests(name, 10).await?;
            return Err(DomainError::DeletionBlocked(
                DeletionProgress::RemainingManifests {
                    count: manifest_count,
                    next,
                },
            ));
        }

        let blob_count = self.repo.blob_count(name).await?;
        if blob_count > 0 {
            // Get the blob sweeper moving right away instead of waiting
            // for its regular schedule.
            self.repo.schedule_blob_sweep(name, Utc::now()).await?;
            return Err(DomainError::DeletionBlocked(
                DeletionProgress::RemainingBlobs { count: blob_count },
            ));
        }

        self.repo.delete_repositories(name).await?;

        let tx = self.repo.begin_delete(name).await?;
        if let Err(err) = self.storage.cleanup_account(name).await {
            rollback_logged(tx, name).await;
            return Err(DomainError::Conflict(err.to_string()));
        }
        if let Err(err) = self.federation.forfeit_account_name(name).await {
            rollback_logged(tx, name).await;
            return Err(DomainError::Conflict(err.to_string()));
        }
        tx.commit().await?;

        self.record_deletion_event(account, user_name);
        Ok(())
    }

    fn record_deletion_event(&self, account: &Account, user_name: Option<&str>) {
        self.audit.record(AuditEvent {
            action: AuditAction::DeleteAccount,
            account_name: account.name.clone(),
            auth_tenant_id: account.auth_tenant_id.clone(),
            user_name: user_name.map(str::to_owned),
            attachments: Vec::new(),
            recorded_at: Utc::now(),
        });
    }

    /// Issue a serialized sublease token for handing this account over to
    /// a peer registry.
    #[instrument(skip(self, account), fields(account = %account.name))]
    pub async fn issue_sublease(&self, account: &Account) -> Result<String, DomainError> {
        if account.is_replica() {
            return Err(DomainError::BadRequest(
                "operation not allowed for replica accounts".to_owned(),
            ));
        }
        let secret = self
            .federation
            .issue_sublease_token_secret(&account.name)
            .await?;
        let token = SubleaseToken {
            account_name: account.name.clone(),
            primary_hostname: self.local_hostname.clone(),
            secret,
        };
        Ok(token.serialize())
    }

    /// Replace the security-scan policies of an account.
    #[instrument(skip(self, policies, user_name), fields(account = %account.name))]
    pub async fn put_security_scan_policies(
        &self,
        account: &Account,
        mut policies: Vec<SecurityScanPolicy>,
        user_name: Option<&str>,
    ) -> Result<Vec<SecurityScanPolicy>, DomainError> {
        if account.is_deleting {
            return Err(DomainError::Conflict(
                "account is currently being deleted".to_owned(),
            ));
        }
        policy::validate_security_scan_policies(&mut policies)?;

        if account.security_scan_policies == policies {
            return Ok(policies);
        }

        let mut updated = account.clone();
        updated.security_scan_policies = policies.clone();
        self.repo.upsert(&updated).await?;
        self.audit.record(AuditEvent {
            action: AuditAction::UpdateAccount,
            account_name: account.name.clone(),
            auth_tenant_id: account.auth_tenant_id.clone(),
            user_name: user_name.map(str::to_owned),
            attachments: policy_diff_attachments(Some(account), &updated),
            recorded_at: Utc::now(),
        });
        Ok(policies)
    }
}

async fn rollback_logged(tx: Box<dyn super::repo::DeletionTx>, name: &str) {
    if let Err(err) = tx.rollback().await {
        warn!(account = %name, error = %err, "failed to roll back account deletion");
    }
}

/// Merge the requested replication policy with the existing one,
/// enforcing strategy immutability and credential-update rules.
fn resolve_replication(
    existing: Option<&Account>,
    requested: Option<ReplicationPolicy>,
) -> Result<Option<ReplicationPolicy>, DomainError> {
    let Some(existing) = existing else {
        return Ok(requested);
    };

    let Some(requested) = requested else {
        // GUIs round-trip GET into PUT; an unspecified policy inherits.
        return Ok(existing.replication.clone());
    };

    let conflict = || {
        DomainError::Conflict("cannot change replication policy on existing account".to_owned())
    };

    match (&existing.replication, requested) {
        (Some(ReplicationPolicy::OnFirstUse { upstream }), ReplicationPolicy::OnFirstUse { upstream: new_upstream }) => {
            if *upstream == new_upstream {
                Ok(existing.replication.clone())
            } else {
                Err(conflict())
            }
        }
        (
            Some(ReplicationPolicy::FromExternalOnFirstUse { upstream }),
            ReplicationPolicy::FromExternalOnFirstUse { upstream: new_peer },
        ) => {
            if upstream.url != new_peer.url {
                return Err(conflict());
            }
            Ok(Some(ReplicationPolicy::FromExternalOnFirstUse {
                upstream: merge_external_credentials(upstream, new_peer)?,
            }))
        }
        _ => Err(conflict()),
    }
}

/// Credentials of an external replica can be rotated, but only as a
/// pair: a new username with a stale password would silently break
/// replication later.
fn merge_external_credentials(
    existing: &ExternalPeer,
    requested: ExternalPeer,
) -> Result<ExternalPeer, DomainError> {
    if requested.username != existing.username && requested.password.is_none() {
        return Err(DomainError::Validation(
            "cannot change username for external replication without also changing password"
                .to_owned(),
        ));
    }
    Ok(ExternalPeer {
        url: existing.url.clone(),
        username: requested.username,
        password: requested.password.or_else(|| existing.password.clone()),
    })
}

/// Full equality including credentials, used to detect no-op updates.
fn accounts_equivalent(a: &Account, b: &Account) -> bool {
    a.auth_tenant_id == b.auth_tenant_id
        && replication_equivalent(a.replication.as_ref(), b.replication.as_ref())
        && a.platform_filter == b.platform_filter
        && a.rbac_policies == b.rbac_policies
        && a.gc_policies == b.gc_policies
        && a.tag_policies == b.tag_policies
        && a.security_scan_policies == b.security_scan_policies
        && a.required_labels == b.required_labels
}

fn replication_equivalent(
    a: Option<&ReplicationPolicy>,
    b: Option<&ReplicationPolicy>,
) -> bool {
    match (a, b) {
        (None, None) => true,
        (
            Some(ReplicationPolicy::OnFirstUse { upstream: ua }),
            Some(ReplicationPolicy::OnFirstUse { upstream: ub }),
        ) => ua == ub,
        (
            Some(ReplicationPolicy::FromExternalOnFirstUse { upstream: pa }),
            Some(ReplicationPolicy::FromExternalOnFirstUse { upstream: pb }),
        ) => {
            pa.url == pb.url
                && pa.username == pb.username
                && pa.password_str() == pb.password_str()
        }
        _ => false,
    }
}
