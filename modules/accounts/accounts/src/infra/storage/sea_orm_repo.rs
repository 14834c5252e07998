//! Sea-ORM implementation of the account repository.
//!
//! Policy blobs are stored as JSON text and never interpreted here;
//! the mapping helpers below are the only place where the persisted
//! shape and the domain model meet.

use accounts_sdk::{Account, ExternalPeer, Platform, ReplicationPolicy};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveValue, ColumnTrait, Condition, DatabaseConnection, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::error::ManifestLocator;
use crate::domain::repo::{AccountRepository, DeletionTx};

use super::entity::{accounts, blob_mounts, blobs, manifest_refs, manifests, repos, tags};

pub struct SeaOrmAccountRepository {
    db: DatabaseConnection,
}

impl SeaOrmAccountRepository {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn repo_ids(&self, account_name: &str) -> anyhow::Result<Vec<i64>> {
        let rows = repos::Entity::find()
            .filter(repos::Column::AccountName.eq(account_name))
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(|r| r.id).collect())
    }
}

#[async_trait]
impl AccountRepository for SeaOrmAccountRepository {
    async fn find(&self, name: &str) -> anyhow::Result<Option<Account>> {
        let row = accounts::Entity::find_by_id(name).one(&self.db).await?;
        row.map(model_to_account).transpose()
    }

    async fn list(&self) -> anyhow::Result<Vec<Account>> {
        let rows = accounts::Entity::find()
            .order_by_asc(accounts::Column::Name)
            .all(&self.db)
            .await?;
        rows.into_iter().map(model_to_account).collect()
    }

    async fn upsert(&self, account: &Account) -> anyhow::Result<()> {
        let active = account_to_active_model(account);
        accounts::Entity::insert(active)
            .on_conflict(
                OnConflict::column(accounts::Column::Name)
                    .update_columns([
                        accounts::Column::AuthTenantId,
                        accounts::Column::UpstreamPeerHostname,
                        accounts::Column::ExternalPeerUrl,
                        accounts::Column::ExternalPeerUsername,
                        accounts::Column::ExternalPeerPassword,
                        accounts::Column::PlatformFilterJson,
                        accounts::Column::RbacPoliciesJson,
                        accounts::Column::GcPoliciesJson,
                        accounts::Column::TagPoliciesJson,
                        accounts::Column::SecurityScanPoliciesJson,
                        accounts::Column::RequiredLabels,
                        accounts::Column::IsManaged,
                        accounts::Column::IsDeleting,
                        accounts::Column::NextDeletionAttemptAt,
                        accounts::Column::NextBlobSweepAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn mark_for_deletion(
        &self,
        name: &str,
        attempt_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        accounts::Entity::update_many()
            .col_expr(accounts::Column::IsDeleting, Expr::value(true))
            .col_expr(
                accounts::Column::NextDeletionAttemptAt,
                Expr::value(Some(attempt_at)),
            )
            .filter(accounts::Column::Name.eq(name))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn list_deleting_due(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<Account>> {
        let rows = accounts::Entity::find()
            .filter(accounts::Column::IsDeleting.eq(true))
            .filter(accounts::Column::NextDeletionAttemptAt.lte(now))
            .order_by_asc(accounts::Column::NextDeletionAttemptAt)
            .all(&self.db)
            .await?;
        rows.into_iter().map(model_to_account).collect()
    }

    async fn set_next_deletion_attempt(
        &self,
        name: &str,
        attempt_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        accounts::Entity::update_many()
            .col_expr(
                accounts::Column::NextDeletionAttemptAt,
                Expr::value(Some(attempt_at)),
            )
            .filter(accounts::Column::Name.eq(name))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn manifest_count(&self, account_name: &str) -> anyhow::Result<u64> {
        let repo_ids = self.repo_ids(account_name).await?;
        let count = manifests::Entity::find()
            .filter(manifests::Column::RepoId.is_in(repo_ids))
            .count(&self.db)
            .await?;
        Ok(count)
    }

    async fn top_level_manifests(
        &self,
        account_name: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<ManifestLocator>> {
        let repo_rows = repos::Entity::find()
            .filter(repos::Column::AccountName.eq(account_name))
            .all(&self.db)
            .await?;
        let repo_ids: Vec<i64> = repo_rows.iter().map(|r| r.id).collect();
        let repo_names: std::collections::HashMap<i64, String> =
            repo_rows.into_iter().map(|r| (r.id, r.name)).collect();

        let manifest_rows = manifests::Entity::find()
            .filter(manifests::Column::RepoId.is_in(repo_ids.clone()))
            .all(&self.db)
            .await?;
        let ref_rows = manifest_refs::Entity::find()
            .filter(manifest_refs::Column::RepoId.is_in(repo_ids))
            .all(&self.db)
            .await?;
        let referenced: std::collections::HashSet<(i64, &str)> = ref_rows
            .iter()
            .map(|r| (r.repo_id, r.child_digest.as_str()))
            .collect();

        let mut locators: Vec<ManifestLocator> = manifest_rows
            .iter()
            .filter(|m| !referenced.contains(&(m.repo_id, m.digest.as_str())))
            .filter_map(|m| {
                repo_names.get(&m.repo_id).map(|repo| ManifestLocator {
                    repository: repo.clone(),
                    digest: m.digest.clone(),
                })
            })
            .collect();
        locators.sort_by(|a, b| {
            (a.repository.as_str(), a.digest.as_str())
                .cmp(&(b.repository.as_str(), b.digest.as_str()))
        });
        locators.truncate(limit);
        Ok(locators)
    }

    async fn delete_manifest(
        &self,
        account_name: &str,
        repository: &str,
        digest: &str,
    ) -> anyhow::Result<bool> {
        let repo = repos::Entity::find()
            .filter(repos::Column::AccountName.eq(account_name))
            .filter(repos::Column::Name.eq(repository))
            .one(&self.db)
            .await?;
        let Some(repo) = repo else {
            return Ok(false);
        };

        let tx = self.db.begin().await?;
        manifest_refs::Entity::delete_many()
            .filter(manifest_refs::Column::RepoId.eq(repo.id))
            .filter(
                Condition::any()
                    .add(manifest_refs::Column::ParentDigest.eq(digest))
                    .add(manifest_refs::Column::ChildDigest.eq(digest)),
            )
            .exec(&tx)
            .await?;
        tags::Entity::delete_many()
            .filter(tags::Column::RepoId.eq(repo.id))
            .filter(tags::Column::Digest.eq(digest))
            .exec(&tx)
            .await?;
        let result = manifests::Entity::delete_by_id((repo.id, digest.to_owned()))
            .exec(&tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected > 0)
    }

    async fn delete_repositories(&self, account_name: &str) -> anyhow::Result<()> {
        let repo_ids = self.repo_ids(account_name).await?;
        let tx = self.db.begin().await?;
        blob_mounts::Entity::delete_many()
            .filter(blob_mounts::Column::RepoId.is_in(repo_ids.clone()))
            .exec(&tx)
            .await?;
        tags::Entity::delete_many()
            .filter(tags::Column::RepoId.is_in(repo_ids.clone()))
            .exec(&tx)
            .await?;
        repos::Entity::delete_many()
            .filter(repos::Column::Id.is_in(repo_ids))
            .exec(&tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn blob_count(&self, account_name: &str) -> anyhow::Result<u64> {
        let count = blobs::Entity::find()
            .filter(blobs::Column::AccountName.eq(account_name))
            .count(&self.db)
            .await?;
        Ok(count)
    }

    async fn schedule_blob_sweep(
        &self,
        account_name: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let tx = self.db.begin().await?;
        blobs::Entity::update_many()
            .col_expr(blobs::Column::CanBeDeletedAt, Expr::value(Some(at)))
            .filter(blobs::Column::AccountName.eq(account_name))
            .filter(blobs::Column::CanBeDeletedAt.is_null())
            .exec(&tx)
            .await?;
        accounts::Entity::update_many()
            .col_expr(accounts::Column::NextBlobSweepAt, Expr::value(Some(at)))
            .filter(accounts::Column::Name.eq(account_name))
            .exec(&tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn begin_delete(&self, name: &str) -> anyhow::Result<Box<dyn DeletionTx>> {
        let repo_ids = self.repo_ids(name).await?;
        let tx = self.db.begin().await?;
        blob_mounts::Entity::delete_many()
            .filter(blob_mounts::Column::RepoId.is_in(repo_ids.clone()))
            .exec(&tx)
            .await?;
        blobs::Entity::delete_many()
            .filter(blobs::Column::AccountName.eq(name))
            .exec(&tx)
            .await?;
        tags::Entity::delete_many()
            .filter(tags::Column::RepoId.is_in(repo_ids.clone()))
            .exec(&tx)
            .await?;
        manifest_refs::Entity::delete_many()
            .filter(manifest_refs::Column::RepoId.is_in(repo_ids.clone()))
            .exec(&tx)
            .await?;
        manifests::Entity::delete_many()
            .filter(manifests::Column::RepoId.is_in(repo_ids.clone()))
            .exec(&tx)
            .await?;
        repos::Entity::delete_many()
            .filter(repos::Column::Id.is_in(repo_ids))
            .exec(&tx)
            .await?;
        accounts::Entity::delete_by_id(name).exec(&tx).await?;
        Ok(Box::new(SeaOrmDeletionTx { tx }))
    }
}

struct SeaOrmDeletionTx {
    tx: DatabaseTransaction,
}

#[async_trait]
impl DeletionTx for SeaOrmDeletionTx {
    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> anyhow::Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

fn policies_to_json<T: Serialize>(policies: &[T]) -> Option<String> {
    if policies.is_empty() {
        None
    } else {
        serde_json::to_string(policies).ok()
    }
}

fn json_to_policies<T: DeserializeOwned>(json: Option<&String>) -> anyhow::Result<Vec<T>> {
    match json {
        None => Ok(Vec::new()),
        Some(json) => serde_json::from_str(json).context("corrupted policy blob"),
    }
}

fn account_to_active_model(account: &Account) -> accounts::ActiveModel {
    let (upstream, external) = match &account.replication {
        Some(ReplicationPolicy::OnFirstUse { upstream }) => (upstream.clone(), None),
        Some(ReplicationPolicy::FromExternalOnFirstUse { upstream }) => {
            (String::new(), Some(upstream))
        }
        None => (String::new(), None),
    };
    let platform_filter_json = if account.platform_filter.is_empty() {
        None
    } else {
        serde_json::to_string(&account.platform_filter).ok()
    };

    accounts::ActiveModel {
        name: ActiveValue::Set(account.name.clone()),
        auth_tenant_id: ActiveValue::Set(account.auth_tenant_id.clone()),
        upstream_peer_hostname: ActiveValue::Set(upstream),
        external_peer_url: ActiveValue::Set(
            external.map(|e| e.url.clone()).unwrap_or_default(),
        ),
        external_peer_username: ActiveValue::Set(
            external
                .and_then(|e| e.username.clone())
                .unwrap_or_default(),
        ),
        external_peer_password: ActiveValue::Set(
            external
                .and_then(|e| e.password_str().map(str::to_owned))
                .unwrap_or_default(),
        ),
        platform_filter_json: ActiveValue::Set(platform_filter_json),
        rbac_policies_json: ActiveValue::Set(policies_to_json(&account.rbac_policies)),
        gc_policies_json: ActiveValue::Set(policies_to_json(&account.gc_policies)),
        tag_policies_json: ActiveValue::Set(policies_to_json(&account.tag_policies)),
        security_scan_policies_json: ActiveValue::Set(policies_to_json(
            &account.security_scan_policies,
        )),
        required_labels: ActiveValue::Set(account.required_labels.join(",")),
        is_managed: ActiveValue::Set(account.is_managed),
        is_deleting: ActiveValue::Set(account.is_deleting),
        next_deletion_attempt_at: ActiveValue::Set(account.next_deletion_attempt_at),
        next_blob_sweep_at: ActiveValue::Set(account.next_blob_sweep_at),
    }
}

fn model_to_account(model: accounts::Model) -> anyhow::Result<Account> {
    let replication = if !model.upstream_peer_hostname.is_empty() {
        Some(ReplicationPolicy::OnFirstUse {
            upstream: model.upstream_peer_hostname.clone(),
        })
    } else if !model.external_peer_url.is_empty() {
        Some(ReplicationPolicy::FromExternalOnFirstUse {
            upstream: ExternalPeer {
                url: model.external_peer_url.clone(),
                username: (!model.external_peer_username.is_empty())
                    .then(|| model.external_peer_username.clone()),
                password: (!model.external_peer_password.is_empty())
                    .then(|| SecretString::from(model.external_peer_password.clone())),
            },
        })
    } else {
        None
    };

    let platform_filter: Vec<Platform> = match &model.platform_filter_json {
        None => Vec::new(),
        Some(json) => serde_json::from_str(json).context("corrupted platform filter")?,
    };

    let required_labels = if model.required_labels.is_empty() {
        Vec::new()
    } else {
        model
            .required_labels
            .split(',')
            .map(str::to_owned)
            .collect()
    };

    Ok(Account {
        name: model.name,
        auth_tenant_id: model.auth_tenant_id,
        replication,
        platform_filter,
        rbac_policies: json_to_policies(model.rbac_policies_json.as_ref())?,
        gc_policies: json_to_policies(model.gc_policies_json.as_ref())?,
        tag_policies: json_to_policies(model.tag_policies_json.as_ref())?,
        security_scan_policies: json_to_policies(model.security_scan_policies_json.as_ref())?,
        required_labels,
        is_managed: model.is_managed,
        is_deleting: model.is_deleting,
        next_deletion_attempt_at: model.next_deletion_attempt_at,
        next_blob_sweep_at: model.next_blob_sweep_at,
    })
}
