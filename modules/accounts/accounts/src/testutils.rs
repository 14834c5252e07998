//! Shared fakes for unit tests: an in-memory account repository, an
//! audit sink that collects events, and a canned peer client.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use accounts_sdk::Account;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::domain::drivers::{PeerAccount, PeerClient};
use crate::domain::error::ManifestLocator;
use crate::domain::events::{AuditEvent, AuditSink};
use crate::domain::repo::{AccountRepository, DeletionTx};

#[derive(Default)]
struct StoreState {
    accounts: BTreeMap<String, Account>,
    /// (repo id, account name, repo name)
    repos: Vec<(i64, String, String)>,
    /// (repo id, digest)
    manifests: Vec<(i64, String)>,
    /// (repo id, parent digest, child digest)
    refs: Vec<(i64, String, String)>,
    /// (blob id, account name, deletion-eligible since)
    blobs: Vec<(i64, String, Option<DateTime<Utc>>)>,
    next_id: i64,
}

#[derive(Default)]
pub struct InMemoryAccountRepository {
    state: Arc<Mutex<StoreState>>,
    fail_upserts: AtomicBool,
}

impl InMemoryAccountRepository {
    pub fn set_fail_upserts(&self, fail: bool) {
        self.fail_upserts.store(fail, Ordering::SeqCst);
    }

    pub fn get(&self, name: &str) -> Option<Account> {
        self.state.lock().accounts.get(name).cloned()
    }

    pub fn insert(&self, account: Account) {
        self.state
            .lock()
            .accounts
            .insert(account.name.clone(), account);
    }

    pub fn add_repo(&self, account_name: &str, repo_name: &str) -> i64 {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = state.next_id;
        state
            .repos
            .push((id, account_name.to_owned(), repo_name.to_owned()));
        id
    }

    pub fn add_manifest(&self, repo_id: i64, digest: &str) {
        self.state.lock().manifests.push((repo_id, digest.to_owned()));
    }

    pub fn add_manifest_ref(&self, repo_id: i64, parent: &str, child: &str) {
        self.state
            .lock()
            .refs
            .push((repo_id, parent.to_owned(), child.to_owned()));
    }

    pub fn add_blob(&self, account_name: &str) -> i64 {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.blobs.push((id, account_name.to_owned(), None));
        id
    }

    /// Simulate the blob sweeper having reclaimed everything.
    pub fn drain_blobs(&self, account_name: &str) {
        self.state
            .lock()
            .blobs
            .retain(|(_, account, _)| account != account_name);
    }

    pub fn blob_sweep_marks(&self, account_name: &str) -> Vec<Option<DateTime<Utc>>> {
        self.state
            .lock()
            .blobs
            .iter()
            .filter(|(_, account, _)| account == account_name)
            .map(|(_, _, at)| *at)
            .collect()
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn find(&self, name: &str) -> anyhow::Result<Option<Account>> {
        Ok(self.state.lock().accounts.get(name).cloned())
    }

    async fn list(&self) -> anyhow::Result<Vec<Account>> {
        Ok(self.state.lock().accounts.values().cloned().collect())
    }

    async fn upsert(&self, account: &Account) -> anyhow::Result<()> {
        if self.fail_upserts.load(Ordering::SeqCst) {
            anyhow::bail!("store is unavailable");
        }
        self.state
            .lock()
            .accounts
            .insert(account.name.clone(), account.clone());
        Ok(())
    }

    async fn mark_for_deletion(
        &self,
        name: &str,
        attempt_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        if let Some(account) = state.accounts.get_mut(name) {
            account.is_deleting = true;
            account.next_deletion_attempt_at = Some(attempt_at);
        }
        Ok(())
    }

    async fn list_deleting_due(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<Account>> {
        Ok(self
            .state
            .lock()
            .accounts
            .values()
            .filter(|a| a.is_deleting && a.next_deletion_attempt_at.is_some_and(|at| at <= now))
            .cloned()
            .collect())
    }

    async fn set_next_deletion_attempt(
        &self,
        name: &str,
        attempt_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        if let Some(account) = state.accounts.get_mut(name) {
            account.next_deletion_attempt_at = Some(attempt_at);
        }
        Ok(())
    }

    async fn manifest_count(&self, account_name: &str) -> anyhow::Result<u64> {
        let state = self.state.lock();
        let repo_ids: Vec<i64> = state
            .repos
            .iter()
            .filter(|(_, account, _)| account == account_name)
            .map(|(id, _, _)| *id)
            .collect();
        Ok(state
            .manifests
            .iter()
            .filter(|(repo_id, _)| repo_ids.contains(repo_id))
            .count() as u64)
    }

    async fn top_level_manifests(
        &self,
        account_name: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<ManifestLocator>> {
        let state = self.state.lock();
        let repos: HashMap<i64, &str> = state
            .repos
            .iter()
            .filter(|(_, account, _)| account == account_name)
            .map(|(id, _, name)| (*id, name.as_str()))
            .collect();
        let mut locators: Vec<ManifestLocator> = state
            .manifests
            .iter()
            .filter(|(repo_id, digest)| {
                repos.contains_key(repo_id)
                    && !state
                        .refs
                        .iter()
                        .any(|(r, _, child)| r == repo_id && child == digest)
            })
            .map(|(repo_id, digest)| ManifestLocator {
                repository: repos[repo_id].to_owned(),
                digest: digest.clone(),
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
        let mut state = self.state.lock();
        let Some(repo_id) = state
            .repos
            .iter()
            .find(|(_, account, name)| account == account_name && name == repository)
            .map(|(id, _, _)| *id)
        else {
            return Ok(false);
        };
        let before = state.manifests.len();
        state
            .manifests
            .retain(|(r, d)| !(*r == repo_id && d == digest));
        state
            .refs
            .retain(|(r, parent, child)| !(*r == repo_id && (parent == digest || child == digest)));
        Ok(state.manifests.len() < before)
    }

    async fn delete_repositories(&self, account_name: &str) -> anyhow::Result<()> {
        self.state
            .lock()
            .repos
            .retain(|(_, account, _)| account != account_name);
        Ok(())
    }

    async fn blob_count(&self, account_name: &str) -> anyhow::Result<u64> {
        Ok(self
            .state
            .lock()
            .blobs
            .iter()
            .filter(|(_, account, _)| account == account_name)
            .count() as u64)
    }

    async fn schedule_blob_sweep(
        &self,
        account_name: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        for (_, account, eligible_at) in &mut state.blobs {
            if account == account_name && eligible_at.is_none() {
                *eligible_at = Some(at);
            }
        }
        if let Some(account) = state.accounts.get_mut(account_name) {
            account.next_blob_sweep_at = Some(at);
        }
        Ok(())
    }

    async fn begin_delete(&self, name: &str) -> anyhow::Result<Box<dyn DeletionTx>> {
        let mut state = self.state.lock();
        let removed = state
            .accounts
            .remove(name)
            .ok_or_else(|| anyhow::anyhow!("account {name:?} does not exist"))?;
        Ok(Box::new(InMemoryDeletionTx {
            state: Arc::clone(&self.state),
            removed: Some(removed),
        }))
    }
}

struct InMemoryDeletionTx {
    state: Arc<Mutex<StoreState>>,
    removed: Option<Account>,
}

#[async_trait]
impl DeletionTx for InMemoryDeletionTx {
    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> anyhow::Result<()> {
        if let Some(account) = self.removed.take() {
            self.state
                .lock()
                .accounts
                .insert(account.name.clone(), account);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct CollectingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl CollectingAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }
}

impl AuditSink for CollectingAuditSink {
    fn record(&self, event: AuditEvent) {
        self.events.lock().push(event);
    }
}

/// Peer client with canned answers per `(hostname, account)` pair.
#[derive(Default)]
pub struct StaticPeerClient {
    responses: Mutex<HashMap<(String, String), PeerAccount>>,
}

impl StaticPeerClient {
    pub fn set(&self, hostname: &str, account_name: &str, peer_account: PeerAccount) {
        self.responses
            .lock()
            .insert((hostname.to_owned(), account_name.to_owned()), peer_account);
    }
}

#[async_trait]
impl PeerClient for StaticPeerClient {
    async fn query_account(
        &self,
        peer_hostname: &str,
        account_name: &str,
    ) -> anyhow::Result<Option<PeerAccount>> {
        Ok(self
            .responses
            .lock()
            .get(&(peer_hostname.to_owned(), account_name.to_owned()))
            .cloned())
    }
}
