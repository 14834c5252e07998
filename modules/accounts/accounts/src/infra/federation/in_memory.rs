//! In-memory federation authority.
//!
//! Tracks name claims and issued sublease secrets in process memory.
//! Used by tests and by demo deployments where a real authority would be
//! overkill; the bookkeeping accessors let tests observe claim and
//! forfeit traffic.

use std::collections::{HashMap, HashSet};

use accounts_sdk::Account;
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::drivers::{ClaimResult, FederationDriver};

#[derive(Default)]
struct State {
    /// Names currently claimed through this authority.
    claimed: HashSet<String>,
    /// Sublease secrets issued per account name.
    issued_secrets: HashMap<String, String>,
    forfeit_counts: HashMap<String, u64>,
    next_secret: u64,
    fail_forfeits: bool,
}

#[derive(Default)]
pub struct InMemoryFederationDriver {
    state: Mutex<State>,
}

impl InMemoryFederationDriver {
    #[must_use]
    pub fn is_claimed(&self, name: &str) -> bool {
        self.state.lock().claimed.contains(name)
    }

    #[must_use]
    pub fn forfeit_count(&self, name: &str) -> u64 {
        self.state
            .lock()
            .forfeit_counts
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    /// Make subsequent forfeits fail, to exercise retry paths.
    pub fn set_fail_forfeits(&self, fail: bool) {
        self.state.lock().fail_forfeits = fail;
    }

    /// Pretend another site already claimed this name.
    pub fn preclaim(&self, name: &str) {
        self.state.lock().claimed.insert(name.to_owned());
    }
}

#[async_trait]
impl FederationDriver for InMemoryFederationDriver {
    async fn claim_account_name(
        &self,
        account: &Account,
        sublease_secret: Option<&str>,
    ) -> ClaimResult {
        let mut state = self.state.lock();
        if state.claimed.contains(&account.name) {
            // A replica of an already-claimed name needs the secret the
            // primary issued for exactly this handover.
            let issued = state.issued_secrets.get(&account.name);
            match (issued, sublease_secret) {
                (Some(issued), Some(presented)) if issued == presented => {
                    // One-shot: the proof is consumed by the claim.
                    state.issued_secrets.remove(&account.name);
                    ClaimResult::Succeeded
                }
                _ => ClaimResult::Failed(format!(
                    "account name {:?} is already claimed by another site",
                    account.name,
                )),
            }
        } else {
            state.claimed.insert(account.name.clone());
            ClaimResult::Succeeded
        }
    }

    async fn forfeit_account_name(&self, account_name: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        if state.fail_forfeits {
            anyhow::bail!("federation authority is unavailable");
        }
        state.claimed.remove(account_name);
        *state
            .forfeit_counts
            .entry(account_name.to_owned())
            .or_insert(0) += 1;
        Ok(())
    }

    async fn issue_sublease_token_secret(&self, account_name: &str) -> anyhow::Result<String> {
        let mut state = self.state.lock();
        if !state.claimed.contains(account_name) {
            anyhow::bail!("cannot issue sublease secret for unclaimed name {account_name:?}");
        }
        state.next_secret += 1;
        let secret = format!("sublease-secret-{}", state.next_secret);
        state
            .issued_secrets
            .insert(account_name.to_owned(), secret.clone());
        Ok(secret)
    }
}
