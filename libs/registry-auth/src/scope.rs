//! The scope grammar used in authorization checks and bearer challenges.

use std::fmt;

/// A resource a permission applies to.
///
/// Rendered as `<type>:<name>` in token scopes and bearer challenges,
/// e.g. `keppel_account:first` or `repository:first/library/alpine`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// One account namespace.
    Account(String),
    /// Everything owned by one auth tenant.
    AuthTenant(String),
    /// One repository within an account (`<account>/<repo>`).
    Repository { account: String, repository: String },
}

impl Scope {
    #[must_use]
    pub fn account(name: impl Into<String>) -> Self {
        Scope::Account(name.into())
    }

    #[must_use]
    pub fn auth_tenant(id: impl Into<String>) -> Self {
        Scope::AuthTenant(id.into())
    }

    /// Parse the `<type>:<name>` form. Unknown types yield `None`.
    #[must_use]
    pub fn parse(input: &str) -> Option<Scope> {
        let (kind, name) = input.split_once(':')?;
        match kind {
            "keppel_account" => Some(Scope::Account(name.to_owned())),
            "keppel_auth_tenant" => Some(Scope::AuthTenant(name.to_owned())),
            "repository" => {
                let (account, repository) = name.split_once('/')?;
                Some(Scope::Repository {
                    account: account.to_owned(),
                    repository: repository.to_owned(),
                })
            }
            _ => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Account(name) => write!(f, "keppel_account:{name}"),
            Scope::AuthTenant(id) => write!(f, "keppel_auth_tenant:{id}"),
            Scope::Repository {
                account,
                repository,
            } => write!(f, "repository:{account}/{repository}"),
        }
    }
}
