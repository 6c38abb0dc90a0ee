use carelog_core::AccountId;
use carelog_identity::Account;

/// Authenticated account for a request.
///
/// Inserted by the auth middleware after verification, provisioning and
/// status gating; present on every handler behind the middleware.
#[derive(Debug, Clone)]
pub struct CurrentAccount {
    account: Account,
}

impl CurrentAccount {
    pub fn new(account: Account) -> Self {
        Self { account }
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn id(&self) -> AccountId {
        self.account.id
    }
}
