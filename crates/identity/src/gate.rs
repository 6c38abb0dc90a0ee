//! Status gating evaluated after account resolution, before any handler runs.

use crate::{Account, AccountStatus};

/// Why a resolved account was denied access to the requested operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDenial {
    /// The account failed admin review; the stored reason is surfaced.
    Rejected { reason: Option<String> },
    /// The account has not been approved yet.
    PendingApproval,
}

/// Three-state gate over the account status.
///
/// - `Rejected` accounts are denied everywhere, including profile updates.
/// - `Inactive` accounts may only update their own profile (so a pending
///   user can complete onboarding data); everything else is denied.
/// - `Active` accounts pass; ownership/role checks happen downstream.
pub fn gate_request(account: &Account, is_profile_update: bool) -> Result<(), AccessDenial> {
    match account.status {
        AccountStatus::Rejected => Err(AccessDenial::Rejected {
            reason: account.reject_reason.clone(),
        }),
        AccountStatus::Inactive if is_profile_update => Ok(()),
        AccountStatus::Inactive => Err(AccessDenial::PendingApproval),
        AccountStatus::Active => Ok(()),
    }
}
