//! Ownership/role predicates used inline by handlers.
//!
//! - No IO
//! - No panics
//! - No business logic beyond the stated checks

use carelog_core::AccountId;
use carelog_identity::Account;

use crate::{Patient, Session};

/// Patient data is visible to its creator and to professionals whose
/// collaboration invite for that patient was accepted.
pub fn can_view_patient(account: &Account, patient: &Patient, accepted: &[AccountId]) -> bool {
    patient.creator_id == account.id || accepted.contains(&account.id)
}

/// Sessions may be edited or deleted by their author, or by an admin.
pub fn can_modify_session(account: &Account, session: &Session) -> bool {
    session.professional_id == account.id || account.is_admin()
}

/// The team with standing access to a patient: creator plus accepted
/// collaborators, de-duplicated by account id.
///
/// Derived on demand, never cached.
pub fn patient_team(
    patient: &Patient,
    accepted: impl IntoIterator<Item = AccountId>,
) -> Vec<AccountId> {
    let mut team = vec![patient.creator_id];
    for member in accepted {
        if !team.contains(&member) {
            team.push(member);
        }
    }
    team
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SessionDraft;
    use carelog_core::PatientId;
    use carelog_identity::Role;
    use chrono::Utc;
    use serde_json::Map;

    fn account(role: Role) -> Account {
        let mut account = Account::provision(
            AccountId::new(),
            "someone@clinic.test".to_string(),
            Map::new(),
            Utc::now(),
        );
        account.role = role;
        account
    }

    fn patient(creator: AccountId) -> Patient {
        Patient::new(creator, Map::new(), "consent.pdf".to_string(), Utc::now())
    }

    #[test]
    fn creator_and_accepted_collaborators_can_view() {
        let creator = account(Role::Professional);
        let collaborator = account(Role::Professional);
        let stranger = account(Role::Professional);
        let p = patient(creator.id);

        let accepted = vec![collaborator.id];
        assert!(can_view_patient(&creator, &p, &accepted));
        assert!(can_view_patient(&collaborator, &p, &accepted));
        assert!(!can_view_patient(&stranger, &p, &accepted));
    }

    #[test]
    fn sessions_are_editable_by_author_or_admin() {
        let author = account(Role::Professional);
        let other = account(Role::Professional);
        let admin = account(Role::Admin);

        let draft = SessionDraft {
            intervention_plan: "plan".to_string(),
            vitals: None,
            description: "desc".to_string(),
            achievements: None,
            patient_performance: None,
            photos: Vec::new(),
            has_incident: false,
            incident_details: None,
            incident_photo: None,
            next_session_notes: None,
        };
        let session = Session::create(PatientId::new(), author.id, draft, Utc::now()).unwrap();

        assert!(can_modify_session(&author, &session));
        assert!(!can_modify_session(&other, &session));
        assert!(can_modify_session(&admin, &session));
    }

    #[test]
    fn team_deduplicates_the_creator() {
        let creator = AccountId::new();
        let a = AccountId::new();
        let b = AccountId::new();
        let p = patient(creator);

        // The creator can also show up as an accepted collaborator.
        let team = patient_team(&p, vec![a, creator, b, a]);
        assert_eq!(team, vec![creator, a, b]);
    }
}
