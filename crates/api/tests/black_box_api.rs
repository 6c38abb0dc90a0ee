//! Black-box tests: boot the real router on an ephemeral port and drive it
//! over HTTP with minted HS256 tokens.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};
use uuid::Uuid;

use carelog_api::app::{app_router, services::AppServices};
use carelog_api::mailer::LogMailer;
use carelog_auth::TokenVerifier;
use carelog_core::AccountId;
use carelog_identity::{Account, Role};
use carelog_store::{AccountStore, MemoryStore};

const SECRET: &str = "black-box-secret";

struct TestServer {
    base_url: String,
    store: Arc<MemoryStore>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let store = Arc::new(MemoryStore::new());
        let services = Arc::new(AppServices::assemble(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(LogMailer),
        ));
        let verifier = Arc::new(TokenVerifier::new(Some(SECRET.to_string()), None));
        let app = app_router(services, verifier);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            store,
            handle,
        }
    }

    /// Seed an already-approved account directly in the store.
    async fn seed_active(&self, email: &str, role: Role) -> (Account, String) {
        let mut account = Account::provision(
            AccountId::new(),
            email.to_string(),
            serde_json::Map::new(),
            Utc::now(),
        );
        account.role = role;
        account.approve(Utc::now());
        AccountStore::insert(self.store.as_ref(), &account)
            .await
            .unwrap();

        let token = mint_jwt(*account.id.as_uuid(), email);
        (account, token)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(sub: Uuid, email: &str) -> String {
    let claims = json!({
        "sub": sub.to_string(),
        "email": email,
        "exp": Utc::now().timestamp() + 600,
    });

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn notifications_eventually(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    kind: &str,
    minimum: usize,
) -> Vec<Value> {
    for _ in 0..100 {
        let body: Value = client
            .get(format!("{base_url}/api/notifications"))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        let matching: Vec<Value> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|n| n["kind"] == kind)
            .cloned()
            .collect();
        if matching.len() >= minimum {
            return matching;
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected at least {minimum} {kind} notifications within timeout");
}

#[tokio::test]
async fn health_is_public_and_everything_else_is_not() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/health", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/api/patients", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("{}/api/patients", server.base_url))
        .bearer_auth("garbage")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn end_to_end_invite_flow() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (_creator, creator_token) = server.seed_active("x@clinic.test", Role::Professional).await;
    let (_invitee, invitee_token) = server.seed_active("y@x.com", Role::Professional).await;

    // X registers patient P.
    let res = client
        .post(format!("{}/api/patients", server.base_url))
        .bearer_auth(&creator_token)
        .json(&json!({
            "first_name": "Ana",
            "last_name": "Reyes",
            "rut": "12.345.678-9",
            "birth_date": "1990-06-15",
            "email": "ana@patients.test",
            "sex": "F",
            "consent_pdf_url": "https://files/consent.pdf",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    let patient_id = body["data"]["id"].as_str().unwrap().to_string();

    // X invites Y; the invite starts Pending.
    let res = client
        .post(format!("{}/api/collaborations/invite", server.base_url))
        .bearer_auth(&creator_token)
        .json(&json!({ "patient_id": patient_id, "email": "y@x.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["status"], "PENDING");
    let invite_id = body["data"]["id"].as_str().unwrap().to_string();

    // Repeating the invite returns the same record.
    let res = client
        .post(format!("{}/api/collaborations/invite", server.base_url))
        .bearer_auth(&creator_token)
        .json(&json!({ "patient_id": patient_id, "email": "y@x.com" }))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["id"].as_str().unwrap(), invite_id);

    // Y sees it pending, then accepts.
    let res = client
        .get(format!("{}/api/collaborations/pending", server.base_url))
        .bearer_auth(&invitee_token)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let res = client
        .put(format!(
            "{}/api/collaborations/{invite_id}/respond",
            server.base_url
        ))
        .bearer_auth(&invitee_token)
        .json(&json!({ "status": "ACCEPTED" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ACCEPTED");

    // Double-submit is rejected, whatever the decision.
    let res = client
        .put(format!(
            "{}/api/collaborations/{invite_id}/respond",
            server.base_url
        ))
        .bearer_auth(&invitee_token)
        .json(&json!({ "status": "REJECTED" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // Exactly one InviteResponse reaches X.
    let responses = notifications_eventually(
        &client,
        &server.base_url,
        &creator_token,
        "INVITE_RESPONSE",
        1,
    )
    .await;
    assert_eq!(responses.len(), 1);

    // Y now sees the shared patient.
    let res = client
        .get(format!("{}/api/patients", server.base_url))
        .bearer_auth(&invitee_token)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn first_login_provisions_and_gates_until_approved() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (_admin, admin_token) = server.seed_active("admin@clinic.test", Role::Admin).await;

    // A never-seen subject shows up.
    let newcomer_sub = Uuid::now_v7();
    let newcomer_token = mint_jwt(newcomer_sub, "newcomer@clinic.test");

    // Denied everywhere...
    let res = client
        .get(format!("{}/api/patients", server.base_url))
        .bearer_auth(&newcomer_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // ...except the profile update, so onboarding data can be completed.
    let res = client
        .put(format!("{}/api/auth/profile", server.base_url))
        .bearer_auth(&newcomer_token)
        .json(&json!({ "full_name": "New Pro", "specialty": "Kinesiology" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // The admin was notified of the registration.
    notifications_eventually(&client, &server.base_url, &admin_token, "NEW_USER", 1).await;

    // The admin sees the pending account and approves it.
    let res = client
        .get(format!("{}/api/admin/users/pending", server.base_url))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    let pending = body["data"].as_array().unwrap();
    assert!(
        pending
            .iter()
            .any(|u| u["id"] == newcomer_sub.to_string())
    );

    let res = client
        .put(format!(
            "{}/api/admin/users/{newcomer_sub}/review",
            server.base_url
        ))
        .bearer_auth(&admin_token)
        .json(&json!({ "action": "APPROVE" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Approval unlocks the platform.
    let res = client
        .get(format!("{}/api/patients", server.base_url))
        .bearer_auth(&newcomer_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // And the newcomer received the status notification.
    notifications_eventually(
        &client,
        &server.base_url,
        &newcomer_token,
        "ACCOUNT_STATUS",
        1,
    )
    .await;
}

#[tokio::test]
async fn rejected_accounts_are_locked_out_with_the_reason() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (_admin, admin_token) = server.seed_active("admin@clinic.test", Role::Admin).await;

    let sub = Uuid::now_v7();
    let token = mint_jwt(sub, "applicant@clinic.test");

    // Provision through the one allowed operation.
    let res = client
        .put(format!("{}/api/auth/profile", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "full_name": "Applicant" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Rejecting without a reason is invalid.
    let res = client
        .put(format!("{}/api/admin/users/{sub}/review", server.base_url))
        .bearer_auth(&admin_token)
        .json(&json!({ "action": "REJECT" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .put(format!("{}/api/admin/users/{sub}/review", server.base_url))
        .bearer_auth(&admin_token)
        .json(&json!({ "action": "REJECT", "reject_reason": "incomplete registry" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Denied everywhere now, profile update included, reason surfaced.
    let res = client
        .put(format!("{}/api/auth/profile", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "full_name": "Still Trying" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "incomplete registry");
}

#[tokio::test]
async fn incident_sessions_alert_the_team() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (_creator, creator_token) = server.seed_active("c@clinic.test", Role::Professional).await;
    let (_collab, collab_token) = server.seed_active("m@clinic.test", Role::Professional).await;

    // Patient + accepted collaboration, through the API.
    let res = client
        .post(format!("{}/api/patients", server.base_url))
        .bearer_auth(&creator_token)
        .json(&json!({
            "first_name": "Luis",
            "last_name": "Soto",
            "rut": "9.876.543-2",
            "birth_date": "1985-01-20",
            "email": "luis@patients.test",
            "sex": "M",
            "consent_pdf_url": "https://files/consent.pdf",
        }))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    let patient_id = body["data"]["id"].as_str().unwrap().to_string();

    let res = client
        .post(format!("{}/api/collaborations/invite", server.base_url))
        .bearer_auth(&creator_token)
        .json(&json!({ "patient_id": patient_id, "email": "m@clinic.test" }))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    let invite_id = body["data"]["id"].as_str().unwrap().to_string();

    client
        .put(format!(
            "{}/api/collaborations/{invite_id}/respond",
            server.base_url
        ))
        .bearer_auth(&collab_token)
        .json(&json!({ "status": "ACCEPTED" }))
        .send()
        .await
        .unwrap();

    // A flagged session without details is rejected.
    let res = client
        .post(format!("{}/api/sessions", server.base_url))
        .bearer_auth(&creator_token)
        .json(&json!({
            "patient_id": patient_id,
            "intervention_plan": "gait training",
            "description": "fall during transfer",
            "has_incident": true,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // With details, the whole team is alerted.
    let res = client
        .post(format!("{}/api/sessions", server.base_url))
        .bearer_auth(&creator_token)
        .json(&json!({
            "patient_id": patient_id,
            "intervention_plan": "gait training",
            "description": "fall during transfer",
            "has_incident": true,
            "incident_details": "patient slipped, no visible injury",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    notifications_eventually(
        &client,
        &server.base_url,
        &creator_token,
        "INCIDENT_ALERT",
        1,
    )
    .await;
    notifications_eventually(
        &client,
        &server.base_url,
        &collab_token,
        "INCIDENT_ALERT",
        1,
    )
    .await;
}

#[tokio::test]
async fn admin_routes_are_role_gated() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (_pro, pro_token) = server.seed_active("pro@clinic.test", Role::Professional).await;
    let (_admin, admin_token) = server.seed_active("admin@clinic.test", Role::Admin).await;

    let res = client
        .get(format!("{}/api/admin/dashboard", server.base_url))
        .bearer_auth(&pro_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .get(format!("{}/api/admin/dashboard", server.base_url))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["total_users"], 2);
}
