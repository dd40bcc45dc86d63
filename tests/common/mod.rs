#![allow(dead_code)]

use std::env;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use ielts_mock_backend::{
    config::{get_config, init_config},
    database::pool::{create_pool, run_migrations},
    models::user::UserRole,
    routes::build_router,
    AppState,
};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "secret-pass-123";

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
}

/// Builds the full router against `DATABASE_URL`, or returns `None` so the
/// calling test can skip when no database is configured.
pub async fn setup() -> Option<TestApp> {
    dotenvy::dotenv().ok();
    if env::var("DATABASE_URL").is_err() {
        eprintln!("DATABASE_URL not set, skipping database test");
        return None;
    }
    let keys_dir = env::temp_dir().join("ielts-mock-keys");
    std::fs::create_dir_all(&keys_dir).expect("answer key dir");

    env::set_var("SERVER_ADDRESS", "127.0.0.1:0");
    env::set_var("JWT_SECRET", "test_secret_key");
    env::set_var("PUBLIC_RPS", "10000");
    env::set_var("ADMIN_RPS", "10000");
    env::set_var("ANSWER_KEYS_DIR", &keys_dir);
    env::set_var("TRUST_PROXY_HEADERS", "true");
    let _ = init_config();

    let pool = create_pool().await.expect("pool");
    run_migrations(&pool).await.expect("migrations");

    let state = AppState::new(pool);
    let app = build_router(state.clone(), get_config());
    Some(TestApp { app, state })
}

impl TestApp {
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<JsonValue>,
    ) -> (StatusCode, JsonValue) {
        self.send_from(method, uri, token, body, None).await
    }

    pub async fn send_from(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<JsonValue>,
        forwarded_for: Option<&str>,
    ) -> (StatusCode, JsonValue) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header("authorization", format!("Bearer {}", token));
        }
        if let Some(ip) = forwarded_for {
            req = req.header("x-forwarded-for", ip);
        }
        let req = match body {
            Some(body) => req
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();

        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
        let body = if bytes.is_empty() {
            JsonValue::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null)
        };
        (status, body)
    }

    /// Creates a user with the given role directly and logs in over HTTP.
    pub async fn login_as(&self, role: UserRole) -> String {
        let phone = unique_phone();
        self.state
            .auth_service
            .create_user(&format!("{} user", role.as_str()), &phone, PASSWORD, role)
            .await
            .expect("create user");
        let (status, body) = self
            .send(
                "POST",
                "/api/users/login",
                None,
                Some(json!({ "phone_number": phone, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }

    /// Test, materials with an answer key on disk, and a scheduled session.
    pub async fn seed_session(&self, prefix: &str, token: &str) -> Uuid {
        let (status, test) = self
            .send(
                "POST",
                "/api/admin/tests",
                Some(token),
                Some(json!({ "name": "Academic Mock 1" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", test);

        let (status, materials) = self
            .send(
                "POST",
                "/api/admin/materials",
                Some(token),
                Some(json!({ "test_id": test["id"], "name": "Booklet A" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", materials);
        let materials_id: Uuid = materials["id"].as_str().unwrap().parse().unwrap();

        let key = json!({
            "answers": {
                "listening": [
                    { "question": 1, "answer": "A" },
                    { "question": 2, "answer": "T" },
                    { "question": 3, "answer": "Not Given" }
                ],
                "reading": [
                    { "question": "1", "answer": "B" }
                ]
            }
        });
        std::fs::write(
            self.state.answer_keys.path_for(materials_id),
            key.to_string(),
        )
        .expect("write answer key");

        let (status, session) = self
            .send(
                "POST",
                &format!("{}/sessions", prefix),
                Some(token),
                Some(json!({
                    "test_id": test["id"],
                    "test_materials_id": materials_id,
                    "session_date": Utc::now(),
                    "location": "Hall B",
                    "max_capacity": 20
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", session);
        session["id"].as_str().unwrap().parse().unwrap()
    }

    pub async fn register_participant(
        &self,
        token: &str,
        session_id: Uuid,
        full_name: &str,
        phone: &str,
    ) -> (Uuid, String) {
        let code = unique_code();
        let (status, body) = self
            .send(
                "POST",
                &format!("/api/admin/sessions/{}/participants", session_id),
                Some(token),
                Some(json!({
                    "participants": [{
                        "full_name": full_name,
                        "phone_number": phone,
                        "participant_id_code": code.to_lowercase()
                    }]
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        assert_eq!(body["failed"].as_array().unwrap().len(), 0, "{}", body);
        let registered = &body["registered"][0];
        assert_eq!(registered["participant_id_code"], code.as_str());
        (registered["id"].as_str().unwrap().parse().unwrap(), code)
    }
}

pub fn unique_phone() -> String {
    format!("+99890{:07}", Uuid::new_v4().as_u128() % 10_000_000)
}

pub fn unique_code() -> String {
    format!("T-{}", &Uuid::new_v4().simple().to_string()[..10]).to_uppercase()
}
