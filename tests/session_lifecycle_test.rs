mod common;

use axum::http::StatusCode;
use ielts_mock_backend::models::user::UserRole;
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn controls_scores_and_save_and_end() {
    let Some(t) = common::setup().await else {
        return;
    };
    let admin = t.login_as(UserRole::Admin).await;

    let student_phone = common::unique_phone();
    let (status, body) = t
        .send(
            "POST",
            "/api/users/register",
            None,
            Some(json!({
                "full_name": "Sara Lee",
                "phone_number": student_phone,
                "password": common::PASSWORD
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let student_id: Uuid = body["user"]["id"].as_str().unwrap().parse().unwrap();

    let session_id = t.seed_session("/api/admin", &admin).await;
    let (participant_id, code) = t
        .register_participant(&admin, session_id, "Sara Lee", &student_phone)
        .await;
    let participant_uri = |action: &str| {
        format!(
            "/api/admin/sessions/{}/participants/{}/{}",
            session_id, participant_id, action
        )
    };

    let (status, _) = t
        .send(
            "POST",
            "/api/test-sessions/check-in-participant",
            None,
            Some(json!({ "participant_id_code": code, "full_name": "Sara Lee" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = t
        .send(
            "POST",
            &format!("/api/admin/sessions/{}/start-all", session_id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated_count"], 1);

    let (status, body) = t
        .send(
            "POST",
            &format!("/api/admin/sessions/{}/restart-all", session_id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated_count"], 0);

    let (status, body) = t.send("POST", &participant_uri("pause"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["test_taking_state"], "paused");

    let (status, _) = t.send("POST", &participant_uri("pause"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = t
        .send("POST", &participant_uri("restart"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["test_taking_state"], "in_progress");

    let (status, body) = t.send("POST", &participant_uri("end"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["test_taking_state"], "completed");
    assert_eq!(body["admission_state"], "expired");

    let save_uri = format!("/api/admin/sessions/{}/save-and-end", session_id);
    let (status, body) = t.send("POST", &save_uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    let incomplete = body["incomplete"].as_array().unwrap();
    assert_eq!(incomplete.len(), 1);
    assert_eq!(incomplete[0]["full_name"], "Sara Lee");
    assert_eq!(
        incomplete[0]["missing"],
        json!(["listening", "reading", "writing", "speaking"])
    );

    let results: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM results WHERE session_id = $1")
        .bind(session_id)
        .fetch_one(&t.state.pool)
        .await
        .unwrap();
    assert_eq!(results, 0);
    let session_status: String =
        sqlx::query_scalar("SELECT status FROM test_sessions WHERE id = $1")
            .bind(session_id)
            .fetch_one(&t.state.pool)
            .await
            .unwrap();
    assert_eq!(session_status, "ongoing");

    let (status, _) = t
        .send(
            "PUT",
            &participant_uri("scores"),
            Some(&admin),
            Some(json!({ "speaking_score": "6.3" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = t
        .send(
            "PUT",
            &participant_uri("scores"),
            Some(&admin),
            Some(json!({
                "listening_score": "6.5",
                "reading_score": "7.0",
                "writing_score": "6.0",
                "speaking_score": "5.5"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (status, body) = t.send("POST", &save_uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["saved_results"], 1);

    let overall: Decimal = sqlx::query_scalar(
        "SELECT overall_score FROM results WHERE session_id = $1 AND student_id = $2",
    )
    .bind(session_id)
    .bind(student_id)
    .fetch_one(&t.state.pool)
    .await
    .unwrap();
    assert_eq!(overall, Decimal::new(65, 1));

    let audit = t
        .state
        .audit_service
        .list_for_entity(session_id)
        .await
        .unwrap();
    assert!(audit.iter().any(|entry| entry.action == "save_and_end"));
    assert!(audit.iter().any(|entry| entry.action == "session_created"));

    let (status, body) = t
        .send("GET", &format!("/api/admin/sessions/{}", session_id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");

    let (status, _) = t.send("POST", &save_uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn save_and_end_without_completed_participants_is_refused() {
    let Some(t) = common::setup().await else {
        return;
    };
    let admin = t.login_as(UserRole::Admin).await;
    let session_id = t.seed_session("/api/admin", &admin).await;

    let (status, body) = t
        .send(
            "POST",
            &format!("/api/admin/sessions/{}/save-and-end", session_id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    assert!(body["incomplete"].is_null());
}

#[tokio::test]
async fn session_status_transitions_follow_the_lifecycle() {
    let Some(t) = common::setup().await else {
        return;
    };
    let admin = t.login_as(UserRole::Admin).await;
    let session_id = t.seed_session("/api/admin", &admin).await;
    let status_uri = format!("/api/test-sessions/{}/status", session_id);

    let (status, body) = t
        .send("PATCH", &status_uri, Some(&admin), Some(json!({ "status": "cancelled" })))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["status"], "cancelled");

    let (status, _) = t
        .send("PATCH", &status_uri, Some(&admin), Some(json!({ "status": "ongoing" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .send("PATCH", &status_uri, Some(&admin), Some(json!({ "status": "paused" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bulk_controls_count_each_participant() {
    let Some(t) = common::setup().await else {
        return;
    };
    let admin = t.login_as(UserRole::Admin).await;
    let session_id = t.seed_session("/api/admin", &admin).await;

    let mut admitted = Vec::new();
    for name in ["Nodira Karimova", "Javlon Ismoilov"] {
        let (id, code) = t
            .register_participant(&admin, session_id, name, &common::unique_phone())
            .await;
        let (status, _) = t
            .send(
                "POST",
                "/api/test-sessions/check-in-participant",
                None,
                Some(json!({ "participant_id_code": code, "full_name": name })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        admitted.push(id);
    }
    let (absent, _) = t
        .register_participant(&admin, session_id, "Dilshod Rahimov", &common::unique_phone())
        .await;

    let bulk = |action: &str| format!("/api/admin/sessions/{}/{}", session_id, action);
    for (action, expected) in [
        ("start-all", 2),
        ("start-all", 0),
        ("pause-all", 2),
        ("pause-all", 0),
        ("restart-all", 2),
        ("end-all", 2),
        ("end-all", 0),
    ] {
        let (status, body) = t.send("POST", &bulk(action), Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK, "{}: {}", action, body);
        assert_eq!(body["updated_count"], expected, "{}", action);
    }

    let (status, body) = t
        .send(
            "GET",
            &format!("/api/admin/sessions/{}/participants", session_id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let participants = body.as_array().unwrap();
    assert_eq!(participants.len(), 3);
    for p in participants {
        let id: Uuid = p["id"].as_str().unwrap().parse().unwrap();
        if admitted.contains(&id) {
            assert_eq!(p["test_taking_state"], "completed");
            assert_eq!(p["admission_state"], "expired");
        } else {
            assert_eq!(id, absent);
            assert_eq!(p["test_taking_state"], "not_started");
            assert_eq!(p["admission_state"], "not_entered");
        }
    }
}

#[tokio::test]
async fn overdue_participants_expire_but_paused_clocks_are_frozen() {
    let Some(t) = common::setup().await else {
        return;
    };
    let admin = t.login_as(UserRole::Admin).await;
    let session_id = t.seed_session("/api/admin", &admin).await;

    let mut registered = Vec::new();
    for name in ["Aziza Yusupova", "Bekzod Aliev"] {
        let (id, code) = t
            .register_participant(&admin, session_id, name, &common::unique_phone())
            .await;
        let (status, _) = t
            .send(
                "POST",
                "/api/test-sessions/check-in-participant",
                None,
                Some(json!({ "participant_id_code": code, "full_name": name })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        registered.push((id, code));
    }
    let (running_id, running_code) = registered[0].clone();
    let (paused_id, paused_code) = registered[1].clone();

    let (status, body) = t
        .send(
            "POST",
            &format!("/api/admin/sessions/{}/start-all", session_id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated_count"], 2);

    let (status, _) = t
        .send(
            "POST",
            &format!(
                "/api/admin/sessions/{}/participants/{}/pause",
                session_id, paused_id
            ),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    sqlx::query("UPDATE test_participants SET test_end_at = NOW() - INTERVAL '1 minute' WHERE id = $1")
        .bind(running_id)
        .execute(&t.state.pool)
        .await
        .unwrap();
    sqlx::query(
        r#"
        UPDATE test_participants
        SET paused_at = NOW() - INTERVAL '2 hours', test_end_at = NOW() - INTERVAL '1 hour'
        WHERE id = $1
        "#,
    )
    .bind(paused_id)
    .execute(&t.state.pool)
    .await
    .unwrap();

    let can_start = |code: &str| format!("/api/test-sessions/participant/{}/can-start", code);
    let (status, body) = t.send("GET", &can_start(&running_code), None, None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["test_taking_state"], "completed");
    assert_eq!(body["admission_state"], "expired");
    assert_eq!(body["can_start"], false);

    let (status, body) = t.send("GET", &can_start(&paused_code), None, None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["test_taking_state"], "paused");
    assert_eq!(body["admission_state"], "admitted");

    sqlx::query("UPDATE test_participants SET test_end_at = paused_at - INTERVAL '1 minute' WHERE id = $1")
        .bind(paused_id)
        .execute(&t.state.pool)
        .await
        .unwrap();

    let (status, body) = t
        .send(
            "GET",
            &format!("/api/admin/sessions/{}/dashboard", session_id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["stats"]["test_completed"], 2);

    let (_, body) = t.send("GET", &can_start(&paused_code), None, None).await;
    assert_eq!(body["test_taking_state"], "completed");
    assert_eq!(body["admission_state"], "expired");
}
