mod common;

use axum::http::StatusCode;
use ielts_mock_backend::models::{participant_answer::ParticipantAnswer, user::UserRole};
use rust_decimal::Decimal;
use serde_json::{json, Value as JsonValue};

#[tokio::test]
async fn check_in_device_binding_and_submissions() {
    let Some(t) = common::setup().await else {
        return;
    };
    let admin = t.login_as(UserRole::Admin).await;
    let session_id = t.seed_session("/api/admin", &admin).await;
    let (participant_id, code) = t
        .register_participant(&admin, session_id, "Ahmed Khan", &common::unique_phone())
        .await;

    let (status, body) = t
        .send(
            "POST",
            "/api/test-sessions/check-in-participant",
            None,
            Some(json!({ "participant_id_code": code, "full_name": "Ahmed Khalid" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "identity_mismatch");

    let (status, body) = t
        .send(
            "POST",
            "/api/test-sessions/check-in-participant",
            None,
            Some(json!({ "participant_id_code": code.to_lowercase(), "full_name": "ahmed khan " })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["participant"]["admission_state"], "admitted");
    assert_eq!(body["participant"]["id"], participant_id.to_string());

    let device = |device_id: &str| {
        json!({ "participant_id_code": code, "full_name": "Ahmed Khan", "device_id": device_id })
    };
    let (status, body) = t
        .send_from(
            "POST",
            "/api/test-sessions/validate-participant-ip",
            None,
            Some(device("laptop-1")),
            Some("10.1.2.3"),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["ip_match"], true);
    assert_eq!(body["first_binding"], true);

    let (status, body) = t
        .send_from(
            "POST",
            "/api/test-sessions/validate-participant-ip",
            None,
            Some(device("laptop-1")),
            Some("10.1.2.3"),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["first_binding"], false);

    let (status, body) = t
        .send_from(
            "POST",
            "/api/test-sessions/validate-participant-ip",
            None,
            Some(device("phone-2")),
            Some("10.9.9.9"),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["ip_match"], false);

    let can_start_uri = format!("/api/test-sessions/participant/{}/can-start", code);
    let (status, body) = t.send("GET", &can_start_uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["can_start"], false);

    let (status, body) = t
        .send(
            "POST",
            "/api/test-sessions/submit-listening",
            None,
            Some(json!({ "participant_id_code": code, "answers": { "1": "A" } })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);

    let (status, body) = t
        .send(
            "POST",
            &format!("/api/admin/sessions/{}/start-all", session_id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["updated_count"], 1);

    let (status, body) = t.send("GET", &can_start_uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["can_start"], true);
    assert_eq!(body["test_taking_state"], "in_progress");
    assert!(body["test_end_at"].is_string());

    let listening = json!({
        "participant_id_code": code,
        "full_name": "Ahmed Khan",
        "answers": { "1": "A", "2": "true", "3": "NG" }
    });
    let mut snapshots: Vec<Vec<ParticipantAnswer>> = Vec::new();
    for _ in 0..2 {
        let (status, body) = t
            .send(
                "POST",
                "/api/test-sessions/submit-listening",
                None,
                Some(listening.clone()),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["raw_score"], 3);
        assert_eq!(body["total_questions"], 3);
        assert_eq!(body["next_screen"], "reading");

        let stored = sqlx::query_as::<_, ParticipantAnswer>(
            r#"
            SELECT session_id, participant_id, section_type, question_number,
                   user_answer, correct_answer, is_correct
            FROM participant_answers
            WHERE participant_id = $1 AND section_type = 'listening'
            ORDER BY question_number
            "#,
        )
        .bind(participant_id)
        .fetch_all(&t.state.pool)
        .await
        .unwrap();
        snapshots.push(stored);
    }
    assert_eq!(snapshots[0].len(), 3);
    assert!(snapshots[0].iter().all(|a| a.is_correct));
    assert_eq!(snapshots[0], snapshots[1]);

    let (status, body) = t
        .send(
            "POST",
            "/api/test-sessions/participant-activity",
            None,
            Some(json!({ "participant_id_code": code, "event_type": "tab_switch" })),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED, "{}", body);

    let writing = json!({
        "participant_id_code": code,
        "answers": { "1": "The chart shows a steady rise.", "2": "Some people argue that..." }
    });
    let (status, body) = t
        .send(
            "POST",
            "/api/test-sessions/submit-writing",
            None,
            Some(writing.clone()),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["writing"]["status"], "pending_review");

    let (status, body) = t
        .send("POST", "/api/test-sessions/submit-writing", None, Some(writing))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "code_already_used");

    let (status, body) = t
        .send(
            "POST",
            "/api/test-sessions/check-in-participant",
            None,
            Some(json!({ "participant_id_code": code, "full_name": "Someone Else" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "code_already_used");

    let (status, body) = t
        .send(
            "GET",
            &format!("/api/admin/sessions/{}/writing-submissions", session_id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let submissions = body.as_array().unwrap();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0]["is_reviewed"], false);

    let (status, body) = t
        .send(
            "POST",
            &format!(
                "/api/admin/writing-submissions/{}/review",
                submissions[0]["id"].as_str().unwrap()
            ),
            Some(&admin),
            Some(json!({ "writing_score": "6.5", "admin_notes": "Clear overview" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["is_reviewed"], true);

    let (status, body) = t
        .send(
            "GET",
            &format!("/api/admin/sessions/{}/dashboard", session_id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["stats"]["total_participants"], 1);
    assert_eq!(body["stats"]["test_completed"], 1);
}

#[tokio::test]
async fn unknown_code_is_not_found() {
    let Some(t) = common::setup().await else {
        return;
    };
    let (status, _) = t
        .send(
            "POST",
            "/api/test-sessions/check-in-participant",
            None,
            Some(json!({ "participant_id_code": common::unique_code(), "full_name": "Nobody" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn band(value: &JsonValue) -> Decimal {
    serde_json::from_value(value.clone()).unwrap()
}

#[tokio::test]
async fn writing_review_and_saved_results() {
    let Some(t) = common::setup().await else {
        return;
    };
    let admin = t.login_as(UserRole::Admin).await;
    let center = t.login_as(UserRole::Center).await;

    let phone = common::unique_phone();
    let (status, body) = t
        .send(
            "POST",
            "/api/users/register",
            None,
            Some(json!({
                "full_name": "Kamola Saidova",
                "phone_number": phone,
                "password": common::PASSWORD
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let student = body["token"].as_str().unwrap().to_string();

    let (status, body) = t.send("GET", "/api/dashboard/latest-result", Some(&student), None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body["result"].is_null());

    let session_id = t.seed_session("/api/admin", &admin).await;
    let (participant_id, code) = t
        .register_participant(&admin, session_id, "Kamola Saidova", &phone)
        .await;
    let (status, _) = t
        .send(
            "POST",
            "/api/test-sessions/check-in-participant",
            None,
            Some(json!({ "participant_id_code": code, "full_name": "Kamola Saidova" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = t
        .send(
            "POST",
            &format!("/api/admin/sessions/{}/start-all", session_id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = t
        .send(
            "POST",
            "/api/test-sessions/submit-writing",
            None,
            Some(json!({
                "participant_id_code": code,
                "answers": { "1": "The graph compares two cities.", "2": "Opinions differ on this." }
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);

    let (_, body) = t
        .send(
            "GET",
            &format!("/api/admin/sessions/{}/writing-submissions", session_id),
            Some(&admin),
            None,
        )
        .await;
    let review_uri = format!(
        "/api/admin/writing-submissions/{}/review",
        body[0]["id"].as_str().unwrap()
    );

    let (status, _) = t
        .send("POST", &review_uri, Some(&admin), Some(json!({ "writing_score": "0" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, body) = t
        .send("POST", &review_uri, Some(&admin), Some(json!({ "writing_score": "6.5" })))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let scores_uri = format!(
        "/api/admin/sessions/{}/participants/{}/scores",
        session_id, participant_id
    );
    let (status, _) = t
        .send("PUT", &scores_uri, Some(&admin), Some(json!({ "writing_score": "0" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, body) = t
        .send(
            "PUT",
            &scores_uri,
            Some(&admin),
            Some(json!({
                "listening_score": "7.0",
                "reading_score": "7.0",
                "speaking_score": "7.5"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (status, body) = t
        .send(
            "POST",
            &format!("/api/admin/sessions/{}/save-and-end", session_id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["saved_results"], 1);

    let (status, _) = t
        .send("POST", &review_uri, Some(&admin), Some(json!({ "writing_score": "8.0" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = t.send("GET", "/api/dashboard/results", Some(&student), None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["test_name"], "Academic Mock 1");
    assert_eq!(results[0]["session_id"], session_id.to_string());
    assert_eq!(band(&results[0]["writing_score"]), Decimal::new(65, 1));
    assert_eq!(band(&results[0]["overall_score"]), Decimal::new(70, 1));

    let (status, body) = t.send("GET", "/api/dashboard/latest-result", Some(&student), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["id"], results[0]["id"]);

    let (status, body) = t.send("GET", "/api/dashboard/stats", Some(&student), None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["completed_tests"], 1);
    assert_eq!(band(&body["average_overall"]), Decimal::new(70, 1));
    assert_eq!(body["recent_results"].as_array().unwrap().len(), 1);

    let for_session = |body: &JsonValue| {
        body.as_array()
            .unwrap()
            .iter()
            .filter(|r| r["session_id"] == session_id.to_string())
            .count()
    };
    let (status, body) = t.send("GET", "/api/admin/results", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(for_session(&body), 1);

    let (status, body) = t.send("GET", "/api/center/results", Some(&center), None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(for_session(&body), 0);
}
