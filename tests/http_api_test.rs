mod common;

use arena_wallet::application::notify::DeliveryError;
use arena_wallet::config::AppConfig;
use arena_wallet::domain::identity::IdentityKind;
use arena_wallet::interfaces::http::router;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{ADMIN_TOKEN, PHONE, RecordingProvider, harness, harness_with};
use serde_json::{Value, json};
use tower::ServiceExt;

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    call_as(app, None, method, uri, body).await
}

async fn admin(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    call_as(app, Some(ADMIN_TOKEN), method, uri, body).await
}

async fn call_as(
    app: &Router,
    token: Option<&str>,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_otp_send_and_verify() {
    let sms = RecordingProvider::new("sms", IdentityKind::Phone, vec![]);
    let h = harness(vec![sms.clone()]);
    let app = router(h.context.clone());

    let (status, body) = call(&app, "POST", "/otp/send", Some(json!({ "identity_key": PHONE }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));

    let (status, body) = call(
        &app,
        "POST",
        "/otp/verify",
        Some(json!({ "identity_key": PHONE, "code": sms.last_code() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_otp_mismatch_reports_remaining_attempts() {
    let sms = RecordingProvider::new("sms", IdentityKind::Phone, vec![]);
    let h = harness(vec![sms.clone()]);
    let app = router(h.context.clone());

    call(&app, "POST", "/otp/send", Some(json!({ "identity_key": PHONE }))).await;
    let wrong = if sms.last_code() == "000000" { "111111" } else { "000000" };

    let (status, body) = call(
        &app,
        "POST",
        "/otp/verify",
        Some(json!({ "identity_key": PHONE, "code": wrong })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["errorCode"], "otp_mismatch");
    assert_eq!(body["remainingAttempts"], 2);
}

#[tokio::test]
async fn test_otp_send_validation_and_provider_errors() {
    let sms = RecordingProvider::new(
        "sms",
        IdentityKind::Phone,
        vec![Err(DeliveryError::Rejected("secret-token-123 rejected".to_string()))],
    );
    let h = harness(vec![sms]);
    let app = router(h.context.clone());

    let (status, body) = call(&app, "POST", "/otp/send", Some(json!({ "identity_key": "abc" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "validation_error");

    let (status, body) = call(&app, "POST", "/otp/send", Some(json!({ "identity_key": PHONE }))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["errorCode"], "provider_error");
    assert!(!body.to_string().contains("secret-token-123"));

    let (status, _) = call(&app, "POST", "/otp/send", Some(json!({ "phone": PHONE }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_account_and_withdrawal_lifecycle() {
    let h = harness(vec![]);
    let app = router(h.context.clone());

    let (status, body) = call(&app, "POST", "/accounts", Some(json!({ "identity_key": PHONE }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["balance"], 0);

    let (status, _) = call(&app, "POST", "/accounts", Some(json!({ "identity_key": PHONE }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, topup) = call(
        &app,
        "POST",
        "/payments/add-money",
        Some(json!({ "identity_key": PHONE, "amount": 100 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(topup["status"], "pending");

    let uri = format!("/payments/{}/approve", topup["id"].as_str().unwrap());
    let (status, approved) = admin(&app, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["status"], "approved");
    let (status, _) = admin(&app, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, withdrawal) = call(
        &app,
        "POST",
        "/payments/withdrawal",
        Some(json!({ "identity_key": PHONE, "amount": 60 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, account) = call(&app, "GET", &format!("/accounts/{}", PHONE), None).await;
    assert_eq!(account["balance"], 40);

    let (status, body) = call(
        &app,
        "POST",
        "/payments/withdrawal",
        Some(json!({ "identity_key": PHONE, "amount": 60 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "insufficient_funds");

    let uri = format!("/payments/{}/reject", withdrawal["id"].as_str().unwrap());
    let (status, _) = admin(&app, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, account) = call(&app, "GET", &format!("/accounts/{}", PHONE), None).await;
    assert_eq!(account["balance"], 100);

    let (status, pending) = admin(&app, "GET", "/payments?status=pending", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending, json!([]));

    let (_, withdrawals) = admin(&app, "GET", "/payments?type=withdrawal", None).await;
    assert_eq!(withdrawals.as_array().unwrap().len(), 1);
    assert_eq!(withdrawals[0]["status"], "rejected");
}

#[tokio::test]
async fn test_enroll_endpoint() {
    let h = harness(vec![]);
    let app = router(h.context.clone());
    call(&app, "POST", "/accounts", Some(json!({ "identity_key": PHONE }))).await;

    let enroll = format!("/accounts/{}/enroll", PHONE);
    let (status, body) = call(
        &app,
        "POST",
        &enroll,
        Some(json!({ "tournament_id": "open-1", "entry_fee": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "insufficient_funds");

    let (status, body) = call(&app, "POST", &enroll, Some(json!({ "tournament_id": "free-1" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], 0);

    let (status, body) = call(&app, "POST", &enroll, Some(json!({ "tournament_id": "free-1" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["errorCode"], "already_enrolled");
}

#[tokio::test]
async fn test_unknown_resources() {
    let h = harness(vec![]);
    let app = router(h.context.clone());

    let (status, body) = call(&app, "GET", "/accounts/9999999999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["errorCode"], "account_not_found");

    let (status, _) = admin(
        &app,
        "POST",
        "/payments/00000000-0000-0000-0000-000000000000/approve",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = admin(&app, "POST", "/payments/not-a-uuid/approve", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(&app, "GET", "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_admin_routes_require_bearer_token() {
    let h = harness(vec![]);
    let app = router(h.context.clone());
    call(&app, "POST", "/accounts", Some(json!({ "identity_key": PHONE }))).await;
    let winnings = json!({ "identity_key": PHONE, "amount": 1_000_000 });

    let (status, body) = call(&app, "POST", "/payments/winnings", Some(winnings.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["errorCode"], "unauthorized");

    let (status, _) = call_as(
        &app,
        Some("wrong-token"),
        "POST",
        "/payments/winnings",
        Some(winnings.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, account) = call(&app, "GET", &format!("/accounts/{}", PHONE), None).await;
    assert_eq!(account["balance"], 0);

    let (status, credited) = admin(&app, "POST", "/payments/winnings", Some(winnings)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(credited["status"], "approved");

    let (_, account) = call(&app, "GET", &format!("/accounts/{}", PHONE), None).await;
    assert_eq!(account["balance"], 1_000_000);
}

#[tokio::test]
async fn test_settlement_routes_refuse_anonymous_callers() {
    let h = harness(vec![]);
    let app = router(h.context.clone());
    call(&app, "POST", "/accounts", Some(json!({ "identity_key": PHONE }))).await;

    let (status, topup) = call(
        &app,
        "POST",
        "/payments/add-money",
        Some(json!({ "identity_key": PHONE, "amount": 100 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = topup["id"].as_str().unwrap();

    for (method, uri) in [
        ("POST", format!("/payments/{}/approve", id)),
        ("POST", format!("/payments/{}/reject", id)),
        ("GET", format!("/payments/{}", id)),
        ("GET", "/payments".to_string()),
    ] {
        let (status, body) = call(&app, method, &uri, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
        assert_eq!(body["errorCode"], "unauthorized");
    }

    let (_, account) = call(&app, "GET", &format!("/accounts/{}", PHONE), None).await;
    assert_eq!(account["balance"], 0);
    let (status, request) = admin(&app, "GET", &format!("/payments/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(request["status"], "pending");
}

#[tokio::test]
async fn test_admin_routes_closed_without_configured_token() {
    let h = harness_with(AppConfig::default(), vec![]);
    let app = router(h.context.clone());

    let (status, _) = call_as(&app, Some(""), "GET", "/payments", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = admin(&app, "GET", "/payments", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
