//! Webhook receiver tests: signature verification and event dispatch

mod common;

use axum::body::Bytes;
use axum::http::StatusCode;
use common::*;
use tower::ServiceExt;

/// 10 minutes ago, beyond the 5-minute tolerance
fn old_timestamp() -> String {
    (chrono::Utc::now().timestamp() - 600).to_string()
}

// ============ Stripe Signature Verification Tests ============

#[test]
fn test_stripe_valid_signature() {
    let client = stripe_client();
    let payload = br#"{"type":"checkout.session.completed"}"#;
    let timestamp = current_timestamp();
    let signature = compute_stripe_signature(payload, WEBHOOK_SECRET, &timestamp);
    let header = format!("t={},v1={}", timestamp, signature);

    let result = client.verify_webhook_signature(payload, &header);
    assert!(result.is_ok());
    assert!(result.unwrap(), "Valid signature should verify");
}

#[test]
fn test_stripe_wrong_secret() {
    let client = stripe_client();
    let payload = br#"{"type":"checkout.session.completed"}"#;
    let timestamp = current_timestamp();
    let signature = compute_stripe_signature(payload, "whsec_wrong", &timestamp);
    let header = format!("t={},v1={}", timestamp, signature);

    assert!(!client.verify_webhook_signature(payload, &header).unwrap());
}

#[test]
fn test_stripe_tampered_payload() {
    let client = stripe_client();
    let timestamp = current_timestamp();
    let signature = compute_stripe_signature(b"original", WEBHOOK_SECRET, &timestamp);
    let header = format!("t={},v1={}", timestamp, signature);

    assert!(!client.verify_webhook_signature(b"tampered", &header).unwrap());
}

#[test]
fn test_stripe_old_timestamp_rejected() {
    let client = stripe_client();
    let payload = b"{}";
    let timestamp = old_timestamp();
    let signature = compute_stripe_signature(payload, WEBHOOK_SECRET, &timestamp);
    let header = format!("t={},v1={}", timestamp, signature);

    assert!(
        !client.verify_webhook_signature(payload, &header).unwrap(),
        "Replayed webhook outside the tolerance window must be rejected"
    );
}

#[test]
fn test_stripe_malformed_headers() {
    let client = stripe_client();
    let payload = b"{}";

    for header in ["", "v1=abc", "t=123", "t=notanumber,v1=abc", "garbage"] {
        let result = client.verify_webhook_signature(payload, header);
        assert!(
            matches!(result, Err(EventError::Verification(_))),
            "header {:?} should be a format error",
            header
        );
    }
}

// ============ Receiver dispatch ============

struct Paid {
    app: TestApp,
    buyer: User,
    snapshot: CartSnapshot,
}

fn setup_paid_cart() -> Paid {
    let app = test_app();
    let (buyer, snapshot) = {
        let conn = app.conn();
        let seller = create_test_user(&conn, "seller|hook");
        let buyer = create_test_user(&conn, "buyer|hook");
        let icons = create_test_file(&conn, &seller.id, "Icon pack", 999, "usd");
        let font = create_test_file(&conn, &seller.id, "Display font", 450, "usd");
        queries::add_cart_item(&conn, &buyer.id, &icons.id).unwrap();
        queries::add_cart_item(&conn, &buyer.id, &font.id).unwrap();
        let snapshot =
            queries::create_cart_snapshot(&conn, &buyer.id, &[line_item(&icons), line_item(&font)])
                .unwrap();
        (buyer, snapshot)
    };
    Paid {
        app,
        buyer,
        snapshot,
    }
}

#[tokio::test]
async fn test_completed_event_materializes_order() {
    let p = setup_paid_cart();
    let payload = checkout_completed_payload("cs_hook_1", &p.buyer.id, &p.snapshot.id, 1449);
    let header = stripe_signature_header(payload.as_bytes());

    let response = p
        .app
        .router()
        .oneshot(webhook_request(&payload, Some(&header)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let conn = p.app.conn();
    let order = queries::get_order_by_payment_session(&conn, "cs_hook_1")
        .unwrap()
        .expect("order created");
    assert_eq!(order.total_cents, 1449);
    assert_eq!(queries::list_order_items(&conn, &order.id).unwrap().len(), 2);
    assert!(queries::list_cart_items(&conn, &p.buyer.id).unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_delivery_is_acknowledged_once() {
    let p = setup_paid_cart();
    let payload = checkout_completed_payload("cs_hook_dup", &p.buyer.id, &p.snapshot.id, 1449);

    let first = handlers::webhooks::handle_webhook(
        &p.app.state,
        &signed_headers(&payload),
        &Bytes::from(payload.clone()),
    );
    let second = handlers::webhooks::handle_webhook(
        &p.app.state,
        &signed_headers(&payload),
        &Bytes::from(payload.clone()),
    );

    let WebhookOutcome::Materialized { order_id } = first else {
        panic!("first delivery should materialize, got {:?}", first);
    };
    assert_eq!(second, WebhookOutcome::AlreadyMaterialized { order_id });
    assert_eq!(second.status_code(), StatusCode::OK);
    assert_eq!(count_rows(&p.app.conn(), "orders"), 1);
}

#[tokio::test]
async fn test_storage_fault_requests_redelivery() {
    let p = setup_paid_cart();
    let payload = checkout_completed_payload("cs_hook_fault", &p.buyer.id, &p.snapshot.id, 1449);
    p.app.conn().execute_batch("DROP TABLE order_items").unwrap();

    let response = p
        .app
        .router()
        .oneshot(webhook_request(&payload, Some(&stripe_signature_header(payload.as_bytes()))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // The half-written order rolled back and the cart is untouched
    {
        let conn = p.app.conn();
        assert_eq!(count_rows(&conn, "orders"), 0);
        assert_eq!(queries::list_cart_items(&conn, &p.buyer.id).unwrap().len(), 2);
        init_db(&conn).unwrap();
    }

    let redelivery = handlers::webhooks::handle_webhook(
        &p.app.state,
        &signed_headers(&payload),
        &Bytes::from(payload.clone()),
    );
    assert!(
        matches!(redelivery, WebhookOutcome::Materialized { .. }),
        "redelivery after recovery should materialize, got {:?}",
        redelivery
    );
    let conn = p.app.conn();
    assert_eq!(count_rows(&conn, "orders"), 1);
    assert_eq!(count_rows(&conn, "order_items"), 2);
}

fn signed_headers(payload: &str) -> axum::http::HeaderMap {
    let mut headers = axum::http::HeaderMap::new();
    headers.insert(
        "stripe-signature",
        stripe_signature_header(payload.as_bytes()).parse().unwrap(),
    );
    headers
}

#[tokio::test]
async fn test_bad_signature_rejected_without_side_effects() {
    let p = setup_paid_cart();
    let payload = checkout_completed_payload("cs_hook_forged", &p.buyer.id, &p.snapshot.id, 1449);
    let timestamp = current_timestamp();
    let forged = format!(
        "t={},v1={}",
        timestamp,
        compute_stripe_signature(payload.as_bytes(), "whsec_attacker", &timestamp)
    );

    let response = p
        .app
        .router()
        .oneshot(webhook_request(&payload, Some(&forged)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let conn = p.app.conn();
    assert_eq!(count_rows(&conn, "orders"), 0);
    assert_eq!(queries::list_cart_items(&conn, &p.buyer.id).unwrap().len(), 2);
}

#[tokio::test]
async fn test_missing_signature_header_rejected() {
    let p = setup_paid_cart();
    let payload = checkout_completed_payload("cs_hook_nosig", &p.buyer.id, &p.snapshot.id, 1449);

    let response = p
        .app
        .router()
        .oneshot(webhook_request(&payload, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(count_rows(&p.app.conn(), "orders"), 0);
}

#[tokio::test]
async fn test_missing_snapshot_is_acknowledged() {
    let p = setup_paid_cart();
    let payload = checkout_completed_payload(
        "cs_hook_lost",
        &p.buyer.id,
        "fm_snap_00000000000000000000000000000000",
        1449,
    );
    let header = stripe_signature_header(payload.as_bytes());

    let response = p
        .app
        .router()
        .oneshot(webhook_request(&payload, Some(&header)))
        .await
        .unwrap();

    // Redelivery cannot fix a missing snapshot, so the gateway must stop retrying
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(count_rows(&p.app.conn(), "orders"), 0);
}

#[tokio::test]
async fn test_tampered_amount_stores_snapshot_total() {
    let p = setup_paid_cart();
    let payload = checkout_completed_payload("cs_hook_cheap", &p.buyer.id, &p.snapshot.id, 1);
    let header = stripe_signature_header(payload.as_bytes());

    let response = p
        .app
        .router()
        .oneshot(webhook_request(&payload, Some(&header)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let order = queries::get_order_by_payment_session(&p.app.conn(), "cs_hook_cheap")
        .unwrap()
        .unwrap();
    assert_eq!(order.total_cents, 1449);
}

#[tokio::test]
async fn test_completion_without_snapshot_metadata_is_acknowledged() {
    let p = setup_paid_cart();
    let payload = serde_json::json!({
        "type": "checkout.session.completed",
        "data": {"object": {
            "id": "cs_hook_nometa",
            "payment_status": "paid",
            "client_reference_id": p.buyer.id
        }}
    })
    .to_string();

    let outcome =
        handlers::webhooks::handle_webhook(&p.app.state, &signed_headers(&payload), &Bytes::from(payload));
    assert!(matches!(outcome, WebhookOutcome::Acknowledged(_)));
    assert_eq!(outcome.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_verified_garbage_is_bad_request() {
    let p = setup_paid_cart();
    let payload = "this is not json".to_string();

    let outcome =
        handlers::webhooks::handle_webhook(&p.app.state, &signed_headers(&payload), &Bytes::from(payload));
    assert!(matches!(outcome, WebhookOutcome::Rejected(_)));
    assert_eq!(outcome.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unrelated_and_unpaid_events_ignored() {
    let p = setup_paid_cart();
    let unrelated = r#"{"type":"invoice.paid","data":{"object":{"id":"in_1"}}}"#.to_string();
    let unpaid = serde_json::json!({
        "type": "checkout.session.completed",
        "data": {"object": {
            "id": "cs_hook_unpaid",
            "payment_status": "unpaid",
            "client_reference_id": p.buyer.id,
            "metadata": {"snapshot_id": p.snapshot.id}
        }}
    })
    .to_string();

    for payload in [unrelated, unpaid] {
        let outcome = handlers::webhooks::handle_webhook(
            &p.app.state,
            &signed_headers(&payload),
            &Bytes::from(payload.clone()),
        );
        assert!(
            matches!(outcome, WebhookOutcome::Ignored { .. }),
            "expected Ignored, got {:?}",
            outcome
        );
    }
    assert_eq!(count_rows(&p.app.conn(), "orders"), 0);
}

#[tokio::test]
async fn test_account_updated_sets_onboarding_flags() {
    let app = test_app();
    {
        let conn = app.conn();
        let seller = create_test_user(&conn, "seller|onboarding");
        queries::create_seller_account(&conn, &seller.id, "acct_onboard").unwrap();
    }
    let payload = serde_json::json!({
        "type": "account.updated",
        "data": {"object": {
            "id": "acct_onboard",
            "charges_enabled": true,
            "details_submitted": true
        }}
    })
    .to_string();

    let response = app
        .router()
        .oneshot(webhook_request(
            &payload,
            Some(&stripe_signature_header(payload.as_bytes())),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let account = queries::get_seller_account_by_gateway_id(&app.conn(), "acct_onboard")
        .unwrap()
        .unwrap();
    assert!(account.charges_enabled);
    assert!(account.details_submitted);

    // Unknown accounts are acknowledged, not retried
    let unknown = r#"{"type":"account.updated","data":{"object":{"id":"acct_nobody"}}}"#;
    let outcome = handlers::webhooks::handle_webhook(
        &app.state,
        &signed_headers(unknown),
        &Bytes::from(unknown),
    );
    assert_eq!(outcome, WebhookOutcome::Acknowledged("Seller account not found"));
}

#[test]
fn test_outcome_status_mapping() {
    let cases = [
        (WebhookOutcome::Materialized { order_id: "o".into() }, StatusCode::OK),
        (WebhookOutcome::AlreadyMaterialized { order_id: "o".into() }, StatusCode::OK),
        (WebhookOutcome::Acknowledged("x"), StatusCode::OK),
        (WebhookOutcome::Ignored { kind: "x".into() }, StatusCode::OK),
        (WebhookOutcome::Rejected("x"), StatusCode::BAD_REQUEST),
        (WebhookOutcome::RetryLater, StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (outcome, expected) in cases {
        assert_eq!(outcome.status_code(), expected, "{:?}", outcome);
    }
}
