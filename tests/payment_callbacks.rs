use actix_web::test::TestRequest;
use actix_web::{test, web, App};
use serde_json::json;
use sqlx::Row;
use uuid::Uuid;

use aamarpay_upload::api::webhooks::{payment_cancel, payment_fail, payment_success};

mod support;

#[actix_web::test]
async fn successful_callback_completes_transaction_and_logs_activity() {
    let Some(test_db) = support::try_init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let suffix = Uuid::new_v4().simple().to_string();
    let txn_id = format!("TXN_20240101000000_{}", &suffix[..8]);

    let user_id = support::insert_user(pool, &suffix).await;
    support::insert_transaction(pool, user_id, &txn_id, "pending").await;

    let state = web::Data::new(support::build_state(pool.clone()).await);
    let app = test::init_service(App::new().app_data(state.clone()).service(payment_success)).await;

    let req = TestRequest::post()
        .uri("/payments/callback/success")
        .set_json(json!({
            "mer_txnid": txn_id,
            "pg_txnid": "AAM123456",
            "status_code": "2",
            "pay_status": "Successful",
            "amount": "100.00",
        }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let row = sqlx::query(
        "SELECT status, gateway_txn_id, gateway_response FROM transactions WHERE transaction_id = $1",
    )
    .bind(&txn_id)
    .fetch_one(pool)
    .await
    .expect("fetch transaction");

    assert_eq!(row.get::<String, _>("status"), "completed");
    assert_eq!(
        row.get::<Option<String>, _>("gateway_txn_id").as_deref(),
        Some("AAM123456")
    );
    // Callback payload is merged into the stored response for audit.
    let stored: serde_json::Value = row.get("gateway_response");
    assert_eq!(stored["pay_status"], "Successful");

    let activity_count: i64 = sqlx::query(
        "SELECT COUNT(*) AS total FROM activity_log WHERE user_id = $1 AND action = 'payment_completed'",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .expect("count activity")
    .get("total");
    assert_eq!(activity_count, 1);
}

#[actix_web::test]
async fn status_code_seven_marks_failed_without_activity() {
    let Some(test_db) = support::try_init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let suffix = Uuid::new_v4().simple().to_string();
    let txn_id = format!("TXN_20240101000000_{}", &suffix[..8]);

    let user_id = support::insert_user(pool, &suffix).await;
    support::insert_transaction(pool, user_id, &txn_id, "pending").await;

    let state = web::Data::new(support::build_state(pool.clone()).await);
    let app = test::init_service(App::new().app_data(state.clone()).service(payment_fail)).await;

    let req = TestRequest::post()
        .uri("/payments/callback/fail")
        .set_json(json!({
            "mer_txnid": txn_id,
            "pg_txnid": "AAM654321",
            "status_code": "7",
            "pay_status": "Failed",
        }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let status: String = sqlx::query("SELECT status FROM transactions WHERE transaction_id = $1")
        .bind(&txn_id)
        .fetch_one(pool)
        .await
        .expect("fetch transaction")
        .get("status");
    assert_eq!(status, "failed");

    let activity_count: i64 = sqlx::query(
        "SELECT COUNT(*) AS total FROM activity_log WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .expect("count activity")
    .get("total");
    assert_eq!(activity_count, 0);
}

#[actix_web::test]
async fn unrecognized_status_code_cancels() {
    let Some(test_db) = support::try_init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let suffix = Uuid::new_v4().simple().to_string();
    let txn_id = format!("TXN_20240101000000_{}", &suffix[..8]);

    let user_id = support::insert_user(pool, &suffix).await;
    support::insert_transaction(pool, user_id, &txn_id, "pending").await;

    let state = web::Data::new(support::build_state(pool.clone()).await);
    let app = test::init_service(App::new().app_data(state.clone()).service(payment_cancel)).await;

    let req = TestRequest::post()
        .uri("/payments/callback/cancel")
        .set_json(json!({
            "mer_txnid": txn_id,
            "status_code": "3",
            "pay_status": "Cancelled by user",
        }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let status: String = sqlx::query("SELECT status FROM transactions WHERE transaction_id = $1")
        .bind(&txn_id)
        .fetch_one(pool)
        .await
        .expect("fetch transaction")
        .get("status");
    assert_eq!(status, "cancelled");
}

#[actix_web::test]
async fn form_encoded_callback_is_accepted() {
    let Some(test_db) = support::try_init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let suffix = Uuid::new_v4().simple().to_string();
    let txn_id = format!("TXN_20240101000000_{}", &suffix[..8]);

    let user_id = support::insert_user(pool, &suffix).await;
    support::insert_transaction(pool, user_id, &txn_id, "pending").await;

    let state = web::Data::new(support::build_state(pool.clone()).await);
    let app = test::init_service(App::new().app_data(state.clone()).service(payment_success)).await;

    let body = format!("mer_txnid={txn_id}&pg_txnid=AAM777&status_code=2&pay_status=Successful");
    let req = TestRequest::post()
        .uri("/payments/callback/success")
        .insert_header(("content-type", "application/x-www-form-urlencoded"))
        .set_payload(body)
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let status: String = sqlx::query("SELECT status FROM transactions WHERE transaction_id = $1")
        .bind(&txn_id)
        .fetch_one(pool)
        .await
        .expect("fetch transaction")
        .get("status");
    assert_eq!(status, "completed");
}

#[actix_web::test]
async fn unknown_transaction_is_not_found_and_creates_nothing() {
    let Some(test_db) = support::try_init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;

    let state = web::Data::new(support::build_state(pool.clone()).await);
    let app = test::init_service(App::new().app_data(state.clone()).service(payment_success)).await;

    let req = TestRequest::post()
        .uri("/payments/callback/success")
        .set_json(json!({
            "mer_txnid": "TXN_19990101000000_deadbeef",
            "status_code": "2",
            "pay_status": "Successful",
        }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 404);

    let count: i64 = sqlx::query("SELECT COUNT(*) AS total FROM transactions")
        .fetch_one(pool)
        .await
        .expect("count transactions")
        .get("total");
    assert_eq!(count, 0);
}

#[actix_web::test]
async fn duplicate_callback_is_reprocessed_last_write_wins() {
    let Some(test_db) = support::try_init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let suffix = Uuid::new_v4().simple().to_string();
    let txn_id = format!("TXN_20240101000000_{}", &suffix[..8]);

    let user_id = support::insert_user(pool, &suffix).await;
    support::insert_transaction(pool, user_id, &txn_id, "pending").await;

    let state = web::Data::new(support::build_state(pool.clone()).await);
    let app = test::init_service(App::new().app_data(state.clone()).service(payment_success)).await;

    let first = TestRequest::post()
        .uri("/payments/callback/success")
        .set_json(json!({
            "mer_txnid": txn_id,
            "status_code": "2",
            "pay_status": "Successful",
        }))
        .to_request();
    assert!(test::call_service(&app, first).await.status().is_success());

    // A second callback for the already-terminal transaction is processed
    // again; the derived status follows the latest payload.
    let second = TestRequest::post()
        .uri("/payments/callback/success")
        .set_json(json!({
            "mer_txnid": txn_id,
            "status_code": "0",
            "pay_status": "Cancelled",
        }))
        .to_request();
    assert!(test::call_service(&app, second).await.status().is_success());

    let status: String = sqlx::query("SELECT status FROM transactions WHERE transaction_id = $1")
        .bind(&txn_id)
        .fetch_one(pool)
        .await
        .expect("fetch transaction")
        .get("status");
    assert_eq!(status, "cancelled");
}
