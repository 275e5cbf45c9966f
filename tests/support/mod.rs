use std::env;
use std::sync::OnceLock;

use sqlx::{PgPool, Row};
use tokio::sync::{Mutex, MutexGuard};

use aamarpay_upload::config::{GatewayConfig, StorageConfig};
use aamarpay_upload::gateway::AamarPayClient;
use aamarpay_upload::storage::Storage;
use aamarpay_upload::AppState;

fn split_db_url(url: &str) -> Result<(String, String), String> {
    let (base, query) = match url.split_once('?') {
        Some((base, query)) => (base.to_string(), Some(query)),
        None => (url.to_string(), None),
    };

    let db_start = base
        .rfind('/')
        .ok_or_else(|| "invalid database url".to_string())?;
    if db_start + 1 >= base.len() {
        return Err("database name is empty".to_string());
    }

    let db_name = base[db_start + 1..].to_string();
    let mut admin_url = format!("{}postgres", &base[..db_start + 1]);
    if let Some(query) = query {
        admin_url = format!("{admin_url}?{query}");
    }

    Ok((admin_url, db_name))
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

static TEST_DB_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub struct TestDb {
    pub pool: PgPool,
    _guard: MutexGuard<'static, ()>,
}

/// Recreate the test database and run migrations. Returns None when
/// TEST_DATABASE_URL is not set so callers can skip instead of failing on
/// machines without Postgres.
pub async fn try_init_test_db() -> Option<TestDb> {
    dotenvy::dotenv().ok();
    let test_url = match env::var("TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("TEST_DATABASE_URL not set, skipping database test");
            return None;
        }
    };
    let (admin_url, db_name) = split_db_url(&test_url).expect("invalid TEST_DATABASE_URL format");

    let lock = TEST_DB_LOCK.get_or_init(|| Mutex::new(()));
    let guard = lock.lock().await;

    let admin_pool = PgPool::connect(&admin_url).await.expect("connect admin db");

    let _ = sqlx::query("SELECT pg_advisory_lock(424242)")
        .execute(&admin_pool)
        .await;

    let quoted_name = quote_identifier(&db_name);
    let drop_sql = format!("DROP DATABASE IF EXISTS {quoted_name} WITH (FORCE)");
    let create_sql = format!("CREATE DATABASE {quoted_name}");

    let _ = sqlx::query(&drop_sql).execute(&admin_pool).await;
    if let Err(e) = sqlx::query(&create_sql).execute(&admin_pool).await {
        eprintln!("create test db error: {e}");
        let _ = sqlx::query(&drop_sql).execute(&admin_pool).await;
        sqlx::query(&create_sql)
            .execute(&admin_pool)
            .await
            .expect("create test db retry");
    }

    let _ = sqlx::query("SELECT pg_advisory_unlock(424242)")
        .execute(&admin_pool)
        .await;

    admin_pool.close().await;

    let pool = PgPool::connect(&test_url).await.expect("connect test db");
    sqlx::migrate!().run(&pool).await.expect("migrations");

    Some(TestDb {
        pool,
        _guard: guard,
    })
}

pub fn test_gateway_config(endpoint_url: &str) -> GatewayConfig {
    GatewayConfig {
        store_id: "test-store".to_string(),
        signature_key: "test-signature".to_string(),
        endpoint_url: endpoint_url.to_string(),
        success_url: "http://localhost/payments/callback/success".to_string(),
        fail_url: "http://localhost/payments/callback/fail".to_string(),
        cancel_url: "http://localhost/payments/callback/cancel".to_string(),
    }
}

pub async fn build_state(pool: PgPool) -> AppState {
    let storage = Storage::from_config(&StorageConfig {
        bucket: "test-bucket".to_string(),
        endpoint: Some("http://localhost:9000".to_string()),
    })
    .await;

    AppState {
        pool,
        storage,
        gateway: AamarPayClient::new(test_gateway_config("http://localhost:1/jsonpost.php")),
        queue: None,
        jwt_secret: "test-secret".to_string(),
    }
}

pub async fn insert_user(pool: &PgPool, suffix: &str) -> i32 {
    sqlx::query(
        r#"INSERT INTO users (username, email, password_hash)
           VALUES ($1, $2, 'test-hash')
           RETURNING id"#,
    )
    .bind(format!("user_{suffix}"))
    .bind(format!("user_{suffix}@example.com"))
    .fetch_one(pool)
    .await
    .expect("insert user")
    .get("id")
}

pub async fn insert_transaction(pool: &PgPool, user_id: i32, txn_id: &str, status: &str) -> i32 {
    sqlx::query(
        r#"INSERT INTO transactions (user_id, transaction_id, amount, status)
           VALUES ($1, $2, 100.00, $3)
           RETURNING id"#,
    )
    .bind(user_id)
    .bind(txn_id)
    .bind(status)
    .fetch_one(pool)
    .await
    .expect("insert transaction")
    .get("id")
}
