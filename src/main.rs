// src/main.rs

use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use dotenvy::dotenv;
use sqlx::PgPool;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use aamarpay_upload::config::Config;
use aamarpay_upload::gateway::AamarPayClient;
use aamarpay_upload::queue::{self, JobQueue};
use aamarpay_upload::storage::Storage;
use aamarpay_upload::{api, docs, AppState};

async fn index() -> impl Responder {
    HttpResponse::Ok().body("Service ready!")
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env().expect("invalid configuration");

    let pool = PgPool::connect(&config.database_url)
        .await
        .expect("Failed to connect to DB");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let storage = Storage::from_config(&config.storage).await;
    let gateway = AamarPayClient::new(config.gateway.clone());

    let job_queue = match &config.amqp_url {
        Some(url) => match JobQueue::connect(url).await {
            Ok(q) => Some(q),
            Err(e) => {
                log::error!("rabbitmq connect error, processing disabled: {e}");
                None
            }
        },
        None => {
            log::warn!("RABBITMQ_URL not set, word-count processing disabled");
            None
        }
    };

    if let Some(q) = job_queue.clone() {
        queue::start_worker(
            q,
            pool.clone(),
            storage.clone(),
            config.sweep_interval_secs,
        );
    }

    let state = web::Data::new(AppState {
        pool,
        storage,
        gateway,
        queue: job_queue,
        jwt_secret: config.jwt_secret.clone(),
    });

    let bind = (config.bind_addr.clone(), config.bind_port);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/", web::get().to(index))
            .service(
                SwaggerUi::new("/docs/{_:.*}")
                    .url("/api-docs/openapi.json", docs::ApiDoc::openapi()),
            )
            // Public auth routes
            .service(api::auth::register)
            .service(api::auth::login)
            // Authenticated routes
            .service(
                web::scope("/api")
                    .wrap(api::auth::JwtMiddleware)
                    .service(api::payments::initiate_payment)
                    .service(api::payments::list_transactions)
                    .service(api::payments::check_payment_status)
                    .service(api::uploads::upload_file)
                    .service(api::uploads::delete_file)
                    .service(api::uploads::list_files)
                    .service(api::uploads::list_activities),
            )
            // Gateway callbacks (public)
            .service(api::webhooks::payment_success)
            .service(api::webhooks::payment_fail)
            .service(api::webhooks::payment_cancel)
    })
    .bind(bind)?
    .run()
    .await
}
