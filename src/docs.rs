use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::auth::register,
        crate::api::auth::login,
        crate::api::payments::initiate_payment,
        crate::api::payments::list_transactions,
        crate::api::payments::check_payment_status,
        crate::api::webhooks::payment_success,
        crate::api::webhooks::payment_fail,
        crate::api::webhooks::payment_cancel,
        crate::api::uploads::upload_file,
        crate::api::uploads::delete_file,
        crate::api::uploads::list_files,
        crate::api::uploads::list_activities
    ),
    components(
        schemas(
            crate::api::auth::RegisterRequest,
            crate::api::auth::LoginRequest,
            crate::api::auth::AuthResponse,
            crate::api::payments::InitiatePaymentRequest,
            crate::api::uploads::UploadAccepted,
            crate::models::Transaction,
            crate::models::Upload,
            crate::models::ActivityLogEntry,
            crate::models::TransactionStatus,
            crate::models::UploadStatus
        )
    ),
    tags(
        (name = "auth", description = "Authentication"),
        (name = "payments", description = "aamarPay payment initiation and status"),
        (name = "webhooks", description = "Callbacks from the payment gateway"),
        (name = "uploads", description = "Document uploads and word-count results")
    )
)]
pub struct ApiDoc;
