use axum::{
    middleware::from_fn,
    routing::{delete, get, post, put},
    Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use accred_api::config;
use accred_api::database::manager::DatabaseManager;
use accred_api::handlers::{
    admin, ai_analysis, application, auth, central_repo, document, institution, parameter,
};
use accred_api::middleware::auth::jwt_auth_middleware;
use accred_api::middleware::central_repo::identity_middleware;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "accred_api=info,tower_http=info".into()),
        )
        .init();

    let config = config::config();
    tracing::info!("Starting accreditation API in {:?} mode", config.environment);

    if let Err(e) = DatabaseManager::migrate().await {
        tracing::error!("Migration failed: {}", e);
        std::process::exit(1);
    }

    let app = app();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("Accreditation API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}

fn app() -> Router {
    let mut router = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/auth/login", post(auth::login_post))
        .merge(protected_routes())
        .merge(central_repo_routes());

    if config::config().security.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }

    router.layer(TraceLayer::new_for_http())
}

/// Routes requiring a valid JWT.
fn protected_routes() -> Router {
    Router::new()
        .route("/api/auth/whoami", get(auth::whoami_get))
        // Institution profile
        .route("/api/institution/create", post(institution::create_post))
        .route("/api/institution/update", put(institution::update_put))
        .route("/api/institution/my", get(institution::my_get))
        .route("/api/institution/all", get(institution::all_get))
        // Compliance parameters
        .route("/api/institutionparameter", get(parameter::merged_get))
        .route("/api/institutionparameter/create", post(parameter::create_post))
        .route("/api/institutionparameter/updates", put(parameter::updates_put))
        .route("/api/institutionparameter/save", put(parameter::save_put))
        // Applications
        .route("/api/application/create", post(application::create_post))
        .route("/api/application", get(application::my_get))
        .route("/api/application/all", get(application::all_get))
        .route("/api/application/:id", post(application::review_post))
        // Documents
        .route("/api/document/upload", post(document::upload_post))
        .route("/api/document/delete", delete(document::delete_delete))
        .route("/api/document/my", get(document::my_get))
        .route("/api/document/all", get(document::all_get))
        // AI analysis
        .route("/api/ai-analysis/process/:application_id", post(ai_analysis::process_post))
        .route("/api/ai-analysis/retry/:analysis_id", post(ai_analysis::retry_post))
        .route(
            "/api/ai-analysis/application/:application_id",
            get(ai_analysis::by_application_get),
        )
        .route("/api/ai-analysis/:id", get(ai_analysis::get))
        // Super-admin management
        .route("/api/admin/users", get(admin::users_get).post(admin::users_post))
        .route(
            "/api/admin/users/:id",
            get(admin::user_get).put(admin::user_put).delete(admin::user_delete),
        )
        .route(
            "/api/admin/parameters",
            get(admin::templates_get).post(admin::templates_post),
        )
        .route("/api/admin/parameters/bulk", post(admin::templates_bulk_post))
        .route(
            "/api/admin/parameters/:id",
            get(admin::template_get)
                .put(admin::template_put)
                .delete(admin::template_delete),
        )
        .route("/api/admin/parameters/:id/toggle", post(admin::template_toggle_post))
        .route("/api/admin/api-keys", get(admin::api_keys_get).post(admin::api_keys_post))
        .route("/api/admin/api-keys/:id", delete(admin::api_key_delete))
        .route("/api/admin/dashboard", get(admin::dashboard_get))
        .layer(from_fn(jwt_auth_middleware))
}

/// Central repository surface: identity resolved per request, handlers do
/// their own permission checks.
fn central_repo_routes() -> Router {
    Router::new()
        .route("/api/central-repo/institutions", get(central_repo::institutions_get))
        .route("/api/central-repo/institutions/:id", get(central_repo::institution_get))
        .route(
            "/api/central-repo/applications/:institution_id",
            get(central_repo::application_status_get),
        )
        .route("/api/central-repo/statistics", get(central_repo::statistics_get))
        .layer(from_fn(identity_middleware))
}

async fn root() -> axum::response::Json<Value> {
    axum::response::Json(json!({
        "name": "accred-api",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Institution accreditation workflow API",
    }))
}

async fn health() -> axum::response::Json<Value> {
    let database = match DatabaseManager::health_check().await {
        Ok(()) => "ok",
        Err(_) => "unreachable",
    };
    axum::response::Json(json!({
        "status": "ok",
        "database": database,
    }))
}
