use std::process;
use std::sync::Arc;

use axum::Router;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::net::TcpListener;
use tracing_subscriber::{fmt::{writer::BoxMakeWriter, Layer}, layer::SubscriberExt, EnvFilter, Registry};

use marketplace_ledger::db::{PgStore, Store};
use marketplace_ledger::routes::{self, auth::AuthService, AppState};
use marketplace_ledger::services::{
    LogNotifier, Notifier, OrderService, PaymentService, SmsGateway, WithdrawService,
};
use marketplace_ledger::MarketConfig;

#[tokio::main]
async fn main() {
    // mandatory fields
    let db_url = match dotenv::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("DATABASE_URL must be set");
            process::exit(1);
        }
    };
    let jwt_secret = dotenv::var("JWT_SECRET").unwrap_or("your-jwt-secret".to_string());
    // optional fields
    let max_connection_pooling = dotenv::var("MAX_CONNECTION_POOLING").ok().and_then(|v| v.parse::<u32>().ok()).unwrap_or(5);
    let port = dotenv::var("PORT").ok().and_then(|v| v.parse::<u16>().ok()).unwrap_or(3000);
    let log_file = dotenv::var("LOG_FILE").unwrap_or("app.log".to_string());

    // add tracing layer
    let file_appender = tracing_appender::rolling::never(".", &log_file);
    let (file_writer, _file_guard) = tracing_appender::non_blocking(file_appender);
    let (stdout_writer, _stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

    // json lines to the log file, plain text to stdout
    let file_layer = Layer::new().json().with_writer(BoxMakeWriter::new(move || file_writer.clone()));
    let stdout_layer = Layer::new().with_writer(BoxMakeWriter::new(move || stdout_writer.clone()));

    let subscriber = Registry::default()
        .with(EnvFilter::from_default_env())
        .with(file_layer)
        .with(stdout_layer);

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Unable to set global subscriber: {err}");
        process::exit(1);
    }

    let config = match MarketConfig::from_env() {
        Ok(config) => Arc::new(config),
        Err(err) => {
            tracing::error!("Invalid market configuration: {}", err);
            process::exit(1);
        }
    };

    let database_pool = match process_database(&db_url, max_connection_pooling).await {
        Ok(db) => {
            tracing::info!("Connected to database");
            db
        }
        Err(err) => {
            tracing::error!("Failed to connect to database: {}", err);
            process::exit(1);
        }
    };

    let listener = match TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => {
            tracing::info!("Listening on port: {}", port);
            listener
        }
        Err(err) => {
            tracing::error!("Failed to bind to port: {}", err);
            process::exit(1);
        }
    };

    let router = process_begin(database_pool, jwt_secret, config);
    tracing::info!("Routes constructed successfully");

    //start the http service
    let http_service = axum::serve(listener, router);
    if let Err(err) = http_service.await {
        tracing::error!("Failed to start server: {}", err);
        process::exit(1);
    }
}

fn build_notifier(config: &MarketConfig) -> Arc<dyn Notifier> {
    match (dotenv::var("SMS_API_URL"), dotenv::var("SMS_API_KEY")) {
        (Ok(api_url), Ok(api_key)) => {
            tracing::info!("SMS gateway configured at {}", api_url);
            match SmsGateway::new(api_url, api_key, config.notification_timeout) {
                Ok(gateway) => Arc::new(gateway),
                Err(err) => {
                    tracing::error!("Failed to build SMS gateway client: {}", err);
                    process::exit(1);
                }
            }
        }
        _ => {
            tracing::warn!("SMS_API_URL or SMS_API_KEY unset, notifications will only be logged");
            Arc::new(LogNotifier)
        }
    }
}

fn process_begin(db_pool: PgPool, jwt_secret: String, config: Arc<MarketConfig>) -> Router {
    let store: Arc<dyn Store> = Arc::new(PgStore::new(db_pool));
    let notifier = build_notifier(&config);

    let state = AppState {
        auth: Arc::new(AuthService::new(jwt_secret)),
        orders: Arc::new(OrderService::new(store.clone(), notifier.clone(), config.clone())),
        payments: Arc::new(PaymentService::new(store.clone(), notifier.clone(), config.clone())),
        withdraws: Arc::new(WithdrawService::new(store, notifier, config)),
    };

    routes::app_router(state)
}

async fn process_database(url: &str, max_conn_pool: u32) -> Result<PgPool, String> {
    // create a connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(max_conn_pool)
        .connect(url)
        .await
        .map_err(|err| format!("Failed to connect to database: {}", err))?;

    match sqlx::migrate!("./migrations").run(&db_pool).await {
        Ok(_) => {
            tracing::info!("Migrations run successfully");
        }
        Err(err) => {
            // assume the schema is already in place and keep going
            tracing::warn!("Failed to run migrations: {err}");
        }
    }

    Ok(db_pool)
}
