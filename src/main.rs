use std::env;

use sqs_local::sqs;
use sqs::registry::QueueRegistry;

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let port: u16 = env_or("SQS_LOCAL_PORT", "9324")
        .parse()
        .expect("SQS_LOCAL_PORT must be a valid port number");
    let region = env_or("SQS_LOCAL_REGION", "us-east-1");
    let account_id = env_or("SQS_LOCAL_ACCOUNT_ID", "000000000000");

    let registry = QueueRegistry::new(region, account_id);
    let app = sqs::server::create_router(registry);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {addr}: {e}"));
    tracing::info!(%addr, "sqs-local listening");
    axum::serve(listener, app).await.unwrap();
}
