#[tokio::main]
async fn main() {
    carelog_observability::init();

    let config = carelog_api::config::Config::from_env();
    let port = config.port;

    let app = carelog_api::app::build_app(config).await;

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .unwrap_or_else(|e| panic!("failed to bind 0.0.0.0:{port}: {e}"));

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
