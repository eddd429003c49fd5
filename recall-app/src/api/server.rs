use axum::{routing::{get, post}, Router};
use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;
use tokio::net::TcpListener;
use tracing::info;

use recall_core::{Calendar, Repository};
use crate::api::routes::{self, AppState};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/subjects", get(routes::list_subjects))
        .route("/due", get(routes::due_cards))
        .route("/sessions", post(routes::create_session))
        .route("/sessions/:id", get(routes::get_session).delete(routes::close_session))
        .route("/sessions/:id/reveal", post(routes::reveal))
        .route("/sessions/:id/rate", post(routes::rate))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn run(repo: Arc<dyn Repository>, addr: SocketAddr, calendar: Calendar) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(repo, calendar));
    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "api listening");
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
