use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::response::Html;
use axum::routing::get;
use tower_http::trace::TraceLayer;
use whatsrelay_channels::WhatsAppState;
use whatsrelay_channels::whatsapp::{whatsapp_verify, whatsapp_webhook};

/// Build the application router.
pub fn build_router(whatsapp_state: WhatsAppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route(
            "/webhook",
            get(whatsapp_verify)
                .post(whatsapp_webhook)
                .layer(DefaultBodyLimit::disable()),
        )
        .with_state(whatsapp_state)
        .layer(TraceLayer::new_for_http())
}

async fn index() -> Html<&'static str> {
    Html("<pre>\n    Nothing to see here,\n    check the logs :)\n</pre>")
}

async fn health() -> &'static str {
    "ok"
}
