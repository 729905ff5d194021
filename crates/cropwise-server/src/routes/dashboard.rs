use axum::response::Html;

const PAGE: &str = include_str!("../../static/dashboard.html");

/// GET /dashboard - single-page UI over the JSON API.
pub async fn dashboard() -> Html<&'static str> {
    Html(PAGE)
}
