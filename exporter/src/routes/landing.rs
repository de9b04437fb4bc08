use axum::response::Html;

const LANDING_PAGE: &str = "<html>
<head><title>BTCD Exporter</title></head>
<body>
<h1>BTCD Exporter</h1>
<p><a href='/metrics'>Metrics</a></p>
</body>
</html>
";

/// `GET /`
///
/// Static landing page pointing at `/metrics`.
pub async fn landing() -> Html<&'static str> {
    Html(LANDING_PAGE)
}
