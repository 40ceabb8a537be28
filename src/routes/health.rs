use axum::http::StatusCode;

/// Fixed body returned by the liveness probe
pub const LIVENESS_MESSAGE: &str = "🚀 Blossom Honey API is running";

/// Liveness endpoint.
///
/// Reports that the process is up. It deliberately does not consult the
/// database, so supervisors keep the process alive while the database is
/// still connecting or unreachable.
pub async fn liveness() -> (StatusCode, &'static str) {
    (StatusCode::OK, LIVENESS_MESSAGE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_liveness_is_ok() {
        let (status, body) = liveness().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, LIVENESS_MESSAGE);
    }
}
