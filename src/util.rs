use std::time::Duration;

/// Builds the HTTP client used to fetch playlists
///
/// `timeout` bounds the whole request, body included.
///
/// # Errors
/// Errors when the TLS backend cannot be initialized
pub fn init_http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(format!(
            "{}/{} (+{})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            env!("CARGO_PKG_REPOSITORY")
        ))
        .connect_timeout(Duration::from_secs(10).min(timeout))
        .timeout(timeout)
        .build()
}
