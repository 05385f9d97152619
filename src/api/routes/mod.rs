pub mod health;
pub mod summary;

/// Body of `GET /`
pub const BANNER: &str = "Server Monitor API Running";

/// GET /
pub async fn root() -> &'static str {
    BANNER
}
