use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `ok`, or `degraded` while storage is unreachable.
    pub status: &'static str,
    /// Whether data routes currently answer 503.
    pub degraded: bool,
}

impl HealthResponse {
    /// Build the response for the current degraded flag.
    pub fn from_degraded(degraded: bool) -> Self {
        Self {
            status: if degraded { "degraded" } else { "ok" },
            degraded,
        }
    }
}
