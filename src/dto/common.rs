use serde::Serialize;
use utoipa::ToSchema;

/// Number of items affected or matched by an operation.
#[derive(Debug, Serialize, ToSchema)]
pub struct CountResponse {
    /// Affected or matched items.
    pub count: u64,
}
