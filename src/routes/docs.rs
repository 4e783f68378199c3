use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

/// Serve the Swagger UI at `/docs` backed by the generated OpenAPI document.
pub fn router(state: SharedState) -> Router<SharedState> {
    let ui: Router<SharedState> = SwaggerUi::new("/docs")
        .url("/api-doc/openapi.json", ApiDoc::openapi())
        .into();

    ui.with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_every_tagged_area() {
        let doc = ApiDoc::openapi();
        for path in [
            "/auth/signup",
            "/games/{id}/join",
            "/games/{id}/chat",
            "/notifications/stream",
            "/admin/reports/{id}/resolve",
            "/healthcheck",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let schemes = doc
            .components
            .as_ref()
            .map(|components| components.security_schemes.contains_key("bearer"));
        assert_eq!(schemes, Some(true));
    }
}
