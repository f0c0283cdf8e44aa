use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

pub mod caller;
pub mod groups;
pub mod health;
pub mod rooms;
pub mod sse;

/// Compose the REST, SSE and Swagger UI trees over the shared state.
pub fn router(state: SharedState) -> Router<()> {
    let swagger: Router<SharedState> = SwaggerUi::new("/docs")
        .url("/api-doc/openapi.json", ApiDoc::openapi())
        .into();

    health::router()
        .merge(sse::router())
        .merge(groups::router())
        .merge(rooms::router())
        .merge(swagger)
        .with_state(state)
}
