use anyhow::Context;
use axum::{Extension, extract::State, response::IntoResponse};
use diesel::{QueryDsl, QueryResult};
use diesel_async::RunQueryDsl;
use tastebite_core::{
    aliases::DieselError,
    app_error::{AppError, StdResponse},
    app_state::AppState,
};
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{middleware, models::ProfileEntity, schema::profiles};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/customers/profile",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_profile))
            .route_layer(axum::middleware::from_fn(
                middleware::customers_authorization,
            )),
    )
}

/// Fetch the authenticated user's profile, used to prefill the delivery
/// address at checkout. 404 until a first order has saved an address.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Profile"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Get profile successfully", body = StdResponse<ProfileEntity, String>)
    )
)]
async fn get_profile(
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let profile: QueryResult<ProfileEntity> = profiles::table.find(user_id).get_result(conn).await;

    match profile {
        Ok(profile) => Ok(StdResponse {
            data: Some(profile),
            message: Some("Get profile successfully"),
        }),
        Err(err) => match err {
            DieselError::NotFound => Err(AppError::NotFound),
            _ => Err(AppError::Other(err.into())),
        },
    }
}
