use anyhow::Context;
use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::Deserialize;
use tastebite_core::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{
    models::{OrderEntity, OrderStatus},
    schema::orders::{self},
};

/// Status ingestion for the external fulfillment process. Orders are
/// created by customers; every later status change arrives here.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/fulfillment/orders",
        OpenApiRouter::new().routes(utoipa_axum::routes!(update_order_status)),
    )
}

#[derive(Deserialize, ToSchema)]
struct UpdateOrderStatusReq {
    status: OrderStatus,
}

/// Move an order to a new lifecycle status, rejecting illegal transitions.
#[utoipa::path(
    patch,
    path = "/{id}/status",
    tags = ["Fulfillment"],
    params(
        ("id" = Uuid, Path, description = "Order ID to update")
    ),
    request_body = UpdateOrderStatusReq,
    responses(
        (status = 200, description = "Order status updated", body = StdResponse<OrderEntity, String>),
        (status = 400, description = "Illegal status transition")
    )
)]
async fn update_order_status(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<UpdateOrderStatusReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let updated_order = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let order: OrderEntity = orders::table
                    .find(id)
                    .for_update()
                    .get_result(conn)
                    .await
                    .map_err(|_| AppError::NotFound)?;

                let current = OrderStatus::parse(&order.status).ok_or_else(|| {
                    AppError::Other(anyhow::anyhow!(
                        "Order {} has unknown status {:?}",
                        order.id,
                        order.status
                    ))
                })?;

                if !current.can_transition_to(body.status) {
                    return Err(AppError::BadRequest(format!(
                        "Cannot move order from {current} to {}",
                        body.status
                    )));
                }

                let updated_order: OrderEntity = diesel::update(orders::table.find(id))
                    .set((
                        orders::status.eq(body.status.as_str()),
                        orders::updated_at.eq(diesel::dsl::now),
                    ))
                    .returning(OrderEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to update order status")?;

                Ok::<OrderEntity, AppError>(updated_order)
            })
        })
        .await?;

    tracing::info!(
        "Order #{} moved to {}",
        updated_order.id,
        updated_order.status
    );

    Ok(StdResponse {
        data: Some(updated_order),
        message: Some("Order status updated"),
    })
}
