use anyhow::Context;
use axum::{Extension, Json, extract::Path, extract::State, response::IntoResponse};
use diesel::{ExpressionMethods, QueryDsl, QueryResult, SelectableHelper};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use tastebite_core::{
    aliases::DieselError,
    app_error::{AppError, StdResponse},
    app_state::AppState,
};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{
    checkout::{self, CartTotals, DELIVERY_FEE},
    middleware,
    models::{CartItemEntity, MenuItemEntity, UpsertCartItemEntity},
    schema::{
        cart_items::{self},
        menu_items, restaurants,
    },
};

/// Defines all customer-facing cart routes (authorization + CRUD with
/// upsert semantics).
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/customers/cart",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_cart))
            .routes(utoipa_axum::routes!(upsert_cart_item))
            .routes(utoipa_axum::routes!(update_cart_item))
            .routes(utoipa_axum::routes!(remove_cart_item))
            .route_layer(axum::middleware::from_fn(
                middleware::customers_authorization,
            )),
    )
}

#[derive(Serialize, ToSchema)]
pub struct CartMenuItem {
    pub id: Uuid,
    pub name: String,
    pub price: i32,
    pub restaurant_id: Uuid,
    pub restaurant_name: String,
}

#[derive(Serialize, ToSchema)]
pub struct CartLine {
    pub id: Uuid,
    pub quantity: i32,
    pub menu_item: CartMenuItem,
}

#[derive(Serialize, ToSchema)]
struct GetCartRes {
    items: Vec<CartLine>,
    totals: CartTotals,
    delivery_fee: i32,
    total_with_delivery: i32,
}

/// Fetch the authenticated user's cart, joined with menu item and
/// restaurant display data. An empty cart is an empty list, not an error.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Cart"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Get cart successfully", body = StdResponse<GetCartRes, String>)
    )
)]
async fn get_cart(
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let rows: Vec<(CartItemEntity, MenuItemEntity, String)> = cart_items::table
        .inner_join(menu_items::table.inner_join(restaurants::table))
        .filter(cart_items::user_id.eq(user_id))
        .select((
            CartItemEntity::as_select(),
            MenuItemEntity::as_select(),
            restaurants::name,
        ))
        .get_results(conn)
        .await
        .context("Failed to get cart items")?;

    let totals = checkout::compute_totals(
        rows.iter()
            .map(|(line, menu_item, _)| (menu_item.price, line.quantity)),
    );
    let items: Vec<CartLine> = rows
        .into_iter()
        .map(|(line, menu_item, restaurant_name)| CartLine {
            id: line.id,
            quantity: line.quantity,
            menu_item: CartMenuItem {
                id: menu_item.id,
                name: menu_item.name,
                price: menu_item.price,
                restaurant_id: menu_item.restaurant_id,
                restaurant_name,
            },
        })
        .collect();

    Ok(StdResponse {
        data: Some(GetCartRes {
            items,
            totals,
            delivery_fee: DELIVERY_FEE,
            total_with_delivery: totals.subtotal + DELIVERY_FEE,
        }),
        message: Some("Get cart successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct UpsertCartItemReq {
    menu_item_id: Uuid,
    quantity: i32,
}

/// Insert-or-update a cart line keyed on (user, menu item) with an absolute
/// quantity; quantity 0 deletes the line. The cart may only hold items from
/// one restaurant at a time.
#[utoipa::path(
    put,
    path = "/items",
    tags = ["Cart"],
    security(("bearerAuth" = [])),
    request_body = UpsertCartItemReq,
    responses(
        (status = 200, description = "Cart updated", body = StdResponse<CartItemEntity, String>)
    )
)]
async fn upsert_cart_item(
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
    Json(body): Json<UpsertCartItemReq>,
) -> Result<impl IntoResponse, AppError> {
    if body.quantity < 0 {
        return Err(AppError::BadRequest("Quantity cannot be negative".into()));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    if body.quantity == 0 {
        diesel::delete(
            cart_items::table
                .filter(cart_items::user_id.eq(user_id))
                .filter(cart_items::menu_item_id.eq(body.menu_item_id)),
        )
        .execute(conn)
        .await
        .context("Failed to remove cart item")?;

        return Ok(StdResponse {
            data: None,
            message: Some("Removed from cart"),
        });
    }

    let item = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let menu_item: MenuItemEntity = menu_items::table
                    .find(body.menu_item_id)
                    .filter(menu_items::is_available.eq(true))
                    .get_result(conn)
                    .await
                    .map_err(|_| AppError::NotFound)?;

                let foreign_lines: i64 = cart_items::table
                    .inner_join(menu_items::table)
                    .filter(cart_items::user_id.eq(user_id))
                    .filter(menu_items::restaurant_id.ne(menu_item.restaurant_id))
                    .count()
                    .get_result(conn)
                    .await
                    .context("Failed to check the cart's restaurant")?;

                if foreign_lines > 0 {
                    return Err(AppError::Validation(
                        "Cart contains items from another restaurant; clear it first".into(),
                    ));
                }

                let item: CartItemEntity = diesel::insert_into(cart_items::table)
                    .values(UpsertCartItemEntity {
                        user_id,
                        menu_item_id: menu_item.id,
                        quantity: body.quantity,
                    })
                    .on_conflict((cart_items::user_id, cart_items::menu_item_id))
                    .do_update()
                    .set((
                        cart_items::quantity.eq(body.quantity),
                        cart_items::updated_at.eq(diesel::dsl::now),
                    ))
                    .returning(CartItemEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to upsert cart item")?;

                Ok::<CartItemEntity, AppError>(item)
            })
        })
        .await?;

    Ok(StdResponse {
        data: Some(item),
        message: Some("Cart updated"),
    })
}

#[derive(Deserialize, ToSchema)]
struct UpdateCartItemReq {
    quantity: i32,
}

/// Set a cart line's quantity. Quantities below 1 are rejected without a
/// write; removal must go through the delete route instead.
#[utoipa::path(
    patch,
    path = "/items/{id}",
    tags = ["Cart"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "Cart line ID to update")
    ),
    request_body = UpdateCartItemReq,
    responses(
        (status = 200, description = "Quantity updated", body = StdResponse<CartItemEntity, String>)
    )
)]
async fn update_cart_item(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
    Json(body): Json<UpdateCartItemReq>,
) -> Result<impl IntoResponse, AppError> {
    checkout::validate_line_quantity(body.quantity)?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let line: QueryResult<CartItemEntity> = diesel::update(cart_items::table.find(id))
        .filter(cart_items::user_id.eq(user_id))
        .set((
            cart_items::quantity.eq(body.quantity),
            cart_items::updated_at.eq(diesel::dsl::now),
        ))
        .returning(CartItemEntity::as_returning())
        .get_result(conn)
        .await;

    match line {
        Ok(line) => Ok(StdResponse {
            data: Some(line),
            message: Some("Quantity updated"),
        }),
        Err(err) => match err {
            DieselError::NotFound => Err(AppError::NotFound),
            _ => Err(AppError::Other(err.into())),
        },
    }
}

/// Remove a cart line regardless of its quantity.
#[utoipa::path(
    delete,
    path = "/items/{id}",
    tags = ["Cart"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "Cart line ID to remove")
    ),
    responses(
        (status = 200, description = "Item removed", body = StdResponse<CartItemEntity, String>)
    )
)]
async fn remove_cart_item(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let line: QueryResult<CartItemEntity> = diesel::delete(
        cart_items::table
            .filter(cart_items::id.eq(id))
            .filter(cart_items::user_id.eq(user_id)),
    )
    .returning(CartItemEntity::as_returning())
    .get_result(conn)
    .await;

    match line {
        Ok(line) => Ok(StdResponse {
            data: Some(line),
            message: Some("Item removed"),
        }),
        Err(err) => match err {
            DieselError::NotFound => Err(AppError::NotFound),
            _ => Err(AppError::Other(err.into())),
        },
    }
}
