use std::collections::HashMap;

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
    checkout, middleware,
    models::{
        CartItemEntity, CreateOrderEntity, MenuItemEntity, OrderEntity, OrderItemEntity,
        OrderStatus,
    },
    schema::{
        cart_items::{self},
        menu_items,
        order_items::{self},
        orders::{self},
        profiles, restaurants,
    },
};

/// Defines all customer-facing order routes (placement + history).
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/customers/orders",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(place_order))
            .routes(utoipa_axum::routes!(get_my_orders))
            .routes(utoipa_axum::routes!(get_order))
            .route_layer(axum::middleware::from_fn(
                middleware::customers_authorization,
            )),
    )
}

#[derive(Deserialize, ToSchema)]
struct PlaceOrderReq {
    delivery_address: String,
}

#[derive(Serialize, ToSchema)]
struct PlaceOrderRes {
    order: OrderEntity,
    order_items: Vec<OrderItemEntity>,
}

/// Convert the caller's cart into an order plus line-item snapshots, clear
/// the cart, and remember the delivery address for next time.
///
/// The cart read, order insert, line-item inserts and cart clear run in one
/// transaction; the cart rows are locked so a concurrent checkout for the
/// same user re-reads an emptied cart and fails validation instead of
/// producing a duplicate order.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    request_body = PlaceOrderReq,
    responses(
        (status = 200, description = "Order placed successfully", body = StdResponse<PlaceOrderRes, String>),
        (status = 422, description = "Empty cart or blank delivery address")
    )
)]
async fn place_order(
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
    Json(body): Json<PlaceOrderReq>,
) -> Result<impl IntoResponse, AppError> {
    let delivery_address = checkout::validate_delivery_address(&body.delivery_address)?.to_string();
    let order_address = delivery_address.clone();

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let (order, order_items) = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let cart_items: Vec<CartItemEntity> = cart_items::table
                    .filter(cart_items::user_id.eq(user_id))
                    .for_update()
                    .get_results(conn)
                    .await
                    .context("Failed to lock cart items")?;

                if cart_items.is_empty() {
                    return Err(AppError::Validation(
                        "Cart is empty; add items before placing an order".into(),
                    ));
                }

                let menu_item_ids: Vec<Uuid> =
                    cart_items.iter().map(|line| line.menu_item_id).collect();
                let menu_items: Vec<MenuItemEntity> = menu_items::table
                    .filter(menu_items::id.eq_any(&menu_item_ids))
                    .get_results(conn)
                    .await
                    .context("Failed to get menu items for checkout")?;

                let restaurant_id = checkout::single_restaurant_id(&menu_items)?;
                let menu_by_id: HashMap<Uuid, MenuItemEntity> =
                    menu_items.into_iter().map(|item| (item.id, item)).collect();

                let priced = checkout::price_cart_lines(&cart_items, &menu_by_id)?;
                let totals =
                    checkout::compute_totals(priced.iter().map(|line| (line.price, line.quantity)));

                let order: OrderEntity = diesel::insert_into(orders::table)
                    .values(CreateOrderEntity {
                        user_id,
                        restaurant_id,
                        total_amount: totals.subtotal,
                        delivery_address: order_address,
                        status: OrderStatus::Pending.as_str().into(),
                    })
                    .returning(OrderEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to create order")?;

                let order_items: Vec<OrderItemEntity> = diesel::insert_into(order_items::table)
                    .values(checkout::order_item_snapshots(order.id, &priced))
                    .returning(OrderItemEntity::as_returning())
                    .get_results(conn)
                    .await
                    .context("Failed to create order items")?;

                diesel::delete(cart_items::table.filter(cart_items::user_id.eq(user_id)))
                    .execute(conn)
                    .await
                    .context("Failed to clear cart")?;

                Ok::<(OrderEntity, Vec<OrderItemEntity>), AppError>((order, order_items))
            })
        })
        .await?;

    // Saved-address update is best-effort and never rolls back the order.
    let profile_update = diesel::insert_into(profiles::table)
        .values((
            profiles::id.eq(user_id),
            profiles::address.eq(&delivery_address),
        ))
        .on_conflict(profiles::id)
        .do_update()
        .set((
            profiles::address.eq(&delivery_address),
            profiles::updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)
        .await;
    if let Err(err) = profile_update {
        tracing::warn!("Failed to update saved address for user {user_id}: {err}");
    }

    Ok(StdResponse {
        data: Some(PlaceOrderRes { order, order_items }),
        message: Some("Order placed successfully"),
    })
}

#[derive(Serialize, ToSchema)]
struct OrderLineItem {
    pub menu_item_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub price: i32,
}

#[derive(Serialize, ToSchema)]
struct GetOrderRes {
    pub order: OrderEntity,
    pub restaurant_name: String,
    pub order_items: Vec<OrderLineItem>,
}

/// Fetch all orders belonging to the authenticated user, newest first.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "List my orders", body = StdResponse<Vec<GetOrderRes>, String>)
    )
)]
async fn get_my_orders(
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let orders: Vec<(OrderEntity, String)> = orders::table
        .inner_join(restaurants::table)
        .filter(orders::user_id.eq(user_id))
        .order_by(orders::created_at.desc())
        .select((OrderEntity::as_select(), restaurants::name))
        .get_results(conn)
        .await
        .context("Failed to get my orders")?;

    let order_ids: Vec<Uuid> = orders.iter().map(|(order, _)| order.id).collect();
    let items: Vec<(OrderItemEntity, String)> = order_items::table
        .inner_join(menu_items::table)
        .filter(order_items::order_id.eq_any(&order_ids))
        .select((OrderItemEntity::as_select(), menu_items::name))
        .get_results(conn)
        .await
        .context("Failed to get order items")?;

    let mut group: HashMap<Uuid, Vec<OrderLineItem>> = HashMap::new();
    for (item, name) in items {
        group.entry(item.order_id).or_default().push(OrderLineItem {
            menu_item_id: item.menu_item_id,
            name,
            quantity: item.quantity,
            price: item.price,
        });
    }

    let orders_with_items: Vec<GetOrderRes> = orders
        .into_iter()
        .map(|(order, restaurant_name)| GetOrderRes {
            order_items: group.remove(&order.id).unwrap_or_default(),
            order,
            restaurant_name,
        })
        .collect();

    Ok(StdResponse {
        data: Some(orders_with_items),
        message: Some("Get my orders successfully"),
    })
}

/// Fetch a specific order belonging to the authenticated user.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "Order ID to fetch")
    ),
    responses(
        (status = 200, description = "Get order successfully", body = StdResponse<GetOrderRes, String>)
    )
)]
async fn get_order(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order: QueryResult<(OrderEntity, String)> = orders::table
        .inner_join(restaurants::table)
        .filter(orders::id.eq(id))
        .filter(orders::user_id.eq(user_id))
        .select((OrderEntity::as_select(), restaurants::name))
        .get_result(conn)
        .await;

    if let Err(err) = order {
        match err {
            DieselError::NotFound => return Err(AppError::NotFound),
            _ => return Err(AppError::Other(err.into())),
        }
    }

    let (order, restaurant_name) = order.unwrap();
    let items: Vec<(OrderItemEntity, String)> = order_items::table
        .inner_join(menu_items::table)
        .filter(order_items::order_id.eq(order.id))
        .select((OrderItemEntity::as_select(), menu_items::name))
        .get_results(conn)
        .await
        .context("Failed to get order items")?;

    let order_items = items
        .into_iter()
        .map(|(item, name)| OrderLineItem {
            menu_item_id: item.menu_item_id,
            name,
            quantity: item.quantity,
            price: item.price,
        })
        .collect();

    Ok(StdResponse {
        data: Some(GetOrderRes {
            order,
            restaurant_name,
            order_items,
        }),
        message: Some("Get order successfully"),
    })
}
