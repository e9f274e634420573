use std::collections::BTreeMap;

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
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
    models::{MenuItemEntity, RestaurantEntity},
    schema::{menu_items, restaurants},
};

/// Public browse routes, no session required.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/restaurants",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_restaurants))
            .routes(utoipa_axum::routes!(get_restaurant)),
    )
}

#[derive(Deserialize)]
struct SearchQuery {
    search: Option<String>,
}

/// Fetch all active restaurants, optionally filtered by a name/cuisine search.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Restaurants"],
    params(
        ("search" = Option<String>, Query, description = "Case-insensitive name or cuisine filter")
    ),
    responses(
        (status = 200, description = "List restaurants", body = StdResponse<Vec<RestaurantEntity>, String>)
    )
)]
async fn get_restaurants(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut restaurants_query = restaurants::table
        .filter(restaurants::is_active.eq(true))
        .select(RestaurantEntity::as_select())
        .into_boxed();

    if let Some(search) = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|search| !search.is_empty())
    {
        let pattern = format!("%{search}%");
        restaurants_query = restaurants_query.filter(
            restaurants::name
                .ilike(pattern.clone())
                .or(restaurants::cuisine.ilike(pattern)),
        );
    }

    let restaurants: Vec<RestaurantEntity> = restaurants_query
        .get_results(conn)
        .await
        .context("Failed to get restaurants")?;

    Ok(StdResponse {
        data: Some(restaurants),
        message: Some("Get restaurants successfully"),
    })
}

#[derive(Serialize, ToSchema)]
struct MenuSection {
    category: String,
    items: Vec<MenuItemEntity>,
}

#[derive(Serialize, ToSchema)]
struct GetRestaurantRes {
    restaurant: RestaurantEntity,
    menu: Vec<MenuSection>,
}

/// Category order is deterministic so the menu renders stably.
fn group_menu_by_category(items: Vec<MenuItemEntity>) -> Vec<MenuSection> {
    let mut sections: BTreeMap<String, Vec<MenuItemEntity>> = BTreeMap::new();
    for item in items {
        sections.entry(item.category.clone()).or_default().push(item);
    }
    sections
        .into_iter()
        .map(|(category, items)| MenuSection { category, items })
        .collect()
}

/// Fetch one restaurant with its available menu items grouped by category.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Restaurants"],
    params(
        ("id" = Uuid, Path, description = "Restaurant ID to fetch")
    ),
    responses(
        (status = 200, description = "Get restaurant successfully", body = StdResponse<GetRestaurantRes, String>)
    )
)]
async fn get_restaurant(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let restaurant: QueryResult<RestaurantEntity> = restaurants::table
        .find(id)
        .filter(restaurants::is_active.eq(true))
        .get_result(conn)
        .await;

    if let Err(err) = restaurant {
        match err {
            DieselError::NotFound => return Err(AppError::NotFound),
            _ => return Err(AppError::Other(err.into())),
        }
    }

    let restaurant = restaurant.unwrap();
    let menu_items: Vec<MenuItemEntity> = menu_items::table
        .filter(menu_items::restaurant_id.eq(restaurant.id))
        .filter(menu_items::is_available.eq(true))
        .get_results(conn)
        .await
        .context("Failed to get menu items")?;

    Ok(StdResponse {
        data: Some(GetRestaurantRes {
            restaurant,
            menu: group_menu_by_category(menu_items),
        }),
        message: Some("Get restaurant successfully"),
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn menu_item(id: u128, category: &str) -> MenuItemEntity {
        MenuItemEntity {
            id: Uuid::from_u128(id),
            restaurant_id: Uuid::from_u128(1),
            name: format!("item-{id}"),
            description: String::new(),
            price: 100,
            category: category.into(),
            is_vegetarian: false,
            image: String::new(),
            is_available: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn menu_groups_by_category_in_stable_order() {
        let sections = group_menu_by_category(vec![
            menu_item(1, "Starters"),
            menu_item(2, "Mains"),
            menu_item(3, "Starters"),
        ]);

        let categories: Vec<&str> = sections
            .iter()
            .map(|section| section.category.as_str())
            .collect();
        assert_eq!(categories, ["Mains", "Starters"]);
        assert_eq!(sections[1].items.len(), 2);
    }

    #[test]
    fn an_empty_menu_yields_no_sections() {
        assert!(group_menu_by_category(Vec::new()).is_empty());
    }
}
