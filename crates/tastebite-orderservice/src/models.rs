use std::fmt;

use chrono::{DateTime, Utc};
use diesel::{
    Selectable,
    prelude::{Identifiable, Insertable, Queryable},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// Restaurants

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::restaurants)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RestaurantEntity {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub cuisine: String,
    pub image: String,
    pub rating: f32,
    pub delivery_time: String,
    pub minimum_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// Menu items

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::menu_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MenuItemEntity {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub name: String,
    pub description: String,
    pub price: i32,
    pub category: String,
    pub is_vegetarian: bool,
    pub image: String,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
}

// Cart items
//
// One row per (user, menu item); quantity is never stored as 0, a
// zero-quantity mutation deletes the row instead.

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::cart_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CartItemEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub menu_item_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::cart_items)]
pub struct UpsertCartItemEntity {
    pub user_id: Uuid,
    pub menu_item_id: Uuid,
    pub quantity: i32,
}

// Orders

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub restaurant_id: Uuid,
    pub total_amount: i32,
    pub delivery_address: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateOrderEntity {
    pub user_id: Uuid,
    pub restaurant_id: Uuid,
    pub total_amount: i32,
    pub delivery_address: String,
    pub status: String,
}

// Order items
//
// `price` is the per-unit price snapshot taken at order time, decoupled
// from the live menu price.

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::order_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderItemEntity {
    pub id: Uuid,
    pub order_id: Uuid,
    pub menu_item_id: Uuid,
    pub quantity: i32,
    pub price: i32,
}

#[derive(Insertable, Debug, PartialEq, Eq)]
#[diesel(table_name = crate::schema::order_items)]
pub struct CreateOrderItemEntity {
    pub order_id: Uuid,
    pub menu_item_id: Uuid,
    pub quantity: i32,
    pub price: i32,
}

// Profiles

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::profiles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProfileEntity {
    pub id: Uuid,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Order lifecycle

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(OrderStatus::Pending),
            "confirmed" => Some(OrderStatus::Confirmed),
            "preparing" => Some(OrderStatus::Preparing),
            "out_for_delivery" => Some(OrderStatus::OutForDelivery),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Human-readable badge text, e.g. "OUT FOR DELIVERY".
    pub fn label(self) -> String {
        self.as_str().replace('_', " ").to_uppercase()
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Legal moves of the fulfillment lifecycle. Orders progress linearly
    /// towards delivery and may be cancelled until they are out for delivery.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;

        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Confirmed, Preparing)
                | (Preparing, OutForDelivery)
                | (OutForDelivery, Delivered)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
                | (Preparing, Cancelled)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::OrderStatus::*;
    use super::*;

    const ALL: [OrderStatus; 6] = [
        Pending,
        Confirmed,
        Preparing,
        OutForDelivery,
        Delivered,
        Cancelled,
    ];

    #[test]
    fn status_round_trips_through_its_string_form() {
        for status in ALL {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("on_hold"), None);
        assert_eq!(OrderStatus::parse(""), None);
    }

    #[test]
    fn labels_are_uppercased_with_spaces() {
        assert_eq!(OutForDelivery.label(), "OUT FOR DELIVERY");
        assert_eq!(Pending.label(), "PENDING");
    }

    #[test]
    fn happy_path_transitions_are_legal() {
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Preparing));
        assert!(Preparing.can_transition_to(OutForDelivery));
        assert!(OutForDelivery.can_transition_to(Delivered));
    }

    #[test]
    fn cancellation_is_allowed_until_dispatch() {
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(Preparing.can_transition_to(Cancelled));
        assert!(!OutForDelivery.can_transition_to(Cancelled));
    }

    #[test]
    fn terminal_states_allow_no_moves() {
        for status in ALL {
            assert!(!Delivered.can_transition_to(status));
            assert!(!Cancelled.can_transition_to(status));
        }
        assert!(Delivered.is_terminal());
        assert!(Cancelled.is_terminal());
        assert!(!Pending.is_terminal());
    }

    #[test]
    fn skipping_lifecycle_steps_is_rejected() {
        assert!(!Pending.can_transition_to(Delivered));
        assert!(!Pending.can_transition_to(Pending));
        assert!(!Confirmed.can_transition_to(OutForDelivery));
    }
}
