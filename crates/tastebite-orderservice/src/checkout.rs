use std::collections::HashMap;

use serde::Serialize;
use tastebite_core::app_error::AppError;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{CartItemEntity, CreateOrderItemEntity, MenuItemEntity};

/// Flat fee added at display and checkout time, never stored per line.
pub const DELIVERY_FEE: i32 = 40;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
pub struct CartTotals {
    pub item_count: i32,
    pub subtotal: i32,
}

/// Sums `(unit price, quantity)` pairs. Pure, no I/O.
pub fn compute_totals<I>(lines: I) -> CartTotals
where
    I: IntoIterator<Item = (i32, i32)>,
{
    lines.into_iter().fold(
        CartTotals {
            item_count: 0,
            subtotal: 0,
        },
        |acc, (price, quantity)| CartTotals {
            item_count: acc.item_count + quantity,
            subtotal: acc.subtotal + price * quantity,
        },
    )
}

/// Returns the trimmed address, rejecting blank input before any write happens.
pub fn validate_delivery_address(address: &str) -> Result<&str, AppError> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(
            "Please enter a delivery address".into(),
        ));
    }
    Ok(trimmed)
}

/// Quantity floor for cart-page edits. Zero is not a valid stored
/// quantity; removal is an explicit separate operation.
pub fn validate_line_quantity(quantity: i32) -> Result<(), AppError> {
    if quantity < 1 {
        return Err(AppError::Validation(
            "Quantity must be at least 1; remove the item instead".into(),
        ));
    }
    Ok(())
}

/// All cart lines must belong to one restaurant; returns its id.
pub fn single_restaurant_id(menu_items: &[MenuItemEntity]) -> Result<Uuid, AppError> {
    let mut restaurant_ids = menu_items.iter().map(|item| item.restaurant_id);
    let first = restaurant_ids.next().ok_or_else(|| {
        AppError::Validation("Cart is empty; add items before placing an order".into())
    })?;
    if restaurant_ids.any(|id| id != first) {
        return Err(AppError::Validation(
            "Cart contains items from more than one restaurant".into(),
        ));
    }
    Ok(first)
}

/// A cart line resolved against the live menu price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub menu_item_id: Uuid,
    pub quantity: i32,
    pub price: i32,
}

pub fn price_cart_lines(
    cart_items: &[CartItemEntity],
    menu_by_id: &HashMap<Uuid, MenuItemEntity>,
) -> Result<Vec<PricedLine>, AppError> {
    cart_items
        .iter()
        .map(|line| {
            let menu_item = menu_by_id.get(&line.menu_item_id).ok_or_else(|| {
                AppError::Other(anyhow::anyhow!(
                    "Cart line {} references missing menu item {}",
                    line.id,
                    line.menu_item_id
                ))
            })?;
            Ok(PricedLine {
                menu_item_id: menu_item.id,
                quantity: line.quantity,
                price: menu_item.price,
            })
        })
        .collect()
}

/// Per-line price/quantity snapshots for the order being placed.
pub fn order_item_snapshots(order_id: Uuid, lines: &[PricedLine]) -> Vec<CreateOrderItemEntity> {
    lines
        .iter()
        .map(|line| CreateOrderItemEntity {
            order_id,
            menu_item_id: line.menu_item_id,
            quantity: line.quantity,
            price: line.price,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn menu_item(id: u128, restaurant_id: u128, price: i32) -> MenuItemEntity {
        MenuItemEntity {
            id: Uuid::from_u128(id),
            restaurant_id: Uuid::from_u128(restaurant_id),
            name: format!("item-{id}"),
            description: String::new(),
            price,
            category: "Mains".into(),
            is_vegetarian: false,
            image: String::new(),
            is_available: true,
            created_at: Utc::now(),
        }
    }

    fn cart_line(id: u128, menu_item_id: u128, quantity: i32) -> CartItemEntity {
        CartItemEntity {
            id: Uuid::from_u128(id),
            user_id: Uuid::from_u128(999),
            menu_item_id: Uuid::from_u128(menu_item_id),
            quantity,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn totals_of_an_empty_cart_are_zero() {
        assert_eq!(
            compute_totals([]),
            CartTotals {
                item_count: 0,
                subtotal: 0
            }
        );
    }

    #[test]
    fn totals_sum_quantities_and_line_prices() {
        let totals = compute_totals([(100, 2), (50, 1)]);
        assert_eq!(totals.item_count, 3);
        assert_eq!(totals.subtotal, 250);
        assert_eq!(totals.subtotal + DELIVERY_FEE, 290);
    }

    #[test]
    fn blank_addresses_are_rejected() {
        assert!(validate_delivery_address("").is_err());
        assert!(validate_delivery_address("   \t").is_err());
    }

    #[test]
    fn zero_or_negative_quantities_never_reach_the_store() {
        assert!(matches!(
            validate_line_quantity(0),
            Err(AppError::Validation(_))
        ));
        assert!(validate_line_quantity(-3).is_err());
        assert!(validate_line_quantity(1).is_ok());
        assert!(validate_line_quantity(12).is_ok());
    }

    #[test]
    fn addresses_are_trimmed() {
        assert_eq!(
            validate_delivery_address("  221B Baker St ").unwrap(),
            "221B Baker St"
        );
    }

    #[test]
    fn single_restaurant_carts_resolve_their_restaurant() {
        let items = [menu_item(1, 7, 100), menu_item(2, 7, 50)];
        assert_eq!(single_restaurant_id(&items).unwrap(), Uuid::from_u128(7));
    }

    #[test]
    fn mixed_restaurant_carts_are_rejected() {
        let items = [menu_item(1, 7, 100), menu_item(2, 8, 50)];
        assert!(matches!(
            single_restaurant_id(&items),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn an_empty_line_set_is_rejected() {
        assert!(matches!(
            single_restaurant_id(&[]),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn checkout_snapshots_capture_live_price_and_quantity() {
        // Cart of one line: 2 units of menu item 0x11 at 200 each.
        let (m1, r1) = (0x11_u128, 0x77_u128);
        let menu_by_id: HashMap<Uuid, MenuItemEntity> =
            [(Uuid::from_u128(m1), menu_item(m1, r1, 200))]
                .into_iter()
                .collect();
        let cart = [cart_line(1, m1, 2)];

        let priced = price_cart_lines(&cart, &menu_by_id).unwrap();
        let totals = compute_totals(priced.iter().map(|line| (line.price, line.quantity)));
        assert_eq!(totals.item_count, 2);
        assert_eq!(totals.subtotal, 400);

        let order_id = Uuid::from_u128(0xabc);
        assert_eq!(
            order_item_snapshots(order_id, &priced),
            vec![CreateOrderItemEntity {
                order_id,
                menu_item_id: Uuid::from_u128(m1),
                quantity: 2,
                price: 200,
            }]
        );
    }

    #[test]
    fn pricing_fails_when_a_line_references_a_missing_menu_item() {
        let cart = [cart_line(1, 0x22, 1)];
        assert!(price_cart_lines(&cart, &HashMap::new()).is_err());
    }
}
