use serde::{Deserialize, Serialize};

use super::money::Money;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: i64,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
}

impl CartLine {
    pub fn new(product_id: i64, name: impl Into<String>, unit_price: Money, quantity: u32) -> Self {
        Self {
            product_id,
            name: name.into(),
            unit_price,
            quantity,
        }
    }

    /// `None` when the line total does not fit.
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// Local view of the user's cart. The remote cart service owns the
/// authoritative copy; this one is only cleared once an order is placed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cart {
    pub user_id: i64,
    pub lines: Vec<CartLine>,
}

impl Cart {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            lines: Vec::new(),
        }
    }

    pub fn with_lines(user_id: i64, lines: Vec<CartLine>) -> Self {
        Self { user_id, lines }
    }

    pub fn add(&mut self, line: CartLine) {
        if let Some(existing) = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == line.product_id)
        {
            existing.quantity = existing.quantity.saturating_add(line.quantity);
            return;
        }
        self.lines.push(line);
    }

    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|l| l.quantity == 0)
    }

    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0u32, |n, l| n.saturating_add(l.quantity))
    }

    pub fn total(&self) -> Option<Money> {
        self.lines
            .iter()
            .map(CartLine::line_total)
            .try_fold(Money::ZERO, |acc, line| acc.checked_add(line?))
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(cents: i64) -> Money {
        Money::from_cents(cents).unwrap()
    }

    #[test]
    fn adding_same_product_merges_quantity() {
        let mut cart = Cart::new(7);
        cart.add(CartLine::new(1, "Laptop", price(99999), 1));
        cart.add(CartLine::new(1, "Laptop", price(99999), 2));
        cart.add(CartLine::new(2, "Mouse", price(1500), 1));
        assert_eq!(cart.lines.len(), 2);
        assert_eq!(cart.item_count(), 4);
        assert_eq!(cart.total().unwrap().to_string(), "3014.97");
    }

    #[test]
    fn zero_quantity_lines_count_as_empty() {
        let cart = Cart::with_lines(1, vec![CartLine::new(1, "Pen", price(100), 0)]);
        assert!(cart.is_empty());
        assert!(Cart::new(1).is_empty());
    }

    #[test]
    fn clear_empties_lines() {
        let mut cart = Cart::with_lines(1, vec![CartLine::new(1, "Pen", price(100), 3)]);
        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.total(), Some(Money::ZERO));
    }

    #[test]
    fn overflowing_total_is_none() {
        let cart = Cart::with_lines(
            1,
            vec![CartLine::new(1, "Yacht", price(i64::MAX / 2), 3)],
        );
        assert!(cart.lines[0].line_total().is_none());
        assert!(cart.total().is_none());
    }
}
