use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Derived availability status of one stock level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
    Overstock,
}

impl StockStatus {
    /// Classify a level from its current numbers. Pure; order matters:
    /// out-of-stock wins over low-stock, low-stock over overstock.
    pub fn classify(quantity: i64, reserved: i64, minimum: i64, maximum: Option<i64>) -> Self {
        let available = quantity - reserved;
        if available <= 0 {
            StockStatus::OutOfStock
        } else if available <= minimum {
            StockStatus::LowStock
        } else if maximum.is_some_and(|m| quantity > m) {
            StockStatus::Overstock
        } else {
            StockStatus::InStock
        }
    }
}

/// Current on-hand/reserved state for one product in one warehouse.
///
/// This is a materialized view of the movement ledger: it is only ever
/// mutated by applying ledger events, and can be rebuilt from them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    /// Units physically on hand.
    pub quantity: i64,
    /// Units promised to orders but not yet shipped.
    pub reserved_quantity: i64,
    /// Reorder point: at or below this available quantity the level is low.
    pub minimum_quantity: i64,
    /// Optional overstock ceiling.
    pub maximum_quantity: Option<i64>,
    pub bin_location: Option<String>,
    pub last_counted_at: Option<DateTime<Utc>>,
    pub last_counted_quantity: Option<i64>,
}

impl StockLevel {
    pub fn empty() -> Self {
        Self::default()
    }

    /// On-hand minus reserved.
    pub fn available_quantity(&self) -> i64 {
        self.quantity - self.reserved_quantity
    }

    pub fn status(&self) -> StockStatus {
        StockStatus::classify(
            self.quantity,
            self.reserved_quantity,
            self.minimum_quantity,
            self.maximum_quantity,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(quantity: i64, reserved: i64, minimum: i64, maximum: Option<i64>) -> StockLevel {
        StockLevel {
            quantity,
            reserved_quantity: reserved,
            minimum_quantity: minimum,
            maximum_quantity: maximum,
            ..StockLevel::empty()
        }
    }

    #[test]
    fn fully_reserved_level_is_out_of_stock() {
        assert_eq!(level(5, 5, 0, None).status(), StockStatus::OutOfStock);
        assert_eq!(level(0, 0, 0, None).status(), StockStatus::OutOfStock);
    }

    #[test]
    fn available_at_or_below_minimum_is_low_stock() {
        assert_eq!(level(10, 7, 3, None).status(), StockStatus::LowStock);
        assert_eq!(level(2, 0, 5, None).status(), StockStatus::LowStock);
    }

    #[test]
    fn quantity_above_ceiling_is_overstock() {
        assert_eq!(level(100, 0, 5, Some(80)).status(), StockStatus::Overstock);
        // Out-of-stock/low-stock win over overstock.
        assert_eq!(level(100, 100, 5, Some(80)).status(), StockStatus::OutOfStock);
        assert_eq!(level(100, 96, 5, Some(80)).status(), StockStatus::LowStock);
    }

    #[test]
    fn healthy_level_is_in_stock() {
        assert_eq!(level(10, 2, 3, Some(50)).status(), StockStatus::InStock);
        assert_eq!(level(10, 0, 0, None).status(), StockStatus::InStock);
    }
}
