use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shopkeeper_core::ValueObject;

/// Kind of quantity-changing event recorded in the movement ledger.
///
/// `Adjustment` and `Count` are absolute: their `quantity` is the target
/// on-hand value, not a delta. Everything else carries a positive magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Purchase,
    Sale,
    TransferIn,
    TransferOut,
    Adjustment,
    Return,
    Production,
    Damage,
    Count,
    Reservation,
    Release,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Purchase => "purchase",
            MovementType::Sale => "sale",
            MovementType::TransferIn => "transfer_in",
            MovementType::TransferOut => "transfer_out",
            MovementType::Adjustment => "adjustment",
            MovementType::Return => "return",
            MovementType::Production => "production",
            MovementType::Damage => "damage",
            MovementType::Count => "count",
            MovementType::Reservation => "reservation",
            MovementType::Release => "release",
        }
    }

    /// Whether this type moves stock between two warehouses.
    pub fn is_transfer(&self) -> bool {
        matches!(self, MovementType::TransferIn | MovementType::TransferOut)
    }

    /// Whether `quantity` is an absolute target rather than a magnitude.
    pub fn is_absolute(&self) -> bool {
        matches!(self, MovementType::Adjustment | MovementType::Count)
    }
}

impl core::fmt::Display for MovementType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External document reference attached to a ledger entry.
///
/// `reference_id` doubles as the caller's idempotency key when retrying a
/// failed apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementReference {
    /// Kind of source document ("purchase_order", "sales_order", "cycle_count", ...).
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    /// Human-facing document number ("PO-2024-0131").
    pub reference_number: Option<String>,
}

impl ValueObject for MovementReference {}
