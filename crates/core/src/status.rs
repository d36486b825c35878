//! Inventory status rules.
//!
//! The invariant the reconciler enforces: an item's status is
//! `"out of stock"` iff its total quantity is zero, otherwise `"active"`.

use serde::{Deserialize, Serialize};

/// Status an inventory item is allowed to carry after normalization.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemStatus {
    #[serde(rename = "active")]
    Active,
    #[serde(rename = "out of stock")]
    OutOfStock,
}

impl ItemStatus {
    /// The exact text stored in the `status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::OutOfStock => "out of stock",
        }
    }

    /// The status a row with the given quantity must end up with.
    pub fn expected_for_quantity(total_quantity: i64) -> Self {
        if total_quantity == 0 {
            Self::OutOfStock
        } else {
            Self::Active
        }
    }

    /// Parse a stored status value. Unknown or null-ish text yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "active" => Some(Self::Active),
            "out of stock" => Some(Self::OutOfStock),
            _ => None,
        }
    }
}

impl core::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_quantity_is_out_of_stock() {
        assert_eq!(
            ItemStatus::expected_for_quantity(0),
            ItemStatus::OutOfStock
        );
    }

    #[test]
    fn positive_quantity_is_active() {
        assert_eq!(ItemStatus::expected_for_quantity(17), ItemStatus::Active);
    }

    #[test]
    fn parse_round_trips_stored_text() {
        for status in [ItemStatus::Active, ItemStatus::OutOfStock] {
            assert_eq!(ItemStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ItemStatus::parse("discontinued"), None);
    }

    proptest! {
        #[test]
        fn expected_status_matches_invariant(qty in 0i64..1_000_000) {
            let status = ItemStatus::expected_for_quantity(qty);
            prop_assert_eq!(status == ItemStatus::OutOfStock, qty == 0);
        }
    }
}
