//! Debt ledger records.

use serde::{Deserialize, Serialize};

use super::{DriverId, Money, RideId, TimeMs};

/// What a ledger posting represents. Commission and penalty increase a
/// driver's debt; payments decrease it; adjustments can go either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Commission,
    Payment,
    Adjustment,
    Penalty,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Commission => "commission",
            TransactionKind::Payment => "payment",
            TransactionKind::Adjustment => "adjustment",
            TransactionKind::Penalty => "penalty",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "commission" => Some(TransactionKind::Commission),
            "payment" => Some(TransactionKind::Payment),
            "adjustment" => Some(TransactionKind::Adjustment),
            "penalty" => Some(TransactionKind::Penalty),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One append-only ledger entry. Never mutated or deleted once written.
///
/// Invariant: `balance_after == balance_before + amount`, and
/// `balance_after` equals the driver's stored running balance at the
/// moment of insertion. Positive amounts increase debt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebtTransaction {
    pub id: i64,
    pub driver_id: DriverId,
    pub ride_id: Option<RideId>,
    pub amount: Money,
    pub kind: TransactionKind,
    pub description: String,
    pub balance_before: Money,
    pub balance_after: Money,
    pub created_at: TimeMs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_string_roundtrip() {
        for kind in [
            TransactionKind::Commission,
            TransactionKind::Payment,
            TransactionKind::Adjustment,
            TransactionKind::Penalty,
        ] {
            assert_eq!(TransactionKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(TransactionKind::parse("refund"), None);
    }
}
