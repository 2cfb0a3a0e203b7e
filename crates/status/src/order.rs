use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::lifecycle::Lifecycle;
use crate::table::TransitionTable;

/// Lifecycle of a single order line inside a command.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingConfirmation,
    InPreparation,
    ReadyForDelivery,
    DeliveredServed,
    ItemCanceled,
    Returned,
}

impl OrderStatus {
    /// Whether the order still counts toward the command total.
    pub fn is_billable(self) -> bool {
        self != OrderStatus::ItemCanceled
    }
}

impl Lifecycle for OrderStatus {
    const NAME: &'static str = "order";

    fn all() -> &'static [Self] {
        use OrderStatus::*;
        &[
            PendingConfirmation,
            InPreparation,
            ReadyForDelivery,
            DeliveredServed,
            ItemCanceled,
            Returned,
        ]
    }

    fn key(self) -> &'static str {
        match self {
            OrderStatus::PendingConfirmation => "pending_confirmation",
            OrderStatus::InPreparation => "in_preparation",
            OrderStatus::ReadyForDelivery => "ready_for_delivery",
            OrderStatus::DeliveredServed => "delivered_served",
            OrderStatus::ItemCanceled => "item_canceled",
            OrderStatus::Returned => "returned",
        }
    }

    fn label(self) -> &'static str {
        match self {
            OrderStatus::PendingConfirmation => "Pending confirmation",
            OrderStatus::InPreparation => "In preparation",
            OrderStatus::ReadyForDelivery => "Ready for delivery",
            OrderStatus::DeliveredServed => "Delivered / served",
            OrderStatus::ItemCanceled => "Item canceled",
            OrderStatus::Returned => "Returned",
        }
    }

    fn table() -> &'static TransitionTable<Self> {
        static TABLE: OnceLock<TransitionTable<OrderStatus>> = OnceLock::new();
        TABLE.get_or_init(|| {
            use OrderStatus::*;
            TransitionTable::new(&[
                (PendingConfirmation, &[InPreparation, ItemCanceled, Returned][..]),
                (InPreparation, &[ReadyForDelivery, ItemCanceled, Returned][..]),
                (ReadyForDelivery, &[DeliveredServed, ItemCanceled, Returned][..]),
                (DeliveredServed, &[][..]),
                (ItemCanceled, &[][..]),
                (Returned, &[][..]),
            ])
        })
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.key())
    }
}
