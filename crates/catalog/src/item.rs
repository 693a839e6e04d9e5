use serde::{Deserialize, Serialize};

use tally_core::ItemId;

/// Catalog item record.
///
/// Name and identifier are fixed at creation. Stock only moves through restock
/// and purchase; metadata, price and points cost through edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    id: ItemId,
    name: String,
    image_ref: String,
    description: String,
    /// Units in stock.
    amount: u64,
    /// Unit price in the smallest currency unit.
    price: u64,
    /// Loyalty points per unit.
    points_cost: u64,
    disabled: bool,
    exists: bool,
}

impl Item {
    pub(crate) fn new(
        id: ItemId,
        name: String,
        image_ref: String,
        description: String,
        price: u64,
        points_cost: u64,
    ) -> Self {
        Self {
            id,
            name,
            image_ref,
            description,
            amount: 0,
            price,
            points_cost,
            disabled: false,
            exists: true,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image_ref(&self) -> &str {
        &self.image_ref
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn price(&self) -> u64 {
        self.price
    }

    pub fn points_cost(&self) -> u64 {
        self.points_cost
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub(crate) fn edit(&mut self, image_ref: String, description: String, price: u64, points_cost: u64) {
        self.image_ref = image_ref;
        self.description = description;
        self.price = price;
        self.points_cost = points_cost;
    }

    pub(crate) fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    pub(crate) fn restock(&mut self, amount: u64) {
        self.amount = self.amount.saturating_add(amount);
    }

    pub(crate) fn take(&mut self, amount: u64) {
        self.amount = self.amount.saturating_sub(amount);
    }
}
