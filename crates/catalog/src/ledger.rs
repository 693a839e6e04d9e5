use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tally_core::{Aggregate, AggregateId, AggregateRoot, ItemId, LedgerError, UserId};
use tally_events::Event;

use crate::item::Item;

/// Aggregate root: CatalogLedger.
///
/// Owns the item catalog, the withdrawable proceeds of currency purchases and
/// the loyalty point balance of every user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogLedger {
    id: AggregateId,
    admin: UserId,
    items: HashMap<ItemId, Item>,
    balance: u64,
    points: HashMap<UserId, u64>,
    version: u64,
}

impl CatalogLedger {
    /// Create an empty ledger administered by `admin`.
    pub fn new(id: AggregateId, admin: UserId) -> Self {
        Self {
            id,
            admin,
            items: HashMap::new(),
            balance: 0,
            points: HashMap::new(),
            version: 0,
        }
    }

    /// Rebuild a ledger by replaying its notification history.
    pub fn from_history<'a>(
        id: AggregateId,
        admin: UserId,
        history: impl IntoIterator<Item = &'a CatalogEvent>,
    ) -> Self {
        let mut ledger = Self::new(id, admin);
        for event in history {
            ledger.apply(event);
        }
        ledger
    }

    pub fn admin(&self) -> UserId {
        self.admin
    }

    /// Accumulated proceeds awaiting withdrawal.
    pub fn balance(&self) -> u64 {
        self.balance
    }

    /// Loyalty points held by `user` (zero for unknown users).
    pub fn points_of(&self, user: UserId) -> u64 {
        self.points.get(&user).copied().unwrap_or(0)
    }

    pub fn get_item(&self, item_id: ItemId) -> Result<&Item, LedgerError> {
        self.items
            .get(&item_id)
            .filter(|item| item.exists())
            .ok_or(LedgerError::NotFound(item_id))
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values().filter(|item| item.exists())
    }
}

impl AggregateRoot for CatalogLedger {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: AddItem. Open to any caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddItem {
    pub caller: UserId,
    pub name: String,
    pub image_ref: String,
    pub description: String,
    pub amount: u64,
    pub price: u64,
    pub points_cost: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: EditItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditItem {
    pub caller: UserId,
    pub item_id: ItemId,
    pub image_ref: String,
    pub description: String,
    pub price: u64,
    pub points_cost: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DisableItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisableItem {
    pub caller: UserId,
    pub item_id: ItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: EnableItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnableItem {
    pub caller: UserId,
    pub item_id: ItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RestockItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestockItem {
    pub caller: UserId,
    pub item_id: ItemId,
    pub amount: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Withdraw. Admin only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdraw {
    pub caller: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: BuyItem.
///
/// `paid_value` is the currency attached to the call. It must be zero when
/// paying with points and exactly `price * amount` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyItem {
    pub caller: UserId,
    pub item_id: ItemId,
    pub amount: u64,
    pub use_points: bool,
    pub paid_value: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatalogCommand {
    AddItem(AddItem),
    EditItem(EditItem),
    DisableItem(DisableItem),
    EnableItem(EnableItem),
    RestockItem(RestockItem),
    Withdraw(Withdraw),
    BuyItem(BuyItem),
}

/// Event: ItemAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAdded {
    pub item_id: ItemId,
    pub name: String,
    pub image_ref: String,
    pub description: String,
    pub price: u64,
    pub points_cost: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemEdited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemEdited {
    pub item_id: ItemId,
    pub image_ref: String,
    pub description: String,
    pub price: u64,
    pub points_cost: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemDisabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDisabled {
    pub item_id: ItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemEnabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemEnabled {
    pub item_id: ItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemRestocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRestocked {
    pub item_id: ItemId,
    pub amount: u64,
    pub occurred_at: DateTime<Utc>,
}

/// How a purchase was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Payment {
    /// Paid with loyalty points; `spent` points leave the buyer's balance.
    Points { spent: u64 },
    /// Paid with currency; proceeds go to the ledger and the buyer earns points.
    Currency { paid: u64, points_earned: u64 },
}

/// Event: ItemBought.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemBought {
    pub item_id: ItemId,
    pub amount: u64,
    pub buyer: UserId,
    pub payment: Payment,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BalanceWithdrawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceWithdrawn {
    pub recipient: UserId,
    pub amount: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatalogEvent {
    ItemAdded(ItemAdded),
    ItemEdited(ItemEdited),
    ItemDisabled(ItemDisabled),
    ItemEnabled(ItemEnabled),
    ItemRestocked(ItemRestocked),
    ItemBought(ItemBought),
    BalanceWithdrawn(BalanceWithdrawn),
}

impl CatalogEvent {
    /// Item the event refers to, if any.
    pub fn item_id(&self) -> Option<ItemId> {
        match self {
            CatalogEvent::ItemAdded(e) => Some(e.item_id),
            CatalogEvent::ItemEdited(e) => Some(e.item_id),
            CatalogEvent::ItemDisabled(e) => Some(e.item_id),
            CatalogEvent::ItemEnabled(e) => Some(e.item_id),
            CatalogEvent::ItemRestocked(e) => Some(e.item_id),
            CatalogEvent::ItemBought(e) => Some(e.item_id),
            CatalogEvent::BalanceWithdrawn(_) => None,
        }
    }

    /// Units or currency moved by the event, if any.
    pub fn amount(&self) -> Option<u64> {
        match self {
            CatalogEvent::ItemRestocked(e) => Some(e.amount),
            CatalogEvent::ItemBought(e) => Some(e.amount),
            CatalogEvent::BalanceWithdrawn(e) => Some(e.amount),
            _ => None,
        }
    }
}

impl Event for CatalogEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CatalogEvent::ItemAdded(_) => "catalog.item.added",
            CatalogEvent::ItemEdited(_) => "catalog.item.edited",
            CatalogEvent::ItemDisabled(_) => "catalog.item.disabled",
            CatalogEvent::ItemEnabled(_) => "catalog.item.enabled",
            CatalogEvent::ItemRestocked(_) => "catalog.item.restocked",
            CatalogEvent::ItemBought(_) => "catalog.item.bought",
            CatalogEvent::BalanceWithdrawn(_) => "catalog.balance.withdrawn",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CatalogEvent::ItemAdded(e) => e.occurred_at,
            CatalogEvent::ItemEdited(e) => e.occurred_at,
            CatalogEvent::ItemDisabled(e) => e.occurred_at,
            CatalogEvent::ItemEnabled(e) => e.occurred_at,
            CatalogEvent::ItemRestocked(e) => e.occurred_at,
            CatalogEvent::ItemBought(e) => e.occurred_at,
            CatalogEvent::BalanceWithdrawn(e) => e.occurred_at,
        }
    }
}

impl Aggregate for CatalogLedger {
    type Command = CatalogCommand;
    type Event = CatalogEvent;
    type Error = LedgerError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CatalogEvent::ItemAdded(e) => {
                self.items.insert(
                    e.item_id,
                    Item::new(
                        e.item_id,
                        e.name.clone(),
                        e.image_ref.clone(),
                        e.description.clone(),
                        e.price,
                        e.points_cost,
                    ),
                );
            }
            CatalogEvent::ItemEdited(e) => {
                if let Some(item) = self.items.get_mut(&e.item_id) {
                    item.edit(e.image_ref.clone(), e.description.clone(), e.price, e.points_cost);
                }
            }
            CatalogEvent::ItemDisabled(e) => {
                if let Some(item) = self.items.get_mut(&e.item_id) {
                    item.set_disabled(true);
                }
            }
            CatalogEvent::ItemEnabled(e) => {
                if let Some(item) = self.items.get_mut(&e.item_id) {
                    item.set_disabled(false);
                }
            }
            CatalogEvent::ItemRestocked(e) => {
                if let Some(item) = self.items.get_mut(&e.item_id) {
                    item.restock(e.amount);
                }
            }
            CatalogEvent::ItemBought(e) => {
                if let Some(item) = self.items.get_mut(&e.item_id) {
                    item.take(e.amount);
                }
                let points = self.points.entry(e.buyer).or_insert(0);
                match e.payment {
                    Payment::Points { spent } => {
                        *points = points.saturating_sub(spent);
                    }
                    Payment::Currency { paid, points_earned } => {
                        *points = points.saturating_add(points_earned);
                        self.balance = self.balance.saturating_add(paid);
                    }
                }
            }
            CatalogEvent::BalanceWithdrawn(e) => {
                self.balance = self.balance.saturating_sub(e.amount);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CatalogCommand::AddItem(cmd) => self.handle_add(cmd),
            CatalogCommand::EditItem(cmd) => self.handle_edit(cmd),
            CatalogCommand::DisableItem(cmd) => self.handle_disable(cmd),
            CatalogCommand::EnableItem(cmd) => self.handle_enable(cmd),
            CatalogCommand::RestockItem(cmd) => self.handle_restock(cmd),
            CatalogCommand::Withdraw(cmd) => self.handle_withdraw(cmd),
            CatalogCommand::BuyItem(cmd) => self.handle_buy(cmd),
        }
    }
}

impl CatalogLedger {
    fn handle_add(&self, cmd: &AddItem) -> Result<Vec<CatalogEvent>, LedgerError> {
        let item_id = ItemId::derive(&cmd.name);
        if self.get_item(item_id).is_ok() {
            return Err(LedgerError::AlreadyExists(item_id));
        }

        Ok(vec![
            CatalogEvent::ItemAdded(ItemAdded {
                item_id,
                name: cmd.name.clone(),
                image_ref: cmd.image_ref.clone(),
                description: cmd.description.clone(),
                price: cmd.price,
                points_cost: cmd.points_cost,
                occurred_at: cmd.occurred_at,
            }),
            CatalogEvent::ItemRestocked(ItemRestocked {
                item_id,
                amount: cmd.amount,
                occurred_at: cmd.occurred_at,
            }),
        ])
    }

    fn handle_edit(&self, cmd: &EditItem) -> Result<Vec<CatalogEvent>, LedgerError> {
        self.get_item(cmd.item_id)?;

        Ok(vec![CatalogEvent::ItemEdited(ItemEdited {
            item_id: cmd.item_id,
            image_ref: cmd.image_ref.clone(),
            description: cmd.description.clone(),
            price: cmd.price,
            points_cost: cmd.points_cost,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_disable(&self, cmd: &DisableItem) -> Result<Vec<CatalogEvent>, LedgerError> {
        if self.get_item(cmd.item_id)?.is_disabled() {
            return Err(LedgerError::AlreadyDisabled(cmd.item_id));
        }

        Ok(vec![CatalogEvent::ItemDisabled(ItemDisabled {
            item_id: cmd.item_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_enable(&self, cmd: &EnableItem) -> Result<Vec<CatalogEvent>, LedgerError> {
        if !self.get_item(cmd.item_id)?.is_disabled() {
            return Err(LedgerError::AlreadyEnabled(cmd.item_id));
        }

        Ok(vec![CatalogEvent::ItemEnabled(ItemEnabled {
            item_id: cmd.item_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_restock(&self, cmd: &RestockItem) -> Result<Vec<CatalogEvent>, LedgerError> {
        let item = self.get_item(cmd.item_id)?;
        item.amount()
            .checked_add(cmd.amount)
            .ok_or(LedgerError::Overflow("item stock"))?;

        Ok(vec![CatalogEvent::ItemRestocked(ItemRestocked {
            item_id: cmd.item_id,
            amount: cmd.amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_withdraw(&self, cmd: &Withdraw) -> Result<Vec<CatalogEvent>, LedgerError> {
        if cmd.caller != self.admin {
            return Err(LedgerError::Unauthorized);
        }

        Ok(vec![CatalogEvent::BalanceWithdrawn(BalanceWithdrawn {
            recipient: cmd.caller,
            amount: self.balance,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_buy(&self, cmd: &BuyItem) -> Result<Vec<CatalogEvent>, LedgerError> {
        let item = self.get_item(cmd.item_id)?;
        if item.is_disabled() {
            return Err(LedgerError::Disabled(cmd.item_id));
        }
        if item.amount() < cmd.amount {
            return Err(LedgerError::InsufficientStock {
                available: item.amount(),
                requested: cmd.amount,
            });
        }

        let held = self.points_of(cmd.caller);
        let payment = if cmd.use_points {
            if cmd.paid_value != 0 {
                return Err(LedgerError::UnexpectedPayment(cmd.paid_value));
            }
            let required = item
                .points_cost()
                .checked_mul(cmd.amount)
                .ok_or(LedgerError::Overflow("points cost"))?;
            if held < required {
                return Err(LedgerError::InsufficientPoints {
                    available: held,
                    required,
                });
            }
            Payment::Points { spent: required }
        } else {
            let expected = item
                .price()
                .checked_mul(cmd.amount)
                .ok_or(LedgerError::Overflow("purchase price"))?;
            if cmd.paid_value != expected {
                return Err(LedgerError::BadPayment {
                    expected,
                    paid: cmd.paid_value,
                });
            }
            let earned = item
                .points_cost()
                .checked_mul(cmd.amount)
                .ok_or(LedgerError::Overflow("points earned"))?;
            self.balance
                .checked_add(expected)
                .ok_or(LedgerError::Overflow("ledger balance"))?;
            held.checked_add(earned)
                .ok_or(LedgerError::Overflow("point balance"))?;
            Payment::Currency {
                paid: expected,
                points_earned: earned,
            }
        };

        Ok(vec![CatalogEvent::ItemBought(ItemBought {
            item_id: cmd.item_id,
            amount: cmd.amount,
            buyer: cmd.caller,
            payment,
            occurred_at: cmd.occurred_at,
        })])
    }
}
