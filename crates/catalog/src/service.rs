//! Thread-safe command pipeline around the catalog ledger.
//!
//! Every operation runs inside one critical section:
//!
//! ```text
//! Command
//!   ↓
//! 1. Decide (ledger.handle, pure)
//!   ↓
//! 2. Settle (collect purchase payment / pay out withdrawal)
//!   ↓
//! 3. Apply events to the ledger
//!   ↓
//! 4. Append envelopes to the journal, publish them to the bus
//! ```
//!
//! A failure in steps 1 or 2 returns before anything is applied, recorded or
//! published.

use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use uuid::Uuid;

use tally_core::{AggregateId, AggregateRoot, ItemId, LedgerError, LedgerResult, UserId};
use tally_events::{Event, EventBus, EventEnvelope, Subscription, execute_settled};

use crate::config::CatalogConfig;
use crate::item::Item;
use crate::ledger::{
    AddItem, BuyItem, CatalogCommand, CatalogEvent, CatalogLedger, DisableItem, EditItem,
    EnableItem, Payment, RestockItem, Withdraw,
};
use crate::payment::PaymentGateway;

/// Aggregate type recorded on every notification envelope.
pub const AGGREGATE_TYPE: &str = "catalog";

#[derive(Debug)]
struct State {
    ledger: CatalogLedger,
    journal: Vec<EventEnvelope<CatalogEvent>>,
}

/// Catalog ledger service.
///
/// - `G`: gateway that moves currency in and out
/// - `B`: bus that distributes committed notifications
///
/// The journal returned by [`CatalogService::notifications`] is the ordered,
/// append-only record of every committed event. Bus delivery is best effort.
#[derive(Debug)]
pub struct CatalogService<G, B> {
    id: AggregateId,
    admin: UserId,
    state: Mutex<State>,
    gateway: G,
    bus: B,
}

impl<G, B> CatalogService<G, B> {
    pub fn new(config: CatalogConfig, gateway: G, bus: B) -> Self {
        Self::with_id(AggregateId::new(), config, gateway, bus)
    }

    pub fn with_id(id: AggregateId, config: CatalogConfig, gateway: G, bus: B) -> Self {
        Self {
            id,
            admin: config.admin(),
            state: Mutex::new(State {
                ledger: CatalogLedger::new(id, config.admin()),
                journal: Vec::new(),
            }),
            gateway,
            bus,
        }
    }

    pub fn id(&self) -> AggregateId {
        self.id
    }

    pub fn admin(&self) -> UserId {
        self.admin
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Identifier an item called `name` has (or would have).
    pub fn derive_identifier(name: &str) -> ItemId {
        ItemId::derive(name)
    }

    pub fn get_item(&self, item_id: ItemId) -> LedgerResult<Item> {
        self.lock()?.ledger.get_item(item_id).cloned()
    }

    /// Loyalty points held by `user` (zero for unknown users).
    pub fn get_points(&self, user: UserId) -> LedgerResult<u64> {
        Ok(self.lock()?.ledger.points_of(user))
    }

    /// Proceeds awaiting withdrawal.
    pub fn balance(&self) -> LedgerResult<u64> {
        Ok(self.lock()?.ledger.balance())
    }

    pub fn items(&self) -> LedgerResult<Vec<Item>> {
        let state = self.lock()?;
        let mut items: Vec<Item> = state.ledger.items().cloned().collect();
        items.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(items)
    }

    /// Snapshot of the notification journal, in commit order.
    pub fn notifications(&self) -> LedgerResult<Vec<EventEnvelope<CatalogEvent>>> {
        Ok(self.lock()?.journal.clone())
    }

    fn lock(&self) -> LedgerResult<MutexGuard<'_, State>> {
        self.state.lock().map_err(|_| LedgerError::LockPoisoned)
    }
}

impl<G, B> CatalogService<G, B>
where
    G: PaymentGateway,
    B: EventBus<EventEnvelope<CatalogEvent>>,
{
    pub fn subscribe(&self) -> Subscription<EventEnvelope<CatalogEvent>> {
        self.bus.subscribe()
    }

    /// List a new item. Returns its derived identifier.
    #[allow(clippy::too_many_arguments)]
    pub fn add_item(
        &self,
        caller: UserId,
        name: impl Into<String>,
        image_ref: impl Into<String>,
        description: impl Into<String>,
        amount: u64,
        price: u64,
        points_cost: u64,
    ) -> LedgerResult<ItemId> {
        let name = name.into();
        let item_id = ItemId::derive(&name);
        self.dispatch(CatalogCommand::AddItem(AddItem {
            caller,
            name,
            image_ref: image_ref.into(),
            description: description.into(),
            amount,
            price,
            points_cost,
            occurred_at: Utc::now(),
        }))?;
        Ok(item_id)
    }

    pub fn edit_item(
        &self,
        caller: UserId,
        item_id: ItemId,
        image_ref: impl Into<String>,
        description: impl Into<String>,
        price: u64,
        points_cost: u64,
    ) -> LedgerResult<()> {
        self.dispatch(CatalogCommand::EditItem(EditItem {
            caller,
            item_id,
            image_ref: image_ref.into(),
            description: description.into(),
            price,
            points_cost,
            occurred_at: Utc::now(),
        }))
        .map(drop)
    }

    pub fn disable_item(&self, caller: UserId, item_id: ItemId) -> LedgerResult<()> {
        self.dispatch(CatalogCommand::DisableItem(DisableItem {
            caller,
            item_id,
            occurred_at: Utc::now(),
        }))
        .map(drop)
    }

    pub fn enable_item(&self, caller: UserId, item_id: ItemId) -> LedgerResult<()> {
        self.dispatch(CatalogCommand::EnableItem(EnableItem {
            caller,
            item_id,
            occurred_at: Utc::now(),
        }))
        .map(drop)
    }

    pub fn restock_item(&self, caller: UserId, item_id: ItemId, amount: u64) -> LedgerResult<()> {
        self.dispatch(CatalogCommand::RestockItem(RestockItem {
            caller,
            item_id,
            amount,
            occurred_at: Utc::now(),
        }))
        .map(drop)
    }

    /// Pay the whole balance out to the admin. Returns the amount withdrawn.
    pub fn withdraw(&self, caller: UserId) -> LedgerResult<u64> {
        let events = self.dispatch(CatalogCommand::Withdraw(Withdraw {
            caller,
            occurred_at: Utc::now(),
        }))?;
        Ok(events
            .iter()
            .map(|event| match event {
                CatalogEvent::BalanceWithdrawn(e) => e.amount,
                _ => 0,
            })
            .sum())
    }

    /// Buy `amount` units, paying `paid_value` currency or, with `use_points`,
    /// loyalty points.
    pub fn buy(
        &self,
        caller: UserId,
        item_id: ItemId,
        amount: u64,
        use_points: bool,
        paid_value: u64,
    ) -> LedgerResult<()> {
        self.dispatch(CatalogCommand::BuyItem(BuyItem {
            caller,
            item_id,
            amount,
            use_points,
            paid_value,
            occurred_at: Utc::now(),
        }))
        .map(drop)
    }

    /// Run a command through decide, settle and apply, then record and publish
    /// the resulting notifications.
    pub fn dispatch(&self, command: CatalogCommand) -> LedgerResult<Vec<CatalogEvent>> {
        let mut state = self.lock()?;

        let events = match execute_settled(&mut state.ledger, &command, |events| {
            self.settle(events)
        }) {
            Ok(events) => events,
            Err(err) => {
                tracing::warn!(
                    command = command_name(&command),
                    caller = %command_caller(&command),
                    error = %err,
                    "command rejected"
                );
                return Err(err);
            }
        };

        let first_sequence = state.ledger.version() - events.len() as u64 + 1;
        for (offset, event) in events.iter().enumerate() {
            let envelope = EventEnvelope::new(
                Uuid::now_v7(),
                self.id,
                AGGREGATE_TYPE,
                first_sequence + offset as u64,
                event.clone(),
            );
            state.journal.push(envelope.clone());

            let event_id = envelope.event_id();
            let sequence = envelope.sequence_number();
            tracing::info!(
                event_id = %event_id,
                event_type = event.event_type(),
                sequence,
                caller = %command_caller(&command),
                item_id = event.item_id().map(tracing::field::display),
                amount = event.amount(),
                "catalog event committed"
            );

            match self.bus.publish(envelope) {
                Ok(()) => tracing::debug!(event_id = %event_id, sequence, "catalog notification published"),
                Err(err) => tracing::warn!(event_id = %event_id, error = ?err, "failed to publish catalog notification"),
            }
        }

        Ok(events)
    }

    fn settle(&self, events: &[CatalogEvent]) -> LedgerResult<()> {
        for event in events {
            let transfer = match event {
                CatalogEvent::ItemBought(e) => match e.payment {
                    Payment::Currency { paid, .. } => self.gateway.collect(e.buyer, paid),
                    Payment::Points { .. } => Ok(()),
                },
                CatalogEvent::BalanceWithdrawn(e) => self.gateway.payout(e.recipient, e.amount),
                _ => Ok(()),
            };
            if let Err(err) = transfer {
                tracing::warn!(event_type = event.event_type(), error = %err, "settlement failed");
                return Err(LedgerError::transfer_failed(err.to_string()));
            }
        }
        Ok(())
    }
}

fn command_caller(command: &CatalogCommand) -> UserId {
    match command {
        CatalogCommand::AddItem(cmd) => cmd.caller,
        CatalogCommand::EditItem(cmd) => cmd.caller,
        CatalogCommand::DisableItem(cmd) => cmd.caller,
        CatalogCommand::EnableItem(cmd) => cmd.caller,
        CatalogCommand::RestockItem(cmd) => cmd.caller,
        CatalogCommand::Withdraw(cmd) => cmd.caller,
        CatalogCommand::BuyItem(cmd) => cmd.caller,
    }
}

fn command_name(command: &CatalogCommand) -> &'static str {
    match command {
        CatalogCommand::AddItem(_) => "add_item",
        CatalogCommand::EditItem(_) => "edit_item",
        CatalogCommand::DisableItem(_) => "disable_item",
        CatalogCommand::EnableItem(_) => "enable_item",
        CatalogCommand::RestockItem(_) => "restock_item",
        CatalogCommand::Withdraw(_) => "withdraw",
        CatalogCommand::BuyItem(_) => "buy",
    }
}
