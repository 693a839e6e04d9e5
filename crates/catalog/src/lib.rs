//! Catalog ledger (event-sourced).
//!
//! Item catalog, withdrawable proceeds and per-user loyalty points, implemented
//! as deterministic domain logic. Money movement is delegated to a
//! [`PaymentGateway`] supplied by the embedding environment.

pub mod config;
pub mod item;
pub mod ledger;
pub mod payment;
pub mod service;

pub use config::{CatalogConfig, ConfigError};
pub use item::Item;
pub use ledger::{
    AddItem, BalanceWithdrawn, BuyItem, CatalogCommand, CatalogEvent, CatalogLedger, DisableItem,
    EditItem, EnableItem, ItemAdded, ItemBought, ItemDisabled, ItemEdited, ItemEnabled,
    ItemRestocked, Payment, RestockItem, Withdraw,
};
pub use payment::{InMemoryWallets, PaymentError, PaymentGateway};
pub use service::CatalogService;
pub use tally_core::ItemId;
