//! Durable state: the persisted record and its single-writer store.

mod fsync;
mod state;
mod store;

pub use state::{BotConfig, ConfigError, PersistedState, SCHEMA_VERSION};
pub use store::{StateStore, StoreError};
