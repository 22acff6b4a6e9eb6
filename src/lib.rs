pub mod auth;
pub mod config;
pub mod currency;
mod error;
pub mod gateway;
pub mod http;
pub mod pricing;
pub mod rates;
pub mod router;
pub mod secrets;
pub mod store;
pub mod translation;

pub use config::Config;
pub use currency::Currency;
pub use error::{GatewayError, Result};
pub use gateway::{Completed, Converted, Gateway, MIN_BALANCE_MICROS};
pub use http::{router, AppState};
pub use pricing::{ModelPricing, PricingTable, DEFAULT_MODEL};
pub use rates::{RateOracle, RateSnapshot};
pub use router::{AuthStyle, ProviderEndpoint, ProviderKind, ProviderRegistry};
pub use secrets::{EnvSecretStore, SecretCache, SecretStore};
pub use store::{Account, AccountStatus, EntryKind, JournalEntry, LedgerStore, StoreError};
