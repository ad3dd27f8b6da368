pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod i18n;
pub mod security;
pub mod server;
pub mod service;
pub mod store;
pub mod timeout;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, TranslationCacheConfig};
pub use error::{TranslationError, TranslationResult};
pub use i18n::{LanguageOption, TranslationBundle, TranslationCache, TranslationDefinition};
pub use service::TranslationService;
