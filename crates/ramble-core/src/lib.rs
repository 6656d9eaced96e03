pub mod config;
pub mod domain;
pub mod error;
pub mod event;
pub mod ids;

pub use config::{AppConfig, GoalConfig, MemoryConfig};
pub use domain::*;
pub use error::{CoreError, Result};
pub use event::{EventBus, EventFilter, FilteredReceiver, RambleEvent, SpeakMode};
pub use ids::{now_millis, Id, Millis};
