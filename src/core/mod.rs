pub mod config;
pub mod error;
pub mod types;

pub use config::BattleSettings;
pub use error::{BattleError, Result};
pub use types::{ActionId, EffectInstanceId, PixelPosition, UnitId};
