mod money;

pub mod op;
mod secret;

pub use money::{Money, MoneyConversionError, DEFAULT_CURRENCY_CODE, DEFAULT_CURRENCY_CODE_LOWER};
pub use secret::Secret;

pub mod helpers;
