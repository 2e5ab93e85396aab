mod need_management;
mod offer_management;
mod transaction_management;

mod data_objects;

pub use data_objects::{CasOutcome, InsertTransactionResult};
pub use need_management::NeedManagement;
pub use offer_management::OfferManagement;
pub use transaction_management::TransactionManagement;
