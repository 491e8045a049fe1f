pub use factory::TransactionFactory;
pub use types::*;

mod factory;
mod types;
