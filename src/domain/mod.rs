pub mod audit;
pub mod deposit;
pub mod error;
pub mod id;
pub mod ledger;
pub mod money;
pub mod notify;
pub mod order;
pub mod provider;
pub mod refund;
