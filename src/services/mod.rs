pub mod compensation;
pub mod ingestion;
pub mod ledger;
pub mod reconciliation;
pub mod refunds;
pub mod unmatched;
pub mod worker;
