pub mod dispatch;
pub mod ledger;
pub mod orders;
pub mod queue;
