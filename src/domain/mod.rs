mod aggregator;
mod commission;
mod ledger;
mod money;
mod payout;
mod provider;

pub use aggregator::*;
pub use commission::*;
pub use ledger::*;
pub use money::*;
pub use payout::*;
pub use provider::*;
