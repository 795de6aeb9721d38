// Application layer: use cases on top of the repository.
// Every write to the ledger goes through `CommissionService`.

mod dashboard;
pub mod error;
mod service;

pub use dashboard::*;
pub use error::*;
pub use service::*;
