mod models;
mod status;

pub use models::*;
pub use status::{ContractStatus, check_transition};
