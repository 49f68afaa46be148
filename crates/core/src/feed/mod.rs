pub mod parse;
pub mod provider;

pub use parse::RiskProfile;
pub use provider::{HttpRiskProfileFeed, RiskProfileFeed};
