//! Strategy layer: opportunity analysis, validation and history.

pub mod analyzer;
pub mod history;
pub mod validator;

pub use analyzer::OpportunityAnalyzer;
pub use history::StrategyHistory;
pub use validator::{Rejection, StrategyValidator};
