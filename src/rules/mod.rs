mod engine;
mod history;

pub use engine::{RuleEngine, RuleThresholds};
pub use history::{NoRecentHistory, RecentHistory};
