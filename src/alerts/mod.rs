pub mod matcher;
pub mod registry;

pub use matcher::{matching_deals, AlertMatcher, AlertOutcome, MatchReport};
pub use registry::AlertRegistry;
