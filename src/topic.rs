//! Topic handling module
//!
//! Route patterns with `:name` parameters, their wildcard form, concrete
//! topic matching and the reserved request/response topic conventions.

// Submodules
pub mod error;
pub mod pattern_segment;
pub mod protocol;
pub mod subscription_tree;
pub mod topic_match;
/// Route pattern parsing and matching
pub mod topic_pattern;

#[cfg(test)]
mod topic_pattern_tests;

// Re-export commonly used types for convenience
pub use error::{TopicError, limits, validation};
pub use pattern_segment::{PatternSegment, TopicPatternError};
pub use protocol::TopicClass;
pub use subscription_tree::SubscriptionTree;
pub use topic_match::{TopicParams, TopicPath};
pub use topic_pattern::{
	ParamPosition, TopicPattern, bind_params, extract_params, matches,
	to_wildcard,
};
