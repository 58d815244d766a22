//! Route pattern segment types and parsing

use std::convert::TryFrom;

use arcstr::Substr;
use thiserror::Error;

/// Error types for route pattern parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicPatternError {
	/// Hash wildcard (#) used not at the end of the pattern
	#[error(
		"Invalid topic pattern '{pattern}': # wildcard can only be the last \
		 segment"
	)]
	HashPosition {
		/// The invalid pattern
		pattern: String,
	},

	/// Wildcard characters (+ or #) used incorrectly
	#[error("Invalid wildcard usage: {usage}")]
	WildcardUsage {
		/// Description of invalid usage
		usage: String,
	},

	/// Parameter segment without a name (`:`)
	#[error("Parameter segment in '{pattern}' has no name")]
	EmptyParameterName {
		/// The invalid pattern
		pattern: String,
	},

	/// The same parameter name appears twice in one pattern
	#[error("Parameter ':{name}' appears more than once in '{pattern}'")]
	DuplicateParameter {
		/// Repeated parameter name
		name: String,
		/// The invalid pattern
		pattern: String,
	},

	/// Empty topic is not valid
	#[error("Topic pattern cannot be empty")]
	EmptyTopic,
}

impl TopicPatternError {
	/// Creates a new HashPosition error
	pub fn hash_position(pattern: impl Into<String>) -> Self {
		Self::HashPosition {
			pattern: pattern.into(),
		}
	}

	/// Creates a new WildcardUsage error
	pub fn wildcard_usage(usage: impl Into<String>) -> Self {
		Self::WildcardUsage {
			usage: usage.into(),
		}
	}

	/// Creates a new DuplicateParameter error
	pub fn duplicate_parameter(
		name: impl Into<String>,
		pattern: impl Into<String>,
	) -> Self {
		Self::DuplicateParameter {
			name: name.into(),
			pattern: pattern.into(),
		}
	}
}

/// Single segment of a route pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternSegment {
	/// Literal segment, must match exactly
	Literal(Substr),
	/// Named parameter `:name`, matches one segment
	Param(Substr),
	/// Anonymous single-level wildcard `+`
	Plus,
	/// Multi-level wildcard `#`, last segment only
	Hash,
}

impl PatternSegment {
	/// Returns the transport wildcard form of this segment.
	pub fn as_wildcard(&self) -> &str {
		match self {
			| PatternSegment::Literal(s) => s,
			| PatternSegment::Param(_) | PatternSegment::Plus => "+",
			| PatternSegment::Hash => "#",
		}
	}

	/// Returns parameter name for `:name` segments.
	pub fn param_name(&self) -> Option<&Substr> {
		match self {
			| PatternSegment::Param(name) => Some(name),
			| _ => None,
		}
	}
}

/// Returns true for `:name` style segments.
pub(crate) fn is_param_segment(segment: &str) -> bool {
	segment.starts_with(':')
}

impl std::fmt::Display for PatternSegment {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			| PatternSegment::Param(name) => write!(f, ":{name}"),
			| other => write!(f, "{}", other.as_wildcard()),
		}
	}
}

impl TryFrom<Substr> for PatternSegment {
	type Error = TopicPatternError;

	fn try_from(item: Substr) -> Result<Self, Self::Error> {
		let segment = match item.as_str() {
			| "+" => PatternSegment::Plus,
			| "#" => PatternSegment::Hash,
			| s if is_param_segment(s) => {
				let name = &s[1 ..];
				if name.is_empty() {
					return Err(TopicPatternError::EmptyParameterName {
						pattern: s.to_string(),
					});
				}
				if name.contains(['+', '#', ':']) {
					return Err(TopicPatternError::wildcard_usage(s));
				}
				PatternSegment::Param(item.substr_from(name))
			}
			| s if s.contains(['+', '#']) => {
				return Err(TopicPatternError::wildcard_usage(s));
			}
			| _ => PatternSegment::Literal(item),
		};
		Ok(segment)
	}
}
