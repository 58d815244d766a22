use std::collections::HashSet;
use std::convert::TryFrom;
use std::fmt;
use std::slice::Iter;

use arcstr::{ArcStr, Substr};
use smallvec::SmallVec;

use super::pattern_segment::{
	PatternSegment, TopicPatternError, is_param_segment,
};
use super::topic_match::{TopicParams, TopicPath};

/// Position of a `:name` segment inside a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamPosition {
	/// Parameter name without the leading `:`
	pub name: Substr,
	/// Zero-based segment index
	pub index: usize,
}

/// Parsed route pattern.
///
/// The wildcard form and the parameter map are computed once at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPattern {
	template: ArcStr,
	wildcard: ArcStr,
	segments: Vec<PatternSegment>,
	params: SmallVec<[ParamPosition; 4]>,
}

impl TopicPattern {
	/// Parses and validates a route pattern such as `devices/:id/#`.
	pub fn parse(pattern: impl Into<ArcStr>) -> Result<Self, TopicPatternError> {
		let template = pattern.into();
		if template.trim().is_empty() {
			return Err(TopicPatternError::EmptyTopic);
		}

		let segments = template
			.split('/')
			.map(|s| template.substr_from(s))
			.map(PatternSegment::try_from)
			.collect::<Result<Vec<_>, _>>()?;

		if let Some(hash_pos) =
			segments.iter().position(|s| *s == PatternSegment::Hash)
		{
			if hash_pos != segments.len() - 1 {
				return Err(TopicPatternError::hash_position(
					template.as_str(),
				));
			}
		}

		let mut seen = HashSet::new();
		let mut params = SmallVec::new();
		for (index, segment) in segments.iter().enumerate() {
			if let Some(name) = segment.param_name() {
				if !seen.insert(name.to_string()) {
					return Err(TopicPatternError::duplicate_parameter(
						name.as_str(),
						template.as_str(),
					));
				}
				params.push(ParamPosition {
					name: name.clone(),
					index,
				});
			}
		}

		let wildcard = ArcStr::from(
			segments
				.iter()
				.map(PatternSegment::as_wildcard)
				.collect::<Vec<_>>()
				.join("/"),
		);

		Ok(Self {
			template,
			wildcard,
			segments,
			params,
		})
	}

	/// Returns the pattern as written, with `:name` segments.
	pub fn template(&self) -> &ArcStr {
		&self.template
	}

	/// Returns the transport subscription form, `:name` replaced by `+`.
	pub fn wildcard(&self) -> &ArcStr {
		&self.wildcard
	}

	/// Returns the `(name, index)` map of this pattern.
	pub fn params(&self) -> &[ParamPosition] {
		&self.params
	}

	/// Returns iterator over pattern segments.
	pub fn iter(&self) -> Iter<'_, PatternSegment> {
		self.segments.iter()
	}

	/// Returns number of segments in pattern.
	pub fn len(&self) -> usize {
		self.segments.len()
	}

	/// Returns true if pattern has no segments.
	pub fn is_empty(&self) -> bool {
		self.segments.is_empty()
	}

	/// Returns true if pattern ends with a multi-level wildcard.
	pub fn contains_hash(&self) -> bool {
		self.segments.last() == Some(&PatternSegment::Hash)
	}

	/// Checks whether `topic` falls under this pattern.
	pub fn matches(&self, topic: &TopicPath) -> bool {
		match_wildcard(
			self.segments.iter().map(PatternSegment::as_wildcard),
			&topic.segments,
		)
	}

	/// Matches and extracts parameter values in one step.
	pub fn try_match(&self, topic: &TopicPath) -> Option<TopicParams> {
		self.matches(topic).then(|| bind_topic_params(topic, &self.params))
	}
}

impl fmt::Display for TopicPattern {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.template)
	}
}

impl TryFrom<&str> for TopicPattern {
	type Error = TopicPatternError;

	fn try_from(value: &str) -> Result<Self, Self::Error> {
		Self::parse(value)
	}
}

impl TryFrom<String> for TopicPattern {
	type Error = TopicPatternError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::parse(value)
	}
}

impl TryFrom<ArcStr> for TopicPattern {
	type Error = TopicPatternError;

	fn try_from(value: ArcStr) -> Result<Self, Self::Error> {
		Self::parse(value)
	}
}

/// Replaces every `:name` segment with `+`.
///
/// Literals and existing `+`/`#` wildcards are left untouched.
pub fn to_wildcard(pattern: &str) -> String {
	pattern
		.split('/')
		.map(|s| if is_param_segment(s) { "+" } else { s })
		.collect::<Vec<_>>()
		.join("/")
}

/// Lists `(name, index)` for every `:name` segment of `pattern`.
pub fn extract_params(pattern: &str) -> Vec<ParamPosition> {
	let pattern = ArcStr::from(pattern);
	pattern
		.split('/')
		.enumerate()
		.filter(|(_, s)| is_param_segment(s) && s.len() > 1)
		.map(|(index, s)| ParamPosition {
			name: pattern.substr_from(&s[1 ..]),
			index,
		})
		.collect()
}

/// Binds the segments of a concrete topic to the parameter map.
///
/// An absent map yields no parameters.
pub fn bind_params(
	topic: &str,
	params: Option<&[ParamPosition]>,
) -> TopicParams {
	match params {
		| Some(params) => bind_topic_params(&TopicPath::new(topic), params),
		| None => TopicParams::default(),
	}
}

/// Hierarchical wildcard match of a concrete topic against a pattern.
pub fn matches(pattern: &str, topic: &str) -> bool {
	let topic: Vec<&str> = topic.split('/').collect();
	match_wildcard(pattern.split('/'), &topic)
}

fn bind_topic_params(topic: &TopicPath, params: &[ParamPosition]) -> TopicParams {
	let mut bound = TopicParams::default();
	for ParamPosition { name, index } in params {
		if let Some(value) = topic.segments.get(*index) {
			bound.push(name.clone(), value.clone());
		}
	}
	bound
}

/// `+` and `:name` consume one segment, `#` the (possibly empty) rest.
fn match_wildcard<'p, P, S>(pattern: P, topic: &[S]) -> bool
where
	P: IntoIterator<Item = &'p str>,
	S: AsRef<str>,
{
	let mut index = 0;
	for segment in pattern {
		match segment {
			| "#" => return true,
			| s if s == "+" || is_param_segment(s) => {
				if index >= topic.len() {
					return false;
				}
			}
			| literal => {
				if topic.get(index).map(|s| s.as_ref()) != Some(literal) {
					return false;
				}
			}
		}
		index += 1;
	}
	index == topic.len()
}
