use std::fmt;

use arcstr::{ArcStr, Substr};
use smallvec::SmallVec;

/// Concrete topic split into segments once per delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPath {
	/// Full topic string
	pub path: ArcStr,
	/// `/`-separated segments borrowing from `path`
	pub segments: Vec<Substr>,
}

impl TopicPath {
	/// Splits `path` on `/`.
	pub fn new(path: impl Into<ArcStr>) -> Self {
		let path = path.into();
		let segments: Vec<Substr> =
			path.split('/').map(|s| path.substr_from(s)).collect();
		Self { path, segments }
	}
}

impl fmt::Display for TopicPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.path)
	}
}

/// Parameter values extracted from a concrete topic.
///
/// Ordered as the `:name` segments appear in the pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicParams {
	values: SmallVec<[(Substr, Substr); 4]>,
}

impl TopicParams {
	pub(crate) fn push(&mut self, name: Substr, value: Substr) {
		self.values.push((name, value));
	}

	/// Value bound to parameter `name`.
	pub fn get(&self, name: &str) -> Option<&str> {
		self.values
			.iter()
			.find(|(n, _)| n.as_str() == name)
			.map(|(_, value)| value.as_str())
	}

	/// Iterates `(name, value)` pairs in pattern order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.values.iter().map(|(n, v)| (n.as_str(), v.as_str()))
	}

	/// Number of bound parameters.
	pub fn len(&self) -> usize {
		self.values.len()
	}

	/// Returns true if no parameter is bound.
	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}
}

impl fmt::Display for TopicParams {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{{")?;
		for (i, (name, value)) in self.iter().enumerate() {
			if i > 0 {
				write!(f, ", ")?;
			}
			write!(f, "{name}: {value}")?;
		}
		write!(f, "}}")
	}
}
