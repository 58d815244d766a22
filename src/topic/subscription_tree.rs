//! Wildcard subscription tree used by the in-process broker.

use std::collections::HashMap;

use arcstr::Substr;

use super::pattern_segment::PatternSegment;
use super::topic_match::TopicPath;
use super::topic_pattern::TopicPattern;

/// Collections that can report emptiness, so empty nodes can be pruned.
pub trait Len {
	/// Number of entries
	fn len(&self) -> usize;
	/// Returns true when there are no entries
	fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl<K, V> Len for HashMap<K, V> {
	fn len(&self) -> usize {
		self.len()
	}
}

/// Node of the subscription tree, one level per topic segment.
#[derive(Debug)]
pub struct SubscriptionTree<T> {
	exact_match_data: Option<T>,
	exact_children: HashMap<Substr, SubscriptionTree<T>>,
	single_level_wildcard_node: Option<Box<SubscriptionTree<T>>>,
	multi_level_wildcard_data: Option<T>,
}

impl<T: Default + Len> Default for SubscriptionTree<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: Default + Len> SubscriptionTree<T> {
	/// Creates an empty tree
	pub fn new() -> Self {
		Self {
			exact_match_data: None,
			exact_children: HashMap::new(),
			single_level_wildcard_node: None,
			multi_level_wildcard_data: None,
		}
	}

	/// Returns true if no subscription is stored below this node.
	pub fn is_empty(&self) -> bool {
		self.exact_match_data.as_ref().is_none_or(T::is_empty)
			&& self.exact_children.is_empty()
			&& self.single_level_wildcard_node.is_none()
			&& self
				.multi_level_wildcard_data
				.as_ref()
				.is_none_or(T::is_empty)
	}

	/// Finds or creates the data slot for `pattern`.
	pub fn entry(&mut self, pattern: &TopicPattern) -> &mut T {
		let mut node = self;
		for segment in pattern.iter() {
			match segment {
				| PatternSegment::Literal(s) => {
					node = node.exact_children.entry(s.clone()).or_default();
				}
				| PatternSegment::Param(_) | PatternSegment::Plus => {
					node = node
						.single_level_wildcard_node
						.get_or_insert_with(|| Box::new(SubscriptionTree::new()));
				}
				| PatternSegment::Hash => {
					return node
						.multi_level_wildcard_data
						.get_or_insert_with(T::default);
				}
			}
		}
		node.exact_match_data.get_or_insert_with(T::default)
	}

	/// Applies `f` to the slot of `pattern` and prunes emptied nodes.
	///
	/// Returns false when the pattern has no slot.
	pub fn update<F>(&mut self, pattern: &TopicPattern, f: F) -> bool
	where F: FnOnce(&mut T) {
		let segments: Vec<&PatternSegment> = pattern.iter().collect();
		self.update_node(&segments, f).is_some()
	}

	/// Returns `Some(now_empty)` when the slot was found.
	fn update_node<F>(
		&mut self,
		segments: &[&PatternSegment],
		f: F,
	) -> Option<bool>
	where
		F: FnOnce(&mut T),
	{
		let Some((current, rest)) = segments.split_first() else {
			let data = self.exact_match_data.as_mut()?;
			f(data);
			if data.is_empty() {
				self.exact_match_data = None;
			}
			return Some(self.is_empty());
		};

		match current {
			| PatternSegment::Literal(s) => {
				let child = self.exact_children.get_mut(s)?;
				if child.update_node(rest, f)? {
					self.exact_children.remove(s);
				}
			}
			| PatternSegment::Param(_) | PatternSegment::Plus => {
				let child = self.single_level_wildcard_node.as_mut()?;
				if child.update_node(rest, f)? {
					self.single_level_wildcard_node = None;
				}
			}
			| PatternSegment::Hash => {
				let data = self.multi_level_wildcard_data.as_mut()?;
				f(data);
				if data.is_empty() {
					self.multi_level_wildcard_data = None;
				}
			}
		}
		Some(self.is_empty())
	}

	fn collect_matching<'a>(&'a self, topic: &[Substr], found: &mut Vec<&'a T>) {
		match topic {
			| [] => {
				found.extend(self.exact_match_data.iter());
				found.extend(self.multi_level_wildcard_data.iter());
			}
			| [segment, rest @ ..] => {
				if let Some(child) = self.exact_children.get(segment) {
					child.collect_matching(rest, found);
				}
				if let Some(plus) = &self.single_level_wildcard_node {
					plus.collect_matching(rest, found);
				}
				found.extend(self.multi_level_wildcard_data.iter());
			}
		}
	}

	/// Finds every data slot whose pattern matches `topic`.
	pub fn find(&self, topic: &TopicPath) -> Vec<&T> {
		let mut found = Vec::new();
		self.collect_matching(&topic.segments, &mut found);
		found
	}
}
