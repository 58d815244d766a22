//! Tests for TopicPattern functionality

use super::{
	PatternSegment, TopicPath, TopicPattern, TopicPatternError, bind_params,
	extract_params, matches, to_wildcard,
};

fn create_pattern(pattern: &str) -> TopicPattern {
	TopicPattern::parse(pattern).expect("Pattern should be valid")
}

fn topic(path: &str) -> TopicPath {
	TopicPath::new(path)
}

mod parsing_tests {
	use super::*;

	#[test]
	fn test_segments_are_classified() {
		let pattern = create_pattern("state/:group/+/#");
		let segments: Vec<_> = pattern.iter().cloned().collect();

		assert_eq!(segments.len(), 4);
		assert!(matches!(&segments[0], PatternSegment::Literal(s) if s == "state"));
		assert!(matches!(&segments[1], PatternSegment::Param(s) if s == "group"));
		assert_eq!(segments[2], PatternSegment::Plus);
		assert_eq!(segments[3], PatternSegment::Hash);
		assert!(pattern.contains_hash());
	}

	#[test]
	fn test_wildcard_form_is_cached() {
		let pattern = create_pattern("server/main/action/:group/:id/:command");
		assert_eq!(pattern.template(), "server/main/action/:group/:id/:command");
		assert_eq!(pattern.wildcard(), "server/main/action/+/+/+");
	}

	#[test]
	fn test_param_positions() {
		let pattern = create_pattern("state/:group/:id");
		let params: Vec<_> = pattern
			.params()
			.iter()
			.map(|p| (p.name.as_str(), p.index))
			.collect();
		assert_eq!(params, vec![("group", 1), ("id", 2)]);
	}

	#[test]
	fn test_empty_pattern_rejected() {
		assert_eq!(TopicPattern::parse(""), Err(TopicPatternError::EmptyTopic));
		assert_eq!(
			TopicPattern::parse("   "),
			Err(TopicPatternError::EmptyTopic)
		);
	}

	#[test]
	fn test_hash_must_be_last() {
		assert!(matches!(
			TopicPattern::parse("a/#/b"),
			Err(TopicPatternError::HashPosition { .. })
		));
	}

	#[test]
	fn test_mixed_wildcard_segment_rejected() {
		assert!(matches!(
			TopicPattern::parse("a/b+c"),
			Err(TopicPatternError::WildcardUsage { .. })
		));
		assert!(matches!(
			TopicPattern::parse("a/:id#"),
			Err(TopicPatternError::WildcardUsage { .. })
		));
	}

	#[test]
	fn test_unnamed_and_duplicate_params_rejected() {
		assert!(matches!(
			TopicPattern::parse("a/:/c"),
			Err(TopicPatternError::EmptyParameterName { .. })
		));
		assert!(matches!(
			TopicPattern::parse("a/:id/:id"),
			Err(TopicPatternError::DuplicateParameter { .. })
		));
	}

	#[test]
	fn test_colon_inside_literal_is_not_a_param() {
		let pattern = create_pattern("machine:01/state");
		assert!(pattern.params().is_empty());
		assert_eq!(pattern.wildcard(), "machine:01/state");
	}
}

mod matching_tests {
	use super::*;

	#[test]
	fn test_named_param_match_extracts_value() {
		let pattern = create_pattern("a/:x/c");
		let params = pattern.try_match(&topic("a/b/c")).expect("should match");
		assert_eq!(params.get("x"), Some("b"));
		assert_eq!(params.len(), 1);
	}

	#[test]
	fn test_plus_matches_single_level() {
		let pattern = create_pattern("a/+/c");
		assert!(pattern.matches(&topic("a/b/c")));
		assert!(!pattern.matches(&topic("a/b/x/c")));
		assert!(!pattern.matches(&topic("a/c")));
	}

	#[test]
	fn test_hash_matches_tail() {
		let pattern = create_pattern("a/#");
		assert!(pattern.matches(&topic("a/b/c/d")));
		assert!(pattern.matches(&topic("a/b")));
		assert!(pattern.matches(&topic("a")));
		assert!(!pattern.matches(&topic("b/a")));
	}

	#[test]
	fn test_segment_count_mismatch() {
		let pattern = create_pattern("a/:x");
		assert!(pattern.try_match(&topic("a/b/c")).is_none());
		assert!(pattern.try_match(&topic("a")).is_none());
	}

	#[test]
	fn test_literals_must_match_exactly() {
		let pattern = create_pattern("wifi/scan/stop");
		assert!(pattern.matches(&topic("wifi/scan/stop")));
		assert!(!pattern.matches(&topic("wifi/scan/start")));
		assert!(!pattern.matches(&topic("wifi/scan/stop/")));
	}

	#[test]
	fn test_params_with_trailing_hash() {
		let pattern = create_pattern("devices/:id/#");
		let params = pattern
			.try_match(&topic("devices/d42/sensors/temp"))
			.expect("should match");
		assert_eq!(params.get("id"), Some("d42"));
		assert_eq!(params.get("missing"), None);
	}
}

mod string_level_tests {
	use super::*;

	#[test]
	fn test_to_wildcard() {
		assert_eq!(to_wildcard("state/:group/:id"), "state/+/+");
		assert_eq!(to_wildcard(":group/+/#"), "+/+/#");
		assert_eq!(to_wildcard("plain/topic"), "plain/topic");
	}

	#[test]
	fn test_extract_params() {
		let params = extract_params(":group/:id/:command");
		let names: Vec<_> = params
			.iter()
			.map(|p| (p.name.as_str(), p.index))
			.collect();
		assert_eq!(names, vec![("group", 0), ("id", 1), ("command", 2)]);
	}

	#[test]
	fn test_bind_params() {
		let params = extract_params("state/:group/:id");
		let bound = bind_params("state/machine/01", Some(&params));
		assert_eq!(bound.get("group"), Some("machine"));
		assert_eq!(bound.get("id"), Some("01"));
	}

	#[test]
	fn test_bind_params_without_map_is_empty() {
		assert!(bind_params("state/machine/01", None).is_empty());
	}

	#[test]
	fn test_free_matches() {
		assert!(matches("a/:x/c", "a/b/c"));
		assert!(matches("a/+/c", "a/b/c"));
		assert!(matches("a/#", "a/b/c/d"));
		assert!(!matches("a/:x", "a/b/c"));
	}
}
