//! Reserved topic conventions for request/response correlation
//!
//! - request: `__req/<fullTopic>`
//! - response: `__res/<fullTopic>/<correlationId>`

/// First segment of every request topic
pub const REQUEST_PREFIX: &str = "__req";
/// First segment of every response topic
pub const RESPONSE_PREFIX: &str = "__res";

/// Dispatch class of an inbound topic, decided by its reserved prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicClass {
	/// Reply to an outstanding invocation
	Response,
	/// Invocation addressed to a handler
	Request,
	/// Plain publication addressed to listeners
	Event,
}

/// Classifies a concrete topic.
pub fn classify(topic: &str) -> TopicClass {
	if has_prefix(topic, RESPONSE_PREFIX) {
		TopicClass::Response
	} else if has_prefix(topic, REQUEST_PREFIX) {
		TopicClass::Request
	} else {
		TopicClass::Event
	}
}

fn has_prefix(topic: &str, prefix: &str) -> bool {
	topic
		.strip_prefix(prefix)
		.is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Joins `prefix` and `topic` with `/`; an empty prefix is skipped.
pub fn join(prefix: &str, topic: &str) -> String {
	if prefix.is_empty() {
		topic.to_string()
	} else {
		format!("{prefix}/{topic}")
	}
}

/// Resolves `topic` against an optional bound route.
pub fn full_topic(topic: &str, route: Option<&str>) -> String {
	join(route.unwrap_or_default(), topic)
}

/// `__req/<topic>`
pub fn request_topic(topic: &str) -> String {
	format!("{REQUEST_PREFIX}/{topic}")
}

/// `__res/<topic>`
pub fn response_topic(topic: &str) -> String {
	format!("{RESPONSE_PREFIX}/{topic}")
}

/// `<topic>/<id>`
pub fn correlated(topic: &str, id: &str) -> String {
	format!("{topic}/{id}")
}

/// Derives the reply topic of a concrete request topic.
///
/// Returns `None` when `request` does not carry the request prefix.
pub fn reply_topic(request: &str, id: &str) -> Option<String> {
	let rest = request.strip_prefix(REQUEST_PREFIX)?.strip_prefix('/')?;
	Some(correlated(&response_topic(rest), id))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_classify_by_reserved_prefix() {
		assert_eq!(classify("__res/cmd/reboot/abc"), TopicClass::Response);
		assert_eq!(classify("__req/cmd/reboot"), TopicClass::Request);
		assert_eq!(classify("cmd/reboot"), TopicClass::Event);
		assert_eq!(classify("__request/cmd"), TopicClass::Event);
	}

	#[test]
	fn test_reply_topic_derivation() {
		assert_eq!(
			reply_topic("__req/server/main/action/reboot", "k3j9x").as_deref(),
			Some("__res/server/main/action/reboot/k3j9x")
		);
		assert_eq!(reply_topic("server/main", "k3j9x"), None);
	}

	#[test]
	fn test_full_topic_with_and_without_route() {
		assert_eq!(full_topic("scan/start", Some("wifi")), "wifi/scan/start");
		assert_eq!(full_topic("scan/start", None), "scan/start");
		assert_eq!(full_topic("scan/start", Some("")), "scan/start");
	}
}
