use std::panic::AssertUnwindSafe;

use arcstr::ArcStr;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Serial executor of one listener's callback futures.
///
/// Futures run one after another in push order, off the dispatch loop. A
/// panicking callback is logged and the lane keeps going.
#[derive(Clone)]
pub(crate) struct ListenerLane {
	pattern: ArcStr,
	tx: mpsc::UnboundedSender<BoxFuture<'static, ()>>,
}

impl ListenerLane {
	pub fn spawn(pattern: ArcStr) -> Self {
		let (tx, mut rx) = mpsc::unbounded_channel::<BoxFuture<'static, ()>>();
		let task_pattern = pattern.clone();
		tokio::spawn(async move {
			while let Some(fut) = rx.recv().await {
				if AssertUnwindSafe(fut).catch_unwind().await.is_err() {
					error!(topic_pattern = %task_pattern, "Listener panicked");
				}
			}
			debug!(topic_pattern = %task_pattern, "Listener lane closed");
		});
		Self { pattern, tx }
	}

	/// Queues `fut` behind the futures already pushed.
	pub fn push(&self, fut: BoxFuture<'static, ()>) {
		if self.tx.send(fut).is_err() {
			warn!(topic_pattern = %self.pattern, "Listener lane gone, call dropped");
		}
	}
}
