use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use arcstr::ArcStr;
use tokio::task::JoinHandle;
use tracing::debug;

struct PendingTimer {
	generation: u64,
	handle: JoinHandle<()>,
}

/// Per-topic trailing-edge timers for debounced listeners.
///
/// Scheduling for a topic with a pending timer cancels it, so only the most
/// recent delivery fires once the topic has been quiet for the period.
#[derive(Default)]
pub(crate) struct Debouncer {
	timers: HashMap<ArcStr, PendingTimer>,
	next_generation: u64,
}

impl Debouncer {
	pub fn new() -> Self {
		Self::default()
	}

	/// Replaces the pending timer of `topic`.
	///
	/// After `period` the `fire` closure runs, then `notify` is called with
	/// the timer generation so the owner can call [`Debouncer::complete`].
	/// A replaced timer never runs its `fire`.
	pub fn schedule<F, N, NF>(
		&mut self,
		topic: ArcStr,
		period: Duration,
		fire: F,
		notify: N,
	) where
		F: FnOnce() + Send + 'static,
		N: FnOnce(u64) -> NF + Send + 'static,
		NF: Future<Output = ()> + Send + 'static,
	{
		self.next_generation += 1;
		let generation = self.next_generation;

		let handle = tokio::spawn(async move {
			tokio::time::sleep(period).await;
			fire();
			notify(generation).await;
		});

		if let Some(previous) = self
			.timers
			.insert(topic.clone(), PendingTimer { generation, handle })
		{
			previous.handle.abort();
			debug!(topic = %topic, "Debounce timer restarted");
		}
	}

	/// Forgets the timer of `topic` if it is still generation `generation`.
	pub fn complete(&mut self, topic: &ArcStr, generation: u64) {
		if self
			.timers
			.get(topic)
			.is_some_and(|timer| timer.generation == generation)
		{
			self.timers.remove(topic);
		}
	}

	pub fn cancel_all(&mut self) {
		for (_, timer) in self.timers.drain() {
			timer.handle.abort();
		}
	}

	pub fn pending(&self) -> usize {
		self.timers.len()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::{Arc, Mutex};

	use super::*;

	#[tokio::test(start_paused = true)]
	async fn test_only_last_schedule_fires() {
		let fired = Arc::new(Mutex::new(Vec::new()));
		let notified = Arc::new(AtomicUsize::new(0));
		let mut debouncer = Debouncer::new();
		let topic = ArcStr::from("sensors/temp");

		for value in 1 ..= 3 {
			let fired = fired.clone();
			let notified = notified.clone();
			debouncer.schedule(
				topic.clone(),
				Duration::from_millis(100),
				move || fired.lock().unwrap().push(value),
				move |_| async move {
					notified.fetch_add(1, Ordering::SeqCst);
				},
			);
			tokio::time::sleep(Duration::from_millis(30)).await;
		}
		assert!(fired.lock().unwrap().is_empty());

		tokio::time::sleep(Duration::from_millis(200)).await;
		assert_eq!(*fired.lock().unwrap(), vec![3]);
		assert_eq!(notified.load(Ordering::SeqCst), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_complete_ignores_stale_generation() {
		let mut debouncer = Debouncer::new();
		let topic = ArcStr::from("a");
		debouncer.schedule(topic.clone(), Duration::from_secs(1), || {}, |_| async {});
		debouncer.schedule(topic.clone(), Duration::from_secs(1), || {}, |_| async {});

		debouncer.complete(&topic, 1);
		assert_eq!(debouncer.pending(), 1);
		debouncer.complete(&topic, 2);
		assert_eq!(debouncer.pending(), 0);
	}
}
