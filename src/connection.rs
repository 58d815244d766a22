//! Connection lifecycle management
//!
//! Kept apart from [`RouterClient`](crate::RouterClient) so that clients can
//! be cloned freely while exactly one owner decides when to shut down.

use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::client::ClientError;
use crate::routing::DispatcherController;
use crate::transport::TransportPtr;

/// Connection handle for lifecycle management
///
/// Keep it alive for the duration of the session and call
/// [`RouterConnection::shutdown`] when done.
pub struct RouterConnection {
	transport: TransportPtr,
	dispatcher_controller: Option<DispatcherController>,
	event_loop_handle: Option<JoinHandle<()>>,
}

impl RouterConnection {
	pub(crate) fn new(
		transport: TransportPtr,
		dispatcher_controller: DispatcherController,
		event_loop_handle: Option<JoinHandle<()>>,
	) -> Self {
		Self {
			transport,
			dispatcher_controller: Some(dispatcher_controller),
			event_loop_handle,
		}
	}

	/// Gracefully shutdown the connection by:
	/// 1. Stopping the dispatcher (unsubscribes every mounted route)
	/// 2. Disconnecting the transport
	/// 3. Waiting for the transport event loop to finish
	pub async fn shutdown(mut self) -> Result<(), ClientError> {
		if let Some(controller) = self.dispatcher_controller.take() {
			if let Err(e) = controller.shutdown().await {
				warn!(error = %e, "Failed to shutdown dispatcher");
			}
		}

		if let Err(e) = self.transport.disconnect().await {
			warn!(error = %e, "Failed to disconnect transport");
		}

		if let Some(handle) = self.event_loop_handle.take() {
			if let Err(e) = handle.await {
				warn!(error = %e, "Event loop task failed");
			}
		}

		Ok(())
	}
}

impl Drop for RouterConnection {
	fn drop(&mut self) {
		if self.dispatcher_controller.is_some() {
			error!(
				"RouterConnection dropped without calling shutdown(). Please \
				 call shutdown() and await its completion before dropping."
			);
		}
	}
}
