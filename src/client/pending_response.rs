use std::time::Duration;

use arcstr::ArcStr;
use rumqttc::QoS;
use tokio::sync::oneshot;
use tokio::time;
use tracing::{debug, warn};

use super::error::ClientError;
use crate::envelope::Envelope;
use crate::routing::{DispatchError, DispatcherHandle};
use crate::transport::TransportPtr;

/// Correlation topic subscription plus its registered responder.
///
/// Both are released when the reply arrives, on timeout and on drop.
pub(crate) struct PendingResponse {
	dispatcher: DispatcherHandle,
	topic: ArcStr,
	response: Option<oneshot::Receiver<Envelope>>,
	released: bool,
}

impl PendingResponse {
	/// Subscribes to `topic` and registers a responder for it.
	pub async fn open(
		transport: &TransportPtr,
		dispatcher: &DispatcherHandle,
		topic: ArcStr,
		qos: QoS,
	) -> Result<Self, ClientError> {
		transport.subscribe(&topic, qos).await?;
		let response = match dispatcher.register_responder(topic.clone()).await {
			| Ok(response) => response,
			| Err(err) => {
				if let Err(unsub_err) = transport.unsubscribe(&topic).await {
					warn!(
						topic = %topic,
						error = %unsub_err,
						"Failed to cleanup response subscription after register error"
					);
				}
				return Err(err.into());
			}
		};
		debug!(topic = %topic, "Awaiting response");
		Ok(Self {
			dispatcher: dispatcher.clone(),
			topic,
			response: Some(response),
			released: false,
		})
	}

	/// Waits up to `timeout` for the reply to the invocation of `invoked`.
	pub async fn wait(
		mut self,
		timeout: Duration,
		invoked: &str,
	) -> Result<Envelope, ClientError> {
		let Some(response) = self.response.take() else {
			return Err(DispatchError::ResponseLost.into());
		};
		let outcome = time::timeout(timeout, response).await;
		self.release().await;

		match outcome {
			| Ok(Ok(envelope)) => Ok(envelope),
			| Ok(Err(_)) => Err(DispatchError::ResponseLost.into()),
			| Err(_) => Err(ClientError::InvocationTimeout {
				topic: invoked.to_string(),
				timeout_millis: timeout.as_millis() as u64,
			}),
		}
	}

	async fn release(&mut self) {
		if self.released {
			return;
		}
		self.released = true;
		if let Err(err) = self.dispatcher.release_responder(self.topic.clone()).await {
			debug!(topic = %self.topic, error = %err, "Responder release skipped");
		}
	}
}

impl Drop for PendingResponse {
	fn drop(&mut self) {
		if !self.released
			&& !self.dispatcher.try_release_responder(self.topic.clone())
		{
			warn!(
				topic = %self.topic,
				"Failed to release responder, dispatcher queue full"
			);
		}
	}
}
