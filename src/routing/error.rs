use thiserror::Error;

/// Failures talking to the dispatcher task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DispatchError {
	/// Dispatcher is gone, the connection was shut down
	#[error("Dispatcher command channel closed")]
	ChannelClosed,
	/// Dispatcher dropped the reply sender before answering
	#[error("Dispatcher response lost")]
	ResponseLost,
}
