use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use arcstr::ArcStr;
use futures::FutureExt;
use futures::future::BoxFuture;
use rumqttc::QoS;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::envelope::{self, to_data};
use crate::topic::protocol::{join, request_topic};
use crate::topic::{TopicParams, TopicPattern, TopicPatternError};

/// Error type returned by user handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Type-erased listener callback
pub type ListenerFn =
	Arc<dyn Fn(Publication) -> BoxFuture<'static, ()> + Send + Sync>;

/// Type-erased handler callback, its value becomes the reply `data`
pub type HandlerFn = Arc<
	dyn Fn(Publication) -> BoxFuture<'static, Result<Option<Value>, HandlerError>>
		+ Send
		+ Sync,
>;

/// What a route does with a matching message.
#[derive(Clone)]
pub enum Callback {
	/// Side effect only
	Listener(ListenerFn),
	/// Produces the reply of an invocation
	Handler(HandlerFn),
}

impl fmt::Debug for Callback {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			| Callback::Listener(_) => write!(f, "Listener"),
			| Callback::Handler(_) => write!(f, "Handler"),
		}
	}
}

/// Message handed to listeners and handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct Publication {
	/// Concrete topic, request prefix included for invocations
	pub topic: ArcStr,
	/// Values of the route's `:name` segments
	pub params: TopicParams,
	/// Envelope payload
	pub data: Option<Value>,
}

impl Publication {
	/// Deserializes the payload; absent data reads as `null`.
	pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
		envelope::data_as(self.data.clone())
	}

	/// Value of parameter `name`
	pub fn param(&self, name: &str) -> Option<&str> {
		self.params.get(name)
	}
}

/// QoS, retain and debounce settings of a route.
///
/// Unset fields fall back to the enclosing router's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteOptions {
	pub qos: Option<QoS>,
	pub retain: Option<bool>,
	/// Quiet period before a listener fires; ignored for handlers
	pub debounce: Option<Duration>,
}

impl RouteOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn qos(mut self, qos: QoS) -> Self {
		self.qos = Some(qos);
		self
	}

	pub fn retain(mut self, retain: bool) -> Self {
		self.retain = Some(retain);
		self
	}

	pub fn debounce(mut self, period: Duration) -> Self {
		self.debounce = Some(period);
		self
	}

	/// Field-wise merge, values set on `self` win.
	pub fn merged_over(&self, base: &RouteOptions) -> RouteOptions {
		RouteOptions {
			qos: self.qos.or(base.qos),
			retain: self.retain.or(base.retain),
			debounce: self.debounce.or(base.debounce),
		}
	}

	pub(crate) fn effective_qos(&self) -> QoS {
		self.qos.unwrap_or(QoS::AtLeastOnce)
	}

	pub(crate) fn effective_retain(&self) -> bool {
		self.retain.unwrap_or(false)
	}
}

/// Pattern bound to a callback.
#[derive(Debug, Clone)]
pub struct Route {
	pub pattern: ArcStr,
	pub callback: Callback,
	pub options: RouteOptions,
}

/// Route resolved against a mount prefix and parsed.
#[derive(Clone)]
pub struct MountedRoute<C> {
	/// `prefix/pattern` as written
	pub full_pattern: ArcStr,
	/// Parsed dispatch pattern, `__req/<full_pattern>` for handlers
	pub pattern: TopicPattern,
	pub callback: C,
	pub options: RouteOptions,
}

impl<C> MountedRoute<C> {
	/// Transport subscription for this route
	pub fn subscription(&self) -> &ArcStr {
		self.pattern.wildcard()
	}
}

impl<C> fmt::Debug for MountedRoute<C> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MountedRoute")
			.field("full_pattern", &self.full_pattern)
			.field("pattern", &self.pattern.template())
			.field("options", &self.options)
			.finish()
	}
}

/// Composable ordered collection of listener and handler routes.
///
/// ```rust
/// use mqtt_rpc_router::Router;
///
/// let mut scan = Router::new();
/// scan.on("stop", |_| async {});
///
/// let mut wifi = Router::new();
/// wifi.mount("scan", &scan);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Router {
	routes: Vec<Route>,
	defaults: RouteOptions,
}

impl Router {
	pub fn new() -> Self {
		Self::default()
	}

	/// Router whose routes inherit `defaults` for unset options.
	pub fn with_options(defaults: RouteOptions) -> Self {
		Self {
			routes: Vec::new(),
			defaults,
		}
	}

	/// Adds a listener route.
	pub fn on<F, Fut>(&mut self, pattern: impl Into<ArcStr>, listener: F) -> &mut Self
	where
		F: Fn(Publication) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = ()> + Send + 'static,
	{
		self.on_with(pattern, listener, RouteOptions::default())
	}

	/// Adds a listener route with per-route options.
	pub fn on_with<F, Fut>(
		&mut self,
		pattern: impl Into<ArcStr>,
		listener: F,
		options: RouteOptions,
	) -> &mut Self
	where
		F: Fn(Publication) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = ()> + Send + 'static,
	{
		let listener: ListenerFn = Arc::new(move |p| listener(p).boxed());
		self.push(pattern.into(), Callback::Listener(listener), options)
	}

	/// Adds a handler route; its result is published as the reply.
	pub fn handle<F, Fut, R, E>(
		&mut self,
		pattern: impl Into<ArcStr>,
		handler: F,
	) -> &mut Self
	where
		F: Fn(Publication) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<R, E>> + Send + 'static,
		R: Serialize + Send + 'static,
		E: Into<HandlerError> + 'static,
	{
		self.handle_with(pattern, handler, RouteOptions::default())
	}

	/// Adds a handler route with per-route options.
	pub fn handle_with<F, Fut, R, E>(
		&mut self,
		pattern: impl Into<ArcStr>,
		handler: F,
		options: RouteOptions,
	) -> &mut Self
	where
		F: Fn(Publication) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<R, E>> + Send + 'static,
		R: Serialize + Send + 'static,
		E: Into<HandlerError> + 'static,
	{
		let handler: HandlerFn = Arc::new(move |p| {
			let fut = handler(p);
			async move {
				let value = fut.await.map_err(Into::<HandlerError>::into)?;
				to_data(&value).map_err(HandlerError::from)
			}
			.boxed()
		});
		self.push(pattern.into(), Callback::Handler(handler), options)
	}

	fn push(
		&mut self,
		pattern: ArcStr,
		callback: Callback,
		options: RouteOptions,
	) -> &mut Self {
		self.routes.push(Route {
			pattern,
			callback,
			options: options.merged_over(&self.defaults),
		});
		self
	}

	/// Copies every route of `sub` under `prefix`.
	///
	/// Later changes to `sub` are not reflected here.
	pub fn mount(&mut self, prefix: &str, sub: &Router) -> &mut Self {
		self.routes.extend(sub.routes.iter().map(|route| Route {
			pattern: join(prefix, &route.pattern).into(),
			callback: route.callback.clone(),
			options: route.options.clone(),
		}));
		self
	}

	pub fn routes(&self) -> &[Route] {
		&self.routes
	}

	/// Listener routes resolved against `prefix`, in registration order.
	pub fn mount_listeners(
		&self,
		prefix: &str,
	) -> Result<Vec<MountedRoute<ListenerFn>>, TopicPatternError> {
		self.routes
			.iter()
			.filter_map(|route| match &route.callback {
				| Callback::Listener(listener) => Some((route, listener)),
				| Callback::Handler(_) => None,
			})
			.map(|(route, listener)| {
				let full_pattern = ArcStr::from(join(prefix, &route.pattern));
				Ok(MountedRoute {
					pattern: TopicPattern::parse(full_pattern.clone())?,
					full_pattern,
					callback: listener.clone(),
					options: route.options.clone(),
				})
			})
			.collect()
	}

	/// Handler routes resolved against `prefix`, in registration order.
	pub fn mount_handlers(
		&self,
		prefix: &str,
	) -> Result<Vec<MountedRoute<HandlerFn>>, TopicPatternError> {
		self.routes
			.iter()
			.filter_map(|route| match &route.callback {
				| Callback::Handler(handler) => Some((route, handler)),
				| Callback::Listener(_) => None,
			})
			.map(|(route, handler)| {
				let full_pattern = ArcStr::from(join(prefix, &route.pattern));
				Ok(MountedRoute {
					pattern: TopicPattern::parse(request_topic(&full_pattern))?,
					full_pattern,
					callback: handler.clone(),
					options: route.options.clone(),
				})
			})
			.collect()
	}
}
