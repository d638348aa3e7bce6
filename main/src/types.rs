use std::{any::Any, borrow::Cow};

use humansize::{format_size, BINARY};
use serde::de::DeserializeOwned;
use thiserror::{self, Error};

#[allow(unused_imports)]
use crate::_prelude::*;
use crate::Crawler;

pub type Handler = Arc<dyn Fn(&Crawler, &Response) + Send + Sync>;
pub type Meta = HashMap<String, serde_json::Value>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
	#[error(transparent)]
	Other(#[from] anyhow::Error),
	#[error("cannot parse url {url:?}")]
	Url {
		url:    String,
		#[source]
		source: url::ParseError,
	},
	#[error("cannot encode {kind} payload")]
	Payload {
		kind:   &'static str,
		#[source]
		source: serde_json::Error,
	},
	#[error("cannot decode json body")]
	Json(#[from] serde_json::Error),
	#[error("invalid header {name:?}")]
	Header { name: String },
	#[error("timeout while awaiting for status response")]
	StatusTimeout,
	#[error("timeout during loading")]
	LoadTimeout,
	#[error("max response size reached: {0}")]
	MaxResponseSize(usize),
	#[error("crawler is already running")]
	AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
pub enum HookKind {
	Init,
	Request,
	Response,
	Item,
	Handler,
	Transport,
}

impl fmt::Display for HookKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s: &'static str = self.into();
		write!(f, "{}", s)
	}
}

/// What every stage's `on_error` hook receives.
#[derive(Error, Debug)]
pub enum CrawlError {
	#[error("cannot download {} {}", .request.method, .request.url)]
	Download {
		request: Arc<Request>,
		#[source]
		source:  Error,
	},
	#[error("panic in {hook} hook of {name:?}: {message}")]
	Panic { hook: HookKind, name: &'static str, message: String },
}

impl CrawlError {
	/// The request the error relates to, if any. A stage may clone it and resubmit.
	pub fn request(&self) -> Option<&Arc<Request>> {
		match self {
			CrawlError::Download { request, .. } => Some(request),
			CrawlError::Panic { .. } => None,
		}
	}

	pub(crate) fn panic(hook: HookKind, name: &'static str, payload: Box<dyn Any + Send>) -> Self {
		let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
			String::from(*s)
		} else if let Some(s) = payload.downcast_ref::<String>() {
			s.clone()
		} else {
			String::from("unknown panic payload")
		};
		CrawlError::Panic { hook, name, message }
	}
}

#[derive(Derivative)]
#[derivative(Debug, Clone)]
pub struct Request {
	pub url:     Url,
	pub method:  http::Method,
	pub headers: http::HeaderMap,
	pub body:    Bytes,
	pub meta:    Meta,
	#[derivative(Debug = "ignore")]
	handlers:    Vec<Handler>,
}

impl Request {
	pub fn new(method: http::Method, url: &str) -> Result<Self> {
		let url = Url::parse(url).map_err(|source| Error::Url { url: String::from(url), source })?;
		Ok(Self::from_url(method, url))
	}

	pub fn from_url(method: http::Method, url: Url) -> Self {
		Self { url, method, headers: http::HeaderMap::new(), body: Bytes::new(), meta: Meta::new(), handlers: vec![] }
	}

	pub fn get(url: &str) -> Result<Self> {
		Self::new(http::Method::GET, url)
	}

	pub fn post(url: &str, body: impl Into<Bytes>, content_type: &str) -> Result<Self> {
		let mut req = Self::new(http::Method::POST, url)?.with_header(http::header::CONTENT_TYPE.as_str(), content_type)?;
		req.body = body.into();
		Ok(req)
	}

	pub fn with_handler<F: Fn(&Crawler, &Response) + Send + Sync + 'static>(mut self, handler: F) -> Self {
		self.handlers.push(Arc::new(handler));
		self
	}

	pub fn with_shared_handler(mut self, handler: Handler) -> Self {
		self.handlers.push(handler);
		self
	}

	pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
		let header_name = http::header::HeaderName::from_str(name).map_err(|_| Error::Header { name: name.into() })?;
		let header_value = http::HeaderValue::from_str(value).map_err(|_| Error::Header { name: name.into() })?;
		self.headers.insert(header_name, header_value);
		Ok(self)
	}

	pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
		self.meta.insert(String::from(key), value.into());
		self
	}

	pub fn handlers_len(&self) -> usize {
		self.handlers.len()
	}

	pub(crate) fn take_handlers(&mut self) -> Vec<Handler> {
		mem::take(&mut self.handlers)
	}
}

impl fmt::Display for Request {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} {}", self.method, self.url)
	}
}

#[derive(Debug)]
pub struct Response {
	pub status:  http::StatusCode,
	pub headers: http::HeaderMap,
	pub body:    Bytes,
	pub request: Arc<Request>,
}

impl Response {
	pub fn new(request: Arc<Request>, status: http::StatusCode, headers: http::HeaderMap, body: Bytes) -> Self {
		Self { status, headers, body, request }
	}

	pub fn url(&self) -> &Url {
		&self.request.url
	}

	pub fn text(&self) -> Cow<'_, str> {
		String::from_utf8_lossy(&self.body)
	}

	pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
		Ok(serde_json::from_slice(&self.body)?)
	}

	pub fn header_str(&self, name: http::header::HeaderName) -> anyhow::Result<&str> {
		let name_str = String::from(name.as_str());
		self.headers
			.get(name)
			.ok_or_else(|| anyhow!("{}: not found", name_str))?
			.to_str()
			.with_context(|| format!("cannot read {} value", name_str))
	}
}

impl fmt::Display for Response {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "[{}] {} {}", self.status.as_u16(), self.request, format_size(self.body.len(), BINARY))
	}
}

/// An extracted domain object travelling through the `on_item` chain.
pub struct Item(Box<dyn Any + Send>);

impl Item {
	pub fn new<T: Any + Send>(value: T) -> Self {
		Self(Box::new(value))
	}

	pub fn is<T: Any>(&self) -> bool {
		self.0.is::<T>()
	}

	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		self.0.downcast_ref::<T>()
	}

	pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
		self.0.downcast_mut::<T>()
	}

	pub fn downcast<T: Any>(self) -> std::result::Result<T, Item> {
		self.0.downcast::<T>().map(|v| *v).map_err(Item)
	}
}

impl fmt::Debug for Item {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("Item(..)")
	}
}
