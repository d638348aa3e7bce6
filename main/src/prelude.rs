pub use bytes::Bytes;
pub use http::{header, HeaderMap, Method, StatusCode};
pub use url::Url;

pub use crate::{
	config,
	payload::Payload,
	pipeline::{Action, Stage},
	stages,
	transport::{HyperTransport, Transport},
	types::{CrawlError, Error, HookKind, Item, Request, Response},
	Crawler, CrawlStats,
};
