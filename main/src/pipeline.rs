//! Ordered chain of stages applied to every request, response, error and item.
//!
//! Transform hooks short-circuit: the first stage returning [`Action::Drop`] ends the
//! chain and later stages never see the value. `on_error` is a broadcast and reaches
//! every stage.

use std::panic::AssertUnwindSafe;

#[allow(unused_imports)]
use crate::_prelude::*;
use crate::{
	types::{CrawlError, HookKind, Item, Request, Response},
	Crawler,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action<T> {
	Accept(T),
	Drop,
}

impl<T> Action<T> {
	pub fn is_drop(&self) -> bool {
		matches!(self, Action::Drop)
	}

	pub fn into_option(self) -> Option<T> {
		match self {
			Action::Accept(v) => Some(v),
			Action::Drop => None,
		}
	}
}

impl<T> From<Option<T>> for Action<T> {
	fn from(v: Option<T>) -> Self {
		v.map_or(Action::Drop, Action::Accept)
	}
}

/// A unit of the pipeline. Shared by all workers, hooks are called concurrently.
pub trait Stage: Send + Sync + 'static {
	fn name(&self) -> &'static str {
		short_type_name(std::any::type_name::<Self>())
	}
	// called once, when the stage is registered
	fn init(&self, _crawler: &Crawler) {}
	fn on_request(&self, _crawler: &Crawler, request: Request) -> Action<Request> {
		Action::Accept(request)
	}
	fn on_response(&self, _crawler: &Crawler, response: Response) -> Action<Response> {
		Action::Accept(response)
	}
	fn on_error(&self, _crawler: &Crawler, _err: &CrawlError) {}
	fn on_item(&self, _crawler: &Crawler, item: Item) -> Action<Item> {
		Action::Accept(item)
	}
}

pub(crate) fn short_type_name(full: &'static str) -> &'static str {
	let base = full.split('<').next().unwrap_or(full);
	base.rsplit("::").next().unwrap_or(base)
}

pub(crate) type Stages = Arc<Vec<Arc<dyn Stage>>>;

#[derive(Default)]
pub(crate) struct Pipeline {
	// copy-on-write: registration swaps the vector, dispatch works on a snapshot
	stages: RwLock<Stages>,
}

impl Pipeline {
	pub(crate) fn register(&self, crawler: &Crawler, stage: Arc<dyn Stage>) {
		let r = panic::catch_unwind(AssertUnwindSafe(|| stage.init(crawler)));
		if let Err(payload) = r {
			let err = CrawlError::panic(HookKind::Init, stage.name(), payload);
			warn!(stage = stage.name(), "{}", err);
			self.on_error(crawler, &err);
		}

		let mut stages = self.stages.write().unwrap_or_else(|poisoned| poisoned.into_inner());
		let mut next = Vec::with_capacity(stages.len() + 1);
		next.extend(stages.iter().cloned());
		next.push(stage);
		*stages = Arc::new(next);
	}

	pub(crate) fn snapshot(&self) -> Stages {
		Arc::clone(&self.stages.read().unwrap_or_else(|poisoned| poisoned.into_inner()))
	}

	pub(crate) fn len(&self) -> usize {
		self.snapshot().len()
	}

	fn transform<T, F: Fn(&dyn Stage, &Crawler, T) -> Action<T>>(
		&self,
		crawler: &Crawler,
		hook: HookKind,
		value: T,
		f: F,
	) -> Action<T> {
		let mut value = value;
		for stage in self.snapshot().iter() {
			let r = panic::catch_unwind(AssertUnwindSafe(|| f(stage.as_ref(), crawler, value)));
			match r {
				Ok(Action::Accept(v)) => value = v,
				Ok(Action::Drop) => {
					debug!(action = "drop", stage = stage.name(), %hook);
					return Action::Drop
				}
				Err(payload) => {
					let err = CrawlError::panic(hook, stage.name(), payload);
					warn!(action = "drop", stage = stage.name(), "{}", err);
					self.on_error(crawler, &err);
					return Action::Drop
				}
			}
		}
		Action::Accept(value)
	}

	pub(crate) fn on_request(&self, crawler: &Crawler, request: Request) -> Action<Request> {
		self.transform(crawler, HookKind::Request, request, |stage, crawler, v| stage.on_request(crawler, v))
	}

	pub(crate) fn on_response(&self, crawler: &Crawler, response: Response) -> Action<Response> {
		self.transform(crawler, HookKind::Response, response, |stage, crawler, v| stage.on_response(crawler, v))
	}

	pub(crate) fn on_item(&self, crawler: &Crawler, item: Item) -> Action<Item> {
		self.transform(crawler, HookKind::Item, item, |stage, crawler, v| stage.on_item(crawler, v))
	}

	pub(crate) fn on_error(&self, crawler: &Crawler, err: &CrawlError) {
		for stage in self.snapshot().iter() {
			if panic::catch_unwind(AssertUnwindSafe(|| stage.on_error(crawler, err))).is_err() {
				error!(stage = stage.name(), "panic in error hook while reporting: {}", err);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{config::CrawlingSettings, types::Result};

	async fn offline(_req: Arc<Request>) -> Result<Response> {
		Err(anyhow!("offline").into())
	}

	fn crawler() -> Crawler {
		Crawler::new(CrawlingSettings::default(), offline).unwrap()
	}

	#[derive(Default)]
	struct Counter {
		requests:  AtomicUsize,
		responses: AtomicUsize,
		errors:    AtomicUsize,
		items:     AtomicUsize,
	}

	impl Stage for Arc<Counter> {
		fn on_request(&self, _: &Crawler, r: Request) -> Action<Request> {
			self.requests.fetch_add(1, Ordering::SeqCst);
			Action::Accept(r)
		}

		fn on_response(&self, _: &Crawler, r: Response) -> Action<Response> {
			self.responses.fetch_add(1, Ordering::SeqCst);
			Action::Accept(r)
		}

		fn on_error(&self, _: &Crawler, _: &CrawlError) {
			self.errors.fetch_add(1, Ordering::SeqCst);
		}

		fn on_item(&self, _: &Crawler, i: Item) -> Action<Item> {
			self.items.fetch_add(1, Ordering::SeqCst);
			Action::Accept(i)
		}
	}

	struct DropAll;

	impl Stage for DropAll {
		fn on_request(&self, _: &Crawler, _: Request) -> Action<Request> {
			Action::Drop
		}

		fn on_response(&self, _: &Crawler, _: Response) -> Action<Response> {
			Action::Drop
		}

		fn on_item(&self, _: &Crawler, _: Item) -> Action<Item> {
			Action::Drop
		}
	}

	struct Tag(&'static str);

	impl Stage for Tag {
		fn on_request(&self, _: &Crawler, r: Request) -> Action<Request> {
			let trail = r.meta.get("trail").and_then(|v| v.as_str()).unwrap_or("").to_string();
			Action::Accept(r.with_meta("trail", format!("{}{}", trail, self.0)))
		}
	}

	struct Explode;

	impl Stage for Explode {
		fn on_request(&self, _: &Crawler, _: Request) -> Action<Request> {
			panic!("stage blew up")
		}
	}

	fn request() -> Request {
		Request::get("https://example.com/").unwrap()
	}

	fn response() -> Response {
		Response::new(Arc::new(request()), http::StatusCode::OK, http::HeaderMap::new(), Bytes::from_static(b"body"))
	}

	#[tokio::test]
	async fn empty_pipeline_is_pass_through() {
		let c = crawler();
		let p = Pipeline::default();

		let r = p.on_request(&c, request().with_meta("k", "v")).into_option().unwrap();
		assert_eq!(r.url.as_str(), "https://example.com/");
		assert_eq!(r.meta.get("k"), Some(&serde_json::json!("v")));

		let resp = p.on_response(&c, response()).into_option().unwrap();
		assert_eq!(&resp.body[..], b"body");

		let item = p.on_item(&c, Item::new(7_i32)).into_option().unwrap();
		assert_eq!(item.downcast_ref::<i32>(), Some(&7));
	}

	#[tokio::test]
	async fn stages_apply_in_registration_order() {
		let c = crawler();
		let p = Pipeline::default();
		p.register(&c, Arc::new(Tag("a")));
		p.register(&c, Arc::new(Tag("b")));
		p.register(&c, Arc::new(Tag("c")));

		let r = p.on_request(&c, request()).into_option().unwrap();
		assert_eq!(r.meta.get("trail"), Some(&serde_json::json!("abc")));
	}

	#[tokio::test]
	async fn drop_short_circuits_later_stages() {
		let c = crawler();
		let p = Pipeline::default();
		let before = Arc::new(Counter::default());
		let after = Arc::new(Counter::default());
		p.register(&c, Arc::new(Arc::clone(&before)));
		p.register(&c, Arc::new(DropAll));
		p.register(&c, Arc::new(Arc::clone(&after)));

		assert!(p.on_request(&c, request()).is_drop());
		assert!(p.on_response(&c, response()).is_drop());
		assert!(p.on_item(&c, Item::new(())).is_drop());

		assert_eq!(before.requests.load(Ordering::SeqCst), 1);
		assert_eq!(before.responses.load(Ordering::SeqCst), 1);
		assert_eq!(before.items.load(Ordering::SeqCst), 1);
		assert_eq!(after.requests.load(Ordering::SeqCst), 0);
		assert_eq!(after.responses.load(Ordering::SeqCst), 0);
		assert_eq!(after.items.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn errors_reach_every_stage() {
		let c = crawler();
		let p = Pipeline::default();
		let first = Arc::new(Counter::default());
		let second = Arc::new(Counter::default());
		p.register(&c, Arc::new(Arc::clone(&first)));
		p.register(&c, Arc::new(DropAll));
		p.register(&c, Arc::new(Arc::clone(&second)));

		let err = CrawlError::Download { request: Arc::new(request()), source: Error::LoadTimeout };
		p.on_error(&c, &err);
		assert_eq!(first.errors.load(Ordering::SeqCst), 1);
		assert_eq!(second.errors.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn panicking_stage_drops_and_reports() {
		let c = crawler();
		let p = Pipeline::default();
		let counter = Arc::new(Counter::default());
		p.register(&c, Arc::new(Arc::clone(&counter)));
		p.register(&c, Arc::new(Explode));

		assert!(p.on_request(&c, request()).is_drop());
		assert_eq!(counter.errors.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn default_stage_name_is_short_type_name() {
		assert_eq!(DropAll.name(), "DropAll");
		assert_eq!(short_type_name("a::b::Foo<c::d::Bar>"), "Foo");
		assert_eq!(short_type_name("Plain"), "Plain");
	}
}
