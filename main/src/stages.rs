//! Small reusable stages built on the pipeline hooks.

#[allow(unused_imports)]
use crate::_prelude::*;
use crate::{
	pipeline::{Action, Stage},
	types::{Request, Response},
	Crawler,
};

/// Drops requests whose host is not one of the allowed domains.
pub struct AllowedDomains {
	domains:      HashSet<String>,
	strip_prefix: &'static str,
}

impl AllowedDomains {
	/// With `www_allow` set, `www.example.com` and `example.com` are treated as the same domain.
	pub fn new<I: IntoIterator<Item = S>, S: AsRef<str>>(domains: I, www_allow: bool) -> Self {
		let strip_prefix = if www_allow { "www." } else { "" };
		let domains = domains
			.into_iter()
			.map(|d| {
				let d = d.as_ref().to_ascii_lowercase();
				String::from(d.strip_prefix(strip_prefix).unwrap_or(&d))
			})
			.collect();
		Self { domains, strip_prefix }
	}

	fn is_allowed(&self, url: &Url) -> bool {
		let domain = url.host_str().unwrap_or("_").to_ascii_lowercase();
		self.domains.contains(domain.strip_prefix(self.strip_prefix).unwrap_or(&domain))
	}
}

impl Stage for AllowedDomains {
	fn on_request(&self, _: &Crawler, request: Request) -> Action<Request> {
		if self.is_allowed(&request.url) {
			return Action::Accept(request)
		}
		debug!(action = "skip", stage = self.name(), url = %request.url);
		Action::Drop
	}
}

/// Drops requests already seen, keyed by method and url.
#[derive(Default)]
pub struct HashSetDedup {
	visited: Mutex<HashSet<String>>,
}

impl HashSetDedup {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.visited.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl Stage for HashSetDedup {
	fn on_request(&self, _: &Crawler, request: Request) -> Action<Request> {
		let key = format!("{} {}", request.method, request.url);
		let mut visited = self.visited.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
		if !visited.insert(key) {
			trace!(action = "skip", stage = self.name(), request = %request);
			return Action::Drop
		}
		Action::Accept(request)
	}
}

/// Accepts at most `allocated_budget` requests over the lifetime of the stage.
pub struct TotalBudget {
	allocated_budget: usize,
	budget:           AtomicUsize,
}

impl TotalBudget {
	pub fn new(allocated_budget: usize) -> Self {
		Self { allocated_budget, budget: AtomicUsize::new(0) }
	}

	pub fn used(&self) -> usize {
		self.budget.load(Ordering::SeqCst).min(self.allocated_budget)
	}
}

impl Stage for TotalBudget {
	fn on_request(&self, _: &Crawler, request: Request) -> Action<Request> {
		if self.budget.fetch_add(1, Ordering::SeqCst) >= self.allocated_budget {
			debug!(action = "term", stage = self.name(), budget = self.allocated_budget, request = %request);
			return Action::Drop
		}
		Action::Accept(request)
	}
}

/// Drops responses whose `Content-Type` matches none of the accepted values.
pub struct ContentType {
	accepted: Vec<String>,
}

impl ContentType {
	pub fn new<I: IntoIterator<Item = S>, S: Into<String>>(accepted: I) -> Self {
		Self { accepted: accepted.into_iter().map(Into::into).collect() }
	}
}

impl Stage for ContentType {
	fn on_response(&self, _: &Crawler, response: Response) -> Action<Response> {
		let content_type = match response.header_str(http::header::CONTENT_TYPE) {
			Ok(v) => v.to_ascii_lowercase(),
			Err(err) => {
				debug!(action = "drop", stage = self.name(), url = %response.url(), "{:#}", err);
				return Action::Drop
			}
		};

		if self.accepted.iter().any(|accepted| content_type.contains(accepted.as_str())) {
			return Action::Accept(response)
		}
		debug!(action = "drop", stage = self.name(), url = %response.url(), content_type = %content_type);
		Action::Drop
	}
}
