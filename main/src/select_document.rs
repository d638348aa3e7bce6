use select::{document::Document, predicate::Name};

#[allow(unused_imports)]
use crate::_prelude::*;
use crate::types::Response;

impl Response {
	/// Parses the body as HTML.
	pub fn document(&self) -> Document {
		Document::from(&*self.text())
	}

	/// Absolute http(s) targets of every `<a href>`, resolved against the request url, without fragments.
	pub fn links(&self) -> Vec<Url> {
		let document = self.document();
		document.find(Name("a")).filter_map(|n| n.attr("href")).filter_map(|href| self.join(href)).collect()
	}

	fn join(&self, href: &str) -> Option<Url> {
		let href = href.trim();
		if href.is_empty() || href.starts_with('#') {
			return None
		}

		let mut url = self.url().join(href).ok()?;
		if url.scheme() != "http" && url.scheme() != "https" {
			return None
		}
		url.set_fragment(None);
		Some(url)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::Request;

	const PAGE: &str = r##"<html><head><title>Index</title></head><body>
		<a href="/about#team">About</a>
		<a href="contact.html">Contact</a>
		<a href="https://other.org/x">Other</a>
		<a href="#top">Top</a>
		<a href="mailto:me@example.com">Mail</a>
		<a>No href</a>
	</body></html>"##;

	#[test]
	fn extracts_absolute_links() {
		let req = Arc::new(Request::get("https://example.com/docs/index.html").unwrap());
		let resp = Response::new(req, http::StatusCode::OK, http::HeaderMap::new(), Bytes::from_static(PAGE.as_bytes()));

		let links: Vec<String> = resp.links().iter().map(|u| u.to_string()).collect();
		assert_eq!(links, vec![
			"https://example.com/about",
			"https://example.com/docs/contact.html",
			"https://other.org/x"
		]);

		let title = resp.document().find(Name("title")).next().map(|n| n.text());
		assert_eq!(title.as_deref(), Some("Index"));
	}
}
