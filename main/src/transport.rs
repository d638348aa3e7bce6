//! The fetch collaborator: turns a `Request` into a `Response`.

use bytes::{Buf, BufMut, BytesMut};
use flate2::read::{GzDecoder, ZlibDecoder};
use hyper::body::HttpBody;
use io::Read;

#[allow(unused_imports)]
use crate::_prelude::*;
use crate::{
	config,
	types::{Request, Response},
};

pub trait Transport: Send + Sync + 'static {
	fn fetch(&self, request: Arc<Request>) -> PinnedFut<Result<Response>>;
}

impl<F, Fut> Transport for F
where
	F: Fn(Arc<Request>) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<Response>> + Send + 'static,
{
	fn fetch(&self, request: Arc<Request>) -> PinnedFut<Result<Response>> {
		Box::pin(self(request))
	}
}

pub(crate) type HttpClient = hyper::Client<HttpConnector>;
pub(crate) type HttpConnector = hyper_tls::HttpsConnector<hyper::client::HttpConnector>;

/// Default transport over a hyper client with TLS.
#[derive(Clone)]
pub struct HyperTransport {
	client:          HttpClient,
	profile:         Arc<config::NetworkingProfile>,
	default_headers: Arc<http::HeaderMap>,
}

impl HyperTransport {
	pub fn new(profile: config::NetworkingProfile) -> Result<Self> {
		let default_headers = profile.default_headers()?;

		let mut http = hyper::client::HttpConnector::new();
		http.set_connect_timeout(profile.connect_timeout.as_ref().map(|v| **v));
		http.enforce_http(false);
		let https = hyper_tls::HttpsConnector::new_with_connector(http);
		let client = hyper::Client::builder().build::<_, hyper::Body>(https);

		Ok(Self { client, profile: Arc::new(profile), default_headers: Arc::new(default_headers) })
	}

	async fn status(&self, request: &Request) -> Result<hyper::Response<hyper::Body>> {
		let uri = hyper::Uri::from_str(request.url.as_str())
			.with_context(|| format!("cannot create http uri {}", &request.url))?;

		let mut req = hyper::Request::builder().uri(uri).method(request.method.clone());
		for (n, v) in self.default_headers.iter() {
			if !request.headers.contains_key(n) {
				req = req.header(n, v);
			}
		}
		for (n, v) in request.headers.iter() {
			req = req.header(n, v);
		}

		let req_fut = self
			.client
			.request(req.body(hyper::Body::from(request.body.clone())).context("could not construct http request")?);
		let resp = timeout(*self.profile.status_timeout, req_fut).await.map_err(|_| Error::StatusTimeout)?;
		Ok(resp.context("cannot make http request")?)
	}

	async fn read(&self, body: &mut hyper::Body) -> Result<Bytes> {
		let max_response_size = *self.profile.max_response_size;
		let mut bytes = BytesMut::with_capacity(*self.profile.internal_read_buffer_size);

		while let Some(buf) = body.data().await {
			let buf = buf.context("error during reading")?;
			if buf.has_remaining() {
				if bytes.len() + buf.len() > max_response_size {
					return Err(Error::MaxResponseSize(max_response_size))
				}
				bytes.put(buf);
			}
		}

		Ok(bytes.freeze())
	}

	async fn load(&self, request: Arc<Request>) -> Result<Response> {
		let t = Instant::now();
		let mut resp = self.status(&request).await?;

		let body = timeout(*self.profile.load_timeout, self.read(resp.body_mut())).await.map_err(|_| Error::LoadTimeout)??;

		let encoding = resp.headers().get(http::header::CONTENT_ENCODING).and_then(|h| h.to_str().ok()).unwrap_or("");
		let body = decode(encoding, body)?;

		trace!(url = %request.url, status = resp.status().as_u16(), elapsed_ms = t.elapsed().as_millis() as u64, "loaded");
		let (parts, _) = resp.into_parts();
		Ok(Response::new(request, parts.status, parts.headers, body))
	}
}

impl Transport for HyperTransport {
	fn fetch(&self, request: Arc<Request>) -> PinnedFut<Result<Response>> {
		let transport = self.clone();
		Box::pin(async move { transport.load(request).await })
	}
}

pub(crate) fn decode(encoding: &str, body: Bytes) -> Result<Bytes> {
	let encoding = encoding.to_ascii_lowercase();
	let mut buf: Vec<u8> = vec![];
	if encoding.contains("gzip") {
		let _ = GzDecoder::new(body.reader()).read_to_end(&mut buf).context("cannot decode gzip body")?;
		return Ok(Bytes::from(buf))
	}
	if encoding.contains("deflate") {
		let _ = ZlibDecoder::new(body.reader()).read_to_end(&mut buf).context("cannot decode deflate body")?;
		return Ok(Bytes::from(buf))
	}
	Ok(body)
}
