use serde::{de, Deserialize, Deserializer};

#[allow(unused_imports)]
use crate::_prelude::*;

pub const DEFAULT_CONCURRENCY: usize = 15;
pub const DEFAULT_USER_AGENT: &str = "ribot";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CBytes(pub usize);

impl Deref for CBytes {
	type Target = usize;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl<'de> Deserialize<'de> for CBytes {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<CBytes, D::Error> {
		let s: String = Deserialize::deserialize(deserializer)?;
		let s = s.replace('_', "");
		let v = s.parse::<humanize_rs::bytes::Bytes>();
		let r = v.map_err(de::Error::custom)?;
		Ok(CBytes(r.size()))
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CDuration(Duration);

impl Deref for CDuration {
	type Target = Duration;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl CDuration {
	pub fn from_secs(secs: u64) -> Self {
		CDuration(Duration::from_secs(secs))
	}

	pub fn from_millis(millis: u64) -> Self {
		CDuration(Duration::from_millis(millis))
	}
}

impl From<Duration> for CDuration {
	fn from(d: Duration) -> Self {
		CDuration(d)
	}
}

impl<'de> Deserialize<'de> for CDuration {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<CDuration, D::Error> {
		let s: String = Deserialize::deserialize(deserializer)?;
		let s = s.replace('_', "");
		let v = humanize_rs::duration::parse(&s);
		let r = v.map_err(de::Error::custom)?;
		Ok(CDuration(r))
	}
}

/// Settings of the default hyper transport.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
#[serde(deny_unknown_fields)]
pub struct NetworkingProfile {
	pub connect_timeout:           Option<CDuration>,
	pub status_timeout:            CDuration,
	pub load_timeout:              CDuration,
	pub max_response_size:         CBytes,
	pub internal_read_buffer_size: CBytes,
	pub compression:               bool,
	pub custom_headers:            HashMap<String, Vec<String>>,
}

impl Default for NetworkingProfile {
	fn default() -> Self {
		Self {
			connect_timeout:           Some(CDuration::from_secs(5)),
			status_timeout:            CDuration::from_secs(10),
			load_timeout:              CDuration::from_secs(20),
			max_response_size:         CBytes(1024 * 1024 * 16),
			internal_read_buffer_size: CBytes(32 * 1024),
			compression:               true,
			custom_headers:            HashMap::new(),
		}
	}
}

impl NetworkingProfile {
	/// Headers every request made by the transport carries, unless the request sets them itself.
	pub fn default_headers(&self) -> Result<http::HeaderMap> {
		let mut headers = http::HeaderMap::new();
		if self.compression {
			headers.insert(http::header::ACCEPT_ENCODING, http::HeaderValue::from_static("gzip, deflate"));
		}
		for (n, vs) in &self.custom_headers {
			let name = http::header::HeaderName::from_str(n).map_err(|_| Error::Header { name: n.clone() })?;
			for v in vs {
				let value = http::HeaderValue::from_str(v).map_err(|_| Error::Header { name: n.clone() })?;
				headers.append(name.clone(), value);
			}
		}
		Ok(headers)
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
#[serde(deny_unknown_fields)]
pub struct CrawlingSettings {
	pub concurrency: usize,
	pub depth_first: bool,
	pub delay_min:   CDuration,
	pub delay_max:   CDuration,
	pub user_agent:  String,
	pub networking:  NetworkingProfile,
}

impl fmt::Display for CrawlingSettings {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"concurrency: {}, depth first: {}, delay: {:?}..{:?}, user agent: {:?}, status timeout: {:?}, load timeout: {:?}, max_response_size: {:?}",
			self.concurrency, self.depth_first, *self.delay_min, *self.delay_max, self.user_agent, *self.networking.status_timeout, *self.networking.load_timeout, *self.networking.max_response_size,
		)
	}
}

impl Default for CrawlingSettings {
	fn default() -> Self {
		Self {
			concurrency: DEFAULT_CONCURRENCY,
			depth_first: false,
			delay_min:   CDuration::from_millis(0),
			delay_max:   CDuration::from_millis(0),
			user_agent:  String::from(DEFAULT_USER_AGENT),
			networking:  NetworkingProfile::default(),
		}
	}
}

impl CrawlingSettings {
	pub fn with_concurrency(mut self, concurrency: usize) -> Self {
		self.concurrency = concurrency;
		self
	}

	pub fn with_depth_first(mut self, depth_first: bool) -> Self {
		self.depth_first = depth_first;
		self
	}

	pub fn with_delay(mut self, min: Duration, max: Duration) -> Self {
		self.delay_min = min.into();
		self.delay_max = max.into();
		self
	}

	pub fn with_user_agent(mut self, user_agent: &str) -> Self {
		self.user_agent = String::from(user_agent);
		self
	}

	// zero falls back to the default pool size
	pub fn effective_concurrency(&self) -> usize {
		if self.concurrency == 0 {
			return DEFAULT_CONCURRENCY
		}
		self.concurrency
	}

	/// `None` when the range is degenerate (`min >= max` or `max == 0`).
	pub fn delay_range(&self) -> Option<(Duration, Duration)> {
		let (min, max) = (*self.delay_min, *self.delay_max);
		if min >= max || max.is_zero() {
			return None
		}
		Some((min, max))
	}

	pub fn sample_delay(&self) -> Option<Duration> {
		let (min, max) = self.delay_range()?;
		let nanos = thread_rng().gen_range(min.as_nanos() as u64..max.as_nanos() as u64);
		Some(Duration::from_nanos(nanos))
	}
}
