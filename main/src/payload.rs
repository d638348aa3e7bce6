use serde::Serialize;

#[allow(unused_imports)]
use crate::_prelude::*;

pub const TEXT_PLAIN: &str = "text/plain";
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
pub const APPLICATION_JSON: &str = "application/json";

/// Body of a POST request, one variant per supported encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
	Text(String),
	Form(BTreeMap<String, String>),
	Json(serde_json::Value),
}

impl Payload {
	pub fn text(s: impl Into<String>) -> Self {
		Payload::Text(s.into())
	}

	pub fn form<K: Into<String>, V: Into<String>, I: IntoIterator<Item = (K, V)>>(pairs: I) -> Self {
		Payload::Form(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
	}

	pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
		serde_json::to_value(value).map(Payload::Json).map_err(|source| Error::Payload { kind: "json", source })
	}

	pub fn content_type(&self) -> &'static str {
		match self {
			Payload::Text(_) => TEXT_PLAIN,
			Payload::Form(_) => FORM_URLENCODED,
			Payload::Json(_) => APPLICATION_JSON,
		}
	}

	// form keys come out sorted
	pub fn encode(&self) -> Result<(Bytes, &'static str)> {
		let body = match self {
			Payload::Text(s) => Bytes::from(s.clone()),
			Payload::Form(pairs) => {
				let mut serializer = url::form_urlencoded::Serializer::new(String::new());
				for (k, v) in pairs {
					serializer.append_pair(k, v);
				}
				Bytes::from(serializer.finish())
			}
			Payload::Json(v) => {
				Bytes::from(serde_json::to_vec(v).map_err(|source| Error::Payload { kind: "json", source })?)
			}
		};
		Ok((body, self.content_type()))
	}
}
