pub use std::{
	collections::{BTreeMap, HashMap, HashSet, VecDeque},
	fmt,
	fmt::Debug,
	future::Future,
	io, mem,
	ops::Deref,
	panic,
	pin::Pin,
	str::FromStr,
	sync::{
		atomic::{AtomicBool, AtomicUsize, Ordering},
		Arc, Mutex, RwLock,
	},
};

pub use anyhow::{anyhow, Context as _};
pub use bytes::Bytes;
pub use derivative::Derivative;
pub use flume::{bounded as bounded_ch, unbounded as unbounded_ch, Receiver, RecvError, Sender};
pub use rand::{thread_rng, Rng};
pub use strum::IntoStaticStr;
pub use tokio::time::{self, timeout, Duration, Instant};
pub use tracing::{debug, error, event, info, trace, warn, Level};
pub use tracing_tools::{span, TaskFut, TracingTask};
pub use url::Url;

pub type PinnedFut<T> = Pin<Box<dyn Future<Output = T> + Send>>;

pub use crate::types::{Error, Result};
