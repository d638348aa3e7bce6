#[allow(unused_imports)]
use crate::_prelude::*;
use crate::{
	config::CrawlingSettings,
	payload::Payload,
	pipeline::{Action, Pipeline, Stage},
	state::{CrawlState, CrawlStats, Counters},
	task_processor::TaskProcessor,
	task_queue::TaskQueue,
	task_scheduler::TaskScheduler,
	transport::{HyperTransport, Transport},
	types::{Item, Request, Response},
};

struct Inner {
	settings:   CrawlingSettings,
	user_agent: http::HeaderValue,
	transport:  Arc<dyn Transport>,
	queue:      TaskQueue,
	pipeline:   Pipeline,
	state:      CrawlState,
	running:    AtomicBool,
}

// clears the running flag however `run` ends, including a dropped future
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> Drop for RunningGuard<'a> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::SeqCst);
	}
}

/// The crawling engine. Cheap to clone, every clone drives the same crawl.
///
/// Handlers and stages receive a `&Crawler` and may submit follow-up requests or items
/// through it while the crawl runs.
#[derive(Clone)]
pub struct Crawler {
	inner: Arc<Inner>,
}

impl fmt::Debug for Crawler {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Crawler")
			.field("stages", &self.inner.pipeline.len())
			.field("pending", &self.pending())
			.field("in_flight", &self.in_flight())
			.finish()
	}
}

impl Crawler {
	pub fn new_default() -> Result<Crawler> {
		let settings = CrawlingSettings::default();
		let transport = HyperTransport::new(settings.networking.clone())?;
		Crawler::new(settings, transport)
	}

	/// Fails when the configured user agent is not a valid header value.
	pub fn new<T: Transport>(settings: CrawlingSettings, transport: T) -> Result<Crawler> {
		let user_agent = http::HeaderValue::from_str(&settings.user_agent)
			.map_err(|_| Error::Header { name: String::from(http::header::USER_AGENT.as_str()) })?;

		Ok(Crawler {
			inner: Arc::new(Inner {
				settings,
				user_agent,
				transport: Arc::new(transport),
				queue: TaskQueue::new(),
				pipeline: Pipeline::default(),
				state: CrawlState::default(),
				running: AtomicBool::new(false),
			}),
		})
	}

	pub fn settings(&self) -> &CrawlingSettings {
		&self.inner.settings
	}

	pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
		&self.inner.transport
	}

	pub(crate) fn queue(&self) -> &TaskQueue {
		&self.inner.queue
	}

	pub(crate) fn pipeline(&self) -> &Pipeline {
		&self.inner.pipeline
	}

	pub(crate) fn state(&self) -> &CrawlState {
		&self.inner.state
	}

	/// Appends a stage to the pipeline and calls its `init` right away.
	/// Allowed at any time, also while a crawl is running.
	pub fn use_stage<S: Stage>(&self, stage: S) -> &Self {
		self.inner.pipeline.register(self, Arc::new(stage));
		self
	}

	pub fn stages_len(&self) -> usize {
		self.inner.pipeline.len()
	}

	pub fn submit(&self, mut req: Request) {
		let stats = &self.inner.state.stats;
		Counters::inc(&stats.requests_submitted);

		if !req.headers.contains_key(http::header::USER_AGENT) {
			req.headers.insert(http::header::USER_AGENT, self.inner.user_agent.clone());
		}

		let req = match self.inner.pipeline.on_request(self, req) {
			Action::Accept(req) => req,
			Action::Drop => {
				Counters::inc(&stats.requests_dropped);
				return
			}
		};

		debug!(action = "enqueue", request = %req, depth_first = self.inner.settings.depth_first);
		// counted before it becomes visible to the dispatcher
		self.inner.state.enqueued();
		if self.inner.settings.depth_first {
			self.inner.queue.push_front(req);
		} else {
			self.inner.queue.push(req);
		}
		self.inner.state.notify();
	}

	pub fn get<F: Fn(&Crawler, &Response) + Send + Sync + 'static>(&self, url: &str, handler: F) -> Result<()> {
		self.submit(Request::get(url)?.with_handler(handler));
		Ok(())
	}

	pub fn post<F: Fn(&Crawler, &Response) + Send + Sync + 'static>(
		&self,
		url: &str,
		payload: &Payload,
		handler: F,
	) -> Result<()> {
		let (body, content_type) = payload.encode()?;
		self.submit(Request::post(url, body, content_type)?.with_handler(handler));
		Ok(())
	}

	/// Runs the item through the on-item chain, `None` when some stage dropped it.
	pub fn new_item(&self, item: Item) -> Option<Item> {
		let stats = &self.inner.state.stats;
		match self.inner.pipeline.on_item(self, item) {
			Action::Accept(item) => {
				Counters::inc(&stats.items_accepted);
				Some(item)
			}
			Action::Drop => {
				Counters::inc(&stats.items_dropped);
				None
			}
		}
	}

	/// Requests dispatched to a worker and not finished yet.
	pub fn in_flight(&self) -> usize {
		self.inner.state.in_flight()
	}

	/// Requests queued or in flight.
	pub fn pending(&self) -> usize {
		self.inner.state.outstanding()
	}

	pub fn stats(&self) -> CrawlStats {
		self.inner.state.stats.snapshot()
	}

	/// Crawls until the queue is exhausted and no request is in flight.
	///
	/// Returns immediately when nothing was submitted. A finished crawler can be run again,
	/// also after the `run` future was dropped midway: requests not yet taken by a worker
	/// stay queued.
	pub async fn run(&self) -> Result<()> {
		if self.inner.running.swap(true, Ordering::SeqCst) {
			return Err(Error::AlreadyRunning)
		}
		let _running = RunningGuard(&self.inner.running);
		Ok(self.go().await?)
	}

	fn go<'a>(&self) -> TaskFut<'a> {
		let crawler = self.clone();
		let concurrency = self.inner.settings.effective_concurrency();

		TracingTask::new(span!(concurrency = concurrency), async move {
			let (scheduler, tasks_rx) = TaskScheduler::new(crawler.clone());

			let mut processor_handles = vec![];
			for i in 0..concurrency {
				let processor = TaskProcessor::new(crawler.clone(), tasks_rx.clone());
				processor_handles.push(tokio::spawn(async move { processor.go(i).await }));
			}
			drop(tasks_rx);

			let r = scheduler.go().await;

			trace!("Waiting for workers to finish...");
			for h in processor_handles {
				h.await??;
			}
			r?;

			info!(stats = %crawler.stats(), "crawl finished");
			Ok(())
		})
		.instrument()
	}
}
