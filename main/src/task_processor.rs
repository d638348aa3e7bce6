use std::panic::AssertUnwindSafe;

#[allow(unused_imports)]
use crate::_prelude::*;
use crate::{
	pipeline::Action,
	state::Counters,
	task_scheduler::Handoff,
	types::{CrawlError, Handler, HookKind, Request, Response},
	Crawler,
};

/// One worker of the fixed pool. Runs each received request to completion before taking the next one.
pub(crate) struct TaskProcessor {
	crawler:  Crawler,
	tasks_rx: Receiver<Handoff>,
}

impl TaskProcessor {
	pub(crate) fn new(crawler: Crawler, tasks_rx: Receiver<Handoff>) -> TaskProcessor {
		TaskProcessor { crawler, tasks_rx }
	}

	async fn download(&self, req: Arc<Request>) -> Result<Response> {
		// own task, so a panicking transport surfaces as a JoinError
		let fut = self.crawler.transport().fetch(Arc::clone(&req));
		match tokio::spawn(fut).await {
			Ok(r) => r,
			Err(err) if err.is_panic() => {
				let err = CrawlError::panic(HookKind::Transport, "transport", err.into_panic());
				Err(anyhow!("{}", err).into())
			}
			Err(err) => Err(anyhow!("transport task failed: {}", err).into()),
		}
	}

	fn invoke(&self, handlers: &[Handler], resp: &Response) {
		let stats = &self.crawler.state().stats;
		for (i, handler) in handlers.iter().enumerate() {
			let r = panic::catch_unwind(AssertUnwindSafe(|| handler(&self.crawler, resp)));
			Counters::inc(&stats.handlers_invoked);

			if let Err(payload) = r {
				let err = CrawlError::panic(HookKind::Handler, "handler", payload);
				warn!(url = %resp.url(), handler = i, "{}", err);
				self.crawler.pipeline().on_error(&self.crawler, &err);
			}
		}
	}

	async fn process(&self, mut req: Request) {
		let handlers = req.take_handlers();
		let req = Arc::new(req);
		let stats = &self.crawler.state().stats;

		let resp = match self.download(Arc::clone(&req)).await {
			Ok(resp) => resp,
			Err(source) => {
				Counters::inc(&stats.downloads_failed);
				warn!(request = %req, "download failed: {:#}", source);
				let err = CrawlError::Download { request: req, source };
				self.crawler.pipeline().on_error(&self.crawler, &err);
				return
			}
		};
		debug!(response = %resp, "downloaded");

		match self.crawler.pipeline().on_response(&self.crawler, resp) {
			Action::Accept(resp) => self.invoke(&handlers, &resp),
			Action::Drop => Counters::inc(&stats.responses_dropped),
		}
	}

	pub(crate) fn go<'a>(self, n: usize) -> TaskFut<'a> {
		TracingTask::new(span!(n = n), async move {
			while let Ok(handoff) = self.tasks_rx.recv_async().await {
				// the dispatcher already took it back
				let req = match handoff.take() {
					Some(req) => req,
					None => continue,
				};
				self.crawler.state().dispatched();
				self.process(req).await;
				self.crawler.state().processed();
			}

			trace!("task channel closed, worker exits");
			Ok(())
		})
		.instrument()
	}
}
