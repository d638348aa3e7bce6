#[allow(unused_imports)]
use crate::_prelude::*;
use crate::{types::Request, Crawler};

/// A popped request on its way to a worker. Exactly one side takes it: the worker that
/// received the hand-off, or the dispatcher putting it back when the hand-off was abandoned.
#[derive(Clone)]
pub(crate) struct Handoff(Arc<Mutex<Option<Request>>>);

impl Handoff {
	fn new(req: Request) -> Self {
		Handoff(Arc::new(Mutex::new(Some(req))))
	}

	pub(crate) fn take(&self) -> Option<Request> {
		self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).take()
	}
}

// returns the request to the head of the queue unless the hand-off completed
struct Reclaim<'a> {
	crawler: &'a Crawler,
	handoff: Option<Handoff>,
}

impl<'a> Reclaim<'a> {
	fn disarm(mut self) {
		self.handoff = None;
	}
}

impl<'a> Drop for Reclaim<'a> {
	fn drop(&mut self) {
		if let Some(req) = self.handoff.take().and_then(|h| h.take()) {
			debug!(action = "requeue", request = %req, "hand-off abandoned");
			// still counted as outstanding, it never left the frontier
			self.crawler.queue().push_front(req);
			self.crawler.state().notify();
		}
	}
}

/// The dispatcher: the only consumer of the task queue.
pub(crate) struct TaskScheduler {
	crawler:  Crawler,
	tasks_tx: Sender<Handoff>,
}

impl TaskScheduler {
	// rendezvous channel, a send completes only when some idle worker takes the request
	pub(crate) fn new(crawler: Crawler) -> (TaskScheduler, Receiver<Handoff>) {
		let (tasks_tx, tasks_rx) = bounded_ch::<Handoff>(0);
		(TaskScheduler { crawler, tasks_tx }, tasks_rx)
	}

	async fn dispatch(&self, req: Request) -> Result<()> {
		trace!(request = %req, "dispatching");
		let handoff = Handoff::new(req);
		let reclaim = Reclaim { crawler: &self.crawler, handoff: Some(handoff.clone()) };

		if self.tasks_tx.send_async(handoff).await.is_err() {
			return Err(anyhow!("cannot hand off request, all workers are gone").into())
		}
		reclaim.disarm();

		if let Some(delay) = self.crawler.settings().sample_delay() {
			trace!(delay_ms = delay.as_millis() as u64, "politeness delay");
			time::sleep(delay).await;
		}
		Ok(())
	}

	pub(crate) fn go<'a>(self) -> TaskFut<'a> {
		TracingTask::new(span!(), async move {
			trace!(settings = %self.crawler.settings(), "Starting...");

			loop {
				if let Some(req) = self.crawler.queue().pop() {
					self.dispatch(req).await?;
					continue
				}

				let state = self.crawler.state();
				if state.is_idle() {
					break
				}
				state.changed().await;
			}

			trace!("Finishing..., queue is exhausted");
			// dropping tasks_tx here lets the workers drain out
			Ok(())
		})
		.instrument()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{config::CrawlingSettings, types::Response};

	async fn offline(_req: Arc<Request>) -> Result<Response> {
		Err(anyhow!("offline").into())
	}

	#[tokio::test]
	async fn abandoned_handoff_goes_back_to_the_head() {
		let c = Crawler::new(CrawlingSettings::default(), offline).unwrap();
		c.submit(Request::get("https://example.com/a").unwrap());
		c.submit(Request::get("https://example.com/b").unwrap());

		let (scheduler, rx) = TaskScheduler::new(c.clone());
		let req = c.queue().pop().unwrap();
		// nobody receives, the hand-off never completes
		let r = time::timeout(Duration::from_millis(20), scheduler.dispatch(req)).await;
		assert!(r.is_err());
		drop(rx);

		assert_eq!(c.queue().len(), 2);
		assert_eq!(c.queue().pop().unwrap().url.path(), "/a");
		assert_eq!(c.pending(), 2);
		assert_eq!(c.in_flight(), 0);
	}

	#[test]
	fn handoff_has_a_single_owner() {
		let h = Handoff::new(Request::get("https://example.com/").unwrap());
		let other = h.clone();
		assert!(h.take().is_some());
		assert!(other.take().is_none());
	}
}
