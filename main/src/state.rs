//! Shared crawl state: termination accounting and statistics.
//!
//! `outstanding` counts every request that has been enqueued and not yet fully
//! processed (queued + in flight). It is raised before a request enters the queue and
//! lowered only after every handler of that request returned, so a zero value means the
//! queue is empty and no worker can still add work.

use tokio::sync::Notify;

#[allow(unused_imports)]
use crate::_prelude::*;

#[derive(Debug, Default)]
pub(crate) struct CrawlState {
	outstanding: AtomicUsize,
	in_flight:   AtomicUsize,
	wake:        Notify,
	pub(crate) stats: Counters,
}

impl CrawlState {
	pub(crate) fn enqueued(&self) {
		self.outstanding.fetch_add(1, Ordering::SeqCst);
	}

	// the request was pushed to the queue
	pub(crate) fn notify(&self) {
		self.wake.notify_one();
	}

	pub(crate) fn dispatched(&self) {
		self.in_flight.fetch_add(1, Ordering::SeqCst);
		self.stats.requests_dispatched.fetch_add(1, Ordering::SeqCst);
	}

	pub(crate) fn processed(&self) {
		self.in_flight.fetch_sub(1, Ordering::SeqCst);
		self.completed();
	}

	fn completed(&self) {
		self.outstanding.fetch_sub(1, Ordering::SeqCst);
		self.wake.notify_one();
	}

	pub(crate) fn is_idle(&self) -> bool {
		self.outstanding.load(Ordering::SeqCst) == 0
	}

	pub(crate) async fn changed(&self) {
		self.wake.notified().await
	}

	pub(crate) fn in_flight(&self) -> usize {
		self.in_flight.load(Ordering::SeqCst)
	}

	pub(crate) fn outstanding(&self) -> usize {
		self.outstanding.load(Ordering::SeqCst)
	}
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
	pub(crate) requests_submitted:  AtomicUsize,
	pub(crate) requests_dropped:    AtomicUsize,
	pub(crate) requests_dispatched: AtomicUsize,
	pub(crate) downloads_failed:    AtomicUsize,
	pub(crate) responses_dropped:   AtomicUsize,
	pub(crate) handlers_invoked:    AtomicUsize,
	pub(crate) items_accepted:      AtomicUsize,
	pub(crate) items_dropped:       AtomicUsize,
}

impl Counters {
	pub(crate) fn inc(counter: &AtomicUsize) {
		counter.fetch_add(1, Ordering::SeqCst);
	}

	pub(crate) fn snapshot(&self) -> CrawlStats {
		CrawlStats {
			requests_submitted:  self.requests_submitted.load(Ordering::SeqCst),
			requests_dropped:    self.requests_dropped.load(Ordering::SeqCst),
			requests_dispatched: self.requests_dispatched.load(Ordering::SeqCst),
			downloads_failed:    self.downloads_failed.load(Ordering::SeqCst),
			responses_dropped:   self.responses_dropped.load(Ordering::SeqCst),
			handlers_invoked:    self.handlers_invoked.load(Ordering::SeqCst),
			items_accepted:      self.items_accepted.load(Ordering::SeqCst),
			items_dropped:       self.items_dropped.load(Ordering::SeqCst),
		}
	}
}

/// Point-in-time copy of the crawl counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlStats {
	pub requests_submitted:  usize,
	pub requests_dropped:    usize,
	pub requests_dispatched: usize,
	pub downloads_failed:    usize,
	pub responses_dropped:   usize,
	pub handlers_invoked:    usize,
	pub items_accepted:      usize,
	pub items_dropped:       usize,
}

impl fmt::Display for CrawlStats {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"requests: submitted {}, dropped {}, dispatched {}, failed {} | responses dropped {} | handlers {} | items: ok {}, dropped {}",
			self.requests_submitted,
			self.requests_dropped,
			self.requests_dispatched,
			self.downloads_failed,
			self.responses_dropped,
			self.handlers_invoked,
			self.items_accepted,
			self.items_dropped
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn idle_only_after_every_enqueued_request_is_processed() {
		let s = CrawlState::default();
		assert!(s.is_idle());

		s.enqueued();
		s.enqueued();
		assert!(!s.is_idle());
		assert_eq!(s.outstanding(), 2);

		s.dispatched();
		assert_eq!(s.in_flight(), 1);
		s.processed();
		assert_eq!(s.in_flight(), 0);
		assert!(!s.is_idle());

		s.dispatched();
		s.processed();
		assert!(s.is_idle());
		assert_eq!(s.stats.snapshot().requests_dispatched, 2);
	}

	#[tokio::test]
	async fn completion_wakes_a_waiter() {
		let s = Arc::new(CrawlState::default());
		s.enqueued();
		s.dispatched();

		let waiter = {
			let s = Arc::clone(&s);
			tokio::spawn(async move {
				while !s.is_idle() {
					s.changed().await;
				}
			})
		};
		s.processed();
		time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
	}
}
