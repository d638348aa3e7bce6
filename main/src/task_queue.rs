#[allow(unused_imports)]
use crate::_prelude::*;
use crate::types::Request;

/// The frontier: requests waiting for dispatch.
///
/// Many producers may `push`/`push_front` concurrently (handlers running in workers
/// submit follow-up requests), the dispatcher is the single consumer.
#[derive(Default)]
pub struct TaskQueue {
	tasks: Mutex<VecDeque<Request>>,
}

impl TaskQueue {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends to the tail, breadth-first order.
	pub fn push(&self, req: Request) {
		self.lock().push_back(req);
	}

	/// Prepends to the head, depth-first order.
	pub fn push_front(&self, req: Request) {
		self.lock().push_front(req);
	}

	/// Never blocks, `None` when empty.
	pub fn pop(&self) -> Option<Request> {
		self.lock().pop_front()
	}

	pub fn is_empty(&self) -> bool {
		self.lock().is_empty()
	}

	pub fn len(&self) -> usize {
		self.lock().len()
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Request>> {
		// a poisoned queue still holds consistent VecDeque state
		self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn req(path: &str) -> Request {
		Request::get(&format!("https://example.com/{}", path)).unwrap()
	}

	fn path(r: Option<Request>) -> String {
		r.unwrap().url.path().trim_start_matches('/').to_string()
	}

	#[test]
	fn push_is_fifo() {
		let q = TaskQueue::new();
		q.push(req("a"));
		q.push(req("b"));
		q.push(req("c"));
		assert_eq!(q.len(), 3);
		assert_eq!(path(q.pop()), "a");
		assert_eq!(path(q.pop()), "b");
		assert_eq!(path(q.pop()), "c");
		assert!(q.is_empty());
	}

	#[test]
	fn push_front_jumps_the_queue() {
		let q = TaskQueue::new();
		q.push(req("a"));
		q.push(req("b"));
		q.push_front(req("c"));
		assert_eq!(path(q.pop()), "c");
		assert_eq!(path(q.pop()), "a");
	}

	#[test]
	fn pop_on_empty_returns_none() {
		let q = TaskQueue::new();
		assert!(q.is_empty());
		assert!(q.pop().is_none());
	}

	#[test]
	fn concurrent_producers_lose_nothing() {
		let q = Arc::new(TaskQueue::new());
		let handles: Vec<_> = (0..8)
			.map(|t| {
				let q = Arc::clone(&q);
				std::thread::spawn(move || {
					for i in 0..250 {
						if i % 2 == 0 {
							q.push(req(&format!("{}/{}", t, i)));
						} else {
							q.push_front(req(&format!("{}/{}", t, i)));
						}
					}
				})
			})
			.collect();
		for h in handles {
			h.join().unwrap();
		}

		assert_eq!(q.len(), 8 * 250);
		let mut seen = HashSet::new();
		while let Some(r) = q.pop() {
			assert!(seen.insert(r.url.to_string()));
		}
		assert_eq!(seen.len(), 8 * 250);
	}
}
