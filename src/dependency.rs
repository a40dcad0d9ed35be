use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::addr::SubscriberAddr;
use crate::{Result, Subscriber};

/// Subscribers interested in a single reactive property.
///
/// Registration is idempotent. Subscribers are held weakly: a subscriber that
/// was dropped is skipped and pruned on the next notification.
#[derive(Default)]
pub struct Dependency {
	subscribers: RefCell<BTreeSet<SubscriberAddr>>,
}

impl Dependency {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&self, subscriber: Weak<dyn Subscriber>) {
		self.subscribers
			.borrow_mut()
			.insert(SubscriberAddr::new(subscriber));
	}

	pub fn unregister(&self, subscriber: &Weak<dyn Subscriber>) {
		self.subscribers
			.borrow_mut()
			.remove(&SubscriberAddr::new(subscriber.clone()));
	}

	pub fn contains(&self, subscriber: &Weak<dyn Subscriber>) -> bool {
		self.subscribers
			.borrow()
			.contains(&SubscriberAddr::new(subscriber.clone()))
	}

	pub fn len(&self) -> usize {
		self.subscribers.borrow().len()
	}

	pub fn is_empty(&self) -> bool {
		self.subscribers.borrow().is_empty()
	}

	/// Re-evaluates every live subscriber.
	///
	/// Iterates over a snapshot taken up front: subscribers registered during
	/// the pass wait for the next write, subscribers removed during the pass
	/// are still updated once. A failing subscriber does not stop the others;
	/// the first error is returned after everyone has run.
	pub fn notify_all(&self) -> Result<()> {
		let snapshot: SmallVec<[Rc<dyn Subscriber>; 4]> = {
			let mut subscribers = self.subscribers.borrow_mut();
			subscribers.retain(SubscriberAddr::is_alive);
			subscribers.iter().filter_map(|s| s.upgrade()).collect()
		};

		tracing::trace!(subscribers = snapshot.len(), "notify");

		let mut first_error = None;
		for subscriber in snapshot {
			if let Err(error) = subscriber.update() {
				tracing::warn!(%error, "subscriber failed to update");
				first_error.get_or_insert(error);
			}
		}

		match first_error {
			Some(error) => Err(error),
			None => Ok(()),
		}
	}
}

impl std::fmt::Debug for Dependency {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Dependency")
			.field("subscribers", &self.len())
			.finish()
	}
}
