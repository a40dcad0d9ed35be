use std::cmp::Ordering;
use std::ops::Deref;
use std::rc::Weak;

use crate::Subscriber;

/// Weak subscriber handle compared by the address of its allocation.
///
/// Only the data pointer takes part in comparisons, so two handles to the
/// same subscriber are equal even when they were coerced through different
/// vtables.
#[derive(Clone)]
pub struct SubscriberAddr {
	ptr: Weak<dyn Subscriber>,
}

impl SubscriberAddr {
	pub fn new(ptr: Weak<dyn Subscriber>) -> Self {
		SubscriberAddr { ptr }
	}

	fn addr(&self) -> usize {
		Weak::as_ptr(&self.ptr) as *const () as usize
	}

	pub fn is_alive(&self) -> bool {
		self.ptr.strong_count() > 0
	}
}

impl Deref for SubscriberAddr {
	type Target = Weak<dyn Subscriber>;
	fn deref(&self) -> &Self::Target {
		&self.ptr
	}
}

impl PartialEq for SubscriberAddr {
	fn eq(&self, other: &Self) -> bool {
		self.addr() == other.addr()
	}
}

impl Eq for SubscriberAddr {}

impl Ord for SubscriberAddr {
	fn cmp(&self, other: &Self) -> Ordering {
		self.addr().cmp(&other.addr())
	}
}

impl PartialOrd for SubscriberAddr {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}
