use std::rc::{Rc, Weak};

use fxhash::FxHashMap;

use crate::{Dependency, Subscriber};

/// The registries a subscriber is currently registered with.
#[derive(Default)]
pub struct Dependencies {
	based_on: FxHashMap<usize, Rc<Dependency>>,
}

fn key(dependency: &Rc<Dependency>) -> usize {
	Rc::as_ptr(dependency) as usize
}

impl Dependencies {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.based_on.len()
	}

	/// Adds the registries read by the last evaluation, keeping the old ones.
	pub fn extend(&mut self, reads: Vec<Rc<Dependency>>) {
		for dependency in reads {
			self.based_on.insert(key(&dependency), dependency);
		}
	}

	/// Replaces the record with the registries read by the last evaluation
	/// and leaves every registry that was not read again.
	pub fn swap(&mut self, reads: Vec<Rc<Dependency>>, subscriber: &Weak<dyn Subscriber>) {
		let mut next = FxHashMap::default();
		for dependency in reads {
			next.insert(key(&dependency), dependency);
		}

		let prev = std::mem::replace(&mut self.based_on, next);
		prev.iter()
			.filter(|(k, _)| !self.based_on.contains_key(k))
			.for_each(|(_, dependency)| dependency.unregister(subscriber));
	}

	pub fn release(&mut self, subscriber: &Weak<dyn Subscriber>) {
		for (_, dependency) in self.based_on.drain() {
			dependency.unregister(subscriber);
		}
	}
}
