//! The single "currently evaluating" slot.
//!
//! Property reads consult this slot to learn who depends on them. The slot is
//! only ever changed through [`Activation`], which puts the previous state back
//! when it is dropped, so an evaluation that returns an error or panics cannot
//! leave a stale subscriber behind.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::{Dependency, Subscriber};

struct Frame {
	subscriber: Weak<dyn Subscriber>,
	reads: Vec<Rc<Dependency>>,
}

thread_local! {
	static ACTIVE: RefCell<Option<Frame>> = const { RefCell::new(None) };
}

/// Returns `true` while an evaluation is running on this thread.
pub fn is_tracking() -> bool {
	ACTIVE.with(|active| active.borrow().is_some())
}

/// Registers the active subscriber, if any, with `dependency`.
pub(crate) fn track(dependency: &Rc<Dependency>) {
	ACTIVE.with(|active| {
		if let Some(frame) = active.borrow_mut().as_mut() {
			dependency.register(frame.subscriber.clone());
			frame.reads.push(dependency.clone());
		}
	})
}

#[must_use]
pub(crate) struct Activation {
	previous: Option<Frame>,
}

impl Activation {
	pub fn enter(subscriber: Weak<dyn Subscriber>) -> Self {
		let frame = Frame {
			subscriber,
			reads: Vec::new(),
		};
		let previous = ACTIVE.with(|active| active.replace(Some(frame)));
		if previous.is_some() {
			tracing::debug!("nested evaluation, outer subscriber suspended");
		}

		Activation { previous }
	}

	/// Leaves the slot and hands back the registries read while active.
	pub fn finish(self) -> Vec<Rc<Dependency>> {
		ACTIVE.with(|active| {
			active
				.borrow_mut()
				.as_mut()
				.map(|frame| std::mem::take(&mut frame.reads))
				.unwrap_or_default()
		})
	}
}

impl Drop for Activation {
	fn drop(&mut self) {
		let previous = self.previous.take();
		let _ = ACTIVE.try_with(|active| active.replace(previous));
	}
}
