use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::active::Activation;
use crate::dependencies::Dependencies;
use crate::error::Result;
use crate::{Expression, Store, Subscriber, Template, Value};

type Getter = Box<dyn Fn(&Store) -> Result<Value>>;
type Callback = Rc<dyn Fn(&Value)>;

/// How a watcher treats registrations from earlier evaluations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Tracking {
	/// Registrations pile up and are never pruned. A property read by an
	/// earlier evaluation keeps triggering re-evaluation even after the
	/// expression stopped reading it.
	#[default]
	Accumulate,
	/// After every successful evaluation, leave the registries that were not
	/// read this time.
	Rebuild,
}

#[derive(Clone, Debug, Default)]
pub struct WatcherOptions {
	pub tracking: Tracking,
	pub label: Option<String>,
}

/// Re-evaluates a getter whenever a property it read changes, and reports
/// changed results to a callback.
///
/// The getter runs once during construction. The callback only fires when
/// the new result is strictly unequal to the cached one, and the cache
/// starts as `null`.
///
/// A callback that writes to a property the getter depends on re-enters the
/// watcher synchronously. Unless the values settle, this recurses without
/// bound.
#[derive(Clone)]
pub struct Watcher {
	body: Rc<WatcherBody>,
}

struct WatcherBody {
	label: String,
	tracking: Tracking,
	scope: Store,
	getter: Getter,
	callback: Option<Callback>,
	value: RefCell<Value>,
	dependencies: RefCell<Dependencies>,
	this: Weak<WatcherBody>,
}

impl Drop for WatcherBody {
	fn drop(&mut self) {
		let this = self.this.clone() as Weak<dyn Subscriber>;
		self.dependencies.get_mut().release(&this);
	}
}

impl Watcher {
	pub fn new<G, C>(scope: Store, getter: G, callback: C) -> Result<Self>
	where
		G: Fn(&Store) -> Result<Value> + 'static,
		C: Fn(&Value) + 'static,
	{
		Self::with_options(scope, WatcherOptions::default(), getter, Some(callback))
	}

	pub fn with_options<G, C>(
		scope: Store,
		options: WatcherOptions,
		getter: G,
		callback: Option<C>,
	) -> Result<Self>
	where
		G: Fn(&Store) -> Result<Value> + 'static,
		C: Fn(&Value) + 'static,
	{
		let watcher = Watcher {
			body: Rc::new_cyclic(|this| WatcherBody {
				label: options.label.unwrap_or_else(|| "<unnamed>".to_string()),
				tracking: options.tracking,
				scope,
				getter: Box::new(getter),
				callback: callback.map(|c| Rc::new(c) as Callback),
				value: RefCell::new(Value::Null),
				dependencies: RefCell::new(Dependencies::new()),
				this: this.clone(),
			}),
		};

		watcher.update()?;
		Ok(watcher)
	}

	/// Watches a compiled [`Expression`].
	pub fn expression<C>(scope: Store, expression: Expression, callback: C) -> Result<Self>
	where
		C: Fn(&Value) + 'static,
	{
		let options = WatcherOptions {
			label: Some(expression.source().to_string()),
			..Default::default()
		};
		Self::with_options(
			scope,
			options,
			move |scope| expression.eval(scope),
			Some(callback),
		)
	}

	/// Watches a rendered [`Template`]. The callback receives the full text.
	pub fn template<C>(scope: Store, template: Template, callback: C) -> Result<Self>
	where
		C: Fn(&Value) + 'static,
	{
		let options = WatcherOptions {
			label: Some(template.source().to_string()),
			..Default::default()
		};
		Self::with_options(
			scope,
			options,
			move |scope| template.eval(scope),
			Some(callback),
		)
	}

	/// Re-runs the getter now.
	pub fn update(&self) -> Result<()> {
		self.body.update()
	}

	/// The last computed value.
	pub fn value(&self) -> Value {
		self.body.value.borrow().clone()
	}

	pub fn label(&self) -> &str {
		&self.body.label
	}

	pub fn tracking(&self) -> Tracking {
		self.body.tracking
	}

	/// Number of registries this watcher is known to be registered with.
	pub fn dependency_count(&self) -> usize {
		self.body.dependencies.borrow().len()
	}

	pub fn as_subscriber(&self) -> Weak<dyn Subscriber> {
		Rc::downgrade(&self.body) as Weak<dyn Subscriber>
	}
}

impl WatcherBody {
	fn evaluate(&self) -> Result<Value> {
		let this = self.this.clone() as Weak<dyn Subscriber>;

		let activation = Activation::enter(this.clone());
		let result = (self.getter)(&self.scope);
		let reads = activation.finish();

		let mut dependencies = self.dependencies.borrow_mut();
		match (self.tracking, &result) {
			(Tracking::Rebuild, Ok(_)) => dependencies.swap(reads, &this),
			_ => dependencies.extend(reads),
		}

		result
	}
}

impl Subscriber for WatcherBody {
	fn update(&self) -> Result<()> {
		let value = self.evaluate().map_err(|error| {
			tracing::debug!(label = %self.label, %error, "evaluation failed");
			error
		})?;

		let changed = {
			let mut cached = self.value.borrow_mut();
			if *cached != value {
				*cached = value.clone();
				true
			} else {
				false
			}
		};

		tracing::trace!(label = %self.label, changed, "evaluated");

		if changed {
			if let Some(callback) = self.callback.clone() {
				callback(&value);
			}
		}

		Ok(())
	}
}

impl std::fmt::Debug for Watcher {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Watcher")
			.field("label", &self.body.label)
			.field("value", &*self.body.value.borrow())
			.finish()
	}
}
