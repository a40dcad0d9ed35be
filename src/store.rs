use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use fxhash::FxHashSet;

use crate::active;
use crate::error::{CyclicStoreError, Result};
use crate::{Dependency, Value};

/// A shared, ordered key-value record.
///
/// Properties start out plain. [`make_reactive`] instruments every property
/// present at that moment: reads of an instrumented property register the
/// evaluating subscriber, writes notify everyone registered. Properties added
/// afterwards stay plain until `make_reactive` runs again.
///
/// Cloning a `Store` clones the handle, not the data.
#[derive(Clone, Default)]
pub struct Store {
	body: Rc<StoreBody>,
}

#[derive(Default)]
struct StoreBody {
	entries: RefCell<Vec<(Rc<str>, Entry)>>,
}

enum Entry {
	Plain(Value),
	Reactive(Rc<Property>),
}

/// The slot behind an intercepted property: its current value and the
/// subscribers that read it.
pub(crate) struct Property {
	value: RefCell<Value>,
	dependency: Rc<Dependency>,
}

impl Property {
	fn new(value: Value) -> Self {
		Property {
			value: RefCell::new(value),
			dependency: Rc::new(Dependency::new()),
		}
	}

	fn get(&self) -> Value {
		active::track(&self.dependency);
		self.value.borrow().clone()
	}

	fn get_once(&self) -> Value {
		self.value.borrow().clone()
	}

	fn set(&self, owner: &Store, key: &str, value: Value) -> Result<()> {
		if *self.value.borrow() == value {
			return Ok(());
		}

		if let Value::Object(store) = &value {
			// `owner` counts as an ancestor, so a value leading back to it
			// (or to anything above it) is rejected before it is stored.
			let mut check = CycleCheck::default();
			check.on_path.insert(owner.addr());
			check.trail.push(key.into());
			check.visit(store)?;
			instrument_all(store);
		}

		let old = self.value.replace(value);
		std::mem::drop(old);

		tracing::trace!(key, "property changed");
		self.dependency.notify_all()
	}
}

impl Store {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn ptr_eq(&self, other: &Store) -> bool {
		Rc::ptr_eq(&self.body, &other.body)
	}

	fn addr(&self) -> usize {
		Rc::as_ptr(&self.body) as usize
	}

	pub fn len(&self) -> usize {
		self.body.entries.borrow().len()
	}

	pub fn is_empty(&self) -> bool {
		self.body.entries.borrow().is_empty()
	}

	pub fn contains(&self, key: &str) -> bool {
		self.body.entries.borrow().iter().any(|(k, _)| &**k == key)
	}

	pub fn keys(&self) -> Vec<Rc<str>> {
		self.body
			.entries
			.borrow()
			.iter()
			.map(|(k, _)| k.clone())
			.collect()
	}

	pub fn is_reactive(&self, key: &str) -> bool {
		matches!(self.lookup(key), Some(Lookup::Reactive(_)))
	}

	/// The registry of a reactive property.
	pub fn dependency(&self, key: &str) -> Option<Rc<Dependency>> {
		match self.lookup(key)? {
			Lookup::Reactive(property) => Some(property.dependency.clone()),
			Lookup::Plain(_) => None,
		}
	}

	fn lookup(&self, key: &str) -> Option<Lookup> {
		let entries = self.body.entries.borrow();
		let (_, entry) = entries.iter().find(|(k, _)| &**k == key)?;
		Some(match entry {
			Entry::Plain(value) => Lookup::Plain(value.clone()),
			Entry::Reactive(property) => Lookup::Reactive(property.clone()),
		})
	}

	/// Reads a property. Inside an evaluation, a reactive property records
	/// the evaluating subscriber as dependent on it.
	pub fn get(&self, key: &str) -> Option<Value> {
		Some(match self.lookup(key)? {
			Lookup::Plain(value) => value,
			Lookup::Reactive(property) => property.get(),
		})
	}

	/// Reads a property without recording a dependency.
	pub fn get_once(&self, key: &str) -> Option<Value> {
		Some(match self.lookup(key)? {
			Lookup::Plain(value) => value,
			Lookup::Reactive(property) => property.get_once(),
		})
	}

	/// Follows a dotted path through nested stores, tracking every step.
	pub fn get_path(&self, path: &str) -> Option<Value> {
		let mut segments = path.split('.');
		let mut value = self.get(segments.next()?)?;
		for segment in segments {
			value = value.as_store()?.get(segment)?;
		}
		Some(value)
	}

	/// Writes a property.
	///
	/// Writing a reactive property with a value strictly equal to the current
	/// one does nothing. Any other write stores the value, makes it reactive
	/// if it is a store, and re-evaluates every dependent subscriber before
	/// returning. Plain and new properties are stored silently.
	///
	/// A store that is cyclic, or that leads back to `self`, is refused with
	/// [`CyclicStoreError`](crate::CyclicStoreError) and nothing changes.
	///
	/// The write has already happened when a subscriber error is returned.
	pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
		let value = value.into();
		match self.lookup(key) {
			Some(Lookup::Reactive(property)) => property.set(self, key, value),
			_ => {
				self.insert_plain(key, value);
				Ok(())
			}
		}
	}

	fn insert_plain(&self, key: &str, value: Value) {
		let mut entries = self.body.entries.borrow_mut();
		match entries.iter_mut().find(|(k, _)| &**k == key) {
			Some((_, entry)) => *entry = Entry::Plain(value),
			None => entries.push((key.into(), Entry::Plain(value))),
		}
	}

	/// Turns every plain property into a reactive one and returns the nested
	/// stores found along the way.
	fn instrument(&self) -> Vec<(Rc<str>, Store)> {
		let mut entries = self.body.entries.borrow_mut();
		let mut children = Vec::new();
		for (key, entry) in entries.iter_mut() {
			if let Entry::Plain(value) = entry {
				let value = std::mem::take(value);
				*entry = Entry::Reactive(Rc::new(Property::new(value)));
			}

			if let Entry::Reactive(property) = entry {
				if let Value::Object(store) = &*property.value.borrow() {
					children.push((key.clone(), store.clone()));
				}
			}
		}
		children
	}

	fn children(&self) -> Vec<(Rc<str>, Store)> {
		let entries = self.body.entries.borrow();
		entries
			.iter()
			.filter_map(|(key, entry)| {
				let value = match entry {
					Entry::Plain(value) => value.clone(),
					Entry::Reactive(property) => property.get_once(),
				};
				match value {
					Value::Object(store) => Some((key.clone(), store)),
					_ => None,
				}
			})
			.collect()
	}
}

enum Lookup {
	Plain(Value),
	Reactive(Rc<Property>),
}

impl<K, V> FromIterator<(K, V)> for Store
where
	K: Into<Rc<str>>,
	V: Into<Value>,
{
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		let store = Store::new();
		for (key, value) in iter {
			let key: Rc<str> = key.into();
			store.insert_plain(&key, value.into());
		}
		store
	}
}

impl Debug for Store {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		// Only the keys: nested stores may be shared or cyclic.
		f.debug_struct("Store")
			.field("addr", &format_args!("{:#x}", self.addr()))
			.field("keys", &self.keys())
			.finish()
	}
}

/// Intercepts every property of `store` and of every store reachable from it.
///
/// The graph is checked for cycles before anything is touched, so a failure
/// leaves the store exactly as it was. Properties that are already reactive
/// keep their registry; stores shared between several parents are walked
/// once.
pub fn make_reactive(store: &Store) -> Result<(), CyclicStoreError> {
	let mut check = CycleCheck::default();
	check.visit(store)?;
	instrument_all(store);
	Ok(())
}

/// Instruments an acyclic graph, visiting shared stores once.
fn instrument_all(store: &Store) {
	let mut done = FxHashSet::default();
	let mut pending = vec![store.clone()];
	while let Some(store) = pending.pop() {
		if !done.insert(store.addr()) {
			continue;
		}
		pending.extend(store.instrument().into_iter().map(|(_, child)| child));
	}

	tracing::debug!(stores = done.len(), "made reactive");
}

#[derive(Default)]
struct CycleCheck {
	on_path: FxHashSet<usize>,
	done: FxHashSet<usize>,
	trail: Vec<Rc<str>>,
}

impl CycleCheck {
	fn visit(&mut self, store: &Store) -> Result<(), CyclicStoreError> {
		let addr = store.addr();
		if self.on_path.contains(&addr) {
			return Err(CyclicStoreError {
				path: self.trail.join("."),
			});
		}
		if self.done.contains(&addr) {
			return Ok(());
		}

		self.on_path.insert(addr);
		for (key, child) in store.children() {
			self.trail.push(key);
			self.visit(&child)?;
			self.trail.pop();
		}
		self.on_path.remove(&addr);
		self.done.insert(addr);

		Ok(())
	}
}
