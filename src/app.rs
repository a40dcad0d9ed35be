use crate::dom::{self, Node};
use crate::error::Result;
use crate::{make_reactive, Store, Value, Watcher};

/// A bound instance: reactive data plus the node tree rendering it.
pub struct App {
	data: Store,
	root: Node,
	watchers: Vec<Watcher>,
}

impl App {
	/// Makes `data` reactive and binds every placeholder under `root`.
	pub fn mount(data: Store, root: Node) -> Result<Self> {
		make_reactive(&data)?;
		let watchers = dom::bind(&root, &data)?;
		Ok(App {
			data,
			root,
			watchers,
		})
	}

	pub fn data(&self) -> &Store {
		&self.data
	}

	pub fn root(&self) -> &Node {
		&self.root
	}

	pub fn watchers(&self) -> &[Watcher] {
		&self.watchers
	}

	pub fn get(&self, key: &str) -> Option<Value> {
		self.data.get(key)
	}

	pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
		self.data.set(key, value)
	}

	/// The current text of the whole tree.
	pub fn render(&self) -> String {
		self.root.text_content()
	}
}

impl std::fmt::Debug for App {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("App")
			.field("data", &self.data)
			.field("watchers", &self.watchers.len())
			.finish()
	}
}
