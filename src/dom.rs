//! A minimal node tree to bind templates into.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::Result;
use crate::{Store, Template, Value, Watcher};

#[derive(Clone, Debug)]
pub enum Node {
	Element(Element),
	Text(TextNode),
}

#[derive(Clone, Debug)]
pub struct Element {
	pub tag: String,
	pub children: Vec<Node>,
}

/// A text node. Clones share the same content.
#[derive(Clone, Debug, Default)]
pub struct TextNode {
	content: Rc<RefCell<String>>,
}

impl TextNode {
	pub fn new(content: impl Into<String>) -> Self {
		TextNode {
			content: Rc::new(RefCell::new(content.into())),
		}
	}

	pub fn content(&self) -> String {
		self.content.borrow().clone()
	}

	pub fn set_content(&self, content: impl Into<String>) {
		*self.content.borrow_mut() = content.into();
	}
}

impl Node {
	pub fn element(tag: impl Into<String>, children: Vec<Node>) -> Self {
		Node::Element(Element {
			tag: tag.into(),
			children,
		})
	}

	pub fn text(content: impl Into<String>) -> Self {
		Node::Text(TextNode::new(content))
	}

	/// Concatenated content of every text node below, in document order.
	pub fn text_content(&self) -> String {
		let mut out = String::new();
		self.collect_text(&mut out);
		out
	}

	fn collect_text(&self, out: &mut String) {
		match self {
			Node::Text(text) => out.push_str(&text.content.borrow()),
			Node::Element(element) => {
				for child in &element.children {
					child.collect_text(out);
				}
			}
		}
	}

	pub fn text_nodes(&self) -> Vec<TextNode> {
		let mut out = Vec::new();
		self.walk(&mut |text: &TextNode| out.push(text.clone()));
		out
	}

	fn walk(&self, visit: &mut dyn FnMut(&TextNode)) {
		match self {
			Node::Text(text) => visit(text),
			Node::Element(element) => {
				for child in &element.children {
					child.walk(visit);
				}
			}
		}
	}
}

/// Binds every text node under `root` that contains placeholders to `scope`.
///
/// Each node gets a watcher that writes the rendered text back into it; the
/// first render happens before this returns. The watchers stop updating
/// once they are dropped, so keep them.
pub fn bind(root: &Node, scope: &Store) -> Result<Vec<Watcher>> {
	let mut watchers = Vec::new();
	for node in root.text_nodes() {
		let template = Template::compile(&node.content())?;
		if template.is_static() {
			continue;
		}

		let watcher = Watcher::template(scope.clone(), template, move |value: &Value| {
			node.set_content(value.to_string());
		})?;
		watchers.push(watcher);
	}

	tracing::debug!(watchers = watchers.len(), "bound template");
	Ok(watchers)
}
