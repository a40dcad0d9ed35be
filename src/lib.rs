//! Reactive data binding over observable stores.
//!
//! A [`Store`] made reactive with [`make_reactive`] tracks who reads its
//! properties. A [`Watcher`] evaluates a getter with itself marked as the
//! active subscriber, so every reactive property it reads registers it.
//! Writing such a property re-evaluates the watcher synchronously and calls
//! its callback when the result changed.
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use tether::{make_reactive, store, Template, Watcher};
//!
//! let data = store! { "msg" => "hi" };
//! make_reactive(&data).unwrap();
//!
//! let text = Rc::new(RefCell::new(String::new()));
//! let template = Template::compile("say {{msg}}").unwrap();
//! let _watcher = Watcher::template(data.clone(), template, {
//!     let text = text.clone();
//!     move |value| *text.borrow_mut() = value.to_string()
//! })
//! .unwrap();
//!
//! assert_eq!(*text.borrow(), "say hi");
//! data.set("msg", "bye").unwrap();
//! assert_eq!(*text.borrow(), "say bye");
//! ```

pub mod active;
pub mod dom;
pub mod macros;

mod addr;
mod app;
mod dependencies;
mod dependency;
mod error;
mod expr;
mod store;
mod template;
mod value;
mod watcher;

pub use app::App;
pub use dependency::Dependency;
pub use dom::Node;
pub use error::{CyclicStoreError, Error, Result};
pub use expr::Expression;
pub use store::{make_reactive, Store};
pub use template::Template;
pub use value::Value;
pub use watcher::{Tracking, Watcher, WatcherOptions};

/// Something that re-evaluates when a property it depends on is written.
pub trait Subscriber: 'static {
	/// Called by [`Dependency::notify_all`].
	fn update(&self) -> Result<()>;
}
