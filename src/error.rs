use thiserror::Error;

/// Raised when a store graph reaches itself again while being made reactive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("store is cyclic: `{path}` leads back to one of its ancestors")]
pub struct CyclicStoreError {
	pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
	#[error(transparent)]
	Cyclic(#[from] CyclicStoreError),

	#[error("`{0}` is not defined")]
	UndefinedVariable(String),

	#[error("cannot read property `{property}` of {target}")]
	NotAnObject {
		property: String,
		target: &'static str,
	},

	#[error("syntax error at offset {offset}: {message}")]
	Syntax { offset: usize, message: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
