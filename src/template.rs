use std::rc::Rc;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::{Expression, Store, Value};

#[derive(Clone, Debug)]
enum Part {
	Text(Rc<str>),
	Expr(Expression),
}

/// Text with `{{ expression }}` placeholders.
///
/// A placeholder is the shortest `{{ ... }}` run on a single line with at
/// least one character between the braces. Anything else, including an
/// unclosed `{{`, is literal text.
#[derive(Clone, Debug)]
pub struct Template {
	source: Rc<str>,
	parts: Vec<Part>,
}

impl Template {
	pub fn compile(source: &str) -> Result<Self> {
		let placeholder = placeholder()?;
		let mut parts = Vec::new();
		let mut last = 0;

		for found in placeholder.find_iter(source) {
			if found.start() > last {
				parts.push(Part::Text(source[last..found.start()].into()));
			}
			let body = &source[found.start() + 2..found.end() - 2];
			parts.push(Part::Expr(Expression::compile(body)?));
			last = found.end();
		}

		if last < source.len() {
			parts.push(Part::Text(source[last..].into()));
		}

		Ok(Template {
			source: source.into(),
			parts,
		})
	}

	pub fn source(&self) -> &str {
		&self.source
	}

	/// `true` when the text has no placeholders.
	pub fn is_static(&self) -> bool {
		self.parts.iter().all(|p| matches!(p, Part::Text(_)))
	}

	/// Renders the template. Always produces a string.
	pub fn eval(&self, scope: &Store) -> Result<Value> {
		let mut out = String::new();
		for part in &self.parts {
			match part {
				Part::Text(text) => out.push_str(text),
				Part::Expr(expr) => out.push_str(&expr.eval(scope)?.to_string()),
			}
		}
		Ok(Value::String(out.into()))
	}
}

/// The shortest single-line `{{ ... }}` run with a non-empty body.
fn placeholder() -> Result<&'static Regex> {
	static PLACEHOLDER: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
	PLACEHOLDER
		.get_or_init(|| Regex::new(r"\{\{[^\r\n]+?\}\}"))
		.as_ref()
		.map_err(|error| Error::Syntax {
			offset: 0,
			message: error.to_string(),
		})
}
