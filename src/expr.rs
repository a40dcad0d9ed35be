//! A small expression language for placeholders.
//!
//! Supports literals, dotted property paths, `!`, unary `-`, `+`, `-`,
//! `===`/`!==` (with `==`/`!=` as aliases), `&&`, `||` and the conditional
//! operator. Logical and conditional operators short-circuit, which matters:
//! only the properties on the taken branch are read and therefore tracked.

use std::rc::Rc;

use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::{Store, Value};

#[derive(Clone, Debug)]
enum Expr {
	Literal(Value),
	Path(SmallVec<[Rc<str>; 4]>),
	Not(Box<Expr>),
	Neg(Box<Expr>),
	Logical(LogicOp, Box<Expr>, Box<Expr>),
	Binary(BinOp, Box<Expr>, Box<Expr>),
	Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BinOp {
	Add,
	Sub,
	Eq,
	Ne,
}

/// Operators that may skip their right operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LogicOp {
	And,
	Or,
}

/// A compiled expression, ready to be evaluated against any scope.
#[derive(Clone, Debug)]
pub struct Expression {
	source: Rc<str>,
	root: Rc<Expr>,
}

impl Expression {
	pub fn compile(source: &str) -> Result<Self> {
		let tokens = tokenize(source)?;
		let mut parser = Parser {
			tokens,
			pos: 0,
			end: source.len(),
		};
		let root = parser.expr()?;
		if let Some((offset, token)) = parser.tokens.get(parser.pos) {
			return Err(syntax(*offset, format!("unexpected {}", token.describe())));
		}

		Ok(Expression {
			source: source.into(),
			root: Rc::new(root),
		})
	}

	pub fn source(&self) -> &str {
		&self.source
	}

	/// Evaluates against `scope`. Every reactive property read on the way is
	/// tracked by the evaluating subscriber, if there is one.
	pub fn eval(&self, scope: &Store) -> Result<Value> {
		eval(&self.root, scope)
	}
}

fn eval(expr: &Expr, scope: &Store) -> Result<Value> {
	Ok(match expr {
		Expr::Literal(value) => value.clone(),
		Expr::Path(path) => resolve(path, scope)?,
		Expr::Not(inner) => Value::Bool(!eval(inner, scope)?.is_truthy()),
		Expr::Neg(inner) => Value::Number(-eval(inner, scope)?.to_number()),
		Expr::Conditional(test, then, otherwise) => {
			if eval(test, scope)?.is_truthy() {
				eval(then, scope)?
			} else {
				eval(otherwise, scope)?
			}
		}
		Expr::Logical(op, lhs, rhs) => {
			let lhs = eval(lhs, scope)?;
			match (op, lhs.is_truthy()) {
				(LogicOp::And, true) | (LogicOp::Or, false) => eval(rhs, scope)?,
				(LogicOp::And, false) | (LogicOp::Or, true) => lhs,
			}
		}
		Expr::Binary(op, lhs, rhs) => {
			let lhs = eval(lhs, scope)?;
			let rhs = eval(rhs, scope)?;
			match op {
				BinOp::Add => add(&lhs, &rhs),
				BinOp::Sub => Value::Number(lhs.to_number() - rhs.to_number()),
				BinOp::Eq => Value::Bool(lhs == rhs),
				BinOp::Ne => Value::Bool(lhs != rhs),
			}
		}
	})
}

fn add(lhs: &Value, rhs: &Value) -> Value {
	let concat = |lhs: &Value, rhs: &Value| Value::String(format!("{}{}", lhs, rhs).into());
	match (lhs, rhs) {
		(Value::String(_), _) | (_, Value::String(_)) => concat(lhs, rhs),
		// Objects and arrays coerce through their string form.
		(Value::Object(_) | Value::Array(_), _) | (_, Value::Object(_) | Value::Array(_)) => {
			concat(lhs, rhs)
		}
		_ => Value::Number(lhs.to_number() + rhs.to_number()),
	}
}

fn resolve(path: &[Rc<str>], scope: &Store) -> Result<Value> {
	let (root, rest) = match path.split_first() {
		Some(split) => split,
		None => return Ok(Value::Undefined),
	};

	let mut value = scope
		.get(root)
		.ok_or_else(|| Error::UndefinedVariable(root.to_string()))?;

	for segment in rest {
		value = match &value {
			Value::Object(store) => store.get(segment).unwrap_or_default(),
			Value::Undefined | Value::Null => {
				return Err(Error::NotAnObject {
					property: segment.to_string(),
					target: value.type_name(),
				})
			}
			_ => Value::Undefined,
		};
	}

	Ok(value)
}

fn syntax(offset: usize, message: impl Into<String>) -> Error {
	Error::Syntax {
		offset,
		message: message.into(),
	}
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
	Number(f64),
	Str(Rc<str>),
	Ident(Rc<str>),
	Punct(&'static str),
}

impl Token {
	fn describe(&self) -> String {
		match self {
			Token::Number(n) => format!("number `{}`", n),
			Token::Str(s) => format!("string {:?}", s),
			Token::Ident(name) => format!("`{}`", name),
			Token::Punct(p) => format!("`{}`", p),
		}
	}
}

// Longest first.
const PUNCTUATION: &[&str] = &[
	"===", "!==", "==", "!=", "&&", "||", "!", "?", ":", "+", "-", ".", "(", ")",
];

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>> {
	let mut tokens = Vec::new();
	let mut chars = source.char_indices().peekable();

	while let Some(&(start, c)) = chars.peek() {
		if c.is_whitespace() {
			chars.next();
			continue;
		}

		if c.is_ascii_digit() {
			let mut end = start;
			while let Some(&(i, c)) = chars.peek() {
				if c.is_ascii_digit() || c == '.' {
					end = i + c.len_utf8();
					chars.next();
				} else {
					break;
				}
			}
			let text = &source[start..end];
			let number = text
				.parse()
				.map_err(|_| syntax(start, format!("invalid number `{}`", text)))?;
			tokens.push((start, Token::Number(number)));
			continue;
		}

		if c == '_' || c == '$' || c.is_alphabetic() {
			let mut end = start;
			while let Some(&(i, c)) = chars.peek() {
				if c == '_' || c == '$' || c.is_alphanumeric() {
					end = i + c.len_utf8();
					chars.next();
				} else {
					break;
				}
			}
			tokens.push((start, Token::Ident(source[start..end].into())));
			continue;
		}

		if c == '\'' || c == '"' {
			chars.next();
			let mut text = String::new();
			let mut closed = false;
			while let Some((_, ch)) = chars.next() {
				match ch {
					'\\' => match chars.next() {
						Some((_, 'n')) => text.push('\n'),
						Some((_, 't')) => text.push('\t'),
						Some((_, escaped)) => text.push(escaped),
						None => break,
					},
					ch if ch == c => {
						closed = true;
						break;
					}
					ch => text.push(ch),
				}
			}
			if !closed {
				return Err(syntax(start, "unterminated string"));
			}
			tokens.push((start, Token::Str(text.into())));
			continue;
		}

		let rest = &source[start..];
		match PUNCTUATION.iter().find(|p| rest.starts_with(**p)) {
			Some(p) => {
				for _ in 0..p.len() {
					chars.next();
				}
				tokens.push((start, Token::Punct(*p)));
			}
			None => return Err(syntax(start, format!("unexpected character `{}`", c))),
		}
	}

	Ok(tokens)
}

struct Parser {
	tokens: Vec<(usize, Token)>,
	pos: usize,
	end: usize,
}

impl Parser {
	fn peek(&self) -> Option<&Token> {
		self.tokens.get(self.pos).map(|(_, t)| t)
	}

	fn offset(&self) -> usize {
		self.tokens.get(self.pos).map_or(self.end, |(o, _)| *o)
	}

	fn eat(&mut self, punct: &str) -> bool {
		if matches!(self.peek(), Some(Token::Punct(p)) if *p == punct) {
			self.pos += 1;
			true
		} else {
			false
		}
	}

	fn expect(&mut self, punct: &str) -> Result<()> {
		if self.eat(punct) {
			Ok(())
		} else {
			Err(self.unexpected(&format!("`{}`", punct)))
		}
	}

	fn unexpected(&self, wanted: &str) -> Error {
		let found = self
			.peek()
			.map_or_else(|| "end of input".to_string(), Token::describe);
		syntax(self.offset(), format!("expected {}, found {}", wanted, found))
	}

	fn expr(&mut self) -> Result<Expr> {
		let test = self.or()?;
		if !self.eat("?") {
			return Ok(test);
		}
		let then = self.expr()?;
		self.expect(":")?;
		let otherwise = self.expr()?;
		Ok(Expr::Conditional(
			Box::new(test),
			Box::new(then),
			Box::new(otherwise),
		))
	}

	/// Left-associative chain of `ops` over operands parsed by `next`.
	fn chain<Op: Copy>(
		&mut self,
		ops: &[(&str, Op)],
		next: fn(&mut Self) -> Result<Expr>,
		build: fn(Op, Box<Expr>, Box<Expr>) -> Expr,
	) -> Result<Expr> {
		let mut lhs = next(self)?;
		'outer: loop {
			for (punct, op) in ops {
				if self.eat(punct) {
					let rhs = next(self)?;
					lhs = build(*op, Box::new(lhs), Box::new(rhs));
					continue 'outer;
				}
			}
			return Ok(lhs);
		}
	}

	fn binary(
		&mut self,
		ops: &[(&str, BinOp)],
		next: fn(&mut Self) -> Result<Expr>,
	) -> Result<Expr> {
		self.chain(ops, next, Expr::Binary)
	}

	fn or(&mut self) -> Result<Expr> {
		self.chain(&[("||", LogicOp::Or)], Self::and, Expr::Logical)
	}

	fn and(&mut self) -> Result<Expr> {
		self.chain(&[("&&", LogicOp::And)], Self::equality, Expr::Logical)
	}

	fn equality(&mut self) -> Result<Expr> {
		self.binary(
			&[
				("===", BinOp::Eq),
				("!==", BinOp::Ne),
				("==", BinOp::Eq),
				("!=", BinOp::Ne),
			],
			Self::additive,
		)
	}

	fn additive(&mut self) -> Result<Expr> {
		self.binary(&[("+", BinOp::Add), ("-", BinOp::Sub)], Self::unary)
	}

	fn unary(&mut self) -> Result<Expr> {
		if self.eat("!") {
			return Ok(Expr::Not(Box::new(self.unary()?)));
		}
		if self.eat("-") {
			return Ok(Expr::Neg(Box::new(self.unary()?)));
		}
		self.primary()
	}

	fn primary(&mut self) -> Result<Expr> {
		if self.eat("(") {
			let inner = self.expr()?;
			self.expect(")")?;
			return Ok(inner);
		}

		let token = match self.peek() {
			Some(token) => token.clone(),
			None => return Err(self.unexpected("an expression")),
		};

		match token {
			Token::Number(n) => {
				self.pos += 1;
				Ok(Expr::Literal(Value::Number(n)))
			}
			Token::Str(s) => {
				self.pos += 1;
				Ok(Expr::Literal(Value::String(s)))
			}
			Token::Ident(name) => {
				self.pos += 1;
				match &*name {
					"true" => return Ok(Expr::Literal(Value::Bool(true))),
					"false" => return Ok(Expr::Literal(Value::Bool(false))),
					"null" => return Ok(Expr::Literal(Value::Null)),
					"undefined" => return Ok(Expr::Literal(Value::Undefined)),
					_ => {}
				}

				let mut path = SmallVec::new();
				path.push(name);
				while self.eat(".") {
					match self.peek() {
						Some(Token::Ident(segment)) => {
							path.push(segment.clone());
							self.pos += 1;
						}
						_ => return Err(self.unexpected("a property name")),
					}
				}
				Ok(Expr::Path(path))
			}
			Token::Punct(_) => Err(self.unexpected("an expression")),
		}
	}
}
