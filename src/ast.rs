//! # Tarragon Expression Language - Syntax Tree
//!
//! This module defines the tokens and the expression tree of the expression
//! language embedded in templates and scripts of the application platform.
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[expressions]** - Expression node kinds and the arena-backed tree
//!
//! ## Quick Start
//!
//! ```text
//! if(empty(me.name), 'anonymous', concat('Hello ', me.name))
//! ```
//!
//! ## Core Concepts
//!
//! ### Calls, not operators
//!
//! The language has no infix operators. Everything is a call of a registered
//! function or of a built-in control construct:
//!
//! ```text
//! concat('a', 'b')
//! filter(users, equal(data.active, true))
//! ```
//!
//! ### Reserved Words
//!
//! `cache`, `true`, `false`, `if`, `is`, `each`, `filter`, `map`, `reduce`,
//! `any`, `all`, `none`, `data` and `null` have a fixed meaning and always
//! win over registered functions of the same name.
//!
//! ### Chaining
//!
//! A dotted identifier right after a call projects a field off its result:
//!
//! ```text
//! find('User').name
//! ```
//!
//! ### Namespaces
//!
//! A function may declare a namespace. Inside its argument list, bare names
//! are looked up with the namespace prefix first:
//!
//! ```text
//! math(round(2.5))    // round resolves to math.round
//! ```
pub mod expressions;
pub mod tokens;

pub use expressions::{Construct, Expr, ExprTree, Node, NodeId};
pub use tokens::{Token, TokenKind};
