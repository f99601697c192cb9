//! Rendering of expression trees.
//!
//! - [`to_source()`] turns a tree back into expression text. String literals
//!   keep the quote character they were written with and their exact content.
//! - [`to_tree_string()`] prints an indented outline of the nodes, one per
//!   line, for diagnostics.
//!
//! # Examples
//!
//! ```
//! use tarragon::{Parser, Registry};
//! use tarragon::output::to_source;
//!
//! let registry = Registry::with_builtins();
//! let tree = Parser::new(&registry).parse("concat( 'a',\"b\" )").unwrap();
//! assert_eq!(to_source(&tree), "concat('a', \"b\")");
//! ```

use crate::{
    ast::{Expr, ExprTree, NodeId},
    value::Value,
};

pub fn to_source(tree: &ExprTree) -> String {
    let mut out = String::new();
    let root = tree.root();
    for (i, child) in tree.children(root).iter().enumerate() {
        if i > 0 {
            out.push_str("; ");
        }
        write_node(tree, *child, &mut out);
    }
    out
}

fn write_node(tree: &ExprTree, id: NodeId, out: &mut String) {
    let children = tree.children(id);
    match tree.kind(id) {
        Expr::Root => {}
        Expr::Constant { value, quote } => write_constant(value, *quote, out),
        Expr::Null => out.push_str("null"),
        Expr::Value(name) => {
            out.push_str(name);
            if tree.node(id).has_arguments {
                write_arguments(tree, children, '(', ')', out);
            }
        }
        Expr::FunctionCall { name, .. } => {
            out.push_str(name);
            write_arguments(tree, children, '(', ')', out);
        }
        Expr::FunctionValue { call, value } => {
            write_node(tree, *call, out);
            write_node(tree, *value, out);
            if tree.node(id).has_arguments {
                write_arguments(tree, children, '(', ')', out);
            }
        }
        Expr::Group => write_arguments(tree, children, '(', ')', out),
        Expr::Array => write_arguments(tree, children, '[', ']', out),
        Expr::Control(construct) => {
            out.push_str(construct.keyword());
            write_arguments(tree, children, '(', ')', out);
        }
    }
}

fn write_arguments(tree: &ExprTree, children: &[NodeId], open: char, close: char, out: &mut String) {
    out.push(open);
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_node(tree, *child, out);
    }
    out.push(close);
}

fn write_constant(value: &Value, quote: Option<char>, out: &mut String) {
    match value {
        Value::String(s) => {
            let q = quote.unwrap_or('"');
            out.push(q);
            for ch in s.chars() {
                if ch == q || ch == '\\' {
                    out.push('\\');
                }
                out.push(ch);
            }
            out.push(q);
        }
        // Whole floats keep a fraction so they read back as floats
        Value::Float(n) => {
            let text = n.to_string();
            out.push_str(&text);
            if n.is_finite() && !text.contains('.') {
                out.push_str(".0");
            }
        }
        other => out.push_str(&other.to_string()),
    }
}

/// Indented outline of the tree, one node per line
pub fn to_tree_string(tree: &ExprTree) -> String {
    let mut out = String::new();
    outline(tree, tree.root(), 0, &mut out);
    out
}

fn outline(tree: &ExprTree, id: NodeId, depth: usize, out: &mut String) {
    let node = tree.node(id);
    let label = match &node.kind {
        Expr::Root => "Root".to_string(),
        Expr::Constant { value, quote } => {
            let mut literal = String::new();
            write_constant(value, *quote, &mut literal);
            format!("Constant {literal}")
        }
        Expr::Null => "Null".to_string(),
        Expr::Value(name) => format!("Value {name}"),
        Expr::FunctionCall { name, .. } => format!("FunctionCall {name}"),
        Expr::FunctionValue { .. } => "FunctionValue".to_string(),
        Expr::Group => "Group".to_string(),
        Expr::Array => "Array".to_string(),
        Expr::Control(construct) => format!("Control {}", construct.keyword()),
    };
    out.push_str(&"  ".repeat(depth));
    out.push_str(&label);
    out.push_str(&format!(" @{}:{}\n", node.row, node.column));

    if let Expr::FunctionValue { call, value } = &node.kind {
        outline(tree, *call, depth + 1, out);
        outline(tree, *value, depth + 1, out);
    }
    for child in &node.children {
        outline(tree, *child, depth + 1, out);
    }
}
