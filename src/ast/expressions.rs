use std::sync::Arc;

use crate::{registry::Function, value::Value};

/// Index of a node inside an [`ExprTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Built-in control constructs.
///
/// Each behaves like a call with fixed argument slots:
///
/// ```text
/// if(condition, then[, else])
/// is(condition, value)
/// each(list, body)
/// filter(list, predicate)
/// map(list, expression)
/// reduce(list, initial, expression)
/// any(list, predicate)  all(list, predicate)  none(list, predicate)
/// cache(key[, timeout], expression)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Construct {
    If,
    Is,
    Each,
    Filter,
    Map,
    Reduce,
    Any,
    All,
    None,
    Cache,
}

impl Construct {
    pub fn keyword(self) -> &'static str {
        match self {
            Construct::If => "if",
            Construct::Is => "is",
            Construct::Each => "each",
            Construct::Filter => "filter",
            Construct::Map => "map",
            Construct::Reduce => "reduce",
            Construct::Any => "any",
            Construct::All => "all",
            Construct::None => "none",
            Construct::Cache => "cache",
        }
    }
}

/// Expression node kinds.
///
/// Children are stored on the owning [`Node`], not in the variant, so the
/// builder can attach arguments while it walks the token stream.
#[derive(Debug, Clone)]
pub enum Expr {
    /// Entry point, children are the top-level expressions
    Root,

    /// Literal number, string or boolean
    ///
    /// # Example
    /// ```text
    /// 42
    /// 'User'
    /// true
    /// ```
    Constant {
        value: Value,
        /// Quote character the string literal was written with
        quote: Option<char>,
    },

    /// Identifier resolved against the runtime context at evaluation time.
    ///
    /// When it has children it is a method call: the last path segment names
    /// the method, the children are its arguments.
    ///
    /// # Example
    /// ```text
    /// me.name
    /// data
    /// ```
    Value(String),

    /// Call of a registered function, children are the arguments
    ///
    /// # Example
    /// ```text
    /// concat("a", "b")
    /// ```
    FunctionCall {
        name: String,
        function: Arc<dyn Function>,
    },

    /// Value chained off a function call result
    ///
    /// # Example
    /// ```text
    /// find('User').name
    /// ```
    FunctionValue { call: NodeId, value: NodeId },

    /// Parenthesized sub-expression without a function name
    Group,

    /// Bracketed literal, children are the elements
    ///
    /// # Example
    /// ```text
    /// [1, 'two', three]
    /// ```
    Array,

    Control(Construct),

    Null,
}

impl Expr {
    /// Nodes that an immediately following `(` may open an argument list on
    pub fn accepts_arguments(&self) -> bool {
        match self {
            Expr::FunctionCall { .. } | Expr::FunctionValue { .. } | Expr::Control(_) => true,
            Expr::Value(name) => name.contains('.'),
            _ => false,
        }
    }

    pub fn is_call(&self) -> bool {
        matches!(self, Expr::FunctionCall { .. } | Expr::FunctionValue { .. })
    }
}

/// A node in the arena. The parent link is an index, never an owner.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: Expr,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Set once `(` opened an argument list on this node, even an empty one
    pub has_arguments: bool,
    pub row: usize,
    pub column: usize,
}

/// Arena-backed expression tree.
///
/// Node 0 is always the [`Expr::Root`]. Nodes are only ever appended, and a
/// node is reachable from the root through exactly one parent.
#[derive(Debug, Clone)]
pub struct ExprTree {
    nodes: Vec<Node>,
}

impl Default for ExprTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ExprTree {
    pub fn new() -> Self {
        ExprTree {
            nodes: vec![Node {
                kind: Expr::Root,
                parent: None,
                children: Vec::new(),
                has_arguments: false,
                row: 1,
                column: 1,
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[0].children.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &Expr {
        &self.node(id).kind
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).children.last().copied()
    }

    /// The single effective child of the root, if the program has exactly one
    pub fn program(&self) -> Option<NodeId> {
        match self.children(self.root()) {
            [only] => Some(*only),
            _ => None,
        }
    }

    fn alloc(&mut self, kind: Expr, parent: Option<NodeId>, row: usize, column: usize) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            parent,
            children: Vec::new(),
            has_arguments: false,
            row,
            column,
        });
        id
    }

    /// Mark `id` as invoked with an argument list
    pub fn open_arguments(&mut self, id: NodeId) {
        self.nodes[id.index()].has_arguments = true;
    }

    /// Append a new node as the last child of `parent`
    pub fn push(&mut self, parent: NodeId, kind: Expr, row: usize, column: usize) -> NodeId {
        let id = self.alloc(kind, Some(parent), row, column);
        self.nodes[parent.index()].children.push(id);
        id
    }

    /// Replace the last child of `parent` (a call) with a
    /// [`Expr::FunctionValue`] owning both that call and a new value node.
    ///
    /// Returns `None` when `parent` has no children.
    pub fn chain_last_child(
        &mut self,
        parent: NodeId,
        value_name: String,
        row: usize,
        column: usize,
    ) -> Option<NodeId> {
        let call = self.last_child(parent)?;
        let (call_row, call_column) = (self.node(call).row, self.node(call).column);

        let chained = self.alloc(Expr::Null, Some(parent), call_row, call_column);
        let value = self.alloc(Expr::Value(value_name), Some(chained), row, column);
        self.nodes[chained.index()].kind = Expr::FunctionValue { call, value };
        self.nodes[call.index()].parent = Some(chained);

        if let Some(slot) = self.nodes[parent.index()].children.last_mut() {
            *slot = chained;
        }
        Some(chained)
    }

    /// All nodes reachable from `id` in depth-first pre-order, `id` included.
    ///
    /// For a [`Expr::FunctionValue`] the chained call and value come before
    /// any method arguments.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            let mut nested: Vec<NodeId> = Vec::new();
            if let Expr::FunctionValue { call, value } = self.kind(next) {
                nested.push(*call);
                nested.push(*value);
            }
            nested.extend_from_slice(self.children(next));
            stack.extend(nested.into_iter().rev());
        }
        out
    }
}
