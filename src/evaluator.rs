use std::{
    collections::{BTreeSet, HashMap},
    time::{Duration, Instant},
};

use tracing::trace;

use crate::{
    ast::{Construct, Expr, ExprTree, NodeId},
    error::EvalError,
    value::Value,
};

/// Runtime context an expression is evaluated in.
///
/// The host application implements this to expose its variables and the
/// methods of its objects.
pub trait EvalContext {
    /// Look up a top-level name (`me`, `page`, `request`, ...)
    fn lookup(&self, name: &str) -> Option<Value>;

    /// Invoke `method` on `target`, for expressions like `me.save()`
    fn call_method(
        &mut self,
        target: &Value,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, EvalError> {
        let _ = args;
        Err(EvalError::syntax(format!(
            "unknown method {method}() on {}",
            target.type_name()
        )))
    }
}

/// A context backed by a map of named values.
///
/// # Examples
///
/// ```
/// use tarragon::{EvalContext, MapContext, Value};
///
/// let ctx = MapContext::new().with("limit", Value::Integer(10));
/// assert_eq!(ctx.lookup("limit"), Some(Value::Integer(10)));
/// assert_eq!(ctx.lookup("offset"), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MapContext {
    vars: HashMap<String, Value>,
}

impl MapContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every key of an object becomes a variable; other values give an
    /// empty context
    pub fn from_object(value: Value) -> Self {
        match value {
            Value::Object(vars) => MapContext { vars },
            _ => Self::default(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }
}

impl EvalContext for MapContext {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.vars.get(name).cloned()
    }
}

/// What an evaluation touched. Collected across evaluations until cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationHints {
    pub used_functions: BTreeSet<String>,
    pub resolved_keys: BTreeSet<String>,
    pub missing_keys: BTreeSet<String>,
}

impl EvaluationHints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report_used_function(&mut self, name: &str) {
        self.used_functions.insert(name.to_string());
    }

    pub fn report_resolved_key(&mut self, key: &str) {
        self.resolved_keys.insert(key.to_string());
    }

    pub fn report_missing_key(&mut self, key: &str) {
        self.missing_keys.insert(key.to_string());
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires: Option<Instant>,
}

/// Tree-walking evaluator.
///
/// One `Evaluator` is one evaluation context: values memoized by `cache()`
/// live as long as it does.
///
/// # Examples
///
/// ```
/// use tarragon::{EvaluationHints, Evaluator, MapContext, Parser, Registry, Value};
///
/// let registry = Registry::with_builtins();
/// let tree = Parser::new(&registry)
///     .parse("map(items, concat(data, '!'))")
///     .unwrap();
///
/// let mut ctx = MapContext::new().with(
///     "items",
///     Value::Array(vec![Value::from("a"), Value::from("b")]),
/// );
/// let mut hints = EvaluationHints::new();
/// let result = Evaluator::new()
///     .evaluate(&tree, &mut ctx, &Value::Null, &mut hints)
///     .unwrap();
///
/// assert_eq!(result, Value::Array(vec![Value::from("a!"), Value::from("b!")]));
/// assert!(hints.used_functions.contains("concat"));
/// ```
#[derive(Debug, Default)]
pub struct Evaluator {
    /// Loop bindings (`data`, `accumulator`), innermost last
    locals: Vec<(String, Value)>,
    cache: HashMap<String, CacheEntry>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate a whole tree and return the value of its last top-level
    /// expression (`Null` for an empty tree).
    pub fn evaluate(
        &mut self,
        tree: &ExprTree,
        ctx: &mut dyn EvalContext,
        caller: &Value,
        hints: &mut EvaluationHints,
    ) -> Result<Value, EvalError> {
        self.locals.clear();
        let mut walk = Walk {
            tree,
            ctx,
            caller,
            hints,
            locals: &mut self.locals,
            cache: &mut self.cache,
        };
        walk.eval(tree.root())
    }

    /// Forget every value memoized by `cache()`
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

struct Walk<'a> {
    tree: &'a ExprTree,
    ctx: &'a mut dyn EvalContext,
    caller: &'a Value,
    hints: &'a mut EvaluationHints,
    locals: &'a mut Vec<(String, Value)>,
    cache: &'a mut HashMap<String, CacheEntry>,
}

impl Walk<'_> {
    fn eval(&mut self, id: NodeId) -> Result<Value, EvalError> {
        let tree = self.tree;
        let node = tree.node(id);

        let result = match &node.kind {
            Expr::Root | Expr::Group => self.sequence(&node.children),
            Expr::Constant { value, .. } => Ok(value.clone()),
            Expr::Null => Ok(Value::Null),
            Expr::Value(name) if !node.has_arguments => Ok(self.lookup(name)),
            Expr::Value(name) => {
                let (target, method) = split_method(name);
                let target = match target {
                    "" => self.caller.clone(),
                    path => self.lookup(path),
                };
                self.call_method(&target, method, &node.children)
            }
            Expr::FunctionCall { name, function } => {
                let args = self.eval_all(&node.children)?;
                self.hints.report_used_function(name);
                trace!(function = %name, args = args.len(), "calling function");
                function.apply(&mut *self.ctx, self.caller, &args)
            }
            Expr::FunctionValue { call, value } => {
                let base = self.eval(*call)?;
                let path = match tree.kind(*value) {
                    Expr::Value(path) => path.as_str(),
                    _ => "",
                };
                if !node.has_arguments {
                    Ok(base.get_path(path))
                } else {
                    let (target, method) = split_method(path);
                    let target = base.get_path(target);
                    self.call_method(&target, method, &node.children)
                }
            }
            Expr::Array => self.eval_all(&node.children).map(Value::Array),
            Expr::Control(construct) => self.construct(*construct, &node.children),
        };

        result.map_err(|e| e.or_at(node.row, node.column))
    }

    fn eval_all(&mut self, ids: &[NodeId]) -> Result<Vec<Value>, EvalError> {
        ids.iter().map(|id| self.eval(*id)).collect()
    }

    fn sequence(&mut self, ids: &[NodeId]) -> Result<Value, EvalError> {
        let mut last = Value::Null;
        for id in ids {
            last = self.eval(*id)?;
        }
        Ok(last)
    }

    fn eval_with(&mut self, id: NodeId, bindings: Vec<(&str, Value)>) -> Result<Value, EvalError> {
        let depth = self.locals.len();
        self.locals
            .extend(bindings.into_iter().map(|(n, v)| (n.to_string(), v)));
        let result = self.eval(id);
        self.locals.truncate(depth);
        result
    }

    /// Resolve a dotted name. Never fails: unknown names are `Null`.
    fn lookup(&mut self, name: &str) -> Value {
        let found = match name.strip_prefix('.') {
            Some(path) => Some(self.caller.get_path(path)),
            None => {
                let (head, rest) = name.split_once('.').unwrap_or((name, ""));
                self.locals
                    .iter()
                    .rev()
                    .find(|(n, _)| n == head)
                    .map(|(_, v)| v.clone())
                    .or_else(|| self.ctx.lookup(head))
                    .or_else(|| (head == "this").then(|| self.caller.clone()))
                    .map(|base| base.get_path(rest))
            }
        };

        match found {
            Some(value) if !value.is_null() => {
                self.hints.report_resolved_key(name);
                value
            }
            _ => {
                self.hints.report_missing_key(name);
                Value::Null
            }
        }
    }

    fn call_method(
        &mut self,
        target: &Value,
        method: &str,
        arg_ids: &[NodeId],
    ) -> Result<Value, EvalError> {
        let args = self.eval_all(arg_ids)?;
        trace!(method, target = target.type_name(), "calling method");
        self.ctx.call_method(target, method, args)
    }

    fn construct(&mut self, construct: Construct, args: &[NodeId]) -> Result<Value, EvalError> {
        let keyword = construct.keyword();
        match construct {
            Construct::If => match args {
                [condition, then] => {
                    if self.eval(*condition)?.is_truthy() {
                        self.eval(*then)
                    } else {
                        Ok(Value::Null)
                    }
                }
                [condition, then, otherwise] => {
                    if self.eval(*condition)?.is_truthy() {
                        self.eval(*then)
                    } else {
                        self.eval(*otherwise)
                    }
                }
                _ => Err(EvalError::arity(keyword, "2 or 3", args.len())),
            },
            Construct::Is => match args {
                [condition, value] => {
                    if self.eval(*condition)?.is_truthy() {
                        self.eval(*value)
                    } else {
                        Ok(Value::Null)
                    }
                }
                _ => Err(EvalError::arity(keyword, "2", args.len())),
            },
            Construct::Each => {
                let (items, body) = self.list_and_body(keyword, args)?;
                for item in items {
                    self.eval_with(body, vec![("data", item)])?;
                }
                Ok(Value::Null)
            }
            Construct::Filter => {
                let (items, predicate) = self.list_and_body(keyword, args)?;
                let mut kept = Vec::new();
                for item in items {
                    if self
                        .eval_with(predicate, vec![("data", item.clone())])?
                        .is_truthy()
                    {
                        kept.push(item);
                    }
                }
                Ok(Value::Array(kept))
            }
            Construct::Map => {
                let (items, body) = self.list_and_body(keyword, args)?;
                items
                    .into_iter()
                    .map(|item| self.eval_with(body, vec![("data", item)]))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            Construct::Reduce => {
                let [list, initial, body] = args else {
                    return Err(EvalError::arity(keyword, "3", args.len()));
                };
                let items = self.eval(*list)?.iter_elements();
                let mut accumulator = self.eval(*initial)?;
                for item in items {
                    accumulator =
                        self.eval_with(*body, vec![("accumulator", accumulator), ("data", item)])?;
                }
                Ok(accumulator)
            }
            Construct::Any | Construct::All | Construct::None => {
                let (items, predicate) = self.list_and_body(keyword, args)?;
                // any stops at the first match, all and none at the first
                // element deciding the outcome
                let stop_on = !matches!(construct, Construct::All);
                for item in items {
                    let matched = self
                        .eval_with(predicate, vec![("data", item)])?
                        .is_truthy();
                    if matched == stop_on {
                        return Ok(Value::Boolean(matches!(construct, Construct::Any)));
                    }
                }
                Ok(Value::Boolean(!matches!(construct, Construct::Any)))
            }
            Construct::Cache => {
                let (key, timeout, body) = match args {
                    [key, body] => (*key, None, *body),
                    [key, timeout, body] => (*key, Some(*timeout), *body),
                    _ => return Err(EvalError::arity(keyword, "2 or 3", args.len())),
                };
                let key = self.eval(key)?.as_string();
                let timeout = match timeout {
                    Some(id) => self.eval(id)?.as_float(),
                    None => None,
                };
                self.cached(key, timeout, body)
            }
        }
    }

    fn list_and_body(
        &mut self,
        keyword: &str,
        args: &[NodeId],
    ) -> Result<(Vec<Value>, NodeId), EvalError> {
        match args {
            [list, body] => Ok((self.eval(*list)?.iter_elements(), *body)),
            _ => Err(EvalError::arity(keyword, "2", args.len())),
        }
    }

    /// Memoized evaluation of `body` under `key`. A positive `timeout` (in
    /// seconds) bounds how long the value is reused; one too large to
    /// represent never expires.
    fn cached(
        &mut self,
        key: String,
        timeout: Option<f64>,
        body: NodeId,
    ) -> Result<Value, EvalError> {
        let now = Instant::now();
        if let Some(entry) = self.cache.get(&key)
            && entry.expires.is_none_or(|at| now < at)
        {
            trace!(%key, "cache hit");
            return Ok(entry.value.clone());
        }

        let value = self.eval(body)?;
        let expires = timeout
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .and_then(|ttl| now.checked_add(ttl));
        self.cache.insert(
            key,
            CacheEntry {
                value: value.clone(),
                expires,
            },
        );
        Ok(value)
    }
}

/// `a.b.method` -> (`a.b`, `method`); `.method` -> (``, `method`)
fn split_method(path: &str) -> (&str, &str) {
    match path.rsplit_once('.') {
        Some((target, method)) => (target.trim_start_matches('.'), method),
        None => ("", path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_method_handles_leading_dot() {
        assert_eq!(split_method("me.save"), ("me", "save"));
        assert_eq!(split_method(".save"), ("", "save"));
        assert_eq!(split_method(".owner.rename"), ("owner", "rename"));
    }

    #[test]
    fn map_context_from_non_object_is_empty() {
        let ctx = MapContext::from_object(Value::Integer(1));
        assert_eq!(ctx.lookup("anything"), None);
    }
}
