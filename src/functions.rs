//! Standard functions registered by [`Registry::with_builtins`](crate::Registry::with_builtins).
//!
//! These are ordinary [`Function`] implementations; the host application
//! registers its own catalog through the same contract.

use std::{cmp::Ordering, str::FromStr, sync::Arc};

use regex::Regex;
use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};

use crate::{error::EvalError, evaluator::EvalContext, registry::Function, value::Value};

type Apply = fn(&mut dyn EvalContext, &Value, &[Value]) -> Result<Value, EvalError>;

/// A function implemented by a plain Rust fn pointer plus metadata.
pub struct Builtin {
    name: &'static str,
    aliases: &'static [&'static str],
    namespace: Option<&'static str>,
    usage: &'static str,
    description: &'static str,
    apply: Apply,
}

impl Builtin {
    pub const fn new(name: &'static str, usage: &'static str, apply: Apply) -> Self {
        Builtin {
            name,
            aliases: &[],
            namespace: None,
            usage,
            description: "",
            apply,
        }
    }

    pub const fn aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }

    pub const fn namespace(mut self, namespace: &'static str) -> Self {
        self.namespace = Some(namespace);
        self
    }

    pub const fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }
}

impl Function for Builtin {
    fn name(&self) -> &str {
        self.name
    }

    fn aliases(&self) -> &[&str] {
        self.aliases
    }

    fn namespace_identifier(&self) -> Option<&str> {
        self.namespace
    }

    fn usage(&self) -> &str {
        self.usage
    }

    fn short_description(&self) -> &str {
        self.description
    }

    fn apply(
        &self,
        ctx: &mut dyn EvalContext,
        caller: &Value,
        args: &[Value],
    ) -> Result<Value, EvalError> {
        (self.apply)(ctx, caller, args)
    }
}

/// The standard function set, in registration order
pub fn builtins() -> Vec<Arc<dyn Function>> {
    let all = [
        Builtin::new("concat", "concat(values...)", concat)
            .describe("Concatenates its arguments, flattening lists and skipping nulls"),
        Builtin::new("upper", "upper(string)", upper).describe("Uppercases a string"),
        Builtin::new("lower", "lower(string)", lower).describe("Lowercases a string"),
        Builtin::new("trim", "trim(string)", trim).describe("Removes surrounding whitespace"),
        Builtin::new("size", "size(value)", size)
            .aliases(&["length"])
            .describe("Number of elements of a list, characters of a string or keys of an object"),
        Builtin::new("empty", "empty(value)", empty)
            .describe("True for null, empty strings, empty lists and empty objects"),
        Builtin::new("equal", "equal(a, b)", equal)
            .aliases(&["eq"])
            .describe("Compares two values, numbers by numeric value"),
        Builtin::new("lt", "lt(a, b)", |_, _, args| compare("lt", args, Ordering::is_lt))
            .describe("a < b"),
        Builtin::new("lte", "lte(a, b)", |_, _, args| compare("lte", args, Ordering::is_le))
            .describe("a <= b"),
        Builtin::new("gt", "gt(a, b)", |_, _, args| compare("gt", args, Ordering::is_gt))
            .describe("a > b"),
        Builtin::new("gte", "gte(a, b)", |_, _, args| compare("gte", args, Ordering::is_ge))
            .describe("a >= b"),
        Builtin::new("add", "add(numbers...)", add).describe("Exact decimal sum"),
        Builtin::new("subt", "subt(a, b)", subt).describe("Exact decimal difference"),
        Builtin::new("mult", "mult(numbers...)", mult).describe("Exact decimal product"),
        Builtin::new("quot", "quot(a, b)", quot).describe("Exact decimal quotient"),
        Builtin::new("not", "not(value)", not).describe("Logical negation"),
        Builtin::new("and", "and(values...)", and).describe("True if every argument is truthy"),
        Builtin::new("or", "or(values...)", or).describe("True if any argument is truthy"),
        Builtin::new("matches", "matches(string, pattern)", matches)
            .describe("True if the whole string matches the regular expression"),
        Builtin::new("join", "join(list, separator)", join)
            .describe("Joins list elements into a string"),
        Builtin::new("split", "split(string[, separator])", split)
            .describe("Splits a string, by comma unless a separator is given"),
        Builtin::new("first", "first(list)", first).describe("First element of a list"),
        Builtin::new("last", "last(list)", last).describe("Last element of a list"),
        Builtin::new("nth", "nth(list, index)", nth).describe("Element at a zero-based index"),
        Builtin::new("error", "error(message[, status])", error)
            .describe("Aborts evaluation with the given message and status (default 400)"),
        Builtin::new("math", "math(expressions...)", math)
            .namespace("math")
            .describe("Evaluates its arguments with the math namespace, returns the last"),
        Builtin::new("math.round", "math.round(number[, decimals])", round)
            .describe("Rounds half away from zero"),
        Builtin::new("math.floor", "math.floor(number)", |_, _, args| {
            unary_decimal("math.floor", args, |d| d.floor())
        })
        .describe("Largest integer not greater than the number"),
        Builtin::new("math.ceil", "math.ceil(number)", |_, _, args| {
            unary_decimal("math.ceil", args, |d| d.ceil())
        })
        .describe("Smallest integer not less than the number"),
        Builtin::new("math.abs", "math.abs(number)", |_, _, args| {
            unary_decimal("math.abs", args, |d| d.abs())
        })
        .describe("Absolute value"),
    ];

    all.into_iter()
        .map(|f| Arc::new(f) as Arc<dyn Function>)
        .collect()
}

fn expect_args(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), EvalError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else if max == usize::MAX {
            format!("at least {min}")
        } else {
            format!("{min} to {max}")
        };
        return Err(EvalError::arity(name, &expected, args.len()));
    }
    Ok(())
}

fn to_decimal(name: &str, value: &Value) -> Result<Decimal, EvalError> {
    let converted = match value {
        Value::Integer(n) => Some(Decimal::from(*n)),
        Value::Float(f) => Decimal::from_f64(*f),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    };
    converted.ok_or_else(|| {
        EvalError::syntax(format!(
            "{name}(): cannot use {} value '{value}' as a number",
            value.type_name()
        ))
    })
}

/// Integers stay integers when the result is whole
fn from_decimal(d: Decimal) -> Value {
    if d.fract().is_zero()
        && let Some(n) = d.to_i64()
    {
        return Value::Integer(n);
    }
    d.to_f64().map(Value::Float).unwrap_or(Value::Null)
}

fn overflow(name: &str) -> EvalError {
    EvalError::syntax(format!("{name}(): numeric overflow"))
}

fn concat(_: &mut dyn EvalContext, _: &Value, args: &[Value]) -> Result<Value, EvalError> {
    let mut out = String::new();
    for arg in args {
        for part in arg.iter_elements() {
            out.push_str(&part.as_string());
        }
    }
    Ok(Value::String(out))
}

fn upper(_: &mut dyn EvalContext, _: &Value, args: &[Value]) -> Result<Value, EvalError> {
    expect_args("upper", args, 1, 1)?;
    Ok(Value::String(args[0].as_string().to_uppercase()))
}

fn lower(_: &mut dyn EvalContext, _: &Value, args: &[Value]) -> Result<Value, EvalError> {
    expect_args("lower", args, 1, 1)?;
    Ok(Value::String(args[0].as_string().to_lowercase()))
}

fn trim(_: &mut dyn EvalContext, _: &Value, args: &[Value]) -> Result<Value, EvalError> {
    expect_args("trim", args, 1, 1)?;
    Ok(Value::String(args[0].as_string().trim().to_string()))
}

fn size(_: &mut dyn EvalContext, _: &Value, args: &[Value]) -> Result<Value, EvalError> {
    expect_args("size", args, 1, 1)?;
    let n = match &args[0] {
        Value::Null => 0,
        Value::Array(items) => items.len(),
        Value::Object(obj) => obj.len(),
        Value::String(s) => s.chars().count(),
        other => other.to_string().chars().count(),
    };
    Ok(Value::Integer(n as i64))
}

fn empty(_: &mut dyn EvalContext, _: &Value, args: &[Value]) -> Result<Value, EvalError> {
    expect_args("empty", args, 1, 1)?;
    let is_empty = match &args[0] {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(obj) => obj.is_empty(),
        _ => false,
    };
    Ok(Value::Boolean(is_empty))
}

/// Numeric comparison when both sides are numbers, string comparison otherwise
fn order(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            match (to_decimal("", a), to_decimal("", b)) {
                (Ok(x), Ok(y)) => Some(x.cmp(&y)),
                // Outside the decimal range
                _ => a.as_float()?.partial_cmp(&b.as_float()?),
            }
        }
        (Value::Boolean(x), Value::Boolean(y)) => Some(x.cmp(y)),
        _ => Some(a.as_string().cmp(&b.as_string())),
    }
}

fn equal(_: &mut dyn EvalContext, _: &Value, args: &[Value]) -> Result<Value, EvalError> {
    expect_args("equal", args, 2, 2)?;
    let same = match (&args[0], &args[1]) {
        (Value::Array(_), _) | (Value::Object(_), _) => args[0] == args[1],
        (a, b) => order(a, b) == Some(Ordering::Equal),
    };
    Ok(Value::Boolean(same))
}

fn compare(name: &str, args: &[Value], accept: fn(Ordering) -> bool) -> Result<Value, EvalError> {
    expect_args(name, args, 2, 2)?;
    Ok(Value::Boolean(
        order(&args[0], &args[1]).is_some_and(accept),
    ))
}

fn add(_: &mut dyn EvalContext, _: &Value, args: &[Value]) -> Result<Value, EvalError> {
    let mut sum = Decimal::ZERO;
    for arg in args {
        sum = sum
            .checked_add(to_decimal("add", arg)?)
            .ok_or_else(|| overflow("add"))?;
    }
    Ok(from_decimal(sum))
}

fn subt(_: &mut dyn EvalContext, _: &Value, args: &[Value]) -> Result<Value, EvalError> {
    expect_args("subt", args, 2, 2)?;
    let (a, b) = (to_decimal("subt", &args[0])?, to_decimal("subt", &args[1])?);
    a.checked_sub(b)
        .map(from_decimal)
        .ok_or_else(|| overflow("subt"))
}

fn mult(_: &mut dyn EvalContext, _: &Value, args: &[Value]) -> Result<Value, EvalError> {
    expect_args("mult", args, 1, usize::MAX)?;
    let mut product = Decimal::ONE;
    for arg in args {
        product = product
            .checked_mul(to_decimal("mult", arg)?)
            .ok_or_else(|| overflow("mult"))?;
    }
    Ok(from_decimal(product))
}

fn quot(_: &mut dyn EvalContext, _: &Value, args: &[Value]) -> Result<Value, EvalError> {
    expect_args("quot", args, 2, 2)?;
    let (a, b) = (to_decimal("quot", &args[0])?, to_decimal("quot", &args[1])?);
    if b.is_zero() {
        return Err(EvalError::syntax("quot(): division by zero"));
    }
    a.checked_div(b)
        .map(from_decimal)
        .ok_or_else(|| overflow("quot"))
}

fn not(_: &mut dyn EvalContext, _: &Value, args: &[Value]) -> Result<Value, EvalError> {
    expect_args("not", args, 1, 1)?;
    Ok(Value::Boolean(!args[0].is_truthy()))
}

fn and(_: &mut dyn EvalContext, _: &Value, args: &[Value]) -> Result<Value, EvalError> {
    expect_args("and", args, 1, usize::MAX)?;
    Ok(Value::Boolean(args.iter().all(Value::is_truthy)))
}

fn or(_: &mut dyn EvalContext, _: &Value, args: &[Value]) -> Result<Value, EvalError> {
    expect_args("or", args, 1, usize::MAX)?;
    Ok(Value::Boolean(args.iter().any(Value::is_truthy)))
}

fn matches(_: &mut dyn EvalContext, _: &Value, args: &[Value]) -> Result<Value, EvalError> {
    expect_args("matches", args, 2, 2)?;
    let pattern = args[1].as_string();
    let re = Regex::new(&format!("^(?:{pattern})$"))
        .map_err(|e| EvalError::syntax(format!("matches(): invalid regex: {e}")))?;
    Ok(Value::Boolean(re.is_match(&args[0].as_string())))
}

fn join(_: &mut dyn EvalContext, _: &Value, args: &[Value]) -> Result<Value, EvalError> {
    expect_args("join", args, 2, 2)?;
    let separator = args[1].as_string();
    let parts: Vec<String> = args[0].iter_elements().iter().map(Value::as_string).collect();
    Ok(Value::String(parts.join(&separator)))
}

fn split(_: &mut dyn EvalContext, _: &Value, args: &[Value]) -> Result<Value, EvalError> {
    expect_args("split", args, 1, 2)?;
    let source = args[0].as_string();
    let separator = args.get(1).map(Value::as_string).unwrap_or_else(|| ",".into());
    if source.is_empty() {
        return Ok(Value::Array(Vec::new()));
    }
    Ok(Value::Array(
        source
            .split(separator.as_str())
            .map(|s| Value::String(s.to_string()))
            .collect(),
    ))
}

fn first(_: &mut dyn EvalContext, _: &Value, args: &[Value]) -> Result<Value, EvalError> {
    expect_args("first", args, 1, 1)?;
    Ok(args[0].iter_elements().into_iter().next().unwrap_or_default())
}

fn last(_: &mut dyn EvalContext, _: &Value, args: &[Value]) -> Result<Value, EvalError> {
    expect_args("last", args, 1, 1)?;
    Ok(args[0].iter_elements().pop().unwrap_or_default())
}

fn nth(_: &mut dyn EvalContext, _: &Value, args: &[Value]) -> Result<Value, EvalError> {
    expect_args("nth", args, 2, 2)?;
    let items = args[0].iter_elements();
    let value = args[1]
        .as_int()
        .and_then(|i| usize::try_from(i).ok())
        .and_then(|i| items.get(i).cloned())
        .unwrap_or_default();
    Ok(value)
}

fn error(_: &mut dyn EvalContext, _: &Value, args: &[Value]) -> Result<Value, EvalError> {
    expect_args("error", args, 1, 2)?;
    let status = args
        .get(1)
        .and_then(Value::as_int)
        .and_then(|s| u16::try_from(s).ok())
        .unwrap_or(400);
    Err(EvalError::new(status, args[0].as_string()))
}

fn math(_: &mut dyn EvalContext, _: &Value, args: &[Value]) -> Result<Value, EvalError> {
    Ok(args.last().cloned().unwrap_or_default())
}

fn round(_: &mut dyn EvalContext, _: &Value, args: &[Value]) -> Result<Value, EvalError> {
    expect_args("math.round", args, 1, 2)?;
    let n = to_decimal("math.round", &args[0])?;
    let places = match args.get(1) {
        Some(v) => v
            .as_int()
            .and_then(|p| u32::try_from(p).ok())
            .ok_or_else(|| EvalError::syntax("math.round(): decimals must be a non-negative integer"))?,
        None => 0,
    };
    let rounded = n.round_dp_with_strategy(
        places,
        rust_decimal::RoundingStrategy::MidpointAwayFromZero,
    );
    Ok(from_decimal(rounded))
}

fn unary_decimal(
    name: &str,
    args: &[Value],
    op: fn(Decimal) -> Decimal,
) -> Result<Value, EvalError> {
    expect_args(name, args, 1, 1)?;
    Ok(from_decimal(op(to_decimal(name, &args[0])?)))
}
