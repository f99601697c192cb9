use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use pretty_assertions::assert_eq;
use tarragon::{
    Error, EvalContext, EvalError, EvaluationHints, Evaluator, Function, MapContext, ParseResult,
    Parser, Registry, Value, functions::Builtin,
};

fn json_object(pairs: Vec<(&str, Value)>) -> Value {
    let mut map = HashMap::new();
    for (k, v) in pairs {
        map.insert(k.to_string(), v);
    }
    Value::Object(map)
}

fn json_array(values: Vec<Value>) -> Value {
    Value::Array(values)
}

fn eval_expr(source: &str, ctx: &mut dyn EvalContext) -> Result<Value, Error> {
    tarragon::eval(&Registry::with_builtins(), source, ctx)
}

fn eval_with_hints(source: &str, ctx: &mut dyn EvalContext) -> (Value, EvaluationHints) {
    let registry = Registry::with_builtins();
    let tree = Parser::new(&registry).parse(source).unwrap();
    let mut hints = EvaluationHints::new();
    let value = Evaluator::new()
        .evaluate(&tree, ctx, &Value::Null, &mut hints)
        .unwrap();
    (value, hints)
}

fn eval_simple(source: &str) -> Value {
    eval_expr(source, &mut MapContext::new()).unwrap()
}

fn shop() -> MapContext {
    MapContext::new()
        .with(
            "me",
            json_object(vec![
                ("name", Value::from("Alice")),
                ("age", Value::Integer(30)),
                (
                    "address",
                    json_object(vec![("city", Value::from("Berlin"))]),
                ),
            ]),
        )
        .with(
            "orders",
            json_array(vec![
                json_object(vec![
                    ("id", Value::Integer(1)),
                    ("total", Value::Float(12.5)),
                    ("tags", json_array(vec![Value::from("a"), Value::from("b")])),
                ]),
                json_object(vec![
                    ("id", Value::Integer(2)),
                    ("total", Value::Float(99.0)),
                    ("tags", json_array(vec![])),
                ]),
                json_object(vec![
                    ("id", Value::Integer(3)),
                    ("total", Value::Float(7.25)),
                    ("tags", json_array(vec![Value::from("c")])),
                ]),
            ]),
        )
}

// ============================================================================
// Values and lookups
// ============================================================================

#[test]
fn test_constants() {
    assert_eq!(eval_simple("42"), Value::Integer(42));
    assert_eq!(eval_simple("-1.5"), Value::Float(-1.5));
    assert_eq!(eval_simple("'text'"), Value::from("text"));
    assert_eq!(eval_simple("true"), Value::Boolean(true));
    assert_eq!(eval_simple("null"), Value::Null);
    assert_eq!(eval_simple(""), Value::Null);
}

#[test]
fn test_nested_field_access() {
    let mut ctx = shop();
    assert_eq!(
        eval_expr("me.address.city", &mut ctx).unwrap(),
        Value::from("Berlin")
    );
    assert_eq!(
        eval_expr("orders.1.id", &mut ctx).unwrap(),
        Value::Integer(2)
    );
}

#[test]
fn test_missing_names_are_null() {
    let mut ctx = shop();
    assert_eq!(eval_expr("nobody.name", &mut ctx).unwrap(), Value::Null);
    assert_eq!(eval_expr("me.address.zip", &mut ctx).unwrap(), Value::Null);
    assert_eq!(
        eval_expr("concat(nobody.name, '!')", &mut ctx).unwrap(),
        Value::from("!")
    );
}

#[test]
fn test_hints_record_keys_and_functions() {
    let mut ctx = shop();
    let (value, hints) = eval_with_hints("concat(upper(me.name), me.nickname)", &mut ctx);
    assert_eq!(value, Value::from("ALICE"));
    assert_eq!(
        hints.used_functions.iter().collect::<Vec<_>>(),
        vec!["concat", "upper"]
    );
    assert!(hints.resolved_keys.contains("me.name"));
    assert!(hints.missing_keys.contains("me.nickname"));
}

#[test]
fn test_caller_projection() {
    let registry = Registry::with_builtins();
    let tree = Parser::new(&registry)
        .parse("concat(.name, ' / ', this.role)")
        .unwrap();
    let caller = json_object(vec![
        ("name", Value::from("Bob")),
        ("role", Value::from("admin")),
    ]);

    let value = Evaluator::new()
        .evaluate(&tree, &mut MapContext::new(), &caller, &mut EvaluationHints::new())
        .unwrap();
    assert_eq!(value, Value::from("Bob / admin"));
}

#[test]
fn test_sequences_and_groups() {
    assert_eq!(eval_simple("1; 2; 3"), Value::Integer(3));
    assert_eq!(eval_simple("(1, 2)"), Value::Integer(2));
    assert_eq!(
        eval_simple("[1, 'a', null, [true]]"),
        json_array(vec![
            Value::Integer(1),
            Value::from("a"),
            Value::Null,
            json_array(vec![Value::Boolean(true)]),
        ])
    );
}

// ============================================================================
// Control constructs
// ============================================================================

#[test]
fn test_if_and_is() {
    let mut ctx = shop();
    assert_eq!(
        eval_expr("if(gt(me.age, 18), 'adult', 'minor')", &mut ctx).unwrap(),
        Value::from("adult")
    );
    assert_eq!(eval_simple("if(false, 1)"), Value::Null);
    assert_eq!(eval_simple("if('false', 1, 2)"), Value::Integer(2));
    assert_eq!(eval_simple("is(1, 'yes')"), Value::from("yes"));
    assert_eq!(eval_simple("is(0, 'yes')"), Value::Null);
}

#[test]
fn test_if_evaluates_one_branch() {
    assert_eq!(eval_simple("if(true, 'ok', error('boom'))"), Value::from("ok"));
}

#[test]
fn test_filter_and_map() {
    let mut ctx = shop();
    assert_eq!(
        eval_expr("map(filter(orders, gt(data.total, 10)), data.id)", &mut ctx).unwrap(),
        json_array(vec![Value::Integer(1), Value::Integer(2)])
    );
}

#[test]
fn test_nested_iteration_rebinds_data() {
    let mut ctx = shop();
    assert_eq!(
        eval_expr("map(orders, join(map(data.tags, upper(data)), '+'))", &mut ctx).unwrap(),
        json_array(vec![Value::from("A+B"), Value::from(""), Value::from("C")])
    );
}

#[test]
fn test_reduce() {
    let mut ctx = shop();
    assert_eq!(
        eval_expr("reduce(orders, 0, add(accumulator, data.total))", &mut ctx).unwrap(),
        Value::Float(118.75)
    );
    assert_eq!(eval_simple("reduce([], 'start', 'never')"), Value::from("start"));
}

#[test]
fn test_any_all_none() {
    let mut ctx = shop();
    let mut check = |source: &str| eval_expr(source, &mut ctx).unwrap();

    assert_eq!(check("any(orders, gt(data.total, 50))"), Value::Boolean(true));
    assert_eq!(check("all(orders, gt(data.total, 5))"), Value::Boolean(true));
    assert_eq!(check("all(orders, gt(data.total, 10))"), Value::Boolean(false));
    assert_eq!(check("none(orders, gt(data.total, 100))"), Value::Boolean(true));

    assert_eq!(check("any([], true)"), Value::Boolean(false));
    assert_eq!(check("all([], false)"), Value::Boolean(true));
    assert_eq!(check("none([], true)"), Value::Boolean(true));
}

#[test]
fn test_each_returns_null() {
    assert_eq!(eval_simple("each([1, 2], data)"), Value::Null);
}

#[test]
fn test_iteration_over_scalar_and_null() {
    assert_eq!(
        eval_simple("map('x', concat(data, data))"),
        json_array(vec![Value::from("xx")])
    );
    assert_eq!(eval_simple("map(nothing, data)"), json_array(vec![]));
}

#[test]
fn test_construct_arity() {
    let err = eval_expr("map(orders)", &mut shop()).unwrap_err();
    assert_eq!(err.status(), 422);
    assert_eq!(err.position(), Some((1, 1)));

    let err = eval_expr("concat(if(1))", &mut shop()).unwrap_err();
    assert_eq!(err.position(), Some((1, 8)));
}

// ============================================================================
// Functions
// ============================================================================

#[test]
fn test_string_functions() {
    assert_eq!(eval_simple("upper(trim('  hi '))"), Value::from("HI"));
    assert_eq!(eval_simple("size('héllo')"), Value::Integer(5));
    assert_eq!(eval_simple("length([1, 2])"), Value::Integer(2));
    assert_eq!(
        eval_simple("split('a;b', ';')"),
        json_array(vec![Value::from("a"), Value::from("b")])
    );
    assert_eq!(eval_simple("concat([1, 2], null, 'x')"), Value::from("12x"));
}

#[test]
fn test_arithmetic_is_exact() {
    assert_eq!(eval_simple("add(0.1, 0.2)"), Value::Float(0.3));
    assert_eq!(eval_simple("mult(3, '2')"), Value::Integer(6));
    assert_eq!(eval_simple("quot(1, 4)"), Value::Float(0.25));
    assert_eq!(eval_simple("subt(10, 2.5)"), Value::Float(7.5));
}

#[test]
fn test_math_namespace() {
    assert_eq!(eval_simple("math(round(2.5))"), Value::Integer(3));
    assert_eq!(eval_simple("math(floor(-1.5), abs(-4))"), Value::Integer(4));
    assert_eq!(eval_simple("math.ceil(1.1)"), Value::Integer(2));
}

#[test]
fn test_logic() {
    assert_eq!(eval_simple("and(true, 1, 'x')"), Value::Boolean(true));
    assert_eq!(eval_simple("or(false, 0, '')"), Value::Boolean(false));
    assert_eq!(eval_simple("not(empty([]))"), Value::Boolean(false));
    assert_eq!(eval_simple(r"matches('ab-12', '[a-z]+-\\d+')"), Value::Boolean(true));
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_error_function_status() {
    let err = eval_expr("concat('a', error('conflict', 409))", &mut MapContext::new())
        .unwrap_err();
    assert!(matches!(&err, Error::Eval(e) if e.message == "conflict"));
    assert_eq!(err.status(), 409);
    assert_eq!(err.position(), Some((1, 13)));

    let err = eval_expr("error('bad')", &mut MapContext::new()).unwrap_err();
    assert_eq!(err.status(), 400);
}

#[test]
fn test_parse_error_through_eval() {
    let err = eval_expr("concat(", &mut MapContext::new()).unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
    assert_eq!(err.status(), 422);
    assert_eq!(err.position(), Some((1, 8)));
}

#[test]
fn test_lenient_parse_evaluates_remaining_tokens() {
    let registry = Registry::with_builtins();
    let mut result = ParseResult::default();
    Parser::new(&registry)
        .parse_into("2 + 2", &mut result, true)
        .unwrap();

    let value = Evaluator::new()
        .evaluate(
            &result.tree,
            &mut MapContext::new(),
            &Value::Null,
            &mut EvaluationHints::new(),
        )
        .unwrap();
    assert_eq!(value, Value::Integer(2));
}

// ============================================================================
// Cache
// ============================================================================

struct Tick(AtomicUsize);

impl Function for Tick {
    fn name(&self) -> &str {
        "tick"
    }

    fn apply(&self, _: &mut dyn EvalContext, _: &Value, _: &[Value]) -> Result<Value, EvalError> {
        let n = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Value::Integer(n as i64))
    }
}

#[test]
fn test_cache_reuses_value_within_evaluator() {
    let registry = Registry::with_builtins();
    registry.register(Arc::new(Tick(AtomicUsize::new(0))), true);

    let parser = Parser::new(&registry);
    let tree = parser
        .parse("[cache('k', tick()), cache('k', tick()), cache('other', 0, tick())]")
        .unwrap();

    let mut evaluator = Evaluator::new();
    let mut ctx = MapContext::new();
    let mut hints = EvaluationHints::new();

    let first = evaluator
        .evaluate(&tree, &mut ctx, &Value::Null, &mut hints)
        .unwrap();
    assert_eq!(
        first,
        json_array(vec![Value::Integer(1), Value::Integer(1), Value::Integer(2)])
    );

    // Same evaluator, entries survive
    let again = evaluator
        .evaluate(&tree, &mut ctx, &Value::Null, &mut hints)
        .unwrap();
    assert_eq!(again, first);

    evaluator.clear_cache();
    let fresh = evaluator
        .evaluate(&tree, &mut ctx, &Value::Null, &mut hints)
        .unwrap();
    assert_eq!(
        fresh,
        json_array(vec![Value::Integer(3), Value::Integer(3), Value::Integer(4)])
    );
}

#[test]
fn test_cache_timeout_expires() {
    let registry = Registry::with_builtins();
    registry.register(Arc::new(Tick(AtomicUsize::new(0))), true);
    let tree = Parser::new(&registry)
        .parse("cache('k', 0.001, tick())")
        .unwrap();

    let mut evaluator = Evaluator::new();
    let run = |evaluator: &mut Evaluator| {
        evaluator
            .evaluate(
                &tree,
                &mut MapContext::new(),
                &Value::Null,
                &mut EvaluationHints::new(),
            )
            .unwrap()
    };

    assert_eq!(run(&mut evaluator), Value::Integer(1));
    std::thread::sleep(std::time::Duration::from_millis(20));
    assert_eq!(run(&mut evaluator), Value::Integer(2));
}

#[test]
fn test_cache_timeout_too_large_never_expires() {
    let registry = Registry::with_builtins();
    registry.register(Arc::new(Tick(AtomicUsize::new(0))), true);
    let huge = format!("1{}", "0".repeat(40));
    let source = format!(
        "[cache('a', 10000000000000000000, tick()), cache('a', tick()), \
         cache('b', {huge}, tick()), cache('b', tick())]"
    );
    let tree = Parser::new(&registry).parse(&source).unwrap();

    let value = Evaluator::new()
        .evaluate(
            &tree,
            &mut MapContext::new(),
            &Value::Null,
            &mut EvaluationHints::new(),
        )
        .unwrap();
    assert_eq!(
        value,
        json_array(vec![
            Value::Integer(1),
            Value::Integer(1),
            Value::Integer(2),
            Value::Integer(2),
        ])
    );
}

// ============================================================================
// Method calls
// ============================================================================

/// Context whose objects understand `rename(name)` and `save()`
#[derive(Default)]
struct Records {
    vars: MapContext,
    calls: Vec<String>,
}

impl EvalContext for Records {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.vars.lookup(name)
    }

    fn call_method(
        &mut self,
        target: &Value,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, EvalError> {
        self.calls.push(format!("{method}({})", args.len()));
        match method {
            "rename" => {
                let mut renamed = target.clone();
                if let Value::Object(fields) = &mut renamed {
                    fields.insert(
                        "name".into(),
                        args.first().cloned().unwrap_or_default(),
                    );
                }
                Ok(renamed)
            }
            "save" => Ok(Value::Boolean(true)),
            other => Err(EvalError::new(404, format!("no method {other}"))),
        }
    }
}

#[test]
fn test_method_on_variable() {
    let mut ctx = Records {
        vars: MapContext::new().with("me", json_object(vec![("name", Value::from("A"))])),
        ..Default::default()
    };
    assert_eq!(eval_expr("me.save()", &mut ctx).unwrap(), Value::Boolean(true));
    assert_eq!(
        eval_expr("me.rename('B').name", &mut ctx).unwrap(),
        Value::from("B")
    );
    assert_eq!(ctx.calls, vec!["save(0)", "rename(1)"]);
}

#[test]
fn test_method_on_chained_call() {
    let registry = Registry::with_builtins();
    registry.register(
        Arc::new(Builtin::new("find", "find(type)", |_, _, args| {
            Ok(json_object(vec![(
                "name",
                args.first().cloned().unwrap_or_default(),
            )]))
        })),
        true,
    );
    let tree = Parser::new(&registry)
        .parse("find('old').rename('new').name")
        .unwrap();

    let mut ctx = Records::default();
    let value = Evaluator::new()
        .evaluate(&tree, &mut ctx, &Value::Null, &mut EvaluationHints::new())
        .unwrap();
    assert_eq!(value, Value::from("new"));
    assert_eq!(ctx.calls, vec!["rename(1)"]);
}

#[test]
fn test_unknown_method_error() {
    let mut ctx = Records::default();
    let err = eval_expr("concat(me.explode())", &mut ctx).unwrap_err();
    assert_eq!(err.status(), 404);
    assert_eq!(err.position(), Some((1, 8)));

    let err = eval_expr("me.save()", &mut MapContext::new()).unwrap_err();
    assert_eq!(err.status(), 422);
}
