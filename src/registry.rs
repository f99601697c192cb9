//! Function registry shared by every parse and evaluation.
//!
//! The registry maps canonical (ASCII-lowercased) names and aliases to shared
//! [`Function`] handles. Reads clone an `Arc` to the current table and never
//! observe a half-written entry; writes build a new table and swap it in.

use std::{
    any::{Any, TypeId},
    collections::{HashMap, HashSet},
    fmt,
    sync::Arc,
};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::{
    error::{EvalError, NOT_LICENSED},
    evaluator::EvalContext,
    value::Value,
};

/// Upcast helper so registered functions can be found by concrete type.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A function callable from expressions.
///
/// This is the boundary to the function catalog: the expression core only
/// knows a function's names and how to apply it to evaluated arguments.
pub trait Function: AsAny + Send + Sync {
    /// Primary name, e.g. `concat` or `math.round`
    fn name(&self) -> &str;

    fn aliases(&self) -> &[&str] {
        &[]
    }

    /// Namespace pushed while resolving names inside this function's
    /// argument list
    fn namespace_identifier(&self) -> Option<&str> {
        None
    }

    /// License module this function belongs to, `None` for core functions
    fn required_module(&self) -> Option<&str> {
        None
    }

    fn usage(&self) -> &str {
        ""
    }

    fn short_description(&self) -> &str {
        ""
    }

    fn apply(
        &self,
        ctx: &mut dyn EvalContext,
        caller: &Value,
        args: &[Value],
    ) -> Result<Value, EvalError>;
}

impl fmt::Debug for dyn Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.name())
    }
}

/// Decides which modules are available.
pub trait License: Send + Sync {
    fn is_licensed(&self, module: &str) -> bool;
}

/// Every module is licensed
#[derive(Debug, Clone, Copy, Default)]
pub struct AllModules;

impl License for AllModules {
    fn is_licensed(&self, _module: &str) -> bool {
        true
    }
}

/// An explicit set of licensed modules
#[derive(Debug, Clone, Default)]
pub struct ModuleSet(HashSet<String>);

impl ModuleSet {
    pub fn new<I, S>(modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ModuleSet(modules.into_iter().map(Into::into).collect())
    }
}

impl License for ModuleSet {
    fn is_licensed(&self, module: &str) -> bool {
        self.0.contains(module)
    }
}

/// Stand-in registered for a function whose module is not licensed.
/// Resolves like the real function, fails when applied.
struct Unlicensed {
    inner: Arc<dyn Function>,
    module: String,
}

impl Function for Unlicensed {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn aliases(&self) -> &[&str] {
        self.inner.aliases()
    }

    fn namespace_identifier(&self) -> Option<&str> {
        self.inner.namespace_identifier()
    }

    fn required_module(&self) -> Option<&str> {
        Some(&self.module)
    }

    fn usage(&self) -> &str {
        self.inner.usage()
    }

    fn short_description(&self) -> &str {
        self.inner.short_description()
    }

    fn apply(&self, _: &mut dyn EvalContext, _: &Value, _: &[Value]) -> Result<Value, EvalError> {
        Err(EvalError::new(
            NOT_LICENSED,
            format!(
                "{}() is not available, module {} is not licensed",
                self.inner.name(),
                self.module
            ),
        ))
    }
}

/// One call to `register`: the function as given, and the handle installed
/// for it (an [`Unlicensed`] stand-in when its module is not licensed)
#[derive(Clone)]
struct Registration {
    function: Arc<dyn Function>,
    handle: Arc<dyn Function>,
}

#[derive(Clone, Default)]
struct Table {
    /// canonical name or alias -> handle used for calls
    by_name: HashMap<String, Arc<dyn Function>>,
    /// Registrations in order, minus those every later one fully shadows
    registrations: Vec<Registration>,
    /// Declared names and aliases, insertion ordered
    names: Vec<String>,
}

fn declared_names(function: &dyn Function) -> impl Iterator<Item = &str> {
    std::iter::once(function.name()).chain(function.aliases().iter().copied())
}

impl Table {
    fn insert(&mut self, function: Arc<dyn Function>, license: &dyn License) -> bool {
        let licensed = function
            .required_module()
            .is_none_or(|module| license.is_licensed(module));

        let handle: Arc<dyn Function> = match function.required_module() {
            Some(module) if !licensed => Arc::new(Unlicensed {
                inner: Arc::clone(&function),
                module: module.to_string(),
            }),
            _ => Arc::clone(&function),
        };

        let keys: HashSet<String> = declared_names(function.as_ref())
            .map(Registry::canonical)
            .collect();
        self.registrations.retain(|earlier| {
            !declared_names(earlier.function.as_ref())
                .all(|name| keys.contains(&Registry::canonical(name)))
        });

        for name in declared_names(function.as_ref()) {
            self.by_name
                .insert(Registry::canonical(name), Arc::clone(&handle));
            if !self.names.iter().any(|n| n == name) {
                self.names.push(name.to_string());
            }
        }
        self.registrations.push(Registration { function, handle });
        licensed
    }

    /// Whether the registration still answers to its primary name
    fn is_live(&self, registration: &Registration) -> bool {
        self.by_name
            .get(&Registry::canonical(registration.function.name()))
            .is_some_and(|h| Arc::ptr_eq(h, &registration.handle))
    }
}

/// Name table for all functions known to the expression language.
///
/// # Examples
///
/// ```
/// use tarragon::registry::Registry;
///
/// let registry = Registry::with_builtins();
/// assert!(registry.get("concat").is_some());
/// assert!(registry.get("CONCAT").is_some());
/// assert!(registry.get("no_such_function").is_none());
/// ```
pub struct Registry {
    table: RwLock<Arc<Table>>,
    license: RwLock<Arc<dyn License>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("names", &self.get_names())
            .finish()
    }
}

impl Registry {
    /// An empty registry with every module licensed
    pub fn new() -> Self {
        Self::with_license(Arc::new(AllModules))
    }

    pub fn with_license(license: Arc<dyn License>) -> Self {
        Registry {
            table: RwLock::new(Arc::new(Table::default())),
            license: RwLock::new(license),
        }
    }

    /// A registry holding the standard function set
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_all(crate::functions::builtins(), true);
        registry
    }

    /// Key used for lookups
    pub fn canonical(name: &str) -> String {
        name.to_ascii_lowercase()
    }

    fn snapshot(&self) -> Arc<Table> {
        Arc::clone(&self.table.read())
    }

    /// Register a function under its name and aliases. Later registrations
    /// of the same name win.
    pub fn register(&self, function: Arc<dyn Function>, warn_if_unlicensed: bool) {
        self.register_all([function], warn_if_unlicensed);
    }

    /// Register several functions with a single table swap
    pub fn register_all<I>(&self, functions: I, warn_if_unlicensed: bool)
    where
        I: IntoIterator<Item = Arc<dyn Function>>,
    {
        let license = Arc::clone(&self.license.read());
        let mut guard = self.table.write();
        let mut table = (**guard).clone();

        for function in functions {
            let licensed = table.insert(Arc::clone(&function), license.as_ref());
            if !licensed && warn_if_unlicensed {
                warn!(
                    function = function.name(),
                    module = function.required_module().unwrap_or_default(),
                    "function registered without license"
                );
            }
            debug!(function = function.name(), licensed, "registered function");
        }

        *guard = Arc::new(table);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.snapshot().by_name.get(&Self::canonical(name)).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.snapshot().by_name.contains_key(&Self::canonical(name))
    }

    /// First registered function whose concrete type is `T` and that still
    /// answers to its primary name
    pub fn get_by_type<T: Function + 'static>(&self) -> Option<Arc<dyn Function>> {
        self.get_by_type_id(TypeId::of::<T>())
    }

    pub fn get_by_type_id(&self, type_id: TypeId) -> Option<Arc<dyn Function>> {
        let table = self.snapshot();
        table
            .registrations
            .iter()
            .filter(|r| r.function.as_ref().as_any().type_id() == type_id)
            .find(|r| table.is_live(r))
            .map(|r| Arc::clone(&r.handle))
    }

    /// Declared names and aliases in registration order. The returned vector
    /// is a copy.
    pub fn get_names(&self) -> Vec<String> {
        self.snapshot().names.clone()
    }

    /// Install a new license and replay every registration against it, in
    /// the order they were made. Readers see either the old or the new table.
    pub fn refresh(&self, license: Arc<dyn License>) {
        let mut guard = self.table.write();
        *self.license.write() = Arc::clone(&license);

        let mut table = Table {
            names: guard.names.clone(),
            ..Table::default()
        };
        for registration in &guard.registrations {
            table.insert(Arc::clone(&registration.function), license.as_ref());
        }
        debug!(
            count = table.registrations.len(),
            "refreshed function registry"
        );
        *guard = Arc::new(table);
    }
}
