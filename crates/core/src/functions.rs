//! User-supplied functions and the per-call function context.
//!
//! A set can be configured with named functions that shape how members
//! are stored and compared:
//!
//! - **key function** - extracts a comparable key from a structured
//!   member;
//! - **transform / untransform** - an inverse pair applied at write and
//!   read time;
//! - **filter** - a predicate applied to results of `get`, `scan` and
//!   `remove`;
//! - **adjust-settings hook** - mutates the set map at create time.
//!
//! Functions live in named [`UserModule`]s inside a
//! [`UserModuleRegistry`] owned by the embedder. Descriptors store only
//! the *names*; at the top of every API call the engine resolves names
//! into a borrowed [`FunctionContext`] that is threaded explicitly
//! through search, insert, scan and remove. No function state survives
//! between calls.

use crate::descriptor::LsetMap;
use crate::error::{LdtError, Result};
use crate::value::Value;
use std::collections::HashMap;

/// Extracts a comparable key from a member value.
pub type KeyFn = dyn Fn(&Value) -> Result<Value> + Send + Sync;

/// Rewrites a member at write time (transform) or read time
/// (untransform). A registered pair must satisfy
/// `untransform(transform(v)) == v`.
pub type TransformFn = dyn Fn(Value) -> Result<Value> + Send + Sync;

/// Decides whether a member is part of a result set. The second argument
/// carries the caller-supplied filter arguments, if any.
pub type FilterFn = dyn Fn(&Value, Option<&Value>) -> Result<bool> + Send + Sync;

/// Mutates the set map at create time.
pub type SettingsFn = dyn Fn(&mut LsetMap) + Send + Sync;

/// A named bundle of user functions.
#[derive(Default)]
pub struct UserModule {
    adjust_settings: Option<Box<SettingsFn>>,
    key_functions: HashMap<String, Box<KeyFn>>,
    transforms: HashMap<String, Box<TransformFn>>,
    filters: HashMap<String, Box<FilterFn>>,
}

impl UserModule {
    /// An empty module.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the create-time settings hook.
    pub fn with_settings(mut self, f: impl Fn(&mut LsetMap) + Send + Sync + 'static) -> Self {
        self.adjust_settings = Some(Box::new(f));
        self
    }

    /// Register a named key-extraction function.
    pub fn with_key_function(
        mut self,
        name: &str,
        f: impl Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.key_functions.insert(name.to_string(), Box::new(f));
        self
    }

    /// Register a named transform (write- or read-side).
    pub fn with_transform(
        mut self,
        name: &str,
        f: impl Fn(Value) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.transforms.insert(name.to_string(), Box::new(f));
        self
    }

    /// Register a named filter predicate.
    pub fn with_filter(
        mut self,
        name: &str,
        f: impl Fn(&Value, Option<&Value>) -> Result<bool> + Send + Sync + 'static,
    ) -> Self {
        self.filters.insert(name.to_string(), Box::new(f));
        self
    }

    /// The create-time settings hook, if installed.
    pub fn settings_hook(&self) -> Option<&SettingsFn> {
        self.adjust_settings.as_deref()
    }
}

/// The embedder-owned table of user modules.
#[derive(Default)]
pub struct UserModuleRegistry {
    modules: HashMap<String, UserModule>,
}

impl UserModuleRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module under a name, replacing any previous module
    /// with that name.
    pub fn register(&mut self, name: &str, module: UserModule) {
        self.modules.insert(name.to_string(), module);
    }

    /// Look up a module.
    pub fn module(&self, name: &str) -> Option<&UserModule> {
        self.modules.get(name)
    }

    /// Look up a module, raising `UserModuleNotFound` when absent.
    pub fn require(&self, name: &str) -> Result<&UserModule> {
        self.module(name).ok_or_else(|| LdtError::UserModuleNotFound {
            module: name.to_string(),
        })
    }
}

/// A caller-supplied filter reference: function name plus optional
/// arguments.
#[derive(Debug, Clone)]
pub struct FilterSpec {
    /// Name of the filter in the set's user module.
    pub name: String,
    /// Arguments forwarded to every filter invocation.
    pub args: Option<Value>,
}

impl FilterSpec {
    /// A filter reference without arguments.
    pub fn named(name: &str) -> Self {
        FilterSpec {
            name: name.to_string(),
            args: None,
        }
    }

    /// A filter reference with arguments.
    pub fn with_args(name: &str, args: Value) -> Self {
        FilterSpec {
            name: name.to_string(),
            args: Some(args),
        }
    }
}

/// Resolved functions for one API call.
///
/// Built at the top of each entry point from the descriptor's registered
/// names plus the caller's filter reference, then passed down through
/// every routine that compares, stores or returns members.
#[derive(Default)]
pub struct FunctionContext<'a> {
    key_function: Option<&'a KeyFn>,
    transform: Option<&'a TransformFn>,
    untransform: Option<&'a TransformFn>,
    filter: Option<&'a FilterFn>,
    filter_args: Option<Value>,
}

impl<'a> std::fmt::Debug for FunctionContext<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionContext")
            .field("has_key_function", &self.key_function.is_some())
            .field("has_transform", &self.transform.is_some())
            .field("has_untransform", &self.untransform.is_some())
            .field("has_filter", &self.filter.is_some())
            .field("filter_args", &self.filter_args)
            .finish()
    }
}

impl<'a> FunctionContext<'a> {
    /// Resolve the descriptor's function names (and an optional filter
    /// reference) against the registry.
    pub fn resolve(
        registry: &'a UserModuleRegistry,
        map: &LsetMap,
        filter: Option<&FilterSpec>,
    ) -> Result<Self> {
        let needs_module = map.key_function.is_some()
            || map.transform.is_some()
            || map.untransform.is_some()
            || filter.is_some();
        if !needs_module {
            return Ok(FunctionContext::default());
        }

        let module_name = map.user_module.as_deref().ok_or_else(|| LdtError::UserModuleBad {
            module: "<none>".to_string(),
            reason: "functions are registered but the set names no user module".to_string(),
        })?;
        let module = registry.require(module_name)?;

        let lookup_transform = |name: &Option<String>| -> Result<Option<&'a TransformFn>> {
            match name {
                None => Ok(None),
                Some(n) => module
                    .transforms
                    .get(n)
                    .map(|f| Some(f.as_ref()))
                    .ok_or_else(|| LdtError::UserModuleBad {
                        module: module_name.to_string(),
                        reason: format!("no transform named '{}'", n),
                    }),
            }
        };

        let key_function = match &map.key_function {
            None => None,
            Some(n) => Some(module.key_functions.get(n).map(|f| f.as_ref()).ok_or_else(
                || LdtError::UserModuleBad {
                    module: module_name.to_string(),
                    reason: format!("no key function named '{}'", n),
                },
            )?),
        };

        let (filter_fn, filter_args) = match filter {
            None => (None, None),
            Some(spec) => {
                let f = module.filters.get(&spec.name).map(|f| f.as_ref()).ok_or_else(
                    || LdtError::UserModuleBad {
                        module: module_name.to_string(),
                        reason: format!("no filter named '{}'", spec.name),
                    },
                )?;
                (Some(f), spec.args.clone())
            }
        };

        Ok(FunctionContext {
            key_function,
            transform: lookup_transform(&map.transform)?,
            untransform: lookup_transform(&map.untransform)?,
            filter: filter_fn,
            filter_args,
        })
    }

    /// Extract the comparable key for a member value.
    ///
    /// Atomic values are their own key; otherwise a registered key
    /// function is applied; otherwise the canonical string rendering is
    /// the key.
    pub fn extract_key(&self, value: &Value) -> Result<Value> {
        if value.is_atomic() {
            return Ok(value.clone());
        }
        match self.key_function {
            Some(f) => f(value),
            None => Ok(Value::String(value.canonical_string())),
        }
    }

    /// Apply the write-side transform, if registered.
    pub fn write_form(&self, value: Value) -> Result<Value> {
        match self.transform {
            Some(f) => f(value),
            None => Ok(value),
        }
    }

    /// Apply the read-side untransform, if registered.
    pub fn read_form(&self, stored: &Value) -> Result<Value> {
        match self.untransform {
            Some(f) => f(stored.clone()),
            None => Ok(stored.clone()),
        }
    }

    /// Apply the caller's filter; members pass when no filter is set.
    pub fn passes_filter(&self, value: &Value) -> Result<bool> {
        match self.filter {
            Some(f) => f(value, self.filter_args.as_ref()),
            None => Ok(true),
        }
    }
}
