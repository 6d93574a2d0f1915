//! Rule registry: name → typed invocation descriptor.
//!
//! A [`Registry`] is an explicit value owned by the caller. It is shared by
//! reference with every [`Validation`] built from it, and guarded by a single
//! mutex covering both the rule table and the message templates.

use crate::error::{Result, ValidationError};
use crate::messages::Messages;
use crate::rules::{self, Validator};
use crate::validation::Validation;
use crate::value::Value;
use regex::Regex;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace, warn};

/// Names that can never be registered as rules.
pub const RESERVED_NAMES: &[&str] = &[
    "Clear", "HasErrors", "ErrorMap", "Error", "apply", "Check", "Valid", "NoMatch",
];

/// Declared kind of a rule parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Decimal integer
    Int,
    /// Raw string, passed verbatim
    Str,
    /// Compiled regular expression
    Regex,
    /// List of values; cannot be written in a tag
    List,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ParamKind::Int => "int",
            ParamKind::Str => "string",
            ParamKind::Regex => "regexp",
            ParamKind::List => "list",
        })
    }
}

/// A coerced rule parameter.
#[derive(Debug, Clone)]
pub enum Argument {
    Int(i64),
    Str(String),
    Regex(Regex),
    List(Vec<Value>),
}

impl Argument {
    pub fn kind(&self) -> ParamKind {
        match self {
            Argument::Int(_) => ParamKind::Int,
            Argument::Str(_) => ParamKind::Str,
            Argument::Regex(_) => ParamKind::Regex,
            Argument::List(_) => ParamKind::List,
        }
    }
}

impl PartialEq for Argument {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Argument::Int(a), Argument::Int(b)) => a == b,
            (Argument::Str(a), Argument::Str(b)) => a == b,
            (Argument::Regex(a), Argument::Regex(b)) => a.as_str() == b.as_str(),
            (Argument::List(a), Argument::List(b)) => a == b,
            _ => false,
        }
    }
}

impl From<i64> for Argument {
    fn from(value: i64) -> Self {
        Argument::Int(value)
    }
}

impl From<&str> for Argument {
    fn from(value: &str) -> Self {
        Argument::Str(value.to_string())
    }
}

impl From<String> for Argument {
    fn from(value: String) -> Self {
        Argument::Str(value)
    }
}

impl From<Regex> for Argument {
    fn from(value: Regex) -> Self {
        Argument::Regex(value)
    }
}

impl From<Vec<Value>> for Argument {
    fn from(value: Vec<Value>) -> Self {
        Argument::List(value)
    }
}

/// Typed, positional view over the arguments of one invocation.
#[derive(Debug, Clone, Copy)]
pub struct Arguments<'a> {
    rule: &'a str,
    args: &'a [Argument],
}

impl<'a> Arguments<'a> {
    pub fn new(rule: &'a str, args: &'a [Argument]) -> Self {
        Self { rule, args }
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&'a Argument> {
        self.args.get(index)
    }

    fn expect_kind(&self, index: usize, kind: ParamKind) -> ValidationError {
        let found = self
            .get(index)
            .map_or_else(|| "nothing".to_string(), |arg| arg.kind().to_string());
        ValidationError::parameter(self.rule, index, format!("expected {kind}, got {found}"))
    }

    pub fn int(&self, index: usize) -> Result<i64> {
        match self.get(index) {
            Some(Argument::Int(n)) => Ok(*n),
            _ => Err(self.expect_kind(index, ParamKind::Int)),
        }
    }

    /// Integer argument used as a length; negative values are rejected.
    pub fn size(&self, index: usize) -> Result<usize> {
        let n = self.int(index)?;
        usize::try_from(n).map_err(|_| {
            ValidationError::parameter(self.rule, index, format!("{n} is not a valid size"))
        })
    }

    pub fn str(&self, index: usize) -> Result<&'a str> {
        match self.get(index) {
            Some(Argument::Str(s)) => Ok(s),
            _ => Err(self.expect_kind(index, ParamKind::Str)),
        }
    }

    pub fn regex(&self, index: usize) -> Result<&'a Regex> {
        match self.get(index) {
            Some(Argument::Regex(re)) => Ok(re),
            _ => Err(self.expect_kind(index, ParamKind::Regex)),
        }
    }

    pub fn list(&self, index: usize) -> Result<&'a [Value]> {
        match self.get(index) {
            Some(Argument::List(items)) => Ok(items),
            _ => Err(self.expect_kind(index, ParamKind::List)),
        }
    }
}

type BuildFn = dyn Fn(&Arguments<'_>, &str) -> Result<Box<dyn Validator>> + Send + Sync;
type CustomFn = dyn Fn(&mut Validation, &Value, &Arguments<'_>, &str) + Send + Sync;

/// What an entry does when invoked.
#[derive(Clone)]
pub enum Handler {
    /// Builds a validator from the arguments, then applies it
    Validator(Arc<BuildFn>),
    /// Free-form rule that records its own failures on the context
    Custom(Arc<CustomFn>),
}

/// A registered rule: its parameter kinds and its handler.
#[derive(Clone)]
pub struct RuleEntry {
    params: Vec<ParamKind>,
    handler: Handler,
}

impl RuleEntry {
    /// Entry backed by a [`Validator`] constructor.
    pub fn validator<P, F>(params: P, build: F) -> Self
    where
        P: IntoIterator<Item = ParamKind>,
        F: Fn(&Arguments<'_>, &str) -> Result<Box<dyn Validator>> + Send + Sync + 'static,
    {
        Self {
            params: params.into_iter().collect(),
            handler: Handler::Validator(Arc::new(build)),
        }
    }

    /// Entry backed by a custom function.
    ///
    /// The rule counts as satisfied when the function records no error.
    pub fn custom<P, F>(params: P, rule: F) -> Self
    where
        P: IntoIterator<Item = ParamKind>,
        F: Fn(&mut Validation, &Value, &Arguments<'_>, &str) + Send + Sync + 'static,
    {
        Self {
            params: params.into_iter().collect(),
            handler: Handler::Custom(Arc::new(rule)),
        }
    }

    pub fn params(&self) -> &[ParamKind] {
        &self.params
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }
}

impl fmt::Debug for RuleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.handler {
            Handler::Validator(_) => "validator",
            Handler::Custom(_) => "custom",
        };
        f.debug_struct("RuleEntry")
            .field("params", &self.params)
            .field("handler", &kind)
            .finish()
    }
}

struct Inner {
    rules: HashMap<String, RuleEntry>,
    messages: Messages,
}

/// The rule table validations dispatch through.
///
/// ## Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use tagvalid::prelude::*;
///
/// let registry = Registry::new();
/// registry.register_fn("NotAdmin", |v, value, key| {
///     if value.as_str() == Some("admin") {
///         v.set_error(key, "is reserved");
///     }
/// })?;
///
/// let mut valid = Validation::new(Arc::new(registry));
/// ```
pub struct Registry {
    inner: Mutex<Inner>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Registry preloaded with the built-in catalog.
    pub fn new() -> Self {
        let registry = Self::empty();
        {
            let mut inner = registry.lock();
            for (name, entry) in rules::catalog() {
                inner.rules.insert(name.to_string(), entry);
            }
        }
        registry
    }

    /// Registry with no rules and the default message templates.
    pub fn empty() -> Self {
        Self {
            inner: Mutex::new(Inner {
                rules: HashMap::new(),
                messages: Messages::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace a rule.
    ///
    /// Fails with [`ValidationError::NameReserved`] for the names in
    /// [`RESERVED_NAMES`].
    pub fn register(&self, name: impl Into<String>, entry: RuleEntry) -> Result<()> {
        let name = name.into();
        if RESERVED_NAMES.contains(&name.as_str()) {
            warn!(rule = %name, "refusing to register reserved rule name");
            return Err(ValidationError::NameReserved(name));
        }
        debug!(rule = %name, arity = entry.arity(), "registering rule");
        self.lock().rules.insert(name, entry);
        Ok(())
    }

    /// Register a custom rule that takes no tag parameters.
    pub fn register_fn<F>(&self, name: impl Into<String>, rule: F) -> Result<()>
    where
        F: Fn(&mut Validation, &Value, &str) + Send + Sync + 'static,
    {
        self.register(
            name,
            RuleEntry::custom([], move |validation, value, _, key| {
                rule(validation, value, key)
            }),
        )
    }

    fn entry(&self, name: &str) -> Result<RuleEntry> {
        self.lock()
            .rules
            .get(name)
            .cloned()
            .ok_or_else(|| ValidationError::UnknownRule(name.to_string()))
    }

    /// Number of rule-specific parameters.
    pub fn arity(&self, name: &str) -> Result<usize> {
        self.entry(name).map(|entry| entry.arity())
    }

    pub fn param_kinds(&self, name: &str) -> Result<Vec<ParamKind>> {
        self.entry(name).map(|entry| entry.params)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().rules.contains_key(name)
    }

    /// Registered rule names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().rules.keys().cloned().collect();
        names.sort();
        names
    }

    /// Invoke rule `name` against `value`, recording any failure on
    /// `validation`. Returns whether the rule was satisfied.
    ///
    /// A panic inside the rule is caught and reported as
    /// [`ValidationError::Invocation`].
    pub fn invoke(
        &self,
        name: &str,
        validation: &mut Validation,
        value: &Value,
        args: &[Argument],
        key: &str,
    ) -> Result<bool> {
        let entry = self.entry(name)?;
        if args.len() != entry.arity() {
            return Err(ValidationError::arity(name, entry.arity(), args.len()));
        }
        for (index, (arg, kind)) in args.iter().zip(&entry.params).enumerate() {
            if arg.kind() != *kind {
                return Err(ValidationError::parameter(
                    name,
                    index,
                    format!("expected {kind}, got {}", arg.kind()),
                ));
            }
        }

        trace!(rule = name, key, "invoking rule");
        let arguments = Arguments::new(name, args);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<bool> {
            match &entry.handler {
                Handler::Validator(build) => {
                    let validator = build(&arguments, key)?;
                    Ok(validation.apply(validator.as_ref(), value).ok())
                }
                Handler::Custom(rule) => {
                    let before = validation.errors().len();
                    rule(validation, value, &arguments, key);
                    Ok(validation.errors().len() == before)
                }
            }
        }));

        outcome.unwrap_or_else(|payload| {
            let reason = panic_reason(payload.as_ref());
            warn!(rule = name, key, %reason, "rule panicked");
            Err(ValidationError::Invocation {
                rule: name.to_string(),
                reason,
            })
        })
    }

    /// Render the message for `name`.
    pub fn render(&self, name: &str, args: &[String]) -> Option<String> {
        self.lock().messages.render(name, args)
    }

    /// Raw template for `name`, empty when there is none.
    pub fn template(&self, name: &str) -> String {
        self.lock()
            .messages
            .get(name)
            .map(str::to_string)
            .unwrap_or_default()
    }

    pub fn messages(&self) -> Messages {
        self.lock().messages.clone()
    }

    /// Replace the message templates.
    pub fn set_messages(&self, messages: Messages) {
        debug!("replacing message templates");
        self.lock().messages = messages;
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("rules", &self.names())
            .finish()
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
