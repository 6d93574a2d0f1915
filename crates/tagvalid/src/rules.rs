//! The validator contract and the built-in rule catalog.
//!
//! Every rule is a small immutable value holding its configured parameters
//! and the key it reports under. `is_satisfied` is a pure predicate over a
//! [`Value`]; recording the failure is the context's job.

use crate::messages::Messages;
use crate::registry::{ParamKind, RuleEntry};
use crate::value::Value;
use chrono::format::{Parsed, StrftimeItems};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use regex::Regex;
use std::fmt::Debug;
use std::sync::OnceLock;

static ALPHA_DASH_REGEX: OnceLock<Regex> = OnceLock::new();
static BASE64_REGEX: OnceLock<Regex> = OnceLock::new();
static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
static POSITIVE_FLOAT_REGEX: OnceLock<Regex> = OnceLock::new();
static PHONE_REGEX: OnceLock<Regex> = OnceLock::new();
static NAME_REGEX: OnceLock<Regex> = OnceLock::new();

fn alpha_dash_regex() -> &'static Regex {
    ALPHA_DASH_REGEX.get_or_init(|| Regex::new(r"[^0-9A-Za-z_-]").unwrap())
}

fn base64_regex() -> &'static Regex {
    BASE64_REGEX.get_or_init(|| {
        Regex::new(r"^(?:[A-Za-z0-9+/]{4})*(?:[A-Za-z0-9+/]{2}==|[A-Za-z0-9+/]{3}=)?$").unwrap()
    })
}

fn email_regex() -> &'static Regex {
    EMAIL_REGEX.get_or_init(|| {
        Regex::new(
            r"[A-Za-z0-9_!#$%&'*+/=?^`{|}~-]+(?:\.[A-Za-z0-9_!#$%&'*+/=?^`{|}~-]+)*@(?:[A-Za-z0-9_](?:[A-Za-z0-9_-]*[A-Za-z0-9_])?\.)+[a-zA-Z0-9](?:[A-Za-z0-9_-]*[A-Za-z0-9_])?",
        )
        .unwrap()
    })
}

fn positive_float_regex() -> &'static Regex {
    POSITIVE_FLOAT_REGEX.get_or_init(|| Regex::new(r"^[0-9.]").unwrap())
}

fn phone_regex() -> &'static Regex {
    PHONE_REGEX.get_or_init(|| {
        Regex::new(r"^(\+?[0-9][1-9][\t\n\f\r ]*-?|[0-9]{2}[1-9])?[\t\n\f\r ]*[0-9]([- ]?[0-9]){4,}$")
            .unwrap()
    })
}

fn name_regex() -> &'static Regex {
    NAME_REGEX.get_or_init(|| Regex::new(r#"^[a-zA-Z ".-]+$"#).unwrap())
}

/// Contract every rule implements.
///
/// ## Example
///
/// ```rust,ignore
/// use tagvalid::prelude::*;
///
/// #[derive(Debug)]
/// struct Even { key: String }
///
/// impl Validator for Even {
///     fn is_satisfied(&self, value: &Value) -> bool {
///         value.as_integer().map_or(false, |n| n % 2 == 0)
///     }
///     fn name(&self) -> &str { "Even" }
///     fn key(&self) -> &str { &self.key }
///     fn default_message(&self) -> String { "must be even".into() }
/// }
/// ```
pub trait Validator: Debug + Send + Sync {
    fn is_satisfied(&self, value: &Value) -> bool;

    /// Rule name, used to look up the message template.
    fn name(&self) -> &str;

    /// Key the failure is reported under.
    fn key(&self) -> &str;

    /// Positional arguments for the message template.
    fn message_args(&self) -> Vec<String> {
        Vec::new()
    }

    fn default_message(&self) -> String {
        Messages::builtin()
            .render(self.name(), &self.message_args())
            .unwrap_or_else(|| format!("does not satisfy {}", self.name()))
    }

    fn limit_value(&self) -> Option<Value> {
        None
    }

    /// Presence rules run even on empty values; everything else is skipped.
    fn checks_presence(&self) -> bool {
        false
    }
}

macro_rules! keyed {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            pub key: String,
        }

        impl $name {
            pub fn new(key: impl Into<String>) -> Self {
                Self { key: key.into() }
            }
        }
    };
}

keyed!(
    /// Non-nil and non-empty.
    Required
);

impl Validator for Required {
    fn is_satisfied(&self, value: &Value) -> bool {
        value.is_present()
    }

    fn name(&self) -> &str {
        "Required"
    }

    fn key(&self) -> &str {
        &self.key
    }

    fn checks_presence(&self) -> bool {
        true
    }
}

/// Integer no smaller than `min`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Min {
    pub min: i64,
    pub key: String,
}

impl Min {
    pub fn new(min: i64, key: impl Into<String>) -> Self {
        Self {
            min,
            key: key.into(),
        }
    }
}

impl Validator for Min {
    fn is_satisfied(&self, value: &Value) -> bool {
        value
            .as_integer()
            .map_or(false, |n| n >= i128::from(self.min))
    }

    fn name(&self) -> &str {
        "Min"
    }

    fn key(&self) -> &str {
        &self.key
    }

    fn message_args(&self) -> Vec<String> {
        vec![self.min.to_string()]
    }

    fn limit_value(&self) -> Option<Value> {
        Some(Value::Int(self.min))
    }
}

/// Integer no larger than `max`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Max {
    pub max: i64,
    pub key: String,
}

impl Max {
    pub fn new(max: i64, key: impl Into<String>) -> Self {
        Self {
            max,
            key: key.into(),
        }
    }
}

impl Validator for Max {
    fn is_satisfied(&self, value: &Value) -> bool {
        value
            .as_integer()
            .map_or(false, |n| n <= i128::from(self.max))
    }

    fn name(&self) -> &str {
        "Max"
    }

    fn key(&self) -> &str {
        &self.key
    }

    fn message_args(&self) -> Vec<String> {
        vec![self.max.to_string()]
    }

    fn limit_value(&self) -> Option<Value> {
        Some(Value::Int(self.max))
    }
}

/// Integer within `min..=max`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    pub min: Min,
    pub max: Max,
    pub key: String,
}

impl Range {
    pub fn new(min: i64, max: i64, key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            min: Min::new(min, key.clone()),
            max: Max::new(max, key.clone()),
            key,
        }
    }
}

impl Validator for Range {
    fn is_satisfied(&self, value: &Value) -> bool {
        self.min.is_satisfied(value) && self.max.is_satisfied(value)
    }

    fn name(&self) -> &str {
        "Range"
    }

    fn key(&self) -> &str {
        &self.key
    }

    fn message_args(&self) -> Vec<String> {
        vec![self.min.min.to_string(), self.max.max.to_string()]
    }

    fn limit_value(&self) -> Option<Value> {
        Some(Value::List(vec![
            Value::Int(self.min.min),
            Value::Int(self.max.max),
        ]))
    }
}

macro_rules! size_rule {
    ($(#[$doc:meta])* $name:ident, $field:ident, $cmp:tt) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            pub $field: usize,
            pub key: String,
        }

        impl $name {
            pub fn new($field: usize, key: impl Into<String>) -> Self {
                Self {
                    $field,
                    key: key.into(),
                }
            }
        }

        impl Validator for $name {
            fn is_satisfied(&self, value: &Value) -> bool {
                value.size().map_or(false, |len| len $cmp self.$field)
            }

            fn name(&self) -> &str {
                stringify!($name)
            }

            fn key(&self) -> &str {
                &self.key
            }

            fn message_args(&self) -> Vec<String> {
                vec![self.$field.to_string()]
            }

            fn limit_value(&self) -> Option<Value> {
                Some(Value::Int(self.$field as i64))
            }
        }
    };
}

size_rule!(
    /// String or list at least `min` long.
    MinSize, min, >=
);
size_rule!(
    /// String or list at most `max` long.
    MaxSize, max, <=
);
size_rule!(
    /// String or list exactly `n` long.
    Length, n, ==
);

macro_rules! string_rule {
    ($(#[$doc:meta])* $name:ident, |$s:ident| $body:expr) => {
        keyed!($(#[$doc])* $name);

        impl Validator for $name {
            fn is_satisfied(&self, value: &Value) -> bool {
                match value.as_str() {
                    Some($s) => $body,
                    None => false,
                }
            }

            fn name(&self) -> &str {
                stringify!($name)
            }

            fn key(&self) -> &str {
                &self.key
            }
        }
    };
}

string_rule!(
    /// ASCII letters only.
    Alpha,
    |s| s.chars().all(|c| c.is_ascii_alphabetic())
);
string_rule!(
    /// ASCII digits only, without a leading zero.
    Numeric,
    |s| !(s.starts_with('0') && s.len() > 1) && s.chars().all(|c| c.is_ascii_digit())
);
string_rule!(
    /// ASCII letters and digits only.
    AlphaNumeric,
    |s| s.chars().all(|c| c.is_ascii_alphanumeric())
);
string_rule!(
    /// Parses as a decimal or integer number.
    Float,
    |s| s.parse::<f64>().is_ok()
);

/// String form of the value matches `regex`.
#[derive(Debug, Clone)]
pub struct Match {
    pub regex: Regex,
    pub key: String,
}

impl Match {
    pub fn new(regex: Regex, key: impl Into<String>) -> Self {
        Self {
            regex,
            key: key.into(),
        }
    }
}

impl Validator for Match {
    fn is_satisfied(&self, value: &Value) -> bool {
        self.regex.is_match(&value.to_string())
    }

    fn name(&self) -> &str {
        "Match"
    }

    fn key(&self) -> &str {
        &self.key
    }

    fn message_args(&self) -> Vec<String> {
        vec![self.regex.as_str().to_string()]
    }

    fn limit_value(&self) -> Option<Value> {
        Some(Value::str(self.regex.as_str()))
    }
}

/// String form of the value does not match `regex`.
#[derive(Debug, Clone)]
pub struct NoMatch {
    pub regex: Regex,
    pub key: String,
}

impl NoMatch {
    pub fn new(regex: Regex, key: impl Into<String>) -> Self {
        Self {
            regex,
            key: key.into(),
        }
    }
}

impl Validator for NoMatch {
    fn is_satisfied(&self, value: &Value) -> bool {
        !self.regex.is_match(&value.to_string())
    }

    fn name(&self) -> &str {
        "NoMatch"
    }

    fn key(&self) -> &str {
        &self.key
    }

    fn message_args(&self) -> Vec<String> {
        vec![self.regex.as_str().to_string()]
    }

    fn limit_value(&self) -> Option<Value> {
        Some(Value::str(self.regex.as_str()))
    }
}

macro_rules! pattern_rule {
    ($(#[$doc:meta])* $name:ident, $rule:literal, $regex:ident, $matches:literal) => {
        keyed!($(#[$doc])* $name);

        impl Validator for $name {
            fn is_satisfied(&self, value: &Value) -> bool {
                $regex().is_match(&value.to_string()) == $matches
            }

            fn name(&self) -> &str {
                $rule
            }

            fn key(&self) -> &str {
                &self.key
            }
        }
    };
}

pattern_rule!(
    /// Letters, digits, `-` and `_` only.
    AlphaDash, "AlphaDash", alpha_dash_regex, false
);
pattern_rule!(
    /// Standard base64 alphabet with padding.
    Base64, "Base64", base64_regex, true
);
pattern_rule!(Email, "Email", email_regex, true);
pattern_rule!(
    /// Starts with a digit or a dot.
    PositiveFloat, "PositiveFloat", positive_float_regex, true
);
pattern_rule!(Phone, "Phone", phone_regex, true);
pattern_rule!(
    /// Letters, spaces, quotes, dots and dashes.
    Name, "Name", name_regex, true
);

/// Parse `input` with a chrono strftime `format`.
///
/// Parts the format leaves out are defaulted: the date to `0000-01-01`
/// (filling day, then month, then year), the time to midnight. A parsed
/// offset converts the result to UTC.
pub fn parse_time(input: &str, format: &str) -> Option<NaiveDateTime> {
    let mut parsed = Parsed::new();
    chrono::format::parse(&mut parsed, input, StrftimeItems::new(format)).ok()?;
    if let Ok(dt) = parsed.to_datetime() {
        return Some(dt.naive_utc());
    }

    let local = date_with_defaults(&parsed)?.and_time(time_with_defaults(&parsed)?);
    match parsed.to_fixed_offset() {
        Ok(offset) => offset
            .from_local_datetime(&local)
            .single()
            .map(|dt| dt.naive_utc()),
        Err(_) => Some(local),
    }
}

// setters fail when the part was already parsed; that value is kept
fn date_with_defaults(parsed: &Parsed) -> Option<NaiveDate> {
    let defaults: [fn(&mut Parsed); 3] = [
        |p| {
            let _ = p.set_day(1);
        },
        |p| {
            let _ = p.set_month(1);
        },
        |p| {
            let _ = p.set_year(0);
        },
    ];
    let mut parsed = parsed.clone();
    if let Ok(date) = parsed.to_naive_date() {
        return Some(date);
    }
    for default in defaults {
        default(&mut parsed);
        if let Ok(date) = parsed.to_naive_date() {
            return Some(date);
        }
    }
    None
}

fn time_with_defaults(parsed: &Parsed) -> Option<NaiveTime> {
    let defaults: [fn(&mut Parsed); 2] = [
        |p| {
            let _ = p.set_minute(0);
        },
        |p| {
            let _ = p.set_hour(0);
        },
    ];
    let mut parsed = parsed.clone();
    if let Ok(time) = parsed.to_naive_time() {
        return Some(time);
    }
    for default in defaults {
        default(&mut parsed);
        if let Ok(time) = parsed.to_naive_time() {
            return Some(time);
        }
    }
    None
}

/// String parses with `format`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsDate {
    pub format: String,
    pub key: String,
}

impl IsDate {
    pub fn new(format: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            key: key.into(),
        }
    }
}

impl Validator for IsDate {
    fn is_satisfied(&self, value: &Value) -> bool {
        value
            .as_str()
            .map_or(false, |s| parse_time(s, &self.format).is_some())
    }

    fn name(&self) -> &str {
        "IsDate"
    }

    fn key(&self) -> &str {
        &self.key
    }

    fn message_args(&self) -> Vec<String> {
        vec![self.format.clone()]
    }
}

/// Date string not earlier than `reference`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateBefore {
    pub reference: String,
    pub format: String,
    pub key: String,
}

impl DateBefore {
    pub fn new(
        reference: impl Into<String>,
        format: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            reference: reference.into(),
            format: format.into(),
            key: key.into(),
        }
    }
}

impl Validator for DateBefore {
    fn is_satisfied(&self, value: &Value) -> bool {
        let Some(s) = value.as_str() else {
            return false;
        };
        match (
            parse_time(&self.reference, &self.format),
            parse_time(s, &self.format),
        ) {
            (Some(reference), Some(date)) => date >= reference,
            _ => false,
        }
    }

    fn name(&self) -> &str {
        "DateBefore"
    }

    fn key(&self) -> &str {
        &self.key
    }

    fn message_args(&self) -> Vec<String> {
        vec![self.reference.clone()]
    }
}

/// Value equals one of `haystack`.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceMatch {
    pub haystack: Vec<Value>,
    pub key: String,
}

impl SliceMatch {
    pub fn new(haystack: Vec<Value>, key: impl Into<String>) -> Self {
        Self {
            haystack,
            key: key.into(),
        }
    }
}

impl Validator for SliceMatch {
    fn is_satisfied(&self, value: &Value) -> bool {
        self.haystack.iter().any(|candidate| candidate == value)
    }

    fn name(&self) -> &str {
        "SliceMatch"
    }

    fn key(&self) -> &str {
        &self.key
    }

    fn message_args(&self) -> Vec<String> {
        let options: Vec<String> = self.haystack.iter().map(Value::to_string).collect();
        vec![options.join(" | ")]
    }
}

/// No two records in a list share a non-empty value on `monitor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duplicate {
    pub monitor: String,
    pub key: String,
}

impl Duplicate {
    pub fn new(monitor: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            monitor: monitor.into(),
            key: key.into(),
        }
    }
}

impl Validator for Duplicate {
    fn is_satisfied(&self, value: &Value) -> bool {
        let Some(items) = value.as_list() else {
            return false;
        };
        let mut seen: Vec<&Value> = Vec::with_capacity(items.len());
        for item in items {
            let Some(monitored) = item.field(&self.monitor) else {
                continue;
            };
            if matches!(monitored, Value::Str(s) if s.is_empty()) {
                continue;
            }
            if seen.contains(&monitored) {
                return false;
            }
            seen.push(monitored);
        }
        true
    }

    fn name(&self) -> &str {
        "Duplicate"
    }

    fn key(&self) -> &str {
        &self.key
    }
}

/// Records in a list carry `field` values 1, 2, 3, … in some order.
///
/// The caller's data is never reordered; sequence numbers are sorted in a
/// scratch buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incremental {
    pub field: String,
    pub key: String,
}

impl Incremental {
    pub fn new(field: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            key: key.into(),
        }
    }
}

fn sequence_number(value: Option<&Value>) -> i128 {
    match value {
        Some(Value::Str(s)) => s.trim().parse::<i64>().map_or(0, i128::from),
        Some(other) => other.as_integer().unwrap_or(0),
        None => 0,
    }
}

impl Validator for Incremental {
    fn is_satisfied(&self, value: &Value) -> bool {
        let Some(items) = value.as_list() else {
            return false;
        };
        let mut sequence: Vec<i128> = items
            .iter()
            .map(|item| sequence_number(item.field(&self.field)))
            .collect();
        sequence.sort_unstable();
        sequence.iter().zip(1i128..).all(|(n, expected)| *n == expected)
    }

    fn name(&self) -> &str {
        "Incremental"
    }

    fn key(&self) -> &str {
        &self.key
    }
}

fn boxed<V: Validator + 'static>(validator: V) -> Box<dyn Validator> {
    Box::new(validator)
}

/// The rule table a fresh [`Registry`](crate::Registry) starts with.
pub(crate) fn catalog() -> Vec<(&'static str, RuleEntry)> {
    use ParamKind::{Int, List, Regex as Pattern, Str};

    vec![
        ("Required", RuleEntry::validator([], |_, key| Ok(boxed(Required::new(key))))),
        ("Min", RuleEntry::validator([Int], |a, key| Ok(boxed(Min::new(a.int(0)?, key))))),
        ("Max", RuleEntry::validator([Int], |a, key| Ok(boxed(Max::new(a.int(0)?, key))))),
        (
            "Range",
            RuleEntry::validator([Int, Int], |a, key| {
                Ok(boxed(Range::new(a.int(0)?, a.int(1)?, key)))
            }),
        ),
        (
            "MinSize",
            RuleEntry::validator([Int], |a, key| Ok(boxed(MinSize::new(a.size(0)?, key)))),
        ),
        (
            "MaxSize",
            RuleEntry::validator([Int], |a, key| Ok(boxed(MaxSize::new(a.size(0)?, key)))),
        ),
        (
            "Length",
            RuleEntry::validator([Int], |a, key| Ok(boxed(Length::new(a.size(0)?, key)))),
        ),
        ("Alpha", RuleEntry::validator([], |_, key| Ok(boxed(Alpha::new(key))))),
        ("Numeric", RuleEntry::validator([], |_, key| Ok(boxed(Numeric::new(key))))),
        ("Float", RuleEntry::validator([], |_, key| Ok(boxed(Float::new(key))))),
        (
            "AlphaNumeric",
            RuleEntry::validator([], |_, key| Ok(boxed(AlphaNumeric::new(key)))),
        ),
        (
            "Match",
            RuleEntry::validator([Pattern], |a, key| {
                Ok(boxed(Match::new(a.regex(0)?.clone(), key)))
            }),
        ),
        ("AlphaDash", RuleEntry::validator([], |_, key| Ok(boxed(AlphaDash::new(key))))),
        ("Base64", RuleEntry::validator([], |_, key| Ok(boxed(Base64::new(key))))),
        (
            "IsDate",
            RuleEntry::validator([Str], |a, key| Ok(boxed(IsDate::new(a.str(0)?, key)))),
        ),
        (
            "DateBefore",
            RuleEntry::validator([Str, Str], |a, key| {
                Ok(boxed(DateBefore::new(a.str(0)?, a.str(1)?, key)))
            }),
        ),
        (
            "SliceMatch",
            RuleEntry::validator([List], |a, key| {
                Ok(boxed(SliceMatch::new(a.list(0)?.to_vec(), key)))
            }),
        ),
        (
            "Duplicate",
            RuleEntry::validator([Str], |a, key| Ok(boxed(Duplicate::new(a.str(0)?, key)))),
        ),
        (
            "Incremental",
            RuleEntry::validator([Str], |a, key| Ok(boxed(Incremental::new(a.str(0)?, key)))),
        ),
        ("Email", RuleEntry::validator([], |_, key| Ok(boxed(Email::new(key))))),
        (
            "PositiveFloat",
            RuleEntry::validator([], |_, key| Ok(boxed(PositiveFloat::new(key)))),
        ),
        ("Phone", RuleEntry::validator([], |_, key| Ok(boxed(Phone::new(key))))),
        ("PhoneNumber", RuleEntry::validator([], |_, key| Ok(boxed(Phone::new(key))))),
        ("Name", RuleEntry::validator([], |_, key| Ok(boxed(Name::new(key))))),
    ]
}
