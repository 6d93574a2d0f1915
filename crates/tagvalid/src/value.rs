//! Dynamic value model and the schema traits validated types implement.
//!
//! Rules never see concrete Rust types. Every field is lowered into a
//! [`Value`] before a rule runs, and records describe their own layout
//! through [`Record::fields`], so the engine needs no runtime reflection.

use crate::validation::Validation;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::fmt;

/// A dynamically-typed field value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent value (`None`, null reference)
    #[default]
    Nil,
    Bool(bool),
    /// Any signed integer width
    Int(i64),
    /// Any unsigned integer width
    Uint(u64),
    Float(f64),
    Str(String),
    Time(NaiveDateTime),
    List(Vec<Value>),
    /// A record lowered into `(field, value)` pairs in declaration order
    Struct(Vec<(String, Value)>),
}

impl Value {
    /// Build a string value.
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// Build a struct value from `(field, value)` pairs.
    pub fn record<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Struct(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view of the value; only `Int` and `Uint` qualify.
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            Value::Int(i) => Some(i128::from(*i)),
            Value::Uint(u) => Some(i128::from(*u)),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Size used by the size rules: codepoints for strings, elements for lists.
    pub fn size(&self) -> Option<usize> {
        match self {
            Value::Str(s) => Some(s.chars().count()),
            Value::List(items) => Some(items.len()),
            _ => None,
        }
    }

    /// Look up a named field of a struct value.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Struct(fields) => fields.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// The empty-check policy applied before every rule except `Required`.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Nil => true,
            Value::Str(s) => s.trim().is_empty(),
            Value::Int(i) => *i == 0,
            Value::Uint(u) => *u == 0,
            Value::Float(f) => *f == 0.0,
            Value::Time(t) => is_zero_time(t),
            Value::List(items) => items.is_empty(),
            Value::Bool(_) | Value::Struct(_) => false,
        }
    }

    /// Presence as judged by `Required`.
    ///
    /// Unlike [`is_blank`](Self::is_blank), whitespace-only strings count as
    /// present and booleans are always present.
    pub fn is_present(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Str(s) => !s.is_empty(),
            Value::Bool(_) => true,
            Value::Int(i) => *i != 0,
            Value::Uint(u) => *u != 0,
            Value::Float(f) => *f != 0.0,
            Value::Time(t) => !is_zero_time(t),
            Value::List(items) => !items.is_empty(),
            Value::Struct(_) => true,
        }
    }
}

/// `0001-01-01 00:00:00`, the time a field holds before it is set.
pub fn zero_time() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
}

pub fn is_zero_time(t: &NaiveDateTime) -> bool {
    zero_time().is_some_and(|zero| *t == zero)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("<nil>"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Uint(u) => write!(f, "{u}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
            Value::Time(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Struct(fields) => {
                f.write_str("{")?;
                for (i, (_, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Nil => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Uint(u) => serializer.serialize_u64(*u),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Time(t) => t.serialize(serializer),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Struct(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

/// How the struct walker should treat a value it finds in a field.
pub enum Node<'a> {
    Nil,
    Scalar,
    /// Time values are never descended into
    Time,
    Record(&'a dyn Record),
    /// A list whose elements are records
    Records(Vec<&'a dyn Record>),
}

impl<'a> Node<'a> {
    pub fn as_record(&self) -> Option<&'a dyn Record> {
        match self {
            Node::Record(r) => Some(*r),
            _ => None,
        }
    }
}

/// A type that can be lowered into a [`Value`].
///
/// Implemented for the primitive types, strings, chrono times, `Option`,
/// `Vec` and slices. `#[derive(Record)]` implements it for records.
pub trait Reflect {
    fn to_value(&self) -> Value;

    fn node(&self) -> Node<'_> {
        Node::Scalar
    }
}

/// Validation-relevant metadata attached to a field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldTags<'a> {
    /// Rule string, e.g. `Required;Range(1,140)`
    pub valid: &'a str,
    /// JSON naming tag, e.g. `age,omitempty`
    pub json: &'a str,
    /// Display-name override
    pub alias: &'a str,
}

/// One declared field of a record.
pub struct Field<'a> {
    pub name: &'a str,
    pub tags: FieldTags<'a>,
    pub value: &'a dyn Reflect,
    /// Only exported fields are eligible for recursive validation
    pub exported: bool,
    /// Sub-fields of an inline record are promoted into the parent
    pub inline: bool,
}

impl<'a> Field<'a> {
    pub fn new(name: &'a str, value: &'a dyn Reflect) -> Self {
        Self {
            name,
            tags: FieldTags::default(),
            value,
            exported: true,
            inline: false,
        }
    }

    /// Set the rule string.
    pub fn rules(mut self, rules: &'a str) -> Self {
        self.tags.valid = rules;
        self
    }

    pub fn json(mut self, json: &'a str) -> Self {
        self.tags.json = json;
        self
    }

    pub fn alias(mut self, alias: &'a str) -> Self {
        self.tags.alias = alias;
        self
    }

    pub fn inline(mut self) -> Self {
        self.inline = true;
        self
    }

    pub fn private(mut self) -> Self {
        self.exported = false;
        self
    }
}

impl fmt::Debug for Field<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field("value", &self.value.to_value())
            .field("exported", &self.exported)
            .field("inline", &self.inline)
            .finish()
    }
}

/// A validatable record: an explicit schema of its fields.
///
/// Usually derived:
///
/// ```rust,ignore
/// use tagvalid::Record;
///
/// #[derive(Record)]
/// struct User {
///     #[valid("Required;Match(/^\\w+@\\w+\\.com$/)")]
///     email: String,
///     #[valid(rules = "Required;Range(1,140)", json = "age,omitempty")]
///     age: i32,
/// }
/// ```
pub trait Record {
    /// Name used in log events and error messages.
    fn type_name(&self) -> &'static str;

    fn fields(&self) -> Vec<Field<'_>>;

    /// Self-validation hook, run once after the declared fields pass.
    fn check(&self, _validation: &mut Validation) {}
}

/// Lower a record into a [`Value::Struct`], promoting inline sub-fields.
pub fn record_value(record: &dyn Record) -> Value {
    let mut out = Vec::new();
    collect_fields(record, &mut out);
    Value::Struct(out)
}

fn collect_fields(record: &dyn Record, out: &mut Vec<(String, Value)>) {
    for field in record.fields() {
        if field.inline {
            if let Some(inner) = field.value.node().as_record() {
                collect_fields(inner, out);
                continue;
            }
        }
        out.push((field.name.to_string(), field.value.to_value()));
    }
}

macro_rules! reflect_int {
    ($variant:ident, $wide:ty, $($t:ty),*) => {
        $(
            impl Reflect for $t {
                fn to_value(&self) -> Value {
                    Value::$variant(*self as $wide)
                }
            }
        )*
    };
}

reflect_int!(Int, i64, i8, i16, i32, i64, isize);
reflect_int!(Uint, u64, u8, u16, u32, u64, usize);

impl Reflect for f32 {
    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }
}

impl Reflect for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl Reflect for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl Reflect for str {
    fn to_value(&self) -> Value {
        Value::Str(self.to_string())
    }
}

impl Reflect for String {
    fn to_value(&self) -> Value {
        Value::Str(self.clone())
    }
}

impl Reflect for char {
    fn to_value(&self) -> Value {
        Value::Str(self.to_string())
    }
}

impl Reflect for NaiveDateTime {
    fn to_value(&self) -> Value {
        Value::Time(*self)
    }

    fn node(&self) -> Node<'_> {
        Node::Time
    }
}

impl Reflect for NaiveDate {
    fn to_value(&self) -> Value {
        self.and_hms_opt(0, 0, 0).map(Value::Time).unwrap_or(Value::Nil)
    }

    fn node(&self) -> Node<'_> {
        Node::Time
    }
}

impl<Tz: TimeZone> Reflect for DateTime<Tz> {
    fn to_value(&self) -> Value {
        Value::Time(self.naive_utc())
    }

    fn node(&self) -> Node<'_> {
        Node::Time
    }
}

impl Reflect for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }

    fn node(&self) -> Node<'_> {
        match self {
            Value::Nil => Node::Nil,
            Value::Time(_) => Node::Time,
            _ => Node::Scalar,
        }
    }
}

impl<T: Reflect> Reflect for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(inner) => inner.to_value(),
            None => Value::Nil,
        }
    }

    fn node(&self) -> Node<'_> {
        match self {
            Some(inner) => inner.node(),
            None => Node::Nil,
        }
    }
}

impl<T: Reflect + ?Sized> Reflect for &T {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }

    fn node(&self) -> Node<'_> {
        (**self).node()
    }
}

impl<T: Reflect + ?Sized> Reflect for Box<T> {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }

    fn node(&self) -> Node<'_> {
        (**self).node()
    }
}

impl<T: Reflect> Reflect for [T] {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(Reflect::to_value).collect())
    }

    fn node(&self) -> Node<'_> {
        let records: Vec<&dyn Record> = self.iter().filter_map(|e| e.node().as_record()).collect();
        if records.is_empty() {
            Node::Scalar
        } else {
            Node::Records(records)
        }
    }
}

impl<T: Reflect> Reflect for Vec<T> {
    fn to_value(&self) -> Value {
        self.as_slice().to_value()
    }

    fn node(&self) -> Node<'_> {
        self.as_slice().node()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_keep_signedness() {
        assert_eq!(7u8.to_value(), Value::Uint(7));
        assert_eq!((-7i16).to_value(), Value::Int(-7));
        assert_eq!(Value::Uint(7).as_integer(), Some(7));
    }

    #[test]
    fn display_matches_go_style_formatting() {
        let list = Value::List(vec![Value::Int(1), Value::str("a"), Value::Bool(true)]);
        assert_eq!(list.to_string(), "[1 a true]");
        assert_eq!(Value::Nil.to_string(), "<nil>");

        let record = Value::record([("a", Value::Int(1)), ("b", Value::str("x"))]);
        assert_eq!(record.to_string(), "{1 x}");
    }

    #[test]
    fn size_counts_codepoints() {
        assert_eq!(Value::str("héllo").size(), Some(5));
        assert_eq!(Value::str("日本").size(), Some(2));
        assert_eq!(Value::Int(5).size(), None);
    }

    #[test]
    fn blank_and_present_differ_on_whitespace_and_bools() {
        let spaces = Value::str("   ");
        assert!(spaces.is_blank());
        assert!(spaces.is_present());

        assert!(!Value::Bool(false).is_blank());
        assert!(Value::Bool(false).is_present());
    }

    #[test]
    fn zero_time_is_blank() {
        assert!(Value::Time(zero_time().unwrap()).is_blank());
        // the Unix epoch is a real timestamp
        assert!(Value::Time(NaiveDateTime::default()).is_present());
        let later = NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        assert!(Value::Time(later).is_present());
    }

    #[test]
    fn option_lowers_to_nil() {
        let missing: Option<String> = None;
        assert_eq!(missing.to_value(), Value::Nil);
        assert!(matches!(missing.node(), Node::Nil));
        assert_eq!(Some(3i32).to_value(), Value::Int(3));
    }

    #[test]
    fn value_serializes_struct_as_map() {
        let record = Value::record([("code", Value::str("a")), ("n", Value::Uint(2))]);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["code"], "a");
        assert_eq!(json["n"], 2);
        assert_eq!(serde_json::to_value(Value::Nil).unwrap(), serde_json::Value::Null);
    }
}
