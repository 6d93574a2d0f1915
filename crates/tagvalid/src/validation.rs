//! The validation context: an ordered error list plus a first-error-per-field
//! index.

use crate::error::{CustomErrorMessage, FieldError};
use crate::registry::Registry;
use crate::rules::{
    Alpha, AlphaDash, AlphaNumeric, Base64, DateBefore, Duplicate, Email, Float, Incremental,
    IsDate, Length, Match, Max, MaxSize, Min, MinSize, Name, NoMatch, Numeric, Phone,
    PositiveFloat, Range, Required, SliceMatch, Validator,
};
use crate::value::{Reflect, Value};
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

/// Owned result of a single check.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub ok: bool,
    pub error: Option<FieldError>,
}

/// Handle to the outcome of a check, borrowing the context that recorded it.
///
/// `key` and `message` rewrite the recorded error in place.
#[derive(Debug)]
pub struct Outcome<'v> {
    validation: &'v mut Validation,
    index: Option<usize>,
}

impl<'v> Outcome<'v> {
    pub fn ok(&self) -> bool {
        self.index.is_none()
    }

    pub fn error(&self) -> Option<&FieldError> {
        self.index.map(|i| &self.validation.errors[i])
    }

    /// Override the key of the recorded error.
    pub fn key(self, key: impl Into<String>) -> Self {
        if let Some(i) = self.index {
            self.validation.errors[i].key = key.into();
        }
        self
    }

    /// Override the message of the recorded error.
    pub fn message(self, message: impl Into<String>) -> Self {
        if let Some(i) = self.index {
            self.validation.errors[i].message = message.into();
        }
        self
    }

    pub fn into_result(self) -> CheckResult {
        CheckResult {
            ok: self.ok(),
            error: self.error().cloned(),
        }
    }
}

/// Accumulates rule failures for one validation run.
///
/// A context is owned by a single call graph; reuse it across runs only
/// after [`clear`](Self::clear).
///
/// ## Example
///
/// ```rust,ignore
/// use tagvalid::prelude::*;
///
/// let mut valid = Validation::default();
/// valid.required(&name, "name");
/// valid.range(&age, 1, 140, "age");
///
/// if valid.has_errors() {
///     for err in valid.errors() {
///         println!("{}: {}", err.key, err.message);
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Validation {
    pub(crate) registry: Arc<Registry>,
    errors: Vec<FieldError>,
    errors_map: HashMap<String, usize>,
}

impl Default for Validation {
    fn default() -> Self {
        Self::new(Arc::new(Registry::new()))
    }
}

impl Validation {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            errors: Vec::new(),
            errors_map: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Drop every recorded error.
    pub fn clear(&mut self) {
        self.errors.clear();
        self.errors_map.clear();
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// All recorded errors in evaluation order.
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// First error recorded for each field.
    pub fn error_map(&self) -> HashMap<&str, &FieldError> {
        self.errors_map
            .iter()
            .map(|(field, &i)| (field.as_str(), &self.errors[i]))
            .collect()
    }

    pub fn error_for(&self, field: &str) -> Option<&FieldError> {
        self.errors_map.get(field).map(|&i| &self.errors[i])
    }

    fn record(&mut self, error: FieldError) -> usize {
        let index = self.errors.len();
        self.errors_map.entry(error.field.clone()).or_insert(index);
        self.errors.push(error);
        index
    }

    /// Append a bare error to the list without indexing it under a field.
    pub fn error(&mut self, message: impl Into<String>) -> Outcome<'_> {
        self.errors.push(FieldError::new(message));
        let index = Some(self.errors.len() - 1);
        Outcome {
            validation: self,
            index,
        }
    }

    /// Record `message` for `field`.
    pub fn set_error(&mut self, field: impl Into<String>, message: impl Into<String>) -> &FieldError {
        let field = field.into();
        let message = message.into();
        let index = self.record(FieldError {
            key: field.clone(),
            name: field.clone(),
            field,
            template: message.clone(),
            ..FieldError::new(message)
        });
        &self.errors[index]
    }

    /// Run `validator` against `value`, recording a failure.
    ///
    /// Empty values pass every rule except presence rules.
    pub fn apply(&mut self, validator: &dyn Validator, value: &Value) -> Outcome<'_> {
        if (!validator.checks_presence() && value.is_blank()) || validator.is_satisfied(value) {
            return Outcome {
                validation: self,
                index: None,
            };
        }

        let default = self
            .registry
            .render(validator.name(), &validator.message_args())
            .unwrap_or_else(|| validator.default_message());

        let mut key = validator.key().to_string();
        let mut message = default.clone();
        let mut envelope_field = None;
        if let Some(envelope) = CustomErrorMessage::decode(&key) {
            message = CustomErrorMessage::new(
                format!("{} {}", envelope.message, default),
                envelope.key.as_str(),
                envelope.field.as_str(),
            )
            .encode();
            key = envelope.key;
            envelope_field = Some(envelope.field);
        }

        let (field, name) = match key.split('.').collect::<Vec<_>>()[..] {
            [field, name] => (field.to_string(), name.to_string()),
            _ => (envelope_field.unwrap_or_else(|| key.clone()), key.clone()),
        };

        let error = FieldError {
            message,
            key,
            name,
            field,
            value: value.clone(),
            template: self.registry.template(validator.name()),
            limit_value: validator.limit_value(),
        };
        let index = self.record(error);
        Outcome {
            validation: self,
            index: Some(index),
        }
    }

    /// Apply `validators` in order; the outcome of the first failure, or
    /// success when none fails.
    pub fn check<V>(&mut self, value: &V, validators: &[&dyn Validator]) -> Outcome<'_>
    where
        V: Reflect + ?Sized,
    {
        let value = value.to_value();
        let mut index = None;
        for validator in validators {
            index = self.apply(*validator, &value).index;
            if index.is_some() {
                break;
            }
        }
        Outcome {
            validation: self,
            index,
        }
    }

    /// Whether `s` is a JSON object, i.e. a custom-message envelope.
    pub fn is_json(s: &str) -> bool {
        CustomErrorMessage::decode(s).is_some()
    }

    /// Encode a custom-message envelope for use as a key.
    pub fn set_custom_error_message(message: &str, key: &str, field: &str) -> String {
        CustomErrorMessage::new(message, key, field).encode()
    }

    /// Decode an envelope; a plain string comes back as the message with an
    /// empty key and field.
    pub fn get_custom_error_message(s: &str) -> CustomErrorMessage {
        CustomErrorMessage::decode(s).unwrap_or_else(|| CustomErrorMessage::new(s, "", ""))
    }

    pub fn required<V: Reflect + ?Sized>(&mut self, value: &V, key: &str) -> Outcome<'_> {
        self.apply(&Required::new(key), &value.to_value())
    }

    pub fn min<V: Reflect + ?Sized>(&mut self, value: &V, min: i64, key: &str) -> Outcome<'_> {
        self.apply(&Min::new(min, key), &value.to_value())
    }

    pub fn max<V: Reflect + ?Sized>(&mut self, value: &V, max: i64, key: &str) -> Outcome<'_> {
        self.apply(&Max::new(max, key), &value.to_value())
    }

    pub fn range<V: Reflect + ?Sized>(
        &mut self,
        value: &V,
        min: i64,
        max: i64,
        key: &str,
    ) -> Outcome<'_> {
        self.apply(&Range::new(min, max, key), &value.to_value())
    }

    pub fn min_size<V: Reflect + ?Sized>(&mut self, value: &V, min: usize, key: &str) -> Outcome<'_> {
        self.apply(&MinSize::new(min, key), &value.to_value())
    }

    pub fn max_size<V: Reflect + ?Sized>(&mut self, value: &V, max: usize, key: &str) -> Outcome<'_> {
        self.apply(&MaxSize::new(max, key), &value.to_value())
    }

    pub fn length<V: Reflect + ?Sized>(&mut self, value: &V, n: usize, key: &str) -> Outcome<'_> {
        self.apply(&Length::new(n, key), &value.to_value())
    }

    pub fn match_regex<V: Reflect + ?Sized>(
        &mut self,
        value: &V,
        regex: &Regex,
        key: &str,
    ) -> Outcome<'_> {
        self.apply(&Match::new(regex.clone(), key), &value.to_value())
    }

    pub fn no_match<V: Reflect + ?Sized>(
        &mut self,
        value: &V,
        regex: &Regex,
        key: &str,
    ) -> Outcome<'_> {
        self.apply(&NoMatch::new(regex.clone(), key), &value.to_value())
    }

    /// `format` is a chrono strftime string, e.g. `%Y-%m-%d`.
    pub fn is_date<V: Reflect + ?Sized>(&mut self, value: &V, format: &str, key: &str) -> Outcome<'_> {
        self.apply(&IsDate::new(format, key), &value.to_value())
    }

    pub fn date_before<V: Reflect + ?Sized>(
        &mut self,
        value: &V,
        reference: &str,
        format: &str,
        key: &str,
    ) -> Outcome<'_> {
        self.apply(&DateBefore::new(reference, format, key), &value.to_value())
    }

    pub fn slice_match<V: Reflect + ?Sized>(
        &mut self,
        value: &V,
        haystack: &[Value],
        key: &str,
    ) -> Outcome<'_> {
        self.apply(&SliceMatch::new(haystack.to_vec(), key), &value.to_value())
    }

    pub fn duplicate<V: Reflect + ?Sized>(
        &mut self,
        value: &V,
        monitor: &str,
        key: &str,
    ) -> Outcome<'_> {
        self.apply(&Duplicate::new(monitor, key), &value.to_value())
    }

    pub fn incremental<V: Reflect + ?Sized>(
        &mut self,
        value: &V,
        field: &str,
        key: &str,
    ) -> Outcome<'_> {
        self.apply(&Incremental::new(field, key), &value.to_value())
    }
}

macro_rules! keyed_checks {
    ($($(#[$doc:meta])* $method:ident => $rule:ident),* $(,)?) => {
        impl Validation {
            $(
                $(#[$doc])*
                pub fn $method<V: Reflect + ?Sized>(&mut self, value: &V, key: &str) -> Outcome<'_> {
                    self.apply(&$rule::new(key), &value.to_value())
                }
            )*
        }
    };
}

keyed_checks! {
    alpha => Alpha,
    numeric => Numeric,
    float => Float,
    alpha_numeric => AlphaNumeric,
    alpha_dash => AlphaDash,
    base64 => Base64,
    email => Email,
    positive_float => PositiveFloat,
    phone => Phone,
    /// Letters, spaces, quotes, dots and dashes.
    name => Name,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn required() {
        let mut valid = Validation::default();

        assert!(!valid.required(&Value::Nil, "nil").ok());
        assert!(valid.required(&true, "bool").ok());
        assert!(valid.required(&false, "bool").ok());
        assert!(!valid.required("", "string").ok());
        assert!(valid.required(" ", "string").ok());
        assert!(valid.required("\n", "string").ok());
        assert!(valid.required("gocore", "string").ok());
        assert!(!valid.required(&0i32, "zero").ok());
        assert!(valid.required(&1i32, "int").ok());
        assert!(valid.required(&-1i64, "int").ok());
        assert!(!valid.required(&Vec::<String>::new(), "empty").ok());
        assert!(valid.required(&vec!["ok".to_string()], "list").ok());
        assert!(!valid.required(&None::<String>, "none").ok());
        assert!(!valid.required(&crate::value::zero_time().unwrap(), "time").ok());
        assert!(valid.required(&chrono::NaiveDateTime::default(), "epoch").ok());
    }

    #[test]
    fn non_presence_rules_skip_blank_values() {
        let mut valid = Validation::default();
        assert!(valid.min(&0i32, 5, "zero").ok());
        assert!(valid.alpha("", "empty").ok());
        assert!(valid.alpha("   ", "spaces").ok());
        assert!(valid.length(&Vec::<i32>::new(), 3, "empty").ok());
        assert!(valid.email(&None::<String>, "none").ok());
        assert!(!valid.has_errors());
    }

    #[test]
    fn numeric_rules() {
        let mut valid = Validation::default();
        assert!(!valid.min(&-1i32, 0, "min0").ok());
        assert!(valid.min(&1i32, 0, "min0").ok());
        assert!(!valid.max(&1i32, 0, "max0").ok());
        assert!(valid.max(&-1i32, 0, "max0").ok());
        assert!(!valid.range(&-1i32, 0, 1, "range").ok());
        assert!(valid.range(&1i32, 0, 1, "range").ok());
    }

    #[test]
    fn failure_details() {
        let mut valid = Validation::default();
        let outcome = valid.range(&180i32, 1, 140, "Age");
        let error = outcome.error().cloned().unwrap();

        assert_eq!(error.message, "range is between 1 to 140");
        assert_eq!(error.key, "Age");
        assert_eq!(error.field, "Age");
        assert_eq!(error.name, "Age");
        assert_eq!(error.value, Value::Int(180));
        assert_eq!(error.template, "range is between {} to {}");
        assert_eq!(
            error.limit_value,
            Some(Value::List(vec![Value::Int(1), Value::Int(140)]))
        );
    }

    #[test]
    fn dotted_keys_split_into_field_and_name() {
        let mut valid = Validation::default();
        valid.alpha("a1", "user.Alpha");
        let error = &valid.errors()[0];
        assert_eq!(error.field, "user");
        assert_eq!(error.name, "Alpha");

        valid.alpha("a1", "a.b.c");
        let error = &valid.errors()[1];
        assert_eq!(error.field, "a.b.c");
        assert_eq!(error.name, "a.b.c");
    }

    #[test]
    fn size_rules() {
        let mut valid = Validation::default();
        // blank values skip everything but Required
        assert!(valid.min_size("", 1, "min1").ok());
        assert!(valid.min_size("ok", 1, "min1").ok());
        assert!(!valid.max_size("ok", 1, "max1").ok());
        assert!(valid.length("", 1, "len1").ok());
        assert!(valid.length("1", 1, "len1").ok());
        assert!(!valid.length(&vec![1i32, 2], 1, "len1").ok());
    }

    #[test]
    fn match_and_no_match() {
        let mut valid = Validation::default();
        let re = Regex::new(r"^\w+@\w+\.\w+$").unwrap();
        assert!(!valid.match_regex("suchuangji@gmail", &re, "match").ok());
        assert!(valid.match_regex("suchuangji@gmail.com", &re, "match").ok());

        let re = Regex::new(r"[^\w\d]").unwrap();
        assert!(!valid.no_match("123@gmail", &re, "nomatch").ok());
        assert!(valid.no_match("123gmail", &re, "nomatch").ok());
        assert_eq!(valid.errors()[1].limit_value, Some(Value::str(r"[^\w\d]")));
    }

    #[test]
    fn string_class_rules() {
        let mut valid = Validation::default();
        assert!(!valid.alpha("a,1-@ $", "alpha").ok());
        assert!(valid.alpha("abCD", "alpha").ok());
        assert!(!valid.numeric("a,1-@ $", "numeric").ok());
        assert!(valid.numeric("1234", "numeric").ok());
        assert!(!valid.alpha_numeric("a,1-@ $", "alphanumeric").ok());
        assert!(valid.alpha_numeric("1234aB", "alphanumeric").ok());
        assert!(!valid.alpha_dash("a,1-@ $", "alphadash").ok());
        assert!(valid.alpha_dash("1234aB-_", "alphadash").ok());
        assert!(valid.float("3.5", "float").ok());
        assert!(valid.base64("aGVsbG8=", "base64").ok());
        assert!(valid.email("a@b.co", "email").ok());
        assert!(valid.phone("08123456789", "phone").ok());
        assert!(valid.positive_float("1.5", "pf").ok());
        assert!(valid.name("John Smith", "name").ok());
    }

    #[test]
    fn date_rules() {
        let mut valid = Validation::default();
        assert!(valid.is_date("2024-01-31", "%Y-%m-%d", "date").ok());
        assert!(!valid.is_date("31/01/2024", "%Y-%m-%d", "date").ok());
        assert!(valid
            .date_before("2024-02-01", "2024-01-01", "%Y-%m-%d", "after")
            .ok());
        let outcome = valid.date_before("2023-02-01", "2024-01-01", "%Y-%m-%d", "after");
        assert_eq!(
            outcome.error().map(|e| e.message.as_str()),
            Some("must be set after or equal to 2024-01-01")
        );
    }

    #[test]
    fn list_rules() {
        let mut valid = Validation::default();
        let options = [Value::str("red"), Value::str("blue")];
        assert!(valid.slice_match("red", &options, "color").ok());
        assert!(!valid.slice_match("green", &options, "color").ok());

        let rows = Value::List(vec![
            Value::record([("id", Value::Int(2))]),
            Value::record([("id", Value::Int(2))]),
        ]);
        assert!(!valid.duplicate(&rows, "id", "rows").ok());
        assert!(!valid.incremental(&rows, "id", "rows").ok());
    }

    #[test]
    fn first_error_wins_in_the_map() {
        let mut valid = Validation::default();
        valid.required("", "name");
        valid.set_error("name", "second");

        assert_eq!(valid.errors().len(), 2);
        assert_eq!(valid.error_for("name").unwrap().message, "is required");
        assert_eq!(valid.error_map().len(), 1);
    }

    #[test]
    fn bare_errors_are_not_indexed() {
        let mut valid = Validation::default();
        let outcome = valid.error("something broke").key("general");
        assert!(!outcome.ok());
        assert_eq!(valid.errors()[0].key, "general");
        assert!(valid.error_map().is_empty());
    }

    #[test]
    fn outcome_overrides() {
        let mut valid = Validation::default();
        let result = valid
            .required("", "name")
            .key("person.name")
            .message("name please")
            .into_result();
        assert!(!result.ok);
        let error = result.error.unwrap();
        assert_eq!(error.key, "person.name");
        assert_eq!(error.message, "name please");

        let result = valid.required("x", "name").message("unused").into_result();
        assert_eq!(result, CheckResult { ok: true, error: None });
    }

    #[test]
    fn check_stops_at_first_failure() {
        let mut valid = Validation::default();
        let required = Required::new("code");
        let length = Length::new(3, "code");
        let numeric = Numeric::new("code");

        let outcome = valid.check("12a", &[&required, &length, &numeric]);
        assert_eq!(
            outcome.error().map(|e| e.message.as_str()),
            Some("must be valid numeric characters")
        );

        let outcome = valid.check("1234", &[&required, &length, &numeric]);
        assert_eq!(outcome.error().map(|e| e.message.as_str()), Some("required length is 3"));
        assert_eq!(valid.errors().len(), 2);

        assert!(valid.check("123", &[&required, &length, &numeric]).ok());
    }

    #[test]
    fn custom_message_envelope() {
        let key = Validation::set_custom_error_message("Email", "user.email", "email");
        assert!(Validation::is_json(&key));

        let mut valid = Validation::default();
        valid.email("not-an-email", &key);
        let error = &valid.errors()[0];

        let decoded = Validation::get_custom_error_message(&error.message);
        assert_eq!(decoded.message, "Email must be valid email address");
        assert_eq!(decoded.key, "user.email");
        assert_eq!(error.key, "user.email");
        assert_eq!(error.field, "user");
        assert_eq!(error.name, "email");
    }

    #[test]
    fn envelope_field_is_kept_for_plain_keys() {
        let key = Validation::set_custom_error_message("Age", "age", "person_age");
        let mut valid = Validation::default();
        valid.min(&-2i32, 0, &key);
        assert_eq!(valid.errors()[0].field, "person_age");
        assert!(valid.error_for("person_age").is_some());
    }

    #[test]
    fn plain_strings_decode_as_messages() {
        let decoded = Validation::get_custom_error_message("just text");
        assert_eq!(decoded, CustomErrorMessage::new("just text", "", ""));
        assert!(!Validation::is_json("just text"));
    }

    #[test]
    fn per_registry_templates() {
        let registry = Registry::new();
        let mut messages = registry.messages();
        messages.set("Required", "can not be empty");
        registry.set_messages(messages);

        let mut valid = Validation::new(Arc::new(registry));
        let outcome = valid.required("", "name");
        assert_eq!(outcome.error().unwrap().message, "can not be empty");
        assert_eq!(valid.errors()[0].template, "can not be empty");
    }

    #[derive(crate::Record)]
    struct Member {
        #[valid(r"Required;Match(/^(test)?\w*@(/test/);com$/)")]
        name: String,
        #[valid("Required;Range(1, 140)")]
        age: i32,
    }

    #[test]
    fn clear_allows_rerunning_on_the_same_context() {
        let mut valid = Validation::default();
        let mut member = Member {
            name: "test@/test/;com".into(),
            age: 30,
        };
        assert!(valid.valid(&member).unwrap());

        member.age = 180;
        assert!(!valid.valid(&member).unwrap());
        assert_eq!(valid.errors().len(), 1);
        assert_eq!(valid.error_for("age").unwrap().message, "range is between 1 to 140");

        valid.clear();
        assert!(!valid.has_errors());
        assert!(valid.error_for("age").is_none());

        member.age = 30;
        member.name = "nobody".into();
        assert!(!valid.valid(&member).unwrap());
        assert_eq!(valid.errors().len(), 1);
        assert_eq!(valid.errors()[0].key, "name.Match");
        assert!(valid.error_for("age").is_none());
    }

    proptest! {
        #[test]
        fn map_holds_the_first_message_per_field(
            messages in prop::collection::vec("[a-z]{1,10}", 1..10)
        ) {
            let mut valid = Validation::default();
            for message in &messages {
                valid.set_error("field", message.as_str());
            }
            prop_assert_eq!(valid.errors().len(), messages.len());
            prop_assert_eq!(&valid.error_for("field").unwrap().message, &messages[0]);
        }

        #[test]
        fn range_agrees_with_min_and_max(x in any::<i32>(), lo in -500i64..500, hi in -500i64..500) {
            let mut valid = Validation::default();
            let range = valid.range(&x, lo, hi, "r").ok();
            let min = valid.min(&x, lo, "r").ok();
            let max = valid.max(&x, hi, "r").ok();
            prop_assert_eq!(range, min && max);
        }

        #[test]
        fn max_size_counts_codepoints(s in "[日本語ü]{1,20}") {
            let mut valid = Validation::default();
            let chars = s.chars().count();
            prop_assert!(valid.max_size(s.as_str(), chars, "s").ok());
            prop_assert!(!valid.max_size(s.as_str(), chars - 1, "s").ok());
        }
    }
}
