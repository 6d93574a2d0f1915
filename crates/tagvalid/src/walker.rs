//! Struct traversal: applies each field's tag rules and recurses into nested
//! records.

use crate::error::{Result, ValidationError};
use crate::tag;
use crate::validation::Validation;
use crate::value::{Field, Node, Record, Reflect};
use std::sync::Arc;
use tracing::{debug, warn};

fn as_record(obj: &dyn Reflect) -> Result<&dyn Record> {
    obj.node()
        .as_record()
        .ok_or_else(|| ValidationError::NotAStruct(obj.to_value().to_string()))
}

/// Declared fields with inline records expanded in place.
fn flatten<'a>(record: &'a dyn Record, out: &mut Vec<Field<'a>>) {
    for field in record.fields() {
        let inner = if field.inline {
            field.value.node().as_record()
        } else {
            None
        };
        out.push(field);
        if let Some(inner) = inner {
            flatten(inner, out);
        }
    }
}

fn is_excepted(rule: &str, exceptions: &[&str]) -> bool {
    exceptions.iter().any(|e| e.eq_ignore_ascii_case(rule))
}

impl Validation {
    /// Validate the declared fields of a record.
    ///
    /// Returns `Ok(false)` when a rule fails; the failures are in
    /// [`errors`](Self::errors). Misconfigured tags abort with `Err`.
    pub fn valid(&mut self, obj: &dyn Reflect) -> Result<bool> {
        self.valid_with_exception(obj, &[])
    }

    /// Like [`valid`](Self::valid), skipping rules named in `exceptions`
    /// (compared case-insensitively).
    pub fn valid_with_exception(&mut self, obj: &dyn Reflect, exceptions: &[&str]) -> Result<bool> {
        let record = as_record(obj)?;
        self.valid_record(record, exceptions)
    }

    /// Validate a record, then nested records and lists of records.
    pub fn recursive_valid(&mut self, obj: &dyn Reflect) -> Result<bool> {
        let record = as_record(obj)?;
        self.descend(record, None)
    }

    /// Recursive form of [`valid_with_exception`](Self::valid_with_exception).
    ///
    /// Only fields carrying a non-empty rule string are descended into.
    pub fn recursive_valid_with_exception(
        &mut self,
        obj: &dyn Reflect,
        exceptions: &[&str],
    ) -> Result<bool> {
        let record = as_record(obj)?;
        self.descend(record, Some(exceptions))
    }

    /// Chaining form of [`valid`](Self::valid).
    pub fn validate(&mut self, obj: &dyn Reflect) -> Result<&mut Self> {
        self.valid(obj)?;
        Ok(self)
    }

    fn valid_record(&mut self, record: &dyn Record, exceptions: &[&str]) -> Result<bool> {
        let registry = Arc::clone(&self.registry);
        let mut fields = Vec::new();
        flatten(record, &mut fields);

        let mut fault = None;
        for field in &fields {
            let calls = tag::parse_field(&registry, field).map_err(|err| {
                warn!(record = record.type_name(), field = field.name, error = %err, "invalid rule tag");
                err
            })?;
            if calls.is_empty() {
                continue;
            }

            let value = field.value.to_value();
            for call in calls.iter().filter(|c| !is_excepted(&c.name, exceptions)) {
                match registry.invoke(&call.name, self, &value, &call.args, &call.key) {
                    Ok(_) => {}
                    Err(err @ ValidationError::Invocation { .. }) => {
                        fault.get_or_insert(err);
                    }
                    Err(err) => {
                        warn!(record = record.type_name(), rule = %call.name, error = %err, "validation aborted");
                        return Err(err);
                    }
                }
            }
        }

        if let Some(err) = fault {
            return Err(err);
        }

        if !self.has_errors() {
            record.check(self);
        }

        let ok = !self.has_errors();
        debug!(
            record = record.type_name(),
            ok,
            errors = self.errors().len(),
            "validated record"
        );
        Ok(ok)
    }

    fn descend(&mut self, record: &dyn Record, exceptions: Option<&[&str]>) -> Result<bool> {
        if !self.valid_record(record, exceptions.unwrap_or_default())? {
            return Ok(false);
        }

        for field in record.fields() {
            if field.inline || !field.exported {
                continue;
            }
            if exceptions.is_some() && field.tags.valid.is_empty() {
                continue;
            }
            match field.value.node() {
                Node::Record(inner) => {
                    self.descend(inner, exceptions)?;
                }
                Node::Records(items) => {
                    for item in items {
                        self.valid_record(item, exceptions.unwrap_or_default())?;
                    }
                }
                Node::Nil | Node::Scalar | Node::Time => {}
            }
        }
        Ok(!self.has_errors())
    }
}
