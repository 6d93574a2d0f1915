//! # tagvalid
//!
//! Declarative record validation driven by rule strings attached to fields.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tagvalid::prelude::*;
//!
//! #[derive(Record)]
//! struct User {
//!     #[valid("Required;Match(/^\\w+@\\w+\\.com$/)")]
//!     email: String,
//!
//!     #[valid(rules = "Required;Range(1,140)", json = "age,omitempty")]
//!     age: i32,
//! }
//!
//! let user = User { email: "ann@example.com".into(), age: 180 };
//! let mut valid = Validation::default();
//!
//! if !valid.valid(&user)? {
//!     let err = valid.error_for("age").unwrap();
//!     assert_eq!(err.message, "range is between 1 to 140");
//! }
//! ```
//!
//! ## Rule strings
//!
//! Rules are separated by `;`. Rules without parameters omit parentheses:
//!
//! - `Required`, `Alpha`, `Numeric`, `Float`, `AlphaNumeric`, `AlphaDash`,
//!   `Base64`, `Email`, `PositiveFloat`, `Phone`, `Name`
//! - `Min(n)`, `Max(n)`, `Range(min,max)`
//! - `MinSize(n)`, `MaxSize(n)`, `Length(n)`
//! - `Match(/regex/)`
//! - `IsDate(format)`, `DateBefore(reference,format)` (chrono strftime)
//! - `Duplicate(field)`, `Incremental(field)` for lists of records
//!
//! Custom rules are added to a [`Registry`] and share the same syntax.

// lets the derive output refer to `::tagvalid` from inside this crate's tests
extern crate self as tagvalid;

pub mod error;
pub mod messages;
pub mod registry;
pub mod rules;
pub mod tag;
pub mod validation;
pub mod value;
mod walker;

pub use error::{CustomErrorMessage, FieldError, Result, ValidationError};
pub use messages::Messages;
pub use registry::{Argument, Arguments, ParamKind, Registry, RuleEntry, RESERVED_NAMES};
pub use rules::Validator;
pub use validation::{CheckResult, Outcome, Validation};
pub use value::{record_value, Field, FieldTags, Node, Record, Reflect, Value};

/// Derive [`Record`] and [`Reflect`] from `#[valid(...)]` field attributes.
pub use tagvalid_macros::Record;

/// Prelude module for validation
pub mod prelude {
    pub use crate::error::{FieldError, ValidationError};
    pub use crate::registry::{Argument, ParamKind, Registry, RuleEntry};
    pub use crate::rules::Validator;
    pub use crate::validation::{CheckResult, Validation};
    pub use crate::value::{Field, Reflect, Value};
    pub use crate::Record;
}
