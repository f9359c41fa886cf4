//! Ranged enumerations: closed sets of named, non-overlapping integer
//! subranges, each behaving as a single enumeration member.
//!
//! ```rust
//! use ranged_enum::EnumBuilder;
//!
//! let devices = EnumBuilder::new("Devices")
//!     .member("PRIMARY", 1)
//!     .member("SECONDARY", 2)
//!     .member("USER_DEFINED", (3, 10))
//!     .member("RESERVED", (11, 14))
//!     .member("INVALID", 15)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(devices.resolve(7).unwrap().name(), "USER_DEFINED");
//! assert!(devices.try_resolve(20).is_none());
//! assert_eq!(devices.resolve(20).unwrap_err().to_string(), "20 is not in Devices");
//! ```
//!
//! A definition is built once, validated as a whole, and is immutable
//! afterwards. Resolving a value is O(1) for singleton members and
//! O(log m) otherwise, where m is the number of members spanning more than
//! one value.

mod builder;
#[cfg(feature = "serde")]
mod config;
mod definition;
mod error;
pub mod format;
mod member;
mod subrange;
mod value;

pub use builder::EnumBuilder;
#[cfg(feature = "serde")]
pub use config::DefinitionSpec;
pub use definition::EnumDefinition;
pub use error::{Error, Result};
pub use format::{FieldValue, Fields, FormatRule, Template};
pub use member::Member;
pub use subrange::{Placement, RangeOrdering, Subrange};
pub use value::Value;

/// Items used by code generated with `ranged-enum-macros`.
#[doc(hidden)]
pub mod __private {
    pub use once_cell::sync::Lazy;
}
