use thiserror::Error;

use crate::subrange::Subrange;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong while building or querying a ranged enum.
///
/// All variants except [`Error::InvalidValueType`] and [`Error::ValueNotFound`]
/// are raised while building a definition. A failed build never yields a
/// partially valid definition.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A range initializer has its lower bound above its upper bound.
    #[error("invalid range {low}..{high}{}: lower bound exceeds upper bound", in_member(.member))]
    InvalidRange {
        member: Option<String>,
        low: i64,
        high: i64,
    },

    /// The descriptor of a member does not have the expected shape.
    #[error("item {member:?} descriptor is {found}, must be {expected}")]
    DescriptorType {
        member: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The descriptor of a member has the wrong number of fields.
    #[error("item {member:?} descriptor contains {found} fields, {expected} required")]
    DescriptorArity {
        member: String,
        found: usize,
        expected: usize,
    },

    /// An attribute name is not a valid identifier.
    #[error("attribute name {name:?} is not a valid identifier")]
    InvalidAttributeName { name: String },

    /// An attribute name collides with a built-in field.
    #[error("attribute name {name:?} is reserved for a built-in field")]
    ReservedAttributeName { name: String },

    /// The same attribute name was declared twice.
    #[error("attribute name {name:?} is declared more than once")]
    DuplicateAttributeName { name: String },

    /// A member name is not a valid public identifier.
    #[error("item name {name:?} is not a valid identifier")]
    InvalidMemberName { name: String },

    /// Two members cover overlapping or touching ranges.
    #[error("overlapping ranges {first_range} and {second_range} in items {first:?} and {second:?}")]
    OverlappingRanges {
        first: String,
        first_range: Subrange,
        second: String,
        second_range: Subrange,
    },

    /// Two members share a name.
    #[error("item name {name:?} is defined more than once")]
    DuplicateName { name: String },

    /// A format template references a field that does not exist.
    #[error("format {template:?} references unknown field {field:?}")]
    UnknownField { template: String, field: String },

    /// A format template is malformed.
    #[error("malformed format {template:?} at offset {offset}: {reason}")]
    FormatSyntax {
        template: String,
        offset: usize,
        reason: &'static str,
    },

    /// A format spec cannot be applied to the value of a field.
    #[error("format spec {spec:?} cannot be applied to field {field:?} of item {member:?}: {reason}")]
    InvalidFormatSpec {
        member: String,
        field: String,
        spec: String,
        reason: &'static str,
    },

    /// A value handed to the resolver is not an integer.
    #[error("invalid initializer {value}: expected an integer, found {found}")]
    InvalidValueType { value: String, found: &'static str },

    /// No member of the definition contains the value.
    #[error("{value} is not in {definition}")]
    ValueNotFound { value: i64, definition: String },
}

fn in_member(member: &Option<String>) -> String {
    match member {
        Some(name) => format!(" in item {name:?}"),
        None => String::new(),
    }
}

impl Error {
    /// Attaches the member name to an error raised while building that member.
    pub(crate) fn for_member(self, name: &str) -> Self {
        match self {
            Error::InvalidRange {
                member: None,
                low,
                high,
            } => Error::InvalidRange {
                member: Some(name.to_owned()),
                low,
                high,
            },
            other => other,
        }
    }

    /// Returns true for errors raised while building a definition.
    pub fn is_construction_error(&self) -> bool {
        !matches!(
            self,
            Error::InvalidValueType { .. } | Error::ValueNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_range_mentions_member_once_attached() {
        let err = Error::InvalidRange {
            member: None,
            low: 5,
            high: 1,
        };
        assert_eq!(
            err.to_string(),
            "invalid range 5..1: lower bound exceeds upper bound"
        );
        assert_eq!(
            err.for_member("BROKEN").to_string(),
            "invalid range 5..1 in item \"BROKEN\": lower bound exceeds upper bound"
        );
    }

    #[test]
    fn miss_message_names_the_definition() {
        let err = Error::ValueNotFound {
            value: 20,
            definition: "Devices".into(),
        };
        assert_eq!(err.to_string(), "20 is not in Devices");
        assert!(!err.is_construction_error());
    }
}
