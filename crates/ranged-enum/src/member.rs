use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::format::FormatRule;
use crate::subrange::{Placement, Subrange};
use crate::value::Value;

/// A named subrange of a ranged enum.
///
/// Members are created by [`EnumBuilder`](crate::EnumBuilder) and owned by
/// their [`EnumDefinition`](crate::EnumDefinition). Two members are equal
/// when they cover the same range.
#[derive(Debug, Clone)]
pub struct Member {
    name: String,
    range: Subrange,
    attribute_names: Arc<[String]>,
    attribute_values: Vec<Value>,
    format: Arc<FormatRule>,
    position: usize,
}

impl Member {
    pub(crate) fn new(
        name: String,
        range: Subrange,
        attribute_names: Arc<[String]>,
        attribute_values: Vec<Value>,
        format: Arc<FormatRule>,
    ) -> Self {
        debug_assert_eq!(attribute_names.len(), attribute_values.len());
        Self {
            name,
            range,
            attribute_names,
            attribute_values,
            format,
            position: 0,
        }
    }

    pub(crate) fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The whole subrange, also reachable as the `value` format field.
    pub fn range(&self) -> Subrange {
        self.range
    }

    pub fn low(&self) -> i64 {
        self.range.low()
    }

    pub fn high(&self) -> i64 {
        self.range.high()
    }

    /// Alias of [`Member::low`].
    pub fn min(&self) -> i64 {
        self.range.low()
    }

    /// Alias of [`Member::high`].
    pub fn max(&self) -> i64 {
        self.range.high()
    }

    pub fn contains(&self, value: i64) -> bool {
        self.range.contains(value)
    }

    pub fn compare_to_value(&self, value: i64) -> Placement {
        self.range.compare_to_value(value)
    }

    pub fn is_singleton(&self) -> bool {
        self.range.is_singleton()
    }

    /// Index of the member in its definition, ordered by lower bound.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attribute_names
            .iter()
            .position(|declared| declared == name)
            .map(|index| &self.attribute_values[index])
    }

    /// Attributes in declared order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.attribute_names
            .iter()
            .map(String::as_str)
            .zip(self.attribute_values.iter())
    }

    pub fn format_rule(&self) -> &FormatRule {
        &self.format
    }

    /// Renders the member through `rule` instead of its bound rule.
    pub fn format_with(&self, rule: &FormatRule) -> Result<String> {
        rule.check_fields(&self.attribute_names)?;
        rule.render(self)
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Bound rules are checked against every member when the definition is built.
        let text = self.format.render(self).map_err(|_| fmt::Error)?;
        f.pad(&text)
    }
}

impl fmt::LowerHex for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.range, f)
    }
}

impl fmt::UpperHex for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::UpperHex::fmt(&self.range, f)
    }
}

impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        self.range == other.range
    }
}

impl Eq for Member {}

impl PartialOrd for Member {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.range.partial_cmp(&other.range)
    }
}

impl PartialEq<i64> for Member {
    fn eq(&self, other: &i64) -> bool {
        self.range == *other
    }
}

impl PartialEq<Member> for i64 {
    fn eq(&self, other: &Member) -> bool {
        other.range == *self
    }
}

impl PartialOrd<i64> for Member {
    fn partial_cmp(&self, other: &i64) -> Option<Ordering> {
        self.range.partial_cmp(other)
    }
}

impl PartialOrd<Member> for i64 {
    fn partial_cmp(&self, other: &Member) -> Option<Ordering> {
        self.partial_cmp(&other.range)
    }
}
