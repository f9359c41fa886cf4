use std::collections::HashMap;
use std::sync::Arc;

use log::trace;

use crate::error::{Error, Result};
use crate::member::Member;
use crate::subrange::Placement;
use crate::value::Value;

/// An immutable, validated ranged enum.
///
/// Members are kept sorted by lower bound. Singleton members are indexed by
/// value for O(1) lookup, extended members are kept in a sorted list for
/// binary search. A definition has no mutation API and can be shared across
/// threads freely.
#[derive(Debug, Clone)]
pub struct EnumDefinition {
    name: String,
    attribute_names: Arc<[String]>,
    members: Vec<Member>,
    by_name: HashMap<String, usize>,
    singletons: HashMap<i64, usize>,
    extended: Vec<usize>,
}

impl EnumDefinition {
    /// Assembles a definition from members already sorted and checked by the builder.
    pub(crate) fn from_sorted(
        name: String,
        attribute_names: Arc<[String]>,
        members: Vec<Member>,
    ) -> Self {
        let by_name = members
            .iter()
            .enumerate()
            .map(|(index, member)| (member.name().to_owned(), index))
            .collect();
        let singletons = members
            .iter()
            .enumerate()
            .filter(|(_, member)| member.is_singleton())
            .map(|(index, member)| (member.low(), index))
            .collect();
        let extended = members
            .iter()
            .enumerate()
            .filter(|(_, member)| !member.is_singleton())
            .map(|(index, _)| index)
            .collect();
        Self {
            name,
            attribute_names,
            members,
            by_name,
            singletons,
            extended,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute_names(&self) -> &[String] {
        &self.attribute_names
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// All members, ascending by lower bound.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Looks a member up by name.
    pub fn get(&self, name: &str) -> Option<&Member> {
        self.by_name.get(name).map(|&index| &self.members[index])
    }

    /// Members holding a single value, in ascending order.
    pub fn singletons(&self) -> impl Iterator<Item = &Member> {
        self.members.iter().filter(|member| member.is_singleton())
    }

    /// Members holding more than one value, in ascending order.
    pub fn extended(&self) -> impl Iterator<Item = &Member> {
        self.extended.iter().map(|&index| &self.members[index])
    }

    /// Finds the member containing `value`, if any.
    ///
    /// Singletons are matched in O(1); otherwise the extended members are
    /// binary searched in O(log m).
    pub fn try_resolve(&self, value: i64) -> Option<&Member> {
        if let Some(&index) = self.singletons.get(&value) {
            return Some(&self.members[index]);
        }

        let found = self.extended.binary_search_by(|&index| {
            match self.members[index].compare_to_value(value) {
                Placement::Greater => std::cmp::Ordering::Less,
                Placement::Less => std::cmp::Ordering::Greater,
                Placement::Contains => std::cmp::Ordering::Equal,
            }
        });
        match found {
            Ok(slot) => Some(&self.members[self.extended[slot]]),
            Err(_) => {
                trace!("{} resolves to no member of {}", value, self.name);
                None
            }
        }
    }

    /// Finds the member containing `value`, failing with [`Error::ValueNotFound`].
    pub fn resolve(&self, value: i64) -> Result<&Member> {
        self.resolve_or_else(value, |value, definition| Error::ValueNotFound {
            value,
            definition: definition.to_owned(),
        })
    }

    /// Finds the member containing `value`, or returns `fallback` unchanged.
    pub fn resolve_or<'a>(&'a self, value: i64, fallback: &'a Member) -> &'a Member {
        self.try_resolve(value).unwrap_or(fallback)
    }

    /// Finds the member containing `value`, or builds the caller's error from
    /// the value and the definition name.
    pub fn resolve_or_else<E, F>(&self, value: i64, make_err: F) -> Result<&Member, E>
    where
        F: FnOnce(i64, &str) -> E,
    {
        self.try_resolve(value)
            .ok_or_else(|| make_err(value, &self.name))
    }

    /// Resolves a loosely typed value, failing with [`Error::InvalidValueType`]
    /// when it is not an integer.
    pub fn resolve_value(&self, value: &Value) -> Result<&Member> {
        match value.as_int() {
            Some(int) => self.resolve(int),
            None => Err(Error::InvalidValueType {
                value: value.repr(),
                found: value.kind(),
            }),
        }
    }
}
