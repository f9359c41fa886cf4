use std::collections::HashSet;
use std::sync::Arc;

use log::debug;

use crate::definition::EnumDefinition;
use crate::error::{Error, Result};
use crate::format::{is_identifier, FormatRule, BUILTIN_FIELDS};
use crate::member::Member;
use crate::subrange::{RangeOrdering, Subrange};
use crate::value::Value;

const RANGE_INITIALIZER: &str = "an integer or a pair of integers";

/// Collects the descriptors of one ranged enum and validates them into an
/// [`EnumDefinition`].
///
/// ```rust
/// use ranged_enum::EnumBuilder;
///
/// let devices = EnumBuilder::new("Devices")
///     .attributes(["brief", "ref"])
///     .format("{value} {brief!r}")
///     .member("PRIMARY", (1, "Primary device", "sub.10.2.1"))
///     .member("USER_DEFINED", ((3, 10), "User defined device", "sub.10.2.3"))
///     .build()
///     .unwrap();
///
/// assert_eq!(devices.resolve(7).unwrap().to_string(), "3..10 'User defined device'");
/// ```
///
/// Descriptors are an integer (singleton) or a pair of integers (inclusive
/// range). When attribute names are declared, every descriptor must be a
/// sequence holding the range initializer followed by one value per
/// attribute, in declared order.
///
/// Building is all or nothing: the first violation aborts it.
#[derive(Debug, Clone)]
pub struct EnumBuilder {
    name: String,
    attributes: Vec<String>,
    format: Option<RuleSource>,
    members: Vec<PendingMember>,
}

#[derive(Debug, Clone)]
enum RuleSource {
    Template(String),
    Rule(FormatRule),
}

impl RuleSource {
    fn into_rule(self, attributes: &[String]) -> Result<FormatRule> {
        let rule = match self {
            RuleSource::Template(source) => FormatRule::template(&source)?,
            RuleSource::Rule(rule) => rule,
        };
        rule.check_fields(attributes)?;
        Ok(rule)
    }
}

#[derive(Debug, Clone)]
struct PendingMember {
    name: String,
    descriptor: Value,
    format: Option<RuleSource>,
}

impl EnumBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            format: None,
            members: Vec::new(),
        }
    }

    /// Declares the attribute names, replacing earlier declarations.
    pub fn attributes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = names.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the default format template of all members.
    pub fn format(mut self, template: impl Into<String>) -> Self {
        self.format = Some(RuleSource::Template(template.into()));
        self
    }

    /// Sets the default format rule of all members.
    pub fn format_rule(mut self, rule: FormatRule) -> Self {
        self.format = Some(RuleSource::Rule(rule));
        self
    }

    pub fn member(mut self, name: impl Into<String>, descriptor: impl Into<Value>) -> Self {
        self.members.push(PendingMember {
            name: name.into(),
            descriptor: descriptor.into(),
            format: None,
        });
        self
    }

    /// Adds a member rendered through its own template.
    pub fn member_with_format(
        mut self,
        name: impl Into<String>,
        descriptor: impl Into<Value>,
        template: impl Into<String>,
    ) -> Self {
        self.members.push(PendingMember {
            name: name.into(),
            descriptor: descriptor.into(),
            format: Some(RuleSource::Template(template.into())),
        });
        self
    }

    /// Adds a member rendered through its own rule.
    pub fn member_with_rule(
        mut self,
        name: impl Into<String>,
        descriptor: impl Into<Value>,
        rule: FormatRule,
    ) -> Self {
        self.members.push(PendingMember {
            name: name.into(),
            descriptor: descriptor.into(),
            format: Some(RuleSource::Rule(rule)),
        });
        self
    }

    pub fn build(self) -> Result<EnumDefinition> {
        let name = self.name.clone();
        let definition = self
            .try_build()
            .inspect_err(|err| debug!("rejected ranged enum {}: {}", name, err))?;
        debug!(
            "built ranged enum {} with {} members ({} singleton, {} extended)",
            definition.name(),
            definition.len(),
            definition.singletons().count(),
            definition.extended().count()
        );
        Ok(definition)
    }

    fn try_build(self) -> Result<EnumDefinition> {
        check_attribute_names(&self.attributes)?;
        let attributes: Arc<[String]> = Arc::from(self.attributes);

        let default_rule = Arc::new(match self.format {
            Some(source) => source.into_rule(&attributes)?,
            None => FormatRule::default(),
        });

        let mut members = Vec::with_capacity(self.members.len());
        for pending in self.members {
            check_member_name(&pending.name)?;
            let format = match pending.format {
                Some(source) => Arc::new(source.into_rule(&attributes)?),
                None => Arc::clone(&default_rule),
            };
            let (range, values) = split_descriptor(&pending.name, pending.descriptor, &attributes)?;
            members.push(Member::new(
                pending.name,
                range,
                Arc::clone(&attributes),
                values,
                format,
            ));
        }

        members.sort_by_key(Member::low);

        for pair in members.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if prev.range().compare_to_range(&next.range()) != RangeOrdering::Less {
                return Err(Error::OverlappingRanges {
                    first: prev.name().to_owned(),
                    first_range: prev.range(),
                    second: next.name().to_owned(),
                    second_range: next.range(),
                });
            }
        }

        let mut seen = HashSet::with_capacity(members.len());
        for member in &members {
            if !seen.insert(member.name()) {
                return Err(Error::DuplicateName {
                    name: member.name().to_owned(),
                });
            }
        }

        for (position, member) in members.iter_mut().enumerate() {
            member.set_position(position);
        }
        for member in &members {
            member.format_rule().render(member)?;
        }

        Ok(EnumDefinition::from_sorted(self.name, attributes, members))
    }
}

fn check_attribute_names(names: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(names.len());
    for name in names {
        if !is_identifier(name) {
            return Err(Error::InvalidAttributeName { name: name.clone() });
        }
        if BUILTIN_FIELDS.contains(&name.as_str()) {
            return Err(Error::ReservedAttributeName { name: name.clone() });
        }
        if !seen.insert(name.as_str()) {
            return Err(Error::DuplicateAttributeName { name: name.clone() });
        }
    }
    Ok(())
}

fn check_member_name(name: &str) -> Result<()> {
    if !is_identifier(name) || name.starts_with('_') {
        return Err(Error::InvalidMemberName {
            name: name.to_owned(),
        });
    }
    Ok(())
}

/// Splits a descriptor into its range and its attribute values.
fn split_descriptor(
    member: &str,
    descriptor: Value,
    attributes: &[String],
) -> Result<(Subrange, Vec<Value>)> {
    if attributes.is_empty() {
        return Ok((range_initializer(member, &descriptor)?, Vec::new()));
    }

    let mut fields = match descriptor {
        Value::Seq(fields) => fields,
        other => {
            return Err(Error::DescriptorType {
                member: member.to_owned(),
                expected: "a sequence",
                found: other.kind(),
            })
        }
    };
    if fields.len() != 1 + attributes.len() {
        return Err(Error::DescriptorArity {
            member: member.to_owned(),
            found: fields.len(),
            expected: 1 + attributes.len(),
        });
    }
    let values = fields.split_off(1);
    Ok((range_initializer(member, &fields[0])?, values))
}

fn range_initializer(member: &str, init: &Value) -> Result<Subrange> {
    let bounds = match init {
        Value::Int(value) => return Ok(Subrange::singleton(*value)),
        Value::Seq(bounds) => bounds,
        other => {
            return Err(Error::DescriptorType {
                member: member.to_owned(),
                expected: RANGE_INITIALIZER,
                found: other.kind(),
            })
        }
    };
    let bounds: Option<Vec<i64>> = bounds.iter().map(Value::as_int).collect();
    match bounds.as_deref() {
        Some(&[value]) => Ok(Subrange::singleton(value)),
        Some(&[low, high]) => Subrange::new(low, high).map_err(|err| err.for_member(member)),
        _ => Err(Error::DescriptorType {
            member: member.to_owned(),
            expected: RANGE_INITIALIZER,
            found: init.kind(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_members_by_lower_bound() {
        let def = EnumBuilder::new("Codes")
            .member("HIGH", (100, 200))
            .member("LOW", -5)
            .member("MID", (10, 20))
            .build()
            .unwrap();
        let names: Vec<_> = def.members().iter().map(Member::name).collect();
        assert_eq!(names, ["LOW", "MID", "HIGH"]);
        assert_eq!(def.members()[2].position(), 2);
    }

    #[test]
    fn touching_ranges_are_rejected() {
        let err = EnumBuilder::new("Codes")
            .member("A", (1, 5))
            .member("B", (5, 10))
            .build()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "overlapping ranges 1..5 and 5..10 in items \"A\" and \"B\""
        );
    }

    #[test]
    fn nested_singleton_overlaps_range() {
        let err = EnumBuilder::new("Codes")
            .member("WIDE", (1, 10))
            .member("INSIDE", 4)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::OverlappingRanges { ref first, ref second, .. } if first == "WIDE" && second == "INSIDE"));
    }

    #[test]
    fn inverted_range_names_the_member() {
        let err = EnumBuilder::new("Codes")
            .member("BROKEN", (10, 3))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            Error::InvalidRange {
                member: Some("BROKEN".to_owned()),
                low: 10,
                high: 3
            }
        );
    }

    #[test]
    fn descriptor_shapes() {
        let err = EnumBuilder::new("Codes")
            .member("TEXT", "seven")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::DescriptorType { found: "str", .. }));

        let err = EnumBuilder::new("Codes")
            .member("TRIPLE", Value::from((1, 2, 3)))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::DescriptorType { found: "sequence", .. }));

        let err = EnumBuilder::new("Codes")
            .attributes(["brief"])
            .member("BARE", 1)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            Error::DescriptorType {
                member: "BARE".to_owned(),
                expected: "a sequence",
                found: "int",
            }
        );
    }

    #[test]
    fn attribute_names_are_checked_before_members() {
        let err = EnumBuilder::new("Codes")
            .attributes(["brief", "max"])
            .member("A", (1, "no arity check yet"))
            .build()
            .unwrap_err();
        assert_eq!(err, Error::ReservedAttributeName { name: "max".to_owned() });

        let err = EnumBuilder::new("Codes").attributes(["2nd"]).build().unwrap_err();
        assert!(matches!(err, Error::InvalidAttributeName { .. }));

        let err = EnumBuilder::new("Codes")
            .attributes(["brief", "brief"])
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateAttributeName { .. }));
    }

    #[test]
    fn member_names() {
        let err = EnumBuilder::new("Codes")
            .member("A", 1)
            .member("A", 2)
            .build()
            .unwrap_err();
        assert_eq!(err, Error::DuplicateName { name: "A".to_owned() });

        let err = EnumBuilder::new("Codes").member("_private", 1).build().unwrap_err();
        assert!(matches!(err, Error::InvalidMemberName { .. }));
    }

    #[test]
    fn format_rules_are_validated_at_build_time() {
        let err = EnumBuilder::new("Codes")
            .format("{value} {colour}")
            .member("A", 1)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::UnknownField { ref field, .. } if field == "colour"));

        let err = EnumBuilder::new("Codes")
            .attributes(["brief"])
            .format("{brief:d}")
            .member("A", (1, "text"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidFormatSpec { ref member, .. } if member == "A"));
    }

    #[test]
    fn per_member_rules_override_the_default() {
        let def = EnumBuilder::new("Codes")
            .format("{name}")
            .member("PLAIN", 1)
            .member_with_format("HEX", (16, 31), "0x{min:X}-{max:X}")
            .member_with_rule(
                "CUSTOM",
                40,
                FormatRule::callback(|fields| format!("<{}>", fields.member().name())),
            )
            .build()
            .unwrap();
        assert_eq!(def.get("PLAIN").unwrap().to_string(), "PLAIN");
        assert_eq!(def.get("HEX").unwrap().to_string(), "0x10-1F");
        assert_eq!(def.get("CUSTOM").unwrap().to_string(), "<CUSTOM>");
    }
}
