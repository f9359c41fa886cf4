//! Serde-facing description of a ranged enum.
//!
//! ```rust
//! use ranged_enum::DefinitionSpec;
//!
//! let spec: DefinitionSpec = serde_json::from_str(r#"{
//!     "name": "Devices",
//!     "attributes": ["brief"],
//!     "format": "{name} = {value}",
//!     "members": {
//!         "PRIMARY": [1, "Primary device"],
//!         "USER_DEFINED": [[3, 10], "User defined device"]
//!     }
//! }"#).unwrap();
//!
//! let devices = spec.build().unwrap();
//! assert_eq!(devices.resolve(4).unwrap().to_string(), "USER_DEFINED = 3..10");
//! ```

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::builder::EnumBuilder;
use crate::definition::EnumDefinition;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefinitionSpec {
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Member name to descriptor, in declaration order. Repeated names are kept so the build rejects them.
    #[serde(serialize_with = "serialize_members", deserialize_with = "deserialize_members")]
    pub members: Vec<(String, Value)>,
}

fn serialize_members<S>(members: &[(String, Value)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(members.len()))?;
    for (name, descriptor) in members {
        map.serialize_entry(name, descriptor)?;
    }
    map.end()
}

fn deserialize_members<'de, D>(deserializer: D) -> Result<Vec<(String, Value)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct MembersVisitor;

    impl<'de> Visitor<'de> for MembersVisitor {
        type Value = Vec<(String, Value)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of member names to descriptors")
        }

        fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut members = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some(entry) = access.next_entry()? {
                members.push(entry);
            }
            Ok(members)
        }
    }

    deserializer.deserialize_map(MembersVisitor)
}

impl DefinitionSpec {
    pub fn builder(&self) -> EnumBuilder {
        let mut builder = EnumBuilder::new(self.name.clone()).attributes(self.attributes.iter().cloned());
        if let Some(format) = &self.format {
            builder = builder.format(format.clone());
        }
        self.members
            .iter()
            .fold(builder, |builder, (name, descriptor)| {
                builder.member(name.clone(), descriptor.clone())
            })
    }

    pub fn build(&self) -> crate::Result<EnumDefinition> {
        self.builder().build()
    }
}
