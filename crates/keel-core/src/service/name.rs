use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::service::error::ServiceNameError;

/// Characters that would make the canonical text form ambiguous.
const RESERVED: &[char] = &[':', '=', ','];

/// Immutable, value-equal identifier for a service within a kernel.
///
/// A name is a `domain` plus an ordered set of `key=value` properties. The
/// canonical text form is `domain` or `domain:key=value,key=value` with the
/// keys in sorted order, and it round-trips: parsing the output of
/// [`ServiceName::to_string`] yields an equal name.
///
/// Names may outlive the service they identify; the kernel keeps using them
/// as map keys and in diagnostics after unregistration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceName {
    domain: String,
    properties: BTreeMap<String, String>,
}

impl ServiceName {
    /// Create a name with the given domain and no properties.
    pub fn new(domain: impl Into<String>) -> Result<Self, ServiceNameError> {
        let domain = domain.into();
        validate_component("domain", &domain)?;
        Ok(Self {
            domain,
            properties: BTreeMap::new(),
        })
    }

    /// Return a copy of this name with one additional property.
    pub fn with_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, ServiceNameError> {
        let key = key.into();
        let value = value.into();
        validate_component("property key", &key)?;
        validate_component("property value", &value)?;
        self.properties.insert(key, value);
        Ok(self)
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Look up a property value by key.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The canonical text form, identical to the `Display` output.
    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

fn validate_component(component: &'static str, value: &str) -> Result<(), ServiceNameError> {
    if component == "domain" && value.is_empty() {
        return Err(ServiceNameError::EmptyDomain);
    }
    for ch in value.chars() {
        if RESERVED.contains(&ch) || ch.is_whitespace() {
            return Err(ServiceNameError::InvalidCharacter {
                component,
                value: value.to_string(),
                character: ch,
            });
        }
    }
    Ok(())
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.domain)?;
        let mut separator = ':';
        for (key, value) in &self.properties {
            write!(f, "{}{}={}", separator, key, value)?;
            separator = ',';
        }
        Ok(())
    }
}

impl FromStr for ServiceName {
    type Err = ServiceNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (domain, props) = match s.split_once(':') {
            Some((domain, props)) => (domain, Some(props)),
            None => (s, None),
        };
        let mut name = ServiceName::new(domain)?;
        if let Some(props) = props {
            for part in props.split(',') {
                let (key, value) =
                    part.split_once('=')
                        .ok_or_else(|| ServiceNameError::MalformedProperty {
                            input: s.to_string(),
                            property: part.to_string(),
                        })?;
                if name.property(key).is_some() {
                    return Err(ServiceNameError::DuplicateKey {
                        input: s.to_string(),
                        key: key.to_string(),
                    });
                }
                name = name.with_property(key, value)?;
            }
        }
        Ok(name)
    }
}

impl Serialize for ServiceName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
