use std::str::FromStr;

use crate::service::error::ServiceNameError;
use crate::service::ServiceName;

#[test]
fn canonical_form_is_domain_only_without_properties() {
    let name = ServiceName::new("kernel").unwrap();
    assert_eq!(name.to_string(), "kernel");
    assert_eq!(name.domain(), "kernel");
}

#[test]
fn canonical_form_sorts_property_keys() {
    let name = ServiceName::new("db")
        .unwrap()
        .with_property("role", "primary")
        .unwrap()
        .with_property("az", "eu-1")
        .unwrap();
    assert_eq!(name.to_string(), "db:az=eu-1,role=primary");
}

#[test]
fn names_are_value_equal_regardless_of_insertion_order() {
    let a = ServiceName::new("db")
        .unwrap()
        .with_property("a", "1")
        .unwrap()
        .with_property("b", "2")
        .unwrap();
    let b = ServiceName::new("db")
        .unwrap()
        .with_property("b", "2")
        .unwrap()
        .with_property("a", "1")
        .unwrap();
    assert_eq!(a, b);
}

#[test]
fn display_output_round_trips_through_parsing() {
    let name = ServiceName::new("cache")
        .unwrap()
        .with_property("tier", "hot")
        .unwrap()
        .with_property("shard", "7")
        .unwrap();
    let parsed = ServiceName::from_str(&name.to_string()).unwrap();
    assert_eq!(parsed, name);
}

#[test]
fn parses_domain_only() {
    let name: ServiceName = "worker".parse().unwrap();
    assert_eq!(name.domain(), "worker");
    assert_eq!(name.properties().count(), 0);
}

#[test]
fn parses_properties() {
    let name: ServiceName = "db:role=replica,az=us-2".parse().unwrap();
    assert_eq!(name.property("role"), Some("replica"));
    assert_eq!(name.property("az"), Some("us-2"));
    assert_eq!(name.property("missing"), None);
}

#[test]
fn rejects_empty_domain() {
    assert!(matches!(
        ServiceName::new(""),
        Err(ServiceNameError::EmptyDomain)
    ));
}

#[test]
fn rejects_reserved_characters() {
    for bad in ["a:b", "a=b", "a,b", "a b", "a\tb"] {
        assert!(
            matches!(
                ServiceName::new(bad),
                Err(ServiceNameError::InvalidCharacter { .. })
            ),
            "expected {:?} to be rejected",
            bad
        );
    }
}

#[test]
fn rejects_reserved_characters_in_property_values() {
    let name = ServiceName::new("db").unwrap();
    assert!(name.with_property("key", "a,b").is_err());
}

#[test]
fn parse_rejects_property_without_equals() {
    assert!(matches!(
        "db:role".parse::<ServiceName>(),
        Err(ServiceNameError::MalformedProperty { .. })
    ));
}

#[test]
fn parse_rejects_duplicate_keys() {
    assert!(matches!(
        "db:role=a,role=b".parse::<ServiceName>(),
        Err(ServiceNameError::DuplicateKey { .. })
    ));
}

#[test]
fn serializes_as_canonical_string() {
    let name = ServiceName::new("db")
        .unwrap()
        .with_property("role", "primary")
        .unwrap();
    let json = serde_json::to_string(&name).unwrap();
    assert_eq!(json, "\"db:role=primary\"");
}
