use ranged_enum::{EnumBuilder, EnumDefinition, Error, FormatRule, Value};

fn devices() -> EnumDefinition {
    EnumBuilder::new("Devices")
        .member("PRIMARY", 1)
        .member("SECONDARY", 2)
        .member("USER_DEFINED", (3, 10))
        .member("RESERVED", (11, 14))
        .member("INVALID", 15)
        .build()
        .unwrap()
}

fn annotated(format: &str) -> EnumDefinition {
    EnumBuilder::new("Devices")
        .attributes(["brief", "ref"])
        .format(format)
        .member("PRIMARY", (1, "Primary device", "sub.10.2.1"))
        .member("USER_DEFINED", ((3, 10), "User defined device", "sub.10.2.3"))
        .build()
        .unwrap()
}

#[test]
fn resolves_plain_devices() {
    let def = devices();
    assert_eq!(def.resolve(7).unwrap().name(), "USER_DEFINED");
    assert_eq!(def.resolve(11).unwrap().name(), "RESERVED");
    assert!(def.try_resolve(20).is_none());
    assert_eq!(
        def.resolve(20),
        Err(Error::ValueNotFound {
            value: 20,
            definition: "Devices".to_owned()
        })
    );
}

#[test]
fn default_rendering() {
    let def = devices();
    let rendered: Vec<String> = def.members().iter().map(ToString::to_string).collect();
    assert_eq!(rendered, ["1", "2", "3..10", "11..14", "15"]);

    let user_defined = def.get("USER_DEFINED").unwrap();
    assert_eq!(user_defined.min(), 3);
    assert_eq!(user_defined.max(), 10);
    assert!(user_defined.contains(7));
    assert!(11i64 > *user_defined);
    assert!(2i64 == *def.get("SECONDARY").unwrap());
    assert_eq!(format!("0x{:02X}", def.get("RESERVED").unwrap()), "0x0B..0E");

    let rule = FormatRule::template("{value} {name!r}").unwrap();
    assert_eq!(
        def.get("INVALID").unwrap().format_with(&rule).unwrap(),
        "15 'INVALID'"
    );
}

#[test]
fn annotated_rendering() {
    let def = annotated("{value} {brief!r}");
    let primary = def.get("PRIMARY").unwrap();
    assert_eq!(primary.to_string(), "1 'Primary device'");
    assert_eq!(primary.attr("brief"), Some(&Value::from("Primary device")));
    assert_eq!(primary.attr("ref"), Some(&Value::from("sub.10.2.1")));
    assert_eq!(
        def.get("USER_DEFINED").unwrap().to_string(),
        "3..10 'User defined device'"
    );
    assert_eq!(def.resolve(7).unwrap().to_string(), "3..10 'User defined device'");
}

#[test]
fn template_variants() {
    for (format, expected) in [
        ("0x{value:02X}", "0x03..0A"),
        ("0x{min:02X}-{max:02X}", "0x03-0A"),
        ("{name} = {value}", "USER_DEFINED = 3..10"),
        ("{brief!r}", "'User defined device'"),
        ("{low}/{high} {ref:>12}", "3/10   sub.10.2.3"),
    ] {
        let def = annotated(format);
        assert_eq!(def.get("USER_DEFINED").unwrap().to_string(), expected, "{format}");
    }
}

#[test]
fn arity_mismatch_is_rejected() {
    let err = EnumBuilder::new("Devices")
        .attributes(["brief", "ref"])
        .member("PRIMARY", (1, "only one extra field"))
        .build()
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "item \"PRIMARY\" descriptor contains 2 fields, 3 required"
    );
}

#[test]
fn overlap_is_rejected() {
    let err = EnumBuilder::new("Devices")
        .member("A", (1, 5))
        .member("B", (5, 10))
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::OverlappingRanges { .. }));
    assert!(err.is_construction_error());
}

#[test]
fn definitions_are_shareable_across_threads() {
    let def = std::sync::Arc::new(devices());
    let handles: Vec<_> = (0..4)
        .map(|offset| {
            let def = std::sync::Arc::clone(&def);
            std::thread::spawn(move || {
                (0..20)
                    .map(|value| def.try_resolve(value + offset).map(|m| m.name().to_owned()))
                    .filter(Option::is_some)
                    .count()
            })
        })
        .collect();
    let counts: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(counts, [15, 15, 14, 13]);
}
