use lifecycle_engine::shared::ids::{CapabilityId, OwnerId, StepTypeId};

#[test]
fn shared_ids_module_parses_domain_identifiers() {
    assert_eq!(StepTypeId::parse("EmitEvent").expect("id").as_str(), "EmitEvent");
    assert_eq!(
        StepTypeId::parse("Identity.Disable-v2").expect("id").as_str(),
        "Identity.Disable-v2"
    );
    assert_eq!(OwnerId::parse("Builtin").expect("id").as_str(), "Builtin");
    assert_eq!(
        CapabilityId::parse("Identity.Attribute.Ensure")
            .expect("id")
            .as_str(),
        "Identity.Attribute.Ensure"
    );

    assert!(StepTypeId::parse("").is_err());
    assert!(StepTypeId::parse("Emit Event").is_err());
    assert!(OwnerId::parse("pack/one").is_err());
    assert!(CapabilityId::parse("Identity").is_err());
    assert!(CapabilityId::parse("Identity.Dis-able").is_err());
}

#[test]
fn shared_ids_module_deserializes_through_validation() {
    let parsed: Vec<CapabilityId> =
        serde_yaml::from_str("- X.Read\n- X.Disable\n").expect("valid ids");
    assert_eq!(parsed[1].as_str(), "X.Disable");

    let err = serde_yaml::from_str::<Vec<CapabilityId>>("- X\n").expect_err("invalid id");
    assert!(err
        .to_string()
        .contains("capability id `X` is invalid: capability id must contain at least two"));

    let err = serde_yaml::from_str::<StepTypeId>("Emit Event").expect_err("invalid step type");
    assert!(err.to_string().contains("step type `Emit Event` is invalid"));
}
