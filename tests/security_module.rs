use lifecycle_engine::security::{SecurityError, SecurityGate};
use serde_json::json;

#[test]
fn security_module_rejects_tagged_nodes_anywhere_in_a_document() {
    let document: serde_yaml::Value = serde_yaml::from_str(
        r#"
Name: Leaver
LifecycleEvent: Leaver
Steps:
  - Name: Disable
    Type: DisableIdentity
    With:
      Targets:
        - plain
        - !python/object "os.system"
"#,
    )
    .expect("yaml");

    let err = SecurityGate::default()
        .admit_yaml(document, "Workflow")
        .expect_err("tagged node");
    assert_eq!(err.path(), "Workflow.Steps[0].With.Targets[1]");
    assert!(matches!(
        err,
        SecurityError::ExecutableContentDetected { ref reason, .. } if reason.contains("python/object")
    ));
}

#[test]
fn security_module_admits_plain_yaml_into_the_json_model() {
    let document: serde_yaml::Value = serde_yaml::from_str(
        r#"
LifecycleEvent: Joiner
IdentityKeys:
  EmployeeId: 1001
DesiredState:
  Enabled: true
  Groups: [a, b]
"#,
    )
    .expect("yaml");

    let value = SecurityGate::default()
        .admit_yaml(document, "Request")
        .expect("plain data");
    assert_eq!(
        value,
        json!({
            "LifecycleEvent": "Joiner",
            "IdentityKeys": {"EmployeeId": 1001},
            "DesiredState": {"Enabled": true, "Groups": ["a", "b"]}
        })
    );
}

#[test]
fn security_module_rejects_non_string_keys_and_deep_nesting() {
    let document: serde_yaml::Value = serde_yaml::from_str("1: one\n").expect("yaml");
    let err = SecurityGate::default()
        .admit_yaml(document, "Request")
        .expect_err("integer key");
    assert!(matches!(err, SecurityError::InvalidKey { .. }));

    let nested = json!({"a": [[["deep"]]]});
    let err = SecurityGate::new(3)
        .validate(&nested, "Request")
        .expect_err("too deep");
    assert_eq!(err.path(), "Request.a[0][0]");
    assert!(matches!(err, SecurityError::NestingTooDeep { max_depth: 3, .. }));
}

#[test]
fn security_module_rejects_blank_keys_in_json() {
    let value = json!({"With": {" ": "x"}});
    let err = SecurityGate::default()
        .validate(&value, "Workflow")
        .expect_err("blank key");
    assert_eq!(err.path(), "Workflow.With");
}
