//! Feature graph integration tests
//!
//! Builds features from complete definition documents and validates the
//! resolved graph: identifier computation, the fixed-point type resolver,
//! the flat child index, and the short-identifier lookup contract.

use silarpc_framework::{
    BasicType, DataType, Feature, FeatureNode, FrameworkError, FullyQualifiedIdentifier,
};

const TEMPERATURE_CONTROLLER: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Feature SiLA2Version="1.0" FeatureVersion="2.1" Originator="org.example"
         Category="instruments.heating" MaturityLevel="Verified" Locale="en-us"
         xmlns="http://www.sila-standard.org">
  <Identifier>TemperatureController</Identifier>
  <DisplayName>Temperature Controller</DisplayName>
  <Description>Controls the temperature of a sample chamber.</Description>

  <DefinedExecutionError>
    <Identifier>TemperatureOutOfRange</Identifier>
    <DisplayName>Temperature Out Of Range</DisplayName>
    <Description>The requested target temperature cannot be reached.</Description>
  </DefinedExecutionError>

  <DataTypeDefinition>
    <Identifier>TemperatureRange</Identifier>
    <DisplayName>Temperature Range</DisplayName>
    <Description>Lower and upper bound of a temperature window.</Description>
    <DataType>
      <Structure>
        <Element>
          <Identifier>Lower</Identifier>
          <DisplayName>Lower</DisplayName>
          <Description>Lower bound.</Description>
          <DataType><DataTypeIdentifier>Temperature</DataTypeIdentifier></DataType>
        </Element>
        <Element>
          <Identifier>Upper</Identifier>
          <DisplayName>Upper</DisplayName>
          <Description>Upper bound.</Description>
          <DataType><DataTypeIdentifier>Temperature</DataTypeIdentifier></DataType>
        </Element>
      </Structure>
    </DataType>
  </DataTypeDefinition>

  <DataTypeDefinition>
    <Identifier>Temperature</Identifier>
    <DisplayName>Temperature</DisplayName>
    <Description>A temperature in Kelvin.</Description>
    <DataType><Basic>Real</Basic></DataType>
  </DataTypeDefinition>

  <Property>
    <Identifier>CurrentTemperature</Identifier>
    <DisplayName>Current Temperature</DisplayName>
    <Description>The chamber temperature right now.</Description>
    <Observable>Yes</Observable>
    <DataType><DataTypeIdentifier>Temperature</DataTypeIdentifier></DataType>
  </Property>

  <Property>
    <Identifier>DeviceName</Identifier>
    <DisplayName>Device Name</DisplayName>
    <Description>Name of the controller.</Description>
    <Observable>No</Observable>
    <DataType><Basic>String</Basic></DataType>
  </Property>

  <Command>
    <Identifier>ControlTemperature</Identifier>
    <DisplayName>Control Temperature</DisplayName>
    <Description>Ramps the chamber to a target temperature.</Description>
    <Observable>Yes</Observable>
    <Parameter>
      <Identifier>TargetTemperature</Identifier>
      <DisplayName>Target Temperature</DisplayName>
      <Description>Temperature to reach.</Description>
      <DataType><DataTypeIdentifier>Temperature</DataTypeIdentifier></DataType>
    </Parameter>
    <IntermediateResponse>
      <Identifier>CurrentTemperature</Identifier>
      <DisplayName>Current Temperature</DisplayName>
      <Description>Temperature while ramping.</Description>
      <DataType><DataTypeIdentifier>Temperature</DataTypeIdentifier></DataType>
    </IntermediateResponse>
    <Response>
      <Identifier>ReachedTemperature</Identifier>
      <DisplayName>Reached Temperature</DisplayName>
      <Description>Temperature at completion.</Description>
      <DataType><DataTypeIdentifier>Temperature</DataTypeIdentifier></DataType>
    </Response>
    <DefinedExecutionErrors>
      <Identifier>TemperatureOutOfRange</Identifier>
    </DefinedExecutionErrors>
  </Command>

  <Command>
    <Identifier>Reset</Identifier>
    <DisplayName>Reset</DisplayName>
    <Description>Returns the controller to its idle state.</Description>
    <Observable>No</Observable>
  </Command>

  <Metadata>
    <Identifier>AccessToken</Identifier>
    <DisplayName>Access Token</DisplayName>
    <Description>Token authorizing temperature changes.</Description>
    <DataType><Basic>String</Basic></DataType>
  </Metadata>
</Feature>
"#;

#[test]
fn test_feature_identifier_uses_major_version_only() {
    let feature = Feature::new(TEMPERATURE_CONTROLLER).unwrap();
    assert_eq!(
        feature.fully_qualified_identifier().as_str(),
        "org.example/instruments.heating/TemperatureController/v2"
    );
    assert_eq!(feature.feature_version(), "2.1");
    assert_eq!(feature.feature_version_major(), 2);
}

#[test]
fn test_root_attribute_defaults() {
    let minimal = r#"<Feature SiLA2Version="1.0" FeatureVersion="1.0" Originator="org.example">
        <Identifier>Empty</Identifier>
        <DisplayName>Empty</DisplayName>
        <Description>Nothing.</Description>
    </Feature>"#;
    let feature = Feature::new(minimal).unwrap();
    assert_eq!(feature.category(), "none");
    assert_eq!(feature.maturity_level(), "Draft");
    assert_eq!(feature.locale(), "en-us");
    assert_eq!(
        feature.fully_qualified_identifier().as_str(),
        "org.example/none/Empty/v1"
    );
}

#[test]
fn test_missing_required_attribute_is_fatal() {
    let missing = r#"<Feature SiLA2Version="1.0" FeatureVersion="1.0">
        <Identifier>Broken</Identifier>
    </Feature>"#;
    let err = Feature::new(missing).unwrap_err();
    match err {
        FrameworkError::MissingAttribute { attribute } => assert_eq!(attribute, "Originator"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_malformed_xml_is_fatal() {
    assert!(matches!(
        Feature::new("<Feature><unclosed>").unwrap_err(),
        FrameworkError::Xml(_)
    ));
}

#[test]
fn test_forward_references_resolve_out_of_order() {
    // TemperatureRange is declared before Temperature and references it.
    let feature = Feature::new(TEMPERATURE_CONTROLLER).unwrap();
    let range = &feature.data_type_definitions()["TemperatureRange"];
    match &range.data_type {
        DataType::Structure(elements) => {
            assert_eq!(elements.len(), 2);
            match &elements[0].data_type {
                DataType::Definition { identifier, resolved } => {
                    assert_eq!(identifier, "Temperature");
                    assert_eq!(**resolved, DataType::Basic(BasicType::Real));
                }
                other => panic!("expected resolved definition reference, got {other:?}"),
            }
        }
        other => panic!("expected structure, got {other:?}"),
    }
}

#[test]
fn test_cyclic_definitions_name_all_participants() {
    let cyclic = r#"<Feature SiLA2Version="1.0" FeatureVersion="1.0" Originator="org.example">
        <Identifier>Cyclic</Identifier>
        <DisplayName>Cyclic</DisplayName>
        <Description>Contains a definition cycle.</Description>
        <DataTypeDefinition>
            <Identifier>A</Identifier>
            <DisplayName>A</DisplayName>
            <Description>References B.</Description>
            <DataType><DataTypeIdentifier>B</DataTypeIdentifier></DataType>
        </DataTypeDefinition>
        <DataTypeDefinition>
            <Identifier>B</Identifier>
            <DisplayName>B</DisplayName>
            <Description>References A.</Description>
            <DataType><DataTypeIdentifier>A</DataTypeIdentifier></DataType>
        </DataTypeDefinition>
    </Feature>"#;
    let err = Feature::new(cyclic).unwrap_err();
    let mut unresolved = err.unresolved_identifiers().expect("cycle error");
    unresolved.sort_unstable();
    assert_eq!(unresolved, vec!["A", "B"]);
    let message = err.to_string();
    assert!(message.contains('A') && message.contains('B'), "{message}");
}

#[test]
fn test_self_referencing_definition_is_cyclic() {
    let cyclic = r#"<Feature SiLA2Version="1.0" FeatureVersion="1.0" Originator="org.example">
        <Identifier>SelfCycle</Identifier>
        <DisplayName>Self Cycle</DisplayName>
        <Description>One definition referencing itself.</Description>
        <DataTypeDefinition>
            <Identifier>Loop</Identifier>
            <DisplayName>Loop</DisplayName>
            <Description>References itself.</Description>
            <DataType><List><DataType><DataTypeIdentifier>Loop</DataTypeIdentifier></DataType></List></DataType>
        </DataTypeDefinition>
    </Feature>"#;
    let err = Feature::new(cyclic).unwrap_err();
    assert_eq!(err.unresolved_identifiers(), Some(vec!["Loop"]));
}

#[test]
fn test_every_node_is_indexed_by_its_own_identifier() {
    let feature = Feature::new(TEMPERATURE_CONTROLLER).unwrap();
    let fqi = feature.fully_qualified_identifier().clone();

    let expected: Vec<FullyQualifiedIdentifier> = vec![
        fqi.clone(),
        fqi.defined_execution_error("TemperatureOutOfRange"),
        fqi.data_type("Temperature"),
        fqi.data_type("TemperatureRange"),
        fqi.property("CurrentTemperature"),
        fqi.property("DeviceName"),
        fqi.command("ControlTemperature"),
        fqi.command("ControlTemperature").parameter("TargetTemperature"),
        fqi.command("ControlTemperature").response("ReachedTemperature"),
        fqi.command("ControlTemperature")
            .intermediate_response("CurrentTemperature"),
        fqi.command("Reset"),
        fqi.metadata("AccessToken"),
    ];

    for identifier in &expected {
        assert!(
            feature.child(identifier).is_some(),
            "missing index entry for {identifier}"
        );
    }
    assert_eq!(feature.children().len(), expected.len());
}

#[test]
fn test_indexed_nodes_are_the_owned_nodes() {
    // Round-trip: parse -> index -> lookup must yield the same objects the
    // typed maps own, not copies.
    let feature = Feature::new(TEMPERATURE_CONTROLLER).unwrap();
    let fqi = feature.fully_qualified_identifier();

    let from_index = feature.child(&fqi.command("ControlTemperature")).unwrap();
    let from_map = &feature.observable_commands()["ControlTemperature"];
    match from_index {
        FeatureNode::Command(command) => assert!(std::sync::Arc::ptr_eq(command, from_map)),
        other => panic!("expected command, got {other:?}"),
    }

    let parameter = fqi.command("ControlTemperature").parameter("TargetTemperature");
    match feature.child(&parameter).unwrap() {
        FeatureNode::Parameter(field) => assert_eq!(field.identifier(), "TargetTemperature"),
        other => panic!("expected parameter, got {other:?}"),
    }
}

#[test]
fn test_get_follows_priority_order() {
    let feature = Feature::new(TEMPERATURE_CONTROLLER).unwrap();

    match feature.get("DeviceName").unwrap() {
        FeatureNode::Property(p) => assert!(!p.observable),
        other => panic!("expected property, got {other:?}"),
    }
    match feature.get("CurrentTemperature").unwrap() {
        FeatureNode::Property(p) => assert!(p.observable),
        other => panic!("expected property, got {other:?}"),
    }
    match feature.get("Reset").unwrap() {
        FeatureNode::Command(c) => assert!(!c.observable),
        other => panic!("expected command, got {other:?}"),
    }
    match feature.get("ControlTemperature").unwrap() {
        FeatureNode::Command(c) => assert!(c.observable),
        other => panic!("expected command, got {other:?}"),
    }
    match feature.get("AccessToken").unwrap() {
        FeatureNode::Metadata(m) => assert_eq!(m.identifier(), "AccessToken"),
        other => panic!("expected metadata, got {other:?}"),
    }

    match feature.get("NoSuchChild").unwrap_err() {
        FrameworkError::ChildNotFound { feature, identifier } => {
            assert_eq!(feature, "TemperatureController");
            assert_eq!(identifier, "NoSuchChild");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_get_returns_same_object_as_typed_maps() {
    let feature = Feature::new(TEMPERATURE_CONTROLLER).unwrap();
    match feature.get("ControlTemperature").unwrap() {
        FeatureNode::Command(command) => assert!(std::sync::Arc::ptr_eq(
            &command,
            &feature.observable_commands()["ControlTemperature"]
        )),
        other => panic!("expected command, got {other:?}"),
    }
}

#[test]
fn test_undeclared_execution_error_reference_is_fatal() {
    let invalid = r#"<Feature SiLA2Version="1.0" FeatureVersion="1.0" Originator="org.example">
        <Identifier>BadErrors</Identifier>
        <DisplayName>Bad Errors</DisplayName>
        <Description>References an unknown error.</Description>
        <Command>
            <Identifier>Run</Identifier>
            <DisplayName>Run</DisplayName>
            <Description>Runs.</Description>
            <Observable>No</Observable>
            <DefinedExecutionErrors>
                <Identifier>NeverDeclared</Identifier>
            </DefinedExecutionErrors>
        </Command>
    </Feature>"#;
    let err = Feature::new(invalid).unwrap_err();
    assert!(err.to_string().contains("NeverDeclared"));
}

#[test]
fn test_intermediate_responses_require_observable() {
    let invalid = r#"<Feature SiLA2Version="1.0" FeatureVersion="1.0" Originator="org.example">
        <Identifier>BadCommand</Identifier>
        <DisplayName>Bad Command</DisplayName>
        <Description>Unobservable command with intermediates.</Description>
        <Command>
            <Identifier>Run</Identifier>
            <DisplayName>Run</DisplayName>
            <Description>Runs.</Description>
            <Observable>No</Observable>
            <IntermediateResponse>
                <Identifier>Progress</Identifier>
                <DisplayName>Progress</DisplayName>
                <Description>Progress.</Description>
                <DataType><Basic>Real</Basic></DataType>
            </IntermediateResponse>
        </Command>
    </Feature>"#;
    assert!(Feature::new(invalid).is_err());
}
