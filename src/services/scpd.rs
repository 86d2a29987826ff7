//! Rendu du document SCPD d'un service.

use xmltree::Element;

use crate::config::{Direction, ServiceDescription};
use crate::xmlutil::{emit_document, push_child, text_element};

const SERVICE_NS: &str = "urn:schemas-upnp-org:service-1-0";

/// Construit l'arbre XML du SCPD à partir de la description.
pub(crate) fn scpd_element(description: &ServiceDescription, config_id: u32) -> Element {
    let mut root = Element::new("scpd");
    root.attributes
        .insert("xmlns".to_string(), SERVICE_NS.to_string());
    root.attributes
        .insert("configId".to_string(), config_id.to_string());

    let mut spec = Element::new("specVersion");
    push_child(&mut spec, text_element("major", "1"));
    push_child(&mut spec, text_element("minor", "1"));
    push_child(&mut root, spec);

    let mut action_list = Element::new("actionList");
    for action in &description.actions {
        let mut action_elem = Element::new("action");
        push_child(&mut action_elem, text_element("name", action.name.clone()));

        if !action.arguments.is_empty() {
            let mut argument_list = Element::new("argumentList");
            for argument in &action.arguments {
                let mut argument_elem = Element::new("argument");
                push_child(&mut argument_elem, text_element("name", argument.name.clone()));
                let direction = match argument.direction {
                    Direction::In => "in",
                    Direction::Out => "out",
                };
                push_child(&mut argument_elem, text_element("direction", direction));
                push_child(
                    &mut argument_elem,
                    text_element(
                        "relatedStateVariable",
                        argument.related_state_variable.clone(),
                    ),
                );
                push_child(&mut argument_list, argument_elem);
            }
            push_child(&mut action_elem, argument_list);
        }

        push_child(&mut action_list, action_elem);
    }
    push_child(&mut root, action_list);

    let mut state_table = Element::new("serviceStateTable");
    for variable in &description.variables {
        let mut var_elem = Element::new("stateVariable");
        var_elem.attributes.insert(
            "sendEvents".to_string(),
            if variable.send_events { "yes" } else { "no" }.to_string(),
        );
        if variable.multicast {
            var_elem
                .attributes
                .insert("multicast".to_string(), "yes".to_string());
        }

        push_child(&mut var_elem, text_element("name", variable.name.clone()));
        push_child(&mut var_elem, text_element("dataType", variable.data_type.clone()));
        if let Some(default) = &variable.default_value {
            push_child(&mut var_elem, text_element("defaultValue", default.clone()));
        }

        if !variable.allowed_values.is_empty() {
            let mut value_list = Element::new("allowedValueList");
            for value in &variable.allowed_values {
                push_child(&mut value_list, text_element("allowedValue", value.clone()));
            }
            push_child(&mut var_elem, value_list);
        }

        if let Some(range) = &variable.allowed_range {
            let mut range_elem = Element::new("allowedValueRange");
            push_child(&mut range_elem, text_element("minimum", range.minimum.clone()));
            push_child(&mut range_elem, text_element("maximum", range.maximum.clone()));
            if let Some(step) = &range.step {
                push_child(&mut range_elem, text_element("step", step.clone()));
            }
            push_child(&mut var_elem, range_elem);
        }

        push_child(&mut state_table, var_elem);
    }
    push_child(&mut root, state_table);

    root
}

pub(crate) fn scpd_document(
    description: &ServiceDescription,
    config_id: u32,
) -> Result<String, xmltree::Error> {
    emit_document(&scpd_element(description, config_id))
}
