//! Structural validation of an [`EngineConfig`].
//!
//! Collects every problem instead of stopping at the first one. Field
//! paths use dots and indices, e.g. `components.0.items.1.sample`.

use std::collections::HashSet;

use super::{ComponentConfig, EngineConfig, ItemConfig};
use crate::errors::ValidationError;

/// Validate the whole document. An empty list means it is valid.
pub fn validate_engine(config: &EngineConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut titles = HashSet::new();

    for (index, component) in config.components.iter().enumerate() {
        let path = format!("components.{index}");
        if !titles.insert(component.title.as_str()) {
            errors.push(error(
                format!("{path}.title"),
                format!("duplicate component title '{}'", component.title),
            ));
        }
        validate_component(&path, component, &mut errors);
    }

    errors
}

fn validate_component(path: &str, component: &ComponentConfig, errors: &mut Vec<ValidationError>) {
    if component.title.trim().is_empty() {
        errors.push(error(format!("{path}.title"), "must not be empty"));
    }
    if component.rate_ms == 0 {
        errors.push(error(format!("{path}.rate-ms"), "must be positive"));
    }

    let mut labels = HashSet::new();
    for (index, item) in component.items.iter().enumerate() {
        let item_path = format!("{path}.items.{index}");
        validate_item(&item_path, item, errors);

        if item.label.is_none() && component.items.len() > 1 {
            errors.push(error(
                format!("{item_path}.label"),
                "is required when a component has several items",
            ));
            continue;
        }
        let label = component.item_label(index);
        if !labels.insert(label.clone()) {
            errors.push(error(
                format!("{item_path}.label"),
                format!("duplicate item label '{label}'"),
            ));
        }
    }

    for (index, trigger) in component.triggers.iter().enumerate() {
        if trigger.condition.trim().is_empty() {
            errors.push(error(
                format!("{path}.triggers.{index}.condition"),
                "must not be empty",
            ));
        }
    }
}

fn validate_item(path: &str, item: &ItemConfig, errors: &mut Vec<ValidationError>) {
    if item.sample.trim().is_empty() {
        errors.push(error(format!("{path}.sample"), "is required"));
    }
    if item.init.is_some() && item.multistep_init.is_some() {
        errors.push(error(
            format!("{path}.init"),
            "init and multistep-init are mutually exclusive",
        ));
    }
    if item.multistep_init.as_ref().is_some_and(Vec::is_empty) {
        errors.push(error(format!("{path}.multistep-init"), "must not be empty"));
    }
}

fn error(field: String, message: impl Into<String>) -> ValidationError {
    ValidationError {
        field,
        message: message.into(),
    }
}
