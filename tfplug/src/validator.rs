//! Attribute validators and schema-driven configuration validation

use crate::schema::{child_path, Block, NestingMode, Schema, Validator, ValidatorRequest, ValidatorResponse};
use crate::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

/// Accepts only the listed string values
pub struct StringOneOf {
    allowed: Vec<String>,
}

impl StringOneOf {
    pub fn create(allowed: &[&str]) -> Box<dyn Validator> {
        Box::new(Self {
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
        })
    }
}

impl Validator for StringOneOf {
    fn description(&self) -> String {
        format!("value must be one of: {}", self.allowed.join(", "))
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = vec![];
        if let Some(value) = request.config_value.value.as_str() {
            if !self.allowed.iter().any(|a| a == value) {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid attribute value",
                        format!(
                            "{}: expected one of [{}], got {:?}",
                            request.path,
                            self.allowed.join(", "),
                            value
                        ),
                    )
                    .with_attribute(request.path),
                );
            }
        }
        ValidatorResponse { diagnostics }
    }
}

/// Rejects configurations that set this attribute together with any of `others`
pub struct ConflictsWith {
    others: Vec<String>,
}

impl ConflictsWith {
    pub fn create(others: &[&str]) -> Box<dyn Validator> {
        Box::new(Self {
            others: others.iter().map(|s| s.to_string()).collect(),
        })
    }
}

impl Validator for ConflictsWith {
    fn description(&self) -> String {
        format!("cannot be set together with: {}", self.others.join(", "))
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = vec![];
        if request.config_value.is_null() {
            return ValidatorResponse { diagnostics };
        }

        for other in &self.others {
            let set = request
                .config
                .get(&AttributePath::new(other))
                .map(|v| !v.is_null())
                .unwrap_or(false);
            if set {
                diagnostics.push(
                    Diagnostic::error(
                        "Conflicting configuration arguments",
                        format!("\"{}\": conflicts with {}", request.path, other),
                    )
                    .with_attribute(request.path.clone()),
                );
            }
        }
        ValidatorResponse { diagnostics }
    }
}

/// Checks required attributes and blocks, then runs attribute validators
pub fn validate_config(schema: &Schema, config: &DynamicValue) -> Vec<Diagnostic> {
    let mut diagnostics = vec![];
    validate_block(&schema.block, &AttributePath::root(), config, &mut diagnostics);
    diagnostics
}

fn validate_block(
    block: &Block,
    base: &AttributePath,
    config: &DynamicValue,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for attr in &block.attributes {
        let path = child_path(base, &attr.name);
        let value = config.get(&path).cloned().unwrap_or(Dynamic::Null);

        if value.is_null() {
            if attr.required {
                diagnostics.push(
                    Diagnostic::error(
                        "Missing required argument",
                        format!("The argument \"{}\" is required, but no definition was found.", path),
                    )
                    .with_attribute(path),
                );
            }
            continue;
        }
        // Unknown values are validated once they are known
        if value.is_unknown() {
            continue;
        }

        for validator in &attr.validators {
            let response = validator.validate(ValidatorRequest {
                config: config.clone(),
                config_value: DynamicValue::new(value.clone()),
                path: path.clone(),
            });
            diagnostics.extend(response.diagnostics);
        }
    }

    for nested in &block.block_types {
        let path = child_path(base, &nested.type_name);
        match config.get(&path) {
            Ok(Dynamic::Map(_)) if nested.nesting == NestingMode::Single => {
                validate_block(&nested.block, &path, config, diagnostics);
            }
            Ok(Dynamic::List(items)) => {
                if (items.len() as i64) < nested.min_items {
                    diagnostics.push(missing_block(&path, nested.min_items));
                }
            }
            _ if nested.min_items > 0 => diagnostics.push(missing_block(&path, nested.min_items)),
            _ => {}
        }
    }
}

fn missing_block(path: &AttributePath, min_items: i64) -> Diagnostic {
    Diagnostic::error(
        "Insufficient blocks",
        format!("At least {} \"{}\" block is required.", min_items, path),
    )
    .with_attribute(path.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeBuilder, AttributeType, BlockBuilder, SchemaBuilder};

    fn schema() -> Schema {
        SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("vhost", AttributeType::String)
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("arguments", AttributeType::Dynamic)
                    .optional()
                    .validator(ConflictsWith::create(&["arguments_json"]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("arguments_json", AttributeType::String)
                    .optional()
                    .build(),
            )
            .block(
                BlockBuilder::new()
                    .attribute(
                        AttributeBuilder::new("type", AttributeType::String)
                            .required()
                            .validator(StringOneOf::create(&["classic", "quorum", "stream"]))
                            .build(),
                    )
                    .single("settings"),
            )
            .build()
    }

    fn base_config() -> DynamicValue {
        let mut config = DynamicValue::object();
        config.set_string(&AttributePath::new("vhost"), "/").unwrap();
        config
            .set_string(&AttributePath::new("settings").attribute("type"), "quorum")
            .unwrap();
        config
    }

    #[test]
    fn valid_config_passes() {
        assert!(validate_config(&schema(), &base_config()).is_empty());
    }

    #[test]
    fn missing_required_attribute_is_reported() {
        let mut config = base_config();
        config.set_null(&AttributePath::new("vhost")).unwrap();

        let diags = validate_config(&schema(), &config);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Missing required argument");
    }

    #[test]
    fn missing_single_block_is_reported() {
        let mut config = DynamicValue::object();
        config.set_string(&AttributePath::new("vhost"), "/").unwrap();

        let diags = validate_config(&schema(), &config);
        assert_eq!(diags[0].summary, "Insufficient blocks");
    }

    #[test]
    fn one_of_rejects_unknown_queue_type() {
        let mut config = base_config();
        config
            .set_string(&AttributePath::new("settings").attribute("type"), "lazy")
            .unwrap();

        let diags = validate_config(&schema(), &config);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].detail.contains("lazy"));
    }

    #[test]
    fn conflicting_arguments_are_rejected() {
        let mut config = base_config();
        config
            .set_map(&AttributePath::new("arguments"), Default::default())
            .unwrap();
        config
            .set_string(&AttributePath::new("arguments_json"), "{}")
            .unwrap();

        let diags = validate_config(&schema(), &config);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Conflicting configuration arguments");
    }
}
