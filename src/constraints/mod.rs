//! Built-in constraint vocabulary.
//!
//! Definitions and validator implementations for the constraint kinds the
//! crate ships with: `NotNull`, `NotBlank`, `NotEmpty`, `AssertTrue`,
//! `Min`, `Max`, `Size`, `Pattern` and the composed `Email`. `NotEmpty` and
//! `Size` register one validator per supported container shape, which is
//! what exercises most-specific validator resolution.

use regex::Regex;
use serde_json::json;

use crate::error::CollaboratorError;
use crate::job::ConstraintValidatorContext;
use crate::registry::{
    attrs, AttributeMap, ConstraintDefinition, ConstraintRegistry, ConstraintValidator,
    RegistryError, ValidatorInfo,
};
use crate::value::{Value, ValueType};

const EMAIL_REGEXP: &str = r"[^@\s]+@[^@\s]+\.[^@\s]+";

/// Bundled default message texts, keyed by message template.
pub(crate) fn default_message(template: &str) -> Option<&'static str> {
    match template {
        "{NotNull.message}" => Some("must not be null"),
        "{NotBlank.message}" => Some("must not be blank"),
        "{NotEmpty.message}" => Some("must not be empty"),
        "{AssertTrue.message}" => Some("must be true"),
        "{Min.message}" => Some("must be greater than or equal to {value}"),
        "{Max.message}" => Some("must be less than or equal to {value}"),
        "{Size.message}" => Some("size must be between {min} and {max}"),
        "{Pattern.message}" => Some("must match \"{regexp}\""),
        "{Email.message}" => Some("must be a well-formed email address"),
        _ => None,
    }
}

/// Registers the built-in definitions and validators.
pub(crate) fn register_builtins(registry: &ConstraintRegistry) -> Result<(), RegistryError> {
    registry.register_definition(ConstraintDefinition::new("NotNull"))?;
    registry.register_validator(
        "NotNull",
        ValidatorInfo::new("NotNull.any", ValueType::Any, || NotNullValidator),
    )?;

    registry.register_definition(ConstraintDefinition::new("NotBlank"))?;
    registry.register_validator(
        "NotBlank",
        ValidatorInfo::new("NotBlank.str", ValueType::Str, || NotBlankValidator),
    )?;

    registry.register_definition(ConstraintDefinition::new("NotEmpty"))?;
    registry.register_validator(
        "NotEmpty",
        ValidatorInfo::new("NotEmpty.str", ValueType::Str, || NotEmptyValidator),
    )?;
    registry.register_validator(
        "NotEmpty",
        ValidatorInfo::new("NotEmpty.list", ValueType::List, || NotEmptyValidator),
    )?;
    registry.register_validator(
        "NotEmpty",
        ValidatorInfo::new("NotEmpty.map", ValueType::Map, || NotEmptyValidator),
    )?;

    registry.register_definition(ConstraintDefinition::new("AssertTrue"))?;
    registry.register_validator(
        "AssertTrue",
        ValidatorInfo::new("AssertTrue.bool", ValueType::Bool, || AssertTrueValidator),
    )?;

    registry
        .register_definition(ConstraintDefinition::new("Min").attribute("value", json!(0)))?;
    registry.register_validator(
        "Min",
        ValidatorInfo::new("Min.number", ValueType::Number, || BoundValidator::min()),
    )?;

    registry
        .register_definition(ConstraintDefinition::new("Max").attribute("value", json!(0)))?;
    registry.register_validator(
        "Max",
        ValidatorInfo::new("Max.number", ValueType::Number, || BoundValidator::max()),
    )?;

    registry.register_definition(
        ConstraintDefinition::new("Size")
            .attribute("min", json!(0))
            .attribute("max", json!(i32::MAX)),
    )?;
    registry.register_validator(
        "Size",
        ValidatorInfo::new("Size.str", ValueType::Str, SizeValidator::default),
    )?;
    registry.register_validator(
        "Size",
        ValidatorInfo::new("Size.list", ValueType::List, SizeValidator::default),
    )?;
    registry.register_validator(
        "Size",
        ValidatorInfo::new("Size.map", ValueType::Map, SizeValidator::default),
    )?;

    registry.register_definition(
        ConstraintDefinition::new("Pattern").attribute("regexp", json!(".*")),
    )?;
    registry.register_validator(
        "Pattern",
        ValidatorInfo::new("Pattern.str", ValueType::Str, PatternValidator::default),
    )?;

    registry.register_definition(
        ConstraintDefinition::new("Email")
            .attribute("regexp", json!(EMAIL_REGEXP))
            .composing("Pattern", attrs([]))
            .composing("NotNull", attrs([]))
            .override_attribute("regexp", "Pattern", None, None)
            .report_as_single_violation(),
    )?;
    registry.register_validator(
        "Email",
        ValidatorInfo::new("Email.str", ValueType::Str, PatternValidator::default),
    )?;

    Ok(())
}

struct NotNullValidator;

impl ConstraintValidator for NotNullValidator {
    fn is_valid(&self, value: &Value, _ctx: &mut ConstraintValidatorContext<'_>) -> bool {
        !value.is_null()
    }
}

struct NotBlankValidator;

impl ConstraintValidator for NotBlankValidator {
    fn is_valid(&self, value: &Value, _ctx: &mut ConstraintValidatorContext<'_>) -> bool {
        match value {
            Value::Str(s) => !s.trim().is_empty(),
            _ => false,
        }
    }
}

struct NotEmptyValidator;

impl ConstraintValidator for NotEmptyValidator {
    fn is_valid(&self, value: &Value, _ctx: &mut ConstraintValidatorContext<'_>) -> bool {
        match value {
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
            _ => false,
        }
    }
}

struct AssertTrueValidator;

impl ConstraintValidator for AssertTrueValidator {
    fn is_valid(&self, value: &Value, _ctx: &mut ConstraintValidatorContext<'_>) -> bool {
        match value {
            Value::Null => true,
            Value::Bool(b) => *b,
            _ => false,
        }
    }
}

/// Shared implementation of `Min` and `Max`.
struct BoundValidator {
    upper: bool,
    bound: i64,
}

impl BoundValidator {
    fn min() -> Self {
        Self {
            upper: false,
            bound: 0,
        }
    }

    fn max() -> Self {
        Self {
            upper: true,
            bound: 0,
        }
    }
}

impl ConstraintValidator for BoundValidator {
    fn initialize(&mut self, attributes: &AttributeMap) -> Result<(), CollaboratorError> {
        self.bound = attributes
            .get("value")
            .and_then(|v| v.as_i64())
            .ok_or("bound constraints require an integer value attribute")?;
        Ok(())
    }

    fn is_valid(&self, value: &Value, _ctx: &mut ConstraintValidatorContext<'_>) -> bool {
        match value {
            Value::Null => true,
            Value::Int(i) => {
                if self.upper {
                    *i <= self.bound
                } else {
                    *i >= self.bound
                }
            }
            Value::Float(x) => {
                if self.upper {
                    *x <= self.bound as f64
                } else {
                    *x >= self.bound as f64
                }
            }
            _ => false,
        }
    }
}

#[derive(Default)]
struct SizeValidator {
    min: usize,
    max: usize,
}

impl ConstraintValidator for SizeValidator {
    fn initialize(&mut self, attributes: &AttributeMap) -> Result<(), CollaboratorError> {
        self.min = attributes
            .get("min")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize;
        self.max = attributes
            .get("max")
            .and_then(|v| v.as_u64())
            .unwrap_or(i32::MAX as u64) as usize;
        if self.min > self.max {
            return Err(format!("Size declares min {} greater than max {}", self.min, self.max).into());
        }
        Ok(())
    }

    fn is_valid(&self, value: &Value, _ctx: &mut ConstraintValidatorContext<'_>) -> bool {
        let length = match value {
            Value::Null => return true,
            Value::Str(s) => s.chars().count(),
            Value::List(items) => items.len(),
            Value::Map(entries) => entries.len(),
            _ => return false,
        };
        length >= self.min && length <= self.max
    }
}

#[derive(Default)]
struct PatternValidator {
    regex: Option<Regex>,
}

impl ConstraintValidator for PatternValidator {
    fn initialize(&mut self, attributes: &AttributeMap) -> Result<(), CollaboratorError> {
        let pattern = attributes
            .get("regexp")
            .and_then(|v| v.as_str())
            .ok_or("pattern constraints require a regexp attribute")?;
        // Whole-value match, as the declared pattern describes the value.
        let anchored = format!("^(?:{})$", pattern);
        self.regex = Some(Regex::new(&anchored)?);
        Ok(())
    }

    fn is_valid(&self, value: &Value, _ctx: &mut ConstraintValidatorContext<'_>) -> bool {
        match value {
            Value::Null => true,
            Value::Str(s) => self
                .regex
                .as_ref()
                .map(|regex| regex.is_match(s))
                .unwrap_or(false),
            _ => false,
        }
    }
}
