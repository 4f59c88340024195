//! Mapping between the declarative `settings` block and the wire settings
//! of exchanges and queues

use crate::api::exchanges::{ExchangeInfo, ExchangeSettings};
use crate::api::queues::{QueueInfo, QueueSettings};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tfplug::types::Dynamic;
use thiserror::Error;

pub const DEFAULT_DURABLE: bool = true;
pub const DEFAULT_AUTO_DELETE: bool = false;

/// Argument carrying the queue type on the wire
pub const QUEUE_TYPE_ARGUMENT: &str = "x-queue-type";

/// Ordered so that serialized arguments are stable
pub type Arguments = BTreeMap<String, ArgumentValue>;

/// A single argument value, passed to the broker without interpretation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    Null,
    Bool(bool),
    /// Keeps integers integral, e.g. `x-message-ttl: 5000`
    Number(serde_json::Number),
    String(String),
    List(Vec<ArgumentValue>),
    Map(BTreeMap<String, ArgumentValue>),
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings.type is required")]
    MissingType,

    #[error("settings.{field} must be a {expected}")]
    InvalidField {
        field: String,
        expected: &'static str,
    },

    #[error("argument '{0}' is not a finite number")]
    InvalidNumber(String),

    #[error("argument '{0}' is not known yet")]
    UnknownArgument(String),

    #[error("arguments must be a map of values")]
    InvalidArguments,

    #[error("invalid arguments JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl ArgumentValue {
    pub fn from_dynamic(key: &str, value: &Dynamic) -> Result<Self, SettingsError> {
        Ok(match value {
            Dynamic::Null => ArgumentValue::Null,
            Dynamic::Bool(b) => ArgumentValue::Bool(*b),
            Dynamic::Number(n) => ArgumentValue::Number(number_from_f64(key, *n)?),
            Dynamic::String(s) => ArgumentValue::String(s.clone()),
            Dynamic::List(items) => ArgumentValue::List(
                items
                    .iter()
                    .map(|item| Self::from_dynamic(key, item))
                    .collect::<Result<_, _>>()?,
            ),
            Dynamic::Map(map) => ArgumentValue::Map(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), Self::from_dynamic(k, v)?)))
                    .collect::<Result<_, SettingsError>>()?,
            ),
            Dynamic::Unknown => return Err(SettingsError::UnknownArgument(key.to_string())),
        })
    }

    pub fn to_dynamic(&self) -> Dynamic {
        match self {
            ArgumentValue::Null => Dynamic::Null,
            ArgumentValue::Bool(b) => Dynamic::Bool(*b),
            ArgumentValue::Number(n) => Dynamic::Number(n.as_f64().unwrap_or_default()),
            ArgumentValue::String(s) => Dynamic::String(s.clone()),
            ArgumentValue::List(items) => {
                Dynamic::List(items.iter().map(ArgumentValue::to_dynamic).collect())
            }
            ArgumentValue::Map(map) => Dynamic::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_dynamic()))
                    .collect(),
            ),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgumentValue::String(s) => Some(s),
            _ => None,
        }
    }
}

fn number_from_f64(key: &str, n: f64) -> Result<serde_json::Number, SettingsError> {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        return Ok(serde_json::Number::from(n as i64));
    }
    serde_json::Number::from_f64(n).ok_or_else(|| SettingsError::InvalidNumber(key.to_string()))
}

/// Null and absent argument maps both mean "no arguments"
pub fn arguments_from_dynamic(value: &Dynamic) -> Result<Arguments, SettingsError> {
    match value {
        Dynamic::Null => Ok(Arguments::new()),
        Dynamic::Map(map) => map
            .iter()
            .map(|(k, v)| Ok((k.clone(), ArgumentValue::from_dynamic(k, v)?)))
            .collect(),
        _ => Err(SettingsError::InvalidArguments),
    }
}

pub fn arguments_to_dynamic(arguments: &Arguments) -> Dynamic {
    Dynamic::Map(
        arguments
            .iter()
            .map(|(k, v)| (k.clone(), v.to_dynamic()))
            .collect(),
    )
}

pub fn arguments_from_json(json: &str) -> Result<Arguments, SettingsError> {
    Ok(serde_json::from_str(json)?)
}

pub fn arguments_to_json(arguments: &Arguments) -> Result<String, SettingsError> {
    Ok(serde_json::to_string(arguments)?)
}

/// Declarative exchange or queue settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Exchange type (`direct`, `fanout`, ...) or queue type (`classic`, `quorum`, `stream`)
    pub kind: String,
    pub durable: bool,
    pub auto_delete: bool,
    pub arguments: Arguments,
}

impl Settings {
    /// Reads a `settings { ... }` block, applying defaults for unset keys
    pub fn from_block(block: &BTreeMap<String, Dynamic>) -> Result<Self, SettingsError> {
        let kind = match block.get("type") {
            Some(Dynamic::String(kind)) if !kind.is_empty() => kind.clone(),
            Some(Dynamic::String(_)) | Some(Dynamic::Null) | None => {
                return Err(SettingsError::MissingType)
            }
            Some(_) => {
                return Err(SettingsError::InvalidField {
                    field: "type".to_string(),
                    expected: "string",
                })
            }
        };

        Ok(Self {
            kind,
            durable: bool_field(block, "durable", DEFAULT_DURABLE)?,
            auto_delete: bool_field(block, "auto_delete", DEFAULT_AUTO_DELETE)?,
            arguments: arguments_from_dynamic(block.get("arguments").unwrap_or(&Dynamic::Null))?,
        })
    }

    pub fn to_block(&self) -> BTreeMap<String, Dynamic> {
        BTreeMap::from([
            ("type".to_string(), Dynamic::String(self.kind.clone())),
            ("durable".to_string(), Dynamic::Bool(self.durable)),
            ("auto_delete".to_string(), Dynamic::Bool(self.auto_delete)),
            ("arguments".to_string(), arguments_to_dynamic(&self.arguments)),
        ])
    }

    pub fn to_exchange_settings(&self) -> ExchangeSettings {
        ExchangeSettings {
            exchange_type: self.kind.clone(),
            durable: self.durable,
            auto_delete: self.auto_delete,
            arguments: self.arguments.clone(),
        }
    }

    pub fn from_exchange(info: &ExchangeInfo) -> Self {
        Self {
            kind: info.exchange_type.clone(),
            durable: info.durable,
            auto_delete: info.auto_delete,
            arguments: info.arguments.clone(),
        }
    }

    pub fn to_queue_settings(&self) -> QueueSettings {
        let mut arguments = self.arguments.clone();
        arguments.insert(
            QUEUE_TYPE_ARGUMENT.to_string(),
            ArgumentValue::String(self.kind.clone()),
        );
        QueueSettings {
            durable: self.durable,
            auto_delete: self.auto_delete,
            arguments,
        }
    }

    pub fn from_queue(info: &QueueInfo) -> Self {
        let mut arguments = info.arguments.clone();
        let kind = info
            .queue_type
            .clone()
            .or_else(|| {
                arguments
                    .get(QUEUE_TYPE_ARGUMENT)
                    .and_then(ArgumentValue::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "classic".to_string());

        if arguments.get(QUEUE_TYPE_ARGUMENT).and_then(ArgumentValue::as_str) == Some(kind.as_str())
        {
            arguments.remove(QUEUE_TYPE_ARGUMENT);
        }

        Self {
            kind,
            durable: info.durable,
            auto_delete: info.auto_delete,
            arguments,
        }
    }

    /// Puts back the `x-queue-type` argument `from_queue` strips, for
    /// configurations that list it among their own arguments
    pub fn with_queue_type_argument(mut self) -> Self {
        self.arguments
            .entry(QUEUE_TYPE_ARGUMENT.to_string())
            .or_insert_with(|| ArgumentValue::String(self.kind.clone()));
        self
    }
}

fn bool_field(
    block: &BTreeMap<String, Dynamic>,
    field: &str,
    default: bool,
) -> Result<bool, SettingsError> {
    match block.get(field) {
        None | Some(Dynamic::Null) | Some(Dynamic::Unknown) => Ok(default),
        Some(Dynamic::Bool(b)) => Ok(*b),
        Some(Dynamic::String(s)) => s.parse::<bool>().map_err(|_| SettingsError::InvalidField {
            field: field.to_string(),
            expected: "bool",
        }),
        Some(_) => Err(SettingsError::InvalidField {
            field: field.to_string(),
            expected: "bool",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(pairs: &[(&str, Dynamic)]) -> BTreeMap<String, Dynamic> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn defaults_apply_to_unset_keys() {
        let settings = Settings::from_block(&block(&[("type", "direct".into())])).unwrap();

        assert_eq!(settings.kind, "direct");
        assert!(settings.durable);
        assert!(!settings.auto_delete);
        assert!(settings.arguments.is_empty());
    }

    #[test]
    fn missing_type_is_rejected() {
        let err = Settings::from_block(&block(&[("durable", true.into())])).unwrap_err();
        assert!(matches!(err, SettingsError::MissingType));
    }

    #[test]
    fn string_booleans_are_coerced() {
        let settings = Settings::from_block(&block(&[
            ("type", "fanout".into()),
            ("durable", "false".into()),
        ]))
        .unwrap();
        assert!(!settings.durable);

        let err = Settings::from_block(&block(&[
            ("type", "fanout".into()),
            ("durable", "maybe".into()),
        ]))
        .unwrap_err();
        assert!(matches!(err, SettingsError::InvalidField { .. }));
    }

    #[test]
    fn integral_numbers_serialize_as_integers() {
        let arguments = arguments_from_dynamic(&Dynamic::Map(BTreeMap::from([
            ("x-message-ttl".to_string(), Dynamic::Number(5000.0)),
            ("x-ratio".to_string(), Dynamic::Number(0.5)),
        ])))
        .unwrap();

        assert_eq!(
            arguments_to_json(&arguments).unwrap(),
            r#"{"x-message-ttl":5000,"x-ratio":0.5}"#
        );
    }

    #[test]
    fn unknown_argument_is_rejected() {
        let err = arguments_from_dynamic(&Dynamic::Map(BTreeMap::from([(
            "x-max-length".to_string(),
            Dynamic::Unknown,
        )])))
        .unwrap_err();
        assert!(matches!(err, SettingsError::UnknownArgument(key) if key == "x-max-length"));
    }

    #[test]
    fn non_map_arguments_are_rejected() {
        assert!(matches!(
            arguments_from_dynamic(&Dynamic::String("{}".to_string())),
            Err(SettingsError::InvalidArguments)
        ));
    }

    #[test]
    fn block_round_trip_keeps_nested_arguments() {
        let original = block(&[
            ("type", "topic".into()),
            ("durable", false.into()),
            ("auto_delete", true.into()),
            (
                "arguments",
                Dynamic::Map(BTreeMap::from([(
                    "x-policy".to_string(),
                    Dynamic::List(vec!["a".into(), Dynamic::Bool(true)]),
                )])),
            ),
        ]);

        let settings = Settings::from_block(&original).unwrap();
        assert_eq!(settings.to_block(), original);
    }

    #[test]
    fn queue_type_travels_as_argument() {
        let settings = Settings {
            kind: "quorum".to_string(),
            durable: true,
            auto_delete: false,
            arguments: Arguments::new(),
        };

        let wire = settings.to_queue_settings();
        assert_eq!(
            wire.arguments.get(QUEUE_TYPE_ARGUMENT),
            Some(&ArgumentValue::String("quorum".to_string()))
        );
    }

    #[test]
    fn queue_type_argument_is_stripped_on_read() {
        let info: QueueInfo = serde_json::from_str(
            r#"{"name":"r_test","vhost":"/","type":"quorum","durable":true,"auto_delete":false,
                "arguments":{"x-message-ttl":5000,"x-queue-type":"quorum"}}"#,
        )
        .unwrap();

        let settings = Settings::from_queue(&info);
        assert_eq!(settings.kind, "quorum");
        assert_eq!(settings.arguments.len(), 1);
        assert_eq!(
            arguments_to_json(&settings.arguments).unwrap(),
            r#"{"x-message-ttl":5000}"#
        );
    }

    #[test]
    fn declared_queue_type_argument_survives_read_back() {
        let declared = Settings {
            kind: "quorum".to_string(),
            durable: true,
            auto_delete: false,
            arguments: Arguments::from([
                (
                    QUEUE_TYPE_ARGUMENT.to_string(),
                    ArgumentValue::String("quorum".to_string()),
                ),
                ("x-message-ttl".to_string(), ArgumentValue::Number(5000.into())),
            ]),
        };

        let wire = declared.to_queue_settings();
        let info = QueueInfo {
            name: "r_test".to_string(),
            vhost: "/".to_string(),
            queue_type: Some("quorum".to_string()),
            durable: wire.durable,
            auto_delete: wire.auto_delete,
            arguments: wire.arguments,
        };

        assert_eq!(Settings::from_queue(&info).with_queue_type_argument(), declared);
    }

    #[test]
    fn queue_type_argument_is_not_overwritten() {
        let settings = Settings {
            kind: "classic".to_string(),
            durable: true,
            auto_delete: false,
            arguments: Arguments::from([(
                QUEUE_TYPE_ARGUMENT.to_string(),
                ArgumentValue::String("quorum".to_string()),
            )]),
        }
        .with_queue_type_argument();

        assert_eq!(
            settings.arguments.get(QUEUE_TYPE_ARGUMENT),
            Some(&ArgumentValue::String("quorum".to_string()))
        );
    }

    #[test]
    fn queue_type_falls_back_to_argument_then_classic() {
        let info: QueueInfo = serde_json::from_str(
            r#"{"name":"s","vhost":"/","durable":true,"auto_delete":false,
                "arguments":{"x-queue-type":"stream"}}"#,
        )
        .unwrap();
        assert_eq!(Settings::from_queue(&info).kind, "stream");
        assert!(Settings::from_queue(&info).arguments.is_empty());

        let info: QueueInfo = serde_json::from_str(
            r#"{"name":"c","vhost":"/","durable":true,"auto_delete":false}"#,
        )
        .unwrap();
        assert_eq!(Settings::from_queue(&info).kind, "classic");
    }

    #[test]
    fn json_arguments_parse() {
        let arguments = arguments_from_json(r#"{"x-match":"all","format":"pdf"}"#).unwrap();
        assert_eq!(arguments.len(), 2);
        assert!(arguments_from_json("[1,2]").is_err());
    }
}
