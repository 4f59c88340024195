//! Composite resource identifiers
//!
//! Most resources join their key fields with `@`. Bindings join five fields
//! with `#`. Every segment is percent-escaped before joining so that values
//! containing a delimiter (the default vhost `/`, for one) survive decoding.
//! `%` is always escaped first on encode and unescaped last on decode.

use crate::api::bindings::DestinationType;
use crate::settings::{arguments_to_json, Arguments, SettingsError};
use thiserror::Error;

pub const ID_DELIMITER: char = '@';
pub const BINDING_DELIMITER: char = '#';

const BINDING_SEGMENTS: usize = 5;

#[derive(Debug, Error, PartialEq)]
pub enum IdentifierError {
    #[error("identifier is empty")]
    Empty,

    #[error("malformed binding identifier '{id}': expected 5 '#'-separated parts, found {found}")]
    BindingSegments { id: String, found: usize },

    #[error("malformed binding identifier '{id}': {reason}")]
    InvalidBinding { id: String, reason: String },

    #[error("malformed identifier '{id}': {reason}")]
    Malformed { id: String, reason: String },
}

/// Joins segments with `@`, escaping `%` and `@` inside each segment
pub fn encode_id<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(|s| s.as_ref().replace('%', "%25").replace(ID_DELIMITER, "%40"))
        .collect::<Vec<_>>()
        .join("@")
}

/// Splits an `@` identifier back into its segments
pub fn decode_id(id: &str) -> Result<Vec<String>, IdentifierError> {
    if id.is_empty() {
        return Err(IdentifierError::Empty);
    }
    Ok(id
        .split(ID_DELIMITER)
        .map(|s| s.replace("%40", "@").replace("%25", "%"))
        .collect())
}

/// Splits a two-part identifier such as a limit's `scope@name`
pub fn decode_pair(id: &str) -> Result<(String, String), IdentifierError> {
    let segments = decode_id(id)?;
    match <[String; 2]>::try_from(segments) {
        Ok([first, second]) => Ok((first, second)),
        Err(segments) => Err(IdentifierError::Malformed {
            id: id.to_string(),
            reason: format!("expected 2 '@'-separated parts, found {}", segments.len()),
        }),
    }
}

/// A decoded standard identifier: name, optional vhost, anything after
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedId {
    pub name: String,
    pub vhost: Option<String>,
    pub rest: Vec<String>,
}

pub fn parse_id(id: &str) -> Result<ParsedId, IdentifierError> {
    let mut segments = decode_id(id)?.into_iter();
    let name = segments.next().unwrap_or_default();
    let vhost = segments.next();
    Ok(ParsedId {
        name,
        vhost,
        rest: segments.collect(),
    })
}

/// `<durable>:<auto_delete>:<arguments-json>` as used in exchange and queue ids
pub fn settings_fingerprint(
    durable: bool,
    auto_delete: bool,
    arguments: &Arguments,
) -> Result<String, SettingsError> {
    Ok(format!(
        "{}:{}:{}",
        durable,
        auto_delete,
        arguments_to_json(arguments)?
    ))
}

/// `name@vhost@<fingerprint>` for exchanges and queues
pub fn settings_id(
    name: &str,
    vhost: &str,
    durable: bool,
    auto_delete: bool,
    arguments: &Arguments,
) -> Result<String, SettingsError> {
    let fingerprint = settings_fingerprint(durable, auto_delete, arguments)?;
    Ok(encode_id(&[name, vhost, fingerprint.as_str()]))
}

/// Identifier of a binding: `vhost#destination_type#properties_key#source#destination`
#[derive(Debug, Clone, PartialEq)]
pub struct BindingId {
    pub vhost: String,
    pub destination_type: DestinationType,
    pub properties_key: String,
    pub source: String,
    pub destination: String,
}

impl BindingId {
    pub fn encode(&self) -> String {
        [
            self.vhost.as_str(),
            self.destination_type.as_str(),
            self.properties_key.as_str(),
            self.source.as_str(),
            self.destination.as_str(),
        ]
        .iter()
        .map(|s| escape_binding_segment(s))
        .collect::<Vec<_>>()
        .join("#")
    }

    pub fn parse(id: &str) -> Result<Self, IdentifierError> {
        if id.is_empty() {
            return Err(IdentifierError::Empty);
        }
        let segments: Vec<String> = id.split(BINDING_DELIMITER).map(unescape_binding_segment).collect();
        let [vhost, destination_type, properties_key, source, destination]: [String; BINDING_SEGMENTS] =
            segments.try_into().map_err(|segments: Vec<String>| {
                IdentifierError::BindingSegments {
                    id: id.to_string(),
                    found: segments.len(),
                }
            })?;

        let destination_type = destination_type
            .parse::<DestinationType>()
            .map_err(|reason| IdentifierError::InvalidBinding {
                id: id.to_string(),
                reason,
            })?;

        Ok(Self {
            vhost,
            destination_type,
            properties_key,
            source,
            destination,
        })
    }
}

fn escape_binding_segment(segment: &str) -> String {
    segment
        .replace('%', "%25")
        .replace('/', "%2F")
        .replace(BINDING_DELIMITER, "%23")
}

fn unescape_binding_segment(segment: &str) -> String {
    segment
        .replace("%2F", "/")
        .replace("%23", "#")
        .replace("%25", "%")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ArgumentValue;

    #[test]
    fn round_trip_with_delimiters_and_percent_signs() {
        let cases: Vec<Vec<&str>> = vec![
            vec!["orders"],
            vec!["q@1", "/"],
            vec!["a%40b", "vh%", "%25@%"],
            vec!["", "x"],
        ];
        for segments in cases {
            let id = encode_id(&segments);
            assert_eq!(decode_id(&id).unwrap(), segments, "id {}", id);
        }
    }

    #[test]
    fn empty_identifier_is_malformed() {
        assert_eq!(decode_id(""), Err(IdentifierError::Empty));
        assert_eq!(parse_id("").unwrap_err(), IdentifierError::Empty);
    }

    #[test]
    fn pair_identifier_needs_exactly_two_parts() {
        assert_eq!(
            decode_pair("vhost@%40orders").unwrap(),
            ("vhost".to_string(), "@orders".to_string())
        );
        assert_eq!(
            decode_pair("vhost@a@b").unwrap_err(),
            IdentifierError::Malformed {
                id: "vhost@a@b".to_string(),
                reason: "expected 2 '@'-separated parts, found 3".to_string(),
            }
        );
        assert!(matches!(
            decode_pair("vhost"),
            Err(IdentifierError::Malformed { .. })
        ));
    }

    #[test]
    fn parse_id_splits_name_vhost_and_rest() {
        let parsed = parse_id("jobs@/@true:false:{}").unwrap();
        assert_eq!(parsed.name, "jobs");
        assert_eq!(parsed.vhost.as_deref(), Some("/"));
        assert_eq!(parsed.rest, vec!["true:false:{}"]);

        let parsed = parse_id("payments").unwrap();
        assert_eq!(parsed.vhost, None);
        assert!(parsed.rest.is_empty());
    }

    #[test]
    fn exchange_identifier_layout() {
        let id = settings_id("test", "test", false, true, &Arguments::new()).unwrap();
        assert_eq!(id, "test@test@false:true:{}");
    }

    #[test]
    fn fingerprint_sorts_argument_keys() {
        let arguments = Arguments::from([
            ("x-max-length".to_string(), ArgumentValue::Number(10.into())),
            ("x-dead-letter-exchange".to_string(), ArgumentValue::String("dlx".to_string())),
        ]);
        assert_eq!(
            settings_fingerprint(true, false, &arguments).unwrap(),
            r#"true:false:{"x-dead-letter-exchange":"dlx","x-max-length":10}"#
        );
    }

    #[test]
    fn fingerprint_with_at_sign_survives_decoding() {
        let arguments = Arguments::from([(
            "alternate-exchange".to_string(),
            ArgumentValue::String("ae@prod".to_string()),
        )]);
        let id = settings_id("events", "/", true, false, &arguments).unwrap();
        let parsed = parse_id(&id).unwrap();

        assert_eq!(parsed.name, "events");
        assert_eq!(parsed.rest, vec![r#"true:false:{"alternate-exchange":"ae@prod"}"#]);
    }

    #[test]
    fn binding_id_round_trip_with_default_vhost() {
        let binding = BindingId {
            vhost: "/".to_string(),
            destination_type: DestinationType::Queue,
            properties_key: "k1".to_string(),
            source: "src".to_string(),
            destination: "dst".to_string(),
        };

        let id = binding.encode();
        assert_eq!(id, "%2F#queue#k1#src#dst");
        assert_eq!(BindingId::parse(&id).unwrap(), binding);
    }

    #[test]
    fn binding_id_escapes_hash_and_percent() {
        let binding = BindingId {
            vhost: "a%2Fb".to_string(),
            destination_type: DestinationType::Exchange,
            properties_key: "orders.#".to_string(),
            source: "s#1".to_string(),
            destination: "d/2".to_string(),
        };

        assert_eq!(BindingId::parse(&binding.encode()).unwrap(), binding);
    }

    #[test]
    fn binding_id_with_too_few_segments_fails() {
        let err = BindingId::parse("%2F#queue#k1#src").unwrap_err();
        assert!(matches!(err, IdentifierError::BindingSegments { found: 4, .. }));
    }

    #[test]
    fn binding_id_with_too_many_segments_fails() {
        let err = BindingId::parse("a#queue#k#s#d#extra").unwrap_err();
        assert!(matches!(err, IdentifierError::BindingSegments { found: 6, .. }));
    }

    #[test]
    fn binding_id_with_bad_destination_type_fails() {
        let err = BindingId::parse("%2F#topic#k1#src#dst").unwrap_err();
        assert!(matches!(err, IdentifierError::InvalidBinding { .. }));
    }
}
