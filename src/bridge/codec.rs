//! # Payload Codec
//!
//! Outbound: a target becomes the JSON string
//! `{"eventName": ..., "id": ..., "parameters": {...}}` handed to the
//! transport. Inbound: the `data` string of a reply becomes a [`Payload`],
//! and a payload can be decoded into any `DeserializeOwned` type, optionally
//! through a one-key response [`Envelope`].

use std::fmt;

use serde::{de::DeserializeOwned, Serialize};
use strum::{Display, EnumString};

use super::{
    error::{BridgeError, BridgeResult},
    key::CorrelationKey,
    target::BridgeTarget,
    value::{validate_parameters, Parameters},
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EncodedTarget<'a> {
    event_name: &'a str,
    id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<&'a Parameters>,
}

/// Encodes a call for the transport.
///
/// # Errors
///
/// `InvalidRequestData` when the key is not addressable, when a parameter
/// cannot be represented in JSON, or when encoding yields nothing.
pub fn encode(
    event_name: &str,
    id: &str,
    parameters: Option<&Parameters>,
) -> BridgeResult<String> {
    let key = CorrelationKey::new(event_name, id);
    if !key.is_addressable() {
        return Err(BridgeError::invalid_request(
            &key,
            "event name and id must not be empty",
        ));
    }
    if let Some(parameters) = parameters {
        validate_parameters(parameters).map_err(|e| BridgeError::invalid_request(&key, e))?;
    }

    let encoded = serde_json::to_string(&EncodedTarget {
        event_name,
        id,
        parameters,
    })
    .map_err(|e| BridgeError::invalid_request(&key, e))?;

    if encoded.is_empty() {
        return Err(BridgeError::invalid_request(&key, "encoded request is empty"));
    }
    Ok(encoded)
}

pub fn encode_target(target: &dyn BridgeTarget) -> BridgeResult<String> {
    encode(target.event_name(), target.id(), target.parameters())
}

/// Top-level key a reply may wrap its content in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Envelope {
    /// Decode the payload as-is.
    #[default]
    None,
    Data,
    Meta,
    Results,
    Error,
    Groups,
    Parameters,
}

impl Envelope {
    pub fn key(&self) -> Option<&'static str> {
        match self {
            Envelope::None => None,
            Envelope::Data => Some("data"),
            Envelope::Meta => Some("meta"),
            Envelope::Results => Some("results"),
            Envelope::Error => Some("error"),
            Envelope::Groups => Some("groups"),
            Envelope::Parameters => Some("parameters"),
        }
    }
}

/// The raw reply content of one inbound event, known to be well-formed JSON.
#[derive(Clone, PartialEq, Eq)]
pub struct Payload {
    content: String,
}

impl Payload {
    pub fn as_str(&self) -> &str {
        &self.content
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.content.as_bytes()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.content.into_bytes()
    }

    pub fn decode<T: DeserializeOwned>(&self, envelope: Envelope) -> BridgeResult<T> {
        decode_json(&self.content, envelope)
    }

    pub fn to_value(&self) -> BridgeResult<serde_json::Value> {
        self.decode(Envelope::None)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Payload").field(&self.content).finish()
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.content)
    }
}

/// Checks that a raw reply is present and parses as JSON.
pub fn payload(raw: Option<&str>) -> BridgeResult<Payload> {
    let raw = present(raw)?;
    serde_json::from_str::<serde::de::IgnoredAny>(raw).map_err(|_| {
        BridgeError::ReceivedInvalidJsonData {
            content: raw.to_string(),
        }
    })?;
    Ok(Payload {
        content: raw.to_string(),
    })
}

/// Decodes a raw reply into `T`, unwrapping `envelope` first.
///
/// # Errors
///
/// * `ReceivedInvalidData` - `raw` is absent or empty
/// * `ReceivedInvalidJsonData` - anything else; carries the original content
pub fn decode<T: DeserializeOwned>(raw: Option<&str>, envelope: Envelope) -> BridgeResult<T> {
    decode_json(present(raw)?, envelope)
}

fn present(raw: Option<&str>) -> BridgeResult<&str> {
    match raw {
        Some(raw) if !raw.is_empty() => Ok(raw),
        _ => Err(BridgeError::ReceivedInvalidData),
    }
}

fn decode_json<T: DeserializeOwned>(raw: &str, envelope: Envelope) -> BridgeResult<T> {
    let invalid = || BridgeError::ReceivedInvalidJsonData {
        content: raw.to_string(),
    };

    match envelope.key() {
        None => serde_json::from_str(raw).map_err(|_| invalid()),
        Some(key) => {
            let mut value: serde_json::Value = serde_json::from_str(raw).map_err(|_| invalid())?;
            let inner = value
                .as_object_mut()
                .and_then(|object| object.remove(key))
                .ok_or_else(invalid)?;
            serde_json::from_value(inner).map_err(|_| invalid())
        }
    }
}
