use std::fmt;

use serde::Serialize;

use super::{
    error::{BridgeError, BridgeResult},
    key::CorrelationKey,
    value::{ParameterValue, Parameters},
};

/// Something that can be sent to the external runtime.
///
/// Implement this on your own request types, or use [`Target`].
pub trait BridgeTarget: fmt::Debug + Send + Sync {
    fn event_name(&self) -> &str;

    fn id(&self) -> &str;

    fn parameters(&self) -> Option<&Parameters> {
        None
    }

    fn key(&self) -> CorrelationKey {
        CorrelationKey::new(self.event_name(), self.id())
    }
}

/// General purpose [`BridgeTarget`].
///
/// The id defaults to a fresh UUID so concurrent requests on the same event
/// name never collide unless the caller asks for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    event_name: String,
    id: String,
    parameters: Option<Parameters>,
}

impl Target {
    pub fn new(event_name: impl Into<String>) -> Self {
        Self {
            event_name: event_name.into(),
            id: uuid::Uuid::new_v4().to_string(),
            parameters: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn parameter(mut self, key: &str, value: impl Into<ParameterValue>) -> Self {
        self.parameters
            .get_or_insert_with(Parameters::new)
            .insert(key.to_string(), value.into());
        self
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// Adds any `Serialize` value as a parameter.
    ///
    /// # Errors
    ///
    /// `InvalidRequestData` when the value has no [`ParameterValue`] form.
    pub fn encodable_parameter<T: Serialize + ?Sized>(
        self,
        key: &str,
        value: &T,
    ) -> BridgeResult<Self> {
        let lowered = ParameterValue::from_serializable(value)
            .map_err(|e| BridgeError::invalid_request(&self.key(), e))?;
        Ok(self.parameter(key, lowered))
    }
}

impl BridgeTarget for Target {
    fn event_name(&self) -> &str {
        &self.event_name
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn parameters(&self) -> Option<&Parameters> {
        self.parameters.as_ref()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}
