//! Configuration types for the Parcel codec.
//!
//! All structs use `#[serde(default)]` so a partial TOML file only overrides
//! the keys it names.

use crate::error::{ParcelError, ParcelResult};
use serde::{Deserialize, Serialize};

/// Byte encoding used for the message envelope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    /// MessagePack with named fields.
    #[default]
    Msgpack,
    /// UTF-8 JSON.
    Json,
}

/// What the type mapper does with a schema shape it does not model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapePolicy {
    /// Fail with `UnsupportedSchemaShape`.
    #[default]
    Reject,
    /// Map the field to `any` and log a warning.
    DegradeToAny,
}

/// Codec configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Envelope encoding.
    pub wire_format: WireFormat,
    /// Handling of unsupported schema shapes.
    pub shape_policy: ShapePolicy,
    /// LLM provider selection.
    pub provider: ProviderConfig,
}

/// Known LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI-compatible API.
    Openai,
    /// Google Gemini.
    Gemini,
}

impl ProviderKind {
    /// Order in which configured keys are considered when nothing is explicit.
    pub const KEY_PRECEDENCE: [ProviderKind; 2] = [ProviderKind::Gemini, ProviderKind::Openai];
}

/// Explicit provider selection inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider used when the caller does not request one.
    pub default_provider: Option<ProviderKind>,
    /// OpenAI API key.
    pub openai_api_key: Option<String>,
    /// Gemini API key.
    pub gemini_api_key: Option<String>,
}

impl ProviderConfig {
    /// Whether a non-empty key is configured for `kind`.
    pub fn has_key(&self, kind: ProviderKind) -> bool {
        let key = match kind {
            ProviderKind::Openai => &self.openai_api_key,
            ProviderKind::Gemini => &self.gemini_api_key,
        };
        key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// Pick a provider.
    ///
    /// Precedence: `requested`, then `default_provider`, then the first
    /// provider in [`ProviderKind::KEY_PRECEDENCE`] that has a key. An
    /// explicit choice without a key is an error.
    pub fn select_provider(&self, requested: Option<ProviderKind>) -> ParcelResult<ProviderKind> {
        if let Some(kind) = requested.or(self.default_provider) {
            if self.has_key(kind) {
                return Ok(kind);
            }
            return Err(ParcelError::Config(format!(
                "provider {kind:?} selected but no API key is configured for it"
            )));
        }
        ProviderKind::KEY_PRECEDENCE
            .into_iter()
            .find(|kind| self.has_key(*kind))
            .ok_or_else(|| {
                ParcelError::Config("no LLM provider configured; set an API key first".to_string())
            })
    }
}
