//! Generation-parameter resolution.
//!
//! Parameters are always derived fresh from the current invocation's layers
//! (profile, environment, flags); a resumed session's stored values never
//! feed back into this.

use crate::conversation::ROLE_USER;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ROLE: &str = ROLE_USER;
pub const DEFAULT_TEMPERATURE: f32 = 1.0;
pub const DEFAULT_MAX_TOKENS: u32 = 0;
pub const DEFAULT_TOP_P: f32 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    /// `0` means no limit; the field is then left out of the request.
    pub max_tokens: u32,
    pub top_p: f32,
    pub role: String,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            top_p: DEFAULT_TOP_P,
            role: DEFAULT_ROLE.to_string(),
        }
    }
}

/// One precedence layer. Unset fields defer to earlier layers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOverrides {
    pub model: Option<String>,
    pub role: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
}

/// Folds `layers` over the built-in defaults; later layers win.
pub fn resolve(layers: &[&GenerationOverrides]) -> GenerationParams {
    let mut params = GenerationParams::default();
    for layer in layers {
        if let Some(model) = non_blank(layer.model.as_deref()) {
            params.model = model.to_string();
        }
        if let Some(role) = non_blank(layer.role.as_deref()) {
            params.role = role.to_string();
        }
        if let Some(temperature) = layer.temperature {
            params.temperature = temperature;
        }
        if let Some(max_tokens) = layer.max_tokens {
            params.max_tokens = max_tokens;
        }
        if let Some(top_p) = layer.top_p {
            params.top_p = top_p;
        }
    }
    params
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_layers_yield_defaults() {
        let params = resolve(&[]);
        assert_eq!(params, GenerationParams::default());
        assert_eq!(params.model, "gpt-4o-mini");
        assert_eq!(params.role, "user");
    }

    #[test]
    fn later_layers_override_earlier_ones_field_by_field() {
        let profile = GenerationOverrides {
            model: Some("gpt-4.1".to_string()),
            temperature: Some(0.2),
            max_tokens: Some(512),
            ..Default::default()
        };
        let flags = GenerationOverrides {
            temperature: Some(0.9),
            role: Some("system".to_string()),
            model: Some("   ".to_string()),
            ..Default::default()
        };

        let params = resolve(&[&profile, &flags]);
        assert_eq!(params.model, "gpt-4.1");
        assert_eq!(params.temperature, 0.9);
        assert_eq!(params.max_tokens, 512);
        assert_eq!(params.top_p, 1.0);
        assert_eq!(params.role, "system");
    }
}
