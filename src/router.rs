use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Upstream providers the gateway can dispatch to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Google,
    Mistral,
    Together,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Google => "google",
            ProviderKind::Mistral => "mistral",
            ProviderKind::Together => "together",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a provider expects its API key on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthStyle {
    Bearer,
    /// `x-api-key` plus the pinned `anthropic-version` header.
    AnthropicApiKey,
}

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Clone, Debug)]
pub struct ProviderEndpoint {
    pub kind: ProviderKind,
    pub base_url: String,
    pub secret_name: String,
    pub auth_style: AuthStyle,
    pub needs_translation: bool,
}

impl ProviderEndpoint {
    pub fn apply_auth(&self, req: reqwest::RequestBuilder, key: &str) -> reqwest::RequestBuilder {
        match self.auth_style {
            AuthStyle::Bearer => req.bearer_auth(key),
            AuthStyle::AnthropicApiKey => req
                .header("x-api-key", key)
                .header("anthropic-version", ANTHROPIC_VERSION),
        }
    }
}

/// Maps model identifiers to providers by prefix, with `together` as the
/// explicit fallback for open-source model slugs no other provider serves.
#[derive(Clone, Debug)]
pub struct ProviderRegistry {
    endpoints: HashMap<ProviderKind, ProviderEndpoint>,
    prefixes: Vec<(String, ProviderKind)>,
    fallback: ProviderKind,
}

impl ProviderRegistry {
    pub fn builtin() -> Self {
        let mut endpoints = HashMap::new();
        endpoints.insert(
            ProviderKind::OpenAi,
            ProviderEndpoint {
                kind: ProviderKind::OpenAi,
                base_url: "https://api.openai.com/v1/chat/completions".to_string(),
                secret_name: "OPENAI_API_KEY".to_string(),
                auth_style: AuthStyle::Bearer,
                needs_translation: false,
            },
        );
        endpoints.insert(
            ProviderKind::Anthropic,
            ProviderEndpoint {
                kind: ProviderKind::Anthropic,
                base_url: "https://api.anthropic.com/v1/messages".to_string(),
                secret_name: "ANTHROPIC_API_KEY".to_string(),
                auth_style: AuthStyle::AnthropicApiKey,
                needs_translation: true,
            },
        );
        endpoints.insert(
            ProviderKind::Google,
            ProviderEndpoint {
                kind: ProviderKind::Google,
                base_url: "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions"
                    .to_string(),
                secret_name: "GOOGLE_API_KEY".to_string(),
                auth_style: AuthStyle::Bearer,
                needs_translation: false,
            },
        );
        endpoints.insert(
            ProviderKind::Mistral,
            ProviderEndpoint {
                kind: ProviderKind::Mistral,
                base_url: "https://api.mistral.ai/v1/chat/completions".to_string(),
                secret_name: "MISTRAL_API_KEY".to_string(),
                auth_style: AuthStyle::Bearer,
                needs_translation: false,
            },
        );
        endpoints.insert(
            ProviderKind::Together,
            ProviderEndpoint {
                kind: ProviderKind::Together,
                base_url: "https://api.together.xyz/v1/chat/completions".to_string(),
                secret_name: "TOGETHER_API_KEY".to_string(),
                auth_style: AuthStyle::Bearer,
                needs_translation: false,
            },
        );

        let prefixes = [
            ("gpt-", ProviderKind::OpenAi),
            ("o1", ProviderKind::OpenAi),
            ("o3", ProviderKind::OpenAi),
            ("o4", ProviderKind::OpenAi),
            ("claude-", ProviderKind::Anthropic),
            ("gemini-", ProviderKind::Google),
            ("mistral-", ProviderKind::Mistral),
        ]
        .into_iter()
        .map(|(prefix, kind)| (prefix.to_string(), kind))
        .collect();

        Self {
            endpoints,
            prefixes,
            fallback: ProviderKind::Together,
        }
    }

    /// Register an additional prefix pattern. Patterns are matched in
    /// registration order, before the fallback.
    pub fn register_prefix(&mut self, prefix: impl Into<String>, kind: ProviderKind) {
        self.prefixes.push((prefix.into(), kind));
    }

    pub fn with_base_url(mut self, kind: ProviderKind, base_url: impl Into<String>) -> Self {
        if let Some(endpoint) = self.endpoints.get_mut(&kind) {
            endpoint.base_url = base_url.into();
        }
        self
    }

    pub fn route(&self, model: &str) -> ProviderKind {
        self.prefixes
            .iter()
            .find(|(prefix, _)| model.starts_with(prefix.as_str()))
            .map(|&(_, kind)| kind)
            .unwrap_or(self.fallback)
    }

    pub fn endpoint(&self, kind: ProviderKind) -> &ProviderEndpoint {
        self.endpoints
            .get(&kind)
            .expect("every provider kind has an endpoint")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_by_prefix() {
        let registry = ProviderRegistry::builtin();
        assert_eq!(registry.route("gpt-4o"), ProviderKind::OpenAi);
        assert_eq!(registry.route("o1-preview"), ProviderKind::OpenAi);
        assert_eq!(registry.route("o3-mini"), ProviderKind::OpenAi);
        assert_eq!(registry.route("o4-mini"), ProviderKind::OpenAi);
        assert_eq!(
            registry.route("claude-sonnet-4-20250514"),
            ProviderKind::Anthropic
        );
        assert_eq!(registry.route("gemini-2.0-flash"), ProviderKind::Google);
        assert_eq!(
            registry.route("mistral-large-latest"),
            ProviderKind::Mistral
        );
    }

    #[test]
    fn open_source_slugs_fall_back_to_together() {
        let registry = ProviderRegistry::builtin();
        assert_eq!(
            registry.route("meta-llama/Llama-3.3-70B-Instruct-Turbo"),
            ProviderKind::Together
        );
        assert_eq!(registry.route("Qwen/Qwen2.5-72B"), ProviderKind::Together);
    }

    #[test]
    fn registered_prefixes_extend_routing() {
        let mut registry = ProviderRegistry::builtin();
        registry.register_prefix("grok-", ProviderKind::OpenAi);
        assert_eq!(registry.route("grok-3"), ProviderKind::OpenAi);
    }

    #[test]
    fn only_anthropic_needs_translation() {
        let registry = ProviderRegistry::builtin();
        for kind in [
            ProviderKind::OpenAi,
            ProviderKind::Anthropic,
            ProviderKind::Google,
            ProviderKind::Mistral,
            ProviderKind::Together,
        ] {
            let endpoint = registry.endpoint(kind);
            assert_eq!(endpoint.needs_translation, kind == ProviderKind::Anthropic);
        }
    }

    #[test]
    fn base_url_override_applies() {
        let registry = ProviderRegistry::builtin()
            .with_base_url(ProviderKind::OpenAi, "http://127.0.0.1:9999/v1/chat");
        assert_eq!(
            registry.endpoint(ProviderKind::OpenAi).base_url,
            "http://127.0.0.1:9999/v1/chat"
        );
    }
}
