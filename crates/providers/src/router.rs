//! Provider router: maps the `provider/` prefix of a model string onto a client.

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;
use aru_config::{AppConfig, split_model};
use aru_core::provider::Provider;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_model: String,
}

impl ProviderRouter {
    /// An empty router whose default is `default_model` (`provider/model`).
    pub fn new(default_model: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_model: default_model.into(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// Resolve `provider/model` to a client and the bare model id.
    pub fn resolve_model(&self, spec: &str) -> Option<(Arc<dyn Provider>, String)> {
        let (provider, model) = split_model(spec);
        self.get(provider).map(|p| (p, model.to_string()))
    }

    /// Resolve the configured default model.
    pub fn resolve_default(&self) -> Option<(Arc<dyn Provider>, String)> {
        self.resolve_model(&self.default_model)
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Registered provider names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }
}

/// Build one client per configured provider, plus the default model's provider.
pub fn build_from_config(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_model);

    let mut names: Vec<String> = config.providers.keys().cloned().collect();
    let default_provider = config.default_provider().to_string();
    if !names.contains(&default_provider) {
        names.push(default_provider);
    }

    for name in names {
        let api_key = config.api_key_for(&name).unwrap_or_default().to_string();
        let api_url = config.providers.get(&name).and_then(|p| p.api_url.clone());

        let provider: Arc<dyn Provider> = match name.as_str() {
            "anthropic" => {
                let mut p = AnthropicProvider::new(api_key);
                if let Some(url) = api_url {
                    p = p.with_base_url(url);
                }
                Arc::new(p)
            }
            _ => {
                let base_url = api_url.unwrap_or_else(|| default_base_url(&name));
                Arc::new(OpenAiCompatProvider::new(name.clone(), base_url, api_key))
            }
        };
        debug!(provider = %name, "Registered provider");
        router.register(name, provider);
    }

    router
}

fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        _ => "http://localhost:8000/v1".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aru_config::ProviderConfig;

    #[test]
    fn resolve_splits_on_first_slash() {
        let mut router = ProviderRouter::new("openrouter/anthropic/claude-3.5-sonnet");
        router.register("openrouter", Arc::new(OpenAiCompatProvider::openrouter("k")));

        let (provider, model) = router.resolve_default().unwrap();
        assert_eq!(provider.name(), "openrouter");
        assert_eq!(model, "anthropic/claude-3.5-sonnet");
        assert!(router.resolve_model("mistral/small").is_none());
    }

    #[test]
    fn default_config_builds_anthropic() {
        let router = build_from_config(&AppConfig::default());
        let (provider, model) = router.resolve_default().unwrap();
        assert_eq!(provider.name(), "anthropic");
        assert_eq!(model, "claude-3-5-sonnet-20241022");
    }

    #[test]
    fn configured_providers_are_registered() {
        let mut config = AppConfig {
            default_model: "ollama/llama3".into(),
            ..AppConfig::default()
        };
        config.providers.insert(
            "local".into(),
            ProviderConfig {
                api_key: None,
                api_url: Some("http://127.0.0.1:9000/v1".into()),
            },
        );
        let router = build_from_config(&config);
        assert_eq!(router.list(), vec!["local", "ollama"]);
        assert_eq!(router.resolve_model("local/my-model").unwrap().1, "my-model");
    }

    #[test]
    fn base_urls() {
        assert!(default_base_url("openrouter").contains("openrouter.ai"));
        assert!(default_base_url("ollama").contains("11434"));
    }
}
