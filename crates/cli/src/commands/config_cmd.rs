//! `repolens config`: Configuration management commands.

use repolens_config::AppConfig;
use std::path::{Path, PathBuf};

const REDACTED: &str = "********";

/// Copy of `config` safe to print.
fn redacted(config: &AppConfig) -> AppConfig {
    let mut config = config.clone();
    if config.llm.api_key.is_some() {
        config.llm.api_key = Some(REDACTED.into());
    }
    if config.github.token.is_some() {
        config.github.token = Some(REDACTED.into());
    }
    config
}

fn config_file(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

pub fn show(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(path).map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{}", toml::to_string_pretty(&redacted(&config))?);
    Ok(())
}

pub fn validate(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating {}...", config_file(path).display());

    let config = match super::load_config(path) {
        Ok(config) => config,
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    };
    println!("   ✅ Config parsed successfully");

    if let Err(e) = config.require_credentials() {
        println!("   ❌ {e}");
        println!("      Set OPENAI_KEY and GITHUB_API_KEY, or add them to the config file.");
        return Err(e.into());
    }
    println!("   ✅ Credentials present");

    println!();
    println!("   LLM:        {} @ {}", config.llm.model, config.llm.base_url);
    println!("   GitHub:     {}", config.github.api_url);
    println!(
        "   Agent:      {} iterations, {} corrections, {}s timeout",
        config.agent.max_iterations, config.agent.max_corrections, config.agent.loop_timeout_secs
    );
    println!(
        "   Context:    {} tokens ({} reserved for the answer)",
        config.agent.context_ceiling_tokens, config.agent.answer_reserve_tokens
    );
    println!("   Gateway:    {}:{}", config.gateway.host, config.gateway.port);

    Ok(())
}

pub fn path(path: Option<&Path>) {
    println!("{}", config_file(path).display());
}

pub fn default() {
    println!("{}", AppConfig::default_toml());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_is_valid() {
        let path = config_file(None);
        assert!(path.to_str().unwrap().ends_with("config.toml"));
        assert_eq!(
            config_file(Some(Path::new("/etc/repolens.toml"))),
            PathBuf::from("/etc/repolens.toml")
        );
    }

    #[test]
    fn show_never_prints_credentials() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("sk-secret".into());
        config.github.token = Some("ghp_secret".into());

        let text = toml::to_string_pretty(&redacted(&config)).unwrap();
        assert!(!text.contains("sk-secret"));
        assert!(!text.contains("ghp_secret"));
        assert!(text.contains(REDACTED));
    }
}
