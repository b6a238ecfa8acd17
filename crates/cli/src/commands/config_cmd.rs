//! `gamewizard config`: configuration management commands.

use std::path::Path;

use gamewizard_config::AppConfig;

const REDACTED: &str = "********";

pub async fn validate(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let path = super::config_file(config_path);
    println!("🔍 Validating {}...", path.display());

    match AppConfig::load_with_env(&path) {
        Ok(config) => {
            println!("   ✅ Config parsed and validated");

            let warnings = warnings(&config);
            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Knowledge:   {} ({})", config.retrieval.backend, config.retrieval.table);
            println!("   Completion:  {}", config.completion.provider);
            println!("   Models:      {}", config.completion.models.join(", "));
            println!("   Depth:       {}", config.retrieval.default_depth);
            println!("   History:     {} turns", config.history.capacity);
            println!("   Gateway:     {}:{}", config.gateway.host, config.gateway.port);
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

/// Problems that do not stop loading but will stop a question from being answered.
fn warnings(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    let needs_snowflake =
        config.retrieval.backend == "cortex" || config.completion.provider == "cortex";

    if needs_snowflake && !config.backend.has_credentials() {
        warnings.push(
            "No Snowflake account/token (set GAMEWIZARD_SNOWFLAKE_ACCOUNT and GAMEWIZARD_SNOWFLAKE_TOKEN)"
                .to_string(),
        );
    }
    if config.completion.provider == "openai"
        && config.completion.api_key.is_none()
        && config.completion.api_url.is_none()
    {
        warnings.push("No completion API key (set GAMEWIZARD_API_KEY or OPENAI_API_KEY)".to_string());
    }
    if config.prompt.system_prompt_override.is_none() && config.system_prompt_path().is_none() {
        warnings.push(format!(
            "System prompt file '{}' not found, built-in instructions will be used",
            config.prompt.system_prompt_file
        ));
    }
    if config.gateway.host == "0.0.0.0" {
        warnings.push("Gateway bound to 0.0.0.0: the wizard is reachable from other machines".to_string());
    }
    warnings
}

pub async fn show(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let toml_str = toml::to_string_pretty(&redacted(config))?;
    println!("{toml_str}");
    Ok(())
}

/// A copy that is safe to print.
fn redacted(mut config: AppConfig) -> AppConfig {
    if config.backend.token.is_some() {
        config.backend.token = Some(REDACTED.into());
    }
    if config.completion.api_key.is_some() {
        config.completion.api_key = Some(REDACTED.into());
    }
    config
}

pub async fn path(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", super::config_file(config_path).display());
    Ok(())
}

pub async fn init(config_path: Option<&Path>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = super::config_file(config_path);

    if path.exists() && !force {
        println!("⚠️  Config already exists at: {}", path.display());
        println!("   Edit it manually or re-run with --force.");
        return Ok(());
    }

    write_default(&path)?;
    println!("✅ Created config.toml at: {}", path.display());
    println!("\n📝 Next steps:");
    println!("   1. Set your Snowflake account and token (or GAMEWIZARD_SNOWFLAKE_* env vars)");
    println!("   2. Put your system instructions in prompt.txt");
    println!("   3. Run: gamewizard serve\n");
    Ok(())
}

fn write_default(path: &Path) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    std::fs::write(path, AppConfig::default_toml())
}
