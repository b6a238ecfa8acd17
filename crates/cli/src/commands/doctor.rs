//! `gamewizard doctor`: diagnose configuration and backend connectivity.

use std::path::Path;

use gamewizard_config::AppConfig;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Game Wizard Doctor");
    println!("=====================\n");

    let mut issues = 0;

    // Config
    let path = super::config_file(config_path);
    if path.exists() {
        println!("  ✅ Config file found: {}", path.display());
    } else {
        println!("  ⚠️  No config file, using defaults (run `gamewizard config init`)");
    }

    let config = match AppConfig::load_with_env(&path) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  Fix the config before running further checks.");
            return Ok(());
        }
    };

    // Prompt
    if config.prompt.system_prompt_override.is_some() {
        println!("  ✅ System prompt set inline");
    } else if let Some(prompt) = config.system_prompt_path() {
        println!("  ✅ System prompt: {}", prompt.display());
    } else {
        println!(
            "  ⚠️  System prompt file '{}' not found, built-in instructions in use",
            config.prompt.system_prompt_file
        );
        issues += 1;
    }

    // Credentials
    let needs_snowflake =
        config.retrieval.backend == "cortex" || config.completion.provider == "cortex";
    if needs_snowflake {
        if config.backend.has_credentials() {
            println!("  ✅ Snowflake credentials configured");
        } else {
            println!("  ❌ Snowflake account or token missing");
            issues += 1;
        }
    }

    // Backends
    match gamewizard_providers::build_from_config(&config) {
        Ok(backends) => {
            match backends.knowledge.health_check().await {
                Ok(true) => println!("  ✅ Knowledge store reachable ({})", backends.knowledge.name()),
                Ok(false) => {
                    println!("  ❌ Knowledge store unhealthy ({})", backends.knowledge.name());
                    issues += 1;
                }
                Err(e) => {
                    println!("  ❌ Knowledge store: {e}");
                    issues += 1;
                }
            }
            match backends.completion.health_check().await {
                Ok(true) => println!("  ✅ Completion provider reachable ({})", backends.completion.name()),
                Ok(false) => {
                    println!("  ❌ Completion provider unhealthy ({})", backends.completion.name());
                    issues += 1;
                }
                Err(e) => {
                    println!("  ❌ Completion provider: {e}");
                    issues += 1;
                }
            }
        }
        Err(e) => {
            println!("  ❌ Backends could not be built: {e}");
            issues += 1;
        }
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
