//! Init command implementation
//!
//! Scaffolds a research workspace: `agora.toml`, `.env.example` and a `.gitignore`.

use super::output::Output;
use crate::utils::toml_config::config_template;
use std::fs;
use std::path::Path;

/// Result of the init operation
#[derive(Debug, PartialEq)]
pub enum InitResult {
    /// Initialization completed successfully
    Success,
    /// Workspace already exists (agora.toml found)
    AlreadyExists,
    /// An error occurred during initialization
    Error(String),
}

/// Configuration for the init command
pub struct InitConfig {
    /// Directory to initialize
    pub path: std::path::PathBuf,
    /// Overwrite existing files
    pub force: bool,
    /// Default model written into agora.toml
    pub model: Option<String>,
    /// Search the web during research rounds
    pub web_search: bool,
}

/// Run the init command
pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing Agora Workspace");

    let base_path = &config.path;
    if let Err(e) = fs::create_dir_all(base_path) {
        output.error(&format!("Failed to create {}: {}", base_path.display(), e));
        return InitResult::Error(e.to_string());
    }

    let config_path = base_path.join("agora.toml");
    if config_path.exists() && !config.force {
        output.warning("agora.toml already exists!");
        output.hint("Use --force to overwrite existing files");
        return InitResult::AlreadyExists;
    }

    let toml_content = generate_agora_toml(&config);
    if let Err(e) = write_file(&config_path, &toml_content, config.force) {
        output.error(&format!("Failed to create agora.toml: {}", e));
        return InitResult::Error(e.to_string());
    }
    output.created("config", "agora.toml");

    let env_example_path = base_path.join(".env.example");
    if env_example_path.exists() && !config.force {
        output.skipped(".env.example", "already exists");
    } else if let Err(e) = write_file(&env_example_path, &generate_env_example(), config.force) {
        output.error(&format!("Failed to create .env.example: {}", e));
        return InitResult::Error(e.to_string());
    } else {
        output.created("env", ".env.example");
    }

    let gitignore_path = base_path.join(".gitignore");
    if gitignore_path.exists() {
        output.skipped(".gitignore", "already exists");
    } else if let Err(e) = write_file(&gitignore_path, &generate_gitignore(), false) {
        output.warning(&format!("Failed to create .gitignore: {}", e));
    } else {
        output.created("file", ".gitignore");
    }

    output.success("Agora workspace initialized");

    output.header("Next Steps");
    output.info("1. Start Ollama (if not running):");
    output.command("ollama serve");
    output.command(&format!(
        "ollama pull {}",
        config.model.as_deref().unwrap_or("llama3.1")
    ));
    output.info("2. Build the team and pick a topic:");
    output.command("agora team");
    output.command("agora topic \"Efficient attention for long documents\"");
    output.info("3. Collaborate until the team is satisfied:");
    output.command("agora brainstorm && agora research && agora snapshot");

    InitResult::Success
}

fn write_file(path: &Path, content: &str, force: bool) -> std::io::Result<()> {
    if path.exists() && !force {
        return Ok(());
    }
    fs::write(path, content)
}

fn generate_agora_toml(config: &InitConfig) -> String {
    let mut content = config_template();
    if let Some(model) = &config.model {
        content = content.replacen(
            "default_model = \"llama3.1\"",
            &format!("default_model = \"{}\"", model),
            1,
        );
    }
    if !config.web_search {
        content = content.replacen("provider = \"web\"", "provider = \"none\"", 1);
    }
    content
}

fn generate_env_example() -> String {
    r#"# Agora environment
# Overrides the [logging] level from agora.toml
RUST_LOG=agora=info
"#
    .to_string()
}

fn generate_gitignore() -> String {
    r#"# Agora
.env
*.session.json.tmp
papers/
"#
    .to_string()
}
