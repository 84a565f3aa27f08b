//! Subcommand implementations and the shared wiring they use.

pub mod chat;
pub mod doctor;
pub mod history;
pub mod init;
pub mod register;
pub mod serve;

use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::Context;
use docchat_config::AppConfig;
use docchat_core::GenerationService;
use docchat_ingest::PdfIngestor;
use docchat_providers::GeminiClient;
use docchat_security::{Argon2Hasher, CredentialStore};
use docchat_session::{PromptAssembler, SessionController};
use docchat_storage::SqliteStore;

/// Load config, with a readable error.
pub fn load_config() -> anyhow::Result<AppConfig> {
    AppConfig::load().context("Failed to load config")
}

/// Open the SQLite database named by the config.
pub async fn open_store(config: &AppConfig) -> anyhow::Result<SqliteStore> {
    let url = config.database_url();
    SqliteStore::new(&url)
        .await
        .with_context(|| format!("Failed to open database at {url}"))
}

/// Build the Gemini client. Fails fast when no API key is configured.
pub fn build_generator(config: &AppConfig) -> anyhow::Result<GeminiClient> {
    let api_key = config.require_api_key()?;
    let gen_cfg = &config.generation;
    let client = GeminiClient::builder(api_key)
        .base_url(&gen_cfg.base_url)
        .model(&gen_cfg.model)
        .timeout(std::time::Duration::from_secs(gen_cfg.timeout_secs))
        .temperature(gen_cfg.temperature)
        .max_output_tokens(gen_cfg.max_output_tokens)
        .build()?;
    Ok(client)
}

/// Wire the session controller from config: SQLite for users and history,
/// Argon2 for passwords, Gemini for answers.
pub async fn build_controller(config: &AppConfig) -> anyhow::Result<SessionController> {
    let generator: Arc<dyn GenerationService> = Arc::new(build_generator(config)?);
    let store = Arc::new(open_store(config).await?);
    let credentials = CredentialStore::new(store.clone(), Arc::new(Argon2Hasher::new()));

    Ok(SessionController::new(credentials, store, generator)
        .with_ingestor(PdfIngestor::new(config.documents.max_upload_bytes))
        .with_assembler(PromptAssembler::new(config.prompt.preamble.clone())))
}

/// Print the API-key setup hint used by `serve` and `chat`.
pub fn print_missing_key_help() {
    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set the environment variable:");
    eprintln!("    export {}='your-api-key'", docchat_config::API_KEY_ENV);
    eprintln!();
    eprintln!("  Or put it in a .env file in the working directory:");
    eprintln!("    {}=your-api-key", docchat_config::API_KEY_ENV);
    eprintln!();
    eprintln!("  Or add it to your config file:");
    eprintln!("    {}", AppConfig::config_path().display());
    eprintln!();
}

/// How a password is read when it was not given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordInput {
    /// Hidden prompt on the controlling terminal
    Masked,
    /// Next line of the input stream (pipes, scripts, tests)
    Plain,
}

impl PasswordInput {
    /// Mask when stdin is a terminal; read plain lines otherwise.
    pub fn detect() -> Self {
        if std::io::stdin().is_terminal() {
            Self::Masked
        } else {
            Self::Plain
        }
    }
}

/// Prompt for a password with terminal echo disabled.
pub async fn read_masked_password(prompt: String) -> anyhow::Result<String> {
    let password = tokio::task::spawn_blocking(move || rpassword::prompt_password(prompt))
        .await?
        .context("Failed to read password")?;
    Ok(password)
}
