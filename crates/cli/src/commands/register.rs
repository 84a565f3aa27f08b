//! `docchat register` — Create an account without starting a session.

use std::sync::Arc;

use docchat_security::{Argon2Hasher, CredentialStore};
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(username: &str) -> anyhow::Result<()> {
    let config = super::load_config()?;
    let store = Arc::new(super::open_store(&config).await?);
    let credentials = CredentialStore::new(store, Arc::new(Argon2Hasher::new()));

    let prompt = format!("Password for '{username}': ");
    let password = match super::PasswordInput::detect() {
        super::PasswordInput::Masked => super::read_masked_password(prompt).await?,
        super::PasswordInput::Plain => {
            eprint!("{prompt}");
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            lines.next_line().await?.unwrap_or_default()
        }
    };

    match credentials.register(username, &password).await {
        Ok(user) => {
            println!("✅ Created account '{}'", user.username);
            Ok(())
        }
        Err(e) => anyhow::bail!(e.user_message()),
    }
}
