//! `docchat chat` — Interactive terminal session.
//!
//! Reads lines from stdin. Lines starting with `/` are commands; anything
//! else is a question about the loaded document.

use std::io::Write;
use std::path::{Path, PathBuf};

use docchat_core::{Error, Session, SessionState};
use docchat_session::SessionController;

use super::PasswordInput;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

const HELP: &str = "\
Commands:
  /register <username> [password]   Create an account
  /login <username> [password]      Log in (prompts for the password if omitted)
  /upload <path>                    Load a PDF as the current document
  /history                          Show your previous questions and answers
  /clear                            Delete your history
  /logout                           End the session
  /help                             Show this help
  /quit                             Exit
Anything else is sent as a question about the current document.";

/// One parsed line of REPL input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Register {
        username: String,
        password: Option<String>,
    },
    Login {
        username: String,
        password: Option<String>,
    },
    Upload(PathBuf),
    History,
    Clear,
    Logout,
    Help,
    Quit,
    Ask(String),
    /// A malformed or unknown command; carries the usage hint to print.
    Invalid(String),
}

impl ReplCommand {
    /// Parse a line. Returns `None` for blank input.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        if matches!(line, "exit" | "quit" | ":q") {
            return Some(Self::Quit);
        }

        let Some(rest) = line.strip_prefix('/') else {
            return Some(Self::Ask(line.to_string()));
        };

        let mut parts = rest.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or_default();
        let args = parts.next().unwrap_or_default().trim();

        let command = match name {
            "register" | "login" => {
                let mut words = args.splitn(2, char::is_whitespace);
                let username = words.next().unwrap_or_default().to_string();
                let password = words
                    .next()
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty());
                if username.is_empty() {
                    Self::Invalid(format!("Usage: /{name} <username> [password]"))
                } else if name == "register" {
                    Self::Register { username, password }
                } else {
                    Self::Login { username, password }
                }
            }
            "upload" if args.is_empty() => Self::Invalid("Usage: /upload <path>".into()),
            "upload" => Self::Upload(PathBuf::from(args)),
            "history" => Self::History,
            "clear" => Self::Clear,
            "logout" => Self::Logout,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => Self::Invalid(format!("Unknown command '/{other}'. Type /help.")),
        };
        Some(command)
    }
}

pub async fn run() -> anyhow::Result<()> {
    let config = super::load_config()?;
    if !config.has_api_key() {
        super::print_missing_key_help();
    }
    let controller = super::build_controller(&config).await?;

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    run_repl(&controller, stdin, &mut stdout, PasswordInput::detect()).await
}

/// Drive one terminal session until `/quit` or end of input.
pub async fn run_repl<R, W>(
    controller: &SessionController,
    input: R,
    out: &mut W,
    password_input: PasswordInput,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut session = Session::new();

    writeln!(out, "DocChat — ask questions about your PDF documents")?;
    writeln!(out, "Type /help for commands.\n")?;

    loop {
        prompt(out, &session)?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let Some(command) = ReplCommand::parse(&line) else {
            continue;
        };

        match command {
            ReplCommand::Quit => break,
            ReplCommand::Help => writeln!(out, "{HELP}")?,
            ReplCommand::Invalid(hint) => writeln!(out, "{hint}")?,
            ReplCommand::Register { username, password } => {
                let Some(password) = resolve_password(password, password_input, &mut lines, out).await? else {
                    break;
                };
                match controller.register(&username, &password).await {
                    Ok(user) => writeln!(
                        out,
                        "Account '{}' created. Log in with /login {}.",
                        user.username, user.username
                    )?,
                    Err(e) => report(out, &e)?,
                }
            }
            ReplCommand::Login { username, password } => {
                if session.state() != SessionState::LoggedOut {
                    writeln!(out, "Already logged in. Use /logout first.")?;
                    continue;
                }
                let Some(password) = resolve_password(password, password_input, &mut lines, out).await? else {
                    break;
                };
                match controller.login(&username, &password).await {
                    Ok(s) => {
                        session = s;
                        writeln!(out, "Welcome, {}! Upload a PDF with /upload <path>.", username.trim())?;
                    }
                    Err(e) => report(out, &e)?,
                }
            }
            ReplCommand::Upload(path) => upload(controller, &mut session, &path, out).await?,
            ReplCommand::History => match controller.history(&session).await {
                Ok(turns) if turns.is_empty() => writeln!(out, "No history yet.")?,
                Ok(turns) => {
                    for turn in &turns {
                        writeln!(
                            out,
                            "[{}] You: {}\n      Assistant: {}",
                            turn.created_at.format("%Y-%m-%d %H:%M"),
                            turn.question,
                            turn.answer
                        )?;
                    }
                }
                Err(e) => report(out, &e)?,
            },
            ReplCommand::Clear => match controller.clear_history(&session).await {
                Ok(removed) => writeln!(out, "Removed {removed} turn(s).")?,
                Err(e) => report(out, &e)?,
            },
            ReplCommand::Logout => {
                if session.state() == SessionState::LoggedOut {
                    writeln!(out, "Not logged in.")?;
                } else {
                    controller.logout(&mut session);
                    writeln!(out, "Logged out.")?;
                }
            }
            ReplCommand::Ask(question) => {
                writeln!(out, "Thinking...")?;
                out.flush()?;
                match controller.ask(&session, &question).await {
                    Ok(turn) => writeln!(out, "\n{}\n", turn.answer)?,
                    Err(e) => report(out, &e)?,
                }
            }
        }
    }

    if session.username().is_some() {
        controller.logout(&mut session);
    }
    writeln!(out, "Goodbye!")?;
    Ok(())
}

async fn upload<W: Write>(
    controller: &SessionController,
    session: &mut Session,
    path: &Path,
    out: &mut W,
) -> anyhow::Result<()> {
    if session.username().is_none() {
        return report(out, &Error::NotLoggedIn);
    }

    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            writeln!(out, "Could not read {}: {e}", path.display())?;
            return Ok(());
        }
    };
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());

    match controller.upload_document(session, bytes, name).await {
        Ok(document) => writeln!(
            out,
            "Loaded {} ({} page(s), {} characters). Ask away!",
            document.label(),
            document.page_count,
            document.char_count()
        )?,
        Err(e) => report(out, &e)?,
    }
    Ok(())
}

/// Use the inline password, or prompt for one: hidden on a terminal, the
/// next input line otherwise. Returns `None` when input ends first.
async fn resolve_password<R, W>(
    inline: Option<String>,
    password_input: PasswordInput,
    lines: &mut Lines<R>,
    out: &mut W,
) -> anyhow::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    if inline.is_some() {
        return Ok(inline);
    }
    if password_input == PasswordInput::Masked {
        out.flush()?;
        return super::read_masked_password("Password: ".into()).await.map(Some);
    }
    write!(out, "Password: ")?;
    out.flush()?;
    Ok(lines.next_line().await?)
}

fn prompt<W: Write>(out: &mut W, session: &Session) -> std::io::Result<()> {
    match (session.username(), session.document()) {
        (Some(user), Some(doc)) => write!(out, "{user}@{}> ", doc.label())?,
        (Some(user), None) => write!(out, "{user}> ")?,
        _ => write!(out, "docchat> ")?,
    }
    out.flush()
}

fn report<W: Write>(out: &mut W, error: &Error) -> anyhow::Result<()> {
    tracing::debug!(error = %error, "Command failed");
    writeln!(out, "Error: {}", error.user_message())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docchat_core::{GenerationError, GenerationService, HashError, HashingService};
    use docchat_security::CredentialStore;
    use docchat_storage::InMemoryStore;
    use std::sync::Arc;

    struct PlainHasher;

    impl HashingService for PlainHasher {
        fn hash(&self, password: &str) -> Result<String, HashError> {
            Ok(format!("plain:{password}"))
        }
        fn verify(&self, password: &str, hash: &str) -> bool {
            hash == format!("plain:{password}")
        }
    }

    struct EchoGenerator;

    #[async_trait]
    impl GenerationService for EchoGenerator {
        fn name(&self) -> &str {
            "echo"
        }
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            Ok("Echoed answer".into())
        }
    }

    fn controller() -> SessionController {
        let store = Arc::new(InMemoryStore::new());
        let credentials = CredentialStore::new(store.clone(), Arc::new(PlainHasher));
        SessionController::new(credentials, store, Arc::new(EchoGenerator))
    }

    async fn drive(script: &str) -> String {
        let controller = controller();
        let mut out = Vec::new();
        run_repl(&controller, script.as_bytes(), &mut out, PasswordInput::Plain)
            .await
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn parse_commands() {
        assert_eq!(ReplCommand::parse("   "), None);
        assert_eq!(ReplCommand::parse("/quit"), Some(ReplCommand::Quit));
        assert_eq!(ReplCommand::parse("exit"), Some(ReplCommand::Quit));
        assert_eq!(ReplCommand::parse("/history"), Some(ReplCommand::History));
        assert_eq!(
            ReplCommand::parse("/login alice s3cret pw"),
            Some(ReplCommand::Login {
                username: "alice".into(),
                password: Some("s3cret pw".into()),
            })
        );
        assert_eq!(
            ReplCommand::parse("/register bob"),
            Some(ReplCommand::Register {
                username: "bob".into(),
                password: None,
            })
        );
        assert_eq!(
            ReplCommand::parse("/upload ./My Report.pdf"),
            Some(ReplCommand::Upload(PathBuf::from("./My Report.pdf")))
        );
        assert_eq!(
            ReplCommand::parse("What is this about?"),
            Some(ReplCommand::Ask("What is this about?".into()))
        );
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(matches!(
            ReplCommand::parse("/login"),
            Some(ReplCommand::Invalid(_))
        ));
        assert!(matches!(
            ReplCommand::parse("/upload"),
            Some(ReplCommand::Invalid(_))
        ));
        assert!(matches!(
            ReplCommand::parse("/frobnicate"),
            Some(ReplCommand::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn ask_requires_login_and_document() {
        let out = drive(
            "Hello?\n/register alice pw1\n/login alice pw1\nWhat is it?\n/history\n/quit\n",
        )
        .await;

        assert!(out.contains("Please log in first."));
        assert!(out.contains("Account 'alice' created."));
        assert!(out.contains("Welcome, alice!"));
        assert!(out.contains("Please upload a document first."));
        assert!(out.contains("No history yet."));
        assert!(out.contains("Goodbye!"));
    }

    #[tokio::test]
    async fn login_prompts_for_password() {
        let out = drive("/register carol pw\n/login carol\nwrong\n/login carol\npw\n").await;
        assert!(out.contains("Password: "));
        assert!(out.contains("Invalid username or password."));
        assert!(out.contains("Welcome, carol!"));
    }

    #[tokio::test]
    async fn prompted_password_is_not_written_back() {
        let out = drive("/register frank\nhunter2\n/login frank\nhunter2\n").await;
        assert!(out.contains("Password: "));
        assert!(out.contains("Welcome, frank!"));
        assert!(!out.contains("hunter2"));
    }

    #[tokio::test]
    async fn duplicate_registration_is_reported() {
        let out = drive("/register dave pw\n/register dave other\n").await;
        assert!(out.contains("Username already exists."));
    }

    #[tokio::test]
    async fn upload_missing_file_keeps_session() {
        let out = drive(
            "/register erin pw\n/login erin pw\n/upload /definitely/not/here.pdf\n/logout\n/logout\n",
        )
        .await;
        assert!(out.contains("Could not read /definitely/not/here.pdf"));
        assert!(out.contains("Logged out."));
        assert!(out.contains("Not logged in."));
    }
}
