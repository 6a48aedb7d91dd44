//! Command-line console for the safety portal: the admin screens and the
//! public report form driven against a live API.

pub mod args;
pub mod commands;
pub mod error;
pub mod state;

use crate::args::CliArgs;
use crate::error::{AdminError, AdminResult};
use crate::state::AppState;
use portal_core::config::PortalConfig;
use std::collections::HashMap;
use std::io::Read;

/// Process environment first, then a `.env` file in the working directory
/// or one of its parents for anything still unset.
pub fn load_config() -> PortalConfig {
    let file = dotenv_entries(dotenvy::dotenv_iter());
    config_from(&file, |key| std::env::var(key).ok())
}

fn dotenv_entries<R: Read>(
    found: Result<dotenvy::Iter<R>, dotenvy::Error>,
) -> HashMap<String, String> {
    found
        .map(|entries| entries.filter_map(Result::ok).collect())
        .unwrap_or_default()
}

fn config_from(
    file: &HashMap<String, String>,
    env: impl Fn(&str) -> Option<String>,
) -> PortalConfig {
    PortalConfig::from_lookup(|key| env(key).or_else(|| file.get(key).cloned()))
}

/// Signs in when the command needs it, runs it and prints the result as
/// pretty JSON.
pub async fn run<I, S>(args: I, config: &PortalConfig) -> AdminResult<()>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let args = CliArgs::parse(args)?;
    if args.positional.is_empty() || args.positional(0) == Some("help") {
        println!("{}", commands::USAGE);
        return Ok(());
    }
    let mut state = AppState::connect(config, commands::needs_session(&args)).await?;
    let output = commands::dispatch(&mut state, &args).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Process exit code for a failed command.
pub fn exit_code(err: &AdminError) -> i32 {
    match err {
        AdminError::Usage(_) => 2,
        AdminError::NotSignedIn => 3,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotenv_fills_what_the_environment_leaves_unset() {
        let path = std::env::temp_dir().join(format!("portal-admin-{}.env", std::process::id()));
        std::fs::write(
            &path,
            "PORTAL_API_BASE=https://portal.example/api/\nPORTAL_USERNAME=ops\n",
        )
        .expect("write env file");
        let file = dotenv_entries(dotenvy::from_path_iter(&path));
        let _ = std::fs::remove_file(&path);

        let config = config_from(&file, |key| {
            (key == "PORTAL_USERNAME").then(|| "admin".to_string())
        });
        assert_eq!(config.api_base, "https://portal.example/api");
        assert_eq!(config.username.as_deref(), Some("admin"));
        assert_eq!(config.password, None);
    }

    #[test]
    fn missing_dotenv_file_changes_nothing() {
        let path = std::env::temp_dir().join("portal-admin-no-such-file.env");
        let file = dotenv_entries(dotenvy::from_path_iter(&path));
        assert!(file.is_empty());
        let config = config_from(&file, |_| None);
        assert_eq!(config, PortalConfig::default());
    }
}
