use crate::cli::actions::Action;
use anyhow::{Context, Result};
use secrecy::SecretString;

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let secret = |name: &str| -> Result<SecretString> {
        matches
            .get_one::<String>(name)
            .map(|s| SecretString::from(s.to_string()))
            .with_context(|| format!("missing required argument: --{name}"))
    };

    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        dsn: matches
            .get_one("dsn")
            .map(|s: &String| s.to_string())
            .context("missing required argument: --dsn")?,
        access_secret: secret("access-secret")?,
        refresh_secret: secret("refresh-secret")?,
        frontend_base_url: matches
            .get_one("frontend-url")
            .map(|s: &String| s.to_string())
            .context("missing required argument: --frontend-url")?,
    })
}
