use crate::api;
use crate::api::email::EmailWorkerConfig;
use crate::api::handlers::auth::AuthConfig;
use crate::cli::actions::Action;
use crate::tokens::TokenKeys;
use anyhow::{Context, Result};

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server {
            port,
            dsn,
            access_secret,
            refresh_secret,
            frontend_base_url,
        } => {
            // Missing or empty secrets abort startup here, never mid-request.
            let keys = TokenKeys::new(&access_secret, &refresh_secret)
                .context("invalid token signing configuration")?;
            let auth_config = AuthConfig::new(frontend_base_url);
            let email_config = EmailWorkerConfig::new();

            api::new(port, dsn, keys, auth_config, email_config).await?;
        }
    }

    Ok(())
}
