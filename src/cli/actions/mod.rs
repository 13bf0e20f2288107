pub mod server;

use secrecy::SecretString;

#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        dsn: String,
        access_secret: SecretString,
        refresh_secret: SecretString,
        frontend_base_url: String,
    },
}
