pub mod config;
pub mod credentials;

pub use config::{ConfigManager, SecretConfig, UserConfig};
pub use credentials::{AwsCliSecretStore, CredentialResolver, Credentials, SecretStore};
