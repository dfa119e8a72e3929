use std::path::PathBuf;

use secrecy::Secret;

use courier_core::roles::Secrets;

/// Runtime configuration for the relay bot.
///
/// All five credentials are required at startup even though the Bot API
/// client only consumes the token: a deployment missing any of them is
/// misconfigured and must fail fast rather than run partially.
pub struct RelayConfig {
    /// Application ID issued by my.telegram.org.
    pub api_id: Secret<String>,

    /// Application hash issued alongside the ID.
    pub api_hash: Secret<String>,

    /// Bot token from @BotFather.
    pub bot_token: Secret<String>,

    /// Shared secret granting the admin role.
    pub admin_secret: Secret<String>,

    /// Shared secret granting the owner role.
    pub owner_secret: Secret<String>,

    /// Number of concurrent delivery workers.
    pub workers: usize,

    /// Role-store snapshot file; `None` disables persistence.
    pub snapshot_path: Option<PathBuf>,
}

impl RelayConfig {
    /// Authentication secrets in the form the role store consumes.
    #[must_use]
    pub fn secrets(&self) -> Secrets {
        Secrets {
            admin: self.admin_secret.clone(),
            owner: self.owner_secret.clone(),
        }
    }
}

impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("api_id", &"[REDACTED]")
            .field("api_hash", &"[REDACTED]")
            .field("bot_token", &"[REDACTED]")
            .field("admin_secret", &"[REDACTED]")
            .field("owner_secret", &"[REDACTED]")
            .field("workers", &self.workers)
            .field("snapshot_path", &self.snapshot_path)
            .finish()
    }
}
