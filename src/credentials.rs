use crate::config;
use crate::models::ProviderKind;
use directories::BaseDirs;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub account_id: Option<String>,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            account_id: None,
        }
    }

    pub fn with_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("account_id", &self.account_id)
            .finish()
    }
}

/// A credential source consulted before any on-disk file.
pub trait CredentialStore: Send + Sync {
    fn get(&self, kind: ProviderKind) -> Option<Credential>;
}

/// Tokens saved with `set-token` in the OS keyring.
pub struct KeyringStore;

impl CredentialStore for KeyringStore {
    fn get(&self, kind: ProviderKind) -> Option<Credential> {
        let token = match config::get_keyring_value(kind, "") {
            Ok(Some(token)) => token,
            Ok(None) => return None,
            Err(e) => {
                debug!(provider = %kind, error = %e, "keyring unavailable");
                return None;
            }
        };
        let credential = Credential::new(token);
        Some(match config::get_keyring_value(kind, ":account").ok().flatten() {
            Some(account) => credential.with_account(account),
            None => credential,
        })
    }
}

/// A store that never has anything; used when the keyring is disabled.
pub struct NoStore;

impl CredentialStore for NoStore {
    fn get(&self, _kind: ProviderKind) -> Option<Credential> {
        None
    }
}

impl CredentialStore for HashMap<ProviderKind, Credential> {
    fn get(&self, kind: ProviderKind) -> Option<Credential> {
        HashMap::get(self, &kind).cloned()
    }
}

/// Where provider credential files live on disk.
#[derive(Debug, Clone)]
pub struct CredentialPaths {
    pub agent_auth: PathBuf,
    pub copilot_config_dir: PathBuf,
    pub codex_home: PathBuf,
}

impl CredentialPaths {
    /// Resolves the default locations under the user's home directory.
    /// `CODEX_HOME` overrides the Codex directory.
    pub fn discover() -> Option<Self> {
        let base = BaseDirs::new()?;
        Some(Self::with_codex_override(
            base.home_dir(),
            std::env::var_os("CODEX_HOME"),
        ))
    }

    /// An empty override counts as unset.
    fn with_codex_override(home: &Path, codex_home: Option<OsString>) -> Self {
        let codex_home = codex_home
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join(".codex"));
        Self::rooted_at(home, codex_home)
    }

    pub fn rooted_at(home: &Path, codex_home: PathBuf) -> Self {
        Self {
            agent_auth: home.join(".pi").join("agent").join("auth.json"),
            copilot_config_dir: home.join(".config").join("github-copilot"),
            codex_home,
        }
    }
}

pub struct CredentialLoader {
    store: Box<dyn CredentialStore>,
    paths: Option<CredentialPaths>,
}

impl CredentialLoader {
    pub fn new(store: Box<dyn CredentialStore>, paths: Option<CredentialPaths>) -> Self {
        Self { store, paths }
    }

    /// Builds the loader used by the CLI, honoring the keyring and agent
    /// auth path settings.
    pub fn from_config(cfg: &config::AppConfig) -> Self {
        let store: Box<dyn CredentialStore> = if cfg.use_keyring {
            Box::new(KeyringStore)
        } else {
            Box::new(NoStore)
        };
        let mut paths = CredentialPaths::discover();
        if let (Some(paths), Some(custom)) = (paths.as_mut(), cfg.agent_auth_path.as_ref()) {
            paths.agent_auth = custom.clone();
        }
        Self::new(store, paths)
    }

    /// Returns the first credential found for `kind`. Missing or malformed
    /// files are skipped silently.
    pub fn load(&self, kind: ProviderKind) -> Option<Credential> {
        if let Some(found) = self.store.get(kind).filter(|c| !c.token.is_empty()) {
            trace!(provider = %kind, "credential from store");
            return Some(found);
        }

        let paths = self.paths.as_ref()?;
        let found = match kind {
            ProviderKind::Copilot => agent_credential(&paths.agent_auth, kind)
                .or_else(|| copilot_app_credential(&paths.copilot_config_dir)),
            ProviderKind::Codex => agent_credential(&paths.agent_auth, kind)
                .or_else(|| codex_cli_credential(&paths.codex_home.join("auth.json"))),
        };

        if found.is_none() {
            debug!(provider = %kind, "no credential on disk");
        }
        found
    }
}

fn read_json(path: &Path) -> Option<Value> {
    let raw = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "ignoring malformed credential file");
            None
        }
    }
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Entry in the coding agent's shared auth file, keyed by provider id.
///
/// ```json
/// { "openai-codex": { "type": "oauth", "access": "...", "accountId": "..." } }
/// ```
fn agent_credential(path: &Path, kind: ProviderKind) -> Option<Credential> {
    let doc = read_json(path)?;
    let entry = doc.get(kind.provider_id())?;

    if let Some(key) = non_empty(entry.get("key")) {
        return Some(Credential::new(key));
    }

    match kind {
        // The GitHub OAuth token is stored as the refresh token; the access
        // token is a short-lived Copilot session token the usage API rejects.
        ProviderKind::Copilot => non_empty(entry.get("refresh")).map(Credential::new),
        ProviderKind::Codex => {
            let token = non_empty(entry.get("access"))?;
            Some(Credential {
                token,
                account_id: non_empty(entry.get("accountId")),
            })
        }
    }
}

/// GitHub Copilot editor plugins keep `{ "<host>:<app>": { "oauth_token": ... } }`.
fn copilot_app_credential(dir: &Path) -> Option<Credential> {
    ["apps.json", "hosts.json"].iter().find_map(|name| {
        let doc = read_json(&dir.join(name))?;
        doc.as_object()?
            .values()
            .find_map(|entry| non_empty(entry.get("oauth_token")))
            .map(Credential::new)
    })
}

#[derive(Debug, Deserialize)]
struct CodexAuthFile {
    #[serde(rename = "OPENAI_API_KEY")]
    api_key: Option<String>,
    tokens: Option<CodexTokens>,
}

#[derive(Debug, Deserialize)]
struct CodexTokens {
    access_token: Option<String>,
    account_id: Option<String>,
}

fn codex_cli_credential(path: &Path) -> Option<Credential> {
    let doc = read_json(path)?;
    let auth: CodexAuthFile = serde_json::from_value(doc).ok()?;

    if let Some(tokens) = auth.tokens {
        if let Some(token) = tokens.access_token.filter(|t| !t.is_empty()) {
            return Some(Credential {
                token,
                account_id: tokens.account_id.filter(|a| !a.is_empty()),
            });
        }
    }

    auth.api_key.filter(|k| !k.is_empty()).map(Credential::new)
}
