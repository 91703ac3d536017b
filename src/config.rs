use crate::error::AdminError;
use crate::executor::ProcessRunner;
use dirs::config_dir;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info};

/// Per-tool naming used to find configuration.
#[derive(Debug, Clone, Copy)]
pub struct Profile {
    /// Binary name, also the config file stem.
    pub tool: &'static str,
    /// Prefix of every environment variable the tool reads.
    pub env_prefix: &'static str,
    /// Whether a bind identity is required in addition to the secret.
    pub requires_identity: bool,
}

impl Profile {
    pub fn var(&self, suffix: &str) -> String {
        format!("{}_{}", self.env_prefix, suffix)
    }
}

/// A secret value that never appears in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub identity: Option<String>,
    pub secret: Secret,
}

/// Optional on-disk settings. Secrets are never read from this file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub secret_command: Option<String>,
    #[serde(default)]
    pub program: Option<String>,
}

/// Everything a tool needs from its environment, resolved once at startup.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub endpoint: String,
    pub credentials: Credentials,
    /// External binary override (directory tool only).
    pub program: Option<String>,
}

impl ToolConfig {
    /// Load configuration from file and process environment.
    ///
    /// Environment variables override the file.
    pub async fn load(profile: &Profile, runner: &dyn ProcessRunner) -> Result<Self, AdminError> {
        let env: HashMap<String, String> = std::env::vars().collect();
        let file = Self::load_file(profile, &env)?;
        Self::resolve(profile, file, &env, runner).await
    }

    /// Resolves a config from explicit sources.
    ///
    /// # Errors
    ///
    /// [`AdminError::Precondition`] naming the first missing variable, or a
    /// failed secret command.
    pub async fn resolve(
        profile: &Profile,
        file: FileConfig,
        env: &HashMap<String, String>,
        runner: &dyn ProcessRunner,
    ) -> Result<Self, AdminError> {
        let lookup = |suffix: &str| env.get(&profile.var(suffix)).filter(|v| !v.is_empty()).cloned();

        let endpoint = lookup("URL")
            .or(file.url)
            .ok_or_else(|| missing(profile, "URL"))?;

        let identity = lookup("USER").or(file.user);
        if profile.requires_identity && identity.is_none() {
            return Err(missing(profile, "USER"));
        }

        let secret = match lookup("SECRET") {
            Some(value) => Secret::new(value),
            None => match lookup("SECRET_COMMAND").or(file.secret_command) {
                Some(command) => fetch_secret(profile, &command, runner).await?,
                None => {
                    return Err(AdminError::Precondition(format!(
                        "{} is not set and no {} is configured",
                        profile.var("SECRET"),
                        profile.var("SECRET_COMMAND")
                    )));
                }
            },
        };

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            credentials: Credentials { identity, secret },
            program: lookup("PROGRAM").or(file.program),
        })
    }

    fn load_file(profile: &Profile, env: &HashMap<String, String>) -> Result<FileConfig, AdminError> {
        let Some(path) = Self::config_path(profile, env) else {
            return Ok(FileConfig::default());
        };
        if !path.exists() {
            debug!("No config file at {}, using environment only", path.display());
            return Ok(FileConfig::default());
        }
        let content = fs::read_to_string(&path).map_err(|e| {
            AdminError::Precondition(format!("cannot read {}: {}", path.display(), e))
        })?;
        let file: FileConfig = toml::from_str(&content).map_err(|e| {
            AdminError::Precondition(format!("invalid config {}: {}", path.display(), e))
        })?;
        info!("Loaded config from: {}", path.display());
        Ok(file)
    }

    /// `<P>_CONFIG` if set, else `<config_dir>/adminkit/<tool>.toml`.
    pub fn config_path(profile: &Profile, env: &HashMap<String, String>) -> Option<PathBuf> {
        if let Some(explicit) = env.get(&profile.var("CONFIG")) {
            return Some(PathBuf::from(explicit));
        }
        config_dir().map(|dir| dir.join("adminkit").join(format!("{}.toml", profile.tool)))
    }

    /// Prints where configuration comes from and which values are set.
    pub fn show_config_info<W: Write + ?Sized>(profile: &Profile, out: &mut W) -> std::io::Result<()> {
        let env: HashMap<String, String> = std::env::vars().collect();
        match Self::config_path(profile, &env) {
            Some(path) => {
                let status = if path.exists() { "found" } else { "not found" };
                writeln!(out, "Configuration file: {} ({})", path.display(), status)?;
            }
            None => writeln!(out, "Configuration file: none (no config directory)")?,
        }
        for suffix in ["URL", "USER", "SECRET", "SECRET_COMMAND", "PROGRAM"] {
            let name = profile.var(suffix);
            let state = if env.get(&name).is_some_and(|v| !v.is_empty()) {
                "set"
            } else {
                "not set"
            };
            writeln!(out, "{}: {}", name, state)?;
        }
        Ok(())
    }
}

fn missing(profile: &Profile, suffix: &str) -> AdminError {
    AdminError::Precondition(format!("{} is not set", profile.var(suffix)))
}

/// Runs the external secret-store command once and takes its trimmed stdout.
async fn fetch_secret(
    profile: &Profile,
    command: &str,
    runner: &dyn ProcessRunner,
) -> Result<Secret, AdminError> {
    let source = profile.var("SECRET_COMMAND");
    let output = runner
        .run("sh", &["-c".to_string(), command.to_string()])
        .await
        .map_err(|e| AdminError::Precondition(format!("{}: {}", source, e)))?;
    if !output.status.success() {
        return Err(AdminError::Precondition(format!(
            "{} failed with {}",
            source, output.status
        )));
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if value.is_empty() {
        return Err(AdminError::Precondition(format!("{} returned no secret", source)));
    }
    Ok(Secret::new(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProcessRunner;

    const PROFILE: Profile = Profile {
        tool: "diradm",
        env_prefix: "DIRADM",
        requires_identity: true,
    };

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[tokio::test]
    async fn test_resolve_from_environment() {
        let runner = MockProcessRunner::new();
        let env = env(&[
            ("DIRADM_URL", "ldaps://dc1.example.org/"),
            ("DIRADM_USER", "admin"),
            ("DIRADM_SECRET", "hunter2"),
        ]);

        let config = ToolConfig::resolve(&PROFILE, FileConfig::default(), &env, &runner)
            .await
            .unwrap();

        assert_eq!(config.endpoint, "ldaps://dc1.example.org");
        assert_eq!(config.credentials.identity.as_deref(), Some("admin"));
        assert_eq!(config.credentials.secret.expose(), "hunter2");
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_environment_overrides_file() {
        let runner = MockProcessRunner::new();
        let file = FileConfig {
            url: Some("ldap://file".to_string()),
            user: Some("file-user".to_string()),
            secret_command: None,
            program: Some("samba-tool".to_string()),
        };
        let env = env(&[("DIRADM_URL", "ldap://env"), ("DIRADM_SECRET", "s")]);

        let config = ToolConfig::resolve(&PROFILE, file, &env, &runner).await.unwrap();

        assert_eq!(config.endpoint, "ldap://env");
        assert_eq!(config.credentials.identity.as_deref(), Some("file-user"));
        assert_eq!(config.program.as_deref(), Some("samba-tool"));
    }

    #[tokio::test]
    async fn test_missing_url_is_reported_by_name() {
        let runner = MockProcessRunner::new();
        let err = ToolConfig::resolve(&PROFILE, FileConfig::default(), &env(&[]), &runner)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "config: DIRADM_URL is not set");
    }

    #[tokio::test]
    async fn test_empty_variable_counts_as_missing() {
        let runner = MockProcessRunner::new();
        let env = env(&[("DIRADM_URL", "ldap://x"), ("DIRADM_USER", "")]);
        let err = ToolConfig::resolve(&PROFILE, FileConfig::default(), &env, &runner)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "config: DIRADM_USER is not set");
    }

    #[tokio::test]
    async fn test_identity_optional_when_profile_allows() {
        let profile = Profile {
            tool: "forgeadm",
            env_prefix: "FORGEADM",
            requires_identity: false,
        };
        let runner = MockProcessRunner::new();
        let env = env(&[("FORGEADM_URL", "https://forge"), ("FORGEADM_SECRET", "tok")]);
        let config = ToolConfig::resolve(&profile, FileConfig::default(), &env, &runner)
            .await
            .unwrap();
        assert!(config.credentials.identity.is_none());
    }

    #[tokio::test]
    async fn test_missing_secret_names_both_sources() {
        let runner = MockProcessRunner::new();
        let env = env(&[("DIRADM_URL", "ldap://x"), ("DIRADM_USER", "admin")]);
        let err = ToolConfig::resolve(&PROFILE, FileConfig::default(), &env, &runner)
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("DIRADM_SECRET"));
        assert!(message.contains("DIRADM_SECRET_COMMAND"));
    }

    #[tokio::test]
    async fn test_secret_from_command_is_trimmed() {
        let runner = MockProcessRunner::new().succeed("s3cret\n");
        let env = env(&[
            ("DIRADM_URL", "ldap://x"),
            ("DIRADM_USER", "admin"),
            ("DIRADM_SECRET_COMMAND", "vault kv get -field=password secret/ldap"),
        ]);

        let config = ToolConfig::resolve(&PROFILE, FileConfig::default(), &env, &runner)
            .await
            .unwrap();

        assert_eq!(config.credentials.secret.expose(), "s3cret");
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "sh");
        assert_eq!(calls[0].1[1], "vault kv get -field=password secret/ldap");
    }

    #[tokio::test]
    async fn test_failing_secret_command_is_a_precondition_error() {
        let runner = MockProcessRunner::new().fail(1, "");
        let file = FileConfig {
            secret_command: Some("false".to_string()),
            ..FileConfig::default()
        };
        let env = env(&[("DIRADM_URL", "ldap://x"), ("DIRADM_USER", "admin")]);

        let err = ToolConfig::resolve(&PROFILE, file, &env, &runner).await.unwrap_err();
        assert!(matches!(err, AdminError::Precondition(_)));
    }

    #[tokio::test]
    async fn test_empty_secret_command_output_is_rejected() {
        let runner = MockProcessRunner::new().succeed("  \n");
        let env = env(&[
            ("DIRADM_URL", "ldap://x"),
            ("DIRADM_USER", "admin"),
            ("DIRADM_SECRET_COMMAND", "printf ''"),
        ]);
        let err = ToolConfig::resolve(&PROFILE, FileConfig::default(), &env, &runner)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("returned no secret"));
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let creds = Credentials {
            identity: Some("admin".to_string()),
            secret: Secret::new("hunter2"),
        };
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("Secret(***)"));
    }

    #[test]
    fn test_file_config_parses_toml() {
        let file: FileConfig = toml::from_str(
            "url = \"https://sonar.example\"\nsecret_command = \"pass show sonar\"\n",
        )
        .unwrap();
        assert_eq!(file.url.as_deref(), Some("https://sonar.example"));
        assert_eq!(file.secret_command.as_deref(), Some("pass show sonar"));
    }

    #[test]
    fn test_file_config_rejects_secret_key() {
        assert!(toml::from_str::<FileConfig>("secret = \"plain\"\n").is_err());
    }

    #[test]
    fn test_load_file_reads_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diradm.toml");
        fs::write(&path, "url = \"ldap://from-file\"\n").unwrap();
        let env = env(&[("DIRADM_CONFIG", path.to_str().unwrap())]);

        let file = ToolConfig::load_file(&PROFILE, &env).unwrap();
        assert_eq!(file.url.as_deref(), Some("ldap://from-file"));
    }

    #[test]
    fn test_load_file_invalid_toml_is_a_precondition_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diradm.toml");
        fs::write(&path, "url = [").unwrap();
        let env = env(&[("DIRADM_CONFIG", path.to_str().unwrap())]);

        let err = ToolConfig::load_file(&PROFILE, &env).unwrap_err();
        assert!(matches!(err, AdminError::Precondition(_)));
    }

    #[test]
    fn test_load_file_missing_is_default() {
        let env = env(&[("DIRADM_CONFIG", "/nonexistent/adminkit/diradm.toml")]);
        let file = ToolConfig::load_file(&PROFILE, &env).unwrap();
        assert!(file.url.is_none());
    }
}
