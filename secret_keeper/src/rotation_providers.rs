// /////////////////////////////////////////////////////////////////////////////
// secret-keeper
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Rotation Providers (C5)
//!
//! Four [`RotationProvider`] implementations registered in a tag-indexed
//! map at startup. `custom` shells out to operator-supplied commands;
//! `openai` and `github` are reachability checks that deliberately fail the
//! mutating path (their APIs have no programmatic key-rotation surface);
//! `aws` performs a full IAM access-key rotation via the platform CLI.

use async_trait::async_trait;
use secret_keeper_domain::{Result, RotationConfig, RotationProvider, SecretKeeperError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

/// Registry of rotation providers keyed by [`RotationProvider::provider_tag`].
pub struct ProviderRegistry {
    providers: HashMap<&'static str, Arc<dyn RotationProvider>>,
}

impl ProviderRegistry {
    pub fn with_defaults() -> Self {
        let mut providers: HashMap<&'static str, Arc<dyn RotationProvider>> = HashMap::new();
        let custom = Arc::new(CustomProvider);
        let openai = Arc::new(OpenAiProvider::default());
        let aws = Arc::new(AwsProvider);
        let github = Arc::new(GitHubProvider::default());
        providers.insert(custom.provider_tag(), custom);
        providers.insert(openai.provider_tag(), openai);
        providers.insert(aws.provider_tag(), aws);
        providers.insert(github.provider_tag(), github);
        Self { providers }
    }

    /// Look up a provider by tag, fail-fast on an unknown tag (§4.5).
    pub fn get(&self, tag: &str) -> Result<Arc<dyn RotationProvider>> {
        self.providers.get(tag).cloned().ok_or_else(|| SecretKeeperError::UnknownProvider(tag.to_string()))
    }
}

fn provider_config<T: for<'de> Deserialize<'de>>(config: &RotationConfig) -> Result<T> {
    serde_json::from_str(&config.provider_config).map_err(|e| SecretKeeperError::RotationError(format!("invalid provider config: {e}")))
}

async fn run_shell(command: &str, env: &[(&str, &str)]) -> Result<std::process::Output> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command).stdout(Stdio::piped()).stderr(Stdio::piped());
    for (key, value) in env {
        cmd.env(key, value);
    }
    cmd.output().await.map_err(|e| SecretKeeperError::RotationError(format!("failed to spawn rotate command: {e}")))
}

/// Configuration blob for the `custom` provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomProviderConfig {
    pub rotate_command: String,
    pub validate_command: Option<String>,
}

/// Shells out to operator-supplied rotate/validate commands.
#[derive(Debug, Default, Clone, Copy)]
pub struct CustomProvider;

#[async_trait]
impl RotationProvider for CustomProvider {
    fn provider_tag(&self) -> &'static str {
        "custom"
    }

    fn display_name(&self) -> &'static str {
        "Custom Command"
    }

    async fn rotate(&self, config: &RotationConfig, current_value: &str) -> Result<String> {
        let provider_config: CustomProviderConfig = provider_config(config)?;

        let output = run_shell(&provider_config.rotate_command, &[("CURRENT_SECRET_VALUE", current_value)]).await?;
        let new_value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if new_value.is_empty() {
            return Err(SecretKeeperError::RotationError("rotate command produced no output".to_string()));
        }

        if let Some(validate_command) = &provider_config.validate_command {
            let validation = run_shell(validate_command, &[("SECRET_VALUE", &new_value)]).await?;
            if !validation.status.success() {
                return Err(SecretKeeperError::RotationError("validate command rejected the new value".to_string()));
            }
        }

        Ok(new_value)
    }

    fn validate_config(&self, config: &RotationConfig) -> bool {
        provider_config::<CustomProviderConfig>(config).map(|c| !c.rotate_command.trim().is_empty()).unwrap_or(false)
    }

    async fn test_rotate(&self, config: &RotationConfig, current_value: &str) -> Result<bool> {
        let provider_config: CustomProviderConfig = provider_config(config)?;
        let output = run_shell(&provider_config.rotate_command, &[("CURRENT_SECRET_VALUE", current_value), ("DRY_RUN", "1")]).await?;
        Ok(output.status.success())
    }
}

/// Configuration blob for the `openai` provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiProviderConfig {
    pub api_key_secret_name: String,
}

/// Reachability-check-only provider: the OpenAI public API has no
/// programmatic key-creation endpoint, so `rotate` always fails after
/// confirming the current key still works.
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
}

impl Default for OpenAiProvider {
    fn default() -> Self {
        Self { client: reqwest::Client::new(), base_url: "https://api.openai.com".to_string() }
    }
}

#[async_trait]
impl RotationProvider for OpenAiProvider {
    fn provider_tag(&self) -> &'static str {
        "openai"
    }

    fn display_name(&self) -> &'static str {
        "OpenAI"
    }

    async fn rotate(&self, config: &RotationConfig, current_value: &str) -> Result<String> {
        let _: OpenAiProviderConfig = provider_config(config)?;
        if !self.check_models_endpoint(current_value).await? {
            return Err(SecretKeeperError::RotationError("current OpenAI key failed verification".to_string()));
        }
        Err(SecretKeeperError::RotationError(
            "OpenAI does not expose programmatic API key creation; rotate the key in the dashboard and use `custom` to automate the update".to_string(),
        ))
    }

    fn validate_config(&self, config: &RotationConfig) -> bool {
        provider_config::<OpenAiProviderConfig>(config).map(|c| !c.api_key_secret_name.trim().is_empty()).unwrap_or(false)
    }

    async fn test_rotate(&self, config: &RotationConfig, current_value: &str) -> Result<bool> {
        let _: OpenAiProviderConfig = provider_config(config)?;
        self.check_models_endpoint(current_value).await
    }
}

impl OpenAiProvider {
    async fn check_models_endpoint(&self, api_key: &str) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/v1/models", self.base_url))
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(|e| SecretKeeperError::RotationError(format!("OpenAI reachability check failed: {e}")))?;
        Ok(response.status().is_success())
    }
}

/// Configuration blob for the `aws` provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsProviderConfig {
    pub access_key_id_secret_name: String,
    pub secret_access_key_secret_name: String,
}

/// AWS IAM access-key rotation via the `aws` CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct AwsProvider;

/// Serialized on success as the new secret value (a JSON pair).
#[derive(Debug, Serialize, Deserialize)]
struct AwsKeyPair {
    access_key_id: String,
    secret_access_key: String,
}

impl AwsProvider {
    async fn caller_identity(&self, env: &[(&str, &str)]) -> Result<serde_json::Value> {
        let output = run_shell("aws sts get-caller-identity --output json", env).await?;
        if !output.status.success() {
            return Err(SecretKeeperError::RotationError("aws sts get-caller-identity failed".to_string()));
        }
        serde_json::from_slice(&output.stdout).map_err(|e| SecretKeeperError::RotationError(format!("unexpected caller-identity output: {e}")))
    }

    fn iam_user_from_arn(identity: &serde_json::Value) -> Result<String> {
        let arn = identity
            .get("Arn")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SecretKeeperError::RotationError("caller identity missing Arn".to_string()))?;
        arn.rsplit('/').next().map(str::to_string).ok_or_else(|| SecretKeeperError::RotationError(format!("unparseable ARN: {arn}")))
    }
}

#[async_trait]
impl RotationProvider for AwsProvider {
    fn provider_tag(&self) -> &'static str {
        "aws"
    }

    fn display_name(&self) -> &'static str {
        "AWS IAM Access Key"
    }

    async fn rotate(&self, config: &RotationConfig, current_value: &str) -> Result<String> {
        let _: AwsProviderConfig = provider_config(config)?;
        let current: AwsKeyPair = serde_json::from_str(current_value)
            .map_err(|e| SecretKeeperError::RotationError(format!("stored AWS credential is not a key pair: {e}")))?;

        let current_env = [
            ("AWS_ACCESS_KEY_ID", current.access_key_id.as_str()),
            ("AWS_SECRET_ACCESS_KEY", current.secret_access_key.as_str()),
        ];

        // (1) verify current credentials and extract the IAM user.
        let identity = self.caller_identity(&current_env).await?;
        let user_name = Self::iam_user_from_arn(&identity)?;

        // (2) create a new access-key pair.
        let create = run_shell(&format!("aws iam create-access-key --user-name {user_name} --output json"), &current_env).await?;
        if !create.status.success() {
            return Err(SecretKeeperError::RotationError("aws iam create-access-key failed".to_string()));
        }
        let created: serde_json::Value = serde_json::from_slice(&create.stdout)
            .map_err(|e| SecretKeeperError::RotationError(format!("unexpected create-access-key output: {e}")))?;
        let new_pair = created
            .get("AccessKey")
            .ok_or_else(|| SecretKeeperError::RotationError("create-access-key response missing AccessKey".to_string()))?;
        let new_key_id = new_pair.get("AccessKeyId").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        let new_secret = new_pair.get("SecretAccessKey").and_then(|v| v.as_str()).unwrap_or_default().to_string();

        // (3) brief propagation wait.
        tokio::time::sleep(std::time::Duration::from_secs(10)).await;

        // (4) verify the new pair.
        let new_env = [("AWS_ACCESS_KEY_ID", new_key_id.as_str()), ("AWS_SECRET_ACCESS_KEY", new_secret.as_str())];
        if self.caller_identity(&new_env).await.is_err() {
            let _ = run_shell(&format!("aws iam delete-access-key --user-name {user_name} --access-key-id {new_key_id}"), &current_env).await;
            return Err(SecretKeeperError::RotationError("new AWS access key failed verification; rolled back".to_string()));
        }

        // (5) delete the old key.
        let old_key_id = &current.access_key_id;
        run_shell(&format!("aws iam delete-access-key --user-name {user_name} --access-key-id {old_key_id}"), &new_env).await?;

        let new_pair = AwsKeyPair { access_key_id: new_key_id, secret_access_key: new_secret };
        serde_json::to_string(&new_pair).map_err(|e| SecretKeeperError::RotationError(e.to_string()))
    }

    fn validate_config(&self, config: &RotationConfig) -> bool {
        provider_config::<AwsProviderConfig>(config)
            .map(|c| !c.access_key_id_secret_name.trim().is_empty() && !c.secret_access_key_secret_name.trim().is_empty())
            .unwrap_or(false)
    }

    async fn test_rotate(&self, config: &RotationConfig, current_value: &str) -> Result<bool> {
        let _: AwsProviderConfig = provider_config(config)?;
        let current: AwsKeyPair = serde_json::from_str(current_value)
            .map_err(|e| SecretKeeperError::RotationError(format!("stored AWS credential is not a key pair: {e}")))?;
        let env = [("AWS_ACCESS_KEY_ID", current.access_key_id.as_str()), ("AWS_SECRET_ACCESS_KEY", current.secret_access_key.as_str())];
        Ok(self.caller_identity(&env).await.is_ok())
    }
}

/// Configuration blob for the `github` provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubProviderConfig {
    pub token_secret_name: String,
}

/// Reachability-check-only provider, included for completeness and parity
/// with `openai`; GitHub personal access tokens have no rotation API.
pub struct GitHubProvider {
    client: reqwest::Client,
}

impl Default for GitHubProvider {
    fn default() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

#[async_trait]
impl RotationProvider for GitHubProvider {
    fn provider_tag(&self) -> &'static str {
        "github"
    }

    fn display_name(&self) -> &'static str {
        "GitHub"
    }

    async fn rotate(&self, config: &RotationConfig, current_value: &str) -> Result<String> {
        let _: GitHubProviderConfig = provider_config(config)?;
        if !self.check_user_endpoint(current_value).await? {
            return Err(SecretKeeperError::RotationError("current GitHub token failed verification".to_string()));
        }
        Err(SecretKeeperError::RotationError(
            "GitHub tokens have no rotation API; generate a new token manually and use `custom` to automate the update".to_string(),
        ))
    }

    fn validate_config(&self, config: &RotationConfig) -> bool {
        provider_config::<GitHubProviderConfig>(config).map(|c| !c.token_secret_name.trim().is_empty()).unwrap_or(false)
    }

    async fn test_rotate(&self, config: &RotationConfig, current_value: &str) -> Result<bool> {
        let _: GitHubProviderConfig = provider_config(config)?;
        self.check_user_endpoint(current_value).await
    }
}

impl GitHubProvider {
    async fn check_user_endpoint(&self, token: &str) -> Result<bool> {
        let response = self
            .client
            .get("https://api.github.com/user")
            .bearer_auth(token)
            .header("User-Agent", "secret-keeperd")
            .send()
            .await
            .map_err(|e| SecretKeeperError::RotationError(format!("GitHub reachability check failed: {e}")))?;
        Ok(response.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom_config(rotate: &str, validate: Option<&str>) -> RotationConfig {
        let blob = serde_json::to_string(&CustomProviderConfig { rotate_command: rotate.to_string(), validate_command: validate.map(str::to_string) }).unwrap();
        RotationConfig::new("API_KEY", "custom", 30, blob)
    }

    #[test]
    fn registry_resolves_known_tags() {
        let registry = ProviderRegistry::with_defaults();
        assert!(registry.get("custom").is_ok());
        assert!(registry.get("openai").is_ok());
        assert!(registry.get("aws").is_ok());
        assert!(registry.get("github").is_ok());
    }

    #[test]
    fn registry_rejects_unknown_tag() {
        let registry = ProviderRegistry::with_defaults();
        assert!(matches!(registry.get("no-such-provider"), Err(SecretKeeperError::UnknownProvider(_))));
    }

    #[tokio::test]
    async fn custom_provider_rotates_via_shell() {
        let provider = CustomProvider;
        let config = custom_config("echo new-value-123", None);
        let new_value = provider.rotate(&config, "old-value").await.unwrap();
        assert_eq!(new_value, "new-value-123");
    }

    #[tokio::test]
    async fn custom_provider_sees_current_value_in_env() {
        let provider = CustomProvider;
        let config = custom_config("echo \"was:$CURRENT_SECRET_VALUE\"", None);
        let new_value = provider.rotate(&config, "old-value").await.unwrap();
        assert_eq!(new_value, "was:old-value");
    }

    #[tokio::test]
    async fn custom_provider_aborts_on_empty_output() {
        let provider = CustomProvider;
        let config = custom_config("true", None);
        let result = provider.rotate(&config, "old-value").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn custom_provider_honors_validate_command_rejection() {
        let provider = CustomProvider;
        let config = custom_config("echo new-value", Some("false"));
        let result = provider.rotate(&config, "old-value").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn custom_provider_test_rotate_sets_dry_run() {
        let provider = CustomProvider;
        let config = custom_config("test \"$DRY_RUN\" = \"1\"", None);
        assert!(provider.test_rotate(&config, "old-value").await.unwrap());
    }

    #[test]
    fn custom_provider_validate_config_requires_rotate_command() {
        let provider = CustomProvider;
        let valid = custom_config("echo x", None);
        assert!(provider.validate_config(&valid));

        let blank = custom_config("", None);
        assert!(!provider.validate_config(&blank));
    }
}
