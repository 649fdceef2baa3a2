//! YAML description of a stack of GitHub Actions roles.
//!
//! ```yaml
//! stack: ci-roles
//! provider:
//!   mode: create
//! roles:
//!   - id: DeployRole
//!     owner: octo-org
//!     repo: octo-repo
//!     filter: ref:refs/tags/v*
//!     maxSessionDurationSeconds: 7200
//!     managedPolicies: [ReadOnlyAccess]
//! ```

use log::info;
use schemars::{schema::RootSchema, JsonSchema};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};
use thiserror::Error;

use crate::iam::{Effect, ManagedPolicy, PolicyStatement};
use crate::provider::GithubActionsIdentityProvider;
use crate::role::{GithubActionsRole, GithubActionsRoleProps, RoleError};
use crate::stack::{Stack, StackError};

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("Failed to read {path}: {source}")]
  Io {
    path: String,
    source: std::io::Error,
  },
  #[error("Yaml decode error: {0}")]
  Yaml(#[from] serde_yaml::Error),
  #[error("Role {id}: {source}")]
  Role { id: String, source: RoleError },
  #[error(transparent)]
  Stack(#[from] StackError),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SynthConfig {
  /// Stack name
  pub stack: String,
  /// Pin the account id instead of resolving it at deploy time
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub account: Option<String>,
  /// Pin the partition instead of resolving it at deploy time
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub partition: Option<String>,
  #[serde(default)]
  pub provider: ProviderConfig,
  #[serde(default)]
  pub roles: Vec<RoleConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ProviderConfig {
  /// Declare the identity provider in this stack
  Create {
    #[serde(default = "default_provider_id")]
    id: String,
  },
  /// Use the identity provider that already exists in the account
  Reference,
}

impl Default for ProviderConfig {
  fn default() -> Self {
    ProviderConfig::Reference
  }
}

fn default_provider_id() -> String {
  "GithubProvider".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RoleConfig {
  /// Construct id, also the base of the logical id
  pub id: String,
  pub owner: String,
  pub repo: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub filter: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub role_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_session_duration_seconds: Option<u64>,
  /// AWS managed policy names, or full policy ARNs
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub managed_policies: Vec<String>,
  /// Statements for the role's inline policy
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub statements: Vec<StatementConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StatementConfig {
  #[serde(default)]
  pub effect: Effect,
  pub actions: Vec<String>,
  #[serde(default)]
  pub resources: Vec<String>,
}

impl StatementConfig {
  fn to_statement(&self) -> PolicyStatement {
    let mut stmt = PolicyStatement::new();
    stmt.effect = self.effect;
    stmt.add_actions(self.actions.iter().cloned());
    stmt.add_resources(self.resources.iter().cloned());
    stmt
  }
}

fn managed_policy(name_or_arn: &str) -> ManagedPolicy {
  if name_or_arn.starts_with("arn:") {
    ManagedPolicy::from_managed_policy_arn(name_or_arn)
  } else {
    ManagedPolicy::from_aws_managed_policy_name(name_or_arn)
  }
}

impl SynthConfig {
  pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
    Ok(serde_yaml::from_str(s)?)
  }

  pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.display().to_string(),
      source,
    })?;
    Self::from_yaml_str(&content)
  }

  /// Build the stack. Validation diagnostics end up on the stack, not here.
  pub fn build(&self) -> Result<Stack, ConfigError> {
    let mut stack = Stack::new(self.stack.as_str());
    if let Some(account) = &self.account {
      stack = stack.with_account(account.as_str());
    }
    if let Some(partition) = &self.partition {
      stack = stack.with_partition(partition.as_str());
    }

    let provider = match &self.provider {
      ProviderConfig::Create { id } => GithubActionsIdentityProvider::new(&mut stack, id)?,
      ProviderConfig::Reference => GithubActionsIdentityProvider::from_account(&stack),
    };

    for rc in &self.roles {
      let props = GithubActionsRoleProps {
        filter: rc.filter.clone(),
        role_name: rc.role_name.clone(),
        description: rc.description.clone(),
        max_session_duration: rc.max_session_duration_seconds.map(Duration::from_secs),
        managed_policies: rc.managed_policies.iter().map(|p| managed_policy(p)).collect(),
        ..GithubActionsRoleProps::new(provider.clone(), rc.owner.as_str(), rc.repo.as_str())
      };
      let mut role = GithubActionsRole::new(&mut stack, &rc.id, props).map_err(|source| ConfigError::Role {
        id: rc.id.clone(),
        source,
      })?;
      for sc in &rc.statements {
        role.add_to_policy(&mut stack, sc.to_statement())?;
      }

      stack.add_output(
        &format!("{}Arn", rc.id.replace(|c: char| !c.is_ascii_alphanumeric(), "")),
        role.role_arn(),
        Some(format!("Role assumable from {}", role.subject())),
      )?;
      info!("Role {} for {}", rc.id, role.subject());
    }

    Ok(stack)
  }
}

/// JSON schema of the config file
pub fn schema() -> RootSchema {
  schemars::schema_for!(SynthConfig)
}
