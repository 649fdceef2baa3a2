use log::debug;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::iam::{ManagedPolicy, PolicyDocument, PolicyStatement, Principal};
use crate::provider::{GithubActionsIdentityProvider, AUDIENCE, ISSUER};
use crate::stack::{Resource, Stack, StackError};
use crate::template::Value;
use crate::validation::{validate_owner, validate_repo};

pub const ROLE_RESOURCE_TYPE: &str = "AWS::IAM::Role";
pub const POLICY_RESOURCE_TYPE: &str = "AWS::IAM::Policy";

pub const MIN_SESSION_DURATION: Duration = Duration::from_secs(60 * 60);
pub const MAX_SESSION_DURATION: Duration = Duration::from_secs(12 * 60 * 60);

/// Ref filter matching every branch, tag and environment
pub const DEFAULT_FILTER: &str = "*";

#[derive(Debug, Error)]
pub enum RoleError {
  #[error("maxSessionDuration must be a whole number of seconds between 1 and 12 hours, got {0:?}")]
  MaxSessionDuration(Duration),
  #[error(transparent)]
  Stack(#[from] StackError),
}

/// Construction parameters of a [`GithubActionsRole`]
#[derive(Debug, Clone)]
pub struct GithubActionsRoleProps {
  pub provider: GithubActionsIdentityProvider,
  /// User or organization owning the repository
  pub owner: String,
  pub repo: String,
  /// Subject filter after `repo:owner/repo:`, e.g. `ref:refs/tags/v*`.
  /// Defaults to `*`.
  pub filter: Option<String>,
  pub role_name: Option<String>,
  pub description: Option<String>,
  pub max_session_duration: Option<Duration>,
  pub managed_policies: Vec<ManagedPolicy>,
}

impl GithubActionsRoleProps {
  pub fn new(provider: GithubActionsIdentityProvider, owner: impl Into<String>, repo: impl Into<String>) -> Self {
    Self {
      provider,
      owner: owner.into(),
      repo: repo.into(),
      filter: None,
      role_name: None,
      description: None,
      max_session_duration: None,
      managed_policies: Vec::new(),
    }
  }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct RoleProperties<'a> {
  assume_role_policy_document: &'a PolicyDocument,
  #[serde(skip_serializing_if = "Option::is_none")]
  role_name: Option<&'a str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  description: Option<&'a str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_session_duration: Option<u64>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  managed_policy_arns: Vec<Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PolicyProperties<'a> {
  policy_document: &'a PolicyDocument,
  policy_name: &'a str,
  roles: Vec<Value>,
}

#[derive(Debug, Clone)]
struct DefaultPolicy {
  logical_id: String,
  document: PolicyDocument,
}

/// Role assumable by GitHub Actions workflows of a single repository.
///
/// Invalid owner or repo names don't fail construction: they are recorded as
/// errors on the stack, which then refuses to synthesize.
#[derive(Debug, Clone)]
pub struct GithubActionsRole {
  path: String,
  logical_id: String,
  subject: String,
  trust_policy: PolicyDocument,
  default_policy: Option<DefaultPolicy>,
}

impl GithubActionsRole {
  pub fn new(stack: &mut Stack, id: &str, props: GithubActionsRoleProps) -> Result<Self, RoleError> {
    Stack::check_construct_id(id)?;
    let max_session_duration = props
      .max_session_duration
      .map(session_duration_seconds)
      .transpose()?;

    let subject = Self::format_subject(&props.owner, &props.repo, props.filter.as_deref());

    let mut trust = PolicyStatement::new();
    trust
      .add_actions(["sts:AssumeRoleWithWebIdentity"])
      .set_principal(Principal::Federated(props.provider.open_id_connect_provider_arn().clone()))
      .add_condition("StringLike", &format!("{}:sub", ISSUER), subject.as_str())
      .add_condition("StringEquals", &format!("{}:aud", ISSUER), AUDIENCE);
    let mut trust_policy = PolicyDocument::new();
    trust_policy.add_statement(trust);

    let logical_id = stack.allocate_logical_id(&format!("{}/Resource", id))?;
    let properties = RoleProperties {
      assume_role_policy_document: &trust_policy,
      role_name: props.role_name.as_deref(),
      description: props.description.as_deref(),
      max_session_duration,
      managed_policy_arns: props.managed_policies.iter().map(|p| p.arn(stack)).collect(),
    };
    stack.add_resource(&logical_id, Resource::new(ROLE_RESOURCE_TYPE, &properties)?);
    debug!("Role {} trusts subject {}", logical_id, subject);

    for result in [validate_owner(&props.owner), validate_repo(&props.repo)] {
      if let Err(e) = result {
        stack.add_error(id, e.to_string());
      }
    }

    Ok(Self {
      path: id.to_string(),
      logical_id,
      subject,
      trust_policy,
      default_policy: None,
    })
  }

  /// `repo:{owner}/{repo}:{filter}`
  pub fn format_subject(owner: &str, repo: &str, filter: Option<&str>) -> String {
    format!("repo:{}/{}:{}", owner, repo, filter.unwrap_or(DEFAULT_FILTER))
  }

  /// Append a statement to the role's inline policy.
  ///
  /// The first call adds an `AWS::IAM::Policy` attached to the role; later
  /// calls extend its document. Statements without actions or resources, or
  /// with a principal, are rejected and leave the policy untouched.
  pub fn add_to_policy(&mut self, stack: &mut Stack, statement: PolicyStatement) -> Result<(), StackError> {
    let errors = statement.validate_for_identity_policy();
    if !errors.is_empty() {
      return Err(StackError::InvalidStatement(errors));
    }

    let mut policy = match self.default_policy.take() {
      Some(p) => p,
      None => DefaultPolicy {
        logical_id: stack.allocate_logical_id(&format!("{}/DefaultPolicy/Resource", self.path))?,
        document: PolicyDocument::new(),
      },
    };
    policy.document.add_statement(statement);

    let resource = Resource::new(
      POLICY_RESOURCE_TYPE,
      &PolicyProperties {
        policy_document: &policy.document,
        policy_name: &policy.logical_id,
        roles: vec![Value::reference(self.logical_id.as_str())],
      },
    );
    let logical_id = policy.logical_id.clone();
    self.default_policy = Some(policy);
    stack.add_resource(&logical_id, resource?);

    Ok(())
  }

  pub fn logical_id(&self) -> &str {
    &self.logical_id
  }

  /// Subject pattern the trust policy matches tokens against
  pub fn subject(&self) -> &str {
    &self.subject
  }

  pub fn trust_policy(&self) -> &PolicyDocument {
    &self.trust_policy
  }

  /// Logical id of the inline policy, once a statement was added
  pub fn policy_logical_id(&self) -> Option<&str> {
    self.default_policy.as_ref().map(|p| p.logical_id.as_str())
  }

  pub fn role_arn(&self) -> Value {
    Value::get_att(self.logical_id.as_str(), "Arn")
  }
}

fn session_duration_seconds(d: Duration) -> Result<u64, RoleError> {
  if d < MIN_SESSION_DURATION || d > MAX_SESSION_DURATION || d.subsec_nanos() != 0 {
    return Err(RoleError::MaxSessionDuration(d));
  }
  Ok(d.as_secs())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn props(stack: &Stack) -> GithubActionsRoleProps {
    GithubActionsRoleProps::new(GithubActionsIdentityProvider::from_account(stack), "octo-org", "octo-repo")
  }

  #[test]
  fn subject_defaults_to_any_ref() {
    assert_eq!(GithubActionsRole::format_subject("o", "r", None), "repo:o/r:*");
    assert_eq!(
      GithubActionsRole::format_subject("o", "r", Some("environment:prod")),
      "repo:o/r:environment:prod"
    );
  }

  #[test]
  fn session_duration_bounds() {
    assert_eq!(session_duration_seconds(MIN_SESSION_DURATION).unwrap(), 3600);
    assert_eq!(session_duration_seconds(MAX_SESSION_DURATION).unwrap(), 43200);
    for d in [
      Duration::from_secs(3599),
      Duration::from_secs(43201),
      Duration::from_millis(3_600_500),
    ] {
      assert!(matches!(session_duration_seconds(d), Err(RoleError::MaxSessionDuration(_))));
    }
  }

  #[test]
  fn session_duration_out_of_range_is_rejected() {
    let mut stack = Stack::new("s");
    let mut p = props(&stack);
    p.max_session_duration = Some(Duration::from_secs(13 * 3600));
    assert!(matches!(
      GithubActionsRole::new(&mut stack, "Role", p),
      Err(RoleError::MaxSessionDuration(_))
    ));
  }

  #[test]
  fn statements_accumulate_in_one_policy() {
    let mut stack = Stack::new("s");
    let p = props(&stack);
    let mut role = GithubActionsRole::new(&mut stack, "Role", p).unwrap();
    assert_eq!(role.policy_logical_id(), None);

    let mut a = PolicyStatement::new();
    a.add_actions(["s3:GetObject"]).add_resources(["arn:aws:s3:::mybucket/*"]);
    let mut b = PolicyStatement::new();
    b.add_actions(["s3:PutObject"]).add_resources(["arn:aws:s3:::mybucket/*"]);
    role.add_to_policy(&mut stack, a).unwrap();
    role.add_to_policy(&mut stack, b).unwrap();

    let policies: Vec<_> = stack.resources_of_type(POLICY_RESOURCE_TYPE).collect();
    assert_eq!(policies.len(), 1);
    let (id, policy) = policies[0];
    assert_eq!(Some(id), role.policy_logical_id());
    assert_eq!(policy.properties["PolicyDocument"]["Statement"].as_array().unwrap().len(), 2);
  }

  #[test]
  fn policy_rejects_statements_unfit_for_identity_policies() {
    let mut stack = Stack::new("s");
    let p = props(&stack);
    let mut role = GithubActionsRole::new(&mut stack, "Role", p).unwrap();

    assert!(matches!(
      role.add_to_policy(&mut stack, PolicyStatement::new()),
      Err(StackError::InvalidStatement(errors)) if errors.len() == 2
    ));

    let mut with_principal = PolicyStatement::new();
    with_principal
      .add_actions(["s3:GetObject"])
      .add_resources(["arn:aws:s3:::mybucket/*"])
      .set_principal(Principal::Federated(Value::literal("x")));
    assert!(matches!(
      role.add_to_policy(&mut stack, with_principal),
      Err(StackError::InvalidStatement(errors)) if errors.len() == 1
    ));

    assert_eq!(role.policy_logical_id(), None);
    assert_eq!(stack.resources_of_type(POLICY_RESOURCE_TYPE).count(), 0);
  }

  #[test]
  fn failed_construction_leaves_no_diagnostics() {
    let mut stack = Stack::new("s");
    let mut p = GithubActionsRoleProps::new(GithubActionsIdentityProvider::from_account(&stack), "-bad", "r");
    p.max_session_duration = Some(Duration::from_secs(10));
    assert!(GithubActionsRole::new(&mut stack, "Role", p.clone()).is_err());
    assert!(stack.metadata_entries().is_empty());
    assert_eq!(stack.resources_of_type(ROLE_RESOURCE_TYPE).count(), 0);

    p.max_session_duration = None;
    GithubActionsRole::new(&mut stack, "Other", p.clone()).unwrap();
    assert_eq!(stack.metadata_entries().len(), 1);
    assert!(GithubActionsRole::new(&mut stack, "Other", p).is_err());
    assert_eq!(stack.metadata_entries().len(), 1);
  }

  #[test]
  fn ids_with_separator_are_rejected() {
    let mut stack = Stack::new("s");
    let p = props(&stack);
    let mut role = GithubActionsRole::new(&mut stack, "A", p.clone()).unwrap();
    assert!(matches!(
      GithubActionsRole::new(&mut stack, "A/DefaultPolicy", p),
      Err(RoleError::Stack(StackError::InvalidId(id))) if id == "A/DefaultPolicy"
    ));

    let mut stmt = PolicyStatement::new();
    stmt.add_actions(["s3:GetObject"]).add_resources(["*"]);
    role.add_to_policy(&mut stack, stmt).unwrap();
    assert!(role.policy_logical_id().unwrap().starts_with("ADefaultPolicy"));
  }

  #[test]
  fn duplicate_role_id_fails() {
    let mut stack = Stack::new("s");
    let p = props(&stack);
    GithubActionsRole::new(&mut stack, "Role", p.clone()).unwrap();
    assert!(matches!(
      GithubActionsRole::new(&mut stack, "Role", p),
      Err(RoleError::Stack(StackError::DuplicateId(_)))
    ));
  }
}
