use log::debug;
use serde::Serialize;

use crate::stack::{Resource, Stack, StackError};
use crate::template::Value;

/// Host of GitHub's OIDC token issuer
pub const ISSUER: &str = "token.actions.githubusercontent.com";
/// Audience GitHub puts in tokens requested for AWS
pub const AUDIENCE: &str = "sts.amazonaws.com";
/// SHA-1 thumbprint of the issuer's certificate chain
pub const THUMBPRINT: &str = "6938fd4d98bab03faadb97b34396831e3780aea1";

pub const RESOURCE_TYPE: &str = "AWS::IAM::OIDCProvider";

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct OidcProviderProperties {
  url: String,
  client_id_list: Vec<&'static str>,
  thumbprint_list: Vec<&'static str>,
}

/// The GitHub Actions OIDC identity provider of an account.
///
/// Either declared in the stack, or referenced when the account already has
/// one (there can only be one provider per issuer and account).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubActionsIdentityProvider {
  arn: Value,
  logical_id: Option<String>,
}

impl GithubActionsIdentityProvider {
  /// Declare a new provider resource in `stack`
  pub fn new(stack: &mut Stack, id: &str) -> Result<Self, StackError> {
    Stack::check_construct_id(id)?;
    let logical_id = stack.allocate_logical_id(&format!("{}/Resource", id))?;
    let properties = OidcProviderProperties {
      url: Self::issuer_url(),
      client_id_list: vec![AUDIENCE],
      thumbprint_list: vec![THUMBPRINT],
    };
    stack.add_resource(&logical_id, Resource::new(RESOURCE_TYPE, &properties)?);

    Ok(Self {
      arn: Value::reference(logical_id.as_str()),
      logical_id: Some(logical_id),
    })
  }

  /// Reference the provider already present in the stack's account.
  ///
  /// Nothing is checked; if the account has no such provider the role will
  /// fail to deploy.
  pub fn from_account(stack: &Stack) -> Self {
    let arn = Value::join(vec![
      "arn:".into(),
      stack.partition().unwrap_or("aws").into(),
      ":iam::".into(),
      stack.account_value(),
      ":oidc-provider/".into(),
      ISSUER.into(),
    ]);
    debug!("Referencing existing OIDC provider in stack {}", stack.name());

    Self { arn, logical_id: None }
  }

  pub fn issuer_url() -> String {
    format!("https://{}", ISSUER)
  }

  /// ARN used as the federated principal of trust policies
  pub fn open_id_connect_provider_arn(&self) -> &Value {
    &self.arn
  }

  /// Logical id of the provider resource, `None` when referenced
  pub fn logical_id(&self) -> Option<&str> {
    self.logical_id.as_deref()
  }
}
