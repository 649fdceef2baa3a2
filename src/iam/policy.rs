use schemars::JsonSchema;
use serde::{ser::SerializeMap, Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

use crate::template::Value;

pub const POLICY_VERSION: &str = "2012-10-17";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum Effect {
  Allow,
  Deny,
}

impl Default for Effect {
  fn default() -> Self {
    Effect::Allow
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
  /// Identity provider trusted through web identity federation
  Federated(Value),
}

impl Serialize for Principal {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(1))?;
    match self {
      Principal::Federated(v) => map.serialize_entry("Federated", v)?,
    }
    map.end()
  }
}

/// A single `Statement` entry of a policy document.
///
/// Renders in the compact form: one action or resource is a scalar, more than
/// one is a list, and empty parts are left out.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PolicyStatement {
  pub effect: Effect,
  pub sid: Option<String>,
  actions: Vec<String>,
  resources: Vec<Value>,
  principal: Option<Principal>,
  conditions: BTreeMap<String, BTreeMap<String, Value>>,
}

impl PolicyStatement {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_actions<I, S>(&mut self, actions: I) -> &mut Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.actions.extend(actions.into_iter().map(Into::into));
    self
  }

  pub fn add_resources<I, V>(&mut self, resources: I) -> &mut Self
  where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
  {
    self.resources.extend(resources.into_iter().map(Into::into));
    self
  }

  pub fn set_principal(&mut self, principal: Principal) -> &mut Self {
    self.principal = Some(principal);
    self
  }

  /// Add `key: value` under the condition operator `op` (`StringLike`, ...)
  pub fn add_condition(&mut self, op: &str, key: &str, value: impl Into<Value>) -> &mut Self {
    self
      .conditions
      .entry(op.to_string())
      .or_default()
      .insert(key.to_string(), value.into());
    self
  }

  pub fn actions(&self) -> &[String] {
    &self.actions
  }

  pub fn resources(&self) -> &[Value] {
    &self.resources
  }

  pub fn principal(&self) -> Option<&Principal> {
    self.principal.as_ref()
  }

  pub fn condition(&self, op: &str, key: &str) -> Option<&Value> {
    self.conditions.get(op).and_then(|c| c.get(key))
  }

  /// Problems that make this statement unusable in a policy attached to an
  /// identity (user, group or role). Empty when the statement is fine.
  pub fn validate_for_identity_policy(&self) -> Vec<String> {
    let mut errors = Vec::new();
    if self.actions.is_empty() {
      errors.push("A PolicyStatement must specify at least one 'action'.".to_string());
    }
    if self.principal.is_some() {
      errors.push("A PolicyStatement used in an identity-based policy cannot specify any IAM principals.".to_string());
    }
    if self.resources.is_empty() {
      errors.push("A PolicyStatement used in an identity-based policy must specify at least one resource.".to_string());
    }
    errors
  }
}

struct OneOrMany<'a, T>(&'a [T]);

impl<T: Serialize> Serialize for OneOrMany<'_, T> {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self.0 {
      [one] => one.serialize(serializer),
      many => many.serialize(serializer),
    }
  }
}

impl Serialize for PolicyStatement {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(None)?;
    if !self.actions.is_empty() {
      map.serialize_entry("Action", &OneOrMany(&self.actions))?;
    }
    if !self.conditions.is_empty() {
      map.serialize_entry("Condition", &self.conditions)?;
    }
    map.serialize_entry("Effect", &self.effect)?;
    if let Some(p) = &self.principal {
      map.serialize_entry("Principal", p)?;
    }
    if !self.resources.is_empty() {
      map.serialize_entry("Resource", &OneOrMany(&self.resources))?;
    }
    if let Some(sid) = &self.sid {
      map.serialize_entry("Sid", sid)?;
    }
    map.end()
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyDocument {
  #[serde(rename = "Statement")]
  statements: Vec<PolicyStatement>,
  #[serde(rename = "Version")]
  version: &'static str,
}

impl PolicyDocument {
  pub fn new() -> Self {
    Self {
      statements: Vec::new(),
      version: POLICY_VERSION,
    }
  }

  pub fn add_statement(&mut self, statement: PolicyStatement) {
    self.statements.push(statement);
  }

  pub fn statements(&self) -> &[PolicyStatement] {
    &self.statements
  }

  pub fn is_empty(&self) -> bool {
    self.statements.is_empty()
  }
}

impl Default for PolicyDocument {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn deny_statement_renders_compact() {
    let mut stmt = PolicyStatement::new();
    stmt.add_actions(["s3:PutObject"]);
    stmt.add_resources(["arn:aws:s3:::mybucket/*"]);
    stmt.effect = Effect::Deny;

    let mut doc = PolicyDocument::new();
    doc.add_statement(stmt);

    assert_eq!(
      serde_json::to_value(&doc).unwrap(),
      json!({
        "Statement": [{
          "Action": "s3:PutObject",
          "Effect": "Deny",
          "Resource": "arn:aws:s3:::mybucket/*",
        }],
        "Version": "2012-10-17",
      })
    );
  }

  #[test]
  fn multiple_actions_render_as_list() {
    let mut stmt = PolicyStatement::new();
    stmt.add_actions(["s3:GetObject", "s3:ListBucket"]).sid = Some("Read".to_string());

    assert_eq!(
      serde_json::to_value(&stmt).unwrap(),
      json!({
        "Action": ["s3:GetObject", "s3:ListBucket"],
        "Effect": "Allow",
        "Sid": "Read",
      })
    );
  }

  #[test]
  fn identity_policy_statements_need_actions_and_resources() {
    let mut stmt = PolicyStatement::new();
    assert_eq!(stmt.validate_for_identity_policy().len(), 2);

    stmt.add_actions(["s3:GetObject"]).add_resources(["arn:aws:s3:::mybucket/*"]);
    assert!(stmt.validate_for_identity_policy().is_empty());

    stmt.set_principal(Principal::Federated(Value::literal("x")));
    assert_eq!(
      stmt.validate_for_identity_policy(),
      vec!["A PolicyStatement used in an identity-based policy cannot specify any IAM principals.".to_string()]
    );
  }

  #[test]
  fn conditions_group_by_operator() {
    let mut stmt = PolicyStatement::new();
    stmt
      .add_condition("StringLike", "a:sub", "x*")
      .add_condition("StringEquals", "a:aud", "y")
      .set_principal(Principal::Federated(Value::literal("arn:idp")));

    assert_eq!(stmt.condition("StringLike", "a:sub"), Some(&Value::literal("x*")));
    assert_eq!(stmt.condition("StringLike", "a:aud"), None);
    assert_eq!(
      serde_json::to_value(&stmt).unwrap(),
      json!({
        "Condition": {
          "StringEquals": { "a:aud": "y" },
          "StringLike": { "a:sub": "x*" },
        },
        "Effect": "Allow",
        "Principal": { "Federated": "arn:idp" },
      })
    );
  }
}
