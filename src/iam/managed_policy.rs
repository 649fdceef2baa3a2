use crate::stack::Stack;
use crate::template::Value;

/// Reference to a managed policy that lives outside the stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagedPolicy {
  /// AWS managed policy, by name (e.g. `AdministratorAccess`)
  AwsManaged(String),
  /// Any managed policy, by full ARN
  Arn(String),
}

impl ManagedPolicy {
  pub fn from_aws_managed_policy_name(name: impl Into<String>) -> Self {
    ManagedPolicy::AwsManaged(name.into())
  }

  pub fn from_managed_policy_arn(arn: impl Into<String>) -> Self {
    ManagedPolicy::Arn(arn.into())
  }

  /// Partition-qualified ARN of the policy
  pub fn arn(&self, stack: &Stack) -> Value {
    match self {
      ManagedPolicy::AwsManaged(name) => Value::join(vec![
        "arn:".into(),
        stack.partition_value(),
        ":iam::aws:policy/".into(),
        name.as_str().into(),
      ]),
      ManagedPolicy::Arn(arn) => Value::literal(arn.as_str()),
    }
  }
}
