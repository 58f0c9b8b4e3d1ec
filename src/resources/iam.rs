use serde_json::{json, Value};

use crate::error::SynthError;
use crate::stack::Stack;
use crate::template::ResourceDef;

pub const LAMBDA_SERVICE_PRINCIPAL: &str = "lambda.amazonaws.com";
pub const BASIC_EXECUTION_POLICY_ARN: &str =
    "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

const POLICY_VERSION: &str = "2012-10-17";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Allow,
    Deny,
}

impl Effect {
    fn as_str(self) -> &'static str {
        match self {
            Effect::Allow => "Allow",
            Effect::Deny => "Deny",
        }
    }
}

/// One statement of an identity policy. Resources are template values so
/// they can point at other declarations by logical identity.
#[derive(Debug, Clone)]
pub struct PolicyStatement {
    pub effect: Effect,
    pub actions: Vec<String>,
    pub resources: Vec<Value>,
}

impl PolicyStatement {
    pub fn allow(actions: &[&str], resources: Vec<Value>) -> Self {
        Self {
            effect: Effect::Allow,
            actions: actions.iter().map(|a| a.to_string()).collect(),
            resources,
        }
    }

    fn to_value(&self) -> Value {
        json!({
            "Effect": self.effect.as_str(),
            "Action": self.actions,
            "Resource": self.resources,
        })
    }
}

pub fn policy_document(statements: &[PolicyStatement]) -> Value {
    json!({
        "Version": POLICY_VERSION,
        "Statement": statements.iter().map(PolicyStatement::to_value).collect::<Vec<_>>(),
    })
}

/// An execution role assumable by the given service, carrying managed
/// policies only. Inline policies are appended later through
/// [`attach_inline_policy`], once grants are known.
pub fn service_role(service_principal: &str, managed_policy_arns: &[&str]) -> ResourceDef {
    ResourceDef::new(
        "AWS::IAM::Role",
        json!({
            "AssumeRolePolicyDocument": {
                "Version": POLICY_VERSION,
                "Statement": [{
                    "Effect": "Allow",
                    "Principal": { "Service": service_principal },
                    "Action": ["sts:AssumeRole"],
                }],
            },
            "ManagedPolicyArns": managed_policy_arns,
        }),
    )
}

/// Append an inline policy to a role already declared in the stack.
pub fn attach_inline_policy(
    stack: &mut Stack,
    role_logical_id: &str,
    policy_name: &str,
    statements: &[PolicyStatement],
) -> Result<(), SynthError> {
    let document = policy_document(statements);
    let role = stack
        .resource_mut(role_logical_id)
        .filter(|r| r.ty == "AWS::IAM::Role")
        .ok_or_else(|| SynthError::UnknownRole(role_logical_id.to_string()))?;
    let properties = role
        .properties
        .as_object_mut()
        .ok_or_else(|| SynthError::UnknownRole(role_logical_id.to_string()))?;
    let policies = properties
        .entry("Policies")
        .or_insert_with(|| Value::Array(Vec::new()));
    match policies {
        Value::Array(list) => {
            list.push(json!({
                "PolicyName": policy_name,
                "PolicyDocument": document,
            }));
            Ok(())
        }
        _ => Err(SynthError::InvalidProperty {
            resource: role_logical_id.to_string(),
            field: "Policies",
            reason: "expected a list".to_string(),
        }),
    }
}
