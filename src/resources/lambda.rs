use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::{json, Map, Value};

use crate::asset::AssetSpec;
use crate::error::SynthError;
use crate::names::logical_id;
use crate::resources::iam::{service_role, BASIC_EXECUTION_POLICY_ARN, LAMBDA_SERVICE_PRINCIPAL};
use crate::stack::Stack;
use crate::template::{get_att, get_ref, ParameterDef, ResourceDef};

/// Execution runtime identifier, spelled the way the provisioning service
/// expects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Runtime(&'static str);

impl Runtime {
    pub const NODEJS_10_X: Runtime = Runtime("nodejs10.x");
    pub const NODEJS_18_X: Runtime = Runtime("nodejs18.x");
    pub const PROVIDED_AL2: Runtime = Runtime("provided.al2");

    pub fn identifier(self) -> &'static str {
        self.0
    }
}

/// Function code zipped from a local directory. The directory's layout and
/// entry point belong to the surrounding repository, not to this descriptor;
/// it is only read once synthesis stages assets.
#[derive(Debug, Clone)]
pub struct AssetCode {
    pub path: PathBuf,
}

impl AssetCode {
    pub fn dir(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[derive(Debug, Clone)]
pub struct FunctionProps {
    pub code: AssetCode,
    pub handler: String,
    pub runtime: Runtime,
    /// Physical function name. Leave unset for a generated one.
    /// Max 64 characters.
    pub function_name: Option<String>,
    pub environment: BTreeMap<String, Value>,
    /// Memory in MB. Valid values: 128 - 10240.
    pub memory_size: u64,
    /// Timeout in seconds. Valid values: 1 - 900.
    pub timeout: u32,
}

impl FunctionProps {
    pub fn new(code: AssetCode, handler: &str, runtime: Runtime) -> Self {
        Self {
            code,
            handler: handler.to_string(),
            runtime,
            function_name: None,
            environment: BTreeMap::new(),
            memory_size: 128,
            timeout: 30,
        }
    }
}

/// A function packaged from a local source directory, with its implicit
/// execution role and the template parameters carrying its staged code
/// location.
#[derive(Debug, Clone)]
pub struct Function {
    logical_id: String,
    role_logical_id: String,
}

impl Function {
    pub fn new(stack: &mut Stack, id: &str, props: FunctionProps) -> Result<Self, SynthError> {
        let logical = logical_id("Lambda", id);
        if props.memory_size < 128 || props.memory_size > 10240 {
            return Err(SynthError::InvalidProperty {
                resource: logical,
                field: "memory_size",
                reason: format!("{} is not between 128 and 10240", props.memory_size),
            });
        }
        if props.timeout < 1 || props.timeout > 900 {
            return Err(SynthError::InvalidProperty {
                resource: logical,
                field: "timeout",
                reason: format!("{} is not between 1 and 900", props.timeout),
            });
        }
        if let Some(name) = &props.function_name {
            if name.is_empty() || name.len() > 64 {
                return Err(SynthError::InvalidProperty {
                    resource: logical,
                    field: "function_name",
                    reason: "must be 1-64 characters".to_string(),
                });
            }
        }

        let role_logical = format!("Role{logical}");
        stack.add_resource(
            &role_logical,
            service_role(LAMBDA_SERVICE_PRINCIPAL, &[BASIC_EXECUTION_POLICY_ARN]),
        )?;

        let bucket_parameter = format!("ArtifactBucket{logical}");
        let key_parameter = format!("ArtifactKey{logical}");
        stack.add_parameter(
            &bucket_parameter,
            ParameterDef::string("Bucket holding the packaged function source"),
        )?;
        stack.add_parameter(
            &key_parameter,
            ParameterDef::string("Object key of the packaged function source"),
        )?;

        let mut properties = Map::new();
        if let Some(name) = &props.function_name {
            properties.insert("FunctionName".to_string(), json!(name));
        }
        properties.insert("Handler".to_string(), json!(props.handler));
        properties.insert("Runtime".to_string(), json!(props.runtime.identifier()));
        properties.insert(
            "Code".to_string(),
            json!({
                "S3Bucket": get_ref(&bucket_parameter),
                "S3Key": get_ref(&key_parameter),
            }),
        );
        properties.insert("MemorySize".to_string(), json!(props.memory_size));
        properties.insert("Timeout".to_string(), json!(props.timeout));
        properties.insert("Role".to_string(), get_att(&role_logical, "Arn"));
        if !props.environment.is_empty() {
            properties.insert(
                "Environment".to_string(),
                json!({ "Variables": props.environment }),
            );
        }
        stack.add_resource(
            &logical,
            ResourceDef::new("AWS::Lambda::Function", Value::Object(properties)),
        )?;

        let stem = props
            .function_name
            .clone()
            .unwrap_or_else(|| id.to_string());
        stack.register_asset(AssetSpec {
            name: stem,
            source_dir: props.code.path,
            bucket_parameter,
            key_parameter,
        });

        Ok(Self {
            logical_id: logical,
            role_logical_id: role_logical,
        })
    }

    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    pub fn role_logical_id(&self) -> &str {
        &self.role_logical_id
    }

    pub fn function_arn(&self) -> Value {
        get_att(&self.logical_id, "Arn")
    }
}
