//! The resource-graph containers: a [`Stack`] collects declarations, an
//! [`App`] serializes them into deployment artifacts.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::asset::{stage_asset, AssetManifestEntry, AssetSpec};
use crate::error::SynthError;
use crate::names::{validate_logical_id, validate_stack_name};
use crate::template::{OutputDef, ParameterDef, ResourceDef, Template};

/// Optional stack-level properties.
#[derive(Debug, Clone, Default)]
pub struct StackProps {
    pub description: Option<String>,
}

/// A named, deployable collection of resource declarations. Constructs
/// insert finished declarations here and hand back logical-identity tokens;
/// nothing touches the provider until the graph is serialized.
#[derive(Debug)]
pub struct Stack {
    name: String,
    description: Option<String>,
    resources: BTreeMap<String, ResourceDef>,
    parameters: BTreeMap<String, ParameterDef>,
    outputs: BTreeMap<String, OutputDef>,
    assets: Vec<AssetSpec>,
}

impl Stack {
    pub fn new(name: &str, props: StackProps) -> Result<Self, SynthError> {
        validate_stack_name(name)?;
        Ok(Self {
            name: name.to_string(),
            description: props.description,
            resources: Default::default(),
            parameters: Default::default(),
            outputs: Default::default(),
            assets: Default::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_resource(&mut self, logical_id: &str, resource: ResourceDef) -> Result<(), SynthError> {
        validate_logical_id(logical_id)?;
        if self.resources.contains_key(logical_id) {
            return Err(SynthError::DuplicateLogicalId(logical_id.to_string()));
        }
        self.resources.insert(logical_id.to_string(), resource);
        Ok(())
    }

    pub fn add_parameter(&mut self, name: &str, parameter: ParameterDef) -> Result<(), SynthError> {
        validate_logical_id(name)?;
        if self.parameters.contains_key(name) {
            return Err(SynthError::DuplicateLogicalId(name.to_string()));
        }
        self.parameters.insert(name.to_string(), parameter);
        Ok(())
    }

    pub fn add_output(&mut self, name: &str, output: OutputDef) -> Result<(), SynthError> {
        validate_logical_id(name)?;
        if self.outputs.contains_key(name) {
            return Err(SynthError::DuplicateLogicalId(name.to_string()));
        }
        self.outputs.insert(name.to_string(), output);
        Ok(())
    }

    pub fn resource(&self, logical_id: &str) -> Option<&ResourceDef> {
        self.resources.get(logical_id)
    }

    pub(crate) fn resource_mut(&mut self, logical_id: &str) -> Option<&mut ResourceDef> {
        self.resources.get_mut(logical_id)
    }

    /// Declarations in deterministic (sorted) order.
    pub fn resources(&self) -> &BTreeMap<String, ResourceDef> {
        &self.resources
    }

    pub(crate) fn register_asset(&mut self, spec: AssetSpec) {
        self.assets.push(spec);
    }

    pub fn assets(&self) -> &[AssetSpec] {
        &self.assets
    }

    /// Assemble the template value. Pure: no filesystem, no network, and
    /// deterministic for identically assembled stacks.
    pub fn synth(&self) -> Template {
        Template {
            description: self.description.clone(),
            parameters: self.parameters.clone(),
            resources: self.resources.clone(),
            outputs: self.outputs.clone(),
            ..Template::default()
        }
    }
}

/// Artifacts written for one stack by [`App::synth`].
#[derive(Debug)]
pub struct StackArtifacts {
    pub stack_name: String,
    pub template: Template,
    pub template_path: PathBuf,
    pub assets_path: PathBuf,
    pub assets: Vec<AssetManifestEntry>,
}

/// Top-level handle owning the stacks of one deployment.
#[derive(Debug, Default)]
pub struct App {
    stacks: Vec<Stack>,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stack(&mut self, stack: Stack) -> Result<(), SynthError> {
        if self.stacks.iter().any(|s| s.name() == stack.name()) {
            return Err(SynthError::DuplicateStackName(stack.name().to_string()));
        }
        self.stacks.push(stack);
        Ok(())
    }

    pub fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    /// Serialize every stack into `out_dir`: a pretty-printed template (kept
    /// readable for anyone inspecting the stack in the provider console), the
    /// staged asset archives, and the asset manifest the deploy step reads.
    pub fn synth(&self, out_dir: &Path) -> Result<Vec<StackArtifacts>, SynthError> {
        fs::create_dir_all(out_dir).map_err(|source| SynthError::Io {
            path: out_dir.to_path_buf(),
            source,
        })?;
        let mut all = Vec::with_capacity(self.stacks.len());
        for stack in &self.stacks {
            let template = stack.synth();
            let body = serde_json::to_string_pretty(&template).map_err(|e| SynthError::Serialize {
                stack: stack.name().to_string(),
                reason: e.to_string(),
            })?;
            let template_path = out_dir.join(format!("{}.template.json", stack.name()));
            fs::write(&template_path, body).map_err(|source| SynthError::Io {
                path: template_path.clone(),
                source,
            })?;

            let mut assets = Vec::with_capacity(stack.assets().len());
            for spec in stack.assets() {
                assets.push(stage_asset(spec, out_dir)?);
            }
            let manifest = serde_json::to_string_pretty(&assets).map_err(|e| SynthError::Serialize {
                stack: stack.name().to_string(),
                reason: e.to_string(),
            })?;
            let assets_path = out_dir.join(format!("{}.assets.json", stack.name()));
            fs::write(&assets_path, manifest).map_err(|source| SynthError::Io {
                path: assets_path.clone(),
                source,
            })?;

            all.push(StackArtifacts {
                stack_name: stack.name().to_string(),
                template,
                template_path,
                assets_path,
                assets,
            });
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn duplicate_logical_ids_are_rejected() {
        let mut stack = Stack::new("items-api", StackProps::default()).unwrap();
        stack
            .add_resource("TableItems", ResourceDef::new("AWS::DynamoDB::Table", json!({})))
            .unwrap();
        let again = stack.add_resource("TableItems", ResourceDef::new("AWS::DynamoDB::Table", json!({})));
        assert!(matches!(again, Err(SynthError::DuplicateLogicalId(id)) if id == "TableItems"));
    }

    #[test]
    fn synth_carries_every_declared_section() {
        let mut stack = Stack::new(
            "items-api",
            StackProps {
                description: Some("demo".to_string()),
            },
        )
        .unwrap();
        stack
            .add_resource("Thing", ResourceDef::new("AWS::SNS::Topic", json!({})))
            .unwrap();
        stack
            .add_parameter("ArtifactBucket", ParameterDef::string("bucket"))
            .unwrap();
        stack
            .add_output(
                "Endpoint",
                OutputDef {
                    description: "url".to_string(),
                    value: json!("https://example"),
                },
            )
            .unwrap();

        let template = stack.synth();
        assert_eq!(template.description.as_deref(), Some("demo"));
        assert!(template.resources.contains_key("Thing"));
        assert!(template.parameters.contains_key("ArtifactBucket"));
        assert!(template.outputs.contains_key("Endpoint"));
    }

    #[test]
    fn duplicate_stack_names_are_rejected() {
        let mut app = App::new();
        app.add_stack(Stack::new("items-api", StackProps::default()).unwrap())
            .unwrap();
        let again = app.add_stack(Stack::new("items-api", StackProps::default()).unwrap());
        assert!(matches!(again, Err(SynthError::DuplicateStackName(_))));
    }
}
