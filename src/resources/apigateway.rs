//! The HTTP API: a tree of addressable path nodes, methods with their
//! backend integrations, and the deployment/stage pair that makes the
//! methods reachable.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use crate::error::SynthError;
use crate::names::logical_id;
use crate::resources::lambda::Function;
use crate::stack::Stack;
use crate::template::{
    fn_join, get_att, get_ref, OutputDef, ResourceDef, PSEUDO_ACCOUNT_ID, PSEUDO_REGION,
};

const METHOD_TYPE: &str = "AWS::ApiGateway::Method";

#[derive(Debug, Clone, Default)]
pub struct RestApiProps {
    /// Display name of the API. Defaults to the construct identifier.
    pub rest_api_name: Option<String>,
}

/// A REST API fronting the stack's functions.
#[derive(Debug, Clone)]
pub struct RestApi {
    logical_id: String,
}

impl RestApi {
    pub fn new(stack: &mut Stack, id: &str, props: RestApiProps) -> Result<Self, SynthError> {
        let logical = logical_id("RestApi", id);
        let name = props.rest_api_name.unwrap_or_else(|| id.to_string());
        stack.add_resource(
            &logical,
            ResourceDef::new("AWS::ApiGateway::RestApi", json!({ "Name": name })),
        )?;
        Ok(Self { logical_id: logical })
    }

    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// The root path node ("/") of this API.
    pub fn root(&self) -> ApiResource {
        ApiResource {
            api_logical_id: self.logical_id.clone(),
            logical_id: None,
            path: "/".to_string(),
        }
    }

    /// Declare the deployment and stage covering every method attached so
    /// far, plus an output with the stage's invoke URL. The deployment
    /// depends on the methods so none is published before it exists.
    pub fn add_deployment(&self, stack: &mut Stack, stage_name: &str) -> Result<(), SynthError> {
        let api_ref = get_ref(&self.logical_id);
        let method_ids: Vec<String> = stack
            .resources()
            .iter()
            .filter(|(_, r)| r.ty == METHOD_TYPE && r.properties.get("RestApiId") == Some(&api_ref))
            .map(|(id, _)| id.clone())
            .collect();

        let deployment_logical = format!("Deployment{}", self.logical_id);
        let mut deployment =
            ResourceDef::new("AWS::ApiGateway::Deployment", json!({ "RestApiId": api_ref }));
        deployment.depends_on = method_ids;
        stack.add_resource(&deployment_logical, deployment)?;

        let stage_logical = format!("Stage{}{}", self.logical_id, logical_id("", stage_name));
        stack.add_resource(
            &stage_logical,
            ResourceDef::new(
                "AWS::ApiGateway::Stage",
                json!({
                    "RestApiId": get_ref(&self.logical_id),
                    "DeploymentId": get_ref(&deployment_logical),
                    "StageName": stage_name,
                }),
            ),
        )?;

        stack.add_output(
            &format!("{}Endpoint", self.logical_id),
            OutputDef {
                description: "Invoke URL of the deployed API".to_string(),
                value: fn_join(
                    "",
                    vec![
                        json!("https://"),
                        get_ref(&self.logical_id),
                        json!(".execute-api."),
                        get_ref(PSEUDO_REGION),
                        json!(".amazonaws.com/"),
                        json!(stage_name),
                        json!("/"),
                    ],
                ),
            },
        )
    }
}

/// An addressable node of the API's path tree.
#[derive(Debug, Clone)]
pub struct ApiResource {
    api_logical_id: String,
    /// `None` for the root node, which is addressed through the API itself.
    logical_id: Option<String>,
    path: String,
}

impl ApiResource {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Token resolving to this node's gateway resource id.
    pub fn resource_id(&self) -> Value {
        match &self.logical_id {
            Some(id) => get_ref(id),
            None => get_att(&self.api_logical_id, "RootResourceId"),
        }
    }

    /// Declare a child path node. Parameterized segments keep their braces
    /// on the wire (`{id}`) but are stripped from the logical id.
    pub fn add_resource(&self, stack: &mut Stack, path_part: &str) -> Result<ApiResource, SynthError> {
        if path_part.is_empty() || path_part.contains('/') {
            return Err(SynthError::InvalidProperty {
                resource: self.api_logical_id.clone(),
                field: "path_part",
                reason: format!("{path_part:?} is not a single path segment"),
            });
        }
        let child_path = if self.path == "/" {
            format!("/{path_part}")
        } else {
            format!("{}/{}", self.path, path_part)
        };
        let logical = logical_id(&self.api_logical_id, &child_path);
        stack.add_resource(
            &logical,
            ResourceDef::new(
                "AWS::ApiGateway::Resource",
                json!({
                    "RestApiId": get_ref(&self.api_logical_id),
                    "ParentId": self.resource_id(),
                    "PathPart": path_part,
                }),
            ),
        )?;
        Ok(ApiResource {
            api_logical_id: self.api_logical_id.clone(),
            logical_id: Some(logical),
            path: child_path,
        })
    }

    /// Attach a method to this node and return its logical id. Function
    /// integrations also declare the invoke permission the gateway needs.
    pub fn add_method(
        &self,
        stack: &mut Stack,
        http_method: &str,
        integration: &Integration,
        options: MethodOptions,
    ) -> Result<String, SynthError> {
        if http_method.is_empty() || !http_method.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(SynthError::InvalidProperty {
                resource: self.api_logical_id.clone(),
                field: "http_method",
                reason: format!("{http_method:?} is not an uppercase method name"),
            });
        }
        let base = self
            .logical_id
            .clone()
            .unwrap_or_else(|| format!("{}Root", self.api_logical_id));
        let method_logical = format!("{base}{http_method}");

        let mut properties = Map::new();
        properties.insert("HttpMethod".to_string(), json!(http_method));
        properties.insert("ResourceId".to_string(), self.resource_id());
        properties.insert("RestApiId".to_string(), get_ref(&self.api_logical_id));
        properties.insert(
            "AuthorizationType".to_string(),
            json!(options.authorization_type),
        );
        properties.insert("Integration".to_string(), integration.to_value());
        if !options.method_responses.is_empty() {
            let responses: Vec<Value> = options
                .method_responses
                .iter()
                .map(MethodResponse::to_value)
                .collect();
            properties.insert("MethodResponses".to_string(), json!(responses));
        }
        stack.add_resource(
            &method_logical,
            ResourceDef::new(METHOD_TYPE, Value::Object(properties)),
        )?;

        if let Integration::Lambda(lambda) = integration {
            stack.add_resource(
                &format!("LambdaPermission{method_logical}"),
                ResourceDef::new(
                    "AWS::Lambda::Permission",
                    json!({
                        "Action": "lambda:InvokeFunction",
                        "FunctionName": lambda.function_arn,
                        "Principal": "apigateway.amazonaws.com",
                        "SourceArn": self.execution_arn(http_method),
                    }),
                ),
            )?;
        }
        Ok(method_logical)
    }

    /// Execution ARN matching this method on any stage, with parameterized
    /// segments wildcarded.
    fn execution_arn(&self, http_method: &str) -> Value {
        let wildcarded: String = if self.path == "/" {
            "/".to_string()
        } else {
            self.path
                .split('/')
                .map(|segment| if segment.starts_with('{') { "*" } else { segment })
                .collect::<Vec<_>>()
                .join("/")
        };
        fn_join(
            "",
            vec![
                json!("arn:aws:execute-api:"),
                get_ref(PSEUDO_REGION),
                json!(":"),
                get_ref(PSEUDO_ACCOUNT_ID),
                json!(":"),
                get_ref(&self.api_logical_id),
                json!(format!("/*/{http_method}{wildcarded}")),
            ],
        )
    }
}

/// Method backend wiring.
#[derive(Debug, Clone)]
pub enum Integration {
    Lambda(LambdaIntegration),
    Mock(MockIntegration),
}

impl Integration {
    pub fn lambda(function: &Function) -> Self {
        Integration::Lambda(LambdaIntegration::new(function))
    }

    pub fn mock(mock: MockIntegration) -> Self {
        Integration::Mock(mock)
    }

    fn to_value(&self) -> Value {
        match self {
            Integration::Lambda(l) => l.to_value(),
            Integration::Mock(m) => m.to_value(),
        }
    }
}

/// Proxy integration invoking a function.
#[derive(Debug, Clone)]
pub struct LambdaIntegration {
    function_arn: Value,
}

impl LambdaIntegration {
    pub fn new(function: &Function) -> Self {
        Self {
            function_arn: function.function_arn(),
        }
    }

    fn to_value(&self) -> Value {
        json!({
            "Type": "AWS_PROXY",
            // function invocations always go over POST, whatever the method
            "IntegrationHttpMethod": "POST",
            "Uri": fn_join(
                "",
                vec![
                    json!("arn:aws:apigateway:"),
                    get_ref(PSEUDO_REGION),
                    json!(":lambda:path/2015-03-31/functions/"),
                    self.function_arn.clone(),
                    json!("/invocations"),
                ],
            ),
        })
    }
}

/// Static backend answering from fixed configuration without invoking any
/// compute.
#[derive(Debug, Clone, Default)]
pub struct MockIntegration {
    pub integration_responses: Vec<IntegrationResponse>,
    pub passthrough_behavior: PassthroughBehavior,
    pub request_templates: BTreeMap<String, String>,
}

impl MockIntegration {
    fn to_value(&self) -> Value {
        let mut value = Map::new();
        value.insert("Type".to_string(), json!("MOCK"));
        if !self.integration_responses.is_empty() {
            let responses: Vec<Value> = self
                .integration_responses
                .iter()
                .map(IntegrationResponse::to_value)
                .collect();
            value.insert("IntegrationResponses".to_string(), json!(responses));
        }
        value.insert(
            "PassthroughBehavior".to_string(),
            json!(self.passthrough_behavior.as_str()),
        );
        if !self.request_templates.is_empty() {
            value.insert("RequestTemplates".to_string(), json!(self.request_templates));
        }
        Value::Object(value)
    }
}

#[derive(Debug, Clone)]
pub struct IntegrationResponse {
    pub status_code: String,
    /// `method.response.header.*` names mapped to their static values.
    pub response_parameters: BTreeMap<String, String>,
}

impl IntegrationResponse {
    fn to_value(&self) -> Value {
        let mut value = Map::new();
        value.insert("StatusCode".to_string(), json!(self.status_code));
        if !self.response_parameters.is_empty() {
            value.insert(
                "ResponseParameters".to_string(),
                json!(self.response_parameters),
            );
        }
        Value::Object(value)
    }
}

/// How a request body that matches no template reaches the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PassthroughBehavior {
    #[default]
    WhenNoMatch,
    WhenNoTemplates,
    Never,
}

impl PassthroughBehavior {
    fn as_str(self) -> &'static str {
        match self {
            PassthroughBehavior::WhenNoMatch => "WHEN_NO_MATCH",
            PassthroughBehavior::WhenNoTemplates => "WHEN_NO_TEMPLATES",
            PassthroughBehavior::Never => "NEVER",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MethodOptions {
    pub authorization_type: String,
    pub method_responses: Vec<MethodResponse>,
}

impl Default for MethodOptions {
    fn default() -> Self {
        Self {
            authorization_type: "NONE".to_string(),
            method_responses: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MethodResponse {
    pub status_code: String,
    /// Headers the method declares it may return.
    pub response_parameters: BTreeMap<String, bool>,
}

impl MethodResponse {
    fn to_value(&self) -> Value {
        let mut value = Map::new();
        value.insert("StatusCode".to_string(), json!(self.status_code));
        if !self.response_parameters.is_empty() {
            value.insert(
                "ResponseParameters".to_string(),
                json!(self.response_parameters),
            );
        }
        Value::Object(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::StackProps;

    fn api_stack() -> (Stack, RestApi) {
        let mut stack = Stack::new("items-api", StackProps::default()).unwrap();
        let api = RestApi::new(
            &mut stack,
            "sampleApi",
            RestApiProps {
                rest_api_name: Some("Sample API".to_string()),
            },
        )
        .unwrap();
        (stack, api)
    }

    #[test]
    fn child_nodes_hang_off_their_parent() {
        let (mut stack, api) = api_stack();
        let items = api.root().add_resource(&mut stack, "items").unwrap();
        let single = items.add_resource(&mut stack, "{id}").unwrap();
        assert_eq!(items.path(), "/items");
        assert_eq!(single.path(), "/items/{id}");

        let items_resource = stack.resource("RestApiSampleApiItems").unwrap();
        assert_eq!(
            items_resource.properties["ParentId"],
            get_att("RestApiSampleApi", "RootResourceId")
        );
        let single_resource = stack.resource("RestApiSampleApiItemsId").unwrap();
        assert_eq!(single_resource.properties["PathPart"], "{id}");
        assert_eq!(
            single_resource.properties["ParentId"],
            get_ref("RestApiSampleApiItems")
        );
    }

    #[test]
    fn multi_segment_path_parts_are_rejected() {
        let (mut stack, api) = api_stack();
        assert!(matches!(
            api.root().add_resource(&mut stack, "items/{id}"),
            Err(SynthError::InvalidProperty { field: "path_part", .. })
        ));
    }

    #[test]
    fn mock_methods_never_declare_a_backend_uri() {
        let (mut stack, api) = api_stack();
        let items = api.root().add_resource(&mut stack, "items").unwrap();
        let mock = MockIntegration {
            passthrough_behavior: PassthroughBehavior::Never,
            ..Default::default()
        };
        let id = items
            .add_method(&mut stack, "OPTIONS", &Integration::mock(mock), MethodOptions::default())
            .unwrap();
        let method = stack.resource(&id).unwrap();
        assert_eq!(method.properties["Integration"]["Type"], "MOCK");
        assert_eq!(method.properties["Integration"]["PassthroughBehavior"], "NEVER");
        assert!(method.properties["Integration"].get("Uri").is_none());
        assert!(stack.resource(&format!("LambdaPermission{id}")).is_none());
    }

    #[test]
    fn deployment_depends_on_every_method_of_the_api() {
        let (mut stack, api) = api_stack();
        let items = api.root().add_resource(&mut stack, "items").unwrap();
        let get = items
            .add_method(
                &mut stack,
                "GET",
                &Integration::mock(MockIntegration::default()),
                MethodOptions::default(),
            )
            .unwrap();
        let options = items
            .add_method(
                &mut stack,
                "OPTIONS",
                &Integration::mock(MockIntegration::default()),
                MethodOptions::default(),
            )
            .unwrap();
        api.add_deployment(&mut stack, "prod").unwrap();

        let deployment = stack.resource("DeploymentRestApiSampleApi").unwrap();
        assert!(deployment.depends_on.contains(&get));
        assert!(deployment.depends_on.contains(&options));

        let stage = stack.resource("StageRestApiSampleApiProd").unwrap();
        assert_eq!(stage.properties["StageName"], "prod");
        assert!(stack.synth().outputs.contains_key("RestApiSampleApiEndpoint"));
    }

    #[test]
    fn lowercase_method_names_are_rejected() {
        let (mut stack, api) = api_stack();
        let result = api.root().add_method(
            &mut stack,
            "get",
            &Integration::mock(MockIntegration::default()),
            MethodOptions::default(),
        );
        assert!(matches!(
            result,
            Err(SynthError::InvalidProperty { field: "http_method", .. })
        ));
    }
}
