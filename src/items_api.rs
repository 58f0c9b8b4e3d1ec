//! The deployment this repository exists for: an `items` table, a reader
//! function, and the HTTP API in front of them.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::json;

use crate::error::SynthError;
use crate::resources::apigateway::{
    ApiResource, Integration, IntegrationResponse, MethodOptions, MethodResponse, MockIntegration,
    PassthroughBehavior, RestApi, RestApiProps,
};
use crate::resources::dynamodb::{Attribute, Table, TableProps};
use crate::resources::lambda::{AssetCode, Function, FunctionProps, Runtime};
use crate::stack::{Stack, StackProps};
use crate::template::RemovalPolicy;

/// Headers returned by the preflight responder. The values carry the single
/// quotes the gateway expects around static header values.
pub const CORS_ALLOW_HEADERS: &str =
    "'Content-Type,X-Amz-Date,Authorization,X-Api-Key,X-Amz-Security-Token,X-Amz-User-Agent'";
pub const CORS_ALLOW_ORIGIN: &str = "'*'";
pub const CORS_ALLOW_CREDENTIALS: &str = "'false'";
pub const CORS_ALLOW_METHODS: &str = "'OPTIONS,GET,PUT,POST,DELETE'";

#[derive(Debug, Clone)]
pub struct ItemsApiProps {
    pub stack_name: String,
    /// Directory zipped as the function's source. Its contents and entry
    /// point belong to the surrounding repository.
    pub asset_dir: PathBuf,
}

impl Default for ItemsApiProps {
    fn default() -> Self {
        Self {
            stack_name: "items-api".to_string(),
            asset_dir: PathBuf::from("src/lambda"),
        }
    }
}

/// Assemble the full deployment: table, reader function, read grant, HTTP
/// API with `GET /items/{id}`, the preflight responder on `/items`, and one
/// `prod` stage.
pub fn items_api_stack(props: &ItemsApiProps) -> Result<Stack, SynthError> {
    let mut stack = Stack::new(
        &props.stack_name,
        StackProps {
            description: Some(
                "Key-value items table with a read-only HTTP lookup endpoint".to_string(),
            ),
        },
    )?;

    let table = Table::new(
        &mut stack,
        "items",
        TableProps {
            table_name: Some("items".to_string()),
            partition_key: Attribute::string("itemId"),
            // NOT recommended for production stacks
            removal_policy: RemovalPolicy::Destroy,
        },
    )?;

    let mut function_props = FunctionProps::new(
        AssetCode::dir(&props.asset_dir),
        "get-item.handler",
        Runtime::NODEJS_10_X,
    );
    function_props
        .environment
        .insert("TABLE_NAME".to_string(), table.table_name());
    function_props
        .environment
        .insert("PRIMARY_KEY".to_string(), json!("itemId"));
    let get_item = Function::new(&mut stack, "getOneItem", function_props)?;

    table.grant_read_data(&mut stack, &get_item)?;

    let api = RestApi::new(
        &mut stack,
        "sampleApi",
        RestApiProps {
            rest_api_name: Some("Sample API".to_string()),
        },
    )?;
    let items = api.root().add_resource(&mut stack, "items")?;
    let single_item = items.add_resource(&mut stack, "{id}")?;
    single_item.add_method(
        &mut stack,
        "GET",
        &Integration::lambda(&get_item),
        MethodOptions::default(),
    )?;
    add_cors_options(&mut stack, &items)?;
    api.add_deployment(&mut stack, "prod")?;

    Ok(stack)
}

/// Attach an OPTIONS method answering preflight requests from static
/// configuration; no backend is involved and the request body is ignored.
pub fn add_cors_options(stack: &mut Stack, resource: &ApiResource) -> Result<String, SynthError> {
    let headers = [
        ("Access-Control-Allow-Headers", CORS_ALLOW_HEADERS),
        ("Access-Control-Allow-Origin", CORS_ALLOW_ORIGIN),
        ("Access-Control-Allow-Credentials", CORS_ALLOW_CREDENTIALS),
        ("Access-Control-Allow-Methods", CORS_ALLOW_METHODS),
    ];
    let mut static_values = BTreeMap::new();
    let mut declared = BTreeMap::new();
    for (header, value) in headers {
        static_values.insert(format!("method.response.header.{header}"), value.to_string());
        declared.insert(format!("method.response.header.{header}"), true);
    }

    let mut request_templates = BTreeMap::new();
    request_templates.insert(
        "application/json".to_string(),
        "{\"statusCode\": 200}".to_string(),
    );
    let integration = MockIntegration {
        integration_responses: vec![IntegrationResponse {
            status_code: "200".to_string(),
            response_parameters: static_values,
        }],
        passthrough_behavior: PassthroughBehavior::Never,
        request_templates,
    };
    let options = MethodOptions {
        authorization_type: "NONE".to_string(),
        method_responses: vec![MethodResponse {
            status_code: "200".to_string(),
            response_parameters: declared,
        }],
    };
    resource.add_method(stack, "OPTIONS", &Integration::mock(integration), options)
}
