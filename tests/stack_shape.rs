//! Structural assertions over the synthesized deployment template.

use items_stack::items_api::{
    items_api_stack, ItemsApiProps, CORS_ALLOW_CREDENTIALS, CORS_ALLOW_HEADERS, CORS_ALLOW_METHODS,
    CORS_ALLOW_ORIGIN,
};
use serde_json::{json, Value};

fn synthesized() -> Value {
    let stack = items_api_stack(&ItemsApiProps::default()).unwrap();
    serde_json::to_value(stack.synth()).unwrap()
}

fn resources_of_type<'a>(template: &'a Value, ty: &str) -> Vec<(&'a String, &'a Value)> {
    template["Resources"]
        .as_object()
        .unwrap()
        .iter()
        .filter(|(_, resource)| resource["Type"] == ty)
        .collect()
}

fn methods_named<'a>(template: &'a Value, verb: &str) -> Vec<(&'a String, &'a Value)> {
    resources_of_type(template, "AWS::ApiGateway::Method")
        .into_iter()
        .filter(|(_, m)| m["Properties"]["HttpMethod"] == verb)
        .collect()
}

#[test]
fn table_is_keyed_on_item_id_with_destroy_policy() {
    let template = synthesized();
    let tables = resources_of_type(&template, "AWS::DynamoDB::Table");
    assert_eq!(tables.len(), 1);
    let (_, table) = tables[0];
    let properties = &table["Properties"];
    assert_eq!(properties["TableName"], "items");
    assert_eq!(properties["KeySchema"][0]["AttributeName"], "itemId");
    assert_eq!(properties["KeySchema"][0]["KeyType"], "HASH");
    assert_eq!(properties["AttributeDefinitions"][0]["AttributeName"], "itemId");
    assert_eq!(properties["AttributeDefinitions"][0]["AttributeType"], "S");
    assert_eq!(table["DeletionPolicy"], "Delete");
}

#[test]
fn function_environment_is_exactly_table_name_and_primary_key() {
    let template = synthesized();
    let tables = resources_of_type(&template, "AWS::DynamoDB::Table");
    let table_logical_id = tables[0].0;
    let functions = resources_of_type(&template, "AWS::Lambda::Function");
    assert_eq!(functions.len(), 1);

    let variables = functions[0].1["Properties"]["Environment"]["Variables"]
        .as_object()
        .unwrap();
    assert_eq!(variables.len(), 2);
    assert_eq!(variables["TABLE_NAME"], json!({ "Ref": table_logical_id }));
    assert_eq!(variables["PRIMARY_KEY"], "itemId");
}

#[test]
fn function_may_read_but_never_write_the_table() {
    let template = synthesized();
    let (table_logical_id, _) = resources_of_type(&template, "AWS::DynamoDB::Table")[0];
    let roles = resources_of_type(&template, "AWS::IAM::Role");
    assert_eq!(roles.len(), 1);

    let policies = roles[0].1["Properties"]["Policies"].as_array().unwrap();
    assert_eq!(policies.len(), 1);
    let statement = &policies[0]["PolicyDocument"]["Statement"][0];
    assert_eq!(statement["Effect"], "Allow");

    let actions: Vec<&str> = statement["Action"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a.as_str().unwrap())
        .collect();
    assert!(actions.contains(&"dynamodb:GetItem"));
    assert!(actions.contains(&"dynamodb:Query"));
    assert!(actions.contains(&"dynamodb:Scan"));
    for action in &actions {
        assert!(action.starts_with("dynamodb:"), "unexpected action {action}");
        let lowered = action.to_ascii_lowercase();
        assert!(
            !lowered.contains("put") && !lowered.contains("update") && !lowered.contains("delete") && !lowered.contains("write"),
            "write action granted: {action}"
        );
    }
    assert_ne!(actions, vec!["dynamodb:*"]);

    let first_resource = &statement["Resource"][0];
    assert_eq!(first_resource, &json!({ "Fn::GetAtt": [table_logical_id, "Arn"] }));
}

#[test]
fn api_exposes_exactly_one_get_method_on_items_id_wired_to_the_function() {
    let template = synthesized();
    let gets = methods_named(&template, "GET");
    assert_eq!(gets.len(), 1);
    let (_, get) = gets[0];

    // the method hangs off the {id} node, whose parent is the items node,
    // whose parent is the API root
    let resource_ref = get["Properties"]["ResourceId"]["Ref"].as_str().unwrap();
    let single = &template["Resources"][resource_ref];
    assert_eq!(single["Type"], "AWS::ApiGateway::Resource");
    assert_eq!(single["Properties"]["PathPart"], "{id}");
    let parent_ref = single["Properties"]["ParentId"]["Ref"].as_str().unwrap();
    let items = &template["Resources"][parent_ref];
    assert_eq!(items["Properties"]["PathPart"], "items");
    assert!(items["Properties"]["ParentId"].get("Fn::GetAtt").is_some());

    let (function_logical_id, _) = resources_of_type(&template, "AWS::Lambda::Function")[0];
    let integration = &get["Properties"]["Integration"];
    assert_eq!(integration["Type"], "AWS_PROXY");
    assert_eq!(integration["IntegrationHttpMethod"], "POST");
    let uri = serde_json::to_string(&integration["Uri"]).unwrap();
    assert!(uri.contains(function_logical_id));

    let permissions = resources_of_type(&template, "AWS::Lambda::Permission");
    assert_eq!(permissions.len(), 1);
    assert_eq!(
        permissions[0].1["Properties"]["Principal"],
        "apigateway.amazonaws.com"
    );
}

#[test]
fn cors_options_method_is_a_backendless_mock_with_the_fixed_headers() {
    let template = synthesized();
    let options = methods_named(&template, "OPTIONS");
    assert_eq!(options.len(), 1);
    let (_, method) = options[0];

    let integration = &method["Properties"]["Integration"];
    assert_eq!(integration["Type"], "MOCK");
    assert!(integration.get("Uri").is_none());
    assert_eq!(integration["PassthroughBehavior"], "NEVER");
    assert_eq!(
        integration["RequestTemplates"]["application/json"],
        "{\"statusCode\": 200}"
    );

    let response = &integration["IntegrationResponses"][0];
    assert_eq!(response["StatusCode"], "200");
    assert_eq!(
        response["ResponseParameters"],
        json!({
            "method.response.header.Access-Control-Allow-Headers": CORS_ALLOW_HEADERS,
            "method.response.header.Access-Control-Allow-Origin": CORS_ALLOW_ORIGIN,
            "method.response.header.Access-Control-Allow-Credentials": CORS_ALLOW_CREDENTIALS,
            "method.response.header.Access-Control-Allow-Methods": CORS_ALLOW_METHODS,
        })
    );

    let declared = &method["Properties"]["MethodResponses"][0];
    assert_eq!(declared["StatusCode"], "200");
    for (_, allowed) in declared["ResponseParameters"].as_object().unwrap() {
        assert_eq!(allowed, &json!(true));
    }
}

#[test]
fn deployment_covers_every_method_and_stages_prod() {
    let template = synthesized();
    let deployments = resources_of_type(&template, "AWS::ApiGateway::Deployment");
    assert_eq!(deployments.len(), 1);
    let depends_on: Vec<&str> = deployments[0].1["DependsOn"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d.as_str().unwrap())
        .collect();
    let method_ids: Vec<&String> = methods_named(&template, "GET")
        .into_iter()
        .chain(methods_named(&template, "OPTIONS"))
        .map(|(id, _)| id)
        .collect();
    for id in method_ids {
        assert!(depends_on.contains(&id.as_str()), "deployment missing {id}");
    }

    let stages = resources_of_type(&template, "AWS::ApiGateway::Stage");
    assert_eq!(stages.len(), 1);
    assert_eq!(stages[0].1["Properties"]["StageName"], "prod");

    assert!(template["Outputs"]
        .as_object()
        .unwrap()
        .values()
        .any(|o| serde_json::to_string(&o["Value"]).unwrap().contains("execute-api")));
}

#[test]
fn synthesizing_twice_yields_identical_templates() {
    let props = ItemsApiProps::default();
    let first = items_api_stack(&props).unwrap().synth();
    let second = items_api_stack(&props).unwrap().synth();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}
