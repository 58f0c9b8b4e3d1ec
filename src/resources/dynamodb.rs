use serde_json::{json, Map, Value};

use crate::error::SynthError;
use crate::names::logical_id;
use crate::resources::iam::{attach_inline_policy, PolicyStatement};
use crate::resources::lambda::Function;
use crate::stack::Stack;
use crate::template::{fn_join, get_att, get_ref, RemovalPolicy, ResourceDef};

/// Scalar types a partition key can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    String,
    Number,
    Binary,
}

impl AttributeType {
    pub fn type_code(self) -> &'static str {
        match self {
            AttributeType::String => "S",
            AttributeType::Number => "N",
            AttributeType::Binary => "B",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub ty: AttributeType,
}

impl Attribute {
    pub fn string(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ty: AttributeType::String,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TableProps {
    /// Physical table name. Leave unset to let the control plane generate
    /// one. 3-255 characters from [a-zA-Z0-9_.-].
    pub table_name: Option<String>,
    pub partition_key: Attribute,
    pub removal_policy: RemovalPolicy,
}

impl TableProps {
    pub fn keyed_on(partition_key: Attribute) -> Self {
        Self {
            table_name: None,
            partition_key,
            removal_policy: RemovalPolicy::Retain,
        }
    }
}

/// Actions granted by [`Table::grant_read_data`]; deliberately nothing that
/// can write.
pub const READ_DATA_ACTIONS: &[&str] = &[
    "dynamodb:BatchGetItem",
    "dynamodb:GetRecords",
    "dynamodb:GetShardIterator",
    "dynamodb:Query",
    "dynamodb:GetItem",
    "dynamodb:Scan",
    "dynamodb:ConditionCheckItem",
    "dynamodb:DescribeTable",
];

/// A key-value table keyed by a single attribute.
#[derive(Debug, Clone)]
pub struct Table {
    logical_id: String,
}

impl Table {
    pub fn new(stack: &mut Stack, id: &str, props: TableProps) -> Result<Self, SynthError> {
        let logical = logical_id("Table", id);
        if let Some(name) = &props.table_name {
            let valid_chars = name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
            if name.len() < 3 || name.len() > 255 || !valid_chars {
                return Err(SynthError::InvalidProperty {
                    resource: logical,
                    field: "table_name",
                    reason: "must be 3-255 characters from [a-zA-Z0-9_.-]".to_string(),
                });
            }
        }

        let key = &props.partition_key;
        let mut properties = Map::new();
        if let Some(name) = &props.table_name {
            properties.insert("TableName".to_string(), json!(name));
        }
        properties.insert(
            "AttributeDefinitions".to_string(),
            json!([{ "AttributeName": key.name, "AttributeType": key.ty.type_code() }]),
        );
        properties.insert(
            "KeySchema".to_string(),
            json!([{ "AttributeName": key.name, "KeyType": "HASH" }]),
        );
        properties.insert(
            "ProvisionedThroughput".to_string(),
            json!({ "ReadCapacityUnits": 5, "WriteCapacityUnits": 5 }),
        );

        let mut resource = ResourceDef::new("AWS::DynamoDB::Table", Value::Object(properties));
        resource.deletion_policy = Some(props.removal_policy.into());
        stack.add_resource(&logical, resource)?;
        Ok(Self { logical_id: logical })
    }

    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// Token resolving to the physical table name.
    pub fn table_name(&self) -> Value {
        get_ref(&self.logical_id)
    }

    pub fn table_arn(&self) -> Value {
        get_att(&self.logical_id, "Arn")
    }

    /// The table's secondary-index namespace, for grants that must keep
    /// working when indexes are added later.
    fn index_arns(&self) -> Value {
        fn_join("", vec![self.table_arn(), json!("/index/*")])
    }

    /// Grant the function's execution role read (and only read) access to
    /// this table's data.
    pub fn grant_read_data(&self, stack: &mut Stack, function: &Function) -> Result<(), SynthError> {
        let statement =
            PolicyStatement::allow(READ_DATA_ACTIONS, vec![self.table_arn(), self.index_arns()]);
        attach_inline_policy(
            stack,
            function.role_logical_id(),
            &format!("{}ReadData", self.logical_id),
            &[statement],
        )
    }
}
