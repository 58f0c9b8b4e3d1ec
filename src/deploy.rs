//! Thin client of the provisioning control plane: hand over the template,
//! wait for the stack to settle, and fetch its outputs. Validation and
//! rollback stay on the service side.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use aws_sdk_cloudformation::error::DisplayErrorContext;
use aws_sdk_cloudformation::types::{Capability, OnFailure, Parameter, StackStatus};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use tracing::{debug, info};

use crate::asset::AssetManifestEntry;

const POLL_INTERVAL: Duration = Duration::from_millis(700);

pub async fn does_stack_exist(
    client: &aws_sdk_cloudformation::Client,
    name: &str,
) -> Result<bool> {
    match client.describe_stacks().stack_name(name).send().await {
        Ok(_) => Ok(true),
        Err(e) => {
            let text = DisplayErrorContext(&e).to_string();
            if text.contains("does not exist") {
                Ok(false)
            } else {
                Err(anyhow!(text))
            }
        }
    }
}

/// `Some(stack)` once the stack reaches a settled status, `None` while the
/// service is still working, and an error carrying the service's own reason
/// for anything that settled badly.
pub async fn describe_settled(
    client: &aws_sdk_cloudformation::Client,
    name: &str,
) -> Result<Option<aws_sdk_cloudformation::types::Stack>> {
    let resp = client
        .describe_stacks()
        .stack_name(name)
        .send()
        .await
        .map_err(|e| anyhow!(DisplayErrorContext(&e).to_string()))?;
    let Some(stack) = resp.stacks().first() else {
        bail!("stack {name} not found");
    };
    let Some(status) = stack.stack_status() else {
        bail!("stack {name} reported no status");
    };
    match status {
        StackStatus::CreateComplete
        | StackStatus::UpdateComplete
        | StackStatus::DeleteComplete
        | StackStatus::UpdateRollbackComplete
        | StackStatus::ImportComplete
        | StackStatus::ImportRollbackComplete => Ok(Some(stack.clone())),

        StackStatus::CreateInProgress
        | StackStatus::DeleteInProgress
        | StackStatus::ImportInProgress
        | StackStatus::ImportRollbackInProgress
        | StackStatus::ReviewInProgress
        | StackStatus::RollbackInProgress
        | StackStatus::UpdateCompleteCleanupInProgress
        | StackStatus::UpdateInProgress
        | StackStatus::UpdateRollbackCompleteCleanupInProgress
        | StackStatus::UpdateRollbackInProgress => Ok(None),

        other => bail!(
            "stack {name} settled in {other:?}: {}",
            stack
                .stack_status_reason()
                .unwrap_or("no failure reason reported")
        ),
    }
}

/// Poll until the stack settles, then return its outputs.
pub async fn wait_for_stack(
    client: &aws_sdk_cloudformation::Client,
    name: &str,
) -> Result<HashMap<String, String>> {
    loop {
        tokio::time::sleep(POLL_INTERVAL).await;
        match describe_settled(client, name).await? {
            Some(stack) => {
                let mut outputs = HashMap::new();
                for output in stack.outputs() {
                    if let (Some(key), Some(value)) = (output.output_key(), output.output_value()) {
                        outputs.insert(key.to_string(), value.to_string());
                    }
                }
                return Ok(outputs);
            }
            None => debug!(stack = name, "still provisioning"),
        }
    }
}

pub async fn create_or_update_stack(
    client: &aws_sdk_cloudformation::Client,
    name: &str,
    body: &str,
    parameters: &[(String, String)],
) -> Result<()> {
    let parameters: Vec<Parameter> = parameters
        .iter()
        .map(|(key, value)| {
            Parameter::builder()
                .parameter_key(key)
                .parameter_value(value)
                .build()
        })
        .collect();

    if does_stack_exist(client, name).await? {
        info!(stack = name, "updating stack");
        let mut req = client
            .update_stack()
            .stack_name(name)
            .template_body(body)
            .capabilities(Capability::CapabilityNamedIam)
            .capabilities(Capability::CapabilityIam);
        for parameter in parameters {
            req = req.parameters(parameter);
        }
        match req.send().await {
            Ok(_) => Ok(()),
            Err(e) => {
                let text = DisplayErrorContext(&e).to_string();
                if text.contains("No updates are to be performed") {
                    info!(stack = name, "stack already up to date");
                    Ok(())
                } else {
                    Err(anyhow!(text))
                }
            }
        }
    } else {
        info!(stack = name, "creating stack");
        let mut req = client
            .create_stack()
            .stack_name(name)
            .template_body(body)
            .on_failure(OnFailure::Delete)
            .capabilities(Capability::CapabilityNamedIam)
            .capabilities(Capability::CapabilityIam);
        for parameter in parameters {
            req = req.parameters(parameter);
        }
        req.send()
            .await
            .map_err(|e| anyhow!(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }
}

/// Delete the stack and wait for it to disappear. A stack that never existed
/// counts as deleted.
pub async fn delete_stack(client: &aws_sdk_cloudformation::Client, name: &str) -> Result<()> {
    if !does_stack_exist(client, name).await? {
        info!(stack = name, "nothing to delete");
        return Ok(());
    }
    client
        .delete_stack()
        .stack_name(name)
        .send()
        .await
        .map_err(|e| anyhow!(DisplayErrorContext(&e).to_string()))?;
    info!(stack = name, "deleting stack");
    loop {
        tokio::time::sleep(POLL_INTERVAL).await;
        match describe_settled(client, name).await {
            Ok(Some(_)) => return Ok(()),
            Ok(None) => debug!(stack = name, "still deleting"),
            Err(e) if e.to_string().contains("does not exist") => return Ok(()),
            Err(e) => return Err(e),
        }
    }
}

/// Create the artifact bucket when it is missing. Outside us-east-1 the
/// service requires an explicit location constraint.
pub async fn ensure_artifact_bucket(
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    region: &str,
) -> Result<()> {
    if s3.head_bucket().bucket(bucket).send().await.is_ok() {
        debug!(bucket, "artifact bucket present");
        return Ok(());
    }
    info!(bucket, "creating artifact bucket");
    let mut req = s3.create_bucket().bucket(bucket);
    if region != "us-east-1" {
        req = req.create_bucket_configuration(
            CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(region))
                .build(),
        );
    }
    req.send()
        .await
        .map_err(|e| anyhow!(DisplayErrorContext(&e).to_string()))?;
    Ok(())
}

/// Upload staged archives and return the template parameter values pointing
/// at them.
pub async fn upload_assets(
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    out_dir: &Path,
    assets: &[AssetManifestEntry],
) -> Result<Vec<(String, String)>> {
    let mut parameters = Vec::with_capacity(assets.len() * 2);
    for asset in assets {
        let path = out_dir.join(&asset.file);
        let body = ByteStream::from_path(&path)
            .await
            .with_context(|| format!("failed to read staged asset {}", path.display()))?;
        s3.put_object()
            .bucket(bucket)
            .key(&asset.key)
            .body(body)
            .send()
            .await
            .map_err(|e| anyhow!(DisplayErrorContext(&e).to_string()))?;
        info!(key = %asset.key, "uploaded asset");
        parameters.push((asset.bucket_parameter.clone(), bucket.to_string()));
        parameters.push((asset.key_parameter.clone(), asset.key.clone()));
    }
    Ok(parameters)
}
