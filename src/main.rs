use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use items_stack::deploy;
use items_stack::items_api::{items_api_stack, ItemsApiProps};
use items_stack::stack::{App, StackArtifacts};

#[derive(Parser)]
#[command(name = "items_stack", version, about = "Declare and ship the items lookup deployment")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
struct StackArgs {
    /// Name of the deployed stack.
    #[arg(long, env = "STACK_NAME", default_value = "items-api")]
    stack_name: String,
    /// Directory zipped as the function's source.
    #[arg(long, env = "ASSET_DIR", default_value = "src/lambda")]
    asset_dir: PathBuf,
    /// Directory receiving templates and staged assets.
    #[arg(long, env = "OUT_DIR", default_value = "out")]
    out_dir: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Write the deployment template and stage assets.
    Synth(StackArgs),
    /// Synthesize, upload assets, and create or update the stack.
    Deploy {
        #[command(flatten)]
        args: StackArgs,
        /// Bucket receiving staged assets; created when missing.
        #[arg(long, env = "ARTIFACT_BUCKET")]
        artifact_bucket: String,
    },
    /// Tear the stack down.
    Destroy {
        /// Name of the deployed stack.
        #[arg(long, env = "STACK_NAME", default_value = "items-api")]
        stack_name: String,
    },
}

fn synth(args: &StackArgs) -> Result<StackArtifacts> {
    let mut app = App::new();
    app.add_stack(items_api_stack(&ItemsApiProps {
        stack_name: args.stack_name.clone(),
        asset_dir: args.asset_dir.clone(),
    })?)?;
    let mut artifacts = app.synth(&args.out_dir)?;
    Ok(artifacts.remove(0))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Synth(args) => {
            let artifacts = synth(&args)?;
            info!(template = %artifacts.template_path.display(), "synthesized");
        }
        Command::Deploy {
            args,
            artifact_bucket,
        } => {
            let artifacts = synth(&args)?;
            let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
                .load()
                .await;
            let region = config
                .region()
                .map(|r| r.as_ref().to_string())
                .context("no AWS region configured")?;
            let s3 = aws_sdk_s3::Client::new(&config);
            let cfn = aws_sdk_cloudformation::Client::new(&config);

            deploy::ensure_artifact_bucket(&s3, &artifact_bucket, &region).await?;
            let parameters =
                deploy::upload_assets(&s3, &artifact_bucket, &args.out_dir, &artifacts.assets)
                    .await?;
            let body = std::fs::read_to_string(&artifacts.template_path)
                .with_context(|| format!("failed to read {}", artifacts.template_path.display()))?;
            deploy::create_or_update_stack(&cfn, &args.stack_name, &body, &parameters).await?;
            let outputs = deploy::wait_for_stack(&cfn, &args.stack_name).await?;
            for (key, value) in outputs {
                info!("{key} = {value}");
            }
        }
        Command::Destroy { stack_name } => {
            let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
                .load()
                .await;
            let cfn = aws_sdk_cloudformation::Client::new(&config);
            deploy::delete_stack(&cfn, &stack_name).await?;
            info!(stack = %stack_name, "destroyed");
        }
    }
    Ok(())
}
