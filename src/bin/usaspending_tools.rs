use std::env;
use std::error::Error;
use std::process::ExitCode;

use serde_json::Value;
use tracing_subscriber::EnvFilter;
use usaspending_tools::{
    ClientConfig, DependencyMap, SearchLimits, SpendingContext, ToolRegistry, UsaSpendingClient,
    all_tools,
};

const USAGE: &str = "usage: usaspending_tools list | <tool> [json-arguments]";

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("usaspending_tools=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        eprintln!("{USAGE}");
        return Ok(ExitCode::from(2));
    };

    let client = UsaSpendingClient::new(ClientConfig::from_env()?)?;
    tracing::debug!(base_url = client.base_url(), "client configured");

    let deps = DependencyMap::new();
    deps.insert(SpendingContext::new(client, SearchLimits::from_env()?));
    let registry = ToolRegistry::new(all_tools()?, deps)?;

    if command == "list" {
        println!(
            "{}",
            serde_json::to_string_pretty(&registry.definitions())?
        );
        return Ok(ExitCode::SUCCESS);
    }

    let raw_args = args.collect::<Vec<_>>().join(" ");
    let tool_args = if raw_args.trim().is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_str(&raw_args)?
    };

    let outcome = registry.call(&command, tool_args).await;
    let failed = outcome.is_error();
    println!("{}", outcome.into_text());

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
