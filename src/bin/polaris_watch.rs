//! 解析并持续监听一个服务
//!
//! 用法：`polaris-watch <config.toml> <service> [namespace]`

use anyhow::{Context, bail};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use flare_polaris_resolver::logging::init_tracing_from_config;
use flare_polaris_resolver::{
    PolarisResolver, Resolver, ResolverConfig, TargetInfo, WatchResolver,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        bail!("usage: {} <config.toml> <service> [namespace]", args[0]);
    }

    let config = ResolverConfig::load_from_file(&args[1])
        .with_context(|| format!("failed to load config {}", args[1]))?;
    init_tracing_from_config(Some(&config.logging));

    let resolver = PolarisResolver::from_config(&config)
        .await
        .context("failed to create resolver")?;

    let mut target = TargetInfo::new(args[2].as_str());
    if let Some(namespace) = args.get(3) {
        target = target.with_namespace(namespace.as_str());
    }
    let desc = resolver.target(&target);
    info!(desc = %desc, resolver = resolver.name(), "Resolving service");

    match resolver.resolve(&desc).await {
        Ok(result) => println!("{}", serde_json::to_string_pretty(&result)?),
        Err(e) if e.is_no_instances() => warn!(desc = %desc, "No instances yet, watching"),
        Err(e) => return Err(e).context("initial resolve failed"),
    }

    let token = CancellationToken::new();
    let shutdown = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received (Ctrl+C)");
        }
        shutdown.cancel();
    });

    while !token.is_cancelled() {
        match resolver.watch(&token, &desc).await {
            Ok(change) if change.is_empty() => {}
            Ok(change) => println!("{}", serde_json::to_string_pretty(&change)?),
            Err(e) => {
                error!(desc = %desc, error = %e, "Watch failed");
                return Err(e.into());
            }
        }
    }

    Ok(())
}
