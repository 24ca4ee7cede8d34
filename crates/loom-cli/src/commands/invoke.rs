//! Invocation commands.

use anyhow::{Context, Result};
use loom_plugins::{PluginId, PluginRegistry, PluginRequest, PluginTarget};
use serde_json::Value;

use crate::output::{Output, parse_arg, render_value};

pub(super) async fn exec(registry: &PluginRegistry, id: PluginId, text: &str, out: Output) -> Result<()> {
    let result = registry.execute_simple(id, text).await?;
    out.print(&result, Clone::clone)
}

pub(super) async fn invoke(
    registry: &PluginRegistry,
    id: PluginId,
    method: &str,
    args: &[String],
    safe: bool,
    out: Output,
) -> Result<()> {
    let args = wire_args(args);
    let result = if safe {
        registry.safe_invoke(id, method, args).await?
    } else {
        registry.invoke(id, method, args).await?
    };
    out.print(&result, render_value)
}

pub(super) async fn call(
    registry: &PluginRegistry,
    target: &PluginTarget,
    method: Option<&str>,
    args: &[String],
    out: Output,
) -> Result<()> {
    let result = registry
        .resolve_and_invoke(target, method, wire_args(args))
        .await?;
    out.print(&result, render_value)
}

pub(super) async fn request(
    registry: &PluginRegistry,
    id: PluginId,
    raw: &str,
    out: Output,
) -> Result<()> {
    let request: PluginRequest = serde_json::from_str(raw).context("malformed request")?;
    let result = registry.execute(id, request).await?;
    out.print(&result, render_value)
}

fn wire_args(args: &[String]) -> Vec<Value> {
    args.iter().map(|a| parse_arg(a)).collect()
}
