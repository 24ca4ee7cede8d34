//! Command handlers.

mod invoke;
mod manage;

use anyhow::Result;
use loom_plugins::PluginRegistry;

use crate::Commands;
use crate::output::Output;

/// Run one command against a started registry.
pub(crate) async fn run(registry: &PluginRegistry, command: Commands, out: Output) -> Result<()> {
    match command {
        Commands::Upload { file, name } => manage::upload(registry, &file, name, out).await,
        Commands::Activate { id } => manage::activate(registry, id, out).await,
        Commands::Deactivate { id } => manage::deactivate(registry, id, out).await,
        Commands::Remove { id } => manage::remove(registry, id, out).await,
        Commands::List => manage::list(registry, out).await,
        Commands::Show { id } => manage::show(registry, id, out).await,
        Commands::Methods { id } => manage::methods(registry, id, out).await,
        Commands::SafeMethods { id } => manage::safe_methods(registry, id, out).await,
        Commands::Exec { id, text } => invoke::exec(registry, id, &text, out).await,
        Commands::Invoke { id, method, args } => {
            invoke::invoke(registry, id, &method, &args, false, out).await
        },
        Commands::SafeInvoke { id, method, args } => {
            invoke::invoke(registry, id, &method, &args, true, out).await
        },
        Commands::Call {
            target,
            method,
            args,
        } => invoke::call(registry, &target, method.as_deref(), &args, out).await,
        Commands::Request { id, request } => invoke::request(registry, id, &request, out).await,
    }
}
