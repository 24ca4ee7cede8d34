//! Upload, lifecycle and inspection commands.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use loom_plugins::{PluginId, PluginRecord, PluginRegistry};

use crate::output::Output;
use crate::theme::Theme;

pub(super) async fn upload(
    registry: &PluginRegistry,
    file: &Path,
    name: Option<String>,
    out: Output,
) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let name = name.unwrap_or_else(|| default_name(file));

    let record = registry.upload(bytes, &name).await?;
    out.print(&record, |r| {
        Theme::success(&format!("Uploaded '{}' as {} (inactive)", r.name, r.id))
    })
}

pub(super) async fn activate(registry: &PluginRegistry, id: PluginId, out: Output) -> Result<()> {
    let record = registry.activate(id).await?;
    out.print(&record, |r| Theme::success(&format!("Activated '{}' ({})", r.name, r.id)))
}

pub(super) async fn deactivate(registry: &PluginRegistry, id: PluginId, out: Output) -> Result<()> {
    let record = registry.deactivate(id).await?;
    out.print(&record, |r| Theme::success(&format!("Deactivated '{}' ({})", r.name, r.id)))
}

pub(super) async fn remove(registry: &PluginRegistry, id: PluginId, out: Output) -> Result<()> {
    let record = registry.remove(id).await?;
    out.print(&record, |r| Theme::success(&format!("Removed '{}' ({})", r.name, r.id)))
}

pub(super) async fn list(registry: &PluginRegistry, out: Output) -> Result<()> {
    let records = registry.list().await?;
    out.print(&records, |records| render_list(records))
}

pub(super) async fn show(registry: &PluginRegistry, id: PluginId, out: Output) -> Result<()> {
    let record = registry.get(id).await?;
    out.print(&record, render_record)
}

pub(super) async fn methods(registry: &PluginRegistry, id: PluginId, out: Output) -> Result<()> {
    let methods = registry.list_methods(id).await?;
    out.print(&methods, |methods| {
        methods
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    })
}

pub(super) async fn safe_methods(
    registry: &PluginRegistry,
    id: PluginId,
    out: Output,
) -> Result<()> {
    let methods = registry.list_safe_methods(id).await?;
    out.print(&methods, |methods| {
        if methods.is_empty() {
            return Theme::info("No safe methods");
        }
        methods
            .iter()
            .map(|m| format!("{}({})  {}", m.name, m.params.join(", "), Theme::dimmed(&m.description)))
            .collect::<Vec<_>>()
            .join("\n")
    })
}

/// The file name without its extension.
fn default_name(file: &Path) -> String {
    file.file_stem()
        .map_or_else(|| "plugin".to_owned(), |s| s.to_string_lossy().into_owned())
}

fn render_list(records: &[PluginRecord]) -> String {
    if records.is_empty() {
        return Theme::info("No plugins uploaded");
    }

    let mut text = Theme::header("Plugins");
    let _ = write!(
        text,
        "\n  {:<36}  {:<28}  {:<8}  UPLOADED\n{}",
        "ID",
        "NAME",
        "STATE",
        Theme::separator()
    );
    for r in records {
        let _ = write!(
            text,
            "\n  {:<36}  {:<28}  {:<8}  {}",
            r.id,
            r.name,
            Theme::state(r.active),
            r.uploaded_at.format("%Y-%m-%d %H:%M")
        );
    }
    let _ = write!(
        text,
        "\n\n{}",
        Theme::dimmed(&format!("{} plugin(s)", records.len()))
    );
    text
}

fn render_record(record: &PluginRecord) -> String {
    format!(
        "{}\n  id:          {}\n  state:       {}\n  description: {}\n  artifact:    {}\n  uploaded:    {}",
        Theme::header(&record.name),
        record.id,
        Theme::state(record.active),
        record.description,
        record.artifact.display(),
        record.uploaded_at.to_rfc3339()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_name_strips_extension() {
        assert_eq!(default_name(Path::new("/tmp/calculator.wasm")), "calculator");
        assert_eq!(default_name(Path::new("bundle.tar.gz")), "bundle.tar");
        assert_eq!(default_name(Path::new("/")), "plugin");
    }
}
