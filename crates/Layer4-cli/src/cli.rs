//! Plugin commands - `onecode plugin ...`, `onecode plugins`, `onecode run`

use crate::PluginCommand;
use anyhow::{anyhow, Result};
use onecode_core::{InstallResult, Plugin, PluginCatalog, PluginManager, PluginState, RemoveError};
use onecode_foundation::PluginSettings;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 설정으로 매니저 생성
pub fn build_manager(settings: &PluginSettings, cancel: CancellationToken) -> Result<PluginManager> {
    let catalog = Arc::new(PluginCatalog::builtin());
    let manager = PluginManager::from_settings(settings, catalog)?.with_cancellation(cancel);
    Ok(manager)
}

// ============================================================================
// onecode plugin ...
// ============================================================================

pub async fn run_plugin_command(manager: &PluginManager, command: PluginCommand) -> Result<()> {
    match command {
        PluginCommand::Install { source, force } => install(manager, &source, force).await,
        PluginCommand::Remove { name, yes } => remove(manager, &name, yes).await,
        PluginCommand::List { detailed } => {
            list(manager, detailed);
            Ok(())
        }
        PluginCommand::Info { name } => info(manager, &name),
        PluginCommand::Refresh => refresh(manager),
    }
}

async fn install(manager: &PluginManager, source: &str, force: bool) -> Result<()> {
    println!("Installing plugin from {}...", source);
    let result = manager.install(source, force).await?;
    print_install_result(&result);
    Ok(())
}

fn print_install_result(result: &InstallResult) {
    println!(
        "✓ Installed {} v{} ({})",
        result.name, result.descriptor.version, result.source_kind
    );
    if let Some(path) = &result.descriptor.path {
        println!("  Path: {}", path.display());
    }
    if !result.validated {
        println!("  ⚠ No plugin type found in the installed files; loading may fail");
    }
}

async fn remove(manager: &PluginManager, name: &str, yes: bool) -> Result<()> {
    if manager.info(name).is_none() {
        return Err(RemoveError::NotInstalled(name.to_string()).into());
    }

    let confirmed = yes || confirm(&format!("Remove plugin '{}'?", name))?;
    if !confirmed {
        println!("Removal cancelled.");
        return Ok(());
    }

    let result = manager.remove(name, true).await?;
    println!("✓ Removed {} ({})", result.name, result.source_kind);
    Ok(())
}

/// y/N 확인 (기본값 N)
fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn list(manager: &PluginManager, detailed: bool) {
    let plugins = manager.list();
    if plugins.is_empty() {
        println!("No plugins installed.");
        println!("Use 'onecode plugin install <source>' to install one.");
        return;
    }

    println!("\n📦 Installed Plugins\n");
    println!("{:<24} {:<8} {:<12} {:<10}", "Name", "Source", "Version", "Status");
    println!("{}", "-".repeat(58));

    for plugin in &plugins {
        let status = match plugin.status {
            PluginState::Installed => "✓ installed",
            PluginState::Missing => "✗ missing",
        };
        println!(
            "{:<24} {:<8} {:<12} {:<10}",
            plugin.name, plugin.source, plugin.version, status
        );
        if detailed {
            println!("  origin: {}", plugin.origin);
            if let Some(path) = &plugin.path {
                println!("  path:   {}", path.display());
            }
        }
    }

    let missing = plugins
        .iter()
        .filter(|p| p.status == PluginState::Missing)
        .count();
    if missing > 0 {
        println!(
            "\n{} plugin(s) missing on disk. Run 'onecode plugin refresh' to update the registry.",
            missing
        );
    }
    println!();
}

fn info(manager: &PluginManager, name: &str) -> Result<()> {
    let descriptor = manager
        .info(name)
        .ok_or_else(|| anyhow!("Plugin '{}' is not installed", name))?;

    println!("Name:     {}", descriptor.name);
    println!("Source:   {}", descriptor.source);
    println!("Origin:   {}", descriptor.origin());
    println!("Version:  {}", descriptor.version);
    println!("Status:   {}", descriptor.status);
    if let Some(path) = &descriptor.path {
        println!("Path:     {}", path.display());
    }
    if let Some(package) = &descriptor.package {
        println!("Package:  {}", package);
    }
    Ok(())
}

fn refresh(manager: &PluginManager) -> Result<()> {
    if manager.refresh()? {
        println!("✓ Plugin registry updated.");
    } else {
        println!("Plugin registry is already up to date.");
    }
    Ok(())
}

// ============================================================================
// onecode plugins / onecode run
// ============================================================================

pub async fn show_active_plugins(manager: &PluginManager) -> Result<()> {
    let mut loader = manager.loader();
    let active = loader.load_all(manager.plugins_dir()).await;

    if active.is_empty() {
        println!("No active plugins in {}.", manager.plugins_dir().display());
        return Ok(());
    }

    let mut plugins: Vec<&Arc<dyn Plugin>> = active.values().collect();
    plugins.sort_by(|a, b| a.name().cmp(b.name()));

    println!("\n🔌 Active Plugins\n");
    for plugin in plugins {
        println!("{} v{}", plugin.name(), plugin.version());
        if !plugin.description().is_empty() {
            println!("  {}", plugin.description());
        }
        let commands: Vec<String> = plugin.commands().into_keys().collect();
        println!("  commands: {}", commands.join(", "));
    }

    for (name, missing) in loader.missing_dependencies() {
        println!("\n⚠ {} is missing dependencies: {}", name, missing.join(", "));
    }
    println!();

    loader.shutdown().await;
    Ok(())
}

pub async fn run_plugin_handler(manager: &PluginManager, command: &str, args: &[String]) -> Result<()> {
    let mut loader = manager.loader();
    let active = loader.load_all(manager.plugins_dir()).await;

    let mut providers: Vec<(String, _)> = active
        .values()
        .filter_map(|plugin| {
            plugin
                .commands()
                .remove(command)
                .map(|handler| (plugin.name().to_string(), handler))
        })
        .collect();
    providers.sort_by(|a, b| a.0.cmp(&b.0));

    let outcome = match providers.as_slice() {
        [] => Err(anyhow!("Unknown command '{}'", command)),
        [(_, handler)] => handler(args).map_err(|e| anyhow!("{}: {}", command, e)),
        many => {
            let owners: Vec<&str> = many.iter().map(|(name, _)| name.as_str()).collect();
            Err(anyhow!(
                "Command '{}' is provided by several plugins: {}",
                command,
                owners.join(", ")
            ))
        }
    };

    loader.shutdown().await;

    let output = outcome?;
    println!("{}", output);
    Ok(())
}
