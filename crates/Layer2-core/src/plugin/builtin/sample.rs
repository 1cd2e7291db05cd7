//! Sample plugin - 플러그인 구조 시연/테스트용

use super::with_args;
use crate::plugin::error::PluginInitError;
use crate::plugin::traits::{handler, CommandMap, Plugin};
use async_trait::async_trait;
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

const NAME: &str = "sample_plugin";
const VERSION: &str = "1.0.0";
const DESCRIPTION: &str = "Sample plugin for demonstration and testing";
const DEFAULT_MESSAGE: &str = "Hello from Sample Plugin!";

/// sample 명령 인자
#[derive(Parser, Debug)]
#[command(name = "sample", about = "Show a sample message")]
struct SampleArgs {
    /// Message to print
    #[arg(short, long, default_value = DEFAULT_MESSAGE)]
    message: String,
}

/// greet 명령 인자
#[derive(Parser, Debug)]
#[command(name = "greet", about = "Greet someone")]
struct GreetArgs {
    /// Name to greet
    name: String,
}

pub struct SamplePlugin {
    initialized: AtomicBool,
}

impl SamplePlugin {
    pub fn new() -> Self {
        Self {
            initialized: AtomicBool::new(false),
        }
    }
}

impl Default for SamplePlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for SamplePlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn version(&self) -> &str {
        VERSION
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn author(&self) -> &str {
        "OneCodePlant Team"
    }

    async fn initialize(&self) -> Result<bool, PluginInitError> {
        if !self.initialized.swap(true, Ordering::SeqCst) {
            debug!("{} initialized", NAME);
        }
        Ok(true)
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn commands(&self) -> CommandMap {
        let mut commands = CommandMap::new();

        commands.insert(
            "sample".to_string(),
            handler(|args| {
                with_args("sample", args, |parsed: SampleArgs| {
                    Ok(format!(
                        "{}\nPlugin: {} v{}\n{}",
                        parsed.message, NAME, VERSION, DESCRIPTION
                    ))
                })
            }),
        );

        commands.insert(
            "greet".to_string(),
            handler(|args| {
                with_args("greet", args, |parsed: GreetArgs| {
                    Ok(format!(
                        "Hello, {}! Welcome to OneCodePlant!\nReady to build amazing robotics applications?",
                        parsed.name
                    ))
                })
            }),
        );

        commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let plugin = SamplePlugin::new();
        assert!(!plugin.is_initialized());

        assert!(plugin.initialize().await.unwrap());
        assert!(plugin.initialize().await.unwrap());
        assert!(plugin.is_initialized());
    }

    #[test]
    fn test_sample_command() {
        let commands = SamplePlugin::new().commands();
        let sample = commands.get("sample").unwrap();

        let output = sample(&[]).unwrap();
        assert!(output.starts_with(DEFAULT_MESSAGE));
        assert!(output.contains("sample_plugin v1.0.0"));

        let output = sample(&["-m".into(), "Custom".into()]).unwrap();
        assert!(output.starts_with("Custom"));

        let output = sample(&["--message=Inline".into()]).unwrap();
        assert!(output.starts_with("Inline"));
    }

    #[test]
    fn test_sample_rejects_unknown_and_incomplete_options() {
        let commands = SamplePlugin::new().commands();
        let sample = commands.get("sample").unwrap();

        assert!(sample(&["--bogus".into()]).is_err());
        assert!(sample(&["--message".into()]).is_err());
    }

    #[test]
    fn test_help_is_output() {
        let commands = SamplePlugin::new().commands();
        let help = commands.get("greet").unwrap()(&["--help".into()]).unwrap();
        assert!(help.contains("Usage: greet"));
    }

    #[test]
    fn test_greet_requires_name() {
        let commands = SamplePlugin::new().commands();
        let greet = commands.get("greet").unwrap();

        assert!(greet(&[]).is_err());
        assert!(greet(&["Alice".into()]).unwrap().contains("Hello, Alice!"));
    }
}
