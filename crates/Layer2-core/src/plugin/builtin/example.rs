//! Example plugin - 플러그인 개발 템플릿
//!
//! 설정 관리(`config`), 상태 조회(`status`), 인사(`hello`) 명령을 제공한다.

use super::with_args;
use crate::plugin::error::{CommandError, PluginInitError};
use crate::plugin::traits::{handler, CommandMap, Plugin};
use async_trait::async_trait;
use clap::{CommandFactory, Parser};
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

const NAME: &str = "example_plugin";
const VERSION: &str = "1.0.0";

type ConfigMap = Arc<RwLock<BTreeMap<String, Value>>>;

// ============================================================================
// 명령 인자
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "hello", about = "Say hello")]
struct HelloArgs {
    /// Name to greet
    #[arg(short, long, default_value = "World")]
    name: String,

    /// Use uppercase greeting
    #[arg(short, long)]
    uppercase: bool,
}

#[derive(Parser, Debug)]
#[command(name = "config", about = "Manage plugin configuration")]
struct ConfigArgs {
    /// Show current configuration
    #[arg(short, long)]
    show: bool,

    /// Set configuration value
    #[arg(
        short = 'S',
        long,
        num_args = 2,
        value_names = ["KEY", "VALUE"],
        allow_hyphen_values = true
    )]
    set: Option<Vec<String>>,
}

#[derive(Parser, Debug)]
#[command(name = "status", about = "Show plugin status")]
struct StatusArgs {
    /// Show detailed status
    #[arg(short, long)]
    verbose: bool,
}

pub struct ExamplePlugin {
    config: ConfigMap,
    initialized: AtomicBool,
}

impl ExamplePlugin {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(BTreeMap::new())),
            initialized: AtomicBool::new(false),
        }
    }

    /// 기존 값을 덮어쓰지 않고 기본 설정을 채운다
    fn merge_default_config(&self) {
        let defaults = [
            ("greeting", json!("Hello from OneCodePlant!")),
            ("max_retries", json!(3)),
            ("timeout", json!(30)),
            ("debug_mode", json!(false)),
        ];

        let mut config = self.config.write();
        for (key, value) in defaults {
            config.entry(key.to_string()).or_insert(value);
        }
    }

    pub fn config_value(&self, key: &str) -> Option<Value> {
        self.config.read().get(key).cloned()
    }
}

impl Default for ExamplePlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for ExamplePlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn version(&self) -> &str {
        VERSION
    }

    fn description(&self) -> &str {
        "Example plugin for OneCodePlant development"
    }

    async fn initialize(&self) -> Result<bool, PluginInitError> {
        info!("Initializing {} plugin", NAME);
        self.merge_default_config();
        self.initialized.store(true, Ordering::SeqCst);
        Ok(true)
    }

    async fn cleanup(&self) {
        info!("Cleaning up {} plugin", NAME);
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn commands(&self) -> CommandMap {
        let mut commands = CommandMap::new();

        let config = self.config.clone();
        commands.insert(
            "hello".to_string(),
            handler(move |args| {
                with_args("hello", args, |parsed: HelloArgs| {
                    let greeting = config
                        .read()
                        .get("greeting")
                        .and_then(Value::as_str)
                        .unwrap_or("Hello from OneCodePlant!")
                        .to_string();

                    let mut message = format!("{} Nice to meet you, {}!", greeting, parsed.name);
                    if parsed.uppercase {
                        message = message.to_uppercase();
                    }
                    info!("Greeted user: {}", parsed.name);
                    Ok(message)
                })
            }),
        );

        let config = self.config.clone();
        commands.insert(
            "config".to_string(),
            handler(move |args| {
                with_args("config", args, |parsed| config_command(&config, parsed))
            }),
        );

        let config = self.config.clone();
        let dependencies = self.dependencies();
        commands.insert(
            "status".to_string(),
            handler(move |args| {
                with_args("status", args, |parsed: StatusArgs| {
                    // 자기 자신의 명령 수 (hello, config, status)
                    let mut lines = vec![
                        format!("Plugin: {} v{}", NAME, VERSION),
                        "Status: Active".to_string(),
                        "Commands available: 3".to_string(),
                    ];
                    if parsed.verbose {
                        lines.push(format!("Configuration items: {}", config.read().len()));
                        lines.push("Available commands:".to_string());
                        for name in ["config", "hello", "status"] {
                            lines.push(format!("  - {}", name));
                        }
                        if !dependencies.is_empty() {
                            lines.push("Dependencies:".to_string());
                            lines.extend(dependencies.iter().map(|dep| format!("  - {}", dep)));
                        }
                    }
                    Ok(lines.join("\n"))
                })
            }),
        );

        commands
    }
}

fn config_command(config: &ConfigMap, args: ConfigArgs) -> Result<String, CommandError> {
    if args.show {
        let config = config.read();
        let mut lines = vec!["Current configuration:".to_string()];
        lines.extend(config.iter().map(|(key, value)| format!("  {}: {}", key, value)));
        return Ok(lines.join("\n"));
    }

    match args.set.as_deref() {
        Some([key, raw]) => {
            let value = parse_config_value(raw);
            info!("Configuration updated: {} = {}", key, value);
            config.write().insert(key.clone(), value.clone());
            Ok(format!("Set {} = {}", key, value))
        }
        Some(_) => Err(CommandError::from("usage: config --set KEY VALUE")),
        None => Ok(ConfigArgs::command().render_help().to_string().trim_end().to_string()),
    }
}

/// bool → 정수 → 실수 → 문자열 순으로 해석
fn parse_config_value(raw: &str) -> Value {
    match raw.to_lowercase().as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(n) = raw.parse::<i64>() {
        return json!(n);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return json!(f);
    }
    Value::String(raw.to_string())
}
