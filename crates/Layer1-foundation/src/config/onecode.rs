//! OneCode Config - 통합 설정
//!
//! 글로벌(`~/.config/onecode/config.json`) → 프로젝트(`.onecode/config.json`)
//! → 환경 변수 순으로 덮어쓴다.

use crate::storage::JsonStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// 설정 파일명
pub const ONECODE_CONFIG_FILE: &str = "config.json";

/// 외부 도구(git, pip) 기본 타임아웃
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 300;

// ============================================================================
// OneCode Config (통합)
// ============================================================================

/// OneCodePlant 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OneCodeConfig {
    /// 버전 (마이그레이션용)
    #[serde(default = "default_version")]
    pub version: u32,

    /// 플러그인 설정
    #[serde(default)]
    pub plugins: PluginSettings,

    /// 로깅 설정
    #[serde(default)]
    pub logging: LogSettings,
}

impl OneCodeConfig {
    pub fn new() -> Self {
        Self {
            version: default_version(),
            ..Default::default()
        }
    }

    // ========================================================================
    // Load
    // ========================================================================

    /// 글로벌 + 프로젝트 + 환경 변수 병합 로드
    pub fn load() -> Result<Self> {
        let mut config = Self::new();

        if let Ok(global) = JsonStore::global() {
            if let Some(global_config) = global.load_optional::<OneCodeConfig>(ONECODE_CONFIG_FILE)? {
                debug!("Loaded global config from {}", global.base_dir().display());
                config.merge(global_config);
            }
        }

        if let Ok(project) = JsonStore::current_project() {
            if let Some(project_config) =
                project.load_optional::<OneCodeConfig>(ONECODE_CONFIG_FILE)?
            {
                debug!("Loaded project config from {}", project.base_dir().display());
                config.merge(project_config);
            }
        }

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// 환경 변수 적용
    ///
    /// 조회 함수를 주입받아 테스트에서 프로세스 환경을 건드리지 않는다.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(dir) = lookup("ONECODE_PLUGINS_DIR") {
            self.plugins.plugins_dir = Some(PathBuf::from(dir));
        }
        if let Some(file) = lookup("ONECODE_REGISTRY_FILE") {
            self.plugins.registry_file = Some(PathBuf::from(file));
        }
        if let Some(git) = lookup("ONECODE_GIT") {
            self.plugins.git_command = git;
        }
        if let Some(pip) = lookup("ONECODE_PIP") {
            self.plugins.pip_command = pip;
        }
        if let Some(secs) = lookup("ONECODE_TOOL_TIMEOUT_SECS") {
            self.plugins.tool_timeout_secs = secs.trim().parse().map_err(|_| {
                Error::Config(format!("ONECODE_TOOL_TIMEOUT_SECS is not a number: {}", secs))
            })?;
        }
        if let Some(level) = lookup("ONECODE_LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }
        if let Some(dir) = lookup("ONECODE_LOG_DIR") {
            self.logging.dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    // ========================================================================
    // Merge
    // ========================================================================

    /// 다른 설정과 병합 (other가 우선)
    pub fn merge(&mut self, other: OneCodeConfig) {
        self.plugins.merge(other.plugins);
        self.logging.merge(other.logging);
    }
}

// ============================================================================
// Plugin Settings
// ============================================================================

/// 플러그인 관련 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSettings {
    /// 관리되는 플러그인 루트 디렉토리
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugins_dir: Option<PathBuf>,

    /// 플러그인 레지스트리 파일
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_file: Option<PathBuf>,

    /// git 명령어 (셸 문법으로 분리)
    #[serde(default = "default_git_command")]
    pub git_command: String,

    /// 패키지 설치기 명령어 (셸 문법으로 분리)
    #[serde(default = "default_pip_command")]
    pub pip_command: String,

    /// 외부 도구 타임아웃 (초)
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            plugins_dir: None,
            registry_file: None,
            git_command: default_git_command(),
            pip_command: default_pip_command(),
            tool_timeout_secs: default_tool_timeout(),
        }
    }
}

impl PluginSettings {
    fn merge(&mut self, other: PluginSettings) {
        if other.plugins_dir.is_some() {
            self.plugins_dir = other.plugins_dir;
        }
        if other.registry_file.is_some() {
            self.registry_file = other.registry_file;
        }
        if other.git_command != default_git_command() {
            self.git_command = other.git_command;
        }
        if other.pip_command != default_pip_command() {
            self.pip_command = other.pip_command;
        }
        if other.tool_timeout_secs != default_tool_timeout() {
            self.tool_timeout_secs = other.tool_timeout_secs;
        }
    }

    /// 플러그인 루트 (기본: ~/.onecode/plugins)
    pub fn plugins_dir(&self) -> PathBuf {
        self.plugins_dir
            .clone()
            .unwrap_or_else(|| onecode_home().join("plugins"))
    }

    /// 레지스트리 파일 (기본: ~/.onecode/plugin_registry.json)
    pub fn registry_file(&self) -> PathBuf {
        self.registry_file
            .clone()
            .unwrap_or_else(|| onecode_home().join("plugin_registry.json"))
    }

    /// git 명령어 argv
    pub fn git_argv(&self) -> Result<Vec<String>> {
        split_command("gitCommand", &self.git_command)
    }

    /// 패키지 설치기 argv
    pub fn pip_argv(&self) -> Result<Vec<String>> {
        split_command("pipCommand", &self.pip_command)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

// ============================================================================
// Log Settings
// ============================================================================

/// 로깅 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogSettings {
    /// 기본 로그 레벨 (RUST_LOG가 우선)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 로그 디렉토리
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

impl LogSettings {
    fn merge(&mut self, other: LogSettings) {
        if other.level != default_log_level() {
            self.level = other.level;
        }
        if other.dir.is_some() {
            self.dir = other.dir;
        }
    }

    /// 로그 디렉토리 (기본: ~/.onecode/logs)
    pub fn log_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| onecode_home().join("logs"))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn onecode_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".onecode")
}

fn split_command(field: &str, command: &str) -> Result<Vec<String>> {
    match shlex::split(command) {
        Some(argv) if !argv.is_empty() => Ok(argv),
        _ => Err(Error::Config(format!(
            "{} is not a valid command line: {:?}",
            field, command
        ))),
    }
}

fn default_version() -> u32 {
    1
}

fn default_git_command() -> String {
    "git".to_string()
}

fn default_pip_command() -> String {
    "python3 -m pip".to_string()
}

fn default_tool_timeout() -> u64 {
    DEFAULT_TOOL_TIMEOUT_SECS
}

fn default_log_level() -> String {
    "info".to_string()
}
