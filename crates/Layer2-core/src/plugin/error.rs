//! Plugin errors - 플러그인 서브시스템 에러 분류
//!
//! - `DiscoveryError`: 루트 디렉토리를 읽을 수 없음 (탐색 패스만 실패)
//! - `LoadError`: 후보 하나의 로드 실패 (형제 후보에 영향 없음)
//! - `InstallError` / `RemoveError`: 단일 install/remove 호출 실패
//! - `RegistryError`: 레지스트리 파일 I/O
//! - `ToolError`: 외부 도구(git, pip) 실행 실패

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Discovery
// ============================================================================

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Cannot read plugin directory {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// Loader
// ============================================================================

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("No plugin entry point in {}", .path.display())]
    ModuleNotFound { path: PathBuf },

    #[error("Failed to load {}: {reason}", .path.display())]
    ImportFailure { path: PathBuf, reason: String },

    #[error("No type implementing the plugin contract is exported by {}", .path.display())]
    NoConformingClass { path: PathBuf },

    #[error("Plugin '{name}' failed to initialize: {reason}")]
    InitializationFailed { name: String, reason: String },
}

// ============================================================================
// Registry
// ============================================================================

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Plugin '{0}' is not in the registry")]
    NotFound(String),

    #[error("Registry I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Registry serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] onecode_foundation::Error),
}

// ============================================================================
// External tools
// ============================================================================

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("'{program}' was not found on PATH")]
    Unavailable { program: String },

    #[error("'{program}' did not finish within {}s", .timeout.as_secs())]
    Timeout { program: String, timeout: Duration },

    #[error("'{program}' was cancelled")]
    Cancelled { program: String },

    #[error("Failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// Install / Remove
// ============================================================================

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("Local path does not exist: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Failed to fetch {url}: {stderr}")]
    FetchFailed { url: String, stderr: String },

    #[error("Package installation failed for '{package}': {stderr}")]
    PackageInstallFailed { package: String, stderr: String },

    #[error("Plugin '{0}' is already installed. Use --force to reinstall")]
    AlreadyInstalled(String),

    #[error("Cannot derive a plugin name from '{0}'")]
    InvalidSource(String),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Install I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Error)]
pub enum RemoveError {
    #[error("Removing '{0}' requires confirmation")]
    ConfirmationRequired(String),

    #[error("Plugin '{0}' is not installed")]
    NotInstalled(String),

    #[error("Failed to uninstall package '{package}': {stderr}")]
    UninstallFailed { package: String, stderr: String },

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Remove I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

// ============================================================================
// Plugin-side errors
// ============================================================================

/// `Plugin::initialize` 실패
#[derive(Debug, Error)]
#[error("{0}")]
pub struct PluginInitError(pub String);

/// 명령 핸들러 실패
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CommandError(pub String);

impl From<&str> for CommandError {
    fn from(s: &str) -> Self {
        CommandError(s.to_string())
    }
}

impl From<String> for CommandError {
    fn from(s: String) -> Self {
        CommandError(s)
    }
}

// ============================================================================
// Foundation 변환
// ============================================================================

macro_rules! into_foundation {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for onecode_foundation::Error {
                fn from(e: $ty) -> Self {
                    onecode_foundation::Error::Plugin(e.to_string())
                }
            }
        )*
    };
}

into_foundation!(DiscoveryError, LoadError, RegistryError, InstallError, RemoveError, ToolError);
