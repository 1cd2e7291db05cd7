//! onecode-core: Plugin subsystem for OneCodePlant
//!
//! Layer2 - 플러그인 레이어
//!
//! # 주요 모듈
//!
//! - `plugin`: 계약, 카탈로그, 레지스트리, 발견/로더, 설치기, 매니저, 번들 플러그인
//!
//! # 사용 예시
//!
//! ```ignore
//! use onecode_core::{PluginCatalog, PluginManager};
//!
//! let manager = PluginManager::from_settings(&config.plugins, Arc::new(PluginCatalog::builtin()))?;
//! let result = manager.install("user/ros-tools", false).await?;
//! println!("Installed {} ({})", result.name, result.source_kind);
//! ```

pub mod plugin;

// Re-exports: Plugin
pub use plugin::{
    // Contract
    handler,
    CommandError,
    CommandHandler,
    CommandMap,
    Plugin,
    PluginInitError,
    PluginMetadata,
    PluginStatus,
    // Catalog / discovery / loading
    Candidate,
    PluginCatalog,
    PluginDiscovery,
    PluginLoader,
    PluginManifest,
    // Registry
    PluginDescriptor,
    PluginRegistry,
    PluginState,
    SourceKind,
    // Installation
    ExternalTool,
    InstallResult,
    InstallerConfig,
    PluginInstaller,
    PluginSource,
    RemoveResult,
    SourceResolver,
    // Manager
    PluginInfo,
    PluginManager,
    // Errors
    DiscoveryError,
    InstallError,
    LoadError,
    RegistryError,
    RemoveError,
    ToolError,
};

// Layer1 re-exports
pub use onecode_foundation::{Error, Result};

/// Layer2 버전
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
