//! # Plugin System
//!
//! OneCodePlant 확장 플러그인 시스템
//!
//! ## 개요
//!
//! - 플러그인은 바이너리에 함께 빌드되며 `PluginCatalog`에 타입 이름으로 등록된다
//! - 관리 디렉토리의 각 플러그인은 엔트리포인트 파일(`plugin.json`/`plugin.toml`)로
//!   자신이 내보내는 타입을 선언한다
//! - 설치 기록은 `plugin_registry.json`에 남는다
//!
//! ## 아키텍처
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       PluginManager                          │
//! │   install / remove / list / info / refresh                   │
//! │  ┌──────────────────────────┐   ┌──────────────────────────┐ │
//! │  │     PluginInstaller      │──▶│     PluginRegistry       │ │
//! │  │  SourceResolver          │   │  plugin_registry.json    │ │
//! │  │  ExternalTool (git, pip) │   └──────────────────────────┘ │
//! │  └──────────────────────────┘               ▲                │
//! └─────────────────────────────────────────────┼────────────────┘
//!                                               │ 자동 등록
//! ┌─────────────────┐    ┌──────────────────────┴───┐
//! │ PluginDiscovery │───▶│       PluginLoader       │──▶ 활성 플러그인
//! └─────────────────┘    │  PluginCatalog 조회       │
//!                        └──────────────────────────┘
//! ```
//!
//! ## 예시
//!
//! ```ignore
//! let catalog = Arc::new(PluginCatalog::builtin());
//! let manager = PluginManager::from_settings(&settings, catalog)?;
//!
//! manager.install("./sample_plugin", false).await?;
//!
//! let mut loader = manager.loader();
//! let active = loader.load_all(manager.plugins_dir()).await;
//! ```

pub mod builtin;
mod catalog;
mod discovery;
mod error;
mod installer;
mod loader;
mod manager;
mod manifest;
mod process;
mod registry;
mod source;
mod traits;

pub use catalog::{PluginCatalog, PluginConstructor, CONTRACT_TYPE};
pub use discovery::{Candidate, PluginDiscovery};
pub use error::{
    CommandError, DiscoveryError, InstallError, LoadError, PluginInitError, RegistryError,
    RemoveError, ToolError,
};
pub use installer::{InstallResult, InstallerConfig, PluginInstaller, RemoveResult};
pub use loader::PluginLoader;
pub use manager::{PluginInfo, PluginManager};
pub use manifest::{entry_point, PluginManifest, ENTRY_POINTS};
pub use process::{ExternalTool, ToolOutput};
pub use registry::{
    PluginDescriptor, PluginRegistry, PluginState, SourceKind, SCHEMA_KEY, SCHEMA_VERSION,
};
pub use source::{PluginSource, SourceResolver};
pub use traits::{handler, CommandHandler, CommandMap, Plugin, PluginMetadata, PluginStatus};
