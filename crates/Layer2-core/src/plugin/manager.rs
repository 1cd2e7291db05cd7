//! Plugin Manager - 설치/제거/조회 퍼사드
//!
//! Registry + Installer를 묶어 `install`, `remove`, `list`, `info`, `refresh`를 제공한다.
//! 런타임 활성화는 `loader()`로 얻은 `PluginLoader`가 담당한다.

use super::catalog::PluginCatalog;
use super::error::{InstallError, RegistryError, RemoveError};
use super::installer::{InstallResult, InstallerConfig, PluginInstaller, RemoveResult};
use super::loader::PluginLoader;
use super::registry::{PluginDescriptor, PluginRegistry, PluginState, SourceKind};
use super::source::SourceResolver;
use onecode_foundation::PluginSettings;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

// ============================================================================
// PluginInfo - 목록 항목
// ============================================================================

/// `list()` 항목 - 기록된 상태 대신 현재 디스크 상태를 보여준다
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginInfo {
    pub name: String,
    pub source: SourceKind,
    pub origin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub version: String,
    pub status: PluginState,
}

impl From<&PluginDescriptor> for PluginInfo {
    fn from(descriptor: &PluginDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            source: descriptor.source,
            origin: descriptor.origin(),
            path: descriptor.path.clone(),
            version: descriptor.version.clone(),
            status: descriptor.live_status(),
        }
    }
}

// ============================================================================
// PluginManager
// ============================================================================

/// 플러그인 매니저
pub struct PluginManager {
    registry: Arc<PluginRegistry>,
    catalog: Arc<PluginCatalog>,
    installer: PluginInstaller,
}

impl PluginManager {
    /// 이미 로드된 레지스트리로 생성
    pub fn new(registry: Arc<PluginRegistry>, catalog: Arc<PluginCatalog>) -> Self {
        let installer = PluginInstaller::new(Arc::clone(&registry), Arc::clone(&catalog));
        Self {
            registry,
            catalog,
            installer,
        }
    }

    /// 설정의 경로로 레지스트리를 열고 외부 도구 설정을 적용
    pub fn from_settings(
        settings: &PluginSettings,
        catalog: Arc<PluginCatalog>,
    ) -> onecode_foundation::Result<Self> {
        let registry = PluginRegistry::open(settings.registry_file(), settings.plugins_dir())?;
        let config = InstallerConfig::from_settings(settings)?;
        Ok(Self::new(Arc::new(registry), catalog).with_installer_config(config))
    }

    pub fn with_installer_config(mut self, config: InstallerConfig) -> Self {
        self.installer = self.installer.with_config(config);
        self
    }

    pub fn with_resolver(mut self, resolver: SourceResolver) -> Self {
        self.installer = self.installer.with_resolver(resolver);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.installer = self.installer.with_cancellation(cancel);
        self
    }

    // ========================================================================
    // 동작
    // ========================================================================

    pub async fn install(&self, source: &str, force: bool) -> Result<InstallResult, InstallError> {
        self.installer.install(source, force).await
    }

    pub async fn remove(&self, name: &str, confirmed: bool) -> Result<RemoveResult, RemoveError> {
        self.installer.remove(name, confirmed).await
    }

    /// 이름 순 목록 (상태는 현재 디스크 기준)
    pub fn list(&self) -> Vec<PluginInfo> {
        self.registry.list().iter().map(PluginInfo::from).collect()
    }

    /// 기록된 그대로의 항목
    pub fn info(&self, name: &str) -> Option<PluginDescriptor> {
        self.registry.get(name)
    }

    pub fn refresh(&self) -> Result<bool, RegistryError> {
        let changed = self.registry.refresh()?;
        if !changed {
            info!("Plugin registry is up to date");
        }
        Ok(changed)
    }

    // ========================================================================
    // 접근자
    // ========================================================================

    /// 이 매니저의 레지스트리에 자동 등록하는 로더
    pub fn loader(&self) -> PluginLoader {
        PluginLoader::new(Arc::clone(&self.catalog)).with_registry(Arc::clone(&self.registry))
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn catalog(&self) -> &Arc<PluginCatalog> {
        &self.catalog
    }

    pub fn plugins_dir(&self) -> &Path {
        self.registry.plugins_dir()
    }
}
