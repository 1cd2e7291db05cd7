//! Plugin Installer - 소스별 플러그인 설치/제거
//!
//! - Local: 관리 디렉토리로 복사 (기존 사본은 백업 후 교체)
//! - Remote: 임시 디렉토리에 git clone 후 관리 디렉토리로 이동
//! - Package: 외부 패키지 설치기(pip) 호출
//!
//! 설치가 끝나면 레지스트리에 기록한다. 실패한 호출은 레지스트리를 바꾸지 않는다.

use super::catalog::PluginCatalog;
use super::error::{InstallError, RemoveError};
use super::manifest::{PluginManifest, ENTRY_POINTS};
use super::process::ExternalTool;
use super::registry::{PluginDescriptor, PluginRegistry, SourceKind};
use super::source::{PluginSource, SourceResolver};
use onecode_foundation::{PluginSettings, DEFAULT_TOOL_TIMEOUT_SECS};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const UNKNOWN_VERSION: &str = "unknown";

// ============================================================================
// InstallerConfig - 외부 도구 설정
// ============================================================================

/// 외부 도구와 타임아웃
#[derive(Debug, Clone)]
pub struct InstallerConfig {
    pub git: ExternalTool,
    pub pip: ExternalTool,
    pub timeout: Duration,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            git: ExternalTool::new("git"),
            pip: ExternalTool::new("python3").with_args(["-m", "pip"]),
            timeout: Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS),
        }
    }
}

impl InstallerConfig {
    /// 통합 설정의 플러그인 섹션에서 생성
    pub fn from_settings(settings: &PluginSettings) -> onecode_foundation::Result<Self> {
        let tool = |argv: Vec<String>, field: &str| {
            ExternalTool::from_argv(argv).ok_or_else(|| {
                onecode_foundation::Error::Config(format!("{} must not be empty", field))
            })
        };

        Ok(Self {
            git: tool(settings.git_argv()?, "gitCommand")?,
            pip: tool(settings.pip_argv()?, "pipCommand")?,
            timeout: settings.tool_timeout(),
        })
    }
}

// ============================================================================
// 결과 타입
// ============================================================================

/// 설치 결과
#[derive(Debug, Clone)]
pub struct InstallResult {
    pub name: String,
    pub source_kind: SourceKind,
    pub descriptor: PluginDescriptor,
    /// 설치된 트리에서 계약 구현 타입을 찾았는지 (경고용)
    pub validated: bool,
}

/// 제거 결과
#[derive(Debug, Clone)]
pub struct RemoveResult {
    pub name: String,
    pub source_kind: SourceKind,
    pub descriptor: PluginDescriptor,
}

// ============================================================================
// PluginInstaller
// ============================================================================

/// 플러그인 설치기
pub struct PluginInstaller {
    registry: Arc<PluginRegistry>,
    catalog: Arc<PluginCatalog>,
    resolver: SourceResolver,
    config: InstallerConfig,
    cancel: CancellationToken,
}

impl PluginInstaller {
    /// 현재 디렉토리 기준으로 상대 경로를 해석하는 설치기
    pub fn new(registry: Arc<PluginRegistry>, catalog: Arc<PluginCatalog>) -> Self {
        let resolver = SourceResolver::current().unwrap_or_else(|_| SourceResolver::new("."));
        Self {
            registry,
            catalog,
            resolver,
            config: InstallerConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_resolver(mut self, resolver: SourceResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_config(mut self, config: InstallerConfig) -> Self {
        self.config = config;
        self
    }

    /// 외부 도구 실행을 중단시킬 토큰
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn resolver(&self) -> &SourceResolver {
        &self.resolver
    }

    fn plugins_dir(&self) -> &Path {
        self.registry.plugins_dir()
    }

    // ========================================================================
    // 설치
    // ========================================================================

    /// 소스 문자열에서 설치
    pub async fn install(&self, source: &str, force: bool) -> Result<InstallResult, InstallError> {
        let resolved = self.resolver.resolve(source);
        let name = resolved.plugin_name()?;

        if !force && self.registry.contains(&name) {
            return Err(InstallError::AlreadyInstalled(name));
        }

        info!("Installing plugin {} from {} ({})", name, resolved, resolved.kind());

        let (descriptor, validated, placed) = match &resolved {
            PluginSource::Local(path) => self.install_local(&name, path).await?,
            PluginSource::Remote(url) => self.install_remote(&name, url).await?,
            PluginSource::Package(package) => {
                (self.install_package(&name, package).await?, true, None)
            }
        };

        // 레지스트리 기록이 실패하면 배치한 트리를 되돌린다
        if let Err(e) = self.registry.upsert(descriptor.clone()) {
            match placed {
                Some(placed) => placed.rollback().await,
                None if resolved.kind() == SourceKind::PackageIndex => warn!(
                    "Package {} stays installed but could not be recorded",
                    name
                ),
                None => {}
            }
            return Err(e.into());
        }
        if let Some(placed) = placed {
            placed.commit().await;
        }
        info!("Installed plugin {} v{}", name, descriptor.version);

        Ok(InstallResult {
            name,
            source_kind: resolved.kind(),
            descriptor,
            validated,
        })
    }

    async fn install_local(&self, name: &str, source: &Path) -> Result<Installed, InstallError> {
        if !source.exists() {
            return Err(InstallError::SourceNotFound(source.to_path_buf()));
        }
        if !source.is_dir() {
            return Err(InstallError::InvalidSource(source.display().to_string()));
        }

        let target = self.plugins_dir().join(name);
        let source_real = source.canonicalize()?;
        let target_real = resolve_existing_prefix(&target)?;

        let placed = if source_real == target_real {
            debug!("{} is already in the plugin directory", source.display());
            None
        } else if target_real.starts_with(&source_real) {
            return Err(InstallError::InvalidSource(format!(
                "{} contains the plugin directory",
                source.display()
            )));
        } else {
            Some(PlacedTree::place(source, &target, Transfer::Copy).await?)
        };

        let validated = self.validate(&target);
        let descriptor = PluginDescriptor::local(name, &target, source)
            .with_version(installed_version(&target).await);
        Ok((descriptor, validated, placed))
    }

    async fn install_remote(&self, name: &str, url: &str) -> Result<Installed, InstallError> {
        fs::create_dir_all(self.plugins_dir()).await?;

        // 같은 파일시스템에 스테이징해 rename으로 옮긴다. `.` 접두사라 탐색에서 제외된다.
        let staging = tempfile::Builder::new()
            .prefix(".onecode-staging-")
            .tempdir_in(self.plugins_dir())?;
        let clone_dir = staging.path().join(name);

        let args = vec![
            "clone".to_string(),
            url.to_string(),
            clone_dir.display().to_string(),
        ];
        let output = self
            .config
            .git
            .run(&args, self.config.timeout, &self.cancel)
            .await?;

        if !output.success() {
            warn!("Failed to clone {}: {}", url, output.diagnostic());
            return Err(InstallError::FetchFailed {
                url: url.to_string(),
                stderr: output.diagnostic(),
            });
        }
        if !clone_dir.is_dir() {
            return Err(InstallError::FetchFailed {
                url: url.to_string(),
                stderr: format!("{} did not create {}", self.config.git, clone_dir.display()),
            });
        }

        let target = self.plugins_dir().join(name);
        let placed = PlacedTree::place(&clone_dir, &target, Transfer::Move).await?;

        let validated = self.validate(&target);
        let descriptor = PluginDescriptor::remote(name, &target, url)
            .with_version(installed_version(&target).await);
        Ok((descriptor, validated, Some(placed)))
    }

    async fn install_package(
        &self,
        name: &str,
        package: &str,
    ) -> Result<PluginDescriptor, InstallError> {
        let args = vec!["install".to_string(), package.to_string()];
        let output = self
            .config
            .pip
            .run(&args, self.config.timeout, &self.cancel)
            .await?;

        if !output.success() {
            warn!("Failed to install {}: {}", package, output.diagnostic());
            return Err(InstallError::PackageInstallFailed {
                package: package.to_string(),
                stderr: output.diagnostic(),
            });
        }

        let version = self.package_version(package).await;
        Ok(PluginDescriptor::package(name, package).with_version(version))
    }

    /// `<pip> show <package>`의 `Version:` 줄 (실패하면 "unknown")
    async fn package_version(&self, package: &str) -> String {
        let args = vec!["show".to_string(), package.to_string()];
        match self
            .config
            .pip
            .run(&args, self.config.timeout, &self.cancel)
            .await
        {
            Ok(output) if output.success() => {
                parse_show_version(&output.stdout).unwrap_or_else(|| UNKNOWN_VERSION.to_string())
            }
            Ok(output) => {
                debug!("Version lookup for {} failed: {}", package, output.diagnostic());
                UNKNOWN_VERSION.to_string()
            }
            Err(e) => {
                debug!("Version lookup for {} failed: {}", package, e);
                UNKNOWN_VERSION.to_string()
            }
        }
    }

    // ========================================================================
    // 검증 (권고)
    // ========================================================================

    /// 설치된 트리의 엔트리포인트 중 하나라도 카탈로그가 아는 타입을 내보내면 true
    ///
    /// 실패해도 설치는 진행된다. 실제 판정은 로더가 한다.
    pub fn validate(&self, dir: &Path) -> bool {
        let Some(root) = dir.to_str() else {
            warn!("Cannot validate non UTF-8 path {}", dir.display());
            return false;
        };
        let root = glob::Pattern::escape(root);

        for entry_point in ENTRY_POINTS {
            let pattern = format!("{}/**/{}", root, entry_point);
            let Ok(paths) = glob::glob(&pattern) else {
                continue;
            };
            for path in paths.flatten() {
                let Ok(content) = std::fs::read_to_string(&path) else {
                    continue;
                };
                match PluginManifest::parse(&path, &content) {
                    Ok(manifest) if self.catalog.first_conforming(&manifest.exports).is_some() => {
                        debug!("Validated plugin entry point {}", path.display());
                        return true;
                    }
                    Ok(_) => debug!("{} exports no known plugin type", path.display()),
                    Err(e) => debug!("{} is not a valid entry point: {}", path.display(), e),
                }
            }
        }

        warn!(
            "No plugin type found in {}; installed anyway, loading may fail",
            dir.display()
        );
        false
    }

    // ========================================================================
    // 제거
    // ========================================================================

    /// 플러그인 제거 (`confirmed`가 false면 항상 실패)
    pub async fn remove(&self, name: &str, confirmed: bool) -> Result<RemoveResult, RemoveError> {
        if !confirmed {
            return Err(RemoveError::ConfirmationRequired(name.to_string()));
        }

        let descriptor = self
            .registry
            .get(name)
            .ok_or_else(|| RemoveError::NotInstalled(name.to_string()))?;

        info!("Removing plugin {} ({})", name, descriptor.source);

        match descriptor.source {
            SourceKind::PackageIndex => {
                let package = descriptor.package.clone().unwrap_or_else(|| name.to_string());
                let args = vec!["uninstall".to_string(), "-y".to_string(), package.clone()];
                let output = self
                    .config
                    .pip
                    .run(&args, self.config.timeout, &self.cancel)
                    .await?;
                if !output.success() {
                    return Err(RemoveError::UninstallFailed {
                        package,
                        stderr: output.diagnostic(),
                    });
                }
            }
            SourceKind::Local | SourceKind::Remote => {
                if let Some(path) = descriptor.installed_path() {
                    self.remove_tree(path).await?;
                }
            }
        }

        self.registry.remove(name)?;
        info!("Removed plugin {}", name);

        Ok(RemoveResult {
            name: name.to_string(),
            source_kind: descriptor.source,
            descriptor,
        })
    }

    /// 관리 디렉토리 안의 경로만 삭제한다
    async fn remove_tree(&self, path: &Path) -> Result<(), RemoveError> {
        if !path.exists() {
            debug!("{} is already gone", path.display());
            return Ok(());
        }

        let inside = match (path.canonicalize(), self.plugins_dir().canonicalize()) {
            (Ok(path), Ok(root)) => path.starts_with(&root) && path != root,
            _ => false,
        };
        if !inside {
            warn!(
                "{} is outside the plugin directory; leaving files in place",
                path.display()
            );
            return Ok(());
        }

        fs::remove_dir_all(path).await?;
        debug!("Deleted {}", path.display());
        Ok(())
    }
}

// ============================================================================
// 파일 유틸리티
// ============================================================================

/// 디스크 작업이 끝난 설치: 기록할 descriptor, 검증 결과, 되돌릴 수 있는 트리
type Installed = (PluginDescriptor, bool, Option<PlacedTree>);

#[derive(Debug, Clone, Copy)]
enum Transfer {
    Copy,
    Move,
}

/// 관리 디렉토리에 배치된 트리
///
/// 기존 `target`은 백업해 두고, `commit`에서 백업을 지우거나 `rollback`에서 되돌린다.
#[derive(Debug)]
struct PlacedTree {
    target: PathBuf,
    backup: Option<PathBuf>,
}

impl PlacedTree {
    /// `src`를 `target`에 배치한다. 배치 자체가 실패하면 바로 되돌린다.
    async fn place(src: &Path, target: &Path, transfer: Transfer) -> std::io::Result<Self> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        let backup = if target.exists() {
            let backup = backup_path(target);
            fs::rename(target, &backup).await?;
            debug!("Backed up {} to {}", target.display(), backup.display());
            Some(backup)
        } else {
            None
        };

        let placed = Self {
            target: target.to_path_buf(),
            backup,
        };

        let result = match transfer {
            Transfer::Copy => copy_dir_recursive(src, target).await,
            Transfer::Move => move_dir(src, target).await,
        };
        match result {
            Ok(()) => Ok(placed),
            Err(e) => {
                placed.rollback().await;
                Err(e)
            }
        }
    }

    async fn commit(self) {
        if let Some(backup) = self.backup {
            if let Err(e) = fs::remove_dir_all(&backup).await {
                warn!("Failed to delete backup {}: {}", backup.display(), e);
            }
        }
    }

    async fn rollback(self) {
        if self.target.exists() {
            if let Err(e) = fs::remove_dir_all(&self.target).await {
                warn!("Failed to delete {}: {}", self.target.display(), e);
            }
        }
        if let Some(backup) = self.backup {
            match fs::rename(&backup, &self.target).await {
                Ok(()) => debug!("Restored {}", self.target.display()),
                Err(e) => warn!(
                    "Failed to restore {} from {}: {}",
                    self.target.display(),
                    backup.display(),
                    e
                ),
            }
        }
    }
}

fn backup_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.backup-{}", name, std::process::id()))
}

/// 존재하는 가장 가까운 조상을 canonicalize하고 나머지 구성요소를 붙인다
fn resolve_existing_prefix(path: &Path) -> std::io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut existing = absolute.as_path();
    let mut rest = Vec::new();
    loop {
        match existing.canonicalize() {
            Ok(mut real) => {
                real.extend(rest.iter().rev());
                return Ok(real);
            }
            Err(e) => match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    rest.push(name.to_os_string());
                    existing = parent;
                }
                _ => return Err(e),
            },
        }
    }
}

/// rename 실패 시 (다른 장치 등) 재귀 복사
async fn move_dir(src: &Path, target: &Path) -> std::io::Result<()> {
    match fs::rename(src, target).await {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!("rename {} failed ({}), copying instead", src.display(), e);
            copy_dir_recursive(src, target).await
        }
    }
}

/// 디렉토리 재귀 복사
async fn copy_dir_recursive(src: &Path, dest: &Path) -> std::io::Result<()> {
    if !dest.exists() {
        fs::create_dir_all(dest).await?;
    }

    let mut entries = fs::read_dir(src).await?;

    while let Some(entry) = entries.next_entry().await? {
        let src_path = entry.path();
        let dest_path = dest.join(entry.file_name());

        if src_path.is_dir() {
            Box::pin(copy_dir_recursive(&src_path, &dest_path)).await?;
        } else {
            fs::copy(&src_path, &dest_path).await?;
        }
    }

    Ok(())
}

/// 설치된 엔트리포인트의 version (없으면 "unknown")
async fn installed_version(dir: &Path) -> String {
    PluginManifest::read(dir)
        .await
        .ok()
        .and_then(|(_, manifest)| manifest.version)
        .unwrap_or_else(|| UNKNOWN_VERSION.to_string())
}

fn parse_show_version(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .find_map(|line| line.strip_prefix("Version:"))
        .map(|version| version.trim().to_string())
        .filter(|version| !version.is_empty())
}

// ============================================================================
// 테스트
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        temp: TempDir,
        installer: PluginInstaller,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_config(InstallerConfig::default())
        }

        fn with_config(config: InstallerConfig) -> Self {
            let temp = TempDir::new().unwrap();
            let registry = Arc::new(PluginRegistry::new(
                temp.path().join("plugin_registry.json"),
                temp.path().join("plugins"),
            ));
            registry.load().unwrap();

            let installer = PluginInstaller::new(registry, Arc::new(PluginCatalog::builtin()))
                .with_resolver(SourceResolver::new(temp.path().join("work")))
                .with_config(config);
            Self { temp, installer }
        }

        fn work_dir(&self) -> PathBuf {
            self.temp.path().join("work")
        }

        fn plugins_dir(&self) -> PathBuf {
            self.temp.path().join("plugins")
        }

        async fn make_source(&self, name: &str, entry: &str) -> PathBuf {
            let dir = self.work_dir().join(name);
            fs::create_dir_all(dir.join("data")).await.unwrap();
            fs::write(dir.join("plugin.json"), entry).await.unwrap();
            fs::write(dir.join("data").join("notes.txt"), "notes").await.unwrap();
            dir
        }

        /// 레지스트리 파일 자리를 비어 있지 않은 디렉토리로 바꿔 저장을 실패시킨다
        fn break_registry_file(&self) {
            let path = self.installer.registry().path().to_path_buf();
            std::fs::remove_file(&path).unwrap();
            std::fs::create_dir_all(path.join("blocker")).unwrap();
        }

        async fn plugin_dir_names(&self) -> Vec<String> {
            let mut entries = fs::read_dir(self.plugins_dir()).await.unwrap();
            let mut names = Vec::new();
            while let Some(entry) = entries.next_entry().await.unwrap() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
            names.sort();
            names
        }
    }

    #[tokio::test]
    async fn test_install_local_copies_tree() {
        let fx = Fixture::new();
        fx.make_source("sample_plugin", r#"{"version": "1.2.0", "exports": ["SamplePlugin"]}"#)
            .await;

        let result = fx.installer.install("./sample_plugin", false).await.unwrap();

        let target = fx.plugins_dir().join("sample_plugin");
        assert_eq!(result.name, "sample_plugin");
        assert_eq!(result.source_kind, SourceKind::Local);
        assert!(result.validated);
        assert_eq!(result.descriptor.path, Some(target.clone()));
        assert_eq!(result.descriptor.version, "1.2.0");
        assert!(target.join("data").join("notes.txt").exists());
        assert!(fx.installer.registry().contains("sample_plugin"));
    }

    #[tokio::test]
    async fn test_install_local_without_plugin_type_is_still_registered() {
        let fx = Fixture::new();
        fx.make_source("odd_plugin", r#"{"exports": ["NotAPlugin"]}"#).await;

        let result = fx.installer.install("./odd_plugin", false).await.unwrap();
        assert!(!result.validated);
        assert_eq!(result.descriptor.version, "unknown");
        assert!(fx.installer.registry().contains("odd_plugin"));
    }

    #[tokio::test]
    async fn test_install_missing_local_path() {
        let fx = Fixture::new();
        let result = fx.installer.install("./nowhere", false).await;

        assert!(matches!(result, Err(InstallError::SourceNotFound(_))));
        assert!(fx.installer.registry().is_empty());
    }

    #[tokio::test]
    async fn test_force_replaces_previous_copy() {
        let fx = Fixture::new();
        let source = fx
            .make_source("sample_plugin", r#"{"version": "1.0.0", "exports": ["SamplePlugin"]}"#)
            .await;
        fx.installer.install("./sample_plugin", false).await.unwrap();

        let stale = fx.plugins_dir().join("sample_plugin").join("stale.txt");
        fs::write(&stale, "old").await.unwrap();
        fs::write(
            source.join("plugin.json"),
            r#"{"version": "2.0.0", "exports": ["SamplePlugin"]}"#,
        )
        .await
        .unwrap();

        let again = fx.installer.install("./sample_plugin", false).await;
        assert!(matches!(again, Err(InstallError::AlreadyInstalled(_))));

        let forced = fx.installer.install("./sample_plugin", true).await.unwrap();
        assert_eq!(forced.descriptor.version, "2.0.0");
        assert!(!stale.exists());

        // 백업 디렉토리가 남지 않는다
        assert_eq!(fx.plugin_dir_names().await, vec!["sample_plugin"]);
    }

    #[tokio::test]
    async fn test_failed_registry_save_removes_fresh_tree() {
        let fx = Fixture::new();
        fx.make_source("sample_plugin", r#"{"exports": ["SamplePlugin"]}"#)
            .await;
        fx.break_registry_file();

        let result = fx.installer.install("./sample_plugin", false).await;

        assert!(matches!(result, Err(InstallError::Registry(_))));
        assert!(!fx.plugins_dir().join("sample_plugin").exists());
        assert!(!fx.installer.registry().contains("sample_plugin"));
    }

    #[tokio::test]
    async fn test_failed_registry_save_restores_previous_copy() {
        let fx = Fixture::new();
        let source = fx
            .make_source("sample_plugin", r#"{"version": "1.0.0", "exports": ["SamplePlugin"]}"#)
            .await;
        fx.installer.install("./sample_plugin", false).await.unwrap();

        let marker = fx.plugins_dir().join("sample_plugin").join("local-edit.txt");
        fs::write(&marker, "keep me").await.unwrap();
        fs::write(
            source.join("plugin.json"),
            r#"{"version": "2.0.0", "exports": ["SamplePlugin"]}"#,
        )
        .await
        .unwrap();
        fx.break_registry_file();

        let result = fx.installer.install("./sample_plugin", true).await;

        assert!(matches!(result, Err(InstallError::Registry(_))));
        assert_eq!(fs::read_to_string(&marker).await.unwrap(), "keep me");
        assert_eq!(fx.plugin_dir_names().await, vec!["sample_plugin"]);
        assert_eq!(
            fx.installer.registry().get("sample_plugin").unwrap().version,
            "1.0.0"
        );
    }

    #[tokio::test]
    async fn test_plugin_dir_inside_source_is_rejected() {
        let temp = TempDir::new().unwrap();
        let work = temp.path().join("work");
        let source = work.join("sample_plugin");
        fs::create_dir_all(&source).await.unwrap();
        fs::create_dir_all(work.join("other")).await.unwrap();
        fs::write(source.join("plugin.json"), r#"{"exports": ["SamplePlugin"]}"#)
            .await
            .unwrap();

        // 표기상으로는 source 밖이지만 실제로는 source 안
        let plugins_dir = work.join("other").join("..").join("sample_plugin").join("plugins");
        let registry = Arc::new(PluginRegistry::new(
            temp.path().join("plugin_registry.json"),
            &plugins_dir,
        ));
        registry.load().unwrap();
        let installer = PluginInstaller::new(registry, Arc::new(PluginCatalog::builtin()))
            .with_resolver(SourceResolver::new(&work));

        let result = installer.install("./sample_plugin", false).await;

        assert!(matches!(result, Err(InstallError::InvalidSource(_))));
        assert!(!source.join("plugins").exists());
    }

    #[test]
    fn test_resolve_existing_prefix() {
        let temp = TempDir::new().unwrap();
        let real = temp.path().canonicalize().unwrap();
        std::fs::create_dir_all(real.join("a")).unwrap();

        let resolved = resolve_existing_prefix(&temp.path().join("a").join("..").join("b").join("c"))
            .unwrap();
        assert_eq!(resolved, real.join("b").join("c"));
    }

    #[tokio::test]
    async fn test_remove_requires_confirmation_first() {
        let fx = Fixture::new();

        let result = fx.installer.remove("ghost", false).await;
        assert!(matches!(result, Err(RemoveError::ConfirmationRequired(_))));

        let result = fx.installer.remove("ghost", true).await;
        assert!(matches!(result, Err(RemoveError::NotInstalled(_))));
    }

    #[tokio::test]
    async fn test_remove_local_deletes_directory() {
        let fx = Fixture::new();
        fx.make_source("sample_plugin", r#"{"exports": ["SamplePlugin"]}"#)
            .await;
        fx.installer.install("./sample_plugin", false).await.unwrap();

        let removed = fx.installer.remove("sample_plugin", true).await.unwrap();

        assert_eq!(removed.source_kind, SourceKind::Local);
        assert!(!fx.plugins_dir().join("sample_plugin").exists());
        assert!(fx.work_dir().join("sample_plugin").exists());
        assert!(!fx.installer.registry().contains("sample_plugin"));
    }

    #[tokio::test]
    async fn test_remove_leaves_files_outside_plugin_dir() {
        let fx = Fixture::new();
        let outside = fx.make_source("elsewhere", "{}").await;
        fx.installer
            .registry()
            .upsert(PluginDescriptor::local("elsewhere", &outside, &outside))
            .unwrap();

        fx.installer.remove("elsewhere", true).await.unwrap();
        assert!(outside.exists());
        assert!(!fx.installer.registry().contains("elsewhere"));
    }

    #[test]
    fn test_parse_show_version() {
        let stdout = "Name: onecode-extra\nVersion: 0.4.2\nSummary: extra\n";
        assert_eq!(parse_show_version(stdout).as_deref(), Some("0.4.2"));
        assert_eq!(parse_show_version("Name: x\n"), None);
        assert_eq!(parse_show_version("Version:   \n"), None);
    }

    #[test]
    fn test_config_from_settings() {
        let settings = PluginSettings {
            pip_command: "uv pip".into(),
            tool_timeout_secs: 12,
            ..Default::default()
        };
        let config = InstallerConfig::from_settings(&settings).unwrap();

        assert_eq!(config.git, ExternalTool::new("git"));
        assert_eq!(config.pip, ExternalTool::new("uv").with_args(["pip"]));
        assert_eq!(config.timeout, Duration::from_secs(12));
    }

    #[cfg(unix)]
    mod external {
        use super::*;
        use crate::plugin::error::ToolError;

        fn sh(script: &str) -> ExternalTool {
            ExternalTool::new("sh").with_args(["-c", script, "--"])
        }

        fn config(git: ExternalTool, pip: ExternalTool) -> InstallerConfig {
            InstallerConfig {
                git,
                pip,
                timeout: Duration::from_secs(10),
            }
        }

        #[tokio::test]
        async fn test_package_install_and_remove() {
            let pip = sh("case \"$1\" in show) echo 'Version: 3.1.4';; esac; exit 0");
            let fx = Fixture::with_config(config(ExternalTool::new("git"), pip));

            let result = fx.installer.install("onecode-extra", false).await.unwrap();
            assert_eq!(result.source_kind, SourceKind::PackageIndex);
            assert_eq!(result.descriptor.version, "3.1.4");
            assert_eq!(result.descriptor.package.as_deref(), Some("onecode-extra"));
            assert!(result.descriptor.path.is_none());

            fx.installer.remove("onecode-extra", true).await.unwrap();
            assert!(fx.installer.registry().is_empty());
        }

        #[tokio::test]
        async fn test_package_install_failure_keeps_registry() {
            let pip = sh("echo 'ERROR: No matching distribution' >&2; exit 1");
            let fx = Fixture::with_config(config(ExternalTool::new("git"), pip));

            let result = fx.installer.install("onecode-missing", false).await;
            match result {
                Err(InstallError::PackageInstallFailed { package, stderr }) => {
                    assert_eq!(package, "onecode-missing");
                    assert!(stderr.contains("No matching distribution"));
                }
                other => panic!("unexpected result: {:?}", other.map(|r| r.name)),
            }
            assert!(fx.installer.registry().is_empty());
        }

        #[tokio::test]
        async fn test_remote_install_from_fake_clone() {
            let git = sh(
                "mkdir -p \"$3\" && printf '{\"version\": \"0.3.0\", \"exports\": [\"SamplePlugin\"]}' > \"$3/plugin.json\"",
            );
            let fx = Fixture::with_config(config(git, ExternalTool::new("true")));

            let result = fx.installer.install("user/ros-tools", false).await.unwrap();

            assert_eq!(result.name, "ros-tools");
            assert_eq!(result.source_kind, SourceKind::Remote);
            assert_eq!(
                result.descriptor.url.as_deref(),
                Some("https://github.com/user/ros-tools.git")
            );
            assert_eq!(result.descriptor.version, "0.3.0");
            assert!(result.validated);
            assert!(fx.plugins_dir().join("ros-tools").join("plugin.json").exists());
        }

        #[tokio::test]
        async fn test_remote_clone_failure_surfaces_stderr() {
            let git = sh("echo 'fatal: repository not found' >&2; exit 128");
            let fx = Fixture::with_config(config(git, ExternalTool::new("true")));

            let result = fx.installer.install("https://example.com/none.git", false).await;
            match result {
                Err(InstallError::FetchFailed { url, stderr }) => {
                    assert_eq!(url, "https://example.com/none.git");
                    assert_eq!(stderr, "fatal: repository not found");
                }
                other => panic!("unexpected result: {:?}", other.map(|r| r.name)),
            }
            assert!(!fx.plugins_dir().join("none").exists());
            assert!(fx.installer.registry().is_empty());
        }

        #[tokio::test]
        async fn test_hanging_tool_times_out() {
            let pip = sh("sleep 5");
            let mut cfg = config(ExternalTool::new("git"), pip);
            cfg.timeout = Duration::from_millis(100);
            let fx = Fixture::with_config(cfg);

            let result = fx.installer.install("slow-package", false).await;
            assert!(matches!(result, Err(InstallError::Tool(ToolError::Timeout { .. }))));
        }

        #[tokio::test]
        async fn test_failed_uninstall_keeps_descriptor() {
            let fx = Fixture::with_config(config(ExternalTool::new("git"), ExternalTool::new("false")));
            fx.installer
                .registry()
                .upsert(PluginDescriptor::package("stuck", "stuck"))
                .unwrap();

            let result = fx.installer.remove("stuck", true).await;
            assert!(matches!(result, Err(RemoveError::UninstallFailed { .. })));
            assert!(fx.installer.registry().contains("stuck"));
        }
    }
}
