//! Plugin Loader - 후보를 실제 플러그인 인스턴스로 활성화
//!
//! 1. 엔트리포인트 파일 읽기 (`ModuleNotFound` / `ImportFailure`)
//! 2. `exports`에서 카탈로그가 아는 첫 타입 선택 (`NoConformingClass`)
//! 3. 인자 없이 생성 후 `initialize()` (`InitializationFailed`)
//! 4. 활성 목록에 등록하고, 레지스트리에 없으면 번들 플러그인으로 기록
//!
//! `load_all`은 후보별 실패를 로그로만 남기고 전체로는 실패하지 않는다.

use super::catalog::PluginCatalog;
use super::discovery::{Candidate, PluginDiscovery};
use super::error::LoadError;
use super::manifest::PluginManifest;
use super::registry::PluginRegistry;
use super::traits::Plugin;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 플러그인 로더 - 한 번의 CLI 실행 동안 활성 인스턴스를 소유한다
pub struct PluginLoader {
    catalog: Arc<PluginCatalog>,
    registry: Option<Arc<PluginRegistry>>,
    active: HashMap<String, Arc<dyn Plugin>>,
}

impl PluginLoader {
    pub fn new(catalog: Arc<PluginCatalog>) -> Self {
        Self {
            catalog,
            registry: None,
            active: HashMap::new(),
        }
    }

    /// 활성화된 플러그인을 기록할 레지스트리
    pub fn with_registry(mut self, registry: Arc<PluginRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    // ========================================================================
    // 로드
    // ========================================================================

    /// 후보 하나를 로드
    pub async fn load_candidate(
        &mut self,
        candidate: &Candidate,
    ) -> Result<Arc<dyn Plugin>, LoadError> {
        let (entry_point, manifest) = PluginManifest::read(&candidate.path).await?;

        let (type_name, ctor) = self
            .catalog
            .first_conforming(&manifest.exports)
            .ok_or_else(|| LoadError::NoConformingClass {
                path: entry_point.clone(),
            })?;
        debug!("Instantiating {} from {}", type_name, entry_point.display());

        let plugin = activate(ctor()).await?;
        let name = plugin.name().to_string();

        if let Some(previous) = self.active.insert(name.clone(), plugin.clone()) {
            warn!("Plugin {} was already active; replacing it", name);
            previous.cleanup().await;
        }

        if let Some(registry) = &self.registry {
            match registry.register_bundled(&name, &candidate.path, plugin.version()) {
                Ok(true) => info!("Registered bundled plugin {}", name),
                Ok(false) => {}
                Err(e) => warn!("Failed to record plugin {} in registry: {}", name, e),
            }
        }

        info!("Loaded plugin {} v{}", name, plugin.version());
        Ok(plugin)
    }

    /// 루트의 모든 후보를 로드하고 활성 목록을 반환
    pub async fn load_all(&mut self, root: &Path) -> HashMap<String, Arc<dyn Plugin>> {
        let candidates = match PluginDiscovery::new(root).discover().await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Plugin discovery failed: {}", e);
                return self.active.clone();
            }
        };

        for candidate in &candidates {
            if let Err(e) = self.load_candidate(candidate).await {
                warn!("Failed to load plugin {}: {}", candidate.name, e);
            }
        }

        info!(
            "Activated {} of {} plugin candidates",
            self.active.len(),
            candidates.len()
        );
        self.active.clone()
    }

    /// 엔트리포인트의 팩토리로 인스턴스를 만든다
    ///
    /// 활성 목록과 레지스트리는 건드리지 않는다.
    pub async fn load_factory(&self, dir: &Path) -> Result<Arc<dyn Plugin>, LoadError> {
        let (entry_point, manifest) = PluginManifest::read(dir).await?;

        let factory = manifest
            .factory
            .as_deref()
            .and_then(|name| self.catalog.resolve_factory(name))
            .ok_or(LoadError::NoConformingClass { path: entry_point })?;

        activate(factory()).await
    }

    // ========================================================================
    // 언로드
    // ========================================================================

    /// 정리 후 활성 목록에서 제거
    pub async fn unload(&mut self, name: &str) -> bool {
        match self.active.remove(name) {
            Some(plugin) => {
                plugin.cleanup().await;
                info!("Unloaded plugin {}", name);
                true
            }
            None => false,
        }
    }

    /// 모든 활성 플러그인 정리 (프로세스 종료 시)
    pub async fn shutdown(&mut self) {
        for (name, plugin) in self.active.drain() {
            debug!("Cleaning up plugin {}", name);
            plugin.cleanup().await;
        }
    }

    // ========================================================================
    // 조회
    // ========================================================================

    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.active.get(name).cloned()
    }

    pub fn active(&self) -> &HashMap<String, Arc<dyn Plugin>> {
        &self.active
    }

    /// 플러그인별 누락 의존성 (누락이 없는 플러그인은 제외)
    pub fn missing_dependencies(&self) -> BTreeMap<String, Vec<String>> {
        self.active
            .iter()
            .filter_map(|(name, plugin)| {
                let missing = plugin.missing_dependencies(&self.active);
                (!missing.is_empty()).then(|| (name.clone(), missing))
            })
            .collect()
    }
}

async fn activate(plugin: Box<dyn Plugin>) -> Result<Arc<dyn Plugin>, LoadError> {
    let plugin: Arc<dyn Plugin> = Arc::from(plugin);
    match plugin.initialize().await {
        Ok(true) => Ok(plugin),
        Ok(false) => Err(LoadError::InitializationFailed {
            name: plugin.name().to_string(),
            reason: "initialize() returned false".to_string(),
        }),
        Err(e) => Err(LoadError::InitializationFailed {
            name: plugin.name().to_string(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::error::PluginInitError;
    use crate::plugin::traits::CommandMap;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tokio::fs;

    static CLEANUPS: AtomicUsize = AtomicUsize::new(0);

    struct ConfigurablePlugin {
        name: &'static str,
        init: Result<bool, &'static str>,
        deps: Vec<String>,
    }

    #[async_trait]
    impl Plugin for ConfigurablePlugin {
        fn name(&self) -> &str {
            self.name
        }

        fn version(&self) -> &str {
            "0.0.1"
        }

        fn dependencies(&self) -> Vec<String> {
            self.deps.clone()
        }

        async fn initialize(&self) -> Result<bool, PluginInitError> {
            self.init.map_err(|e| PluginInitError(e.to_string()))
        }

        fn commands(&self) -> CommandMap {
            CommandMap::new()
        }

        async fn cleanup(&self) {
            CLEANUPS.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn test_catalog() -> Arc<PluginCatalog> {
        let mut catalog = PluginCatalog::builtin();
        catalog.register_type("RefusingPlugin", || {
            Box::new(ConfigurablePlugin {
                name: "refusing",
                init: Ok(false),
                deps: vec![],
            })
        });
        catalog.register_type("BrokenInitPlugin", || {
            Box::new(ConfigurablePlugin {
                name: "broken_init",
                init: Err("device not found"),
                deps: vec![],
            })
        });
        catalog.register_type("DependentPlugin", || {
            Box::new(ConfigurablePlugin {
                name: "dependent",
                init: Ok(true),
                deps: vec!["sample_plugin".into(), "ghost".into()],
            })
        });
        Arc::new(catalog)
    }

    async fn write_entry(root: &Path, dir: &str, file: &str, content: &str) {
        let path = root.join(dir);
        fs::create_dir_all(&path).await.unwrap();
        fs::write(path.join(file), content).await.unwrap();
    }

    fn candidate(root: &Path, dir: &str) -> Candidate {
        Candidate::probe(&root.join(dir)).unwrap()
    }

    #[tokio::test]
    async fn test_load_candidate_errors() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write_entry(root, "broken", "plugin.json", "{ nope").await;
        write_entry(root, "helper_only", "plugin.json", r#"{"exports": ["Helper", "Plugin"]}"#).await;
        write_entry(root, "refusing", "plugin.json", r#"{"exports": ["RefusingPlugin"]}"#).await;
        write_entry(root, "broken_init", "plugin.toml", "exports = [\"BrokenInitPlugin\"]").await;

        let mut loader = PluginLoader::new(test_catalog());

        let err = loader.load_candidate(&candidate(root, "broken")).await;
        assert!(matches!(err, Err(LoadError::ImportFailure { .. })));

        let err = loader.load_candidate(&candidate(root, "helper_only")).await;
        assert!(matches!(err, Err(LoadError::NoConformingClass { .. })));

        let err = loader.load_candidate(&candidate(root, "refusing")).await;
        assert!(matches!(err, Err(LoadError::InitializationFailed { name, .. }) if name == "refusing"));

        let err = loader.load_candidate(&candidate(root, "broken_init")).await;
        match err {
            Err(LoadError::InitializationFailed { reason, .. }) => {
                assert_eq!(reason, "device not found")
            }
            other => panic!("unexpected result: {:?}", other.map(|p| p.name().to_string())),
        }

        assert!(loader.active().is_empty());
    }

    #[tokio::test]
    async fn test_missing_entry_point_is_module_not_found() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("empty");
        fs::create_dir_all(&dir).await.unwrap();

        let mut loader = PluginLoader::new(test_catalog());
        let fake = Candidate {
            name: "empty".into(),
            path: dir.clone(),
            entry_point: dir.join("plugin.json"),
        };
        let err = loader.load_candidate(&fake).await;
        assert!(matches!(err, Err(LoadError::ModuleNotFound { .. })));
    }

    #[tokio::test]
    async fn test_load_all_isolates_failures_and_self_registers() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("plugins");
        write_entry(&root, "sample_plugin", "plugin.json", r#"{"exports": ["SamplePlugin"]}"#).await;
        write_entry(&root, "broken", "plugin.json", "[1, 2").await;
        write_entry(&root, "refusing", "plugin.json", r#"{"exports": ["RefusingPlugin"]}"#).await;
        fs::create_dir_all(root.join("not_a_plugin")).await.unwrap();

        let registry = Arc::new(PluginRegistry::new(temp.path().join("registry.json"), &root));
        registry.load().unwrap();

        let mut loader = PluginLoader::new(test_catalog()).with_registry(registry.clone());
        let active = loader.load_all(&root).await;

        assert_eq!(active.len(), 1);
        assert!(active.contains_key("sample_plugin"));

        let descriptor = registry.get("sample_plugin").unwrap();
        assert_eq!(descriptor.version, "1.0.0");
        assert_eq!(descriptor.path, Some(root.join("sample_plugin")));
        assert!(!registry.contains("refusing"));
    }

    #[tokio::test]
    async fn test_load_all_on_unreadable_root_returns_empty() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("plugins");
        fs::write(&file, "").await.unwrap();

        let mut loader = PluginLoader::new(test_catalog());
        assert!(loader.load_all(&file).await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_dependencies_unload_and_shutdown() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write_entry(root, "sample_plugin", "plugin.json", r#"{"exports": ["SamplePlugin"]}"#).await;
        write_entry(root, "dependent", "plugin.json", r#"{"exports": ["DependentPlugin"]}"#).await;

        let mut loader = PluginLoader::new(test_catalog());
        loader.load_all(root).await;

        let missing = loader.missing_dependencies();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing["dependent"], vec!["ghost"]);

        let before = CLEANUPS.load(Ordering::SeqCst);
        assert!(loader.unload("dependent").await);
        assert!(!loader.unload("dependent").await);
        assert!(CLEANUPS.load(Ordering::SeqCst) > before);

        loader.shutdown().await;
        assert!(loader.active().is_empty());
        assert!(loader.get("sample_plugin").is_none());
    }

    #[tokio::test]
    async fn test_load_factory_does_not_activate() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write_entry(
            root,
            "example_plugin",
            "plugin.toml",
            "exports = [\"ExamplePlugin\"]\nfactory = \"example_plugin::get_plugin\"\n",
        )
        .await;
        write_entry(root, "no_factory", "plugin.json", r#"{"exports": ["SamplePlugin"]}"#).await;

        let loader = PluginLoader::new(test_catalog());

        let plugin = loader.load_factory(&root.join("example_plugin")).await.unwrap();
        assert_eq!(plugin.name(), "example_plugin");
        assert!(plugin.is_initialized());
        assert!(loader.active().is_empty());

        let err = loader.load_factory(&root.join("no_factory")).await;
        assert!(matches!(err, Err(LoadError::NoConformingClass { .. })));
    }
}
