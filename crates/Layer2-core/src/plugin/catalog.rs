//! Plugin Catalog - 빌드 타임에 링크된 플러그인 타입 목록
//!
//! 엔트리포인트의 `exports`/`factory` 이름을 실제 생성자로 바꿔준다.
//! 카탈로그에 없는 이름은 "계약을 구현하지 않는 심볼"로 취급된다.

use super::builtin;
use super::traits::Plugin;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// 계약 타입 자신의 이름. 구현 타입으로 등록/해석되지 않는다.
pub const CONTRACT_TYPE: &str = "Plugin";

/// 인자 없는 생성자
pub type PluginConstructor = Arc<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;

/// 타입 이름/팩토리 이름 → 생성자
#[derive(Clone, Default)]
pub struct PluginCatalog {
    types: HashMap<String, PluginConstructor>,
    factories: HashMap<String, PluginConstructor>,
}

impl PluginCatalog {
    /// 빈 카탈로그
    pub fn new() -> Self {
        Self::default()
    }

    /// 번들 플러그인이 등록된 카탈로그
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        builtin::register(&mut catalog);
        catalog
    }

    // ========================================================================
    // 등록
    // ========================================================================

    /// 구현 타입 등록. 계약 타입 이름이면 무시하고 false.
    pub fn register_type<F>(&mut self, name: impl Into<String>, ctor: F) -> bool
    where
        F: Fn() -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        let name = name.into();
        if name == CONTRACT_TYPE {
            warn!("Refusing to register the contract type '{}' as a plugin", name);
            return false;
        }
        self.types.insert(name, Arc::new(ctor));
        true
    }

    /// 팩토리 함수 등록
    pub fn register_factory<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    // ========================================================================
    // 조회
    // ========================================================================

    pub fn resolve_type(&self, name: &str) -> Option<PluginConstructor> {
        if name == CONTRACT_TYPE {
            return None;
        }
        self.types.get(name).cloned()
    }

    pub fn resolve_factory(&self, name: &str) -> Option<PluginConstructor> {
        self.factories.get(name).cloned()
    }

    /// `exports` 순서대로 훑어 처음 해석되는 타입
    pub fn first_conforming<'a>(
        &self,
        exports: &'a [String],
    ) -> Option<(&'a str, PluginConstructor)> {
        exports
            .iter()
            .find_map(|name| self.resolve_type(name).map(|ctor| (name.as_str(), ctor)))
    }

    pub fn contains_type(&self, name: &str) -> bool {
        name != CONTRACT_TYPE && self.types.contains_key(name)
    }

    /// 등록된 타입 이름 (정렬)
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.types.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut factories: Vec<_> = self.factories.keys().collect();
        factories.sort();
        f.debug_struct("PluginCatalog")
            .field("types", &self.type_names())
            .field("factories", &factories)
            .finish()
    }
}
