//! Plugin traits - 핵심 플러그인 인터페이스

use super::error::{CommandError, PluginInitError};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

// ============================================================================
// Commands
// ============================================================================

/// 명령 핸들러 - 인자를 받아 출력 문자열을 반환
pub type CommandHandler = Arc<dyn Fn(&[String]) -> Result<String, CommandError> + Send + Sync>;

/// 명령 이름 → 핸들러 (플러그인 하나 안에서 이름은 유일)
pub type CommandMap = BTreeMap<String, CommandHandler>;

/// 클로저를 `CommandHandler`로 감싼다
pub fn handler<F>(f: F) -> CommandHandler
where
    F: Fn(&[String]) -> Result<String, CommandError> + Send + Sync + 'static,
{
    Arc::new(f)
}

// ============================================================================
// Metadata / Status
// ============================================================================

/// 플러그인 메타데이터
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginMetadata {
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    pub dependencies: Vec<String>,
}

/// 플러그인 상태 스냅샷 (디버깅/표시용)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginStatus {
    pub name: String,
    pub version: String,
    pub initialized: bool,
    pub commands: Vec<String>,
}

// ============================================================================
// Plugin Trait - 모든 플러그인이 구현해야 하는 인터페이스
// ============================================================================

/// 플러그인 트레이트
///
/// 로더는 타입을 인자 없이 생성한 뒤 `initialize()`를 호출한다.
/// `false`나 에러를 돌려주면 활성 플러그인 목록에 들어가지 않는다.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn author(&self) -> &str {
        ""
    }

    /// 의존하는 플러그인 이름 목록
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// 일회성 초기화. 두 번 호출해도 결과가 같아야 한다.
    async fn initialize(&self) -> Result<bool, PluginInitError>;

    /// 제공하는 명령 목록 (부작용 없음)
    fn commands(&self) -> CommandMap;

    /// 정리. 실패는 구현체가 직접 로그로 남긴다.
    async fn cleanup(&self) {}

    /// 초기화 완료 여부
    fn is_initialized(&self) -> bool {
        true
    }

    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            name: self.name().to_string(),
            version: self.version().to_string(),
            description: self.description().to_string(),
            author: self.author().to_string(),
            dependencies: self.dependencies(),
        }
    }

    /// 선언된 의존성이 모두 `available`에 있으면 true
    fn validate_dependencies(&self, available: &HashMap<String, Arc<dyn Plugin>>) -> bool {
        self.missing_dependencies(available).is_empty()
    }

    fn missing_dependencies(&self, available: &HashMap<String, Arc<dyn Plugin>>) -> Vec<String> {
        self.dependencies()
            .into_iter()
            .filter(|dep| !available.contains_key(dep))
            .collect()
    }

    fn status(&self) -> PluginStatus {
        PluginStatus {
            name: self.name().to_string(),
            version: self.version().to_string(),
            initialized: self.is_initialized(),
            commands: self.commands().into_keys().collect(),
        }
    }
}
