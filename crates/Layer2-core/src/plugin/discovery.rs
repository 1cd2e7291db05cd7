//! Plugin Discovery - 플러그인 후보 발견
//!
//! 관리 디렉토리의 하위 디렉토리 중 엔트리포인트 파일을 가진 것을 찾는다.
//! 구조만 검사하고 아무 코드도 실행하지 않는다.

use super::error::DiscoveryError;
use super::manifest::entry_point;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// 후보에서 제외되는 캐시/빌드 산출물 디렉토리
const IGNORED_DIRS: [&str; 3] = ["__pycache__", "target", "node_modules"];

// ============================================================================
// Candidate - 발견된 후보
// ============================================================================

/// 로드 전의 플러그인 후보
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// 디렉토리 이름
    pub name: String,

    /// 플러그인 디렉토리
    pub path: PathBuf,

    /// 엔트리포인트 파일
    pub entry_point: PathBuf,
}

impl Candidate {
    /// 디렉토리 하나를 검사해 후보를 만든다
    pub fn probe(path: &Path) -> Option<Self> {
        if !path.is_dir() {
            return None;
        }
        let name = path.file_name()?.to_string_lossy().to_string();
        if !is_candidate_name(&name) {
            return None;
        }
        let entry_point = entry_point(path)?;
        Some(Self {
            name,
            path: path.to_path_buf(),
            entry_point,
        })
    }
}

/// `_`/`.` 접두사와 캐시 디렉토리 제외
fn is_candidate_name(name: &str) -> bool {
    !name.starts_with('_') && !name.starts_with('.') && !IGNORED_DIRS.contains(&name)
}

// ============================================================================
// PluginDiscovery
// ============================================================================

/// 플러그인 발견 - 몇 번을 호출해도 부작용이 없다
#[derive(Debug, Clone)]
pub struct PluginDiscovery {
    root: PathBuf,
}

impl PluginDiscovery {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 후보 목록 (디렉토리 순회 순서)
    ///
    /// 루트가 없으면 빈 목록, 읽을 수 없으면 `DiscoveryError`.
    pub async fn discover(&self) -> Result<Vec<Candidate>, DiscoveryError> {
        if !self.root.exists() {
            debug!("Plugin directory {} does not exist", self.root.display());
            return Ok(Vec::new());
        }

        let unreadable = |source| DiscoveryError::Unreadable {
            path: self.root.clone(),
            source,
        };

        let mut entries = fs::read_dir(&self.root).await.map_err(unreadable)?;
        let mut candidates = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
            let path = entry.path();
            match Candidate::probe(&path) {
                Some(candidate) => {
                    debug!("Found plugin candidate {} at {}", candidate.name, path.display());
                    candidates.push(candidate);
                }
                None => debug!("Skipping {}", path.display()),
            }
        }

        info!(
            "Discovered {} plugin candidates in {}",
            candidates.len(),
            self.root.display()
        );
        Ok(candidates)
    }
}
