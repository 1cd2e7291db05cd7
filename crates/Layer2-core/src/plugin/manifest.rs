//! Plugin Manifest - 플러그인 엔트리포인트 파일
//!
//! 플러그인 디렉토리는 `plugin.json` 또는 `plugin.toml` 중 하나를 가진다.
//! 둘 다 있으면 `plugin.json`이 우선한다.
//!
//! ```json
//! {
//!   "name": "sample_plugin",
//!   "version": "1.0.0",
//!   "exports": ["SamplePlugin"],
//!   "factory": "get_plugin"
//! }
//! ```

use super::error::LoadError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 인식하는 엔트리포인트 파일명 (우선순위 순)
pub const ENTRY_POINTS: [&str; 2] = ["plugin.json", "plugin.toml"];

/// 디렉토리 안의 엔트리포인트 경로
pub fn entry_point(dir: &Path) -> Option<PathBuf> {
    ENTRY_POINTS
        .iter()
        .map(|file| dir.join(file))
        .find(|path| path.is_file())
}

/// 엔트리포인트 파일 내용
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// 플러그인 이름 (없으면 디렉토리 이름)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default)]
    pub dependencies: Vec<String>,

    /// 내보내는 타입 이름 (순서 유지)
    #[serde(default)]
    pub exports: Vec<String>,

    /// 인자 없는 팩토리 함수 이름
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory: Option<String>,
}

impl PluginManifest {
    /// 파일 확장자에 맞춰 파싱
    pub fn parse(path: &Path, content: &str) -> Result<Self, String> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(content).map_err(|e| e.to_string()),
            Some("toml") => toml::from_str(content).map_err(|e| e.to_string()),
            _ => Err(format!("unsupported entry point {}", path.display())),
        }
    }

    /// 플러그인 디렉토리에서 엔트리포인트를 찾아 읽는다
    pub async fn read(dir: &Path) -> Result<(PathBuf, Self), LoadError> {
        let path = entry_point(dir).ok_or_else(|| LoadError::ModuleNotFound {
            path: dir.to_path_buf(),
        })?;

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| LoadError::ImportFailure {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        let manifest = Self::parse(&path, &content).map_err(|reason| LoadError::ImportFailure {
            path: path.clone(),
            reason,
        })?;

        Ok((path, manifest))
    }

    /// 표시용 이름 (manifest → 디렉토리 이름)
    pub fn name_or(&self, dir: &Path) -> String {
        self.name.clone().unwrap_or_else(|| {
            dir.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        })
    }
}
