//! JSON 파일 저장소

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

/// JSON 설정 저장소
#[derive(Debug, Clone)]
pub struct JsonStore {
    base_dir: PathBuf,
}

impl JsonStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// 글로벌 설정 (~/.config/onecode/)
    pub fn global() -> Result<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Cannot find config directory".to_string()))?
            .join("onecode");
        Ok(Self::new(dir))
    }

    /// 프로젝트 설정 (.onecode/)
    pub fn project(root: impl Into<PathBuf>) -> Self {
        Self::new(root.into().join(".onecode"))
    }

    /// 현재 디렉토리 프로젝트 설정
    pub fn current_project() -> Result<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| Error::Config(format!("Cannot get current directory: {}", e)))?;
        Ok(Self::project(cwd))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.base_dir.join(filename)
    }

    /// JSON 로드
    pub fn load<T: DeserializeOwned>(&self, filename: &str) -> Result<T> {
        let path = self.file_path(filename);
        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::Storage(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Storage(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// JSON 로드 (Optional)
    pub fn load_optional<T: DeserializeOwned>(&self, filename: &str) -> Result<Option<T>> {
        let path = self.file_path(filename);
        if !path.exists() {
            return Ok(None);
        }
        self.load(filename).map(Some)
    }
}

/// 같은 디렉토리의 임시 파일에 쓴 뒤 rename 한다. 실패해도 기존 파일은 그대로 남는다.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::InvalidInput(format!("Not a file path: {}", path.display())))?;

    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(format!(".tmp-{}", std::process::id()));
    let tmp_path = path.with_file_name(tmp_name);

    std::fs::write(&tmp_path, content)
        .map_err(|e| Error::Storage(format!("Failed to write {}: {}", tmp_path.display(), e)))?;

    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(Error::Storage(format!(
            "Failed to replace {}: {}",
            path.display(),
            e
        )));
    }

    debug!("Wrote {} ({} bytes)", path.display(), content.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn test_load_optional() {
        let temp = TempDir::new().unwrap();
        let store = JsonStore::new(temp.path());

        let loaded: Option<Sample> = store.load_optional("sample.json").unwrap();
        assert!(loaded.is_none());

        write_atomic(&store.file_path("sample.json"), br#"{"name": "sample", "count": 3}"#).unwrap();
        let loaded: Option<Sample> = store.load_optional("sample.json").unwrap();
        assert_eq!(
            loaded,
            Some(Sample {
                name: "sample".into(),
                count: 3
            })
        );
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let temp = TempDir::new().unwrap();
        let store = JsonStore::new(temp.path());
        std::fs::write(store.file_path("broken.json"), "{ nope").unwrap();

        let result = store.load_optional::<Sample>("broken.json");
        assert!(matches!(result, Err(Error::Storage(msg)) if msg.contains("broken.json")));
    }

    #[test]
    fn test_write_atomic_replaces_without_leftovers() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("registry.json");

        write_atomic(&path, b"{\"a\": 1}").unwrap();
        write_atomic(&path, b"{\"b\": 2}").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"b\": 2}");

        let entries: Vec<_> = std::fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
