//! Plugin Source - 설치 소스 문자열 분류
//!
//! 판정 순서:
//! 1. 디스크에 존재하는 경로 → Local (`owner/repo`라는 로컬 디렉토리도 Local)
//! 2. `http://`, `https://` → Remote
//! 3. `owner/repo` 축약형 → Remote (`https://github.com/owner/repo.git`)
//! 4. 경로처럼 보이는 문자열 (`.`, `/`, `~` 시작 또는 `\` 포함) → Local
//! 5. 그 외 → 패키지 인덱스 이름

use super::error::InstallError;
use super::registry::SourceKind;
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

static SHORTHAND: OnceLock<Option<Regex>> = OnceLock::new();

fn is_shorthand(source: &str) -> bool {
    SHORTHAND
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*/[A-Za-z0-9][A-Za-z0-9_.-]*$").ok())
        .as_ref()
        .map_or(false, |re| re.is_match(source))
}

fn is_path_like(source: &str) -> bool {
    source.starts_with('.')
        || source.starts_with('/')
        || source.starts_with('~')
        || source.contains('\\')
}

// ============================================================================
// PluginSource
// ============================================================================

/// 분류가 끝난 설치 소스
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginSource {
    /// 절대 경로 (존재하지 않을 수 있음)
    Local(PathBuf),
    /// 클론 URL
    Remote(String),
    /// 패키지 이름
    Package(String),
}

impl PluginSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Local(_) => SourceKind::Local,
            Self::Remote(_) => SourceKind::Remote,
            Self::Package(_) => SourceKind::PackageIndex,
        }
    }

    /// 레지스트리에 쓸 플러그인 이름
    ///
    /// - Local: 마지막 경로 요소
    /// - Remote: 저장소 이름 (`.git` 제거)
    /// - Package: 패키지 이름 그대로
    pub fn plugin_name(&self) -> Result<String, InstallError> {
        let name = match self {
            Self::Local(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().to_string()),
            Self::Remote(url) => url
                .trim_end_matches('/')
                .rsplit(|c| c == '/' || c == ':')
                .next()
                .map(|last| last.trim_end_matches(".git").to_string()),
            Self::Package(package) => Some(package.clone()),
        };

        match name {
            Some(name) if !name.is_empty() && name != "." && name != ".." => Ok(name),
            _ => Err(InstallError::InvalidSource(self.to_string())),
        }
    }
}

impl std::fmt::Display for PluginSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => write!(f, "{}", url),
            Self::Package(package) => write!(f, "{}", package),
        }
    }
}

// ============================================================================
// SourceResolver
// ============================================================================

/// 상대 경로를 해석할 기준 디렉토리를 가진 분류기
#[derive(Debug, Clone)]
pub struct SourceResolver {
    base_dir: PathBuf,
}

impl SourceResolver {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// 현재 디렉토리 기준
    pub fn current() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }

    pub fn classify(&self, source: &str) -> SourceKind {
        self.resolve(source).kind()
    }

    pub fn resolve(&self, source: &str) -> PluginSource {
        let source = source.trim();
        let path = self.absolute(source);

        if path.exists() {
            let path = path.canonicalize().unwrap_or(path);
            return PluginSource::Local(path);
        }
        if source.starts_with("http://") || source.starts_with("https://") {
            return PluginSource::Remote(source.to_string());
        }
        if is_shorthand(source) {
            return PluginSource::Remote(format!("https://github.com/{}.git", source));
        }
        if is_path_like(source) {
            return PluginSource::Local(path);
        }
        PluginSource::Package(source.to_string())
    }

    /// `~` 확장 후 기준 디렉토리에 붙이고 `.`/`..`를 정리한다
    fn absolute(&self, source: &str) -> PathBuf {
        let expanded = match (source.strip_prefix('~'), dirs::home_dir()) {
            (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with('/') => {
                home.join(rest.trim_start_matches('/'))
            }
            _ => PathBuf::from(source),
        };

        let joined = if expanded.is_absolute() {
            expanded
        } else {
            self.base_dir.join(expanded)
        };
        normalize(&joined)
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
