//! Plugin Registry - 설치된 플러그인 기록 (plugin_registry.json)
//!
//! 현재 형식은 평평한 JSON 객체이며 예약 키 `_schema_version`을 함께 저장한다.
//!
//! ```json
//! {
//!   "_schema_version": 2,
//!   "sample_plugin": {
//!     "source": "local",
//!     "path": "/home/me/.onecode/plugins/sample_plugin",
//!     "original_path": "/home/me/src/sample_plugin",
//!     "version": "1.0.0",
//!     "status": "installed"
//!   }
//! }
//! ```
//!
//! 태그가 없는 파일은 이전 형식이다. `{"plugins": {...}, "version": "1.0"}` 래퍼는
//! 풀어서 읽고, 그 외에는 태그 없는 평평한 형식으로 읽은 뒤 현재 형식으로 다시 쓴다.

use super::error::RegistryError;
use onecode_foundation::write_atomic;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// 현재 스키마 버전
pub const SCHEMA_VERSION: u64 = 2;

/// 스키마 버전 예약 키. `_`로 시작하는 이름은 플러그인 이름이 될 수 없다.
pub const SCHEMA_KEY: &str = "_schema_version";

const LEGACY_WRAPPER_KEY: &str = "plugins";
const LEGACY_DEFAULT_VERSION: &str = "1.0.0";
const UNKNOWN_VERSION: &str = "unknown";

// ============================================================================
// SourceKind / PluginState
// ============================================================================

/// 플러그인 출처
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "remote", alias = "github")]
    Remote,
    #[serde(rename = "pypi")]
    PackageIndex,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
            Self::PackageIndex => write!(f, "pypi"),
        }
    }
}

/// 설치 상태
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginState {
    #[default]
    Installed,
    Missing,
}

impl PluginState {
    fn for_path(path: &Path) -> Self {
        if path.exists() {
            Self::Installed
        } else {
            Self::Missing
        }
    }
}

impl std::fmt::Display for PluginState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Installed => write!(f, "installed"),
            Self::Missing => write!(f, "missing"),
        }
    }
}

// ============================================================================
// PluginDescriptor - 레지스트리 항목
// ============================================================================

/// 설치된 플러그인 하나의 출처/상태 기록
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// 레지스트리 키 (파일에는 객체 키로만 저장)
    #[serde(skip)]
    pub name: String,

    pub source: SourceKind,

    /// 설치 경로 (pypi 설치에는 없음)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_path: Option<PathBuf>,

    pub version: String,

    pub status: PluginState,
}

impl PluginDescriptor {
    /// 로컬 디렉토리에서 복사된 플러그인
    pub fn local(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        original_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            source: SourceKind::Local,
            path: Some(path.into()),
            package: None,
            url: None,
            original_path: Some(original_path.into()),
            version: UNKNOWN_VERSION.to_string(),
            status: PluginState::Installed,
        }
    }

    /// 원격 저장소에서 클론된 플러그인
    pub fn remote(name: impl Into<String>, path: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: SourceKind::Remote,
            path: Some(path.into()),
            package: None,
            url: Some(url.into()),
            original_path: None,
            version: UNKNOWN_VERSION.to_string(),
            status: PluginState::Installed,
        }
    }

    /// 패키지 인덱스에서 설치된 플러그인
    pub fn package(name: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: SourceKind::PackageIndex,
            path: None,
            package: Some(package.into()),
            url: None,
            original_path: None,
            version: UNKNOWN_VERSION.to_string(),
            status: PluginState::Installed,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// 설치에 쓰인 원본 (로컬 경로, 원격 URL, 패키지 이름)
    pub fn origin(&self) -> String {
        let origin = match self.source {
            SourceKind::Local => self
                .original_path
                .as_ref()
                .or(self.path.as_ref())
                .map(|p| p.display().to_string()),
            SourceKind::Remote => self.url.clone(),
            SourceKind::PackageIndex => self.package.clone(),
        };
        origin.unwrap_or_else(|| self.name.clone())
    }

    pub fn installed_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// 현재 디스크 상태 (경로가 없으면 기록된 상태 그대로)
    pub fn live_status(&self) -> PluginState {
        match &self.path {
            Some(path) => PluginState::for_path(path),
            None => self.status,
        }
    }
}

/// 파일에서 읽은 항목 (모든 필드 선택적)
#[derive(Debug, Deserialize)]
struct StoredEntry {
    #[serde(default)]
    source: Option<SourceKind>,
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    package: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    original_path: Option<PathBuf>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    status: Option<PluginState>,
}

impl StoredEntry {
    fn into_descriptor(self, name: String, plugins_dir: &Path, legacy: bool) -> PluginDescriptor {
        let source = self.source.unwrap_or(SourceKind::Local);
        let path = match (self.path, source) {
            (Some(path), _) => Some(path),
            (None, SourceKind::PackageIndex) => None,
            (None, _) => Some(plugins_dir.join(&name)),
        };
        let package = match source {
            SourceKind::PackageIndex => self.package.or_else(|| Some(name.clone())),
            _ => self.package,
        };
        let default_version = if legacy {
            LEGACY_DEFAULT_VERSION
        } else {
            UNKNOWN_VERSION
        };

        PluginDescriptor {
            name,
            source,
            path,
            package,
            url: self.url,
            original_path: self.original_path,
            version: self.version.unwrap_or_else(|| default_version.to_string()),
            status: self.status.unwrap_or_default(),
        }
    }
}

// ============================================================================
// 디코딩
// ============================================================================

#[derive(Debug)]
enum Layout {
    Current,
    LegacyWrapper,
    UntaggedFlat,
}

#[derive(Debug)]
struct Decoded {
    entries: BTreeMap<String, PluginDescriptor>,
    layout: Layout,
    skipped: usize,
}

/// `{"plugins": {<name>: {...}}, "version": "..."}` 형태인지
///
/// 태그가 없는 파일에만 적용한다. 이름이 "plugins"인 플러그인 하나만 있는
/// 평평한 파일은 내부 값이 전부 객체가 아니므로 래퍼로 오인되지 않는다.
fn is_legacy_wrapper(map: &Map<String, Value>) -> bool {
    let inner_ok = match map.get(LEGACY_WRAPPER_KEY) {
        Some(Value::Object(inner)) => inner.values().all(Value::is_object),
        _ => false,
    };
    let version_ok = match map.get("version") {
        None | Some(Value::String(_)) => true,
        Some(_) => false,
    };
    inner_ok && version_ok && map.keys().all(|k| k == LEGACY_WRAPPER_KEY || k == "version")
}

fn decode_entries(
    map: Map<String, Value>,
    plugins_dir: &Path,
    legacy: bool,
) -> (BTreeMap<String, PluginDescriptor>, usize) {
    let mut entries = BTreeMap::new();
    let mut skipped = 0;

    for (name, value) in map {
        if name.starts_with('_') {
            warn!("Ignoring reserved registry key '{}'", name);
            skipped += 1;
            continue;
        }
        match serde_json::from_value::<StoredEntry>(value) {
            Ok(entry) => {
                let descriptor = entry.into_descriptor(name.clone(), plugins_dir, legacy);
                entries.insert(name, descriptor);
            }
            Err(e) => {
                warn!("Skipping malformed registry entry '{}': {}", name, e);
                skipped += 1;
            }
        }
    }

    (entries, skipped)
}

fn decode(content: &[u8], plugins_dir: &Path) -> Result<Decoded, String> {
    let value: Value = serde_json::from_slice(content).map_err(|e| e.to_string())?;
    let Value::Object(mut map) = value else {
        return Err("top-level value is not an object".to_string());
    };

    let layout = match map.remove(SCHEMA_KEY) {
        Some(tag) => {
            let version = tag
                .as_u64()
                .ok_or_else(|| format!("{} is not a number: {}", SCHEMA_KEY, tag))?;
            if version > SCHEMA_VERSION {
                warn!(
                    "Registry schema {} is newer than supported {}; reading as flat",
                    version, SCHEMA_VERSION
                );
            }
            Layout::Current
        }
        None if is_legacy_wrapper(&map) => {
            map = match map.remove(LEGACY_WRAPPER_KEY) {
                Some(Value::Object(inner)) => inner,
                _ => Map::new(),
            };
            Layout::LegacyWrapper
        }
        None => Layout::UntaggedFlat,
    };

    let legacy = matches!(layout, Layout::LegacyWrapper);
    let (entries, skipped) = decode_entries(map, plugins_dir, legacy);
    Ok(Decoded {
        entries,
        layout,
        skipped,
    })
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn encode(entries: &BTreeMap<String, PluginDescriptor>) -> Result<String, RegistryError> {
    let mut map = Map::new();
    map.insert(SCHEMA_KEY.to_string(), Value::from(SCHEMA_VERSION));
    for (name, descriptor) in entries {
        map.insert(name.clone(), serde_json::to_value(descriptor)?);
    }
    Ok(serde_json::to_string_pretty(&Value::Object(map))?)
}

// ============================================================================
// PluginRegistry
// ============================================================================

/// 플러그인 레지스트리 - 파일 경로와 플러그인 루트를 주입받는다
///
/// 변경은 copy-on-write: 새 맵을 먼저 저장하고 성공했을 때만 메모리에 반영한다.
///
/// 로드가 손실을 냈으면(파일을 읽지 못했거나 항목을 건너뜀) 첫 저장 전에
/// 원본을 `<file>.corrupt-<pid>`로 옮겨 둔다.
pub struct PluginRegistry {
    path: PathBuf,
    plugins_dir: PathBuf,
    entries: RwLock<BTreeMap<String, PluginDescriptor>>,
    lossy: AtomicBool,
}

impl PluginRegistry {
    /// 빈 레지스트리 (파일은 읽지 않음)
    pub fn new(path: impl Into<PathBuf>, plugins_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            plugins_dir: plugins_dir.into(),
            entries: RwLock::new(BTreeMap::new()),
            lossy: AtomicBool::new(false),
        }
    }

    /// 생성 후 바로 로드
    pub fn open(
        path: impl Into<PathBuf>,
        plugins_dir: impl Into<PathBuf>,
    ) -> Result<Self, RegistryError> {
        let registry = Self::new(path, plugins_dir);
        registry.load()?;
        Ok(registry)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn plugins_dir(&self) -> &Path {
        &self.plugins_dir
    }

    // ========================================================================
    // 로드 / 저장
    // ========================================================================

    /// 파일에서 로드
    ///
    /// - 파일 없음: 빈 레지스트리를 만들어 바로 저장
    /// - 읽기/파싱 불가: 경고 후 빈 레지스트리 (파일은 첫 저장 때 옆으로 옮김)
    /// - 이전 형식: 현재 형식으로 다시 저장
    pub fn load(&self) -> Result<(), RegistryError> {
        let mut guard = self.entries.write();
        self.lossy.store(false, Ordering::SeqCst);

        if !self.path.exists() {
            debug!("Registry {} not found, creating", self.path.display());
            let empty = BTreeMap::new();
            self.persist(&empty)?;
            *guard = empty;
            return Ok(());
        }

        let decoded = match std::fs::read(&self.path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| decode(&bytes, &self.plugins_dir))
        {
            Ok(decoded) => decoded,
            Err(reason) => {
                warn!(
                    "Plugin registry {} is unreadable ({}); using an empty registry",
                    self.path.display(),
                    reason
                );
                self.lossy.store(true, Ordering::SeqCst);
                guard.clear();
                return Ok(());
            }
        };

        if decoded.skipped > 0 {
            self.lossy.store(true, Ordering::SeqCst);
        }

        match decoded.layout {
            Layout::Current => {}
            _ if decoded.skipped > 0 => {
                warn!(
                    "Registry {} uses an older layout but {} entries could not be read; not rewriting",
                    self.path.display(),
                    decoded.skipped
                );
            }
            layout => {
                info!(
                    "Migrating plugin registry {} ({:?}) to schema {}",
                    self.path.display(),
                    layout,
                    SCHEMA_VERSION
                );
                self.persist(&decoded.entries)?;
            }
        }

        debug!("Loaded {} registered plugins", decoded.entries.len());
        *guard = decoded.entries;
        Ok(())
    }

    /// 손실 로드 후 첫 저장이면 원본을 옆으로 옮긴다
    fn set_aside_original(&self) -> Result<(), RegistryError> {
        if !self.lossy.load(Ordering::SeqCst) {
            return Ok(());
        }
        if self.path.symlink_metadata().is_ok() {
            let aside = self.set_aside_path();
            std::fs::rename(&self.path, &aside)?;
            warn!(
                "Moved unreadable plugin registry {} to {}",
                self.path.display(),
                aside.display()
            );
        }
        self.lossy.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// `<file>.corrupt-<pid>`
    pub fn set_aside_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".corrupt-{}", std::process::id()));
        PathBuf::from(name)
    }

    /// 현재 내용을 저장
    pub fn save(&self) -> Result<(), RegistryError> {
        let guard = self.entries.read();
        self.set_aside_original()?;
        self.persist(&guard)
    }

    fn persist(&self, entries: &BTreeMap<String, PluginDescriptor>) -> Result<(), RegistryError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = encode(entries)?;
        write_atomic(&self.path, content.as_bytes())?;
        Ok(())
    }

    /// 새 맵을 저장한 뒤 메모리에 반영
    fn commit<F>(&self, mutate: F) -> Result<bool, RegistryError>
    where
        F: FnOnce(&mut BTreeMap<String, PluginDescriptor>) -> Result<bool, RegistryError>,
    {
        let mut guard = self.entries.write();
        let mut next = guard.clone();
        if !mutate(&mut next)? {
            return Ok(false);
        }
        self.set_aside_original()?;
        self.persist(&next)?;
        *guard = next;
        Ok(true)
    }

    // ========================================================================
    // 변경
    // ========================================================================

    /// 이름으로 추가 또는 교체
    pub fn upsert(&self, descriptor: PluginDescriptor) -> Result<(), RegistryError> {
        debug!("Registering plugin {} ({})", descriptor.name, descriptor.source);
        self.commit(|entries| {
            entries.insert(descriptor.name.clone(), descriptor);
            Ok(true)
        })?;
        Ok(())
    }

    /// 삭제 (없으면 NotFound)
    pub fn remove(&self, name: &str) -> Result<PluginDescriptor, RegistryError> {
        let mut removed = None;
        self.commit(|entries| {
            removed = entries.remove(name);
            match removed {
                Some(_) => Ok(true),
                None => Err(RegistryError::NotFound(name.to_string())),
            }
        })?;
        removed.ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// 설치 경로 존재 여부로 상태 갱신. 바뀐 항목이 있으면 true.
    pub fn refresh(&self) -> Result<bool, RegistryError> {
        let changed = self.commit(|entries| {
            let mut changed = false;
            for descriptor in entries.values_mut() {
                let Some(path) = &descriptor.path else {
                    continue;
                };
                let state = PluginState::for_path(path);
                if descriptor.status != state {
                    info!("Plugin {} is now {}", descriptor.name, state);
                    descriptor.status = state;
                    changed = true;
                }
            }
            Ok(changed)
        })?;

        if changed {
            info!("Plugin registry refreshed");
        }
        Ok(changed)
    }

    /// 번들 플러그인 자동 등록
    ///
    /// 같은 이름이 있거나 같은 디렉토리를 가리키는 항목이 있으면 그대로 둔다.
    pub fn register_bundled(
        &self,
        name: &str,
        path: &Path,
        version: &str,
    ) -> Result<bool, RegistryError> {
        self.commit(|entries| {
            if entries.contains_key(name) {
                return Ok(false);
            }
            let target = canonical(path);
            if let Some(owner) = entries
                .values()
                .find(|d| d.path.as_deref().map(canonical).as_ref() == Some(&target))
            {
                debug!(
                    "{} is already registered as {}; not self-registering {}",
                    path.display(),
                    owner.name,
                    name
                );
                return Ok(false);
            }
            debug!("Self-registering bundled plugin {}", name);
            entries.insert(
                name.to_string(),
                PluginDescriptor::local(name, path, path).with_version(version),
            );
            Ok(true)
        })
    }

    // ========================================================================
    // 조회
    // ========================================================================

    pub fn get(&self, name: &str) -> Option<PluginDescriptor> {
        self.entries.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// 이름 순 목록
    pub fn list(&self) -> Vec<PluginDescriptor> {
        self.entries.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
