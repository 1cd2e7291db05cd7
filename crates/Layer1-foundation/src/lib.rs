//! # onecode-foundation
//!
//! Foundation layer for OneCodePlant:
//! - Error: 공통 에러 타입
//! - Storage: JsonStore (범용), 원자적 파일 쓰기
//! - Config: 통합 설정 (OneCodeConfig - 플러그인 경로, 외부 도구, 로깅)

pub mod config;
pub mod error;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Storage
// ============================================================================
pub use storage::{write_atomic, JsonStore};

// ============================================================================
// Config
// ============================================================================
pub use config::{
    LogSettings, OneCodeConfig, PluginSettings, DEFAULT_TOOL_TIMEOUT_SECS, ONECODE_CONFIG_FILE,
};
