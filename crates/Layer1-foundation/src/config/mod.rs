//! Config - 통합 설정 관리
//!
//! - `onecode.rs` - OneCodeConfig 통합 설정 (플러그인 경로, 외부 도구, 로깅)

mod onecode;

pub use onecode::{
    LogSettings, OneCodeConfig, PluginSettings, DEFAULT_TOOL_TIMEOUT_SECS, ONECODE_CONFIG_FILE,
};
