//! Builtin plugins - 바이너리에 함께 빌드되는 플러그인
//!
//! 엔트리포인트 파일의 `exports`에 아래 타입 이름을 적으면 로더가 찾는다.
//! 팩토리 이름은 `<plugin>::get_plugin` 형식이다.

mod example;
mod sample;

pub use example::ExamplePlugin;
pub use sample::SamplePlugin;

use super::catalog::PluginCatalog;
use super::error::CommandError;
use clap::error::ErrorKind;
use clap::Parser;

/// 번들 플러그인을 카탈로그에 등록
pub fn register(catalog: &mut PluginCatalog) {
    catalog.register_type("SamplePlugin", || Box::new(SamplePlugin::new()));
    catalog.register_type("ExamplePlugin", || Box::new(ExamplePlugin::new()));

    catalog.register_factory("sample_plugin::get_plugin", || Box::new(SamplePlugin::new()));
    catalog.register_factory("example_plugin::get_plugin", || {
        Box::new(ExamplePlugin::new())
    });
}

/// 명령 인자를 clap으로 파싱해 `run`에 넘긴다
///
/// `--help`는 에러가 아니라 도움말 출력으로 돌려준다.
fn with_args<T, F>(command: &str, args: &[String], run: F) -> Result<String, CommandError>
where
    T: Parser,
    F: FnOnce(T) -> Result<String, CommandError>,
{
    let argv = std::iter::once(command).chain(args.iter().map(String::as_str));
    match T::try_parse_from(argv) {
        Ok(parsed) => run(parsed),
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            Ok(e.render().to_string().trim_end().to_string())
        }
        Err(e) => Err(CommandError(e.render().to_string().trim_end().to_string())),
    }
}
