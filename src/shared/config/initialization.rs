use super::environment::{
    get_environment, initialize_logging_system, load_environment_variables, ApiConfig,
    Environment,
};
use crate::shared::errors::{AppError, AppResult};
use std::fs;
use std::path::{Path, PathBuf};

/// アプリケーション初期化の結果を表す構造体
#[derive(Debug)]
pub struct InitializationResult {
    /// 実行環境
    pub environment: Environment,
    /// API設定
    pub api_config: ApiConfig,
    /// 生成書類の保存先ディレクトリ
    pub download_dir: PathBuf,
}

/// アプリケーションの初期化を実行する
///
/// # 処理内容
/// 1. .envファイルの読み込み（開発環境のみ）
/// 2. ログシステムの初期化
/// 3. API設定の読み込みと検証
/// 4. 書類保存先ディレクトリの作成
pub fn initialize_application() -> AppResult<InitializationResult> {
    load_environment_variables();
    initialize_logging_system();

    let environment = get_environment();
    let api_config = ApiConfig::from_env()?;

    let download_dir = resolve_download_directory();
    ensure_download_directory(&download_dir)?;

    let result = InitializationResult {
        environment,
        api_config,
        download_dir,
    };
    log_initialization_complete(&result);

    Ok(result)
}

/// 書類保存先ディレクトリを決定する
///
/// DOWNLOAD_DIR > OSのダウンロードフォルダ > カレントディレクトリ の順
pub fn resolve_download_directory() -> PathBuf {
    if let Some(dir) = crate::get_env_var_optional!("DOWNLOAD_DIR") {
        return PathBuf::from(dir);
    }

    dirs::download_dir()
        .map(|dir| dir.join("trip-expense"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// 書類保存先ディレクトリを確実に作成する
pub fn ensure_download_directory(dir: &Path) -> AppResult<()> {
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| {
            AppError::configuration(format!(
                "保存先ディレクトリの作成に失敗しました: {}: {e}",
                dir.display()
            ))
        })?;
        log::info!("保存先ディレクトリを作成しました: {}", dir.display());
    }

    Ok(())
}

/// 初期化完了ログを出力する
pub fn log_initialization_complete(result: &InitializationResult) {
    log::info!(
        "アプリケーション初期化完了: environment={:?}, api={}, download_dir={}",
        result.environment,
        result.api_config.base_url,
        result.download_dir.display()
    );
}
