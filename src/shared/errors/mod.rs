use thiserror::Error;

/// アプリケーション全体で使用される統一エラー型
#[derive(Debug, Error)]
pub enum AppError {
    /// 入力値の検証エラー（ネットワーク送信前に検出される）
    #[error("バリデーションエラー: {0}")]
    Validation(String),

    /// 対象の出張が開かれていない（出張IDの指定がない場合はNone）
    #[error("アクティブな出張がありません: trip_id={}", .0.map_or_else(|| "未指定".to_string(), |id| id.to_string()))]
    NoActiveTrip(Option<i64>),

    /// サーバーが重複ファイルとして拒否した（HTTP 409）
    #[error("重複エラー: {0}")]
    Duplicate(String),

    /// サーバーが2xx以外を返した
    #[error("サーバーエラー: HTTP {status} - {message}")]
    Server { status: u16, message: String },

    /// 応答が得られなかった（接続失敗、タイムアウトなど）
    #[error("通信エラー: {0}")]
    Transport(String),

    /// 一覧の再読み込みに失敗した
    #[error("読み込みエラー: {0}")]
    Load(String),

    /// プレビューにエラーがあり書類生成が許可されない
    #[error("書類生成不可: {}", .0.join(", "))]
    GenerationBlocked(Vec<String>),

    /// リソースが見つからない場合のエラー
    #[error("リソースが見つかりません: {0}")]
    NotFound(String),

    /// 設定関連のエラー
    #[error("設定エラー: {0}")]
    Configuration(String),

    /// I/O関連のエラー
    #[error("I/Oエラー: {0}")]
    Io(#[from] std::io::Error),

    /// JSON解析エラー
    #[error("JSON解析エラー: {0}")]
    Json(#[from] serde_json::Error),
}

/// エラーの重要度を表す列挙型
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorSeverity {
    /// 低重要度（ユーザー入力エラーなど）
    Low,
    /// 中重要度（外部サービス一時的エラーなど）
    Medium,
    /// 高重要度（設定エラーなど）
    High,
}

impl AppError {
    /// ユーザーに表示するためのフレンドリーなメッセージを取得
    ///
    /// # 戻り値
    /// ユーザーに表示可能なエラーメッセージ
    pub fn user_message(&self) -> &str {
        match self {
            AppError::Validation(msg) => msg,
            AppError::NoActiveTrip(_) => "出張が選択されていません",
            AppError::Duplicate(_) => "このファイルは既にこの出張にアップロードされています",
            AppError::Server { message, .. } => message,
            AppError::Transport(_) => "サーバーに接続できませんでした",
            AppError::Load(_) => "領収書一覧の更新に失敗しました",
            AppError::GenerationBlocked(_) => "エラーを解消してから書類を生成してください",
            AppError::NotFound(msg) => msg,
            AppError::Configuration(_) => "設定エラーが発生しました",
            AppError::Io(_) => "ファイル操作でエラーが発生しました",
            AppError::Json(_) => "データ形式の解析でエラーが発生しました",
        }
    }

    /// エラーの詳細情報を取得（ログ出力用）
    pub fn details(&self) -> String {
        format!("{self}")
    }

    /// エラーの重要度を取得
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AppError::Validation(_)
            | AppError::NoActiveTrip(_)
            | AppError::Duplicate(_)
            | AppError::GenerationBlocked(_)
            | AppError::NotFound(_) => ErrorSeverity::Low,
            AppError::Server { .. }
            | AppError::Transport(_)
            | AppError::Load(_)
            | AppError::Io(_)
            | AppError::Json(_) => ErrorSeverity::Medium,
            AppError::Configuration(_) => ErrorSeverity::High,
        }
    }

    /// バリデーションエラーを作成するヘルパー関数
    pub fn validation<S: Into<String>>(message: S) -> Self {
        AppError::Validation(message.into())
    }

    /// リソース未発見エラーを作成するヘルパー関数
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        AppError::NotFound(format!("{}が見つかりません", resource.into()))
    }

    /// 設定エラーを作成するヘルパー関数
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        AppError::Configuration(message.into())
    }

    /// 通信エラーを作成するヘルパー関数
    pub fn transport<S: Into<String>>(message: S) -> Self {
        AppError::Transport(message.into())
    }

    /// ネットワークに到達する前に検出されたエラーかどうか
    pub fn is_local(&self) -> bool {
        matches!(self, AppError::Validation(_) | AppError::NoActiveTrip(_))
    }
}

/// AppErrorからStringへの変換（UI層での表示用）
impl From<AppError> for String {
    fn from(error: AppError) -> Self {
        error.user_message().to_string()
    }
}

/// Result型のエイリアス（アプリケーション全体で使用）
pub type AppResult<T> = Result<T, AppError>;
