//! 汎用APIクライアント
//!
//! 出張経費バックエンドとの通信を行うHTTPクライアント。
//! 自動リトライは行わない（再試行は常にユーザー操作で行う）。
use crate::shared::config::environment::ApiConfig;
use crate::shared::errors::{AppError, AppResult};
use log::{debug, info, warn};
use reqwest::{multipart, Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;

/// バックエンドのエラーレスポンス（`{"detail": ...}`）
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: serde_json::Value,
}

impl ErrorResponse {
    /// detailを表示用の文字列にする
    ///
    /// 入力検証エラー（422）ではdetailが配列になるため、各要素のmsgを連結する
    pub fn message(&self) -> Option<String> {
        match &self.detail {
            serde_json::Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
            serde_json::Value::Array(items) => {
                let messages: Vec<String> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                    .map(str::to_string)
                    .collect();
                if messages.is_empty() {
                    None
                } else {
                    Some(messages.join("; "))
                }
            }
            _ => None,
        }
    }
}

/// HTTPステータスに対応する汎用メッセージ
pub fn generic_status_message(status: StatusCode) -> &'static str {
    match status.as_u16() {
        400 => "リクエストの形式が正しくありません",
        401 => "認証に失敗しました。再度ログインしてください",
        403 => "この操作を実行する権限がありません",
        404 => "指定されたリソースが見つかりません",
        409 => "このファイルは既にアップロードされています",
        413 => "データサイズが制限を超えています",
        422 => "入力内容に誤りがあります",
        500 => "サーバー内部エラーが発生しました",
        502 | 503 | 504 => "サーバーが一時的に利用できません",
        _ => "不明なエラーが発生しました",
    }
}

/// 汎用APIクライアント
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    config: ApiConfig,
}

impl ApiClient {
    /// 環境変数の設定でAPIクライアントを作成
    pub fn from_env() -> AppResult<Self> {
        Self::new(ApiConfig::from_env()?)
    }

    /// 設定を指定してAPIクライアントを作成
    pub fn new(config: ApiConfig) -> AppResult<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::configuration(format!("HTTPクライアント初期化失敗: {e}")))?;

        Ok(Self { client, config })
    }

    /// 認証トークンを差し替えたクライアントを返す
    pub fn with_auth_token<S: Into<String>>(mut self, token: S) -> Self {
        self.config.auth_token = Some(token.into());
        self
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.config.base_url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// GETリクエストを送信
    pub async fn get<T>(&self, endpoint: &str) -> AppResult<T>
    where
        T: DeserializeOwned,
    {
        info!("GETリクエスト送信: endpoint={endpoint}");
        let request = self.authorize(self.client.get(self.url(endpoint)));
        let response = self.send(request, "GET", endpoint).await?;
        Self::parse_json(response, endpoint).await
    }

    /// GETリクエストを送信し、ボディをバイト列で受け取る
    pub async fn get_bytes(&self, endpoint: &str) -> AppResult<Vec<u8>> {
        info!("GETリクエスト送信（バイナリ）: endpoint={endpoint}");
        let request = self.authorize(self.client.get(self.url(endpoint)));
        let response = self.send(request, "GET", endpoint).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::transport(format!("レスポンス読み取り失敗: {e}")))?;
        Ok(bytes.to_vec())
    }

    /// POSTリクエストを送信（ボディなしも可）
    pub async fn post<B, T>(&self, endpoint: &str, body: Option<&B>) -> AppResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        info!("POSTリクエスト送信: endpoint={endpoint}");
        let mut request = self.client.post(self.url(endpoint));
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = self.send(self.authorize(request), "POST", endpoint).await?;
        Self::parse_json(response, endpoint).await
    }

    /// PUTリクエストを送信
    pub async fn put<B, T>(&self, endpoint: &str, body: &B) -> AppResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        info!("PUTリクエスト送信: endpoint={endpoint}");
        let request = self.authorize(self.client.put(self.url(endpoint)).json(body));
        let response = self.send(request, "PUT", endpoint).await?;
        Self::parse_json(response, endpoint).await
    }

    /// DELETEリクエストを送信（成功時はボディなし）
    pub async fn delete(&self, endpoint: &str) -> AppResult<()> {
        info!("DELETEリクエスト送信: endpoint={endpoint}");
        let request = self.authorize(self.client.delete(self.url(endpoint)));
        self.send(request, "DELETE", endpoint).await?;
        Ok(())
    }

    /// マルチパートフォームをPOSTする
    pub async fn post_multipart<T>(&self, endpoint: &str, form: multipart::Form) -> AppResult<T>
    where
        T: DeserializeOwned,
    {
        info!("マルチパートPOSTリクエスト送信: endpoint={endpoint}");
        let request = self.authorize(self.client.post(self.url(endpoint)).multipart(form));
        let response = self.send(request, "POST", endpoint).await?;
        Self::parse_json(response, endpoint).await
    }

    /// リクエストを1回だけ送信し、ステータスに応じてエラーを分類する
    async fn send(
        &self,
        request: RequestBuilder,
        method: &str,
        endpoint: &str,
    ) -> AppResult<Response> {
        let response = request.send().await.map_err(|e| {
            warn!("{method}リクエストで応答が得られませんでした: endpoint={endpoint}, error={e}");
            AppError::transport(format!("APIサーバーへの接続に失敗しました: {e}"))
        })?;

        if response.status().is_success() {
            debug!(
                "{method}リクエスト成功: endpoint={endpoint}, status={}",
                response.status()
            );
            return Ok(response);
        }

        Err(Self::handle_error_response(response, method, endpoint).await)
    }

    /// エラーレスポンスをAppErrorに変換
    async fn handle_error_response(response: Response, method: &str, endpoint: &str) -> AppError {
        let status = response.status();
        let response_text = response.text().await.unwrap_or_default();

        let message = serde_json::from_str::<ErrorResponse>(&response_text)
            .ok()
            .and_then(|error| error.message())
            .unwrap_or_else(|| {
                debug!("非構造化エラーレスポンス: status={status}, body={response_text}");
                generic_status_message(status).to_string()
            });

        warn!(
            "{method}リクエスト失敗: endpoint={endpoint}, status={}, message={message}",
            status.as_u16()
        );

        error_from_status(status, message)
    }

    async fn parse_json<T>(response: Response, endpoint: &str) -> AppResult<T>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        response.json().await.map_err(|e| {
            warn!("レスポンス解析エラー: endpoint={endpoint}, error={e}");
            AppError::Server {
                status: status.as_u16(),
                message: format!("レスポンス解析エラー: {e}"),
            }
        })
    }
}

/// HTTPステータスとメッセージからエラーを組み立てる
pub fn error_from_status(status: StatusCode, message: String) -> AppError {
    if status == StatusCode::CONFLICT {
        AppError::Duplicate(message)
    } else {
        AppError::Server {
            status: status.as_u16(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::receipts::models::UploadFile;
    use crate::shared::backend::ExpenseBackend;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// 1リクエストだけ受け付けて固定の応答を返すHTTPサーバー
    ///
    /// 戻り値はベースURLと、受信したリクエスト行を返すタスク
    async fn serve_once(
        status_line: &'static str,
        content_type: &'static str,
        body: &'static str,
    ) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;

            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;

            request.lines().next().unwrap_or_default().to_string()
        });

        (base_url, handle)
    }

    /// ヘッダーとボディを最後まで読む（Content-Lengthとchunkedの両方に対応）
    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut received = Vec::new();
        let mut buf = [0u8; 4096];

        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            received.extend_from_slice(&buf[..n]);

            let Some(header_end) = received.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&received[..header_end]).to_lowercase();
            let body_len = received.len() - (header_end + 4);

            if head.contains("transfer-encoding: chunked") {
                if received.ends_with(b"0\r\n\r\n") {
                    break;
                }
                continue;
            }

            let content_length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if body_len >= content_length {
                break;
            }
        }

        String::from_utf8_lossy(&received).into_owned()
    }

    fn client_for(base_url: String) -> ApiClient {
        ApiClient::new(ApiConfig {
            base_url,
            timeout_seconds: 5,
            auth_token: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_conflict_response_becomes_duplicate() {
        let (base_url, server) = serve_once(
            "409 Conflict",
            "application/json",
            r#"{"detail": "Чек уже загружен"}"#,
        )
        .await;
        let client = client_for(base_url);

        let file = UploadFile::new("check.jpg", vec![1, 2, 3]);
        let result = client.upload_receipt(7, &file, "taxi").await;

        match result {
            Err(AppError::Duplicate(message)) => assert_eq!(message, "Чек уже загружен"),
            other => panic!("Duplicateになるべき: {other:?}"),
        }
        assert_eq!(
            server.await.unwrap(),
            "POST /receipts/trip/7/upload HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn test_html_error_page_uses_generic_message() {
        let (base_url, server) = serve_once(
            "502 Bad Gateway",
            "text/html",
            "<html><body><h1>502 Bad Gateway</h1></body></html>",
        )
        .await;
        let client = client_for(base_url);

        let result: AppResult<serde_json::Value> = client.get("/trips/1").await;

        match result {
            Err(AppError::Server { status, message }) => {
                assert_eq!(status, 502);
                assert_eq!(message, generic_status_message(StatusCode::BAD_GATEWAY));
            }
            other => panic!("Serverになるべき: {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_detail_string_becomes_server_message() {
        let (base_url, server) = serve_once(
            "404 Not Found",
            "application/json",
            r#"{"detail": "Trip not found"}"#,
        )
        .await;
        let client = client_for(base_url);

        let result = client.get_trip(42).await;

        match result {
            Err(AppError::Server { status, message }) => {
                assert_eq!(status, 404);
                assert_eq!(message, "Trip not found");
            }
            other => panic!("Serverになるべき: {other:?}"),
        }
        assert_eq!(server.await.unwrap(), "GET /trips/42 HTTP/1.1");
    }

    #[tokio::test]
    async fn test_delete_succeeds_on_no_content() {
        let (base_url, server) = serve_once("204 No Content", "application/json", "").await;
        let client = client_for(base_url);

        assert!(client.delete_receipt(5).await.is_ok());
        assert_eq!(server.await.unwrap(), "DELETE /receipts/5 HTTP/1.1");
    }

    #[test]
    fn test_error_response_string_detail() {
        let error: ErrorResponse =
            serde_json::from_str(r#"{"detail": "Trip not found"}"#).unwrap();
        assert_eq!(error.message(), Some("Trip not found".to_string()));
    }

    #[test]
    fn test_error_response_validation_detail() {
        let error: ErrorResponse = serde_json::from_str(
            r#"{"detail": [{"loc": ["body", "amount"], "msg": "value is not a valid float"},
                           {"loc": ["body", "x"], "msg": "field required"}]}"#,
        )
        .unwrap();
        assert_eq!(
            error.message(),
            Some("value is not a valid float; field required".to_string())
        );
    }

    #[test]
    fn test_error_response_empty_detail() {
        let error: ErrorResponse = serde_json::from_str(r#"{"detail": ""}"#).unwrap();
        assert_eq!(error.message(), None);
    }

    #[test]
    fn test_error_from_status() {
        assert!(matches!(
            error_from_status(StatusCode::CONFLICT, "dup".to_string()),
            AppError::Duplicate(_)
        ));
        assert!(matches!(
            error_from_status(StatusCode::BAD_REQUEST, "bad".to_string()),
            AppError::Server { status: 400, .. }
        ));
    }

    #[test]
    fn test_generic_status_message() {
        assert_eq!(
            generic_status_message(StatusCode::UNAUTHORIZED),
            "認証に失敗しました。再度ログインしてください"
        );
        assert_eq!(
            generic_status_message(StatusCode::IM_A_TEAPOT),
            "不明なエラーが発生しました"
        );
    }

    #[test]
    fn test_client_rejects_invalid_config() {
        let config = ApiConfig {
            base_url: String::new(),
            ..ApiConfig::default()
        };
        assert!(ApiClient::new(config).is_err());
    }

    #[test]
    fn test_client_with_token() {
        let client = ApiClient::new(ApiConfig::default())
            .unwrap()
            .with_auth_token("abc");
        assert_eq!(client.config().auth_token.as_deref(), Some("abc"));
        assert_eq!(client.url("/trips/1"), "http://localhost:8000/trips/1");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        // 予約済みポートで待ち受けているサーバーはないため接続に失敗する
        let config = ApiConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_seconds: 2,
            auth_token: None,
        };
        let client = ApiClient::new(config).unwrap();
        let result: AppResult<serde_json::Value> = client.get("/trips/1").await;
        assert!(matches!(result, Err(AppError::Transport(_))));
    }
}
