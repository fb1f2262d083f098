//! renderlink-transport エラー型

use renderlink_proto::ProtoError;

/// トランスポート層のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// URL として解釈できない
    InvalidUrl { url: String, reason: String },
    /// URL の origin が opaque（`data:` / `file:` など）で宛先に使えない
    OpaqueOrigin(String),
    /// 送信先ウィンドウが既に閉じている
    PortClosed,
    /// メッセージを構造化データに変換できない
    Encode(ProtoError),
    /// 下位の postMessage が失敗した
    PostFailed(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::InvalidUrl { url, reason } => write!(f, "Invalid URL {:?}: {}", url, reason),
            TransportError::OpaqueOrigin(url) => write!(f, "URL {:?} has an opaque origin", url),
            TransportError::PortClosed => write!(f, "Target window is closed"),
            TransportError::Encode(e) => write!(f, "Message encode failed: {}", e),
            TransportError::PostFailed(reason) => write!(f, "postMessage failed: {}", reason),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<ProtoError> for TransportError {
    fn from(e: ProtoError) -> Self {
        TransportError::Encode(e)
    }
}
