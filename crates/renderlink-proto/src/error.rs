//! renderlink-proto エラー型

use alloc::string::String;

/// メッセージのデコードエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtoError {
    /// ペイロードが JSON オブジェクトではない
    NotAnObject,
    /// `type` フィールドが存在しない（または文字列ではない）
    MissingType,
    /// 未知のメッセージタグ
    UnknownType(String),
    /// タグは既知だがペイロードの形が合わない
    InvalidPayload {
        /// デコードしようとしたタグ
        tag: &'static str,
        /// serde_json のエラーメッセージ
        reason: String,
    },
    /// エンコード失敗（通常は起こらない）
    EncodeFailed(String),
}

impl core::fmt::Display for ProtoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ProtoError::NotAnObject => write!(f, "Message payload is not an object"),
            ProtoError::MissingType => write!(f, "Message has no string `type` field"),
            ProtoError::UnknownType(tag) => write!(f, "Unknown message type: {}", tag),
            ProtoError::InvalidPayload { tag, reason } => {
                write!(f, "Invalid payload for {}: {}", tag, reason)
            }
            ProtoError::EncodeFailed(reason) => write!(f, "Message encode failed: {}", reason),
        }
    }
}
