//! renderlink-session エラー型

use renderlink_transport::TransportError;

use crate::state::CommunicatorState;

/// セッション層のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// 設定値が不正（URL・origin）
    Config(TransportError),
    /// 現在の状態では許されない操作
    InvalidTransition {
        from: CommunicatorState,
        action: &'static str,
    },
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Config(e) => write!(f, "Invalid configuration: {}", e),
            SessionError::InvalidTransition { from, action } => {
                write!(f, "Cannot {} while {}", action, from)
            }
        }
    }
}

impl std::error::Error for SessionError {}

impl From<TransportError> for SessionError {
    fn from(e: TransportError) -> Self {
        SessionError::Config(e)
    }
}
