//! Communicator のライフサイクル状態機械
//!
//! ```text
//!                 register          set_target          enable
//! Uninitialized ──────────▶ Listening ──────────▶ TargetSet ──────▶ Enabled
//!                              ▲                      │                 │
//!                              └────── reset ─────────┴─────────────────┘
//!
//! unregister（どの状態からでも） ──▶ Closed（終端）
//! ```
//!
//! - `Enabled` のときだけ送信と受信ディスパッチを行う
//! - reset（iframe の再読み込み・レンダラー種別の変更）ではハンドラを残したまま
//!   `Listening` に戻る

use crate::error::SessionError;

/// Communicator の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommunicatorState {
    /// 生成直後。受信リスナー未登録
    Uninitialized,
    /// 受信リスナー登録済み、送信先未確定
    Listening,
    /// 送信先確定、通信はまだ無効
    TargetSet,
    /// 送受信が有効
    Enabled,
    /// 受信リスナー解除済み（終端）
    Closed,
}

impl CommunicatorState {
    /// 受信リスナー登録
    ///
    /// すでに登録済みの状態では何も変えない。
    pub fn on_listen(self) -> Result<Self, SessionError> {
        match self {
            CommunicatorState::Uninitialized => Ok(CommunicatorState::Listening),
            CommunicatorState::Closed => Err(self.invalid("register the event listener")),
            other => Ok(other),
        }
    }

    /// 送信先の設定
    ///
    /// `Enabled` 中に送信先を差し替えた場合は有効化をやり直す必要がある。
    pub fn on_target_set(self) -> Result<Self, SessionError> {
        match self {
            CommunicatorState::Listening
            | CommunicatorState::TargetSet
            | CommunicatorState::Enabled => Ok(CommunicatorState::TargetSet),
            other => Err(other.invalid("set the message target")),
        }
    }

    /// 通信の有効化
    pub fn on_enable(self) -> Result<Self, SessionError> {
        match self {
            CommunicatorState::TargetSet | CommunicatorState::Enabled => Ok(CommunicatorState::Enabled),
            other => Err(other.invalid("enable communication")),
        }
    }

    /// 送信先を失った（再読み込み・種別変更）
    pub fn on_reset(self) -> Self {
        match self {
            CommunicatorState::TargetSet | CommunicatorState::Enabled => CommunicatorState::Listening,
            other => other,
        }
    }

    /// 受信リスナー解除
    pub fn on_close(self) -> Self {
        CommunicatorState::Closed
    }

    /// 送信・受信ディスパッチが許されるか
    pub fn is_enabled(self) -> bool {
        self == CommunicatorState::Enabled
    }

    /// 受信リスナーが登録されているか
    pub fn is_listening(self) -> bool {
        matches!(
            self,
            CommunicatorState::Listening | CommunicatorState::TargetSet | CommunicatorState::Enabled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CommunicatorState::Uninitialized => "UNINITIALIZED",
            CommunicatorState::Listening => "LISTENING",
            CommunicatorState::TargetSet => "TARGET_SET",
            CommunicatorState::Enabled => "ENABLED",
            CommunicatorState::Closed => "CLOSED",
        }
    }

    fn invalid(self, action: &'static str) -> SessionError {
        SessionError::InvalidTransition { from: self, action }
    }
}

impl std::fmt::Display for CommunicatorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use CommunicatorState::*;

    #[test]
    fn test_happy_path() {
        let s = Uninitialized.on_listen().unwrap();
        assert_eq!(s, Listening);
        let s = s.on_target_set().unwrap();
        assert_eq!(s, TargetSet);
        let s = s.on_enable().unwrap();
        assert_eq!(s, Enabled);
        assert!(s.is_enabled());
    }

    #[test]
    fn test_enable_requires_target() {
        assert!(Listening.on_enable().is_err());
        assert!(Uninitialized.on_enable().is_err());
        assert!(Closed.on_enable().is_err());
    }

    #[test]
    fn test_target_requires_listener() {
        assert_eq!(
            Uninitialized.on_target_set(),
            Err(SessionError::InvalidTransition {
                from: Uninitialized,
                action: "set the message target"
            })
        );
    }

    #[test]
    fn test_retarget_while_enabled_disables() {
        assert_eq!(Enabled.on_target_set().unwrap(), TargetSet);
    }

    #[test]
    fn test_reset_returns_to_listening() {
        assert_eq!(Enabled.on_reset(), Listening);
        assert_eq!(TargetSet.on_reset(), Listening);
        assert_eq!(Listening.on_reset(), Listening);
        assert_eq!(Uninitialized.on_reset(), Uninitialized);
        assert_eq!(Closed.on_reset(), Closed);
    }

    #[test]
    fn test_listen_is_idempotent_and_closed_is_terminal() {
        assert_eq!(Enabled.on_listen().unwrap(), Enabled);
        assert_eq!(Listening.on_listen().unwrap(), Listening);
        assert!(Closed.on_listen().is_err());
        assert_eq!(Enabled.on_close(), Closed);
        assert!(!Closed.is_listening());
    }
}
