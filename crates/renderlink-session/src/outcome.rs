//! 受信処理の結果と、有効化ゲート付きの送信

use renderlink_dispatch::DispatchReport;
use renderlink_proto::{CommunicationMessageType, Message};
use renderlink_transport::{DropReason, FramePort, SendOutcome, TransportChannel};

use crate::error::SessionError;
use crate::state::CommunicatorState;

/// `handle_event` 1 回分の結果
///
/// どの結果もエラーではない。テストとログのために理由を区別している。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// トランスポートのフィルタで捨てた
    Dropped(DropReason),
    /// 有効化前に届いたので捨てた（キューには積まない）
    NotEnabled(CommunicationMessageType),
    /// `RENDERER_READY` を受け付けなかった
    HandshakeRejected(HandshakeRejection),
    /// ハンドシェイクが完了し、購読者に配った
    HandshakeCompleted(DispatchReport),
    /// 購読者に配った
    Dispatched(DispatchReport),
}

impl EventOutcome {
    /// 購読者に配られたか
    pub fn is_dispatched(&self) -> bool {
        matches!(
            self,
            EventOutcome::Dispatched(_) | EventOutcome::HandshakeCompleted(_)
        )
    }

    /// 呼ばれたハンドラ数
    pub fn invoked(&self) -> usize {
        match self {
            EventOutcome::Dispatched(report) | EventOutcome::HandshakeCompleted(report) => report.invoked,
            _ => 0,
        }
    }
}

/// `RENDERER_READY` を受け付けなかった理由
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeRejection {
    /// iframe がまだ `attach_frame` されていない
    NoFrameAttached,
    /// 送信元が自分の iframe ではない
    ForeignSource,
    /// 状態機械が遷移を許さなかった
    InvalidState(SessionError),
}

/// Communicator が `Enabled` のときだけ送信する
///
/// 呼び出し側は事前に状態を確認しなくてよい。送れなかった場合はログに残し、
/// チャンネルの統計に数える。
pub(crate) fn send_if_enabled<P: FramePort>(
    state: CommunicatorState,
    channel: &mut TransportChannel<P>,
    message: &Message,
) -> SendOutcome {
    if state.is_enabled() {
        return channel.send(message);
    }
    channel.record_not_sent(message);
    if channel.target().is_none() {
        log::warn!("Other side is not set. Message {} was not sent", message.message_type());
        SendOutcome::NoTarget
    } else {
        log::warn!(
            "Communication isn't enabled. Maybe the other side is not ready? Message {} was not sent",
            message.message_type()
        );
        SendOutcome::NotEnabled
    }
}
