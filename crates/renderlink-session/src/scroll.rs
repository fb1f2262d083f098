//! スクロールのエコー抑止
//!
//! エディタがレンダラーをスクロールさせ、レンダラーがそれをエディタに報告し、
//! エディタがまたレンダラーをスクロールさせる…という無限ループを防ぐため、
//! スクロール位置を送ってよいのは「スクロールソース」になっている側だけ。
//!
//! ```text
//! renderer: ユーザーが iframe 内をスクロール → make_scroll_source()
//!           → ENABLE_RENDERER_SCROLL_SOURCE を送信、以降 SET_SCROLL_STATE を送る
//! editor:   ユーザーがエディタをスクロール → make_editor_scroll_source()
//!           → DISABLE_RENDERER_SCROLL_SOURCE を送信、レンダラーは送信をやめる
//! ```
//!
//! 抑止は送信側（producer）で行う。受信側ではフィルタしない。

use renderlink_proto::ScrollState;

/// 現在のスクロールソース（エディタ側が持つ）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollSource {
    #[default]
    Editor,
    Renderer,
}

/// エディタ側のスクロール送信判定
///
/// エディタがスクロールソースのときだけ、直前に送ったものと異なる状態を送る。
#[derive(Debug, Clone, Default)]
pub struct EditorScrollSync {
    source: ScrollSource,
    last_sent: Option<ScrollState>,
}

impl EditorScrollSync {
    pub fn source(&self) -> ScrollSource {
        self.source
    }

    /// レンダラーがスクロールソースになった（`ENABLE_RENDERER_SCROLL_SOURCE` 受信）
    pub fn renderer_took_over(&mut self) {
        self.source = ScrollSource::Renderer;
        self.last_sent = None;
    }

    /// エディタがスクロールソースに戻る
    ///
    /// レンダラーがソースだった場合 `true`（`DISABLE_RENDERER_SCROLL_SOURCE` を送る必要がある）。
    pub fn editor_takes_over(&mut self) -> bool {
        let was_renderer = self.source == ScrollSource::Renderer;
        self.source = ScrollSource::Editor;
        was_renderer
    }

    /// `state` を送るべきか
    pub fn should_send(&self, state: ScrollState) -> bool {
        self.source == ScrollSource::Editor && self.last_sent != Some(state)
    }

    /// `state` が相手に届いた
    pub fn record_sent(&mut self, state: ScrollState) {
        self.last_sent = Some(state);
    }

    /// 相手が入れ替わったので初期状態に戻す
    pub fn reset(&mut self) {
        *self = EditorScrollSync::default();
    }
}

/// レンダラー側のスクロール送信ガード
#[derive(Debug, Clone, Copy, Default)]
pub struct ScrollSourceGuard {
    active: bool,
}

impl ScrollSourceGuard {
    /// レンダラーがスクロールソースになる
    pub fn enable(&mut self) {
        self.active = true;
    }

    /// `DISABLE_RENDERER_SCROLL_SOURCE` を受信した
    pub fn disable(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}
