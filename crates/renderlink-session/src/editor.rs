//! エディタ側 Communicator
//!
//! iframe の親（エディタページ）で動く。レンダラーからの `RENDERER_READY` を受けて
//! ハンドシェイクを行い、以降は markdown・ダークモード・スクロール位置を送り、
//! 高さ・見出し・ワードカウント・拡張イベントを受け取る。
//!
//! ## ハンドシェイク
//!
//! ```text
//! renderer                              editor
//!    │ ── RENDERER_READY ─────────────────▶ │ 送信元が attach 済みの iframe か確認
//!    │                                      │ set_message_target(iframe, renderer origin)
//!    │                                      │ enable_communication()
//!    │ ◀──────────── SET_BASE_CONFIGURATION │ （ハンドシェイクごとに 1 回、最初に送る）
//!    │ ◀──────────────────── SET_DARKMODE   │ ┐
//!    │ ◀──────────── SET_MARKDOWN_CONTENT   │ ├ 保持している状態があれば続けて送る
//!    │ ◀─────────────── SET_SLIDE_OPTIONS   │ ┘
//! ```
//!
//! iframe の再読み込みやレンダラー種別の変更で送信先を失うと `Listening` に戻る。
//! 登録済みのハンドラは残るので、次のハンドシェイクで購読し直す必要はない。

use std::cell::RefCell;

use renderlink_dispatch::{HandlerResult, ReceiveDispatcher, Subscription};
use renderlink_proto::{
    BaseConfiguration, CommunicationMessageType, Message, RendererType, ScrollState, Side, SlideOptions,
};
use renderlink_transport::{ChannelStats, FramePort, InboundEvent, Origin, SendOutcome, TransportChannel};

use crate::config::EditorConfig;
use crate::error::SessionError;
use crate::extension::ExtensionEventEmitter;
use crate::identity::CommunicatorIdentity;
use crate::outcome::{send_if_enabled, EventOutcome, HandshakeRejection};
use crate::scroll::{EditorScrollSync, ScrollSource};
use crate::state::CommunicatorState;

/// iframe 読み込み時にホストが取るべき動作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameLoadAction {
    /// iframe を render ページに遷移させる（`frame.src = url`）
    Navigate(String),
    /// 直前の遷移が完了した。何もしない
    RedirectComplete,
}

/// iframe の高さ
#[derive(Debug, Clone, Copy)]
struct FrameLayout {
    adapt_to_content: bool,
    height: f64,
}

/// レンダラーに届けるべき状態
///
/// 値そのものと、現在の相手に届いたかどうかを持つ。届いていない値は
/// 同じ値で再設定されても送り直す。
#[derive(Debug)]
struct Outgoing<T> {
    value: Option<T>,
    delivered: bool,
}

impl<T> Default for Outgoing<T> {
    fn default() -> Self {
        Outgoing {
            value: None,
            delivered: false,
        }
    }
}

impl<T: Clone + PartialEq> Outgoing<T> {
    /// 新しい値を記録する。現在の相手に届けた値と同じなら `false`。
    fn update(&mut self, value: T) -> bool {
        if self.delivered && self.value.as_ref() == Some(&value) {
            return false;
        }
        self.value = Some(value);
        self.delivered = false;
        true
    }

    fn value(&self) -> Option<T> {
        self.value.clone()
    }

    fn record(&mut self, outcome: &SendOutcome) -> bool {
        self.delivered = outcome.is_delivered();
        self.delivered
    }

    /// 相手が入れ替わった。値は次のハンドシェイクで送り直す
    fn forget_delivery(&mut self) {
        self.delivered = false;
    }
}

struct EditorInner<P: FramePort> {
    state: CommunicatorState,
    channel: TransportChannel<P>,
    /// 自分が持っている iframe のウィンドウ
    frame: Option<P>,
    renderer_ready: bool,
    renderer_type: RendererType,
    redirect_in_progress: bool,
    scroll: EditorScrollSync,
    layout: FrameLayout,
    content: Outgoing<Vec<String>>,
    dark_mode: Outgoing<bool>,
    slide_options: Outgoing<SlideOptions>,
    first_heading: Option<String>,
    word_count: Option<u32>,
    extension_events: Option<ExtensionEventEmitter>,
}

impl<P: FramePort> EditorInner<P> {
    fn send(&mut self, message: &Message) -> SendOutcome {
        send_if_enabled(self.state, &mut self.channel, message)
    }

    fn is_ready(&self) -> bool {
        self.renderer_ready && self.state.is_enabled()
    }

    /// 送信先を失った（再読み込み・種別変更・アンマウント）
    fn reset_peer(&mut self) {
        if self.renderer_ready {
            log::debug!("Reset render status");
        }
        self.renderer_ready = false;
        self.channel.clear_target();
        self.state = self.state.on_reset();
        self.forget_peer_state();
    }

    /// 相手に届けた状態の記録を消す
    fn forget_peer_state(&mut self) {
        self.scroll.reset();
        self.content.forget_delivery();
        self.dark_mode.forget_delivery();
        self.slide_options.forget_delivery();
    }

    /// 保持している状態をすべて送る（ハンドシェイク直後）
    fn push_pending_state(&mut self) {
        if let Some(activated) = self.dark_mode.value() {
            let outcome = self.send(&Message::SetDarkMode { activated });
            self.dark_mode.record(&outcome);
        }
        if let Some(content) = self.content.value() {
            let outcome = self.send(&Message::SetMarkdownContent { content });
            self.content.record(&outcome);
        }
        if let Some(slide_options) = self.slide_options.value() {
            let outcome = self.send(&Message::SetSlideOptions { slide_options });
            self.slide_options.record(&outcome);
        }
    }

    fn begin_handshake(&mut self, frame: P, origin: Origin) -> Result<(), SessionError> {
        self.state = self.state.on_target_set()?;
        self.channel.set_target(frame, origin);
        self.state = self.state.on_enable()?;
        Ok(())
    }

    /// ディスパッチ前に Communicator 自身が反映する受信メッセージ
    fn apply_incoming(&mut self, message: &Message) -> Option<ExtensionEventEmitter> {
        match message {
            Message::OnHeightChange { height } => {
                if self.layout.adapt_to_content {
                    self.layout.height = *height;
                }
            }
            Message::EnableRendererScrollSource => self.scroll.renderer_took_over(),
            Message::OnFirstHeadingChange { first_heading } => {
                self.first_heading = first_heading.clone();
            }
            Message::OnWordCountCalculated { words } => self.word_count = Some(*words),
            Message::ExtensionEvent { .. } => return self.extension_events.clone(),
            _ => {}
        }
        None
    }
}

/// エディタ側 Communicator
///
/// ホストのコンポーネントのマウントごとに 1 つ作り、参照で共有する
/// （グローバルなシングルトンにはしない）。API はすべて `&self` で、
/// ハンドラ実行中やポート送信中に内部状態の借用を保持しないため、
/// ハンドラの中からこの Communicator を呼んでよい。
pub struct EditorCommunicator<P: FramePort> {
    identity: CommunicatorIdentity,
    base_url: String,
    renderer_origin: Origin,
    render_page_url: String,
    dispatcher: ReceiveDispatcher,
    inner: RefCell<EditorInner<P>>,
}

impl<P: FramePort> EditorCommunicator<P> {
    /// Communicator を生成する（`Uninitialized`）
    ///
    /// # エラー
    /// - 設定中の URL が解釈できない
    pub fn new(config: EditorConfig, identity: CommunicatorIdentity) -> Result<Self, SessionError> {
        config.validate()?;
        let renderer_origin = config.renderer_origin()?;
        let render_page_url = config.render_page_url(&identity)?;

        Ok(EditorCommunicator {
            inner: RefCell::new(EditorInner {
                state: CommunicatorState::Uninitialized,
                channel: TransportChannel::new(Side::Editor, Some(renderer_origin.clone())),
                frame: None,
                renderer_ready: false,
                renderer_type: config.renderer_type,
                redirect_in_progress: false,
                scroll: EditorScrollSync::default(),
                layout: FrameLayout {
                    adapt_to_content: config.adapt_frame_height_to_content,
                    height: 0.0,
                },
                content: Outgoing::default(),
                dark_mode: Outgoing::default(),
                slide_options: Outgoing::default(),
                first_heading: None,
                word_count: None,
                extension_events: None,
            }),
            identity,
            base_url: config.base_url,
            renderer_origin,
            render_page_url,
            dispatcher: ReceiveDispatcher::new(),
        })
    }

    pub fn identity(&self) -> &CommunicatorIdentity {
        &self.identity
    }

    pub fn state(&self) -> CommunicatorState {
        self.inner.borrow().state
    }

    /// ハンドシェイクが完了し、通信が有効か
    pub fn is_renderer_ready(&self) -> bool {
        let inner = self.inner.borrow();
        inner.renderer_ready && inner.state.is_enabled()
    }

    pub fn renderer_origin(&self) -> &Origin {
        &self.renderer_origin
    }

    /// iframe の `src` に設定する URL
    pub fn render_page_url(&self) -> &str {
        &self.render_page_url
    }

    pub fn renderer_type(&self) -> RendererType {
        self.inner.borrow().renderer_type
    }

    pub fn stats(&self) -> ChannelStats {
        self.inner.borrow().channel.stats()
    }

    pub fn dispatcher(&self) -> &ReceiveDispatcher {
        &self.dispatcher
    }

    /// 受信ハンドラを登録する（[`ReceiveDispatcher::subscribe`] の短縮形）
    pub fn subscribe<F>(&self, tag: CommunicationMessageType, handler: F) -> Subscription
    where
        F: FnMut(&Message) -> HandlerResult + 'static,
    {
        self.dispatcher.subscribe(tag, handler)
    }

    // ===== ライフサイクル =====

    /// 受信リスナーを登録する（`Uninitialized → Listening`）
    ///
    /// 実際に登録状態が変わったときだけ `true`。ホストはそのときだけ
    /// ブラウザの `message` リスナーを追加する。
    pub fn register_event_listener(&self) -> Result<bool, SessionError> {
        let mut inner = self.inner.borrow_mut();
        inner.state = inner.state.on_listen()?;
        let changed = inner.channel.register_listener();
        if changed {
            log::debug!("Registered message listener for {}", self.identity);
        }
        Ok(changed)
    }

    /// 受信リスナーを解除する（終端）
    ///
    /// 以降この Communicator は何もディスパッチしない。
    pub fn unregister_event_listener(&self) -> bool {
        let mut inner = self.inner.borrow_mut();
        let changed = inner.channel.unregister_listener();
        inner.reset_peer();
        inner.state = inner.state.on_close();
        if changed {
            log::debug!("Unregistered message listener for {}", self.identity);
        }
        changed
    }

    /// 自分の iframe のウィンドウを記録する
    pub fn attach_frame(&self, frame: P) {
        self.inner.borrow_mut().frame = Some(frame);
    }

    /// iframe がなくなった
    pub fn detach_frame(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.frame = None;
        inner.reset_peer();
    }

    /// 送信先を設定する（`→ TargetSet`）
    ///
    /// `Enabled` から呼ばれた場合も通信は止まり、レンダラーは未準備に戻る。
    /// 保持している状態は次のハンドシェイクで送り直す。
    pub fn set_message_target(&self, port: P, origin: Origin) -> Result<(), SessionError> {
        let mut inner = self.inner.borrow_mut();
        inner.state = inner.state.on_target_set()?;
        inner.channel.set_target(port, origin);
        inner.renderer_ready = false;
        inner.forget_peer_state();
        Ok(())
    }

    /// 送信先をクリアし、レンダラーを未準備に戻す（`→ Listening`）
    pub fn unset_message_target(&self) {
        self.inner.borrow_mut().reset_peer();
    }

    /// 通信を有効化する（`TargetSet → Enabled`）
    pub fn enable_communication(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.borrow_mut();
        inner.state = inner.state.on_enable()?;
        Ok(())
    }

    /// iframe の `load` イベント
    ///
    /// 自分で遷移させた直後の `load` 以外は「iframe が別のページに移った」とみなし、
    /// レンダラーを未準備に戻して render ページへ遷移させる。
    pub fn on_frame_load(&self) -> FrameLoadAction {
        let mut inner = self.inner.borrow_mut();
        if inner.redirect_in_progress {
            inner.redirect_in_progress = false;
            log::debug!("Redirect complete");
            return FrameLoadAction::RedirectComplete;
        }
        inner.reset_peer();
        inner.redirect_in_progress = true;
        log::debug!("Navigated away. Redirect to {}", self.render_page_url);
        FrameLoadAction::Navigate(self.render_page_url.clone())
    }

    /// レンダラー種別を変える
    ///
    /// 変わった場合はレンダラーを読み込み直す必要があるので、その動作を返す。
    pub fn set_renderer_type(&self, renderer_type: RendererType) -> Option<FrameLoadAction> {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.renderer_type == renderer_type {
                return None;
            }
            log::debug!("Renderer type changed to {}", renderer_type.as_str());
            inner.renderer_type = renderer_type;
            inner.redirect_in_progress = false;
        }
        Some(self.on_frame_load())
    }

    // ===== 送受信 =====

    /// メッセージを送る
    ///
    /// `Enabled` でなければ送らずにログに残す。呼び出し側が準備状態を確認する必要はない。
    pub fn send_message(&self, message: Message) -> SendOutcome {
        self.inner.borrow_mut().send(&message)
    }

    /// 受信イベントを処理する
    ///
    /// - `RENDERER_READY` はハンドシェイクとして扱う
    /// - それ以外は `Enabled` のときだけ購読者に配る。有効化前のものは捨てる
    pub fn handle_event(&self, event: InboundEvent<P>) -> EventOutcome {
        let source = event.source.clone();
        let accepted = self.inner.borrow_mut().channel.accept(event);
        let message = match accepted {
            Ok(message) => message,
            Err(reason) => return EventOutcome::Dropped(reason),
        };

        if matches!(message, Message::RendererReady) {
            return self.complete_handshake(source, &message);
        }

        let emitter = {
            let mut inner = self.inner.borrow_mut();
            if !inner.state.is_enabled() {
                log::debug!("Dropped {} received before communication was enabled", message.message_type());
                return EventOutcome::NotEnabled(message.message_type());
            }
            inner.apply_incoming(&message)
        };

        if let (Some(emitter), Message::ExtensionEvent { event_name, payload }) = (emitter, &message) {
            emitter.emit(event_name, payload);
        }
        EventOutcome::Dispatched(self.dispatcher.dispatch(&message))
    }

    fn complete_handshake(&self, source: Option<P>, message: &Message) -> EventOutcome {
        {
            let mut inner = self.inner.borrow_mut();
            let frame = match inner.frame.clone() {
                Some(frame) => frame,
                None => {
                    log::error!("Renderer ready triggered without frame");
                    return EventOutcome::HandshakeRejected(HandshakeRejection::NoFrameAttached);
                }
            };
            if !source.as_ref().map_or(false, |s| frame.is_same_frame(s)) {
                log::warn!("Renderer ready from a frame that is not ours");
                return EventOutcome::HandshakeRejected(HandshakeRejection::ForeignSource);
            }

            // Enabled 中の再通知（レンダラー側の再読み込み）もハンドシェイクをやり直す
            inner.forget_peer_state();
            if let Err(e) = inner.begin_handshake(frame, self.renderer_origin.clone()) {
                log::error!("Handshake failed: {}", e);
                return EventOutcome::HandshakeRejected(HandshakeRejection::InvalidState(e));
            }

            let base = Message::SetBaseConfiguration {
                base_configuration: BaseConfiguration {
                    base_url: self.base_url.clone(),
                    renderer_type: inner.renderer_type,
                },
            };
            inner.send(&base);
            inner.renderer_ready = true;
            log::debug!("Renderer ready with origin {}", self.renderer_origin);
            inner.push_pending_state();
        }
        EventOutcome::HandshakeCompleted(self.dispatcher.dispatch(message))
    }

    // ===== アプリケーション向けの送信 =====

    /// markdown を設定する。準備完了していれば送る。
    ///
    /// 未準備のときは保持だけしておき、ハンドシェイク完了時に送る。
    /// 送信したら `true`。
    pub fn set_markdown_content(&self, lines: Vec<String>) -> bool {
        let mut inner = self.inner.borrow_mut();
        if !inner.content.update(lines.clone()) || !inner.is_ready() {
            return false;
        }
        let outcome = inner.send(&Message::SetMarkdownContent { content: lines });
        inner.content.record(&outcome)
    }

    /// ダークモードの実効値を設定する
    pub fn set_dark_mode(&self, activated: bool) -> bool {
        let mut inner = self.inner.borrow_mut();
        if !inner.dark_mode.update(activated) || !inner.is_ready() {
            return false;
        }
        let outcome = inner.send(&Message::SetDarkMode { activated });
        inner.dark_mode.record(&outcome)
    }

    /// スライドショーのオプションを設定する
    pub fn set_slide_options(&self, slide_options: SlideOptions) -> bool {
        let mut inner = self.inner.borrow_mut();
        if !inner.slide_options.update(slide_options.clone()) || !inner.is_ready() {
            return false;
        }
        let outcome = inner.send(&Message::SetSlideOptions { slide_options });
        inner.slide_options.record(&outcome)
    }

    /// エディタのスクロール位置を送る
    ///
    /// エディタがスクロールソースのときだけ、直前に届けたものと異なる位置を送る。
    /// 有限でない値は送らない。
    pub fn send_scroll_state(&self, scroll_state: ScrollState) -> bool {
        if !scroll_state.scrolled_percentage.is_finite() {
            log::warn!("Ignored non-finite scroll state {:?}", scroll_state);
            return false;
        }
        let mut inner = self.inner.borrow_mut();
        if !inner.is_ready() || !inner.scroll.should_send(scroll_state) {
            return false;
        }
        let delivered = inner.send(&Message::SetScrollState { scroll_state }).is_delivered();
        if delivered {
            inner.scroll.record_sent(scroll_state);
        }
        delivered
    }

    /// エディタをスクロールソースに戻す
    ///
    /// レンダラーがソースだった場合は `DISABLE_RENDERER_SCROLL_SOURCE` を送る。
    pub fn make_editor_scroll_source(&self) -> bool {
        let mut inner = self.inner.borrow_mut();
        if !inner.scroll.editor_takes_over() || !inner.is_ready() {
            return false;
        }
        inner.send(&Message::DisableRendererScrollSource).is_delivered()
    }

    pub fn scroll_source(&self) -> ScrollSource {
        self.inner.borrow().scroll.source()
    }

    /// レンダラーにワードカウントを依頼する（結果は `ON_WORD_COUNT_CALCULATED`）
    pub fn request_word_count(&self) -> bool {
        self.inner.borrow_mut().send(&Message::GetWordCount).is_delivered()
    }

    /// 最後に受け取ったワードカウント
    pub fn word_count(&self) -> Option<u32> {
        self.inner.borrow().word_count
    }

    /// 最後に受け取った最初の見出し
    pub fn first_heading(&self) -> Option<String> {
        self.inner.borrow().first_heading.clone()
    }

    /// `EXTENSION_EVENT` の転送先を設定する
    pub fn set_extension_event_emitter(&self, emitter: Option<ExtensionEventEmitter>) {
        self.inner.borrow_mut().extension_events = emitter;
    }

    /// 高さをコンテンツに合わせるか
    pub fn set_adapt_frame_height(&self, adapt: bool) {
        self.inner.borrow_mut().layout.adapt_to_content = adapt;
    }

    /// iframe の高さ（px）
    pub fn frame_height(&self) -> f64 {
        self.inner.borrow().layout.height
    }

    /// iframe に適用するインラインスタイル
    pub fn frame_style(&self) -> String {
        format!("height: {}px", self.frame_height())
    }
}
