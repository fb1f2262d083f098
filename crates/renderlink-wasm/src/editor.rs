//! EditorBridge wasm-bindgen エクスポート
//!
//! エディタページから呼び出す。iframe の `load` イベントとアプリケーションの状態変化を
//! [`EditorCommunicator`] に渡し、ブラウザの `message` リスナーを管理する。

use std::rc::{Rc, Weak};

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{HtmlIFrameElement, MessageEvent, Window};

use renderlink_proto::{RendererType, ScrollState, SlideOptions};
use renderlink_session::{
    CommunicatorIdentity, DarkModeAction, DarkModeStore, EditorCommunicator, EditorConfig, ExtensionEventEmitter,
    FrameLoadAction,
};

use crate::darkmode;
use crate::handle::{js_handler, parse_tag, ExtensionListenerHandle, SubscriptionHandle};
use crate::port::{inbound_event, to_js, WindowPort};

type MessageListener = Closure<dyn FnMut(MessageEvent)>;

/// エディタ側の Communicator
///
/// ## 内部構成
///
/// ```text
/// EditorBridge
///   ├── EditorCommunicator<WindowPort>  状態機械・ハンドシェイク
///   ├── ExtensionEventEmitter           EXTENSION_EVENT の購読者
///   ├── DarkModeStore                   強制値 + ブラウザ設定
///   └── Closure (message listener)      登録中のみ保持
/// ```
#[wasm_bindgen]
pub struct EditorBridge {
    communicator: Rc<EditorCommunicator<WindowPort>>,
    window: Window,
    extension_events: ExtensionEventEmitter,
    dark_mode: DarkModeStore,
    listener: Option<MessageListener>,
}

#[wasm_bindgen]
impl EditorBridge {
    /// # 引数
    /// - `config`: `{ baseUrl, rendererBaseUrl, rendererType?, adaptFrameHeightToContent? }`
    ///
    /// # エラー
    /// - 設定オブジェクトの形が違う・URL が解釈できない
    /// - `window` がない
    /// - 乱数源が使えない
    ///
    /// # 例（TypeScript）
    /// ```typescript
    /// const bridge = new EditorBridge({ baseUrl: location.href, rendererBaseUrl: "https://render.example.com/" });
    /// bridge.registerEventListener();
    /// bridge.attachFrame(iframe);
    /// iframe.addEventListener("load", () => {
    ///     const url = bridge.onFrameLoad();
    ///     if (url) iframe.src = url;
    /// });
    /// ```
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<EditorBridge, JsError> {
        let config: EditorConfig = serde_wasm_bindgen::from_value(config)
            .map_err(|e| JsError::new(&format!("Invalid editor config: {}", e)))?;
        let window = web_sys::window().ok_or_else(|| JsError::new("No window available"))?;
        let identity = CommunicatorIdentity::generate();
        let communicator = EditorCommunicator::new(config, identity).map_err(|e| JsError::new(&e.to_string()))?;

        let extension_events = ExtensionEventEmitter::new();
        communicator.set_extension_event_emitter(Some(extension_events.clone()));

        let dark_mode = DarkModeStore::new(darkmode::read_config(&window));
        communicator.set_dark_mode(dark_mode.state().is_dark());

        Ok(EditorBridge {
            communicator: Rc::new(communicator),
            window,
            extension_events,
            dark_mode,
            listener: None,
        })
    }

    #[wasm_bindgen(getter)]
    pub fn identity(&self) -> String {
        self.communicator.identity().to_string()
    }

    /// iframe の `src` に設定する URL
    #[wasm_bindgen(getter, js_name = "renderPageUrl")]
    pub fn render_page_url(&self) -> String {
        self.communicator.render_page_url().to_string()
    }

    /// `"UNINITIALIZED"` / `"LISTENING"` / `"TARGET_SET"` / `"ENABLED"` / `"CLOSED"`
    #[wasm_bindgen(getter)]
    pub fn state(&self) -> String {
        self.communicator.state().to_string()
    }

    #[wasm_bindgen(getter, js_name = "isRendererReady")]
    pub fn is_renderer_ready(&self) -> bool {
        self.communicator.is_renderer_ready()
    }

    /// `window` に `message` リスナーを追加する（2 回目以降は何もしない）
    #[wasm_bindgen(js_name = "registerEventListener")]
    pub fn register_event_listener(&mut self) -> Result<(), JsError> {
        let changed = self
            .communicator
            .register_event_listener()
            .map_err(|e| JsError::new(&e.to_string()))?;
        if !changed {
            return Ok(());
        }

        let communicator: Weak<EditorCommunicator<WindowPort>> = Rc::downgrade(&self.communicator);
        let listener = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            if let Some(communicator) = communicator.upgrade() {
                let outcome = communicator.handle_event(inbound_event(&event));
                log::trace!("Handled message event: {:?}", outcome);
            }
        });
        self.window
            .add_event_listener_with_callback("message", listener.as_ref().unchecked_ref())
            .map_err(|e| JsError::new(&format!("Adding the message listener failed: {:?}", e)))?;
        self.listener = Some(listener);
        Ok(())
    }

    /// `message` リスナーを外す。以降このブリッジは何も受信しない。
    #[wasm_bindgen(js_name = "unregisterEventListener")]
    pub fn unregister_event_listener(&mut self) {
        self.communicator.unregister_event_listener();
        self.remove_listener();
    }

    /// iframe を記録する
    ///
    /// # エラー
    /// - iframe がまだ文書に挿入されていない（`contentWindow` がない）
    #[wasm_bindgen(js_name = "attachFrame")]
    pub fn attach_frame(&self, frame: &HtmlIFrameElement) -> Result<(), JsError> {
        let window = frame
            .content_window()
            .ok_or_else(|| JsError::new("The iframe has no content window"))?;
        self.communicator.attach_frame(WindowPort::new(window));
        Ok(())
    }

    #[wasm_bindgen(js_name = "detachFrame")]
    pub fn detach_frame(&self) {
        self.communicator.detach_frame();
    }

    /// iframe の `load` イベントで呼ぶ
    ///
    /// # 戻り値
    /// iframe を遷移させるべき URL。`undefined` なら何もしない。
    #[wasm_bindgen(js_name = "onFrameLoad")]
    pub fn on_frame_load(&self) -> Option<String> {
        navigate_url(self.communicator.on_frame_load())
    }

    /// レンダラー種別を変える
    ///
    /// # 戻り値
    /// iframe を遷移させるべき URL（種別が変わらなければ `undefined`）
    #[wasm_bindgen(js_name = "setRendererType")]
    pub fn set_renderer_type(&self, renderer_type: &str) -> Result<Option<String>, JsError> {
        let renderer_type = RendererType::from_name(renderer_type)
            .ok_or_else(|| JsError::new(&format!("Unknown renderer type {}", renderer_type)))?;
        Ok(self.communicator.set_renderer_type(renderer_type).and_then(navigate_url))
    }

    /// 受信ハンドラを登録する
    ///
    /// # エラー
    /// - 未知のタグ
    pub fn on(&self, message_type: &str, callback: js_sys::Function) -> Result<SubscriptionHandle, JsError> {
        let tag = parse_tag(message_type)?;
        Ok(self.communicator.subscribe(tag, js_handler(callback)).into())
    }

    /// 拡張イベントの購読を登録する（`*` / `**` のパターンが使える）
    #[wasm_bindgen(js_name = "onExtensionEvent")]
    pub fn on_extension_event(&self, pattern: &str, callback: js_sys::Function) -> ExtensionListenerHandle {
        let listener = self.extension_events.on(pattern, move |name, payload| {
            let payload = to_js(payload).unwrap_or(JsValue::UNDEFINED);
            if let Err(e) = callback.call2(&JsValue::NULL, &JsValue::from_str(name), &payload) {
                log::error!("Extension listener for {} failed: {:?}", name, e);
            }
        });
        listener.into()
    }

    /// # 引数
    /// - `lines`: markdown の行の配列
    #[wasm_bindgen(js_name = "setMarkdownContent")]
    pub fn set_markdown_content(&self, lines: JsValue) -> Result<bool, JsError> {
        let lines: Vec<String> = serde_wasm_bindgen::from_value(lines)
            .map_err(|e| JsError::new(&format!("Markdown content must be an array of strings: {}", e)))?;
        Ok(self.communicator.set_markdown_content(lines))
    }

    /// ユーザーの強制値を変える（`undefined` でブラウザに従う）
    #[wasm_bindgen(js_name = "setForcedDarkMode")]
    pub fn set_forced_dark_mode(&mut self, forced_to_dark: Option<bool>) {
        darkmode::store_forced(&self.window, forced_to_dark);
        self.apply_dark_mode(DarkModeAction::SetForcedDarkMode { forced_to_dark });
    }

    /// ブラウザの `prefers-color-scheme` が変わった
    #[wasm_bindgen(js_name = "setBrowserDarkMode")]
    pub fn set_browser_dark_mode(&mut self, browser_is_dark: bool) {
        let forced_to_dark = self.dark_mode.state().forced_to_dark;
        self.apply_dark_mode(DarkModeAction::SetDarkMode {
            forced_to_dark,
            browser_is_dark,
        });
    }

    #[wasm_bindgen(getter, js_name = "darkMode")]
    pub fn dark_mode(&self) -> bool {
        self.dark_mode.state().is_dark()
    }

    #[wasm_bindgen(js_name = "setSlideOptions")]
    pub fn set_slide_options(&self, options: JsValue) -> Result<bool, JsError> {
        let options: SlideOptions = serde_wasm_bindgen::from_value(options)
            .map_err(|e| JsError::new(&format!("Invalid slide options: {}", e)))?;
        Ok(self.communicator.set_slide_options(options))
    }

    #[wasm_bindgen(js_name = "sendScrollState")]
    pub fn send_scroll_state(&self, first_line_in_view: u32, scrolled_percentage: f64) -> bool {
        self.communicator
            .send_scroll_state(ScrollState::new(first_line_in_view, scrolled_percentage))
    }

    #[wasm_bindgen(js_name = "makeEditorScrollSource")]
    pub fn make_editor_scroll_source(&self) -> bool {
        self.communicator.make_editor_scroll_source()
    }

    #[wasm_bindgen(js_name = "requestWordCount")]
    pub fn request_word_count(&self) -> bool {
        self.communicator.request_word_count()
    }

    #[wasm_bindgen(getter, js_name = "wordCount")]
    pub fn word_count(&self) -> Option<u32> {
        self.communicator.word_count()
    }

    #[wasm_bindgen(getter, js_name = "firstHeading")]
    pub fn first_heading(&self) -> Option<String> {
        self.communicator.first_heading()
    }

    #[wasm_bindgen(js_name = "setAdaptFrameHeight")]
    pub fn set_adapt_frame_height(&self, adapt: bool) {
        self.communicator.set_adapt_frame_height(adapt);
    }

    /// iframe の `style` 属性に設定する文字列（例: `"height: 480px"`）
    #[wasm_bindgen(getter, js_name = "frameStyle")]
    pub fn frame_style(&self) -> String {
        self.communicator.frame_style()
    }

    /// チャンネル統計を JSON 文字列で返す
    ///
    /// ```json
    /// { "sent": 12, "not_sent": 1, "failed": 0, "received": 9, "dropped": 2 }
    /// ```
    #[wasm_bindgen(js_name = "getStats")]
    pub fn get_stats(&self) -> String {
        let stats = self.communicator.stats();
        format!(
            r#"{{"sent":{},"not_sent":{},"failed":{},"received":{},"dropped":{}}}"#,
            stats.sent, stats.not_sent, stats.failed, stats.received, stats.dropped,
        )
    }
}

impl EditorBridge {
    fn apply_dark_mode(&mut self, action: DarkModeAction) {
        if let Some(activated) = self.dark_mode.dispatch(action) {
            self.communicator.set_dark_mode(activated);
        }
    }

    fn remove_listener(&mut self) {
        if let Some(listener) = self.listener.take() {
            if let Err(e) = self
                .window
                .remove_event_listener_with_callback("message", listener.as_ref().unchecked_ref())
            {
                log::warn!("Removing the message listener failed: {:?}", e);
            }
        }
    }
}

impl Drop for EditorBridge {
    fn drop(&mut self) {
        self.communicator.unregister_event_listener();
        self.remove_listener();
    }
}

fn navigate_url(action: FrameLoadAction) -> Option<String> {
    match action {
        FrameLoadAction::Navigate(url) => Some(url),
        FrameLoadAction::RedirectComplete => None,
    }
}
