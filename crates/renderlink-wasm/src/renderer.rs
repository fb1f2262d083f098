//! RendererBridge wasm-bindgen エクスポート
//!
//! render ページ（iframe の中）から呼び出す。

use std::rc::{Rc, Weak};

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{MessageEvent, Window};

use renderlink_proto::ScrollState;
use renderlink_session::{CommunicatorIdentity, RendererCommunicator, RendererConfig, RendererView, WordCounter};

use crate::handle::{js_handler, parse_tag, SubscriptionHandle};
use crate::port::{inbound_event, to_js, WindowPort};

type MessageListener = Closure<dyn FnMut(MessageEvent)>;

/// レンダラー側の Communicator
#[wasm_bindgen]
pub struct RendererBridge {
    communicator: Rc<RendererCommunicator<WindowPort>>,
    window: Window,
    listener: Option<MessageListener>,
}

#[wasm_bindgen]
impl RendererBridge {
    /// # 引数
    /// - `config`: `{ editorBaseUrl }`
    ///
    /// 親ウィンドウと Identity（`?uuid=`）は現在のページから読み取る。
    /// どちらかがなければ `view` は `"placeholder"` のままになる。
    ///
    /// # エラー
    /// - 設定オブジェクトの形が違う・URL が解釈できない
    /// - `window` がない
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<RendererBridge, JsError> {
        let config: RendererConfig = serde_wasm_bindgen::from_value(config)
            .map_err(|e| JsError::new(&format!("Invalid renderer config: {}", e)))?;
        let window = web_sys::window().ok_or_else(|| JsError::new("No window available"))?;

        let parent = parent_window(&window).map(WindowPort::new);
        let identity = window
            .location()
            .href()
            .ok()
            .and_then(|href| CommunicatorIdentity::from_render_page_url(&href));
        let communicator =
            RendererCommunicator::new(config, parent, identity).map_err(|e| JsError::new(&e.to_string()))?;

        Ok(RendererBridge {
            communicator: Rc::new(communicator),
            window,
            listener: None,
        })
    }

    /// `message` リスナーを追加し、エディタに `RENDERER_READY` を送る
    pub fn start(&mut self) -> Result<(), JsError> {
        let changed = self
            .communicator
            .register_event_listener()
            .map_err(|e| JsError::new(&e.to_string()))?;
        if changed {
            let communicator: Weak<RendererCommunicator<WindowPort>> = Rc::downgrade(&self.communicator);
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
        }
        self.communicator
            .announce_ready()
            .map_err(|e| JsError::new(&e.to_string()))?;
        Ok(())
    }

    #[wasm_bindgen(js_name = "unregisterEventListener")]
    pub fn unregister_event_listener(&mut self) {
        self.communicator.unregister_event_listener();
        self.remove_listener();
    }

    #[wasm_bindgen(getter)]
    pub fn state(&self) -> String {
        self.communicator.state().to_string()
    }

    /// `"placeholder"` / `"document"` / `"slideshow"` / `"motd"` / `"intro"`
    #[wasm_bindgen(getter)]
    pub fn view(&self) -> String {
        match self.communicator.view() {
            RendererView::Placeholder(_) => "placeholder",
            RendererView::Document => "document",
            RendererView::Slideshow => "slideshow",
            RendererView::Motd => "motd",
            RendererView::Intro => "intro",
        }
        .to_string()
    }

    /// プレースホルダー表示中に表示する文言
    #[wasm_bindgen(getter, js_name = "placeholderText")]
    pub fn placeholder_text(&self) -> Option<String> {
        self.communicator.view().placeholder_text().map(str::to_string)
    }

    /// 現在の markdown（行の配列）
    #[wasm_bindgen(getter)]
    pub fn content(&self) -> Result<JsValue, JsError> {
        to_js(&self.communicator.content()).map_err(|e| JsError::new(&e.to_string()))
    }

    #[wasm_bindgen(getter, js_name = "darkMode")]
    pub fn dark_mode(&self) -> bool {
        self.communicator.dark_mode()
    }

    /// `{ baseUrl, rendererType }`。まだ届いていなければ `undefined`。
    #[wasm_bindgen(getter, js_name = "baseConfiguration")]
    pub fn base_configuration(&self) -> Result<JsValue, JsError> {
        match self.communicator.base_configuration() {
            Some(config) => to_js(&config).map_err(|e| JsError::new(&e.to_string())),
            None => Ok(JsValue::UNDEFINED),
        }
    }

    pub fn on(&self, message_type: &str, callback: js_sys::Function) -> Result<SubscriptionHandle, JsError> {
        let tag = parse_tag(message_type)?;
        Ok(self.communicator.subscribe(tag, js_handler(callback)).into())
    }

    #[wasm_bindgen(js_name = "reportHeight")]
    pub fn report_height(&self, height: f64) -> bool {
        self.communicator.report_height(height)
    }

    #[wasm_bindgen(js_name = "reportFirstHeading")]
    pub fn report_first_heading(&self, first_heading: Option<String>) -> bool {
        self.communicator.report_first_heading(first_heading)
    }

    /// ユーザーが iframe 内をスクロールし始めたときに呼ぶ
    #[wasm_bindgen(js_name = "makeScrollSource")]
    pub fn make_scroll_source(&self) -> bool {
        self.communicator.make_scroll_source()
    }

    #[wasm_bindgen(js_name = "reportScroll")]
    pub fn report_scroll(&self, first_line_in_view: u32, scrolled_percentage: f64) -> bool {
        self.communicator
            .report_scroll(ScrollState::new(first_line_in_view, scrolled_percentage))
    }

    #[wasm_bindgen(js_name = "emitExtensionEvent")]
    pub fn emit_extension_event(&self, event_name: &str, payload: JsValue) -> Result<bool, JsError> {
        let payload: serde_json::Value = if payload.is_undefined() {
            serde_json::Value::Null
        } else {
            serde_wasm_bindgen::from_value(payload)
                .map_err(|e| JsError::new(&format!("Extension payload must be JSON compatible: {}", e)))?
        };
        Ok(self.communicator.emit_extension_event(event_name, payload))
    }

    /// `GET_WORD_COUNT` の計算を JS 側に任せる
    ///
    /// `callback(lines: string[]) => number`。例外や数値以外の戻り値は 0 とみなす。
    #[wasm_bindgen(js_name = "setWordCounter")]
    pub fn set_word_counter(&self, callback: js_sys::Function) {
        let counter: WordCounter = Rc::new(move |lines: &[String]| {
            let lines = match to_js(lines) {
                Ok(lines) => lines,
                Err(e) => {
                    log::error!("Passing lines to the word counter failed: {}", e);
                    return 0;
                }
            };
            match callback.call1(&JsValue::NULL, &lines) {
                Ok(words) => words.as_f64().map_or(0, |n| n.max(0.0) as u32),
                Err(e) => {
                    log::error!("Word counter failed: {:?}", e);
                    0
                }
            }
        });
        self.communicator.set_word_counter(counter);
    }
}

impl RendererBridge {
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

impl Drop for RendererBridge {
    fn drop(&mut self) {
        self.communicator.unregister_event_listener();
        self.remove_listener();
    }
}

/// iframe の中なら親ウィンドウ。トップレベルで開かれていれば `None`。
fn parent_window(window: &Window) -> Option<Window> {
    let parent = window.parent().ok().flatten()?;
    let this: &JsValue = window.as_ref();
    let that: &JsValue = parent.as_ref();
    if js_sys::Object::is(this, that) {
        None
    } else {
        Some(parent)
    }
}
