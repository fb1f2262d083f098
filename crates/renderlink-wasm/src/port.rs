//! ブラウザの `Window` を使った [`FramePort`] 実装と、`MessageEvent` の変換

use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{MessageEvent, Window};

use renderlink_proto::Message;
use renderlink_session::InboundEvent;
use renderlink_transport::{FramePort, Origin, TransportError};

/// 相手フレームのウィンドウ
///
/// エディタ側では `iframe.contentWindow`、レンダラー側では `window.parent`。
#[derive(Clone, Debug)]
pub struct WindowPort {
    window: Window,
}

impl WindowPort {
    pub fn new(window: Window) -> Self {
        WindowPort { window }
    }
}

impl FramePort for WindowPort {
    fn post_message(&self, message: &Message, target_origin: &Origin) -> Result<(), TransportError> {
        let value = to_js(message).map_err(|e| TransportError::PostFailed(e.to_string()))?;
        self.window
            .post_message(&value, target_origin.as_str())
            .map_err(|e| TransportError::PostFailed(format!("{:?}", e)))
    }

    fn is_same_frame(&self, other: &Self) -> bool {
        let this: &JsValue = self.window.as_ref();
        let that: &JsValue = other.window.as_ref();
        js_sys::Object::is(this, that)
    }
}

/// Rust の値をプレーンな JS オブジェクトにする（`Map` ではなく `Object`）
pub(crate) fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, serde_wasm_bindgen::Error> {
    value.serialize(&serde_wasm_bindgen::Serializer::json_compatible())
}

/// `MessageEvent` を Communicator に渡せる形にする
///
/// `data` が JSON として表現できない場合は `null` にする
/// （チャンネルのデコードで捨てられる）。
pub(crate) fn inbound_event(event: &MessageEvent) -> InboundEvent<WindowPort> {
    let source = event
        .source()
        .and_then(|source| source.dyn_into::<Window>().ok())
        .map(WindowPort::new);
    let data = serde_wasm_bindgen::from_value::<serde_json::Value>(event.data()).unwrap_or_else(|e| {
        log::debug!("Event data is not JSON compatible: {}", e);
        serde_json::Value::Null
    });
    InboundEvent {
        origin: event.origin(),
        source,
        data,
    }
}
