//! JS コールバックの登録と、購読解除用のハンドル

use wasm_bindgen::prelude::*;

use renderlink_dispatch::{HandlerError, HandlerResult, Subscription};
use renderlink_proto::{CommunicationMessageType, Message};
use renderlink_session::ExtensionListener;

use crate::port::to_js;

/// `on()` の戻り値。`unsubscribe()` で購読を解除する。
///
/// JS 側でハンドルを捨てても購読は解除されない。
#[wasm_bindgen]
pub struct SubscriptionHandle {
    subscription: Subscription,
}

#[wasm_bindgen]
impl SubscriptionHandle {
    pub fn unsubscribe(&self) {
        self.subscription.unsubscribe();
    }

    #[wasm_bindgen(getter, js_name = "isActive")]
    pub fn is_active(&self) -> bool {
        self.subscription.is_active()
    }
}

impl From<Subscription> for SubscriptionHandle {
    fn from(subscription: Subscription) -> Self {
        SubscriptionHandle { subscription }
    }
}

/// `onExtensionEvent()` の戻り値
#[wasm_bindgen]
pub struct ExtensionListenerHandle {
    listener: ExtensionListener,
}

#[wasm_bindgen]
impl ExtensionListenerHandle {
    pub fn off(&self) {
        self.listener.off();
    }
}

impl From<ExtensionListener> for ExtensionListenerHandle {
    fn from(listener: ExtensionListener) -> Self {
        ExtensionListenerHandle { listener }
    }
}

/// タグ名を解釈する
///
/// # エラー
/// - 未知のタグ
pub(crate) fn parse_tag(tag: &str) -> Result<CommunicationMessageType, JsError> {
    CommunicationMessageType::from_tag(tag).ok_or_else(|| JsError::new(&format!("Unknown message type {}", tag)))
}

/// JS の関数を受信ハンドラにする
///
/// 関数にはメッセージ全体（`{ type, ... }`）を渡す。例外は [`HandlerError`] になる。
pub(crate) fn js_handler(callback: js_sys::Function) -> impl FnMut(&Message) -> HandlerResult + 'static {
    move |message: &Message| {
        let value = to_js(message).map_err(|e| HandlerError::new(e.to_string()))?;
        callback
            .call1(&JsValue::NULL, &value)
            .map(|_| ())
            .map_err(|e| HandlerError::new(format!("{:?}", e)))
    }
}
