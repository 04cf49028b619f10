//! [`ScriptHost`] backed by the real DOM.

use crate::script_loader::{LoadFuture, ScriptHost, ScriptLoadError};
use futures::channel::oneshot;
use futures::future::{self, FutureExt, LocalBoxFuture};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{HtmlScriptElement, Window};

pub struct BrowserScriptHost;

fn window() -> Result<Window, String> {
    web_sys::window().ok_or_else(|| "no window".to_string())
}

fn describe(value: JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

/// Keeps the listeners alive until the load settles; detaches them when dropped
struct ListenerGuard {
    script: HtmlScriptElement,
    _on_load: Closure<dyn FnMut()>,
    _on_error: Closure<dyn FnMut()>,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.script.set_onload(None);
        self.script.set_onerror(None);
    }
}

struct TimerGuard {
    handle: i32,
    _callback: Closure<dyn FnMut()>,
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        if let Some(window) = web_sys::window() {
            window.clear_timeout_with_handle(self.handle);
        }
    }
}

impl ScriptHost for BrowserScriptHost {
    fn global_present(&self, name: &str) -> bool {
        let Some(window) = web_sys::window() else {
            return false;
        };
        js_sys::Reflect::get(&window, &JsValue::from_str(name))
            .map(|value| !value.is_undefined() && !value.is_null())
            .unwrap_or(false)
    }

    fn remove_script(&self, src: &str) {
        let Some(document) = web_sys::window().and_then(|w| w.document()) else {
            return;
        };
        if let Ok(Some(existing)) = document.query_selector(&format!("script[src=\"{}\"]", src)) {
            existing.remove();
        }
    }

    fn inject_script(&self, src: &str) -> Result<LoadFuture, ScriptLoadError> {
        let injection_failed = |reason: String| ScriptLoadError::InjectionFailed {
            src: src.to_string(),
            reason,
        };

        let document = window()
            .map_err(injection_failed)?
            .document()
            .ok_or_else(|| injection_failed("no document".to_string()))?;
        let body = document
            .body()
            .ok_or_else(|| injection_failed("no document body".to_string()))?;

        let script: HtmlScriptElement = document
            .create_element("script")
            .map_err(|e| injection_failed(describe(e)))?
            .dyn_into()
            .map_err(|_| injection_failed("not a script element".to_string()))?;
        script.set_src(src);
        script.set_async(true);
        script.set_defer(true);

        let (tx, rx) = oneshot::channel();
        let tx = Rc::new(RefCell::new(Some(tx)));

        let on_load = {
            let tx = Rc::clone(&tx);
            Closure::<dyn FnMut()>::new(move || {
                if let Some(tx) = tx.borrow_mut().take() {
                    let _ = tx.send(Ok(()));
                }
            })
        };
        let on_error = {
            let tx = Rc::clone(&tx);
            let src = src.to_string();
            Closure::<dyn FnMut()>::new(move || {
                if let Some(tx) = tx.borrow_mut().take() {
                    let _ = tx.send(Err(ScriptLoadError::LoadFailed { src: src.clone() }));
                }
            })
        };
        script.set_onload(Some(on_load.as_ref().unchecked_ref()));
        script.set_onerror(Some(on_error.as_ref().unchecked_ref()));

        body.append_child(&script)
            .map_err(|e| injection_failed(describe(e)))?;

        let guard = ListenerGuard {
            script,
            _on_load: on_load,
            _on_error: on_error,
        };
        let src = src.to_string();

        Ok(async move {
            let result = rx
                .await
                .unwrap_or(Err(ScriptLoadError::LoadFailed { src }));
            drop(guard);
            result
        }
        .boxed_local())
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        let Ok(window) = window() else {
            return future::ready(()).boxed_local();
        };
        let millis = duration.as_millis().min(i32::MAX as u128) as i32;

        let (tx, rx) = oneshot::channel::<()>();
        let mut tx = Some(tx);
        let callback = Closure::<dyn FnMut()>::new(move || {
            if let Some(tx) = tx.take() {
                let _ = tx.send(());
            }
        });

        let handle = match window.set_timeout_with_callback_and_timeout_and_arguments_0(
            callback.as_ref().unchecked_ref(),
            millis,
        ) {
            Ok(handle) => handle,
            Err(_) => return future::ready(()).boxed_local(),
        };
        let guard = TimerGuard {
            handle,
            _callback: callback,
        };

        async move {
            let _ = rx.await;
            drop(guard);
        }
        .boxed_local()
    }

    fn warn(&self, message: &str) {
        web_sys::console::warn_1(&JsValue::from_str(message));
    }
}
