//! # Checkout Script Loader
//!
//! Makes sure the provider's checkout script is in the page exactly once.
//!
//! - Concurrent `load(false)` calls share one in-flight attempt.
//! - A load succeeds when the script's load event fires *and* the provider
//!   global exists afterwards. The error event, a missing global or the
//!   timeout fail it; whichever happens first wins and the rest are dropped.
//! - Failure clears the in-flight attempt so the next call starts over.
//!   Success is remembered and later calls resolve immediately.
//! - `load(true)` removes the existing tag and starts a fresh attempt. A
//!   generation counter keeps an older attempt from overwriting newer state.
//!
//! Document access and timers go through [`ScriptHost`] so the state machine
//! can be driven without a browser.

use futures::future::{self, Either, FutureExt, LocalBoxFuture, Shared};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use thiserror::Error;

pub const CHECKOUT_SCRIPT_URL: &str = "https://checkout.razorpay.com/v1/checkout.js";

/// Global the checkout script defines once initialized
pub const CHECKOUT_GLOBAL: &str = "Razorpay";

pub const LOAD_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptLoadError {
    #[error("Failed to inject script {src}: {reason}")]
    InjectionFailed { src: String, reason: String },

    #[error("Script {src} failed to load")]
    LoadFailed { src: String },

    #[error("Script {src} loaded but `{global}` is not defined")]
    GlobalMissing { src: String, global: String },

    #[error("Timed out after {}s loading {src}", .timeout.as_secs())]
    Timeout { src: String, timeout: Duration },
}

pub type LoadFuture = LocalBoxFuture<'static, Result<(), ScriptLoadError>>;

/// Document and timer access needed by the loader
pub trait ScriptHost {
    /// Whether `window[name]` is defined
    fn global_present(&self, name: &str) -> bool;

    /// Remove any `<script>` whose `src` is `src`
    fn remove_script(&self, src: &str);

    /// Append an async, deferred `<script src>` to the body. The returned
    /// future resolves on the load event and fails on the error event.
    fn inject_script(&self, src: &str) -> Result<LoadFuture, ScriptLoadError>;

    /// Resolve after `duration`; dropping the future cancels the timer
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;

    fn warn(&self, _message: &str) {}
}

#[derive(Default)]
struct LoaderState {
    loaded: bool,
    in_flight: Option<Shared<LoadFuture>>,
    generation: u64,
}

pub struct CheckoutScriptLoader<H: ScriptHost + 'static> {
    host: Rc<H>,
    src: String,
    global: String,
    timeout: Duration,
    state: Rc<RefCell<LoaderState>>,
}

impl<H: ScriptHost + 'static> CheckoutScriptLoader<H> {
    /// Loader for the provider checkout script
    pub fn new(host: H) -> Self {
        Self::with_host(Rc::new(host))
    }

    pub fn with_host(host: Rc<H>) -> Self {
        Self {
            host,
            src: CHECKOUT_SCRIPT_URL.to_string(),
            global: CHECKOUT_GLOBAL.to_string(),
            timeout: LOAD_TIMEOUT,
            state: Rc::new(RefCell::new(LoaderState::default())),
        }
    }

    /// Builder: load a different script / global pair
    pub fn with_script(mut self, src: impl Into<String>, global: impl Into<String>) -> Self {
        self.src = src.into();
        self.global = global.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.state.borrow().loaded
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().in_flight.is_some()
    }

    /// Ensure the script is loaded. Every caller of the same attempt gets the same result.
    pub fn load(&self, force_reload: bool) -> Shared<LoadFuture> {
        let mut state = self.state.borrow_mut();

        if force_reload {
            self.host.remove_script(&self.src);
            state.loaded = false;
            state.in_flight = None;
        } else {
            if let Some(in_flight) = &state.in_flight {
                return in_flight.clone();
            }
            if state.loaded || self.host.global_present(&self.global) {
                state.loaded = true;
                return future::ready(Ok(())).boxed_local().shared();
            }
        }

        state.generation += 1;
        let attempt = self.attempt(state.generation).boxed_local().shared();
        state.in_flight = Some(attempt.clone());
        attempt
    }

    /// Warm the script ahead of checkout; failures are only warned about
    pub fn preload(&self) -> LocalBoxFuture<'static, ()> {
        let load = self.load(false);
        let host = Rc::clone(&self.host);
        async move {
            if let Err(e) = load.await {
                host.warn(&format!("Checkout script preload failed: {}", e));
            }
        }
        .boxed_local()
    }

    fn attempt(&self, generation: u64) -> impl std::future::Future<Output = Result<(), ScriptLoadError>> {
        let host = Rc::clone(&self.host);
        let state = Rc::clone(&self.state);
        let src = self.src.clone();
        let global = self.global.clone();
        let timeout = self.timeout;

        async move {
            let result = match host.inject_script(&src) {
                Err(e) => Err(e),
                Ok(loaded) => match future::select(loaded, host.sleep(timeout)).await {
                    Either::Left((Ok(()), _)) if host.global_present(&global) => Ok(()),
                    Either::Left((Ok(()), _)) => Err(ScriptLoadError::GlobalMissing {
                        src: src.clone(),
                        global,
                    }),
                    Either::Left((Err(e), _)) => Err(e),
                    Either::Right(((), _)) => Err(ScriptLoadError::Timeout {
                        src: src.clone(),
                        timeout,
                    }),
                },
            };

            let mut state = state.borrow_mut();
            if state.generation == generation {
                state.in_flight = None;
                state.loaded = result.is_ok();
            }
            result
        }
    }
}
