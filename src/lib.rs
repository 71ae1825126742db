pub mod constants;
pub mod dispatch;
pub mod models;
pub mod rank;
pub mod reconcile;
pub mod status;
pub mod store;
pub mod surface;
pub mod util;

#[cfg(not(target_arch = "wasm32"))]
pub mod auth;
#[cfg(not(target_arch = "wasm32"))]
pub mod channel;
#[cfg(not(target_arch = "wasm32"))]
pub mod config;
#[cfg(not(target_arch = "wasm32"))]
pub mod error;
#[cfg(not(target_arch = "wasm32"))]
pub mod fetch;
#[cfg(not(target_arch = "wasm32"))]
pub mod gateway;
#[cfg(not(target_arch = "wasm32"))]
pub mod preloader;
#[cfg(not(target_arch = "wasm32"))]
pub mod scheduler;
#[cfg(not(target_arch = "wasm32"))]
pub mod session;
#[cfg(not(target_arch = "wasm32"))]
pub mod widget;


#[cfg(target_arch = "wasm32")]
mod wasm_app;

#[cfg(target_arch = "wasm32")]
pub use wasm_app::*;

#[cfg(not(target_arch = "wasm32"))]
pub use config::{Credentials, WidgetConfig};
#[cfg(not(target_arch = "wasm32"))]
pub use error::{Result, WidgetError};
#[cfg(not(target_arch = "wasm32"))]
pub use widget::{NoopObserver, Widget, WidgetObserver};
