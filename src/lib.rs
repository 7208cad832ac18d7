pub mod app;
pub use app::run;

pub mod config;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod rpc;
pub mod service;
pub mod store;
pub mod utils;

// Platform abstraction layer
pub mod platform;

// Tray UI; menu helpers stay portable so the headless build can test them
pub mod ui {
    #[cfg(any(target_os = "macos", target_os = "windows"))]
    pub mod icon;
    pub mod menu;
}
