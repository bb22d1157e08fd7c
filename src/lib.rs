pub mod app;
pub mod auth;
pub mod backoff;
pub mod credentials;
pub mod error;
pub mod interrupt;
pub mod metadata;
pub mod options;
pub mod playlist;
pub mod progress;
pub mod retry;
pub mod upload;
pub mod youtube;


pub use error::{exit_code, Error, Result};

pub fn expand_tilde(path: &str) -> String {
    if path.starts_with("~/") {
        if let Ok(home) = std::env::var("HOME") {
            path.replacen("~", &home, 1)
        } else {
            path.to_string()
        }
    } else {
        path.to_string()
    }
}
