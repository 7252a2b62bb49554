//! idb-scraper Browser
//!
//! Drives a Chromium-family browser over the DevTools protocol:
//! - launch a local browser with a throw-away profile, or attach to one
//! - open a page, navigate, wait for the document to load
//! - evaluate the engine's storage requests inside the page

mod browser;
mod cdp;
mod error;
mod launcher;
mod page;

pub use browser::Browser;
pub use cdp::CdpConnection;
pub use error::BrowserError;
pub use launcher::{find_executable, LaunchOptions};
pub use page::Page;

pub type Result<T> = std::result::Result<T, BrowserError>;
