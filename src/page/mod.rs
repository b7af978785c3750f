//! Target page handle and tasks.
//!
//! Each [`Page`] owns one connection to one target.
//!
//! # Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | Page struct, connect, lifecycle |
//! | `runtime` | Expression evaluation |
//! | `network` | Network feed, bodies, live capture |
//! | `inspect` | Alerts, devices, system info, storage |
//!
//! # Example
//!
//! ```ignore
//! let page = Page::connect(SessionOptions::new()).await?;
//!
//! // Evaluate
//! let title = page.evaluate("document.title").await?;
//!
//! // Inspect
//! let storage = page.storage().await?;
//!
//! // Capture prompts
//! let mut prompts = page.capture_prompts(PromptOptions::new()).await?;
//! while let Some(capture) = prompts.recv().await {
//!     println!("{}", capture.text());
//! }
//!
//! page.close().await?;
//! ```

// ============================================================================
// Submodules
// ============================================================================

mod core;
mod inspect;
mod network;
mod runtime;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::Page;
pub use inspect::{BatteryInfo, ConnectionInfo, MediaDevice, StorageSnapshot, SystemInfo};
