pub mod traits;
pub mod web;

#[cfg(test)]
pub mod fake;

pub use traits::{BrowserDriver, ClickMode, ElementState, LoadState};
pub use web::PlaywrightDriver;
