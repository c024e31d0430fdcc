//! Power menu: sub-modules.

pub mod actions;
pub mod service;
pub mod types;

pub use actions::PowerMenuHandler;
pub use service::PowerMenu;
pub use types::*;
