//! CLI library components for `nbsave`.

pub mod logging;
pub mod replay;
pub mod report;
