//! SVG renderer for routed instances
//!
//! This module takes an [`Instance`](crate::routing::Instance) and produces
//! an SVG string with CSS classes for styling. Colors and markers are left
//! to the stylesheet of the embedding page.

pub mod config;
pub mod svg;

pub use config::SvgConfig;
pub use svg::{render_svg, SvgBuilder};
