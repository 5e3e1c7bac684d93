//! MCP tool definitions for DaVinci Resolve
//!
//! Each area module defines the input schemas for its tools and a plain
//! handler function per tool taking the [`Connection`] and the input. The
//! server wires them into the router and converts results with
//! [`crate::guard::run_tool`].
//!
//! [`Connection`]: crate::connection::Connection

pub mod color_group;
pub mod gallery;
pub mod graph;
pub mod media;
pub mod project;
pub mod resolve;
pub mod timeline;
pub mod timeline_item;

use crate::guard::{rule, Constraint, ParamRule};

/// Colors accepted by `AddMarker`.
pub const MARKER_COLORS: [&str; 16] = [
    "Blue", "Cyan", "Green", "Yellow", "Red", "Pink", "Purple", "Fuchsia", "Rose", "Lavender",
    "Sky", "Mint", "Lemon", "Sand", "Cocoa", "Cream",
];

/// Colors accepted by `SetClipColor` and `AddFlag`.
pub const CLIP_COLORS: [&str; 16] = [
    "Orange", "Apricot", "Yellow", "Lime", "Olive", "Green", "Teal", "Navy", "Blue", "Purple",
    "Violet", "Pink", "Tan", "Beige", "Brown", "Chocolate",
];

/// Rules shared by every marker-adding tool.
pub(crate) const MARKER_RULES: [ParamRule; 3] = [
    rule("frame", Constraint::AtLeast(0)),
    rule("color", Constraint::OneOf(&MARKER_COLORS)),
    rule("duration", Constraint::AtLeast(1)),
];

/// `"Successfully ..."` or `"Failed ..."` depending on what Resolve reported.
pub(crate) fn outcome(ok: bool, success: impl Into<String>, failure: impl Into<String>) -> String {
    if ok {
        success.into()
    } else {
        failure.into()
    }
}
