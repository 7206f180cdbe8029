//! Page-load side: capability probing and background selection.
//!
//! Browser specifics sit behind traits ([`probe::CapabilityProbe`], [`selector::ImageLoader`],
//! [`selector::StyleTarget`]) so the selection logic runs the same against a real site tree
//! on disk or against scripted fakes.

/// Modern-format capability probe.
pub mod probe;
/// Random background selection with a single legacy retry.
pub mod selector;
