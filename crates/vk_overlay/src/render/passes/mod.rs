//! Render pass resources built from attachment descriptions
//!
//! [`RenderPassLayout`] is the device-free translation of an ordered attachment
//! list; [`RenderPassManager`] owns the native passes created from it and is
//! the indirection table resource handles resolve through.

pub mod attachment;
pub mod layout;
pub mod manager;

pub use attachment::{is_depth_format, AttachmentDescription, AttachmentFlags};
pub use layout::RenderPassLayout;
pub use manager::{RenderPassDevice, RenderPassHandle, RenderPassManager, RenderPassResource};
