//! Attachment descriptions consumed by the render pass builder

use ash::vk;
use bitflags::bitflags;

bitflags! {
    /// Load behaviour of an attachment
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AttachmentFlags: u32 {
        /// Clear color/depth contents when the pass begins
        const CLEAR_ON_LOAD = 1 << 0;
        /// Clear stencil contents when the pass begins
        const CLEAR_STENCIL_ON_LOAD = 1 << 1;
    }
}

/// Whether `format` carries depth and/or stencil aspects
pub fn is_depth_format(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D16_UNORM
            | vk::Format::X8_D24_UNORM_PACK32
            | vk::Format::D32_SFLOAT
            | vk::Format::S8_UINT
            | vk::Format::D16_UNORM_S8_UINT
            | vk::Format::D24_UNORM_S8_UINT
            | vk::Format::D32_SFLOAT_S8_UINT
    )
}

/// One attachment slot of a render pass
///
/// Position in the owning list is the attachment index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentDescription {
    /// Pixel format
    pub format: vk::Format,
    /// Depth/stencil attachment rather than color
    pub depth_format: bool,
    /// Load behaviour
    pub flags: AttachmentFlags,
}

impl AttachmentDescription {
    /// Describe an attachment, classifying it as depth or color from its format
    pub fn new(format: vk::Format, flags: AttachmentFlags) -> Self {
        Self {
            format,
            depth_format: is_depth_format(format),
            flags,
        }
    }

    /// Color attachment
    pub fn color(format: vk::Format, flags: AttachmentFlags) -> Self {
        Self {
            format,
            depth_format: false,
            flags,
        }
    }

    /// Depth/stencil attachment
    pub fn depth(format: vk::Format, flags: AttachmentFlags) -> Self {
        Self {
            format,
            depth_format: true,
            flags,
        }
    }

    /// Layout the attachment is used in during the subpass
    pub fn attachment_layout(&self) -> vk::ImageLayout {
        if self.depth_format {
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
        } else {
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
        }
    }

    /// Native attachment description
    pub fn to_vk(&self) -> vk::AttachmentDescription {
        let load_op = if self.flags.contains(AttachmentFlags::CLEAR_ON_LOAD) {
            vk::AttachmentLoadOp::CLEAR
        } else {
            vk::AttachmentLoadOp::DONT_CARE
        };

        let stencil_load_op = if self.flags.contains(AttachmentFlags::CLEAR_STENCIL_ON_LOAD) {
            vk::AttachmentLoadOp::CLEAR
        } else {
            vk::AttachmentLoadOp::DONT_CARE
        };

        vk::AttachmentDescription::builder()
            .format(self.format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(load_op)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(stencil_load_op)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(self.attachment_layout())
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_classification() {
        assert!(is_depth_format(vk::Format::D32_SFLOAT));
        assert!(is_depth_format(vk::Format::D24_UNORM_S8_UINT));
        assert!(!is_depth_format(vk::Format::B8G8R8A8_SRGB));

        assert!(AttachmentDescription::new(vk::Format::D16_UNORM, AttachmentFlags::empty()).depth_format);
        assert!(!AttachmentDescription::new(vk::Format::R16G16B16A16_SFLOAT, AttachmentFlags::empty()).depth_format);
    }

    #[test]
    fn test_load_ops_follow_flags() {
        let cleared = AttachmentDescription::color(vk::Format::R8G8B8A8_UNORM, AttachmentFlags::CLEAR_ON_LOAD).to_vk();
        assert_eq!(cleared.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(cleared.stencil_load_op, vk::AttachmentLoadOp::DONT_CARE);
        assert_eq!(cleared.store_op, vk::AttachmentStoreOp::STORE);
        assert_eq!(cleared.stencil_store_op, vk::AttachmentStoreOp::DONT_CARE);
        assert_eq!(cleared.samples, vk::SampleCountFlags::TYPE_1);

        let stencil = AttachmentDescription::depth(
            vk::Format::D24_UNORM_S8_UINT,
            AttachmentFlags::CLEAR_STENCIL_ON_LOAD,
        ).to_vk();
        assert_eq!(stencil.load_op, vk::AttachmentLoadOp::DONT_CARE);
        assert_eq!(stencil.stencil_load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(stencil.store_op, vk::AttachmentStoreOp::STORE);
    }

    #[test]
    fn test_layout_class() {
        let color = AttachmentDescription::color(vk::Format::R8G8B8A8_UNORM, AttachmentFlags::empty()).to_vk();
        assert_eq!(color.initial_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(color.final_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);

        let depth = AttachmentDescription::depth(vk::Format::D32_SFLOAT, AttachmentFlags::all()).to_vk();
        assert_eq!(depth.final_layout, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
    }
}
