//! Single-subpass render pass layout
//!
//! Translates an ordered attachment list into the attachment array, the
//! subpass references and the two external dependencies, without touching a
//! device. The attachment index used by every reference is the attachment's
//! position in the list, so callers control grouping through ordering.

use ash::{vk, Device};
use crate::render::passes::AttachmentDescription;
use crate::render::vulkan::{VulkanError, VulkanResult};

/// Everything needed to create a native render pass
#[derive(Debug, Clone)]
pub struct RenderPassLayout {
    attachments: Vec<vk::AttachmentDescription>,
    color_refs: Vec<vk::AttachmentReference>,
    depth_ref: Option<vk::AttachmentReference>,
    dependencies: [vk::SubpassDependency; 2],
}

/// External dependencies shared by every pass the builder creates
pub fn external_dependencies() -> [vk::SubpassDependency; 2] {
    // Prior color writes finished before this pass writes color
    let src_dependency = vk::SubpassDependency::builder()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
        .dependency_flags(vk::DependencyFlags::BY_REGION)
        .build();

    // This pass's color writes available at the end of the pipeline
    let dst_dependency = vk::SubpassDependency::builder()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_stage_mask(vk::PipelineStageFlags::BOTTOM_OF_PIPE)
        .src_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
        .dst_access_mask(vk::AccessFlags::empty())
        .dependency_flags(vk::DependencyFlags::BY_REGION)
        .build();

    [src_dependency, dst_dependency]
}

impl RenderPassLayout {
    /// Build the layout for an ordered attachment list
    ///
    /// Color references keep their relative order. Only the first depth
    /// attachment is referenced by the subpass; later ones stay in the
    /// attachment array unreferenced.
    pub fn from_descriptions(descriptions: &[AttachmentDescription]) -> Self {
        let mut attachments = Vec::with_capacity(descriptions.len());
        let mut color_refs = Vec::new();
        let mut depth_ref = None;

        for (index, description) in descriptions.iter().enumerate() {
            attachments.push(description.to_vk());

            let reference = vk::AttachmentReference {
                attachment: index as u32,
                layout: description.attachment_layout(),
            };

            if !description.depth_format {
                color_refs.push(reference);
            } else if depth_ref.is_none() {
                depth_ref = Some(reference);
            } else {
                log::warn!(
                    "Attachment {} is a second depth attachment ({:?}); only one depth reference per subpass is supported",
                    index,
                    description.format
                );
            }
        }

        Self {
            attachments,
            color_refs,
            depth_ref,
            dependencies: external_dependencies(),
        }
    }

    /// Native attachment descriptions, in list order
    pub fn attachments(&self) -> &[vk::AttachmentDescription] {
        &self.attachments
    }

    /// Color references of the subpass
    pub fn color_refs(&self) -> &[vk::AttachmentReference] {
        &self.color_refs
    }

    /// Depth/stencil reference of the subpass, if any
    pub fn depth_ref(&self) -> Option<&vk::AttachmentReference> {
        self.depth_ref.as_ref()
    }

    /// The two external subpass dependencies
    pub fn dependencies(&self) -> &[vk::SubpassDependency] {
        &self.dependencies
    }

    /// Subpass description borrowing this layout's references
    pub fn subpass(&self) -> vk::SubpassDescription {
        let mut subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&self.color_refs);

        if let Some(depth_ref) = self.depth_ref.as_ref() {
            subpass = subpass.depth_stencil_attachment(depth_ref);
        }

        subpass.build()
    }

    /// Create the native render pass
    pub fn create(&self, device: &Device) -> VulkanResult<vk::RenderPass> {
        let subpasses = [self.subpass()];

        let create_info = vk::RenderPassCreateInfo::builder()
            .attachments(&self.attachments)
            .subpasses(&subpasses)
            .dependencies(&self.dependencies);

        unsafe {
            device.create_render_pass(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::passes::AttachmentFlags;

    fn color(format: vk::Format) -> AttachmentDescription {
        AttachmentDescription::color(format, AttachmentFlags::CLEAR_ON_LOAD)
    }

    fn depth() -> AttachmentDescription {
        AttachmentDescription::depth(vk::Format::D32_SFLOAT, AttachmentFlags::CLEAR_ON_LOAD)
    }

    #[test]
    fn test_color_then_depth_partition() {
        let descriptions = [
            color(vk::Format::R8G8B8A8_UNORM),
            color(vk::Format::R16G16B16A16_SFLOAT),
            color(vk::Format::R8G8B8A8_UNORM),
            depth(),
        ];

        let layout = RenderPassLayout::from_descriptions(&descriptions);

        assert_eq!(layout.attachments().len(), 4);
        let color_indices: Vec<u32> = layout.color_refs().iter().map(|r| r.attachment).collect();
        assert_eq!(color_indices, vec![0, 1, 2]);
        assert!(layout.color_refs().iter().all(|r| r.layout == vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL));

        let depth_ref = layout.depth_ref().unwrap();
        assert_eq!(depth_ref.attachment, 3);
        assert_eq!(depth_ref.layout, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

        let subpass = layout.subpass();
        assert_eq!(subpass.color_attachment_count, 3);
        assert!(!subpass.p_depth_stencil_attachment.is_null());
        assert_eq!(subpass.pipeline_bind_point, vk::PipelineBindPoint::GRAPHICS);
    }

    #[test]
    fn test_color_only_pass_has_no_depth_reference() {
        let layout = RenderPassLayout::from_descriptions(&[color(vk::Format::B8G8R8A8_SRGB)]);

        assert_eq!(layout.color_refs().len(), 1);
        assert!(layout.depth_ref().is_none());
        assert!(layout.subpass().p_depth_stencil_attachment.is_null());
    }

    #[test]
    fn test_interleaved_order_keeps_list_indices() {
        let descriptions = [
            depth(),
            color(vk::Format::R8G8B8A8_UNORM),
            color(vk::Format::R8G8B8A8_UNORM),
        ];

        let layout = RenderPassLayout::from_descriptions(&descriptions);

        let color_indices: Vec<u32> = layout.color_refs().iter().map(|r| r.attachment).collect();
        assert_eq!(color_indices, vec![1, 2]);
        assert_eq!(layout.depth_ref().unwrap().attachment, 0);
    }

    #[test]
    fn test_second_depth_attachment_is_not_referenced() {
        crate::foundation::logging::init_for_tests();

        let descriptions = [color(vk::Format::R8G8B8A8_UNORM), depth(), depth()];

        let layout = RenderPassLayout::from_descriptions(&descriptions);

        assert_eq!(layout.attachments().len(), 3);
        assert_eq!(layout.depth_ref().unwrap().attachment, 1);
    }

    #[test]
    fn test_depth_only_pass() {
        let layout = RenderPassLayout::from_descriptions(&[depth()]);

        assert!(layout.color_refs().is_empty());
        assert_eq!(layout.subpass().color_attachment_count, 0);
        assert_eq!(layout.depth_ref().unwrap().attachment, 0);
    }

    #[test]
    fn test_external_dependencies() {
        let layout = RenderPassLayout::from_descriptions(&[color(vk::Format::R8G8B8A8_UNORM)]);
        let deps = layout.dependencies();

        assert_eq!(deps.len(), 2);
        for dep in deps {
            assert_eq!(dep.src_subpass, vk::SUBPASS_EXTERNAL);
            assert_eq!(dep.dst_subpass, 0);
            assert_eq!(dep.src_stage_mask, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
            assert_eq!(dep.dependency_flags, vk::DependencyFlags::BY_REGION);
        }

        assert_eq!(deps[0].dst_stage_mask, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(deps[0].src_access_mask, vk::AccessFlags::empty());
        assert_eq!(deps[0].dst_access_mask, vk::AccessFlags::COLOR_ATTACHMENT_WRITE);

        assert_eq!(deps[1].dst_stage_mask, vk::PipelineStageFlags::BOTTOM_OF_PIPE);
        assert_eq!(deps[1].src_access_mask, vk::AccessFlags::COLOR_ATTACHMENT_WRITE);
        assert_eq!(deps[1].dst_access_mask, vk::AccessFlags::empty());
    }
}
