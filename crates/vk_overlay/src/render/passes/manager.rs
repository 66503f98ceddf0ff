//! Render pass resource manager
//!
//! Resources are registered with their attachment list and addressed by
//! [`RenderPassHandle`]. Creation and destruction happen in batches when the
//! owning renderer brings resources into or out of existence; the native
//! handle of a resource is null whenever it is not created.

use ash::vk::{self, Handle};
use ash::Device;
use slotmap::{new_key_type, Key, SlotMap};
use crate::render::passes::{AttachmentDescription, RenderPassLayout};
use crate::render::vulkan::{VulkanError, VulkanResult};

new_key_type! {
    /// Handle to a render pass resource
    pub struct RenderPassHandle;
}

/// Device operations the manager needs
///
/// Implemented for `ash::Device`; tests substitute a recording device.
pub trait RenderPassDevice {
    /// Create a native render pass for `layout`
    fn create_render_pass(&self, layout: &RenderPassLayout) -> VulkanResult<vk::RenderPass>;

    /// Destroy a native render pass
    fn destroy_render_pass(&self, render_pass: vk::RenderPass);
}

impl RenderPassDevice for Device {
    fn create_render_pass(&self, layout: &RenderPassLayout) -> VulkanResult<vk::RenderPass> {
        layout.create(self)
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        unsafe {
            Device::destroy_render_pass(self, render_pass, None);
        }
    }
}

/// A render pass slot and the attachments it is built from
#[derive(Debug, Clone)]
pub struct RenderPassResource {
    /// Native handle, null until created
    pub render_pass: vk::RenderPass,
    /// Ordered attachments; order is the attachment index
    pub attachments: Vec<AttachmentDescription>,
}

impl RenderPassResource {
    /// Whether the native render pass currently exists
    pub fn is_created(&self) -> bool {
        self.render_pass != vk::RenderPass::null()
    }
}

/// Indirection table from handles to render pass resources
#[derive(Debug, Default)]
pub struct RenderPassManager {
    resources: SlotMap<RenderPassHandle, RenderPassResource>,
}

fn not_found(handle: RenderPassHandle) -> VulkanError {
    VulkanError::ResourceNotFound {
        id: handle.data().as_ffi(),
    }
}

impl RenderPassManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource; the native pass is not created yet
    pub fn register(&mut self, attachments: Vec<AttachmentDescription>) -> RenderPassHandle {
        self.resources.insert(RenderPassResource {
            render_pass: vk::RenderPass::null(),
            attachments,
        })
    }

    /// Native render pass of a resource (null if not created)
    pub fn render_pass(&self, handle: RenderPassHandle) -> VulkanResult<vk::RenderPass> {
        self.resources
            .get(handle)
            .map(|resource| resource.render_pass)
            .ok_or_else(|| not_found(handle))
    }

    /// Attachment list of a resource
    pub fn attachment_descriptions(&self, handle: RenderPassHandle) -> VulkanResult<&[AttachmentDescription]> {
        self.resources
            .get(handle)
            .map(|resource| resource.attachments.as_slice())
            .ok_or_else(|| not_found(handle))
    }

    /// Mutable attachment list, for editing before (re)creation
    pub fn attachment_descriptions_mut(&mut self, handle: RenderPassHandle) -> VulkanResult<&mut Vec<AttachmentDescription>> {
        self.resources
            .get_mut(handle)
            .map(|resource| &mut resource.attachments)
            .ok_or_else(|| not_found(handle))
    }

    /// Create the native render pass of every handle
    ///
    /// Resources that already hold a render pass are left as they are; destroy
    /// them first to rebuild from changed attachments. Stops at the first
    /// failure; passes created before it stay valid.
    pub fn create_resource<D: RenderPassDevice>(&mut self, device: &D, handles: &[RenderPassHandle]) -> VulkanResult<()> {
        for &handle in handles {
            let resource = self.resources.get_mut(handle).ok_or_else(|| not_found(handle))?;

            if resource.is_created() {
                log::debug!("Render pass {:?} already created, skipping", handle);
                continue;
            }

            let layout = RenderPassLayout::from_descriptions(&resource.attachments);
            resource.render_pass = device.create_render_pass(&layout)?;

            log::debug!(
                "Created render pass {:?} for {:?} ({} color, {} depth)",
                resource.render_pass.as_raw(),
                handle,
                layout.color_refs().len(),
                usize::from(layout.depth_ref().is_some())
            );
        }

        Ok(())
    }

    /// Destroy the native render pass of every handle and reset it to null
    ///
    /// Handles without a render pass are skipped, so repeating the call is a no-op.
    pub fn destroy_resources<D: RenderPassDevice>(&mut self, device: &D, handles: &[RenderPassHandle]) -> VulkanResult<()> {
        for &handle in handles {
            let resource = self.resources.get_mut(handle).ok_or_else(|| not_found(handle))?;

            if resource.is_created() {
                device.destroy_render_pass(resource.render_pass);
                resource.render_pass = vk::RenderPass::null();
                log::debug!("Destroyed render pass for {:?}", handle);
            }
        }

        Ok(())
    }

    /// Destroy every created render pass
    pub fn destroy_all<D: RenderPassDevice>(&mut self, device: &D) {
        for (_, resource) in &mut self.resources {
            if resource.is_created() {
                device.destroy_render_pass(resource.render_pass);
                resource.render_pass = vk::RenderPass::null();
            }
        }
    }

    /// Unregister a resource, destroying its render pass if it exists
    pub fn remove<D: RenderPassDevice>(&mut self, device: &D, handle: RenderPassHandle) -> VulkanResult<RenderPassResource> {
        let mut resource = self.resources.remove(handle).ok_or_else(|| not_found(handle))?;
        if resource.is_created() {
            device.destroy_render_pass(resource.render_pass);
            resource.render_pass = vk::RenderPass::null();
        }
        Ok(resource)
    }

    /// Number of registered resources
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether no resources are registered
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::passes::AttachmentFlags;
    use std::cell::{Cell, RefCell};

    /// Hands out increasing fake handles and records every call
    #[derive(Default)]
    struct RecordingDevice {
        next: Cell<u64>,
        created: RefCell<Vec<(vk::RenderPass, usize, usize)>>,
        destroyed: RefCell<Vec<vk::RenderPass>>,
        fail_creation: Cell<bool>,
    }

    impl RenderPassDevice for RecordingDevice {
        fn create_render_pass(&self, layout: &RenderPassLayout) -> VulkanResult<vk::RenderPass> {
            if self.fail_creation.get() {
                return Err(VulkanError::Api(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
            }
            self.next.set(self.next.get() + 1);
            let render_pass = vk::RenderPass::from_raw(self.next.get());
            self.created.borrow_mut().push((
                render_pass,
                layout.color_refs().len(),
                usize::from(layout.depth_ref().is_some()),
            ));
            Ok(render_pass)
        }

        fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
            self.destroyed.borrow_mut().push(render_pass);
        }
    }

    fn gbuffer() -> Vec<AttachmentDescription> {
        vec![
            AttachmentDescription::color(vk::Format::R8G8B8A8_UNORM, AttachmentFlags::CLEAR_ON_LOAD),
            AttachmentDescription::color(vk::Format::R16G16B16A16_SFLOAT, AttachmentFlags::CLEAR_ON_LOAD),
            AttachmentDescription::depth(
                vk::Format::D24_UNORM_S8_UINT,
                AttachmentFlags::CLEAR_ON_LOAD | AttachmentFlags::CLEAR_STENCIL_ON_LOAD,
            ),
        ]
    }

    #[test]
    fn test_create_resource_sets_handles() {
        let device = RecordingDevice::default();
        let mut manager = RenderPassManager::new();

        let gbuffer_pass = manager.register(gbuffer());
        let present_pass = manager.register(vec![
            AttachmentDescription::color(vk::Format::B8G8R8A8_SRGB, AttachmentFlags::empty()),
        ]);

        assert_eq!(manager.render_pass(gbuffer_pass).unwrap(), vk::RenderPass::null());

        manager.create_resource(&device, &[gbuffer_pass, present_pass]).unwrap();

        assert_ne!(manager.render_pass(gbuffer_pass).unwrap(), vk::RenderPass::null());
        assert_ne!(manager.render_pass(present_pass).unwrap(), vk::RenderPass::null());

        let created = device.created.borrow();
        assert_eq!(created.len(), 2);
        assert_eq!((created[0].1, created[0].2), (2, 1));
        assert_eq!((created[1].1, created[1].2), (1, 0));
    }

    #[test]
    fn test_create_skips_existing_render_pass() {
        let device = RecordingDevice::default();
        let mut manager = RenderPassManager::new();
        let handle = manager.register(gbuffer());

        manager.create_resource(&device, &[handle]).unwrap();
        let first = manager.render_pass(handle).unwrap();
        manager.create_resource(&device, &[handle]).unwrap();

        assert_eq!(manager.render_pass(handle).unwrap(), first);
        assert_eq!(device.created.borrow().len(), 1);
    }

    #[test]
    fn test_destroy_twice_is_noop() {
        let device = RecordingDevice::default();
        let mut manager = RenderPassManager::new();
        let handle = manager.register(gbuffer());

        manager.create_resource(&device, &[handle]).unwrap();
        let created = manager.render_pass(handle).unwrap();

        manager.destroy_resources(&device, &[handle]).unwrap();
        assert_eq!(manager.render_pass(handle).unwrap(), vk::RenderPass::null());

        manager.destroy_resources(&device, &[handle]).unwrap();
        assert_eq!(*device.destroyed.borrow(), vec![created]);
    }

    #[test]
    fn test_recreate_after_destroy() {
        let device = RecordingDevice::default();
        let mut manager = RenderPassManager::new();
        let handle = manager.register(gbuffer());

        manager.create_resource(&device, &[handle]).unwrap();
        manager.destroy_resources(&device, &[handle]).unwrap();
        manager.attachment_descriptions_mut(handle).unwrap().pop();
        manager.create_resource(&device, &[handle]).unwrap();

        let created = device.created.borrow();
        assert_eq!(created.len(), 2);
        assert_eq!((created[1].1, created[1].2), (2, 0));
        assert_eq!(manager.render_pass(handle).unwrap(), created[1].0);
    }

    #[test]
    fn test_unknown_handle() {
        let device = RecordingDevice::default();
        let mut manager = RenderPassManager::new();
        let handle = manager.register(gbuffer());
        manager.remove(&device, handle).unwrap();

        assert!(matches!(
            manager.create_resource(&device, &[handle]),
            Err(VulkanError::ResourceNotFound { .. })
        ));
        assert!(manager.attachment_descriptions(handle).is_err());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_creation_failure_leaves_handle_null() {
        let device = RecordingDevice::default();
        device.fail_creation.set(true);
        let mut manager = RenderPassManager::new();
        let handle = manager.register(gbuffer());

        assert!(matches!(
            manager.create_resource(&device, &[handle]),
            Err(VulkanError::Api(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY))
        ));
        assert_eq!(manager.render_pass(handle).unwrap(), vk::RenderPass::null());
    }

    #[test]
    fn test_remove_and_destroy_all_release_passes() {
        let device = RecordingDevice::default();
        let mut manager = RenderPassManager::new();
        let first = manager.register(gbuffer());
        let second = manager.register(gbuffer());
        let third = manager.register(gbuffer());

        manager.create_resource(&device, &[first, second]).unwrap();
        let removed = manager.remove(&device, first).unwrap();
        assert!(!removed.is_created());
        assert_eq!(removed.attachments.len(), 3);

        manager.destroy_all(&device);
        assert_eq!(device.destroyed.borrow().len(), 2);
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.render_pass(third).unwrap(), vk::RenderPass::null());
    }
}
