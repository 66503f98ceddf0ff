//! Buffer management for vertex data and uniforms
//!
//! Memory management following RAII patterns with proper allocation and cleanup.
//! Persistent mappings are handed out as [`MappedBuffer`] guards that unmap on drop.

use ash::{vk, Device, Instance};
use bytemuck::Pod;
use std::marker::PhantomData;
use std::mem;
use crate::render::vulkan::{VulkanResult, VulkanError};

/// Buffer wrapper with memory management
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Create a new buffer with memory allocation
    pub fn new(
        device: Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            device.create_buffer(&buffer_info, None)
                .map_err(VulkanError::Api)?
        };

        let mem_requirements = unsafe {
            device.get_buffer_memory_requirements(buffer)
        };

        let memory_type_index = match find_memory_type(
            instance,
            physical_device,
            mem_requirements.memory_type_bits,
            properties,
        ) {
            Ok(index) => index,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(mem_requirements.size)
            .memory_type_index(memory_type_index);

        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(VulkanError::Api(e));
            }
        };

        // From here on Drop owns both handles
        let buffer = Self {
            device,
            buffer,
            memory,
            size,
        };

        unsafe {
            buffer.device.bind_buffer_memory(buffer.buffer, buffer.memory, 0)
                .map_err(VulkanError::Api)?;
        }

        Ok(buffer)
    }

    /// Map the whole buffer and keep it mapped until the guard is dropped
    ///
    /// The guard does not borrow the buffer; owners must drop it before the
    /// buffer itself.
    pub fn map_persistent(&self) -> VulkanResult<MappedBuffer> {
        let ptr = unsafe {
            self.device.map_memory(
                self.memory,
                0,
                vk::WHOLE_SIZE,
                vk::MemoryMapFlags::empty(),
            ).map_err(VulkanError::Api)?
        };

        Ok(MappedBuffer {
            device: self.device.clone(),
            memory: self.memory,
            ptr: ptr.cast::<u8>(),
            size: self.size as usize,
        })
    }

    /// Write data to buffer through a temporary mapping
    pub fn write_data<T: Pod>(&self, data: &[T]) -> VulkanResult<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        if bytes.len() as vk::DeviceSize > self.size {
            return Err(VulkanError::InvalidOperation {
                reason: format!("write of {} bytes exceeds buffer size {}", bytes.len(), self.size),
            });
        }

        let mut mapping = self.map_persistent()?;
        mapping.bytes_mut()[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Get size
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Host mapping of a [`Buffer`]'s memory, unmapped on drop
pub struct MappedBuffer {
    device: Device,
    memory: vk::DeviceMemory,
    ptr: *mut u8,
    size: usize,
}

impl MappedBuffer {
    /// Mapped memory as raw bytes
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: the mapping covers `size` bytes of host-visible memory and
        // lives exactly as long as this guard
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.size) }
    }

    /// Mapped memory viewed as a slice of `T`
    ///
    /// Trailing bytes that do not fill a whole `T` are left out of the slice.
    pub fn as_slice_mut<T: Pod>(&mut self) -> VulkanResult<&mut [T]> {
        let whole = self.size - self.size % mem::size_of::<T>();
        bytemuck::try_cast_slice_mut(&mut self.bytes_mut()[..whole]).map_err(|e| {
            VulkanError::InvalidOperation {
                reason: format!("mapped memory cannot be viewed as typed slice: {e:?}"),
            }
        })
    }

    /// Size of the mapping in bytes
    pub fn size(&self) -> usize {
        self.size
    }
}

impl Drop for MappedBuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.unmap_memory(self.memory);
        }
    }
}

/// Vertex buffer kept in host-visible, coherent memory
pub struct VertexBuffer<T> {
    buffer: Buffer,
    capacity: usize,
    _phantom: PhantomData<T>,
}

impl<T: Pod> VertexBuffer<T> {
    /// Create a vertex buffer with room for `capacity` vertices
    pub fn with_capacity(
        device: Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        capacity: usize,
    ) -> VulkanResult<Self> {
        let size = (capacity * mem::size_of::<T>()) as vk::DeviceSize;

        let buffer = Buffer::new(
            device,
            instance,
            physical_device,
            size,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        Ok(Self {
            buffer,
            capacity,
            _phantom: PhantomData,
        })
    }

    /// Persistently map the vertex storage
    pub fn map(&self) -> VulkanResult<MappedBuffer> {
        self.buffer.map_persistent()
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Number of vertices the buffer holds
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Uniform buffer for shader uniforms
pub struct UniformBuffer<T> {
    buffer: Buffer,
    _phantom: PhantomData<T>,
}

impl<T: Pod> UniformBuffer<T> {
    /// Create uniform buffer
    pub fn new(
        device: Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
    ) -> VulkanResult<Self> {
        let size = mem::size_of::<T>() as vk::DeviceSize;

        let buffer = Buffer::new(
            device,
            instance,
            physical_device,
            size,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        Ok(Self {
            buffer,
            _phantom: PhantomData,
        })
    }

    /// Update uniform data
    pub fn update(&self, data: &T) -> VulkanResult<()> {
        self.buffer.write_data(std::slice::from_ref(data))
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Byte range covered by the uniform block
    pub fn range(&self) -> vk::DeviceSize {
        self.buffer.size()
    }
}

/// Find memory type with required properties
pub fn find_memory_type(
    instance: &Instance,
    physical_device: vk::PhysicalDevice,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    let mem_properties = unsafe {
        instance.get_physical_device_memory_properties(physical_device)
    };

    select_memory_type(&mem_properties, type_filter, properties)
}

/// Pick the first memory type allowed by `type_filter` that has all `properties`
fn select_memory_type(
    mem_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    (0..mem_properties.memory_type_count)
        .find(|&i| {
            (type_filter & (1 << i)) != 0
                && mem_properties.memory_types[i as usize].property_flags.contains(properties)
        })
        .ok_or(VulkanError::NoSuitableMemoryType)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties(flags: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties::default();
        props.memory_type_count = flags.len() as u32;
        for (i, f) in flags.iter().enumerate() {
            props.memory_types[i].property_flags = *f;
        }
        props
    }

    #[test]
    fn test_select_host_visible_type() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ]);

        let wanted = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        assert_eq!(select_memory_type(&props, 0b111, wanted).unwrap(), 2);
    }

    #[test]
    fn test_type_filter_excludes_candidates() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ]);

        assert_eq!(select_memory_type(&props, 0b10, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap(), 1);
        assert!(matches!(
            select_memory_type(&props, 0b11, vk::MemoryPropertyFlags::HOST_VISIBLE),
            Err(VulkanError::NoSuitableMemoryType)
        ));
    }
}
