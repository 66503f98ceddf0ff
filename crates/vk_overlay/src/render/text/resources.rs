//! Per-glyph GPU resources and texture upload

use std::collections::HashMap;
use ash::{vk, Device, Instance};
use crate::render::text::{GlyphDraw, GlyphSource, TextError, TextResult};
use crate::render::vulkan::{CommandPool, Texture, VulkanResult};

/// Uploads pixel data as a sampled texture
pub trait TextureUploader {
    /// Create a texture in `SHADER_READ_ONLY_OPTIMAL` from tightly packed pixels
    fn generate_texture(&self, pixels: &[u8], format: vk::Format, extent: vk::Extent2D) -> VulkanResult<Texture>;
}

/// Texture uploader with its own transfer command pool
pub struct VulkanTextureLoader {
    device: Device,
    instance: Instance,
    physical_device: vk::PhysicalDevice,
    command_pool: CommandPool,
    queue: vk::Queue,
}

impl VulkanTextureLoader {
    /// Create a loader submitting its copies on `queue`
    pub fn new(
        device: Device,
        instance: Instance,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
        queue: vk::Queue,
    ) -> VulkanResult<Self> {
        let command_pool = CommandPool::new(device.clone(), queue_family_index)?;

        Ok(Self {
            device,
            instance,
            physical_device,
            command_pool,
            queue,
        })
    }
}

impl TextureUploader for VulkanTextureLoader {
    fn generate_texture(&self, pixels: &[u8], format: vk::Format, extent: vk::Extent2D) -> VulkanResult<Texture> {
        Texture::from_pixels(
            self.device.clone(),
            &self.instance,
            self.physical_device,
            &self.command_pool,
            self.queue,
            pixels,
            format,
            extent,
        )
    }
}

/// A glyph's texture and the descriptor set that samples it
pub struct GlyphResource {
    /// Uploaded glyph bitmap
    pub texture: Texture,
    /// Set with the shared uniforms at binding 0 and this texture at binding 1
    pub descriptor_set: vk::DescriptorSet,
}

/// Glyph resources keyed by character
#[derive(Default)]
pub struct GlyphResources {
    glyphs: HashMap<char, GlyphResource>,
}

impl GlyphResources {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the resources for `ch`, returning any previous entry
    pub fn insert(&mut self, ch: char, resource: GlyphResource) -> Option<GlyphResource> {
        self.glyphs.insert(ch, resource)
    }

    /// Resources for `ch`
    pub fn get(&self, ch: char) -> Option<&GlyphResource> {
        self.glyphs.get(&ch)
    }

    /// Descriptor set for `ch`
    pub fn descriptor_set(&self, ch: char) -> Option<vk::DescriptorSet> {
        self.glyphs.get(&ch).map(|resource| resource.descriptor_set)
    }

    /// Whether `ch` has been uploaded
    pub fn contains(&self, ch: char) -> bool {
        self.glyphs.contains_key(&ch)
    }

    /// Number of uploaded glyphs
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    /// Whether no glyph has been uploaded
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// Destroy every texture; descriptor sets go with their pool
    pub fn clear(&mut self) {
        self.glyphs.clear();
    }
}

/// Characters of `charset` that get a texture and a descriptor set
///
/// Keeps first-seen order and drops repeats. Characters the source lacks and
/// glyphs without pixels (space) are logged and left out, so they never count
/// against the `available` descriptor sets.
pub(crate) fn upload_plan<G: GlyphSource + ?Sized>(charset: &str, glyphs: &G, available: usize) -> TextResult<Vec<char>> {
    if glyphs.bitmaps_released() {
        return Err(TextError::BitmapsReleased);
    }

    let mut plan = Vec::new();

    for ch in charset.chars() {
        if plan.contains(&ch) {
            continue;
        }

        let Some(glyph) = glyphs.glyph(ch) else {
            log::error!("Could not find char '{}'", ch);
            continue;
        };

        if !glyph.has_bitmap() {
            if ch == ' ' {
                log::debug!("Skipping texture for space");
            } else {
                log::error!("Glyph '{}' has no bitmap", ch);
            }
            continue;
        }

        plan.push(ch);
    }

    if plan.len() > available {
        return Err(TextError::DescriptorPoolExhausted {
            requested: plan.len(),
            capacity: available,
        });
    }

    Ok(plan)
}

/// Descriptor set and first vertex of every draw that has an uploaded glyph
pub(crate) fn glyph_draws<'a, F>(draws: &'a [GlyphDraw], descriptor_set: F) -> impl Iterator<Item = (vk::DescriptorSet, u32)> + 'a
where
    F: Fn(char) -> Option<vk::DescriptorSet> + 'a,
{
    draws.iter().filter_map(move |draw| match descriptor_set(draw.character) {
        Some(set) => Some((set, draw.first_vertex)),
        None => {
            log::trace!("No texture for '{}', skipping draw", draw.character);
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;
    use crate::render::text::{DrawBufferState, GlyphData, GlyphMetrics, TextVertex, VERTICES_PER_GLYPH};

    fn glyph(width: u32, rows: u32, advance: i64) -> GlyphMetrics {
        GlyphMetrics {
            width,
            rows,
            left: 0,
            top: rows as i32,
            advance: (advance << 6, 0),
            bitmap: vec![255; (width * rows) as usize],
        }
    }

    fn font() -> GlyphData {
        let mut data = GlyphData::new();
        data.insert('A', glyph(10, 12, 12));
        data.insert('B', glyph(8, 12, 9));
        data.insert(' ', GlyphMetrics {
            advance: (32 << 6, 0),
            ..Default::default()
        });
        data
    }

    #[test]
    fn test_plan_skips_missing_and_empty_glyphs() {
        crate::foundation::logging::init_for_tests();

        let plan = upload_plan("A?B ", &font(), 8).unwrap();
        assert_eq!(plan, vec!['A', 'B']);
    }

    #[test]
    fn test_plan_drops_repeats() {
        assert_eq!(upload_plan("BAAB", &font(), 8).unwrap(), vec!['B', 'A']);
    }

    #[test]
    fn test_plan_fits_exact_capacity() {
        assert_eq!(upload_plan("AB ", &font(), 2).unwrap(), vec!['A', 'B']);

        assert!(matches!(
            upload_plan("AB ", &font(), 1),
            Err(TextError::DescriptorPoolExhausted { requested: 2, capacity: 1 })
        ));
    }

    #[test]
    fn test_plan_rejects_released_bitmaps() {
        let mut data = font();
        data.release_bitmaps();

        assert!(matches!(upload_plan("AB", &data, 8), Err(TextError::BitmapsReleased)));
    }

    #[test]
    fn test_draws_use_real_vertex_offsets() {
        let mut vertices = vec![TextVertex::default(); 4 * VERTICES_PER_GLYPH];
        let mut state = DrawBufferState::new();
        state.append_text(&mut vertices, &font(), 0.0, 0.0, 1.0, 1.0, "A B").unwrap();

        let set_a = vk::DescriptorSet::from_raw(1);
        let set_b = vk::DescriptorSet::from_raw(2);
        let sets: HashMap<char, vk::DescriptorSet> = [('A', set_a), ('B', set_b)].into_iter().collect();

        let draws: Vec<_> = glyph_draws(state.draws(), |ch| sets.get(&ch).copied()).collect();
        assert_eq!(draws, vec![(set_a, 0), (set_b, 6)]);
    }

    #[test]
    fn test_draws_skip_glyphs_without_descriptor_set() {
        let mut vertices = vec![TextVertex::default(); 4 * VERTICES_PER_GLYPH];
        let mut state = DrawBufferState::new();
        state.append_text(&mut vertices, &font(), 0.0, 0.0, 1.0, 1.0, "BAB").unwrap();

        let set_a = vk::DescriptorSet::from_raw(7);
        let draws: Vec<_> = glyph_draws(state.draws(), |ch| (ch == 'A').then_some(set_a)).collect();

        assert_eq!(draws, vec![(set_a, 6)]);
    }
}
