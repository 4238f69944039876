//! The GPU-resident atlas texture itself: a single 3D texture sliced into a
//! regular grid of `brick_size`-sided slots, uploaded to by
//! [`super::manager::AtlasManager::admit_and_upload`] after each admission.
//!
//! Buffer/texture creation follows the teacher's `BrickPool::new`
//! (`voxel/streaming/brick_pool.rs`): validate against a GPU size limit,
//! log the resulting footprint, then allocate. The teacher's pool is a
//! linear `wgpu::Buffer`; the spec's atlas is a 3D texture so bricks can be
//! trilinearly sampled directly by the ray-march shader, so creation here
//! targets `Texture3D` instead.

const MAX_ATLAS_BYTES: u64 = 1024 * 1024 * 1024;

pub struct AtlasTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    slots_per_axis: u32,
    brick_size: u32,
    format: wgpu::TextureFormat,
}

impl AtlasTexture {
    /// `slot_count` need not be a perfect cube; `slots_per_axis` is rounded
    /// up so every slot index `0..slot_count` maps to a distinct cell.
    pub fn new(device: &wgpu::Device, slot_count: u32, brick_size: u32, format: wgpu::TextureFormat) -> Self {
        let slots_per_axis = (slot_count as f64).cbrt().ceil() as u32;
        let side = slots_per_axis * brick_size;
        let bytes_per_voxel = format.block_copy_size(None).unwrap_or(1) as u64;
        let footprint = side as u64 * side as u64 * side as u64 * bytes_per_voxel;

        if footprint > MAX_ATLAS_BYTES {
            log::warn!(
                "atlas texture footprint {}MB exceeds the {}MB guideline for {} slots of size {}",
                footprint / 1024 / 1024,
                MAX_ATLAS_BYTES / 1024 / 1024,
                slot_count,
                brick_size
            );
        }

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("volume_atlas"),
            size: wgpu::Extent3d {
                width: side,
                height: side,
                depth_or_array_layers: side,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        log::info!(
            "created volume atlas: {side}^3 texture, {} slots/axis, {}MB",
            slots_per_axis,
            footprint / 1024 / 1024
        );

        AtlasTexture {
            texture,
            view,
            slots_per_axis,
            brick_size,
            format,
        }
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    fn slot_origin(&self, slot_id: u32) -> wgpu::Origin3d {
        let sx = slot_id % self.slots_per_axis;
        let sy = (slot_id / self.slots_per_axis) % self.slots_per_axis;
        let sz = slot_id / (self.slots_per_axis * self.slots_per_axis);
        wgpu::Origin3d {
            x: sx * self.brick_size,
            y: sy * self.brick_size,
            z: sz * self.brick_size,
        }
    }

    /// Upload one brick's decoded voxel payload into its assigned slot.
    /// `data` must be exactly `brick_size^3 * bytes_per_voxel` bytes.
    pub fn upload_brick(&self, queue: &wgpu::Queue, slot_id: u32, data: &[u8]) {
        let bytes_per_voxel = self.format.block_copy_size(None).unwrap_or(1);
        let bytes_per_row = self.brick_size * bytes_per_voxel;
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: self.slot_origin(slot_id),
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(self.brick_size),
            },
            wgpu::Extent3d {
                width: self.brick_size,
                height: self.brick_size,
                depth_or_array_layers: self.brick_size,
            },
        );
    }

    pub fn slots_per_axis(&self) -> u32 {
        self.slots_per_axis
    }
}
