//! Copy a render target back to the CPU.

use half::f16;

use crate::error::BakeError;

/// Bytes per row padded to [`wgpu::COPY_BYTES_PER_ROW_ALIGNMENT`].
pub fn padded_bytes_per_row(width: u32, bytes_per_texel: u32) -> u32 {
    let unpadded = width * bytes_per_texel;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Read a whole 2D texture as tightly packed rows, top row first.
pub fn read_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    bytes_per_texel: u32,
) -> Result<Vec<u8>, BakeError> {
    let width = texture.width();
    let height = texture.height();
    let unpadded = width * bytes_per_texel;
    let padded = padded_bytes_per_row(width, bytes_per_texel);

    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("pano-readback"),
        size: padded as u64 * height as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("pano-readback-encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let buffer_slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    let _ = device.poll(wgpu::PollType::Wait {
        submission_index: None,
        timeout: None,
    });

    match rx.recv() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(BakeError::Readback(e.to_string())),
        Err(e) => return Err(BakeError::Readback(e.to_string())),
    }

    let mut pixels = Vec::with_capacity((unpadded * height) as usize);
    {
        let mapped = buffer_slice.get_mapped_range();
        for row in 0..height {
            let start = (row * padded) as usize;
            pixels.extend_from_slice(&mapped[start..start + unpadded as usize]);
        }
    }
    buffer.unmap();
    Ok(pixels)
}

/// Widen little-endian half floats, as read back from an `Rgba16Float` target.
pub fn f16_bytes_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|b| f16::from_le_bytes([b[0], b[1]]).to_f32())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padding_rounds_up_to_alignment() {
        assert_eq!(padded_bytes_per_row(64, 4), 256);
        assert_eq!(padded_bytes_per_row(65, 4), 512);
        assert_eq!(padded_bytes_per_row(64, 8), 512);
        assert_eq!(padded_bytes_per_row(1, 8), 256);
    }

    #[test]
    fn test_f16_bytes_to_f32() {
        // 1.5, -2.0, 0.25 and 4.0 are exact in half precision.
        let bytes = [0x00, 0x3E, 0x00, 0xC0, 0x00, 0x34, 0x00, 0x44];
        assert_eq!(f16_bytes_to_f32(&bytes), [1.5, -2.0, 0.25, 4.0]);
    }
}
