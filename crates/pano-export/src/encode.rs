//! Lossless frame encoding.

/// Turns a tightly packed RGBA8 frame into an encoded file.
///
/// Called from a blocking worker thread, so implementations may take as long
/// as they need.
pub trait FrameEncoder: Send + Sync + 'static {
    fn encode(&self, rgba: &[u8], width: u32, height: u32) -> Result<Vec<u8>, String>;
}

/// 8-bit RGBA PNG.
#[derive(Debug, Clone, Copy)]
pub struct PngEncoder {
    pub compression: png::Compression,
}

impl Default for PngEncoder {
    fn default() -> Self {
        Self {
            compression: png::Compression::Fast,
        }
    }
}

impl FrameEncoder for PngEncoder {
    fn encode(&self, rgba: &[u8], width: u32, height: u32) -> Result<Vec<u8>, String> {
        let mut png_buf = Vec::new();
        {
            let mut encoder =
                png::Encoder::new(std::io::Cursor::new(&mut png_buf), width, height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            encoder.set_compression(self.compression);
            let mut writer = encoder.write_header().map_err(|e| e.to_string())?;
            writer.write_image_data(rgba).map_err(|e| e.to_string())?;
            writer.finish().map_err(|e| e.to_string())?;
        }
        Ok(png_buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_roundtrip_pixels() {
        let rgba: Vec<u8> = (0..2 * 3 * 4).map(|i| (i * 10) as u8).collect();
        let png_bytes = PngEncoder::default().encode(&rgba, 2, 3).unwrap();
        assert_eq!(&png_bytes[..8], b"\x89PNG\r\n\x1a\n");

        let decoder = png::Decoder::new(std::io::Cursor::new(png_bytes));
        let mut reader = decoder.read_info().unwrap();
        let mut out = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut out).unwrap();
        assert_eq!((info.width, info.height), (2, 3));
        assert_eq!(info.color_type, png::ColorType::Rgba);
        assert_eq!(&out[..info.buffer_size()], &rgba[..]);
    }

    #[test]
    fn test_wrong_length_is_an_error() {
        let result = PngEncoder::default().encode(&[0; 7], 2, 2);
        assert!(result.is_err());
    }
}
