//! Session recording as an animated GIF, one frame per decision cycle.

use anyhow::{bail, Context, Result};
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, RgbaImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct GifRecorder<W: Write> {
    encoder: Option<GifEncoder<W>>,
    width: u32,
    height: u32,
    delay: Delay,
    frames: u64,
}

impl GifRecorder<BufWriter<File>> {
    pub fn create(path: &Path, width: usize, height: usize, fps: u32) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed creating video {}", path.display()))?;
        Self::new(BufWriter::new(file), width, height, fps)
    }
}

impl<W: Write> GifRecorder<W> {
    pub fn new(out: W, width: usize, height: usize, fps: u32) -> Result<Self> {
        if width == 0 || height == 0 || fps == 0 {
            bail!("invalid video geometry {width}x{height} @ {fps} fps");
        }
        let mut encoder = GifEncoder::new(out);
        encoder
            .set_repeat(Repeat::Infinite)
            .context("failed writing gif header")?;
        Ok(Self {
            encoder: Some(encoder),
            width: width as u32,
            height: height as u32,
            delay: Delay::from_numer_denom_ms(1000, fps),
            frames: 0,
        })
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Append one RGBA frame.
    pub fn write_frame(&mut self, rgba: &[u8]) -> Result<()> {
        let Some(encoder) = self.encoder.as_mut() else {
            bail!("recorder already finished");
        };
        let expected = self.width as usize * self.height as usize * 4;
        if rgba.len() != expected {
            bail!(
                "frame is {} bytes, expected {expected} for {}x{} RGBA",
                rgba.len(),
                self.width,
                self.height
            );
        }
        let Some(image) = RgbaImage::from_raw(self.width, self.height, rgba.to_vec()) else {
            bail!("frame buffer does not fit {}x{}", self.width, self.height);
        };
        encoder
            .encode_frame(Frame::from_parts(image, 0, 0, self.delay))
            .context("failed encoding gif frame")?;
        self.frames += 1;
        Ok(())
    }

    /// Write the trailer. Later frames are rejected.
    pub fn finish(&mut self) -> Result<()> {
        // The trailer goes out when the encoder drops.
        drop(self.encoder.take());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::gif::GifDecoder;
    use image::AnimationDecoder;
    use std::io::Cursor;

    #[test]
    fn frames_round_out_an_animation() {
        let mut buf = Vec::new();
        {
            let mut rec = GifRecorder::new(&mut buf, 2, 1, 30).unwrap();
            rec.write_frame(&[0, 0, 0, 255, 255, 255, 255, 255]).unwrap();
            rec.write_frame(&[255, 255, 255, 255, 0, 0, 0, 255]).unwrap();
            assert_eq!(rec.frames(), 2);
            rec.finish().unwrap();
        }
        assert!(buf.starts_with(b"GIF89a"));

        let frames = GifDecoder::new(Cursor::new(buf))
            .unwrap()
            .into_frames()
            .collect_frames()
            .unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].buffer().dimensions(), (2, 1));
    }

    #[test]
    fn wrong_frame_size_is_rejected() {
        let mut rec = GifRecorder::new(Vec::new(), 4, 4, 30).unwrap();
        assert!(rec.write_frame(&[0; 12]).is_err());
        assert_eq!(rec.frames(), 0);
    }

    #[test]
    fn finished_recorder_refuses_frames() {
        let mut rec = GifRecorder::new(Vec::new(), 1, 1, 30).unwrap();
        rec.finish().unwrap();
        assert!(rec.write_frame(&[0, 0, 0, 255]).is_err());
    }
}
