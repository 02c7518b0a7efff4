use std::time::Instant;

use tracing::trace;
use v4l::buffer::Type;
use v4l::io::traits::{CaptureStream, Stream as V4lStream};
use v4l::{Device, Format, FourCC};

use videoin_core::error::{CaptureError, Result};
use videoin_core::frame::FrameSize;

use crate::pixel_map;

const BUFFER_COUNT: u32 = 4;

/// An open, streaming capture device.
pub(crate) struct FrameStream {
    inner: v4l::io::mmap::Stream<'static>,
    format: Format,
    // Converted frame before scaling
    scratch: Vec<u8>,
    size: FrameSize,
    started: Instant,
    frames: u64,
}

// The mmap arena is only touched from the thread holding the controller lock
unsafe impl Send for FrameStream {}

impl FrameStream {
    /// Maps buffers and starts streaming. Frames come out at `size`.
    pub(crate) fn start(dev: &Device, format: Format, size: FrameSize) -> Result<Self> {
        let mut inner = v4l::io::mmap::Stream::with_buffers(dev, Type::VideoCapture, BUFFER_COUNT)
            .map_err(CaptureError::Io)?;
        V4lStream::start(&mut inner).map_err(CaptureError::Io)?;

        Ok(Self {
            inner,
            format,
            scratch: Vec::new(),
            size,
            started: Instant::now(),
            frames: 0,
        })
    }

    /// Dequeues one buffer and writes it as I420 at the requested size.
    pub(crate) fn next_into(&mut self, buffer: &mut Vec<u8>) -> Result<FrameSize> {
        let (data, meta) = CaptureStream::next(&mut self.inner).map_err(CaptureError::Io)?;
        let used = (meta.bytesused as usize).min(data.len());
        let data = &data[..used];

        let (w, h) = (self.format.width as usize, self.format.height as usize);
        let native = FrameSize::new(self.format.width, self.format.height);
        let needs_scale = native != self.size;

        let target: &mut Vec<u8> = if needs_scale { &mut self.scratch } else { &mut *buffer };
        if self.format.fourcc == FourCC::new(&pixel_map::YUYV) {
            pixel_map::yuyv_to_i420(data, w, h, target);
        } else {
            target.clear();
            target.extend_from_slice(data);
            target.resize(native.yuv420p_len(), 128);
        }

        if needs_scale {
            let (dw, dh) = (self.size.width as usize, self.size.height as usize);
            pixel_map::scale_i420(&self.scratch, w, h, buffer, dw, dh);
        }

        self.frames += 1;
        trace!(
            sequence = meta.sequence,
            frames = self.frames,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Frame captured"
        );
        Ok(self.size)
    }

    pub(crate) fn stop(&mut self) {
        if let Err(err) = V4lStream::stop(&mut self.inner) {
            trace!(%err, "Stream stop failed");
        }
    }
}
