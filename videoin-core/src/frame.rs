/// Dimensions of a delivered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Byte length of a planar YUV 4:2:0 (I420) frame of this size.
    ///
    /// Chroma planes round odd dimensions up.
    pub fn yuv420p_len(&self) -> usize {
        let luma = self.width as usize * self.height as usize;
        let chroma = self.width.div_ceil(2) as usize * self.height.div_ceil(2) as usize;
        luma + 2 * chroma
    }
}

/// A borrowed I420 frame handed to the display sink.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    /// Y plane, then U, then V
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
}

impl<'a> Frame<'a> {
    pub fn new(data: &'a [u8], size: FrameSize) -> Self {
        Self {
            data,
            width: size.width,
            height: size.height,
        }
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }
}
