// THEORY:
// `LumaFrame` is the "dumb" data container at the bottom of the stack, much like a
// raw chunk of pixels: a byte buffer plus its geometry. The first
// `width * height` bytes are the Y plane of a YUV frame. Anything after that
// (NV21/NV12 chroma for instance) travels with the frame but is never read.
//
// `FrameBuffer` is the single slot that holds the previous frame between
// `detect` calls. It owns exactly zero or one frame; swapping in a new frame
// releases the old one.

use image::{DynamicImage, GrayImage};

/// One captured camera frame. Only the luma plane is used for detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LumaFrame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl LumaFrame {
    /// Wraps a raw camera buffer. `data` may be longer than `width * height`
    /// when the buffer also carries chroma planes.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self { data, width, height }
    }

    /// A frame of uniform brightness. Handy for priming and for tests.
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self::new(vec![value; width as usize * height as usize], width, height)
    }

    pub fn from_gray_image(image: GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height)
    }

    /// Converts any decoded image to luma.
    pub fn from_image(image: &DynamicImage) -> Self {
        Self::from_gray_image(image.to_luma8())
    }

    /// Total byte length including any trailing chroma. This is what the
    /// geometry check compares between consecutive frames.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The luma plane, truncated to the buffer when the buffer is short.
    pub fn luma(&self) -> &[u8] {
        let plane = (self.width as usize).saturating_mul(self.height as usize);
        &self.data[..plane.min(self.data.len())]
    }

    /// The full underlying buffer.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Mutable access to the luma plane, used to paint synthetic scenes.
    pub fn luma_mut(&mut self) -> &mut [u8] {
        let plane = (self.width as usize).saturating_mul(self.height as usize);
        let end = plane.min(self.data.len());
        &mut self.data[..end]
    }
}

/// The previous-frame slot owned by the detector.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    previous: Option<LumaFrame>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous(&self) -> Option<&LumaFrame> {
        self.previous.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.previous.is_none()
    }

    /// Stores `frame` as the new previous frame and hands back the old one.
    pub fn swap(&mut self, frame: LumaFrame) -> Option<LumaFrame> {
        self.previous.replace(frame)
    }

    /// Empties the slot, handing back the stored frame.
    pub fn take(&mut self) -> Option<LumaFrame> {
        self.previous.take()
    }

    /// `true` when `frame` has the same byte length as the stored frame.
    /// An empty slot matches nothing.
    pub fn same_geometry(&self, frame: &LumaFrame) -> bool {
        self.previous
            .as_ref()
            .is_some_and(|prev| prev.byte_len() == frame.byte_len())
    }

    pub fn clear(&mut self) {
        self.previous = None;
    }
}
