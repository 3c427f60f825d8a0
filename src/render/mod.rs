pub mod canvas;
pub mod compositor;
pub mod downsample;
pub mod pixels;
