//! Rendering: layout, display lists, painting and canvas encoding.

pub mod canvas;
pub mod font;
pub mod layout;
pub mod paint;
pub mod raster;
pub mod rasterizer;
pub mod vector;

pub use canvas::{Blob, Canvas};
pub use rasterizer::{OnClone, RasterOptions, Rasterize, Rasterizer};
