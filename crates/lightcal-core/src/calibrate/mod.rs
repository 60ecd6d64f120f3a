pub mod dark;
pub mod flat;
pub(crate) mod helpers;
pub mod hot_pixel;
pub mod offset;

pub use dark::apply_master_dark;
pub use flat::{apply_master_flat, apply_master_flat_masked, saturation_mask, FlatParams};
pub use hot_pixel::apply_hot_pixel_interpolation;
pub use offset::apply_master_offset;
