pub mod geometry;
mod projection;
mod renderer;

pub use projection::{Region, Viewport};
pub use renderer::{draw_labels, CountryStyle, Label, MapRenderer};
