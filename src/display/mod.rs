//! Display: screen transforms and the 2D overlay
pub mod overlay;
pub mod svg;
pub mod transform;

pub use self::overlay::{Category, OverlayFrame, OverlayRenderer};
pub use self::transform::{PanZoom, ScreenPoint, ViewTransform, ViewportFit};
