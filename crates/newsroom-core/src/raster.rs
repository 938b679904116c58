//! Rasterization adapter
//!
//! The renderer is an external collaborator that turns the live timeline
//! surface into an image data URI. Exports force an opaque background for
//! the duration of the render; [`BackgroundGuard`] restores the original
//! value on every exit path.

use crate::error::{NewsroomError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Background forced while exporting
pub const OPAQUE_BACKGROUND: &str = "#ffffff";

/// Image encoding of the preview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterFormat {
    Jpeg,
    Png,
}

impl RasterFormat {
    /// MIME type
    #[must_use]
    pub fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }
}

/// Options handed to the renderer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterOptions {
    pub pixel_ratio: f64,
    pub format: RasterFormat,
    /// Lossy quality in `0..=1`
    pub quality: f64,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            pixel_ratio: 2.0,
            format: RasterFormat::Jpeg,
            quality: 0.9,
        }
    }
}

/// The rendered view that can be exported
pub trait RenderSurface: Send + Sync {
    /// Current background style, `None` when transparent
    fn background(&self) -> Option<String>;

    /// Replace the background style
    fn set_background(&self, background: Option<String>);
}

/// Renders a surface to an image data URI
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn render(&self, surface: &dyn RenderSurface, options: &RasterOptions) -> anyhow::Result<String>;
}

/// Forces a background and restores the original on drop
pub struct BackgroundGuard<'a> {
    surface: &'a dyn RenderSurface,
    original: Option<String>,
}

impl<'a> BackgroundGuard<'a> {
    /// Set `background` on `surface` until the guard drops
    #[must_use]
    pub fn force(surface: &'a dyn RenderSurface, background: &str) -> Self {
        let original = surface.background();
        surface.set_background(Some(background.to_string()));
        Self { surface, original }
    }
}

impl Drop for BackgroundGuard<'_> {
    fn drop(&mut self) {
        self.surface.set_background(self.original.take());
    }
}

/// A rendered preview
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub data_uri: String,
}

/// Export the surface with an opaque background
///
/// # Errors
/// Returns [`NewsroomError::Raster`] if rendering fails or the renderer
/// returns something other than an image data URI. The background is
/// restored either way.
pub async fn rasterize(
    rasterizer: &dyn Rasterizer,
    surface: &dyn RenderSurface,
    options: &RasterOptions,
) -> Result<RasterImage> {
    let rendered = {
        let _guard = BackgroundGuard::force(surface, OPAQUE_BACKGROUND);
        rasterizer.render(surface, options).await
    };
    let data_uri = rendered.map_err(|e| NewsroomError::Raster(NewsroomError::external_message(&e)))?;
    if !data_uri.starts_with("data:image/") {
        return Err(NewsroomError::Raster("renderer did not return an image data URI".to_string()));
    }
    tracing::debug!("Rendered preview ({} bytes)", data_uri.len());
    Ok(RasterImage { data_uri })
}
