//! Layer resolution chain
//!
//! ```text
//! Layer.thumbnail_id -> LayerThumbnail          (declared width/height)
//! Layer.mipmap_id    -> Mipmap.base_info_id
//!                    -> MipmapInfo.offscreen_id
//!                    -> Offscreen.external_id    (CHNKExta identifier)
//! ```
//!
//! Any broken link fails only the layer being resolved.

use std::fmt;

use crate::error::{Error, Result};
use crate::metadata::EntityTables;

/// A link in the resolution chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    Layer,
    Thumbnail,
    Mipmap,
    MipmapInfo,
    Offscreen,
    ExternalDataId,
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Link::Layer => "layer",
            Link::Thumbnail => "layer thumbnail",
            Link::Mipmap => "mipmap",
            Link::MipmapInfo => "base mipmap info",
            Link::Offscreen => "offscreen",
            Link::ExternalDataId => "external data id",
        })
    }
}

/// Everything needed to decode a layer's pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSource {
    pub canvas_id: i64,
    pub layer_id: i64,
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Scale of the base mipmap level (normally 1.0).
    pub scale: f64,
    pub external_id: String,
}

/// Follow the chain from a layer to its external-data identifier.
pub fn resolve_layer(tables: &EntityTables, canvas_id: i64, layer_id: i64) -> Result<LayerSource> {
    let broken = |missing: Link| Error::IncompleteLayerData {
        canvas_id,
        layer_id,
        missing,
    };

    let layer = tables
        .layer(canvas_id, layer_id)
        .ok_or_else(|| broken(Link::Layer))?;
    let thumbnail = layer
        .thumbnail_id
        .and_then(|id| tables.thumbnails().get(id))
        .ok_or_else(|| broken(Link::Thumbnail))?;
    let mipmap = layer
        .mipmap_id
        .and_then(|id| tables.mipmaps().get(id))
        .ok_or_else(|| broken(Link::Mipmap))?;
    let info = tables
        .mipmap_infos()
        .get(mipmap.base_info_id)
        .ok_or_else(|| broken(Link::MipmapInfo))?;
    let offscreen = tables
        .offscreens()
        .get(info.offscreen_id)
        .ok_or_else(|| broken(Link::Offscreen))?;
    let external_id = offscreen
        .external_id
        .clone()
        .ok_or_else(|| broken(Link::ExternalDataId))?;

    Ok(LayerSource {
        canvas_id,
        layer_id,
        name: layer.name.clone(),
        width: thumbnail.width,
        height: thumbnail.height,
        scale: info.scale,
        external_id,
    })
}
