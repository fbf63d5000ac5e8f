//! Metadata entity records

/// A layer of a canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub id: i64,
    pub canvas_id: i64,
    pub name: String,
    pub uuid: Option<String>,
    /// `LayerRenderMipmap`: root of this layer's mipmap chain.
    pub mipmap_id: Option<i64>,
    /// `LayerRenderThumbnail`: carries the declared pixel dimensions.
    pub thumbnail_id: Option<i64>,
}

/// Declared render size of a layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerThumbnail {
    pub id: i64,
    pub canvas_id: i64,
    pub layer_id: i64,
    pub width: u32,
    pub height: u32,
    pub offscreen_id: Option<i64>,
}

/// Link from a layer or mipmap level to its external pixel data.
#[derive(Debug, Clone, PartialEq)]
pub struct Offscreen {
    pub id: i64,
    pub canvas_id: i64,
    pub layer_id: i64,
    /// Identifier of the `CHNKExta` chunk holding the pixels; may be absent.
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mipmap {
    pub id: i64,
    pub canvas_id: i64,
    pub layer_id: i64,
    pub count: i64,
    pub base_info_id: i64,
}

/// One level of a mipmap chain.
#[derive(Debug, Clone, PartialEq)]
pub struct MipmapInfo {
    pub id: i64,
    pub canvas_id: i64,
    pub layer_id: i64,
    pub scale: f64,
    pub offscreen_id: i64,
    /// Next (smaller) level; 0 ends the chain.
    pub next_id: i64,
}

/// Pre-encoded preview image of a whole canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasPreview {
    pub id: i64,
    pub canvas_id: i64,
    pub image_data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// A record keyed by its `MainId`.
pub trait Entity {
    /// Source table name.
    const TABLE: &'static str;

    fn id(&self) -> i64;
}

impl Entity for Layer {
    const TABLE: &'static str = "Layer";

    fn id(&self) -> i64 {
        self.id
    }
}

impl Entity for LayerThumbnail {
    const TABLE: &'static str = "LayerThumbnail";

    fn id(&self) -> i64 {
        self.id
    }
}

impl Entity for Offscreen {
    const TABLE: &'static str = "Offscreen";

    fn id(&self) -> i64 {
        self.id
    }
}

impl Entity for Mipmap {
    const TABLE: &'static str = "Mipmap";

    fn id(&self) -> i64 {
        self.id
    }
}

impl Entity for MipmapInfo {
    const TABLE: &'static str = "MipmapInfo";

    fn id(&self) -> i64 {
        self.id
    }
}

impl Entity for CanvasPreview {
    const TABLE: &'static str = "CanvasPreview";

    fn id(&self) -> i64 {
        self.id
    }
}
