//! Immutable entity tables with secondary indices

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use super::types::{
    CanvasPreview, Entity, Layer, LayerThumbnail, Mipmap, MipmapInfo, Offscreen,
};
use crate::diagnostics::{Diagnostic, DiagnosticSink};

/// Records of one entity type keyed by primary id, in load order.
#[derive(Debug, Clone)]
pub struct Table<T> {
    rows: IndexMap<i64, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: IndexMap::new(),
        }
    }
}

impl<T: Entity> Table<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record. A repeated id keeps the existing record and returns `false`.
    pub fn insert(&mut self, record: T) -> bool {
        match self.rows.entry(record.id()) {
            indexmap::map::Entry::Occupied(_) => false,
            indexmap::map::Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
        }
    }

    /// Insert a record, reporting a duplicate id to `sink`.
    pub fn insert_reporting(&mut self, record: T, sink: &dyn DiagnosticSink) {
        let id = record.id();
        if !self.insert(record) {
            sink.report(Diagnostic::DuplicateId { table: T::TABLE, id });
        }
    }

    pub fn get(&self, id: i64) -> Option<&T> {
        self.rows.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<T: Entity> FromIterator<T> for Table<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut table = Table::new();
        for record in iter {
            table.insert(record);
        }
        table
    }
}

/// Every metadata table of one container.
///
/// Populated once when the container is opened and never modified afterwards.
#[derive(Debug, Clone, Default)]
pub struct EntityTables {
    previews: Table<CanvasPreview>,
    layers: Table<Layer>,
    thumbnails: Table<LayerThumbnail>,
    offscreens: Table<Offscreen>,
    mipmaps: Table<Mipmap>,
    mipmap_infos: Table<MipmapInfo>,
    layers_by_canvas: IndexMap<i64, Vec<i64>>,
    offscreens_by_layer: HashMap<(i64, i64), Vec<i64>>,
}

impl EntityTables {
    /// Assemble the tables and build the secondary indices.
    pub fn new(
        previews: Table<CanvasPreview>,
        layers: Table<Layer>,
        thumbnails: Table<LayerThumbnail>,
        offscreens: Table<Offscreen>,
        mipmaps: Table<Mipmap>,
        mipmap_infos: Table<MipmapInfo>,
    ) -> Self {
        let mut layers_by_canvas: IndexMap<i64, Vec<i64>> = IndexMap::new();
        for layer in layers.iter() {
            layers_by_canvas
                .entry(layer.canvas_id)
                .or_default()
                .push(layer.id);
        }
        layers_by_canvas.sort_keys();

        let mut offscreens_by_layer: HashMap<(i64, i64), Vec<i64>> = HashMap::new();
        for offscreen in offscreens.iter() {
            offscreens_by_layer
                .entry((offscreen.canvas_id, offscreen.layer_id))
                .or_default()
                .push(offscreen.id);
        }

        Self {
            previews,
            layers,
            thumbnails,
            offscreens,
            mipmaps,
            mipmap_infos,
            layers_by_canvas,
            offscreens_by_layer,
        }
    }

    pub fn previews(&self) -> &Table<CanvasPreview> {
        &self.previews
    }

    pub fn layers(&self) -> &Table<Layer> {
        &self.layers
    }

    pub fn thumbnails(&self) -> &Table<LayerThumbnail> {
        &self.thumbnails
    }

    pub fn offscreens(&self) -> &Table<Offscreen> {
        &self.offscreens
    }

    pub fn mipmaps(&self) -> &Table<Mipmap> {
        &self.mipmaps
    }

    pub fn mipmap_infos(&self) -> &Table<MipmapInfo> {
        &self.mipmap_infos
    }

    /// Whether no table holds any record.
    pub fn is_empty(&self) -> bool {
        self.previews.is_empty()
            && self.layers.is_empty()
            && self.thumbnails.is_empty()
            && self.offscreens.is_empty()
            && self.mipmaps.is_empty()
            && self.mipmap_infos.is_empty()
    }

    /// Layer in a canvas. The layer's own canvas id must match.
    pub fn layer(&self, canvas_id: i64, layer_id: i64) -> Option<&Layer> {
        self.layers
            .get(layer_id)
            .filter(|layer| layer.canvas_id == canvas_id)
    }

    /// Canvas ids that have layers or a preview, ascending.
    pub fn canvas_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .layers_by_canvas
            .keys()
            .copied()
            .chain(self.previews.iter().map(|p| p.canvas_id))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Layers of a canvas, in load order.
    pub fn layers_in_canvas(&self, canvas_id: i64) -> impl Iterator<Item = &Layer> {
        self.layers_by_canvas
            .get(&canvas_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.layers.get(*id))
    }

    /// Every offscreen recorded for a layer.
    pub fn offscreens_for_layer(&self, canvas_id: i64, layer_id: i64) -> impl Iterator<Item = &Offscreen> {
        self.offscreens_by_layer
            .get(&(canvas_id, layer_id))
            .into_iter()
            .flatten()
            .filter_map(|id| self.offscreens.get(*id))
    }

    /// Walk a mipmap chain from its base level.
    ///
    /// Stops at a `next_id` of 0, at a missing level, or when a level repeats
    /// (reported as [`Diagnostic::MipmapCycle`]).
    pub fn mipmap_chain(&self, mipmap: &Mipmap, sink: &dyn DiagnosticSink) -> Vec<&MipmapInfo> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut next = mipmap.base_info_id;

        while next != 0 {
            if !seen.insert(next) {
                sink.report(Diagnostic::MipmapCycle { info_id: next });
                break;
            }
            let Some(info) = self.mipmap_infos.get(next) else {
                break;
            };
            chain.push(info);
            next = info.next_id;
        }

        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;

    fn info(id: i64, scale: f64, next_id: i64) -> MipmapInfo {
        MipmapInfo {
            id,
            canvas_id: 1,
            layer_id: 2,
            scale,
            offscreen_id: id * 10,
            next_id,
        }
    }

    fn layer(id: i64, canvas_id: i64) -> Layer {
        Layer {
            id,
            canvas_id,
            name: format!("Layer {id}"),
            uuid: None,
            mipmap_id: None,
            thumbnail_id: None,
        }
    }

    #[test]
    fn test_duplicate_keeps_first() {
        let sink = CollectingSink::new();
        let mut table = Table::new();
        table.insert_reporting(layer(1, 1), &sink);
        let mut dup = layer(1, 1);
        dup.name = "other".to_string();
        table.insert_reporting(dup, &sink);

        assert_eq!(table.len(), 1);
        assert_eq!(table.get(1).unwrap().name, "Layer 1");
        assert_eq!(
            sink.entries(),
            vec![Diagnostic::DuplicateId { table: "Layer", id: 1 }]
        );
    }

    #[test]
    fn test_layers_by_canvas() {
        let layers: Table<Layer> = [layer(5, 2), layer(3, 1), layer(4, 2)].into_iter().collect();
        let tables = EntityTables::new(
            Table::new(),
            layers,
            Table::new(),
            Table::new(),
            Table::new(),
            Table::new(),
        );

        assert_eq!(tables.canvas_ids(), vec![1, 2]);
        let ids: Vec<i64> = tables.layers_in_canvas(2).map(|l| l.id).collect();
        assert_eq!(ids, vec![5, 4]);
        assert!(tables.layer(1, 5).is_none());
        assert!(tables.layer(2, 5).is_some());
    }

    #[test]
    fn test_mipmap_chain_walks_levels() {
        let infos: Table<MipmapInfo> =
            [info(1, 1.0, 2), info(2, 0.5, 3), info(3, 0.25, 0)].into_iter().collect();
        let tables = EntityTables::new(
            Table::new(),
            Table::new(),
            Table::new(),
            Table::new(),
            Table::new(),
            infos,
        );
        let mipmap = Mipmap {
            id: 9,
            canvas_id: 1,
            layer_id: 2,
            count: 3,
            base_info_id: 1,
        };

        let sink = CollectingSink::new();
        let scales: Vec<f64> = tables
            .mipmap_chain(&mipmap, &sink)
            .iter()
            .map(|i| i.scale)
            .collect();
        assert_eq!(scales, vec![1.0, 0.5, 0.25]);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_mipmap_chain_cycle() {
        let infos: Table<MipmapInfo> = [info(1, 1.0, 2), info(2, 0.5, 1)].into_iter().collect();
        let tables = EntityTables::new(
            Table::new(),
            Table::new(),
            Table::new(),
            Table::new(),
            Table::new(),
            infos,
        );
        let mipmap = Mipmap {
            id: 9,
            canvas_id: 1,
            layer_id: 2,
            count: 2,
            base_info_id: 1,
        };

        let sink = CollectingSink::new();
        assert_eq!(tables.mipmap_chain(&mipmap, &sink).len(), 2);
        assert_eq!(sink.entries(), vec![Diagnostic::MipmapCycle { info_id: 1 }]);
    }
}
