//! Map state container.
//!
//! All state lives in [`Model`] and changes only through [`Model::update`],
//! which consumes a [`Msg`] and hands back the [`Command`]s the runtime
//! should carry out. Nothing in here touches the network, timers or the
//! clock; `now` is passed in.

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::cluster::{ClusterId, ClusterOptions, Feature, SpatialIndex};
use crate::constants::SELECTION_LATITUDE_OFFSET;
use crate::entry::{Coordinates, Entry, Region};
use crate::feed::FeedError;
use crate::panel::{Easing, Panel, PanelGeometry, PanelState};
use crate::selection::{MarkerTarget, SelectionController, SelectionMatch};
use crate::store::EntryStore;
use crate::zoom::zoom_for_latitude_delta;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MapConfig {
    pub region: Region,
    pub cluster: ClusterOptions,
    pub selection: SelectionMatch,
    pub geometry: PanelGeometry,
    pub easing: Easing,
}

#[derive(Debug)]
pub enum Msg {
    FeedLoaded(Result<Vec<Entry>, FeedError>),
    RegionChanged(Region),
    MarkerTapped(MarkerTarget),
    MapTapped,
    EntryTapped { link: String },
    /// Animation frame.
    Frame,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    FetchFeed,
    /// Keep delivering `Msg::Frame` until the panel stops moving.
    RequestFrames,
    OpenLink(String),
    /// The view changed; publish a fresh snapshot.
    Redraw,
}

/// What the surface draws for one point or cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Marker {
    Point {
        link: String,
        emoji: String,
        coordinates: Coordinates,
    },
    Cluster {
        id: ClusterId,
        count: usize,
        coordinates: Coordinates,
    },
}

impl Marker {
    pub fn coordinates(&self) -> Coordinates {
        match self {
            Marker::Point { coordinates, .. } | Marker::Cluster { coordinates, .. } => {
                *coordinates
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSnapshot {
    pub loaded: bool,
    pub entry_count: usize,
    pub region: Region,
    pub zoom: u8,
    pub markers: Vec<Marker>,
    pub selected: Vec<Entry>,
    pub panel: PanelState,
}

pub struct Model {
    region: Region,
    store: EntryStore,
    index: SpatialIndex,
    markers: Vec<Marker>,
    selection: SelectionController,
    panel: Panel,
    loaded: bool,
}

impl Model {
    pub fn new(config: MapConfig) -> Self {
        Self {
            region: config.region,
            store: EntryStore::new(),
            index: SpatialIndex::new(config.cluster),
            markers: Vec::new(),
            selection: SelectionController::new(config.selection),
            panel: Panel::new(config.geometry, config.easing),
            loaded: false,
        }
    }

    /// Effects to run once at startup.
    pub fn init(&self) -> Vec<Command> {
        vec![Command::FetchFeed]
    }

    pub fn update(&mut self, msg: Msg, now: Instant) -> Vec<Command> {
        match msg {
            Msg::FeedLoaded(Ok(entries)) => {
                let replaced = self.store.replace_all(entries);
                if replaced > 0 {
                    debug!("{} duplicate links collapsed", replaced);
                }
                if let Err(e) = self.index.load(self.store.all()) {
                    error!("Failed to build spatial index: {}", e);
                }
                self.selection.clear();
                self.loaded = true;
                self.refresh_markers();
                info!("🗺️  {} entries loaded, {} markers in view", self.store.len(), self.markers.len());
                vec![Command::Redraw]
            }
            Msg::FeedLoaded(Err(e)) => {
                error!("Failed to fetch feed: {}", e);
                self.loaded = true;
                vec![Command::Redraw]
            }
            Msg::RegionChanged(region) => {
                if !region.is_usable() {
                    warn!(?region, "ignoring unusable region");
                    return Vec::new();
                }
                self.region = region;
                if self.refresh_markers() {
                    vec![Command::Redraw]
                } else {
                    Vec::new()
                }
            }
            Msg::MarkerTapped(target) => self.on_marker_tapped(target, now),
            Msg::MapTapped => match self.panel.close(now) {
                Ok(()) => vec![Command::RequestFrames, Command::Redraw],
                Err(e) => {
                    debug!("close ignored: {}", e);
                    Vec::new()
                }
            },
            Msg::EntryTapped { link } => {
                if self.store.get_by_link(&link).is_some() {
                    vec![Command::OpenLink(link)]
                } else {
                    warn!(%link, "tapped entry is not in the feed");
                    Vec::new()
                }
            }
            Msg::Frame => {
                if !self.panel.is_transitioning() {
                    return Vec::new();
                }
                self.panel.advance(now);
                vec![Command::Redraw]
            }
        }
    }

    pub fn view(&self) -> ViewSnapshot {
        ViewSnapshot {
            loaded: self.loaded,
            entry_count: self.store.len(),
            region: self.region,
            zoom: self.zoom(),
            markers: self.markers.clone(),
            selected: self
                .selection
                .selected_entries(&self.store)
                .into_iter()
                .cloned()
                .collect(),
            panel: self.panel.state(),
        }
    }

    pub fn zoom(&self) -> u8 {
        zoom_for_latitude_delta(self.region.latitude_delta)
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn panel(&self) -> &Panel {
        &self.panel
    }

    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    fn on_marker_tapped(&mut self, target: MarkerTarget, now: Instant) -> Vec<Command> {
        let Some(anchor) = self.target_coordinates(&target) else {
            warn!(?target, "tapped marker is not on the map");
            return Vec::new();
        };
        if let Err(e) = self.selection.select(target, &self.store, &self.index) {
            warn!("selection failed: {}", e);
            return Vec::new();
        }

        self.region = Region::focused_on(Coordinates::new(
            anchor.latitude - SELECTION_LATITUDE_OFFSET,
            anchor.longitude,
        ));
        self.refresh_markers();

        let mut commands = Vec::new();
        match self.panel.open(now) {
            Ok(()) => commands.push(Command::RequestFrames),
            Err(e) => debug!("open ignored: {}", e),
        }
        commands.push(Command::Redraw);
        commands
    }

    fn target_coordinates(&self, target: &MarkerTarget) -> Option<Coordinates> {
        match target {
            MarkerTarget::Point { link } => self.store.get_by_link(link).map(|e| e.coordinates),
            MarkerTarget::Cluster { id } => match self.index.cluster_coordinates(*id) {
                Ok(coordinates) => Some(coordinates),
                Err(e) => {
                    debug!("{}", e);
                    None
                }
            },
        }
    }

    /// Recompute markers for the current region. Returns true if they changed.
    fn refresh_markers(&mut self) -> bool {
        let markers: Vec<Marker> = self
            .index
            .get_clusters(self.region.bbox(), self.zoom())
            .into_iter()
            .filter_map(|feature| match feature {
                Feature::Point { entry, coordinates } => {
                    self.store.get(entry).map(|e| Marker::Point {
                        link: e.link.clone(),
                        emoji: e.emoji.clone(),
                        coordinates,
                    })
                }
                Feature::Cluster { id, count, coordinates } => Some(Marker::Cluster {
                    id,
                    count,
                    coordinates,
                }),
            })
            .collect();

        if markers == self.markers {
            return false;
        }
        self.markers = markers;
        true
    }
}
