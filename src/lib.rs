//! EntryMap: headless core of a geotagged-entry map.
//!
//! Fetches a feed of entries, clusters them per zoom level, and keeps the
//! map state (region, markers, selection, sliding panel) in a single
//! model driven by messages from a rendering surface.

pub mod app;
pub mod cluster;
pub mod constants;
pub mod entry;
pub mod feed;
pub mod link;
pub mod panel;
pub mod runtime;
pub mod selection;
pub mod server;
pub mod settings;
pub mod store;
pub mod utils;
pub mod zoom;

pub use app::{Command, MapConfig, Marker, Model, Msg, ViewSnapshot};
pub use cluster::{ClusterId, ClusterOptions, Feature, IndexError, SpatialIndex};
pub use entry::{BBox, Coordinates, Entry, EntryImage, Region};
pub use feed::{FeedError, FeedSource, HttpFeedSource, StaticFeedSource};
pub use link::{LinkError, LinkOpener, SystemLinkOpener};
pub use panel::{Easing, Panel, PanelError, PanelGeometry, PanelState};
pub use runtime::{MapHandle, Runtime, RuntimeClosed};
pub use selection::{MarkerTarget, SelectionController, SelectionError, SelectionMatch};
pub use settings::Settings;
pub use store::EntryStore;
pub use zoom::zoom_for_latitude_delta;
