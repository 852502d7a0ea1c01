//! Hierarchical greedy point clustering over Web Mercator space.
//!
//! Every zoom level from `max_zoom + 1` (raw points) down to `min_zoom`
//! keeps its own kd-tree. Building a level walks the nodes of the level
//! above it: each node not yet absorbed pulls in every unabsorbed
//! neighbour within `radius / (extent * 2^zoom)`, and a group that
//! reaches `min_points` becomes a cluster at its weighted centroid.

use std::f64::consts::PI;
use std::time::Instant;

use kdtree::distance::squared_euclidean;
use kdtree::KdTree;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::constants::{
    CLUSTER_EXTENT, CLUSTER_MAX_ZOOM, CLUSTER_MIN_POINTS, CLUSTER_MIN_ZOOM, CLUSTER_RADIUS,
};
use crate::entry::{BBox, Coordinates, Entry};

// Cluster ids pack the origin zoom into the low 5 bits
const ZOOM_BITS: u32 = 5;
const ZOOM_MASK: u64 = (1 << ZOOM_BITS) - 1;
const MAX_SUPPORTED_ZOOM: u8 = 30;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    #[error("cluster {0} not found")]
    ClusterNotFound(ClusterId),

    #[error("kd-tree rejected point: {0}")]
    Tree(String),
}

/// Opaque handle used to fetch the children or leaves of a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(u64);

impl ClusterId {
    fn new(origin_index: usize, origin_zoom: u8) -> Self {
        Self(((origin_index as u64) << ZOOM_BITS) | u64::from(origin_zoom))
    }

    fn origin_index(self) -> usize {
        (self.0 >> ZOOM_BITS) as usize
    }

    fn origin_zoom(self) -> u8 {
        (self.0 & ZOOM_MASK) as u8
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for ClusterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterOptions {
    /// Cluster radius in pixels at tile size `extent`.
    pub radius: f64,
    pub extent: f64,
    pub min_points: usize,
    pub min_zoom: u8,
    pub max_zoom: u8,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            radius: CLUSTER_RADIUS,
            extent: CLUSTER_EXTENT,
            min_points: CLUSTER_MIN_POINTS,
            min_zoom: CLUSTER_MIN_ZOOM,
            max_zoom: CLUSTER_MAX_ZOOM,
        }
    }
}

impl ClusterOptions {
    fn sanitized(mut self) -> Self {
        self.max_zoom = self.max_zoom.min(MAX_SUPPORTED_ZOOM);
        self.min_zoom = self.min_zoom.min(self.max_zoom);
        self.min_points = self.min_points.max(2);
        if !(self.radius.is_finite() && self.radius > 0.0) {
            self.radius = CLUSTER_RADIUS;
        }
        if !(self.extent.is_finite() && self.extent > 0.0) {
            self.extent = CLUSTER_EXTENT;
        }
        self
    }

    fn radius_at(&self, zoom: u8) -> f64 {
        self.radius / (self.extent * 2f64.powi(i32::from(zoom)))
    }
}

/// One item of a `get_clusters` / `get_children` answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Feature {
    /// A single entry; `entry` is its position in the slice given to `load`.
    Point {
        entry: usize,
        coordinates: Coordinates,
    },
    Cluster {
        id: ClusterId,
        count: usize,
        coordinates: Coordinates,
    },
}

impl Feature {
    pub fn coordinates(&self) -> Coordinates {
        match self {
            Feature::Point { coordinates, .. } | Feature::Cluster { coordinates, .. } => {
                *coordinates
            }
        }
    }

    pub fn count(&self) -> usize {
        match self {
            Feature::Point { .. } => 1,
            Feature::Cluster { count, .. } => *count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum NodeKind {
    Point(usize),
    Cluster(ClusterId),
}

#[derive(Debug, Clone)]
struct Node {
    x: f64,
    y: f64,
    // Zoom at which this node was last visited; None means not yet
    visited: Option<u8>,
    kind: NodeKind,
    num_points: usize,
    parent: Option<ClusterId>,
}

impl Node {
    fn unvisited_at(&self, zoom: u8) -> bool {
        self.visited.map_or(true, |z| z > zoom)
    }
}

struct Level {
    nodes: Vec<Node>,
    tree: KdTree<f64, usize, [f64; 2]>,
}

impl Level {
    fn build(nodes: Vec<Node>) -> Result<Self, IndexError> {
        let mut tree = KdTree::with_capacity(2, nodes.len().max(1));
        for (i, node) in nodes.iter().enumerate() {
            tree.add([node.x, node.y], i)
                .map_err(|e| IndexError::Tree(format!("{e:?}")))?;
        }
        Ok(Self { nodes, tree })
    }

    fn within(&self, x: f64, y: f64, radius: f64) -> Vec<usize> {
        if self.nodes.is_empty() {
            return Vec::new();
        }
        match self.tree.within(&[x, y], radius * radius, &squared_euclidean) {
            Ok(found) => {
                let mut ids: Vec<usize> = found.into_iter().map(|(_, &i)| i).collect();
                ids.sort_unstable();
                ids
            }
            Err(e) => {
                warn!("kd-tree radius query failed: {:?}", e);
                Vec::new()
            }
        }
    }

    fn range(&self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Vec<usize> {
        let cx = (min_x + max_x) / 2.0;
        let cy = (min_y + max_y) / 2.0;
        let half_diagonal = ((max_x - min_x).powi(2) + (max_y - min_y).powi(2)).sqrt() / 2.0;
        self.within(cx, cy, half_diagonal + f64::EPSILON)
            .into_iter()
            .filter(|&i| {
                let n = &self.nodes[i];
                n.x >= min_x && n.x <= max_x && n.y >= min_y && n.y <= max_y
            })
            .collect()
    }
}

/// Clustering index over entry coordinates, rebuilt on every full load.
pub struct SpatialIndex {
    options: ClusterOptions,
    // (entry position, raw coordinates), ascending by entry position
    points: Vec<(usize, Coordinates)>,
    // levels[z - min_zoom] for z in min_zoom..=max_zoom + 1
    levels: Vec<Level>,
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new(ClusterOptions::default())
    }
}

impl SpatialIndex {
    pub fn new(options: ClusterOptions) -> Self {
        Self {
            options: options.sanitized(),
            points: Vec::new(),
            levels: Vec::new(),
        }
    }

    pub fn options(&self) -> &ClusterOptions {
        &self.options
    }

    pub fn is_built(&self) -> bool {
        !self.levels.is_empty()
    }

    /// Number of indexed points (entries with usable coordinates).
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Index every entry by coordinate, replacing whatever was loaded before.
    pub fn load(&mut self, entries: &[Entry]) -> Result<(), IndexError> {
        let start = Instant::now();
        self.levels.clear();
        self.points.clear();

        for (i, entry) in entries.iter().enumerate() {
            if entry.coordinates.is_valid() {
                self.points.push((i, entry.coordinates));
            } else {
                warn!(link = %entry.link, "skipping entry with unusable coordinates");
            }
        }

        let leaves: Vec<Node> = self
            .points
            .iter()
            .map(|&(entry, c)| Node {
                x: lng_x(c.longitude),
                y: lat_y(c.latitude),
                visited: None,
                kind: NodeKind::Point(entry),
                num_points: 1,
                parent: None,
            })
            .collect();

        let mut current = Level::build(leaves)?;
        let mut built = Vec::with_capacity(usize::from(self.options.max_zoom) + 2);
        for zoom in (self.options.min_zoom..=self.options.max_zoom).rev() {
            let next = Level::build(cluster_level(&self.options, &mut current, zoom))?;
            built.push(current);
            current = next;
        }
        built.push(current);
        built.reverse();
        self.levels = built;

        debug!(
            "Spatial index built in {:?} with {} points over {} zoom levels",
            start.elapsed(),
            self.points.len(),
            self.levels.len()
        );
        Ok(())
    }

    /// Points and clusters inside `bbox` at `zoom`. Empty until `load` has run.
    pub fn get_clusters(&self, bbox: BBox, zoom: u8) -> Vec<Feature> {
        if self.levels.is_empty() {
            return Vec::new();
        }
        if ![bbox.west, bbox.south, bbox.east, bbox.north]
            .iter()
            .all(|v| v.is_finite())
        {
            return Vec::new();
        }

        let mut min_lng = (bbox.west + 180.0).rem_euclid(360.0) - 180.0;
        let min_lat = bbox.south.clamp(-90.0, 90.0);
        let mut max_lng = if bbox.east == 180.0 {
            180.0
        } else {
            (bbox.east + 180.0).rem_euclid(360.0) - 180.0
        };
        let max_lat = bbox.north.clamp(-90.0, 90.0);

        if bbox.east - bbox.west >= 360.0 {
            min_lng = -180.0;
            max_lng = 180.0;
        } else if min_lng > max_lng {
            let mut eastern = self.get_clusters(BBox::new(min_lng, min_lat, 180.0, max_lat), zoom);
            let western = self.get_clusters(BBox::new(-180.0, min_lat, max_lng, max_lat), zoom);
            eastern.extend(western);
            return eastern;
        }

        let Some(level) = self.level(self.limit_zoom(zoom)) else {
            return Vec::new();
        };
        level
            .range(lng_x(min_lng), lat_y(max_lat), lng_x(max_lng), lat_y(min_lat))
            .into_iter()
            .map(|i| self.feature(&level.nodes[i]))
            .collect()
    }

    /// Direct children of a cluster one zoom level down.
    pub fn get_children(&self, id: ClusterId) -> Result<Vec<Feature>, IndexError> {
        let origin_zoom = id.origin_zoom();
        if origin_zoom == 0 {
            return Err(IndexError::ClusterNotFound(id));
        }
        let level = self
            .level(origin_zoom)
            .ok_or(IndexError::ClusterNotFound(id))?;
        let origin = level
            .nodes
            .get(id.origin_index())
            .ok_or(IndexError::ClusterNotFound(id))?;

        let radius = self.options.radius_at(origin_zoom - 1);
        let children: Vec<Feature> = level
            .within(origin.x, origin.y, radius)
            .into_iter()
            .filter(|&i| level.nodes[i].parent == Some(id))
            .map(|i| self.feature(&level.nodes[i]))
            .collect();

        if children.is_empty() {
            return Err(IndexError::ClusterNotFound(id));
        }
        Ok(children)
    }

    /// Position of a cluster marker, whether or not it is currently in view.
    pub fn cluster_coordinates(&self, id: ClusterId) -> Result<Coordinates, IndexError> {
        let origin_zoom = id.origin_zoom();
        let created_at = origin_zoom
            .checked_sub(1)
            .ok_or(IndexError::ClusterNotFound(id))?;
        let origin = self
            .level(origin_zoom)
            .and_then(|level| level.nodes.get(id.origin_index()))
            .ok_or(IndexError::ClusterNotFound(id))?;
        let level = self
            .level(created_at)
            .ok_or(IndexError::ClusterNotFound(id))?;

        // The centroid never sits further from its origin than the merge radius
        let radius = self.options.radius_at(created_at);
        level
            .within(origin.x, origin.y, radius + f64::EPSILON)
            .into_iter()
            .map(|i| &level.nodes[i])
            .find(|node| node.kind == NodeKind::Cluster(id))
            .map(|node| Coordinates::new(y_lat(node.y), x_lng(node.x)))
            .ok_or(IndexError::ClusterNotFound(id))
    }

    /// Entry positions under a cluster, paged by `limit` / `offset`.
    pub fn get_leaves(
        &self,
        id: ClusterId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<usize>, IndexError> {
        let mut leaves = Vec::new();
        if limit > 0 {
            self.append_leaves(&mut leaves, id, limit, offset, 0)?;
        }
        Ok(leaves)
    }

    pub fn get_all_leaves(&self, id: ClusterId) -> Result<Vec<usize>, IndexError> {
        self.get_leaves(id, usize::MAX, 0)
    }

    /// Zoom at which the cluster breaks apart into more than one child.
    pub fn get_cluster_expansion_zoom(&self, id: ClusterId) -> Result<u8, IndexError> {
        let mut cluster = id;
        let mut expansion_zoom = id.origin_zoom().saturating_sub(1);
        while expansion_zoom <= self.options.max_zoom {
            let children = self.get_children(cluster)?;
            expansion_zoom += 1;
            match children.as_slice() {
                [Feature::Cluster { id, .. }] => cluster = *id,
                _ => break,
            }
        }
        Ok(expansion_zoom)
    }

    fn append_leaves(
        &self,
        out: &mut Vec<usize>,
        id: ClusterId,
        limit: usize,
        offset: usize,
        mut skipped: usize,
    ) -> Result<usize, IndexError> {
        for child in self.get_children(id)? {
            match child {
                Feature::Cluster { id, count, .. } => {
                    if skipped + count <= offset {
                        skipped += count;
                    } else {
                        skipped = self.append_leaves(out, id, limit, offset, skipped)?;
                    }
                }
                Feature::Point { entry, .. } => {
                    if skipped < offset {
                        skipped += 1;
                    } else {
                        out.push(entry);
                    }
                }
            }
            if out.len() == limit {
                break;
            }
        }
        Ok(skipped)
    }

    fn limit_zoom(&self, zoom: u8) -> u8 {
        zoom.clamp(self.options.min_zoom, self.options.max_zoom + 1)
    }

    fn level(&self, zoom: u8) -> Option<&Level> {
        let offset = zoom.checked_sub(self.options.min_zoom)?;
        self.levels.get(usize::from(offset))
    }

    fn feature(&self, node: &Node) -> Feature {
        match node.kind {
            // Raw coordinates, not the reprojected ones, so equality checks stay exact
            NodeKind::Point(entry) => Feature::Point {
                entry,
                coordinates: self
                    .points
                    .binary_search_by_key(&entry, |&(i, _)| i)
                    .map(|pos| self.points[pos].1)
                    .unwrap_or_else(|_| Coordinates::new(y_lat(node.y), x_lng(node.x))),
            },
            NodeKind::Cluster(id) => Feature::Cluster {
                id,
                count: node.num_points,
                coordinates: Coordinates::new(y_lat(node.y), x_lng(node.x)),
            },
        }
    }
}

fn cluster_level(options: &ClusterOptions, prev: &mut Level, zoom: u8) -> Vec<Node> {
    let radius = options.radius_at(zoom);
    let mut next = Vec::new();

    for i in 0..prev.nodes.len() {
        if !prev.nodes[i].unvisited_at(zoom) {
            continue;
        }
        prev.nodes[i].visited = Some(zoom);

        let (x, y) = (prev.nodes[i].x, prev.nodes[i].y);
        let origin_points = prev.nodes[i].num_points;
        let neighbors = prev.within(x, y, radius);

        let num_points = origin_points
            + neighbors
                .iter()
                .map(|&j| &prev.nodes[j])
                .filter(|n| n.unvisited_at(zoom))
                .map(|n| n.num_points)
                .sum::<usize>();

        if num_points > origin_points && num_points >= options.min_points {
            let id = ClusterId::new(i, zoom + 1);
            let mut wx = x * origin_points as f64;
            let mut wy = y * origin_points as f64;

            for &j in &neighbors {
                let neighbor = &mut prev.nodes[j];
                if !neighbor.unvisited_at(zoom) {
                    continue;
                }
                neighbor.visited = Some(zoom);
                neighbor.parent = Some(id);
                wx += neighbor.x * neighbor.num_points as f64;
                wy += neighbor.y * neighbor.num_points as f64;
            }
            prev.nodes[i].parent = Some(id);

            next.push(Node {
                x: wx / num_points as f64,
                y: wy / num_points as f64,
                visited: None,
                kind: NodeKind::Cluster(id),
                num_points,
                parent: None,
            });
        } else {
            next.push(prev.nodes[i].clone());
            if num_points > 1 {
                for &j in &neighbors {
                    let neighbor = &mut prev.nodes[j];
                    if !neighbor.unvisited_at(zoom) {
                        continue;
                    }
                    neighbor.visited = Some(zoom);
                    next.push(neighbor.clone());
                }
            }
        }
    }
    next
}

// Spherical Mercator projection into the unit square

fn lng_x(lng: f64) -> f64 {
    lng / 360.0 + 0.5
}

fn lat_y(lat: f64) -> f64 {
    let sin = lat.to_radians().sin();
    let y = 0.5 - 0.25 * ((1.0 + sin) / (1.0 - sin)).ln() / PI;
    y.clamp(0.0, 1.0)
}

fn x_lng(x: f64) -> f64 {
    (x - 0.5) * 360.0
}

fn y_lat(y: f64) -> f64 {
    let y2 = (180.0 - y * 360.0).to_radians();
    360.0 * y2.exp().atan() / PI - 90.0
}
