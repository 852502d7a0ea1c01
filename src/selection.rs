use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cluster::{ClusterId, IndexError, SpatialIndex};
use crate::entry::{Coordinates, Entry};
use crate::store::EntryStore;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectionError {
    #[error("no entry with link {0}")]
    UnknownEntry(String),

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// How a tapped marker is turned back into entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMatch {
    /// By entry link.
    #[default]
    Link,
    /// Every entry sharing a tapped coordinate, so co-located entries come along.
    Coordinate,
}

impl SelectionMatch {
    pub fn as_str(self) -> &'static str {
        match self {
            SelectionMatch::Link => "link",
            SelectionMatch::Coordinate => "coordinate",
        }
    }
}

impl FromStr for SelectionMatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "link" | "id" => Ok(SelectionMatch::Link),
            "coordinate" | "coordinates" => Ok(SelectionMatch::Coordinate),
            other => Err(format!("unknown selection match '{other}'")),
        }
    }
}

/// What the surface reports when a marker is tapped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarkerTarget {
    Point { link: String },
    Cluster { id: ClusterId },
}

/// Tracks the entries under the last tapped marker.
#[derive(Debug, Clone, Default)]
pub struct SelectionController {
    policy: SelectionMatch,
    target: Option<MarkerTarget>,
    selected: Vec<usize>,
}

impl SelectionController {
    pub fn new(policy: SelectionMatch) -> Self {
        Self {
            policy,
            target: None,
            selected: Vec::new(),
        }
    }

    pub fn policy(&self) -> SelectionMatch {
        self.policy
    }

    pub fn target(&self) -> Option<&MarkerTarget> {
        self.target.as_ref()
    }

    /// Store positions of the selected entries.
    pub fn selected(&self) -> &[usize] {
        &self.selected
    }

    pub fn selected_entries<'a>(&self, store: &'a EntryStore) -> Vec<&'a Entry> {
        self.selected.iter().filter_map(|&i| store.get(i)).collect()
    }

    /// Select the entries under `target`. Returns true when the selection changed.
    pub fn select(
        &mut self,
        target: MarkerTarget,
        store: &EntryStore,
        index: &SpatialIndex,
    ) -> Result<bool, SelectionError> {
        if self.target.as_ref() == Some(&target) {
            return Ok(false);
        }
        let selected = resolve(&target, self.policy, store, index)?;
        let changed = selected != self.selected;
        self.target = Some(target);
        self.selected = selected;
        Ok(changed)
    }

    pub fn clear(&mut self) {
        self.target = None;
        self.selected.clear();
    }
}

fn resolve(
    target: &MarkerTarget,
    policy: SelectionMatch,
    store: &EntryStore,
    index: &SpatialIndex,
) -> Result<Vec<usize>, SelectionError> {
    let direct = match target {
        MarkerTarget::Point { link } => vec![store
            .index_of(link)
            .ok_or_else(|| SelectionError::UnknownEntry(link.clone()))?],
        MarkerTarget::Cluster { id } => index.get_all_leaves(*id)?,
    };

    match policy {
        SelectionMatch::Link => Ok(direct),
        SelectionMatch::Coordinate => {
            let tapped: Vec<Coordinates> = direct
                .iter()
                .filter_map(|&i| store.get(i))
                .map(|e| e.coordinates)
                .collect();
            Ok(store
                .all()
                .iter()
                .enumerate()
                .filter(|(_, e)| tapped.contains(&e.coordinates))
                .map(|(i, _)| i)
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::Feature;
    use crate::entry::BBox;

    fn entry(link: &str, lat: f64, lng: f64) -> Entry {
        Entry {
            link: link.to_string(),
            title: link.to_string(),
            body: String::new(),
            date: None,
            image: None,
            emoji: String::new(),
            coordinates: Coordinates::new(lat, lng),
        }
    }

    fn fixture() -> (EntryStore, SpatialIndex) {
        let store = EntryStore::from_entries([
            entry("a", 39.9520, -75.1636),
            entry("b", 39.9520, -75.1636),
            entry("c", 39.9522, -75.1634),
            entry("d", 34.0522, -118.2437),
        ]);
        let mut index = SpatialIndex::default();
        index.load(store.all()).unwrap();
        (store, index)
    }

    fn first_cluster(index: &SpatialIndex, zoom: u8) -> (ClusterId, usize) {
        index
            .get_clusters(BBox::world(), zoom)
            .into_iter()
            .find_map(|f| match f {
                Feature::Cluster { id, count, .. } => Some((id, count)),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn cluster_tap_selects_all_leaves() {
        let (store, index) = fixture();
        let (id, count) = first_cluster(&index, 8);
        let mut selection = SelectionController::new(SelectionMatch::Link);

        assert!(selection.select(MarkerTarget::Cluster { id }, &store, &index).unwrap());
        let mut selected = selection.selected().to_vec();
        selected.sort_unstable();
        assert_eq!(selected.len(), count);
        assert_eq!(selected, vec![0, 1, 2]);
    }

    #[test]
    fn point_tap_selects_one_entry_by_link() {
        let (store, index) = fixture();
        let mut selection = SelectionController::new(SelectionMatch::Link);
        let target = MarkerTarget::Point { link: "a".to_string() };

        selection.select(target, &store, &index).unwrap();
        let links: Vec<_> = selection
            .selected_entries(&store)
            .iter()
            .map(|e| e.link.clone())
            .collect();
        assert_eq!(links, vec!["a"]);
    }

    #[test]
    fn coordinate_policy_pulls_in_co_located_entries() {
        let (store, index) = fixture();
        let mut selection = SelectionController::new(SelectionMatch::Coordinate);
        let target = MarkerTarget::Point { link: "a".to_string() };

        selection.select(target, &store, &index).unwrap();
        assert_eq!(selection.selected(), &[0, 1]);
    }

    #[test]
    fn retapping_same_target_is_a_no_op() {
        let (store, index) = fixture();
        let mut selection = SelectionController::default();
        let target = MarkerTarget::Point { link: "d".to_string() };

        assert!(selection.select(target.clone(), &store, &index).unwrap());
        let before = selection.selected().to_vec();
        assert!(!selection.select(target, &store, &index).unwrap());
        assert_eq!(selection.selected(), before.as_slice());
    }

    #[test]
    fn unknown_link_is_an_error_and_keeps_selection() {
        let (store, index) = fixture();
        let mut selection = SelectionController::default();
        selection
            .select(MarkerTarget::Point { link: "d".to_string() }, &store, &index)
            .unwrap();

        let err = selection
            .select(MarkerTarget::Point { link: "zzz".to_string() }, &store, &index)
            .unwrap_err();
        assert_eq!(err, SelectionError::UnknownEntry("zzz".to_string()));
        assert_eq!(selection.selected(), &[3]);
    }

    #[test]
    fn marker_target_wire_format() {
        let json = serde_json::json!({ "type": "point", "link": "a" });
        let target: MarkerTarget = serde_json::from_value(json).unwrap();
        assert_eq!(target, MarkerTarget::Point { link: "a".to_string() });

        let json = serde_json::json!({ "type": "cluster", "id": 97 });
        let target: MarkerTarget = serde_json::from_value(json).unwrap();
        assert_eq!(target, MarkerTarget::Cluster { id: ClusterId::from_raw(97) });
    }
}
