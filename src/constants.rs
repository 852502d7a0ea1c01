use std::time::Duration;

// Port configuration
pub const DEFAULT_PORT: u16 = 3001;

// Feed source
pub const DEFAULT_FEED_URL: &str = "http://127.0.0.1:3000";
pub const DEFAULT_FEED_PATH: &str = "feed";
pub const FEED_TIMEOUT: Duration = Duration::from_secs(15);

// Initial viewport (Philadelphia)
pub const INITIAL_LATITUDE: f64 = 39.952;
pub const INITIAL_LONGITUDE: f64 = -75.1636;
pub const INITIAL_LATITUDE_DELTA: f64 = 0.0922;
pub const INITIAL_LONGITUDE_DELTA: f64 = 0.0421;

// Tapped marker is recentred this far north of the region centre so it stays above the panel
pub const SELECTION_LATITUDE_OFFSET: f64 = 0.0230;

// Clustering index
pub const CLUSTER_RADIUS: f64 = 40.0;
pub const CLUSTER_EXTENT: f64 = 512.0;
pub const CLUSTER_MIN_POINTS: usize = 2;
pub const CLUSTER_MIN_ZOOM: u8 = 0;
pub const CLUSTER_MAX_ZOOM: u8 = 16;

// Zoom mapper: (latitude delta strictly below, zoom). Thresholds ascend, zooms descend.
pub const ZOOM_STEPS: &[(f64, u8)] = &[
    (0.005, 17),
    (0.01, 16),
    (0.02, 15),
    (0.03, 14),
    (0.04, 13),
    (0.05, 12),
    (0.06, 11),
    (0.07, 10),
    (0.08, 9),
    (0.09, 8),
    (0.1, 7),
    (0.12, 6),
    (0.14, 5),
    (0.16, 4),
    (0.18, 3),
    (0.2, 2),
    (0.24, 1),
];
pub const MIN_ZOOM: u8 = 0;
pub const MAX_ZOOM: u8 = 17;

// Panel geometry and motion
pub const DEFAULT_SCREEN_HEIGHT: f64 = 800.0;
pub const PANEL_HEIGHT_RATIO: f64 = 0.5;
pub const PANEL_STEPS: u32 = 10;
pub const PANEL_TICK: Duration = Duration::from_millis(10);
pub const PANEL_SNAP_DISTANCE: f64 = 1.0;

// Runtime channels
pub const MESSAGE_QUEUE_SIZE: usize = 64;
pub const EVENT_QUEUE_SIZE: usize = 100;
