use std::sync::{Arc, Mutex};

use crate::runtime::MapHandle;
use crate::settings::Settings;

// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub map: MapHandle,
    pub settings: Arc<Mutex<Settings>>,
}
