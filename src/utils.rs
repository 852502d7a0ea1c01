use std::path::PathBuf;

const APP_DIR: &str = "EntryMap";

/// Returns the cross-platform directory for application data
pub fn get_app_data_dir() -> PathBuf {
    if cfg!(target_os = "macos") {
        let home_dir = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let mut path = PathBuf::from(home_dir);
        path.push("Library");
        path.push("Application Support");
        path.push(APP_DIR);
        path
    } else if cfg!(target_os = "windows") {
        // %APPDATA%\EntryMap, or the current directory if unset
        match std::env::var("APPDATA") {
            Ok(appdata) => PathBuf::from(appdata).join(APP_DIR),
            Err(_) => PathBuf::from(".").join(APP_DIR),
        }
    } else if let Ok(xdg_data_home) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg_data_home).join(APP_DIR)
    } else {
        // ~/.local/share/EntryMap
        let home_dir = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let mut path = PathBuf::from(home_dir);
        path.push(".local");
        path.push("share");
        path.push(APP_DIR);
        path
    }
}

/// Returns the path to the application configuration file
pub fn get_config_path() -> PathBuf {
    get_app_data_dir().join("entrymap.ini")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_lives_in_app_dir() {
        let path = get_config_path();
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("entrymap.ini"));
        assert!(path.parent().unwrap().ends_with(APP_DIR));
    }
}
