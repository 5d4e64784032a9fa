//! Locating a local Chrome/Chromium for the browser strategy.
//!
//! Nothing is downloaded. If no executable is found here the browser library
//! tries its own lookup, and launching fails with a browser error when that
//! finds nothing either.

use std::path::PathBuf;

use tracing::debug;

/// Environment variable naming an explicit browser executable.
pub const CHROME_ENV: &str = "CHROME";

/// Executable names looked up on `PATH`, most specific first.
const PATH_NAMES: &[&str] = &[
    "google-chrome-stable",
    "google-chrome",
    "chromium",
    "chromium-browser",
    "chrome",
];

#[cfg(target_os = "macos")]
const INSTALL_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

#[cfg(target_os = "windows")]
const INSTALL_PATHS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
];

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const INSTALL_PATHS: &[&str] = &[
    "/usr/bin/google-chrome-stable",
    "/usr/bin/google-chrome",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/opt/google/chrome/chrome",
];

/// Finds a browser executable: `$CHROME`, then `PATH`, then install paths.
pub fn detect_chrome() -> Option<PathBuf> {
    let from_env = std::env::var_os(CHROME_ENV).map(PathBuf::from);
    let on_path = PATH_NAMES.iter().filter_map(|name| which::which(name).ok());
    let installed = INSTALL_PATHS.iter().map(PathBuf::from);

    let found = first_existing(from_env.into_iter().chain(on_path).chain(installed));
    if let Some(ref path) = found {
        debug!("Detected browser executable: {}", path.display());
    }
    found
}

fn first_existing(candidates: impl IntoIterator<Item = PathBuf>) -> Option<PathBuf> {
    candidates.into_iter().find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_existing_skips_missing() {
        let dir = tempfile::tempdir().unwrap();
        let chrome = dir.path().join("chrome");
        std::fs::write(&chrome, b"").unwrap();

        let found = first_existing([
            dir.path().join("missing"),
            dir.path().to_path_buf(),
            chrome.clone(),
        ]);
        assert_eq!(found, Some(chrome));
    }

    #[test]
    fn test_first_existing_none() {
        assert!(first_existing(Vec::<PathBuf>::new()).is_none());
        assert!(first_existing([PathBuf::from("/nonexistent/chrome")]).is_none());
    }

    #[test]
    fn test_detect_chrome_returns_a_file() {
        // None on machines without a browser.
        if let Some(path) = detect_chrome() {
            assert!(path.is_file());
        }
    }
}
