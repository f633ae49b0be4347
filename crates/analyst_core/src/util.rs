use crate::error::Result;
use directories::ProjectDirs;
use std::{env, fs, path::PathBuf};

pub fn app_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("com", "Quarry", "Quarry")
        .ok_or_else(|| crate::error::AnalystError::Config("ProjectDirs unavailable".into()))
}

pub fn default_runs_root() -> Result<PathBuf> {
    if let Ok(custom_dir) = env::var("QUARRY_RUNS_DIR") {
        let root = PathBuf::from(custom_dir);
        fs::create_dir_all(&root)?;
        return Ok(root);
    }
    let pd = app_dirs()?;
    let root = pd.data_dir().join("runs");
    fs::create_dir_all(&root)?;
    Ok(root)
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
