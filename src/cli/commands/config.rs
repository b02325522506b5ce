//! Config command implementation.

use crate::cli::ConfigAction;
use crate::config::Settings;
use anyhow::Result;
use std::path::Path;

/// Run the config command.
///
/// `config_path` is the file the settings were loaded from (or would be).
pub fn run_config(action: &ConfigAction, settings: &Settings, config_path: &Path) -> Result<()> {
    println!("{}", render(action, settings, config_path)?);
    Ok(())
}

fn render(action: &ConfigAction, settings: &Settings, config_path: &Path) -> Result<String> {
    match action {
        ConfigAction::Show => toml::to_string_pretty(settings)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e)),
        ConfigAction::Path => Ok(config_path.display().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_reports_effective_file() {
        let path = Path::new("/srv/hark/alt.toml");
        let out = render(&ConfigAction::Path, &Settings::default(), path).unwrap();
        assert_eq!(out, "/srv/hark/alt.toml");
    }

    #[test]
    fn test_show_renders_toml() {
        let out = render(&ConfigAction::Show, &Settings::default(), Path::new("x.toml")).unwrap();
        assert!(out.contains("[index]"));
        assert!(out.contains("table = \"segments\""));
    }
}
