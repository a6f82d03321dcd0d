//! Configuration display.

use console::style;

use scorewatch::config::Config;

/// Print the effective configuration (file + env overrides) as TOML.
pub fn cmd_config_show(config: &Config) -> anyhow::Result<()> {
    match config.source_path {
        Some(ref path) => eprintln!("{} {}", style("# Loaded from").dim(), path.display()),
        None => eprintln!("{}", style("# No config file found; showing defaults").dim()),
    }
    print!("{}", config.to_toml()?);
    Ok(())
}
