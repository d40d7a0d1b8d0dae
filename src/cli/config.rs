use crate::config::generate::generate_starter_config;
use crate::config::{user_config_path, SYSTEM_CONFIG_PATH};
use std::fs;
use std::path::PathBuf;

pub fn init(stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_content = generate_starter_config();

    if stdout {
        print!("{}", config_content);
        return Ok(());
    }

    let path = write_config(&config_content, user_config_path())?;
    println!("Config file written to {}", path.display());
    Ok(())
}

/// Write to `preferred` (the per-user path), falling back to the system path
/// when its directory cannot be created. Refuses to overwrite.
fn write_config(
    config_content: &str,
    preferred: Option<PathBuf>,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let config_path = preferred
        .filter(|path| match path.parent() {
            Some(parent) => match fs::create_dir_all(parent) {
                Ok(()) => true,
                Err(e) => {
                    eprintln!("Warning: Could not create directory {}: {}", parent.display(), e);
                    eprintln!("Falling back to {}", SYSTEM_CONFIG_PATH);
                    false
                }
            },
            None => false,
        })
        .unwrap_or_else(|| PathBuf::from(SYSTEM_CONFIG_PATH));

    if config_path.exists() {
        return Err(format!(
            "config file already exists at {}; remove it first or use --stdout",
            config_path.display()
        )
        .into());
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&config_path, config_content)?;

    Ok(config_path)
}
