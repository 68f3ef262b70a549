use anyhow::Result;
use mailtally::config::Config;
use std::path::PathBuf;

pub fn init_config(path: PathBuf) -> Result<()> {
    let config = Config::default();
    let config_path = path.join("mailtally.toml");

    if config_path.exists() {
        anyhow::bail!("Configuration file already exists: {}", config_path.display());
    }

    let toml_content = format!(
        "# mailtally configuration\n\n{}",
        toml::to_string_pretty(&config)?
    );

    std::fs::create_dir_all(&path)?;
    std::fs::write(&config_path, toml_content)?;
    println!("Created configuration file: {}", config_path.display());

    Ok(())
}
