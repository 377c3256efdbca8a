use std::path::Path;
use std::{fs, io};

use serde::Deserialize;
use toml;

#[derive(Deserialize, Debug, Default)]
pub struct Config {
    #[serde(default)]
    pub quota: Quota,
    #[serde(default)]
    pub unix: Unix,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Quota {
    #[serde(default)]
    pub mnttab: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Unix {
    #[serde(rename = "min-uid", default)]
    pub min_uid: Option<u32>,
}

// Read the TOML config into a config::Config struct.
pub fn read(toml_file: impl AsRef<Path>) -> io::Result<Config> {
    let buffer = fs::read_to_string(&toml_file)?;

    // initial parse.
    let config: Config = match toml::from_str(&buffer) {
        Ok(v) => Ok(v),
        Err(e) => Err(io::Error::new(io::ErrorKind::InvalidData, e.to_string())),
    }?;

    Ok(config)
}

pub fn check(cfg: &str, config: &Config) -> io::Result<()> {
    if let Some(ref mnttab) = config.quota.mnttab {
        if mnttab.is_empty() {
            let msg = format!("{}: [quota]: mnttab: empty path", cfg);
            return Err(io::Error::new(io::ErrorKind::InvalidData, msg));
        }
    }
    if config.unix.min_uid == Some(0) {
        warn!("{}: [unix]: min-uid 0: root is refused regardless", cfg);
    }
    Ok(())
}
