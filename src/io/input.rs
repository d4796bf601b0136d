use std::fs;
use std::path::Path;

use log::info;

use crate::error::ResponseError;
use crate::io::Configuration;

pub fn read_input(config_file: &Path) -> Result<Configuration, ResponseError> {
    // The configuration file is read, if it does not exist the default settings are used
    // and written to `config_file` so that the user can see all the used options.
    let exists: bool = config_file.exists();
    let config_string: String = if exists {
        fs::read_to_string(config_file)?
    } else {
        String::new()
    };
    let config: Configuration = toml::from_str(&config_string).map_err(|err| {
        ResponseError::invalid("configuration", format!("{}: {}", config_file.display(), err))
    })?;
    if !exists {
        let config_string: String = toml::to_string(&config)
            .map_err(|err| ResponseError::invalid("configuration", err.to_string()))?;
        fs::write(config_file, config_string)?;
        info!("default configuration written to {}", config_file.display());
    }
    Ok(config)
}
