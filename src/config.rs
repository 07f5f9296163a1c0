use mapbuffer_map::MapBufferConfig;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Config {
    /// Directory of the sled database holding the world.
    pub world_dir: PathBuf,
    /// Several worlds can share one database; each gets its own trees.
    pub world_name: String,
    pub map: MapBufferConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            world_dir: PathBuf::from("world"),
            world_name: "overworld".to_string(),
            map: MapBufferConfig::default(),
        }
    }
}

impl Config {
    pub fn read_file(path: impl AsRef<std::path::Path>) -> Result<Self, ron::Error> {
        let reader = std::fs::File::open(path)?;

        ron::de::from_reader(reader)
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
