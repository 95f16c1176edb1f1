/*
 * Copyright (c) 2024 Yunshan Networks
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::fs;
use std::path::Path;

use log::warn;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml config invalid: {0}")]
    YamlConfigInvalid(String),
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct MysqlConfig {
    // bound for column, parameter and query attribute counts
    pub max_field_count: u64,
    pub max_sessions: usize,
    pub decompress: bool,
    pub decode_binary_rows: bool,
    pub max_display_length: usize,
}

impl Default for MysqlConfig {
    fn default() -> Self {
        Self {
            max_field_count: 4096,
            max_sessions: 65536,
            decompress: true,
            decode_binary_rows: true,
            max_display_length: 1024,
        }
    }
}

impl MysqlConfig {
    pub fn load_from_file<T: AsRef<Path>>(path: T) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml<C: AsRef<str>>(contents: C) -> Result<Self, ConfigError> {
        let contents = contents.as_ref();
        if contents.trim().is_empty() {
            // parsing empty string leads to EOF error
            return Ok(Self::default());
        }
        let mut cfg: Self = serde_yaml::from_str(contents)
            .map_err(|e| ConfigError::YamlConfigInvalid(e.to_string()))?;
        if cfg.max_sessions == 0 {
            warn!("max-sessions 0 is invalid, using 1");
            cfg.max_sessions = 1;
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults() {
        assert_eq!(MysqlConfig::from_yaml("").unwrap(), MysqlConfig::default());
        let c = MysqlConfig::from_yaml("max-field-count: 16\n").unwrap();
        assert_eq!(c.max_field_count, 16);
        assert_eq!(c.max_sessions, 65536);
        assert!(c.decompress);
    }

    #[test]
    fn read_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "max-sessions: 0\ndecompress: false\ndecode-binary-rows: false\nmax-display-length: 8"
        )
        .unwrap();
        let c = MysqlConfig::load_from_file(file.path()).unwrap();
        assert_eq!(
            c,
            MysqlConfig {
                max_field_count: 4096,
                max_sessions: 1,
                decompress: false,
                decode_binary_rows: false,
                max_display_length: 8,
            }
        );
    }

    #[test]
    fn invalid() {
        assert!(matches!(
            MysqlConfig::from_yaml("max-sessions: many"),
            Err(ConfigError::YamlConfigInvalid(_))
        ));
        assert!(matches!(
            MysqlConfig::load_from_file("/nonexistent/mysql.yaml"),
            Err(ConfigError::Io(_))
        ));
    }
}
