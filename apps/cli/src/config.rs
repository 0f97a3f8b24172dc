// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CLI configuration loaded from environment variables.

use ifc_tape_core::{ModelConfig, DEFAULT_PAGE_SIZE, MIN_PAGE_SIZE};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// CLI configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Tape page size in bytes.
    pub page_size: usize,
    /// Skip entities of unknown type instead of rejecting the file.
    pub skip_unknown_types: bool,
    /// Log format written to stderr.
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            page_size: var("IFC_TAPE_PAGE_SIZE")
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|size| *size >= MIN_PAGE_SIZE)
                .unwrap_or(defaults.page_size),
            skip_unknown_types: var("IFC_TAPE_SKIP_UNKNOWN")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.skip_unknown_types),
            log_format: match var("IFC_TAPE_LOG_FORMAT").as_deref() {
                Some("json") => LogFormat::Json,
                _ => defaults.log_format,
            },
        }
    }

    /// Settings passed to the model registry.
    pub fn model_config(&self) -> ModelConfig {
        ModelConfig {
            page_size: self.page_size,
            skip_unknown_types: self.skip_unknown_types,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            skip_unknown_types: false,
            log_format: LogFormat::Pretty,
        }
    }
}
