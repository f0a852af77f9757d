// This file is part of Settler.
//
// Settler is free software: you can redistribute it and/or modify it under the
// terms of the GNU Lesser General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version.
//
// Settler is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with Settler.
// If not, see https://www.gnu.org/licenses/.


use anyhow::Context;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use settler_entry_point::EntryPointSettings;
use settler_sim::SimulationSettings;

/// Everything the tools read from configuration
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Coordinator deployment parameters
    pub entry_point: EntryPointSettings,
    /// Simulation and screening parameters
    pub simulation: SimulationSettings,
}

/// Load settings from the hierarchy of
/// - ENV (`SETTLER_ENTRY_POINT__CHAIN_ID=5`)
/// - file
/// - defaults
pub fn load_settings(file: Option<&str>) -> anyhow::Result<Settings> {
    let default =
        serde_json::to_string(&Settings::default()).context("defaults should serialize")?;
    let mut builder =
        Config::builder().add_source(File::from_str(default.as_str(), FileFormat::Json));
    if let Some(file) = file {
        builder = builder.add_source(File::with_name(file));
    }
    builder
        .add_source(
            Environment::with_prefix("SETTLER")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()
        .context("should build config")?
        .try_deserialize()
        .context("should deserialize settings")
}

#[cfg(test)]
mod tests {
    use std::fs;

    use alloy_primitives::U256;
    use settler_types::Opcode;

    use super::*;

    #[test]
    fn defaults_without_file() {
        assert_eq!(load_settings(None).unwrap(), Settings::default());
    }

    #[test]
    fn file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("settler-{}.toml", std::process::id()));
        fs::write(
            &path,
            r#"
[entry_point]
chain_id = 5
min_stake = "1000"

[simulation]
timeout_millis = 250

[simulation.guard]
require_pop = false
"#,
        )
        .unwrap();

        let settings = load_settings(path.to_str()).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(settings.entry_point.chain_id, 5);
        assert_eq!(settings.entry_point.min_stake, U256::from(1000));
        assert_eq!(
            settings.entry_point.address,
            EntryPointSettings::default().address
        );
        assert_eq!(settings.simulation.timeout_millis, 250);
        assert!(!settings.simulation.guard.require_pop);
        assert_eq!(settings.simulation.guard.separator, Opcode::NUMBER);
    }
}
