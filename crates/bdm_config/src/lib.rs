//! Configuration sections the engine consumes: the scheduler's own timestep/thread config, plus
//! per-domain sections (`FullConfig`) grouped by module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level scheduler/engine timing and output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub max_steps: u64,
    /// `simulation_time_step`, seconds.
    pub dt: f64,
    pub checkpoint_interval: u64,
    pub num_threads: Option<usize>,
    pub seed: Option<u64>,
    pub parallel_modules: bool,
    pub output_dir: PathBuf,
    /// `simulation_maximal_displacement` (per-step clamp).
    pub maximal_displacement: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_steps: 10_000,
            dt: 0.01,
            checkpoint_interval: 1000,
            num_threads: Some(8),
            seed: Some(42),
            parallel_modules: false,
            output_dir: PathBuf::from("results"),
            maximal_displacement: 3.0,
        }
    }
}

/// `neurite_{default_diameter, default_tension, default_actual_length,
/// min_length, max_length, minimal_bifurcation_length}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NeuriteConfig {
    pub enabled: bool,
    pub default_diameter: f64,
    pub default_tension: f64,
    pub default_actual_length: f64,
    pub min_length: f64,
    pub max_length: f64,
    pub minimal_bifurcation_length: f64,
    pub default_spring_constant: f64,
}

impl Default for NeuriteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_diameter: 1.0,
            default_tension: 0.0,
            default_actual_length: 10.0,
            min_length: 2.0,
            max_length: 15.0,
            minimal_bifurcation_length: 10.0,
            default_spring_constant: 5.0,
        }
    }
}

/// `sphere_default_{mass, adherence, diameter}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SphereConfig {
    pub enabled: bool,
    pub default_mass: f64,
    pub default_adherence: f64,
    pub default_diameter: f64,
}

impl Default for SphereConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_mass: 1.0,
            default_adherence: 0.1,
            default_diameter: 10.0,
        }
    }
}

/// `artificial_walls_for_{spheres,cylinders}`, bounding box.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WallConfig {
    pub artificial_walls_for_spheres: bool,
    pub artificial_walls_for_cylinders: bool,
    pub wall_stiffness: f64,
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub z_min: f64,
    pub z_max: f64,
}

impl Default for WallConfig {
    fn default() -> Self {
        Self {
            artificial_walls_for_spheres: false,
            artificial_walls_for_cylinders: false,
            wall_stiffness: 1.0,
            x_min: -500.0,
            x_max: 500.0,
            y_min: -500.0,
            y_max: 500.0,
            z_min: -500.0,
            z_max: 500.0,
        }
    }
}

/// `intracellular_diffusion_min_{concentration, dc_over_c}` early-exit
/// thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffusionConfig {
    pub enabled: bool,
    pub intracellular_diffusion_min_concentration: f64,
    pub intracellular_diffusion_min_dc_over_c: f64,
}

impl Default for DiffusionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            intracellular_diffusion_min_concentration: 1e-6,
            intracellular_diffusion_min_dc_over_c: 1e-4,
        }
    }
}

/// Full configuration, as loaded from a TOML/YAML setup file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullConfig {
    pub simulation: SimulationConfig,
    pub neurite: NeuriteConfig,
    pub sphere: SphereConfig,
    pub wall: WallConfig,
    pub diffusion: DiffusionConfig,
}

impl Default for FullConfig {
    fn default() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            neurite: NeuriteConfig::default(),
            sphere: SphereConfig::default(),
            wall: WallConfig::default(),
            diffusion: DiffusionConfig::default(),
        }
    }
}

impl FullConfig {
    /// Validates all sections. Returns the (possibly empty) list of errors.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.simulation.max_steps == 0 {
            errors.push("simulation.max_steps must be > 0".to_string());
        }
        if self.simulation.dt <= 0.0 {
            errors.push("simulation.dt must be > 0".to_string());
        }
        if self.simulation.checkpoint_interval == 0 {
            errors.push("simulation.checkpoint_interval must be > 0".to_string());
        }
        if self.simulation.maximal_displacement <= 0.0 {
            errors.push("simulation.maximal_displacement must be > 0".to_string());
        }

        if self.neurite.enabled {
            if self.neurite.min_length <= 0.0 || self.neurite.max_length <= self.neurite.min_length {
                errors.push("neurite.min_length must be > 0 and < neurite.max_length".to_string());
            }
            if self.neurite.default_diameter <= 0.0 {
                errors.push("neurite.default_diameter must be > 0".to_string());
            }
            if self.neurite.minimal_bifurcation_length <= 0.0 {
                errors.push("neurite.minimal_bifurcation_length must be > 0".to_string());
            }
        }

        if self.sphere.enabled {
            if self.sphere.default_mass <= 0.0 {
                errors.push("sphere.default_mass must be > 0".to_string());
            }
            if self.sphere.default_diameter <= 0.0 {
                errors.push("sphere.default_diameter must be > 0".to_string());
            }
        }

        if self.wall.x_max <= self.wall.x_min || self.wall.y_max <= self.wall.y_min || self.wall.z_max <= self.wall.z_min {
            errors.push("wall bounding box must have max > min on every axis".to_string());
        }

        if self.diffusion.enabled {
            if self.diffusion.intracellular_diffusion_min_concentration < 0.0 {
                errors.push("diffusion.intracellular_diffusion_min_concentration must be >= 0".to_string());
            }
            if self.diffusion.intracellular_diffusion_min_dc_over_c < 0.0 {
                errors.push("diffusion.intracellular_diffusion_min_dc_over_c must be >= 0".to_string());
            }
        }

        errors
    }
}

/// Loads/saves a `FullConfig` from TOML or YAML, validating on load.
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn from_toml(path: &str) -> Result<FullConfig, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: FullConfig = toml::from_str(&contents)?;
        let errors = config.validate();
        if !errors.is_empty() {
            anyhow::bail!("Invalid configuration:\n  - {}", errors.join("\n  - "));
        }
        Ok(config)
    }

    pub fn from_yaml(path: &str) -> Result<FullConfig, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: FullConfig = serde_yaml::from_str(&contents)?;
        let errors = config.validate();
        if !errors.is_empty() {
            anyhow::bail!("Invalid configuration:\n  - {}", errors.join("\n  - "));
        }
        Ok(config)
    }

    pub fn save_toml(config: &FullConfig, path: &str) -> Result<(), anyhow::Error> {
        let contents = toml::to_string_pretty(config)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn save_yaml(config: &FullConfig, path: &str) -> Result<(), anyhow::Error> {
        let contents = serde_yaml::to_string(config)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(FullConfig::default().validate().is_empty());
    }

    #[test]
    fn zero_max_steps_is_invalid() {
        let mut config = FullConfig::default();
        config.simulation.max_steps = 0;
        assert!(!config.validate().is_empty());
    }

    #[test]
    fn inverted_neurite_length_bounds_is_invalid() {
        let mut config = FullConfig::default();
        config.neurite.min_length = 20.0;
        config.neurite.max_length = 5.0;
        assert!(!config.validate().is_empty());
    }

    #[test]
    fn inverted_bounding_box_is_invalid() {
        let mut config = FullConfig::default();
        config.wall.x_min = 10.0;
        config.wall.x_max = -10.0;
        assert!(!config.validate().is_empty());
    }
}
