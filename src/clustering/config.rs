use std::sync::Arc;
use std::{fmt, fs};

use log::{error, LevelFilter};
use serde::Deserialize;

use super::kmeans::ModelParams;
use super::tree::TreeParams;
use crate::core::float::SprFloat;
use crate::distances::{DenseSparseDistance, InvertedDotDistance, SquaredEuclideanDistance};

#[derive(Debug, Deserialize)]
pub struct ClusteringConfig {
    pub distance: String,  // E.g., "SquaredEuclidean"
    pub init_mode: String, // E.g., "kmeans++"
    pub k: usize,
    pub iterations: usize,
    pub exclusive: bool,
    pub cut_rate: f64,
    pub max_node_size: usize,
    pub rng_seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    pub level: String, // Log level, e.g., "info", "debug", "warn", "error"
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub clustering: ClusteringConfig,
    pub logging: LoggingConfig,
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration:")?;
        writeln!(f, "  Clustering:")?;
        writeln!(f, "    K: {}", self.clustering.k)?;
        writeln!(f, "    Iterations: {}", self.clustering.iterations)?;
        writeln!(f, "    Exclusive: {}", self.clustering.exclusive)?;
        writeln!(f, "    Distance: {}", self.clustering.distance)?;
        writeln!(f, "    Init Mode: {}", self.clustering.init_mode)?;
        writeln!(f, "    Cut Rate: {}", self.clustering.cut_rate)?;
        writeln!(f, "    Max Node Size: {}", self.clustering.max_node_size)?;
        if let Some(seed) = self.clustering.rng_seed {
            writeln!(f, "    RNG Seed: {}", seed)?;
        } else {
            writeln!(f, "    RNG Seed: None")?;
        }
        writeln!(f, "  Logging:")?;
        writeln!(f, "    Level: {}", self.logging.level)?;
        Ok(())
    }
}

impl Config {
    /// Reads the YAML configuration file and returns a `Config` instance.
    pub fn from_file(file_path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let file_content = fs::read_to_string(file_path)?;
        Self::from_yaml_str(&file_content)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Config = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        match self.clustering.distance.as_str() {
            "InvertedDot" | "SquaredEuclidean" => (),
            _ => {
                return Err(format!(
                    "Unsupported distance: {}",
                    self.clustering.distance
                ))
            }
        }

        match self.clustering.init_mode.as_str() {
            "random" | "kmeans++" => (),
            _ => {
                return Err(format!(
                    "Unsupported init mode: {}",
                    self.clustering.init_mode
                ))
            }
        }

        if self.clustering.k == 0 {
            return Err("k must be greater than 0".to_string());
        }
        if self.clustering.iterations == 0 {
            return Err("iterations must be greater than 0".to_string());
        }
        if self.clustering.cut_rate <= 0.0 {
            return Err("cut_rate must be positive".to_string());
        }

        Ok(())
    }

    /// Converts the clustering section into runtime [`ModelParams`].
    pub fn to_model_params<F: SprFloat>(&self) -> ModelParams<F> {
        let distance: Arc<dyn DenseSparseDistance<F>> = match self.clustering.distance.as_str() {
            "InvertedDot" => Arc::new(InvertedDotDistance),
            "SquaredEuclidean" => Arc::new(SquaredEuclideanDistance),
            _ => panic!("Unsupported distance: {}", self.clustering.distance),
        };

        let mut params = ModelParams::new(self.clustering.k)
            .with_iterations(self.clustering.iterations)
            .with_exclusive(self.clustering.exclusive)
            .with_init_mode(&self.clustering.init_mode)
            .with_distance(distance)
            .with_cut_rate(F::from(self.clustering.cut_rate).unwrap());
        if let Some(seed) = self.clustering.rng_seed {
            params = params.with_rng_seed(seed);
        }
        params
    }

    pub fn to_tree_params<F: SprFloat>(&self) -> TreeParams<F> {
        TreeParams::new(self.to_model_params(), self.clustering.max_node_size)
    }

    /// Sets up logging based on the logging level in the configuration.
    pub fn setup_logging(&self) {
        let level_filter = match self.logging.level.to_lowercase().as_str() {
            "debug" => LevelFilter::Debug,
            "info" => LevelFilter::Info,
            "warn" => LevelFilter::Warn,
            "error" => LevelFilter::Error,
            _ => panic!("Unsupported log level: {}", self.logging.level),
        };

        if let Err(e) = env_logger::Builder::new()
            .filter_level(level_filter)
            .try_init()
        {
            error!("Failed to initialize logger: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD_YAML: &str = "\
clustering:
  distance: SquaredEuclidean
  init_mode: kmeans++
  k: 4
  iterations: 200
  exclusive: true
  cut_rate: 2.0
  max_node_size: 50
  rng_seed: 42
logging:
  level: info
";

    #[test]
    fn test_parse_and_convert() {
        let config = Config::from_yaml_str(GOOD_YAML).unwrap();
        assert_eq!(config.clustering.k, 4);

        let params = config.to_model_params::<f64>();
        assert_eq!(params.k, 4);
        assert_eq!(params.iterations, 200);
        assert!(params.exclusive);
        assert_eq!(params.init_mode, "kmeans++");
        assert_eq!(params.rng_seed, Some(42));

        let tree_params = config.to_tree_params::<f64>();
        assert_eq!(tree_params.max_node_size, 50);
    }

    #[test]
    fn test_unknown_distance_fails_validation() {
        let yaml = GOOD_YAML.replace("SquaredEuclidean", "Hamming");
        assert!(Config::from_yaml_str(&yaml).is_err());
    }

    #[test]
    fn test_unknown_init_mode_fails_validation() {
        let yaml = GOOD_YAML.replace("kmeans++", "grid");
        assert!(Config::from_yaml_str(&yaml).is_err());
    }

    #[test]
    fn test_zero_k_fails_validation() {
        let yaml = GOOD_YAML.replace("k: 4", "k: 0");
        assert!(Config::from_yaml_str(&yaml).is_err());
    }

    #[test]
    fn test_display_lists_parameters() {
        let config = Config::from_yaml_str(GOOD_YAML).unwrap();
        let rendered = config.to_string();
        assert!(rendered.contains("K: 4"));
        assert!(rendered.contains("Init Mode: kmeans++"));
    }
}
