use bdm_config::*;
use tempfile::tempdir;

#[test]
fn test_default_config() {
    let config = FullConfig::default();
    assert!(config.neurite.enabled);
    assert!(config.sphere.enabled);
    assert_eq!(config.simulation.max_steps, 10000);
    assert!(config.validate().is_empty());
}

#[test]
fn test_save_load_toml() {
    let dir = tempdir().unwrap();
    let file_path = dir.path().join("test.toml");

    let config = FullConfig::default();
    ConfigLoader::save_toml(&config, file_path.to_str().unwrap()).unwrap();

    let loaded = ConfigLoader::from_toml(file_path.to_str().unwrap()).unwrap();
    assert_eq!(loaded.simulation.max_steps, config.simulation.max_steps);
    assert_eq!(loaded.neurite.max_length, config.neurite.max_length);
}

#[test]
fn test_save_load_yaml() {
    let dir = tempdir().unwrap();
    let file_path = dir.path().join("test.yaml");

    let config = FullConfig::default();
    ConfigLoader::save_yaml(&config, file_path.to_str().unwrap()).unwrap();

    let loaded = ConfigLoader::from_yaml(file_path.to_str().unwrap()).unwrap();
    assert_eq!(loaded.wall.x_max, config.wall.x_max);
}
