//! Small `hecs::World` extensions used by logging and the JSON dump
//! (`sim_state_to_json`).

use hecs::World;
use std::collections::HashMap;

pub trait WorldExt {
    fn component_stats(&self) -> HashMap<String, usize>;
}

impl WorldExt for World {
    fn component_stats(&self) -> HashMap<String, usize> {
        let mut stats = HashMap::new();
        stats.insert("entities".to_string(), self.iter().count());
        stats
    }
}
