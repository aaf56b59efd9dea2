#[cfg(feature = "std-hash")]
pub mod map {
    pub use std::collections::HashMap;

    pub fn new_map<K, V>() -> HashMap<K, V> {
        HashMap::new()
    }
}

#[cfg(not(feature = "std-hash"))]
pub mod map {
    pub type HashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

    pub fn new_map<K, V>() -> HashMap<K, V> {
        HashMap::with_hasher(ahash::RandomState::new())
    }
}
