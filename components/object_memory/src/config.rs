//! Object memory configuration.
//!
//! Two knobs sets:
//!
//! - [`MetadataConfig`] - process-wide memory layout, fixed at setup
//! - [`HeapConfig`] - per-heap sizing and promotion policy
//!
//! Both read overrides from the environment:
//!
//! | variable | effect |
//! |---|---|
//! | `OBJECT_MEMORY_ARENA_MB` | comma-separated arena sizes in MiB |
//! | `OBJECT_MEMORY_SEMI_SPACE_KB` | new-space semi-space size |
//! | `OBJECT_MEMORY_INITIAL_SPACE_KB` | first chunk of a single-space heap |
//! | `OBJECT_MEMORY_PROMOTE` | `0`/`false` disables promotion |

use page_allocator::{MAX_ARENAS, PAGE_SIZE};
use tracing::warn;

const KB: usize = 1024;
const MB: usize = 1024 * KB;

/// Default size of the heap arena.
pub const DEFAULT_ARENA_SIZE: usize = 64 * MB;

/// Default size of each new-space semi-space.
pub const DEFAULT_SEMI_SPACE_SIZE: usize = 256 * KB;

/// Memory layout shared by every heap in the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataConfig {
    /// Sizes of the arenas to reserve. The largest holds the heaps.
    pub arena_sizes: Vec<usize>,
    /// Page size the arenas are carved in.
    pub page_size: usize,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        MetadataConfig {
            arena_sizes: vec![DEFAULT_ARENA_SIZE],
            page_size: PAGE_SIZE,
        }
    }
}

impl MetadataConfig {
    /// Reads `OBJECT_MEMORY_ARENA_MB` on top of the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(value) = std::env::var("OBJECT_MEMORY_ARENA_MB") {
            let sizes: Option<Vec<usize>> = value
                .split(',')
                .map(|part| part.trim().parse::<usize>().ok().map(|mb| mb * MB))
                .collect();
            match sizes {
                Some(sizes) if !sizes.is_empty() && sizes.len() <= MAX_ARENAS => {
                    config.arena_sizes = sizes;
                }
                _ => warn!(
                    event = "config_ignored",
                    variable = "OBJECT_MEMORY_ARENA_MB",
                    value = %value
                ),
            }
        }
        config
    }

    /// Uses a single arena of `size` bytes.
    pub fn with_arena_size(mut self, size: usize) -> Self {
        self.arena_sizes = vec![size];
        self
    }

    /// Uses the given arena sizes.
    pub fn with_arena_sizes(mut self, sizes: Vec<usize>) -> Self {
        self.arena_sizes = sizes;
        self
    }
}

/// Sizing of a single heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
    /// Bytes in each new-space semi-space of a two-space heap.
    pub semi_space_size: usize,
    /// First chunk size of a single-space heap. Zero allocates lazily.
    pub initial_space_size: usize,
    /// Whether scavenge survivors are promoted to old space.
    pub promote_survivors: bool,
}

impl Default for HeapConfig {
    fn default() -> Self {
        HeapConfig {
            semi_space_size: DEFAULT_SEMI_SPACE_SIZE,
            initial_space_size: 0,
            promote_survivors: true,
        }
    }
}

impl HeapConfig {
    /// Reads the heap variables on top of the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(kb) = env_usize("OBJECT_MEMORY_SEMI_SPACE_KB") {
            config.semi_space_size = kb * KB;
        }
        if let Some(kb) = env_usize("OBJECT_MEMORY_INITIAL_SPACE_KB") {
            config.initial_space_size = kb * KB;
        }
        if let Ok(value) = std::env::var("OBJECT_MEMORY_PROMOTE") {
            config.promote_survivors = !matches!(value.to_lowercase().as_str(), "0" | "false");
        }
        config
    }

    /// Sets the semi-space size.
    pub fn with_semi_space_size(mut self, size: usize) -> Self {
        self.semi_space_size = size;
        self
    }

    /// Sets the initial single-space chunk size.
    pub fn with_initial_space_size(mut self, size: usize) -> Self {
        self.initial_space_size = size;
        self
    }

    /// Enables or disables promotion.
    pub fn with_promote_survivors(mut self, promote: bool) -> Self {
        self.promote_survivors = promote;
        self
    }
}

fn env_usize(name: &str) -> Option<usize> {
    let value = std::env::var(name).ok()?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(event = "config_ignored", variable = name, value = %value);
            None
        }
    }
}
