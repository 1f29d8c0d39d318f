//! Framework configuration (§6 "Configuration parameters").
//!
//! Grounded on the teacher's `src/config.rs` / `src/lib.rs::load_config`:
//! defaults are set in code, then optionally overridden by a TOML file
//! pointed to by an environment variable (`THERON_CONF`, mirroring the
//! teacher's `RIKER_CONF`), using the same `config` crate dependency.

use std::env;

use config::{Config as RawConfig, File};

/// Scheduler backoff/wake strategy for the non-blocking `WorkQueue`
/// implementation (§4.3 "Yield strategies").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YieldStrategy {
    /// `pop` parks on a condvar; there is no backoff to configure.
    Blocking,
    /// Short yields after a few empty polls.
    Polite,
    /// Longer spin before yielding.
    Strong,
    /// Pure spin, never yields to the OS scheduler.
    Aggressive,
}

impl YieldStrategy {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "blocking" => Some(YieldStrategy::Blocking),
            "polite" => Some(YieldStrategy::Polite),
            "strong" => Some(YieldStrategy::Strong),
            "aggressive" => Some(YieldStrategy::Aggressive),
            _ => None,
        }
    }
}

/// NUMA/processor affinity hints (§6). The core records these but does not
/// itself depend on a platform affinity crate — applying them is left to
/// the allocator/OS-integration layer named as out of scope in §1.
#[derive(Debug, Clone, Default)]
pub struct AffinityConfig {
    pub node_mask: u64,
    pub processor_mask: u64,
}

#[derive(Debug, Clone)]
pub struct FrameworkConfig {
    pub thread_count: u32,
    pub min_threads: u32,
    pub max_threads: u32,
    pub max_threads_per_framework: u32,
    pub yield_strategy: YieldStrategy,
    pub affinity: AffinityConfig,
    pub max_actors: u32,
    pub max_receivers: u32,
}

impl Default for FrameworkConfig {
    fn default() -> Self {
        let default_threads = num_cpus::get().max(1) as u32;
        FrameworkConfig {
            thread_count: default_threads,
            min_threads: 1,
            max_threads: default_threads,
            max_threads_per_framework: 64,
            yield_strategy: YieldStrategy::Polite,
            affinity: AffinityConfig::default(),
            max_actors: 8192,
            max_receivers: 8192,
        }
    }
}

impl FrameworkConfig {
    fn merge(&mut self, raw: &RawConfig) {
        if let Ok(v) = raw.get_int("thread_count") {
            self.thread_count = v as u32;
            self.max_threads = self.max_threads.max(self.thread_count);
        }
        if let Ok(v) = raw.get_int("min_threads") {
            self.min_threads = v as u32;
        }
        if let Ok(v) = raw.get_int("max_threads") {
            self.max_threads = v as u32;
        }
        if let Ok(v) = raw.get_int("max_threads_per_framework") {
            self.max_threads_per_framework = v as u32;
        }
        if let Ok(v) = raw.get_string("yield_strategy") {
            if let Some(strategy) = YieldStrategy::parse(&v) {
                self.yield_strategy = strategy;
            }
        }
        if let Ok(v) = raw.get_int("node_mask") {
            self.affinity.node_mask = v as u64;
        }
        if let Ok(v) = raw.get_int("processor_mask") {
            self.affinity.processor_mask = v as u64;
        }
        if let Ok(v) = raw.get_int("max_actors") {
            self.max_actors = v as u32;
        }
        if let Ok(v) = raw.get_int("max_receivers") {
            self.max_receivers = v as u32;
        }
    }

    /// Loads defaults, then merges in a TOML file named by `THERON_CONF`
    /// (or `config/theron.toml` if unset), matching `load_config` in the
    /// teacher's `src/lib.rs`. Missing files are silently ignored — the
    /// framework always starts with usable defaults.
    pub fn load() -> Self {
        let mut cfg = FrameworkConfig::default();
        let path = env::var("THERON_CONF").unwrap_or_else(|_| "config/theron.toml".into());
        let raw = RawConfig::builder()
            .add_source(File::with_name(&path).required(false))
            .build();
        if let Ok(raw) = raw {
            cfg.merge(&raw);
        }
        cfg
    }
}
