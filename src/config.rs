use std::path::PathBuf;

pub const MAX_WORKERS: usize = 8;
pub const DEFAULT_BUFFER_SIZE: usize = 256 * 1024 * 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseMode {
    #[default]
    Lenient,
    Strict
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Engine {
    #[default]
    Pipeline,
    Mapped
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileConfig {
    pub cpu: Option<PathBuf>,
    pub memory: Option<PathBuf>
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub workers: usize,
    pub buffer_size: usize,
    pub parse_mode: ParseMode,
    pub engine: Engine,
    pub profile: ProfileConfig
}

impl Config {
    /// Caps the worker count at [`default_workers`], never below one.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.clamp(1, default_workers());
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    pub fn with_parse_mode(mut self, parse_mode: ParseMode) -> Self {
        self.parse_mode = parse_mode;
        self
    }

    pub fn with_engine(mut self, engine: Engine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_profile(mut self, profile: ProfileConfig) -> Self {
        self.profile = profile;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            parse_mode: ParseMode::default(),
            engine: Engine::default(),
            profile: ProfileConfig::default()
        }
    }
}

pub fn default_workers() -> usize {
    let cores: usize = std::thread::available_parallelism()
        .map(| n | n.get())
        .unwrap_or(1);
    cores.min(MAX_WORKERS)
}
