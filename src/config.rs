use crate::error::ConfigError;

/// High/low byte thresholds driving the writability flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaterMark {
    /// Buffered bytes below which a drain flips writability back to `true`.
    pub low: u64,
    /// Buffered bytes above which `add` flips writability to `false`.
    pub high: u64,
}

impl Default for WaterMark {
    fn default() -> Self {
        WaterMark {
            low: 32 * 1024,
            high: 64 * 1024,
        }
    }
}

/// Configuration for a [`WriteEngine`](crate::WriteEngine).
#[derive(Debug, Clone)]
pub struct WriteConfig {
    /// Maximum drain iterations per `trigger` call. Bounds how long one
    /// connection can hold the event loop. Default: 16.
    pub spin_count: u32,
    /// Writability watermarks. Defaults: 32 KiB low, 64 KiB high.
    pub water_mark: WaterMark,
}

impl Default for WriteConfig {
    fn default() -> Self {
        WriteConfig {
            spin_count: 16,
            water_mark: WaterMark::default(),
        }
    }
}

impl WriteConfig {
    /// Validate configuration values. Returns an error if any value is
    /// out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.spin_count == 0 {
            return Err(ConfigError::SpinCount("spin_count must be > 0".into()));
        }
        if self.water_mark.high == 0 {
            return Err(ConfigError::WaterMark("high mark must be > 0".into()));
        }
        if self.water_mark.low > self.water_mark.high {
            return Err(ConfigError::WaterMark(
                "low mark must not exceed high mark".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`WriteConfig`] with `build()` validation.
///
/// # Example
///
/// ```rust
/// use flowline::WriteConfigBuilder;
///
/// let config = WriteConfigBuilder::new()
///     .spin_count(8)
///     .water_mark(16 * 1024, 32 * 1024)
///     .build()
///     .expect("invalid config");
/// ```
#[derive(Default)]
pub struct WriteConfigBuilder {
    config: WriteConfig,
}

impl WriteConfigBuilder {
    /// Create a new builder with default config values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum drain iterations per `trigger` call.
    pub fn spin_count(mut self, n: u32) -> Self {
        self.config.spin_count = n;
        self
    }

    /// Set the low and high watermarks in bytes.
    pub fn water_mark(mut self, low: u64, high: u64) -> Self {
        self.config.water_mark = WaterMark { low, high };
        self
    }

    /// Validate and build the final [`WriteConfig`].
    pub fn build(self) -> Result<WriteConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
