use super::{AppConfig, Command, StartArgs, MAX_CHUNK_SIZE, MAX_DURATION_SECS, MIN_CHUNK_SIZE};
use anyhow::{bail, Result};
use clap::Parser;

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&mut self) -> Result<()> {
        if let Command::Start(args) = &mut self.command {
            args.validate()?;
        }
        Ok(())
    }
}

impl StartArgs {
    /// Check recorder values and normalize the device marker.
    pub fn validate(&mut self) -> Result<()> {
        if !(1..=MAX_DURATION_SECS).contains(&self.duration) {
            bail!(
                "--duration must be between 1 and {MAX_DURATION_SECS} seconds, got {}",
                self.duration
            );
        }
        if self.silence_timeout == 0 {
            bail!("--silence-timeout must be at least 1 second");
        }
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&self.chunk_size) {
            bail!(
                "--chunk-size must be between {MIN_CHUNK_SIZE} and {MAX_CHUNK_SIZE}, got {}",
                self.chunk_size
            );
        }
        if self.device_marker.chars().any(char::is_control) {
            bail!("--device-marker must not contain control characters");
        }
        self.device_marker = self.device_marker.trim().to_string();
        Ok(())
    }
}
