use clap::Parser;
use std::path::PathBuf;

use stillness_lib::{BackgroundSound, RunOptions, SessionConfig, StopPolicy};

/// quiet meditation timer with synthesized bells and ambient sound
#[derive(Parser, Debug, Clone)]
#[clap(version, about)]
struct Cli {
    /// length of the session in minutes
    #[clap(short = 'm', long, default_value_t = 5)]
    minutes: u32,

    /// settling-in countdown before the session starts
    #[clap(short = 'p', long, default_value_t = 0)]
    prep_seconds: u32,

    /// ring a bell every this many minutes (0 disables)
    #[clap(short = 'i', long, default_value_t = 0)]
    interval_minutes: u32,

    /// background sound: silent, bell, bowl, ocean, rain or stream
    #[clap(short = 's', long, default_value = "silent")]
    sound: BackgroundSound,

    /// master volume between 0 and 1
    #[clap(short = 'v', long)]
    volume: Option<f32>,

    /// JSON file holding sound preferences
    #[clap(long)]
    settings: Option<PathBuf>,

    /// do not count sessions stopped early
    #[clap(long)]
    discard_stopped: bool,
}

impl Cli {
    fn into_options(self) -> RunOptions {
        let config = SessionConfig::from_minutes(self.minutes)
            .with_preparation(self.prep_seconds)
            .with_interval_bells(self.interval_minutes.saturating_mul(60))
            .with_background(self.sound);

        RunOptions {
            config,
            stop_policy: if self.discard_stopped {
                StopPolicy::Discard
            } else {
                StopPolicy::RecordPartial
            },
            volume: self.volume,
            settings_path: self.settings,
        }
    }
}

fn main() -> anyhow::Result<()> {
    stillness_lib::run(Cli::parse().into_options())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_build_the_session() {
        let cli = Cli::parse_from([
            "stillness",
            "--minutes",
            "10",
            "--prep-seconds",
            "30",
            "--interval-minutes",
            "2",
            "--sound",
            "Rain",
            "--discard-stopped",
        ]);
        let options = cli.into_options();
        assert_eq!(options.config.total_duration, 600);
        assert_eq!(options.config.preparation_time, 30);
        assert_eq!(options.config.interval_bell_period, 120);
        assert_eq!(options.config.background_sound, BackgroundSound::Rain);
        assert_eq!(options.stop_policy, StopPolicy::Discard);
        assert_eq!(options.volume, None);
    }

    #[test]
    fn unknown_sound_is_rejected() {
        assert!(Cli::try_parse_from(["stillness", "--sound", "gong"]).is_err());
    }
}
