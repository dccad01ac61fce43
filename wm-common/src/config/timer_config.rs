use anyhow::bail;
use chrono::Timelike;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::config_enums::TimerType;
use crate::error::Error;

/// daily timers use "HH:mm", hourly timers use "mm"
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(rename = "type", default)]
    pub timer_type: TimerType,
    #[serde(default)]
    pub value: String,
}

impl TimerConfig {
    pub fn none() -> Self {
        Self {
            timer_type: TimerType::None,
            value: String::new(),
        }
    }

    pub fn daily(value: &str) -> Self {
        Self {
            timer_type: TimerType::Daily,
            value: value.to_string(),
        }
    }

    pub fn hourly(value: &str) -> Self {
        Self {
            timer_type: TimerType::Hourly,
            value: value.to_string(),
        }
    }

    pub fn is_timed(&self) -> bool {
        self.timer_type != TimerType::None
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        match self.timer_type {
            TimerType::None => Ok(()),
            TimerType::Daily | TimerType::Hourly => {
                self.parse_value()?;
                Ok(())
            }
        }
    }

    /// true when the timer should fire in the minute given by (hour, minute)
    pub fn matches_minute(&self, hour: u32, minute: u32) -> bool {
        let (expected_hour, expected_minute) = match self.parse_value() {
            Ok(parsed) => parsed,
            Err(_) => return false,
        };

        match self.timer_type {
            TimerType::None => false,
            TimerType::Daily => expected_hour == Some(hour) && expected_minute == minute,
            TimerType::Hourly => expected_minute == minute,
        }
    }

    pub fn matches<T: Timelike>(&self, now: &T) -> bool {
        self.matches_minute(now.hour(), now.minute())
    }

    fn parse_value(&self) -> anyhow::Result<(Option<u32>, u32)> {
        let pattern = Regex::new(r"^(?:(?P<hour>\d{2}):)?(?P<minute>\d{2})$").unwrap();
        let caps = match pattern.captures(&self.value) {
            Some(caps) => caps,
            None => bail!(Error::ConfigError(format!(
                "invalid timer value: [{}]",
                self.value
            ))),
        };

        let hour = caps
            .name("hour")
            .map(|m| m.as_str().parse::<u32>())
            .transpose()?;
        let minute = caps.name("minute").unwrap().as_str().parse::<u32>()?;

        if let Some(hour) = hour {
            if hour > 23 {
                bail!(Error::ConfigError(format!("invalid timer hour: {}", hour)));
            }
        }
        if minute > 59 {
            bail!(Error::ConfigError(format!(
                "invalid timer minute: {}",
                minute
            )));
        }
        if self.timer_type == TimerType::Daily && hour.is_none() {
            bail!(Error::ConfigError(format!(
                "daily timer requires HH:mm, got: [{}]",
                self.value
            )));
        }
        Ok((hour, minute))
    }
}
