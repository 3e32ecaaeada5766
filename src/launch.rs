//! Launch parameters, read from the query string of the launch URL.
//!
//! | Parameters                            | Mode                  |
//! |---------------------------------------|-----------------------|
//! | `code`, `durationMs`, optional `name` | record a demonstration|
//! | `project`, `gid`                      | view a demonstration  |
//! | `project`, `participant`              | run a trial           |
//!
//! `url` optionally overrides the collection server for any mode.

use crate::config::Config;
use crate::demo_session::DemonstrationRecording;
use crate::error::LaunchError;
use crate::trial::{GestureClassLocator, TrialContext};
use reqwest::Url;
use std::collections::HashMap;
use std::time::Duration;

/// Requested durations are stretched by this factor so the recording does
/// not clip the end of the gesture
pub const DURATION_SCALE: f64 = 1.03;
/// Longest recording accepted, in milliseconds after scaling
pub const MAX_DEMONSTRATION_MS: f64 = 30900.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchMode {
    Trial(TrialContext),
    RecordDemonstration(DemonstrationRecording),
    ViewDemonstration(GestureClassLocator),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchParams {
    pub mode: LaunchMode,
    pub backend_override: Option<Url>,
}

impl LaunchParams {
    pub fn from_url(launch_url: &str) -> Result<Self, LaunchError> {
        let url = Url::parse(launch_url)
            .map_err(|_| LaunchError::MalformedUrl(launch_url.to_string()))?;

        // Later duplicates win; blank values count as absent
        let query: HashMap<String, String> = url
            .query_pairs()
            .filter(|(_, value)| !value.trim().is_empty())
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        let get = |key: &str| query.get(key).cloned();

        let backend_override = match get("url") {
            Some(raw) => Some(Url::parse(&raw).map_err(|_| LaunchError::InvalidBackendUrl(raw))?),
            None => None,
        };

        let mode = if query.contains_key("code") || query.contains_key("durationMs") {
            let short_code = get("code").ok_or(LaunchError::InvalidDemonstration)?;
            let duration = parse_duration(get("durationMs").as_deref())?;
            LaunchMode::RecordDemonstration(DemonstrationRecording {
                short_code,
                duration,
                name: get("name"),
            })
        } else if let (Some(project_name), Some(gesture_id)) = (get("project"), get("gid")) {
            LaunchMode::ViewDemonstration(GestureClassLocator {
                project_name,
                gesture_id,
            })
        } else if let (Some(project), Some(participant)) = (get("project"), get("participant")) {
            LaunchMode::Trial(TrialContext::new(project, participant))
        } else {
            return Err(LaunchError::MissingParameters);
        };

        Ok(Self {
            mode,
            backend_override,
        })
    }

    /// Server to talk to: the launch override, else the configured one
    pub fn backend_url(&self, config: &Config) -> Result<Url, LaunchError> {
        match &self.backend_override {
            Some(url) => Ok(url.clone()),
            None => Url::parse(&config.backend_url)
                .map_err(|_| LaunchError::InvalidBackendUrl(config.backend_url.clone())),
        }
    }
}

fn parse_duration(raw: Option<&str>) -> Result<Duration, LaunchError> {
    let requested: f64 = raw
        .and_then(|value| value.trim().parse().ok())
        .ok_or(LaunchError::InvalidDemonstration)?;
    let scaled = requested * DURATION_SCALE;
    if !(scaled > 0.0 && scaled <= MAX_DEMONSTRATION_MS) {
        return Err(LaunchError::InvalidDemonstration);
    }
    Ok(Duration::from_secs_f64(scaled / 1000.0))
}
