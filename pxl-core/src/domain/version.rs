//! Version bump domain types

use semver::{Prerelease, Version};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PipelineError;

/// How a deployment increments the published version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionBump {
    Patch,
    Minor,
    Major,
    Rc,
    #[default]
    Final,
}

impl VersionBump {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionBump::Patch => "patch",
            VersionBump::Minor => "minor",
            VersionBump::Major => "major",
            VersionBump::Rc => "rc",
            VersionBump::Final => "final",
        }
    }

    /// Computes the next version
    ///
    /// Versions look like `MAJOR.MINOR.PATCH[-rcN]`. A release candidate is
    /// already "on its way" to its base version, so `patch`, `minor`,
    /// `major` and `final` first try to promote it before incrementing.
    pub fn apply(&self, current: &Version) -> Version {
        let rc = rc_number(current);
        let base = Version::new(current.major, current.minor, current.patch);

        match self {
            VersionBump::Patch | VersionBump::Final => {
                if rc.is_some() {
                    base
                } else {
                    Version::new(base.major, base.minor, base.patch + 1)
                }
            }
            VersionBump::Minor => {
                if rc.is_some() && base.patch == 0 {
                    base
                } else {
                    Version::new(base.major, base.minor + 1, 0)
                }
            }
            VersionBump::Major => {
                if rc.is_some() && base.minor == 0 && base.patch == 0 {
                    base
                } else {
                    Version::new(base.major + 1, 0, 0)
                }
            }
            VersionBump::Rc => {
                let (mut next, n) = match rc {
                    Some(n) => (base, n + 1),
                    None => (Version::new(base.major, base.minor, base.patch + 1), 1),
                };
                next.pre = rc_prerelease(n);
                next
            }
        }
    }

    /// Parses `current` and applies the bump
    pub fn apply_str(&self, current: &str) -> Result<Version, semver::Error> {
        Version::parse(current.trim().trim_start_matches('v')).map(|v| self.apply(&v))
    }
}

impl fmt::Display for VersionBump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VersionBump {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "patch" => Ok(VersionBump::Patch),
            "minor" => Ok(VersionBump::Minor),
            "major" => Ok(VersionBump::Major),
            "rc" => Ok(VersionBump::Rc),
            "final" => Ok(VersionBump::Final),
            other => Err(PipelineError::Argument(format!(
                "invalid version bump '{}' (expected patch, minor, major, rc or final)",
                other
            ))),
        }
    }
}

/// Release candidate number of a version, if it is one
pub fn rc_number(version: &Version) -> Option<u64> {
    let pre = version.pre.as_str();
    let digits = pre.strip_prefix("rc")?;
    digits.trim_start_matches('.').parse().ok()
}

/// Image tags pushed for a version
///
/// Release candidates float the `test` tag, releases float `latest`.
pub fn push_tags(version: &Version) -> Vec<String> {
    let floating = if rc_number(version).is_some() {
        "test"
    } else {
        "latest"
    };
    vec![version.to_string(), floating.to_string()]
}

fn rc_prerelease(n: u64) -> Prerelease {
    Prerelease::new(&format!("rc{}", n)).unwrap_or(Prerelease::EMPTY)
}
