//! Architecture hint used when picking a release asset.

use std::fmt;

/// CPU architecture token as it appears in ProxiFyre asset names
/// (`ProxiFyre-v2.0.0-x64-signed.zip`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetPlatform(String);

impl TargetPlatform {
    /// Detect the architecture of the current build.
    ///
    /// # Examples
    ///
    /// ```
    /// # use proxifyre_manager::release::platform::TargetPlatform;
    /// let platform = TargetPlatform::detect();
    /// assert!(!platform.as_str().is_empty());
    /// ```
    pub fn detect() -> Self {
        Self(Self::detect_arch().to_string())
    }

    /// Get the architecture token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether an asset name is built for this architecture.
    #[must_use]
    pub fn matches_asset(&self, asset_name: &str) -> bool {
        asset_name
            .to_lowercase()
            .contains(&format!("{}-signed.zip", self.0.to_lowercase()))
    }

    fn detect_arch() -> &'static str {
        #[cfg(target_arch = "x86_64")]
        return "x64";
        #[cfg(target_arch = "x86")]
        return "x86";
        #[cfg(target_arch = "aarch64")]
        return "arm64";
        #[cfg(not(any(target_arch = "x86_64", target_arch = "x86", target_arch = "aarch64")))]
        return "unknown";
    }
}

impl fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TargetPlatform {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TargetPlatform {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
