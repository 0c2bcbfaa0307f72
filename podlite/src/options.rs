//! Preparation options.
//!
//! Mirrors the stage1 "insecure" switches and the few knobs the generated
//! artifacts depend on. All fields have serde defaults so partial JSON
//! configuration documents deserialize.

use serde::{Deserialize, Serialize};

// ============================================================================
// Insecure Options
// ============================================================================

/// Switches that disable parts of the sandbox.
///
/// Default: everything enforced.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsecureOptions {
    /// Skip the restricted `/proc` and `/sys` visibility entries.
    #[serde(default)]
    pub disable_paths: bool,

    /// Grant every capability instead of the per-app computed set.
    ///
    /// Emits a single global `--capability=all` and omits
    /// `CapabilityBoundingSet=` from app units.
    #[serde(default)]
    pub disable_capabilities: bool,
}

impl InsecureOptions {
    /// Everything enforced.
    pub fn secure() -> Self {
        Self::default()
    }

    /// Every restriction disabled (debugging only).
    pub fn insecure_all() -> Self {
        Self {
            disable_paths: true,
            disable_capabilities: true,
        }
    }
}

// ============================================================================
// Prepare Options
// ============================================================================

/// Options controlling stage1 preparation output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareOptions {
    /// Sandbox relaxations.
    #[serde(default)]
    pub insecure: InsecureOptions,

    /// Byte terminating each `KEY=VALUE` entry in app env files.
    ///
    /// Default: `\n`
    #[serde(default = "default_env_separator")]
    pub env_separator: u8,

    /// Script the reaper unit runs on stop (path inside stage1).
    ///
    /// Default: /reaper.sh
    #[serde(default = "default_reaper_script")]
    pub reaper_script: String,
}

fn default_env_separator() -> u8 {
    b'\n'
}

fn default_reaper_script() -> String {
    "/reaper.sh".to_string()
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            insecure: InsecureOptions::default(),
            env_separator: default_env_separator(),
            reaper_script: default_reaper_script(),
        }
    }
}

impl PrepareOptions {
    /// Builder: replace the insecure switches.
    pub fn with_insecure(mut self, insecure: InsecureOptions) -> Self {
        self.insecure = insecure;
        self
    }

    /// Builder: use NUL-separated env files.
    pub fn with_env_separator(mut self, separator: u8) -> Self {
        self.env_separator = separator;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = PrepareOptions::default();
        assert_eq!(opts.insecure, InsecureOptions::secure());
        assert_eq!(opts.env_separator, b'\n');
        assert_eq!(opts.reaper_script, "/reaper.sh");
    }

    #[test]
    fn test_insecure_all() {
        let opts = InsecureOptions::insecure_all();
        assert!(opts.disable_paths);
        assert!(opts.disable_capabilities);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let opts: PrepareOptions =
            serde_json::from_str(r#"{"insecure": {"disable_capabilities": true}}"#).unwrap();
        assert!(opts.insecure.disable_capabilities);
        assert!(!opts.insecure.disable_paths);
        assert_eq!(opts.env_separator, b'\n');
        assert_eq!(opts.reaper_script, "/reaper.sh");
    }

    #[test]
    fn test_builders() {
        let opts = PrepareOptions::default()
            .with_insecure(InsecureOptions::insecure_all())
            .with_env_separator(0);
        assert_eq!(opts.env_separator, 0);
        assert!(opts.insecure.disable_paths);
    }
}
