//! Mode configuration document (`.flowctl/modes.toml`).
//!
//! Maps mode names to their template and stop conditions, and carries the
//! check-command and agent-provider tables. Loaded into an explicit value
//! passed down to the components that need it; there is no process-global
//! config cache.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::types::{IssueHandling, StopKind};

/// One mode's configuration.
///
/// `stop_conditions` deserializes through the closed [`StopKind`] vocabulary,
/// so an unknown kind fails the load outright.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeConfig {
    pub template: String,
    #[serde(default)]
    pub stop_conditions: Vec<StopKind>,
    #[serde(default)]
    pub issue_handling: IssueHandling,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
}

/// Check-command settings backing the `tests_pass` stop condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    pub command: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            command: vec!["just".to_string(), "ci".to_string()],
            timeout_secs: 30 * 60,
        }
    }
}

/// The whole mode configuration document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModesFile {
    pub modes: BTreeMap<String, ModeConfig>,
    pub check: CheckConfig,
    pub agents: BTreeMap<String, String>,
}

/// A mode resolved to its canonical name and configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMode {
    pub name: String,
    pub config: ModeConfig,
}

impl ModesFile {
    pub fn validate(&self) -> Result<()> {
        if self.modes.is_empty() {
            return Err(anyhow!("modes.toml defines no modes"));
        }
        if self.check.command.is_empty() || self.check.command[0].trim().is_empty() {
            return Err(anyhow!("check.command must be a non-empty array"));
        }
        if self.check.timeout_secs == 0 {
            return Err(anyhow!("check.timeout_secs must be > 0"));
        }
        for (name, config) in &self.modes {
            if config.template.trim().is_empty() {
                return Err(anyhow!("mode '{name}': template must not be empty"));
            }
            if config.deprecated && config.redirect_to.is_none() {
                return Err(anyhow!(
                    "mode '{name}': deprecated modes must set redirect_to"
                ));
            }
            if let Some(target) = &config.redirect_to
                && !self.modes.contains_key(target)
            {
                return Err(anyhow!(
                    "mode '{name}': redirect_to references unknown mode '{target}'"
                ));
            }
            for alias in &config.aliases {
                if self.modes.contains_key(alias) {
                    return Err(anyhow!(
                        "mode '{name}': alias '{alias}' collides with a mode name"
                    ));
                }
            }
        }
        Ok(())
    }

    /// Resolve a requested mode name to its canonical mode.
    ///
    /// Follows aliases, then a deprecation redirect (one hop).
    pub fn resolve(&self, requested: &str) -> Result<ResolvedMode> {
        let canonical = self
            .canonical_name(requested)
            .ok_or_else(|| self.unknown_mode_error(requested))?;

        let config = &self.modes[canonical];
        if config.deprecated {
            let target = config.redirect_to.as_deref().ok_or_else(|| {
                anyhow!("mode '{canonical}' is deprecated and has no redirect_to")
            })?;
            debug!(requested, canonical, target, "following deprecation redirect");
            let redirected = self
                .modes
                .get(target)
                .ok_or_else(|| self.unknown_mode_error(target))?;
            return Ok(ResolvedMode {
                name: target.to_string(),
                config: redirected.clone(),
            });
        }

        Ok(ResolvedMode {
            name: canonical.to_string(),
            config: config.clone(),
        })
    }

    fn canonical_name(&self, requested: &str) -> Option<&str> {
        if let Some((name, _)) = self.modes.get_key_value(requested) {
            return Some(name.as_str());
        }
        self.modes
            .iter()
            .find(|(_, config)| config.aliases.iter().any(|a| a == requested))
            .map(|(name, _)| name.as_str())
    }

    fn unknown_mode_error(&self, requested: &str) -> anyhow::Error {
        let known: Vec<&str> = self.modes.keys().map(String::as_str).collect();
        anyhow!(
            "unknown mode '{requested}' (known modes: {})",
            known.join(", ")
        )
    }
}

/// Load the mode configuration document.
///
/// Absence is a hard error: the project has not been set up.
pub fn load_modes(path: &Path) -> Result<ModesFile> {
    if !path.exists() {
        return Err(anyhow!(
            "missing mode configuration {} (run `flowctl init` to set up this project)",
            path.display()
        ));
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let modes: ModesFile =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    modes.validate()?;
    debug!(modes = modes.modes.len(), "mode configuration loaded");
    Ok(modes)
}

static CONFIG_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$\{config\.([A-Za-z0-9_-]+)\}$").expect("config ref regex should be valid")
});

/// Resolve an agent provider that may be a `${config.<key>}` reference.
pub fn resolve_provider(provider: &str, agents: &BTreeMap<String, String>) -> Result<String> {
    let Some(caps) = CONFIG_REF_RE.captures(provider) else {
        return Ok(provider.to_string());
    };
    let key = &caps[1];
    agents.get(key).cloned().ok_or_else(|| {
        anyhow!("agent provider reference '${{config.{key}}}' has no entry in [agents]")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode(template: &str) -> ModeConfig {
        ModeConfig {
            template: template.to_string(),
            stop_conditions: Vec::new(),
            issue_handling: IssueHandling::None,
            aliases: Vec::new(),
            deprecated: false,
            redirect_to: None,
        }
    }

    fn file_with(modes: Vec<(&str, ModeConfig)>) -> ModesFile {
        ModesFile {
            modes: modes
                .into_iter()
                .map(|(name, config)| (name.to_string(), config))
                .collect(),
            ..ModesFile::default()
        }
    }

    #[test]
    fn load_missing_file_names_the_remediation() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = load_modes(&temp.path().join("modes.toml")).unwrap_err();
        assert!(err.to_string().contains("flowctl init"));
    }

    #[test]
    fn unknown_stop_condition_kind_is_a_hard_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("modes.toml");
        fs::write(
            &path,
            "[modes.plan]\ntemplate = \"plan\"\nstop_conditions = [\"linted\"]\n",
        )
        .expect("write");
        let err = load_modes(&path).unwrap_err();
        assert!(format!("{err:#}").contains("parse"));
    }

    #[test]
    fn resolve_follows_aliases() {
        let mut plan = mode("plan");
        plan.aliases = vec!["planning".to_string()];
        let file = file_with(vec![("plan", plan)]);
        let resolved = file.resolve("planning").expect("resolve");
        assert_eq!(resolved.name, "plan");
    }

    #[test]
    fn resolve_follows_deprecation_redirect() {
        let mut old = mode("debug");
        old.deprecated = true;
        old.redirect_to = Some("debug".to_string());
        let file = file_with(vec![("bugfix", old), ("debug", mode("debug"))]);
        let resolved = file.resolve("bugfix").expect("resolve");
        assert_eq!(resolved.name, "debug");
    }

    #[test]
    fn resolve_unknown_mode_lists_known_modes() {
        let file = file_with(vec![("plan", mode("plan"))]);
        let err = file.resolve("ship").unwrap_err();
        assert!(err.to_string().contains("known modes: plan"));
    }

    #[test]
    fn validate_rejects_alias_collision_and_dangling_redirect() {
        let mut a = mode("a");
        a.aliases = vec!["b".to_string()];
        let file = file_with(vec![("a", a), ("b", mode("b"))]);
        assert!(file.validate().unwrap_err().to_string().contains("collides"));

        let mut dangling = mode("a");
        dangling.redirect_to = Some("ghost".to_string());
        let file = file_with(vec![("a", dangling)]);
        assert!(
            file.validate()
                .unwrap_err()
                .to_string()
                .contains("unknown mode 'ghost'")
        );
    }

    #[test]
    fn resolve_provider_passes_literals_and_resolves_refs() {
        let agents: BTreeMap<String, String> =
            [("reviewer".to_string(), "claude".to_string())].into();
        assert_eq!(
            resolve_provider("codex", &agents).expect("literal"),
            "codex"
        );
        assert_eq!(
            resolve_provider("${config.reviewer}", &agents).expect("ref"),
            "claude"
        );
        let err = resolve_provider("${config.ghost}", &agents).unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn declared_stop_condition_order_is_preserved() {
        let doc = "[modes.x]\ntemplate = \"x\"\nstop_conditions = [\"committed\", \"tasks_complete\"]\n";
        let file: ModesFile = toml::from_str(doc).expect("parse");
        assert_eq!(
            file.modes["x"].stop_conditions,
            vec![StopKind::Committed, StopKind::TasksComplete]
        );
    }
}
