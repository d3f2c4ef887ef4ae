// src/remote/ssh_config.rs

//! Minimal OpenSSH client configuration reader.
//!
//! Supports what worker connections need:
//! - `Host` blocks with `*`/`?` patterns and `!` negation,
//! - `HostName` (with `%h` and `%%` tokens), `User`, `Port`, `IdentityFile`,
//! - `key value` and `key=value` forms, case-insensitive keywords,
//! - options before the first `Host` line apply to every host.
//!
//! As in OpenSSH, the first value obtained for an option wins, except
//! `IdentityFile`, which accumulates. `Match` blocks are skipped.

use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use tracing::debug;

use crate::errors::{DaqError, Result};
use crate::remote::transport::ConnectTarget;

pub const DEFAULT_SSH_PORT: u16 = 22;

#[derive(Debug, Clone)]
struct HostPattern {
    negated: bool,
    matcher: GlobMatcher,
}

#[derive(Debug, Clone)]
struct HostBlock {
    /// `None` for a `Match` block, which never applies.
    patterns: Option<Vec<HostPattern>>,
    options: Vec<(String, String)>,
}

impl HostBlock {
    fn matches(&self, host: &str) -> bool {
        let Some(patterns) = &self.patterns else {
            return false;
        };
        let mut positive = false;
        for pattern in patterns {
            if pattern.matcher.is_match(host) {
                if pattern.negated {
                    return false;
                }
                positive = true;
            }
        }
        positive
    }
}

/// Parsed client configuration.
#[derive(Debug, Clone, Default)]
pub struct SshConfig {
    blocks: Vec<HostBlock>,
}

/// Options that apply to one host after lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostOptions {
    pub hostname: Option<String>,
    pub user: Option<String>,
    pub port: Option<u16>,
    pub identity_files: Vec<String>,
}

impl SshConfig {
    pub fn parse(text: &str) -> Result<Self> {
        // Leading options behave like an implicit `Host *`.
        let mut blocks = vec![HostBlock {
            patterns: Some(vec![compile_pattern("*")?]),
            options: Vec::new(),
        }];

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = split_keyword(line).ok_or_else(|| {
                DaqError::ConfigError(format!("ssh config line {}: missing value", idx + 1))
            })?;
            let key = key.to_lowercase();

            match key.as_str() {
                "host" => {
                    let patterns = value
                        .split_whitespace()
                        .map(compile_pattern)
                        .collect::<Result<Vec<_>>>()?;
                    blocks.push(HostBlock {
                        patterns: Some(patterns),
                        options: Vec::new(),
                    });
                }
                "match" => {
                    debug!(line = idx + 1, "skipping unsupported Match block in ssh config");
                    blocks.push(HostBlock {
                        patterns: None,
                        options: Vec::new(),
                    });
                }
                _ => {
                    if let Some(block) = blocks.last_mut() {
                        block.options.push((key, unquote(value).to_string()));
                    }
                }
            }
        }

        Ok(Self { blocks })
    }

    /// Read and parse a config file.
    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path).await?;
        Self::parse(&text)
    }

    /// Collect the options that apply to `host`.
    pub fn lookup(&self, host: &str) -> Result<HostOptions> {
        let mut out = HostOptions::default();
        for block in self.blocks.iter().filter(|b| b.matches(host)) {
            for (key, value) in &block.options {
                match key.as_str() {
                    "hostname" if out.hostname.is_none() => {
                        out.hostname = Some(expand_tokens(value, host));
                    }
                    "user" if out.user.is_none() => out.user = Some(value.clone()),
                    "port" if out.port.is_none() => {
                        let port = value.parse::<u16>().map_err(|e| {
                            DaqError::ConfigError(format!(
                                "ssh config: invalid Port '{value}' for host {host}: {e}"
                            ))
                        })?;
                        out.port = Some(port);
                    }
                    "identityfile" => out.identity_files.push(value.clone()),
                    _ => {}
                }
            }
        }
        Ok(out)
    }
}

fn compile_pattern(raw: &str) -> Result<HostPattern> {
    let (negated, pattern) = match raw.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    let glob = GlobBuilder::new(pattern)
        .case_insensitive(true)
        .literal_separator(false)
        .build()
        .map_err(|e| DaqError::ConfigError(format!("ssh config: bad host pattern '{raw}': {e}")))?;
    Ok(HostPattern {
        negated,
        matcher: glob.compile_matcher(),
    })
}

fn split_keyword(line: &str) -> Option<(&str, &str)> {
    let idx = line.find(|c: char| c.is_whitespace() || c == '=')?;
    let (key, rest) = line.split_at(idx);
    let value = rest
        .trim_start_matches(|c: char| c.is_whitespace())
        .trim_start_matches('=')
        .trim();
    if key.is_empty() || value.is_empty() {
        None
    } else {
        Some((key, value))
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn expand_tokens(value: &str, host: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('h') => out.push_str(host),
            Some('%') => out.push('%'),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}

/// Expand a leading `~` to the caller's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ if path == "~" => home_dir().unwrap_or_else(|| PathBuf::from(path)),
        _ => PathBuf::from(path),
    }
}

pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}

/// Name of the user running this process.
pub fn local_username() -> Option<String> {
    ["USER", "LOGNAME", "USERNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
}

/// Effective connection parameters after applying the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub hostname: String,
    pub port: u16,
    pub username: String,
    pub identity_files: Vec<PathBuf>,
}

/// Apply the config to `target`.
///
/// Precedence: explicit target fields, then the config file, then the local
/// user name / default port.
pub fn resolve(
    config: &SshConfig,
    target: &ConnectTarget,
    local_user: Option<String>,
) -> Result<ResolvedTarget> {
    let options = config.lookup(&target.host)?;

    let username = target
        .username
        .clone()
        .or(options.user)
        .or(local_user)
        .ok_or_else(|| {
            DaqError::Connection(format!(
                "no username configured for {} and the local user is unknown",
                target.host
            ))
        })?;

    Ok(ResolvedTarget {
        hostname: options.hostname.unwrap_or_else(|| target.host.clone()),
        port: target.port.or(options.port).unwrap_or(DEFAULT_SSH_PORT),
        username,
        identity_files: options
            .identity_files
            .iter()
            .map(|p| expand_home(&expand_tokens(p, &target.host)))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# worker nodes
Host mm*  !mm-spare
    HostName %h.daq.example.org
    User daq
    IdentityFile ~/.ssh/daq_ed25519

Host mm-spare
    HostName 10.0.0.99

Host=router?
    Port=2222
    User "router ops"

Match exec "true"
    User ignored

Host *
    User fallback
    Port 2200
"#;

    #[test]
    fn first_matching_value_wins() {
        let cfg = SshConfig::parse(SAMPLE).unwrap();
        let opts = cfg.lookup("mm1").unwrap();
        assert_eq!(opts.hostname.as_deref(), Some("mm1.daq.example.org"));
        assert_eq!(opts.user.as_deref(), Some("daq"));
        assert_eq!(opts.port, Some(2200));
        assert_eq!(opts.identity_files, vec!["~/.ssh/daq_ed25519"]);
    }

    #[test]
    fn negated_pattern_excludes_host() {
        let cfg = SshConfig::parse(SAMPLE).unwrap();
        let opts = cfg.lookup("mm-spare").unwrap();
        assert_eq!(opts.hostname.as_deref(), Some("10.0.0.99"));
        assert_eq!(opts.user.as_deref(), Some("fallback"));
    }

    #[test]
    fn equals_form_and_quotes() {
        let cfg = SshConfig::parse(SAMPLE).unwrap();
        let opts = cfg.lookup("router1").unwrap();
        assert_eq!(opts.port, Some(2222));
        assert_eq!(opts.user.as_deref(), Some("router ops"));
        assert_eq!(opts.hostname, None);
    }

    #[test]
    fn match_blocks_never_apply() {
        let cfg = SshConfig::parse("Match all\n  User nobody\n").unwrap();
        assert_eq!(cfg.lookup("anything").unwrap().user, None);
    }

    #[test]
    fn bad_port_is_an_error() {
        let cfg = SshConfig::parse("Host x\n Port http\n").unwrap();
        assert!(matches!(cfg.lookup("x"), Err(DaqError::ConfigError(_))));
    }

    #[test]
    fn explicit_username_wins_over_config() {
        let cfg = SshConfig::parse(SAMPLE).unwrap();
        let mut target = ConnectTarget::new("mm2");
        target.username = Some("operator".to_string());
        let resolved = resolve(&cfg, &target, Some("local".to_string())).unwrap();
        assert_eq!(resolved.username, "operator");
        assert_eq!(resolved.hostname, "mm2.daq.example.org");
    }

    #[test]
    fn falls_back_to_local_user_and_port_22() {
        let cfg = SshConfig::default();
        let target = ConnectTarget::new("10.1.1.1");
        let resolved = resolve(&cfg, &target, Some("local".to_string())).unwrap();
        assert_eq!(resolved.username, "local");
        assert_eq!(resolved.port, DEFAULT_SSH_PORT);
        assert_eq!(resolved.hostname, "10.1.1.1");

        let err = resolve(&cfg, &target, None).unwrap_err();
        assert!(err.is_connection());
    }

    #[test]
    fn explicit_port_wins() {
        let cfg = SshConfig::parse(SAMPLE).unwrap();
        let mut target = ConnectTarget::new("router7");
        target.port = Some(22);
        assert_eq!(resolve(&cfg, &target, None).unwrap().port, 22);
    }

    #[test]
    fn hostname_tokens_expand() {
        assert_eq!(expand_tokens("%h.lan", "a"), "a.lan");
        assert_eq!(expand_tokens("100%%", "a"), "100%");
    }
}
