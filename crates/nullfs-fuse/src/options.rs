//! Mount option forwarding.
//!
//! Options arrive the way `mount -o` and libfuse programs take them: a comma
//! separated list, possibly given several times. The handful that libfuse's
//! high-level layer consumes itself (`attr_timeout`, `entry_timeout`, `uid`,
//! `gid`) configure the bridge. The rest are handed to the kernel mount,
//! typed when fuser knows them and verbatim otherwise.

use crate::config::MountConfig;
use fuser::MountOption;
use std::time::Duration;
use thiserror::Error;

/// File system name shown in the mount table unless `fsname=` is given.
pub const DEFAULT_FSNAME: &str = "nullfs";

/// A malformed value for an option the bridge interprets itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid value for mount option '{option}': '{value}'")]
pub struct OptionError {
    pub option: String,
    pub value: String,
}

/// Parsed mount options.
#[derive(Debug, Clone)]
pub struct MountArgs {
    /// Bridge configuration after applying high-level options.
    pub config: MountConfig,
    /// Options passed through to the kernel mount.
    pub options: Vec<MountOption>,
}

impl MountArgs {
    /// Parses option strings on top of `base`.
    ///
    /// Each item may hold several comma separated options. Empty items are
    /// skipped.
    pub fn parse<I, S>(items: I, base: MountConfig) -> Result<Self, OptionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = base;
        let mut options = Vec::new();

        for item in items {
            for raw in item.as_ref().split(',').filter(|s| !s.is_empty()) {
                let (key, value) = match raw.split_once('=') {
                    Some((k, v)) => (k, Some(v)),
                    None => (raw, None),
                };

                match (key, value) {
                    ("attr_timeout", Some(v)) => config = config.attr_ttl(parse_timeout(key, v)?),
                    ("entry_timeout", Some(v)) => {
                        config = config.entry_ttl(parse_timeout(key, v)?);
                    }
                    ("uid", Some(v)) => config = config.uid(parse_id(key, v)?),
                    ("gid", Some(v)) => config = config.gid(parse_id(key, v)?),
                    _ => options.push(kernel_option(raw)),
                }
            }
        }

        if !options.iter().any(|o| matches!(o, MountOption::FSName(_))) {
            options.push(MountOption::FSName(DEFAULT_FSNAME.to_string()));
        }

        Ok(Self { config, options })
    }
}

/// Maps one option to fuser's typed form, falling back to `CUSTOM`.
pub fn kernel_option(raw: &str) -> MountOption {
    if let Some(name) = raw.strip_prefix("fsname=") {
        return MountOption::FSName(name.to_string());
    }
    if let Some(subtype) = raw.strip_prefix("subtype=") {
        return MountOption::Subtype(subtype.to_string());
    }

    match raw {
        "ro" => MountOption::RO,
        "rw" => MountOption::RW,
        "allow_other" => MountOption::AllowOther,
        "allow_root" => MountOption::AllowRoot,
        "auto_unmount" => MountOption::AutoUnmount,
        "default_permissions" => MountOption::DefaultPermissions,
        "dev" => MountOption::Dev,
        "nodev" => MountOption::NoDev,
        "suid" => MountOption::Suid,
        "nosuid" => MountOption::NoSuid,
        "exec" => MountOption::Exec,
        "noexec" => MountOption::NoExec,
        "atime" => MountOption::Atime,
        "noatime" => MountOption::NoAtime,
        "sync" => MountOption::Sync,
        "async" => MountOption::Async,
        "dirsync" => MountOption::DirSync,
        other => MountOption::CUSTOM(other.to_string()),
    }
}

fn parse_timeout(option: &str, value: &str) -> Result<Duration, OptionError> {
    value
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| invalid(option, value))
}

fn parse_id(option: &str, value: &str) -> Result<u32, OptionError> {
    value.parse().map_err(|_| invalid(option, value))
}

fn invalid(option: &str, value: &str) -> OptionError {
    OptionError {
        option: option.to_string(),
        value: value.to_string(),
    }
}
