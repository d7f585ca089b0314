// ABOUTME: Custom serde deserializers for spec file fields.
// ABOUTME: Handles shell-style command strings and "src:dst[:ro]" mount entries.

use crate::runtime::VolumeMount;
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum CommandEntry {
    Line(String),
    Words(Vec<String>),
}

/// `command: redis-server --appendonly yes` or a YAML list. A string is split
/// on whitespace; quote-aware splitting needs the list form.
pub fn deserialize_command<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match CommandEntry::deserialize(deserializer)? {
        CommandEntry::Line(line) => Ok(line.split_whitespace().map(String::from).collect()),
        CommandEntry::Words(words) => Ok(words),
    }
}

pub fn deserialize_mounts<'de, D>(deserializer: D) -> Result<Vec<VolumeMount>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<String> = Vec::deserialize(deserializer)?;
    values
        .iter()
        .map(|entry| parse_mount(entry))
        .collect::<Result<Vec<_>, _>>()
        .map_err(serde::de::Error::custom)
}

pub fn parse_mount(entry: &str) -> Result<VolumeMount, String> {
    let parts: Vec<&str> = entry.split(':').collect();
    let (source, target, read_only) = match parts.as_slice() {
        [source, target] => (*source, *target, false),
        [source, target, "ro"] => (*source, *target, true),
        [source, target, "rw"] => (*source, *target, false),
        _ => return Err(format!("invalid mount '{}': expected src:dst[:ro]", entry)),
    };

    if source.is_empty() || target.is_empty() {
        return Err(format!("invalid mount '{}': empty path", entry));
    }
    if !target.starts_with('/') {
        return Err(format!(
            "invalid mount '{}': container path must be absolute",
            entry
        ));
    }

    Ok(VolumeMount {
        source: source.to_string(),
        target: target.to_string(),
        read_only,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mount_forms() {
        let rw = parse_mount("./data:/var/lib/data").unwrap();
        assert_eq!(rw.source, "./data");
        assert_eq!(rw.target, "/var/lib/data");
        assert!(!rw.read_only);

        assert!(parse_mount("/etc/app.conf:/etc/app.conf:ro").unwrap().read_only);
        assert!(!parse_mount("/a:/b:rw").unwrap().read_only);
    }

    #[test]
    fn malformed_mounts() {
        assert!(parse_mount("/only-one").is_err());
        assert!(parse_mount("/a:/b:rx").is_err());
        assert!(parse_mount(":/b").is_err());
        assert!(parse_mount("/a:relative").is_err());
    }
}
