//! Minimal systemd unit-file builder and serializer.

use crate::error::PodliteResult;
use crate::identity::UidRange;
use crate::util::write_and_shift;
use std::path::Path;

/// Mode of generated unit files.
pub const UNIT_FILE_MODE: u32 = 0o644;

/// One `Key=Value` line of a section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitOption {
    pub section: String,
    pub name: String,
    pub value: String,
}

impl UnitOption {
    pub fn new(
        section: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            section: section.into(),
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Ordered list of unit options.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnitFile {
    options: Vec<UnitOption>,
}

impl UnitFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an option (builder style).
    pub fn option(
        mut self,
        section: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.push(UnitOption::new(section, name, value));
        self
    }

    /// Append an option.
    pub fn push(&mut self, option: UnitOption) {
        self.options.push(option);
    }

    pub fn options(&self) -> &[UnitOption] {
        &self.options
    }

    /// Values of every `name` option in `section`, in order.
    pub fn values<'a>(&'a self, section: &'a str, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.options
            .iter()
            .filter(move |o| o.section == section && o.name == name)
            .map(|o| o.value.as_str())
    }

    /// Render the unit.
    ///
    /// Sections appear in first-seen order and each section lists its
    /// options in insertion order, even if they were interleaved with other
    /// sections. Sections are separated by one blank line.
    pub fn serialize(&self) -> String {
        let mut sections: Vec<&str> = Vec::new();
        for opt in &self.options {
            if !sections.contains(&opt.section.as_str()) {
                sections.push(&opt.section);
            }
        }

        let mut out = String::new();
        for (i, section) in sections.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push('[');
            out.push_str(section);
            out.push_str("]\n");
            for opt in self.options.iter().filter(|o| o.section == *section) {
                out.push_str(&opt.name);
                out.push('=');
                out.push_str(&opt.value);
                out.push('\n');
            }
        }
        out
    }

    /// Serialize to `path` and shift its ownership.
    pub fn write(&self, path: &Path, uid_range: &UidRange) -> PodliteResult<()> {
        write_and_shift(path, self.serialize().as_bytes(), UNIT_FILE_MODE, uid_range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_groups_sections() {
        let unit = UnitFile::new()
            .option("Unit", "Description", "demo")
            .option("Service", "ExecStart", "/bin/true")
            .option("Unit", "After", "a.service")
            .option("Service", "Restart", "no");

        assert_eq!(
            unit.serialize(),
            "[Unit]\nDescription=demo\nAfter=a.service\n\n[Service]\nExecStart=/bin/true\nRestart=no\n"
        );
    }

    #[test]
    fn test_serialize_empty() {
        assert_eq!(UnitFile::new().serialize(), "");
    }

    #[test]
    fn test_values() {
        let unit = UnitFile::new()
            .option("Unit", "Conflicts", "a")
            .option("Unit", "Conflicts", "b");
        assert_eq!(unit.values("Unit", "Conflicts").collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_write() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("x.service");
        UnitFile::new()
            .option("Service", "Type", "oneshot")
            .write(&path, &UidRange::blank())
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "[Service]\nType=oneshot\n"
        );
    }
}
