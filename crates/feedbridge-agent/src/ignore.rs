use regex::RegexSet;

use feedbridge_core::EventRecord;

/// Records matching any configured pattern never trigger keyword alerts.
#[derive(Debug, Clone)]
pub struct IgnoreFilter {
    patterns: RegexSet,
}

impl IgnoreFilter {
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self {
            patterns: RegexSet::new(patterns)?,
        })
    }

    /// Filter that ignores nothing.
    pub fn none() -> Self {
        Self {
            patterns: RegexSet::empty(),
        }
    }

    /// True when any pattern matches the message body or the origin host.
    pub fn should_ignore(&self, record: &EventRecord) -> bool {
        self.patterns.is_match(record.message())
            || self.patterns.is_match(&record.fields.origin_host)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for IgnoreFilter {
    fn default() -> Self {
        Self::none()
    }
}
