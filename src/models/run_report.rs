use std::path::PathBuf;

/// What happened to a single entry during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// Prior archive already covers the newest source file
    UpToDate,

    /// Source directory was missing or held no files
    NoSourceFiles,

    /// A new archive was written
    Created(PathBuf),

    /// Dry run - this archive would have been written
    WouldCreate(PathBuf),

    /// Detection or archiving failed; the message is the error chain
    Failed(String),
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<(String, EntryOutcome)>,
}

impl RunReport {
    pub fn record(&mut self, name: &str, outcome: EntryOutcome) {
        self.outcomes.push((name.to_string(), outcome));
    }

    pub fn created(&self) -> Vec<&PathBuf> {
        self.outcomes
            .iter()
            .filter_map(|(_, outcome)| match outcome {
                EntryOutcome::Created(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    pub fn failures(&self) -> Vec<(&str, &str)> {
        self.outcomes
            .iter()
            .filter_map(|(name, outcome)| match outcome {
                EntryOutcome::Failed(message) => Some((name.as_str(), message.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        self.outcomes
            .iter()
            .any(|(_, outcome)| matches!(outcome, EntryOutcome::Failed(_)))
    }

    #[cfg(test)]
    pub fn outcome_for(&self, name: &str) -> Option<&EntryOutcome> {
        self.outcomes
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, outcome)| outcome)
    }
}
