//! Sponsor-only detection.
//!
//! Some authors publish beta builds that only sponsors can run; the only way
//! to tell is a marker data slot in the manifest. Which author uses which
//! marker is configuration, not code.

use serde::{Deserialize, Serialize};

use crate::definition::{CoreDefinition, DataSlot};

pub trait SponsorPolicy: Send + Sync {
    fn sponsor_only(&self, core: &CoreDefinition, slots: &[DataSlot]) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SponsorRule {
    pub author: String,
    pub slot_name: String,
}

/// A core is sponsor-only when any rule matches its author and one of its slot names.
#[derive(Debug, Clone, Default)]
pub struct SponsorRules {
    rules: Vec<SponsorRule>,
}

impl SponsorRules {
    pub fn new(rules: Vec<SponsorRule>) -> Self {
        Self { rules }
    }

    pub fn default_rules() -> Vec<SponsorRule> {
        vec![SponsorRule {
            author: "jotego".to_string(),
            slot_name: "JTBETA".to_string(),
        }]
    }
}

impl SponsorPolicy for SponsorRules {
    fn sponsor_only(&self, core: &CoreDefinition, slots: &[DataSlot]) -> bool {
        self.rules.iter().any(|rule| {
            rule.author == core.author
                && slots
                    .iter()
                    .any(|slot| slot.name.as_deref() == Some(rule.slot_name.as_str()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(author: &str) -> CoreDefinition {
        CoreDefinition {
            id: format!("{author}.core"),
            platform_id: "arcade".into(),
            author: author.into(),
            shortname: "core".into(),
            description: String::new(),
            version: "1".into(),
            date_release: None,
        }
    }

    fn named(name: &str) -> DataSlot {
        DataSlot {
            name: Some(name.into()),
            required: false,
            filename: None,
            extensions: None,
            core_specific: false,
        }
    }

    #[test]
    fn matches_author_and_slot() {
        let policy = SponsorRules::new(SponsorRules::default_rules());
        let slots = [named("ROM"), named("JTBETA")];
        assert!(policy.sponsor_only(&definition("jotego"), &slots));
        assert!(!policy.sponsor_only(&definition("someone"), &slots));
        assert!(!policy.sponsor_only(&definition("jotego"), &[named("ROM")]));
    }

    #[test]
    fn no_rules_never_matches() {
        let policy = SponsorRules::default();
        assert!(!policy.sponsor_only(&definition("jotego"), &[named("JTBETA")]));
    }
}
