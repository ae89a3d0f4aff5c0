use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Where an extracted skill came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillProvenance {
    Heuristic,
    Semantic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedSkill {
    pub skill: String,
    pub provenance: SkillProvenance,
}

/// Ordered, duplicate-free (case-insensitive) skills extracted from one posting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedSkillSet {
    skills: Vec<TaggedSkill>,
}

impl ExtractedSkillSet {
    /// Builds a heuristic-only set. Later case-insensitive repeats are dropped.
    pub fn from_heuristic<I, S>(skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::default();
        for skill in skills {
            set.push(skill.into(), SkillProvenance::Heuristic);
        }
        set
    }

    /// Appends unless an equal skill (ignoring case) is already present.
    /// Returns whether the skill was added.
    pub fn push(&mut self, skill: String, provenance: SkillProvenance) -> bool {
        if self.contains(&skill) {
            return false;
        }
        self.skills.push(TaggedSkill { skill, provenance });
        true
    }

    pub fn contains(&self, skill: &str) -> bool {
        let needle = skill.to_lowercase();
        self.skills.iter().any(|s| s.skill.to_lowercase() == needle)
    }

    pub fn names(&self) -> Vec<&str> {
        self.skills.iter().map(|s| s.skill.as_str()).collect()
    }

    pub fn names_with(&self, provenance: SkillProvenance) -> Vec<&str> {
        self.skills
            .iter()
            .filter(|s| s.provenance == provenance)
            .map(|s| s.skill.as_str())
            .collect()
    }

    /// Lowercased skill keys, as used for set arithmetic in scoring.
    pub fn key_set(&self) -> HashSet<String> {
        self.skills.iter().map(|s| s.skill.to_lowercase()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaggedSkill> {
        self.skills.iter()
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}
