pub mod posting;
pub mod profile;
pub mod skills;

pub use posting::{PostingRecord, SalaryFields};
pub use profile::{core_subset_len, ResumeProfile};
pub use skills::{ExtractedSkillSet, SkillProvenance, TaggedSkill};
