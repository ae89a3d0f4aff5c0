//! Resume text → ordered skill list plus summary and responsibility phrases.
//!
//! Skills are gathered in priority order: technical-skills terms, then
//! areas-of-expertise terms, then seed skills mentioned anywhere in the text,
//! then the remaining seed skills in seed order. Repeats (ignoring case) keep
//! their first spelling.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::MatchError;
use crate::extraction::extract_skills;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Summary,
    Expertise,
    Technical,
    Experience,
}

static HEADINGS: Lazy<Vec<(Section, Regex)>> = Lazy::new(|| {
    [
        (Section::Summary, r"(?i)^\s*professional summary\b"),
        (Section::Expertise, r"(?i)^\s*areas of expertise\b"),
        (Section::Technical, r"(?i)^\s*technical (skills|tools)\b"),
        (Section::Experience, r"(?i)^\s*work experience\b"),
    ]
    .into_iter()
    .map(|(section, pattern)| (section, Regex::new(pattern).expect("heading pattern is valid")))
    .collect()
});

static CLOSING_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(education|certifications|projects)\b").expect("closing pattern is valid")
});

static TERM_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,;]\s*").expect("split pattern is valid"));

/// A letter after at most three bullet characters opens a new phrase.
static PHRASE_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[•\-o ]{0,3}[A-Za-z]").expect("phrase pattern is valid"));

static BULLET_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\s|[•\-]|o\s)+").expect("bullet pattern is valid"));

const SUMMARY_FALLBACK_LINES: usize = 15;
const SUMMARY_MAX_CHARS: usize = 1500;
const PHRASE_CHARS: std::ops::RangeInclusive<usize> = 15..=220;

const EXPERTISE_STOP_WORDS: &[&str] = &[
    "and",
    "the",
    "with",
    "including",
    "across",
    "track record",
    "teams",
];

/// Raw lines of each recognised resume section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResumeSections {
    pub summary: Vec<String>,
    pub expertise: Vec<String>,
    pub technical: Vec<String>,
    pub experience: Vec<String>,
}

impl ResumeSections {
    fn lines_mut(&mut self, section: Section) -> &mut Vec<String> {
        match section {
            Section::Summary => &mut self.summary,
            Section::Expertise => &mut self.expertise,
            Section::Technical => &mut self.technical,
            Section::Experience => &mut self.experience,
        }
    }
}

/// Splits resume text into sections. Heading lines are not kept. An
/// education/certifications/projects heading closes the current section, and a
/// line with three or more pipes outside any section opens the expertise section.
pub fn parse_sections(text: &str) -> ResumeSections {
    let mut sections = ResumeSections::default();
    let mut current: Option<Section> = None;

    for line in text.lines().map(str::trim_end) {
        if let Some((section, _)) = HEADINGS.iter().find(|(_, re)| re.is_match(line)) {
            current = Some(*section);
            continue;
        }
        if current.is_none() && line.matches('|').count() >= 3 {
            current = Some(Section::Expertise);
        }
        if CLOSING_HEADING.is_match(line) {
            current = None;
            continue;
        }
        if let Some(section) = current {
            sections.lines_mut(section).push(line.to_string());
        }
    }
    sections
}

fn clean_term(raw: &str) -> &str {
    raw.trim().trim_matches(|c| c == '-' || c == '•').trim()
}

/// Comma/semicolon/pipe separated tool names: at most 50 characters, at least one letter.
fn technical_terms(lines: &[String]) -> Vec<String> {
    let joined = lines.join(" ");
    joined
        .split(|c| c == ',' || c == ';' || c == '|')
        .map(clean_term)
        .filter(|t| !t.is_empty() && t.chars().count() <= 50)
        .filter(|t| t.chars().any(|c| c.is_ascii_alphabetic()))
        .map(String::from)
        .collect()
}

/// Pipe-enumerated expertise areas. Sentence fragments, stop words and
/// lowercase single words are rejected.
fn expertise_terms(lines: &[String]) -> Vec<String> {
    let fragments: Vec<&str> = lines
        .iter()
        .filter(|l| l.contains('|'))
        .flat_map(|l| l.split('|'))
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect();

    let mut out = Vec::new();
    for fragment in fragments {
        for part in TERM_SPLIT.split(fragment) {
            let term = clean_term(part);
            let len = term.chars().count();
            if !(2..=60).contains(&len) || term.contains("  ") {
                continue;
            }
            let words = term.split_whitespace().count();
            if words > 5 {
                continue;
            }
            if EXPERTISE_STOP_WORDS.contains(&term.to_lowercase().as_str()) {
                continue;
            }
            if words <= 1 && !term.chars().any(|c| c.is_uppercase()) {
                continue;
            }
            out.push(term.to_string());
        }
    }
    out
}

/// Summary section joined into one line, or the opening lines of the resume
/// when it has no summary section.
fn summary_text(sections: &ResumeSections, content: &str) -> String {
    let lines: Vec<&str> = if sections.summary.iter().any(|l| !l.trim().is_empty()) {
        sections.summary.iter().map(String::as_str).collect()
    } else {
        content.lines().take(SUMMARY_FALLBACK_LINES).collect()
    };
    let joined = lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    joined.chars().take(SUMMARY_MAX_CHARS).collect()
}

fn push_phrase(buffer: &[&str], out: &mut Vec<String>) {
    let joined = buffer.join(" ");
    let stripped = BULLET_PREFIX.replace(&joined, "");
    let phrase = stripped.trim_end_matches(|c: char| c == '•' || c == '-' || c.is_whitespace());
    if PHRASE_CHARS.contains(&phrase.chars().count()) {
        out.push(phrase.to_string());
    }
}

/// Bullet-style phrases from the work experience lines. Lines that do not open
/// a phrase continue the previous one.
fn responsibility_phrases(lines: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    for line in lines.iter().map(|l| l.trim_end()).filter(|l| !l.is_empty()) {
        if PHRASE_START.is_match(line) && !buffer.is_empty() {
            push_phrase(&buffer, &mut out);
            buffer.clear();
        }
        buffer.push(line);
    }
    if !buffer.is_empty() {
        push_phrase(&buffer, &mut out);
    }
    out
}

/// What a resume yields: skills in priority order plus free-text context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResume {
    pub skills: Vec<String>,
    pub summary: String,
    pub responsibilities: Vec<String>,
}

/// Parses resume content into its ordered, case-insensitively unique skill
/// list, summary and responsibility phrases.
///
/// Fails with `ProfileParse` on content that is empty or was not decoded as text
/// (NUL bytes, replacement characters).
pub fn parse_resume(content: &str, seed_skills: &[String]) -> Result<ParsedResume, MatchError> {
    if content.trim().is_empty() {
        return Err(MatchError::ProfileParse("resume content is empty".to_string()));
    }
    if content.contains('\0') {
        return Err(MatchError::ProfileParse(
            "resume content contains NUL bytes".to_string(),
        ));
    }
    if content.contains('\u{FFFD}') {
        return Err(MatchError::ProfileParse(
            "resume content contains undecodable characters".to_string(),
        ));
    }

    let sections = parse_sections(content);

    let mut seen = HashSet::new();
    let mut skills = Vec::new();
    let mut add = |term: String| {
        if seen.insert(term.to_lowercase()) {
            skills.push(term);
        }
    };

    technical_terms(&sections.technical).into_iter().for_each(&mut add);
    expertise_terms(&sections.expertise).into_iter().for_each(&mut add);
    extract_skills(content, seed_skills).into_iter().for_each(&mut add);
    seed_skills
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .for_each(&mut add);

    Ok(ParsedResume {
        skills,
        summary: summary_text(&sections, content),
        responsibilities: responsibility_phrases(&sections.experience),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeds(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    const RESUME: &str = "Jane Doe\n\
        PROFESSIONAL SUMMARY\n\
        Data engineer focused on Kafka streaming.\n\
        AREAS OF EXPERTISE\n\
        Data Pipelines | Orchestration | cloud | APIs | Testing\n\
        TECHNICAL SKILLS\n\
        Python, SQL; Airflow | Docker, Kubernetes, ETL, 2019\n\
        WORK EXPERIENCE\n\
        Built Spark jobs on AWS.\n\
        EDUCATION\n\
        BSc Computer Science, Haskell club\n";

    #[test]
    fn test_sections_detected_and_closed() {
        let sections = parse_sections(RESUME);
        assert_eq!(sections.summary, vec!["Data engineer focused on Kafka streaming."]);
        assert_eq!(sections.technical.len(), 1);
        assert_eq!(sections.experience, vec!["Built Spark jobs on AWS."]);
        assert!(sections.experience.iter().all(|l| !l.contains("Haskell")));
    }

    #[test]
    fn test_pipe_line_opens_expertise() {
        let sections = parse_sections("Rust | Go | SQL | Kafka\nmore text");
        assert_eq!(sections.expertise, vec!["Rust | Go | SQL | Kafka", "more text"]);
    }

    #[test]
    fn test_technical_terms_split_and_filtered() {
        let terms = technical_terms(&["Python, SQL; Airflow | Docker, 2019, -Go-".to_string()]);
        assert_eq!(terms, vec!["Python", "SQL", "Airflow", "Docker", "Go"]);
    }

    #[test]
    fn test_expertise_rejects_lowercase_single_words_and_stop_words() {
        let terms = expertise_terms(&[concat!(
            "Data Pipelines | cloud | APIs | and | data modeling | ",
            "a very long fragment that has many words"
        )
        .to_string()]);
        assert_eq!(terms, vec!["Data Pipelines", "APIs", "data modeling"]);
    }

    #[test]
    fn test_skill_priority_order_and_seed_merge() {
        let parsed = parse_resume(RESUME, &seeds(&["Terraform", "kafka", "Spark", "python"]));
        assert_eq!(
            parsed.unwrap().skills,
            vec![
                "Python",
                "SQL",
                "Airflow",
                "Docker",
                "Kubernetes",
                "ETL",
                "Data Pipelines",
                "Orchestration",
                "APIs",
                "Testing",
                "kafka",
                "Spark",
                "Terraform",
            ]
        );
    }

    #[test]
    fn test_unparseable_content_is_an_error() {
        for bad in ["", "   \n ", "resume\0body", "r\u{FFFD}sum\u{FFFD}"] {
            let err = parse_resume(bad, &seeds(&["Rust"])).unwrap_err();
            assert_eq!(err.code(), "PROFILE_PARSE_ERROR", "input {bad:?}");
        }
    }

    #[test]
    fn test_plain_text_falls_back_to_seeds() {
        let parsed = parse_resume("I write Go services.", &seeds(&["Rust", "Go"])).unwrap();
        assert_eq!(parsed.skills, vec!["Go", "Rust"]);
    }

    #[test]
    fn test_summary_and_responsibilities_from_sections() {
        let parsed = parse_resume(RESUME, &[]).unwrap();
        assert_eq!(parsed.summary, "Data engineer focused on Kafka streaming.");
        assert_eq!(parsed.responsibilities, vec!["Built Spark jobs on AWS."]);
    }

    #[test]
    fn test_summary_falls_back_to_opening_lines() {
        let parsed = parse_resume("Jane Doe\n\nBackend engineer.\n", &[]).unwrap();
        assert_eq!(parsed.summary, "Jane Doe Backend engineer.");
        assert!(parsed.responsibilities.is_empty());
    }

    #[test]
    fn test_responsibility_phrases_join_continuations_and_drop_short() {
        let lines: Vec<String> = [
            "• Designed streaming ingestion for",
            "     120 services across regions",
            "- Led hiring",
            "o Migrated batch ETL to Spark on Kubernetes",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(
            responsibility_phrases(&lines),
            vec![
                "Designed streaming ingestion for      120 services across regions",
                "Migrated batch ETL to Spark on Kubernetes",
            ]
        );
    }
}
