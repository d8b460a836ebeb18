/// Exam grouping and blog filtering over local snapshots
use crate::models::{BlogPost, Exam};
use std::collections::{BTreeMap, HashSet};

/// Bucket label for exams with a blank semester or subject
pub const OTHER_LABEL: &str = "Other";

/// semester -> subject -> exams
pub type ExamGroups = BTreeMap<String, BTreeMap<String, Vec<Exam>>>;

fn label(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        OTHER_LABEL.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Group exams by semester then subject, keeping snapshot order inside a bucket
pub fn group_exams(exams: &[Exam]) -> ExamGroups {
    let mut groups = ExamGroups::new();
    for exam in exams {
        groups
            .entry(label(&exam.semester))
            .or_default()
            .entry(label(&exam.subject))
            .or_default()
            .push(exam.clone());
    }
    groups
}

/// Which exam card is expanded; at most one at a time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExamBrowser {
    open_id: Option<String>,
}

impl ExamBrowser {
    pub fn open_id(&self) -> Option<&str> {
        self.open_id.as_deref()
    }

    /// Open `id`, or close it if it is already open
    pub fn toggle(&mut self, id: &str) {
        if self.open_id.as_deref() == Some(id) {
            self.open_id = None;
        } else {
            self.open_id = Some(id.to_string());
        }
    }

    pub fn close(&mut self) {
        self.open_id = None;
    }
}

/// Every tag in first-seen order
pub fn tag_universe(posts: &[BlogPost]) -> Vec<String> {
    let mut seen = HashSet::new();
    posts
        .iter()
        .flat_map(|post| post.tags.iter())
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(tag.as_str()))
        .cloned()
        .collect()
}

/// Case-insensitive search over title and content, intersected with the tag
pub fn filter_posts<'a>(posts: &'a [BlogPost], search: &str, tag: Option<&str>) -> Vec<&'a BlogPost> {
    let needle = search.trim().to_lowercase();
    posts
        .iter()
        .filter(|post| {
            needle.is_empty()
                || format!("{} {}", post.title, post.content)
                    .to_lowercase()
                    .contains(&needle)
        })
        .filter(|post| tag.map(|t| post.has_tag(t)).unwrap_or(true))
        .collect()
}

/// Search box, tag chip and open post of the blog section
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlogBrowser {
    pub search: String,
    active_tag: Option<String>,
    active_post: Option<String>,
}

impl BlogBrowser {
    pub fn active_tag(&self) -> Option<&str> {
        self.active_tag.as_deref()
    }

    /// Activate a tag; picking the active tag again clears it
    pub fn select_tag(&mut self, tag: &str) {
        if self.active_tag.as_deref() == Some(tag) {
            self.active_tag = None;
        } else {
            self.active_tag = Some(tag.to_string());
        }
    }

    pub fn clear_tag(&mut self) {
        self.active_tag = None;
    }

    /// Post shown in detail view; `None` means the list view
    pub fn active_post(&self) -> Option<&str> {
        self.active_post.as_deref()
    }

    pub fn open_post(&mut self, id: &str) {
        self.active_post = Some(id.to_string());
    }

    pub fn back_to_list(&mut self) {
        self.active_post = None;
    }

    pub fn visible<'a>(&self, posts: &'a [BlogPost]) -> Vec<&'a BlogPost> {
        filter_posts(posts, &self.search, self.active_tag())
    }
}
