/// Tagged markdown blog posts
use crate::{
    error::{PanelError, PanelResult},
    models::{Collection, Entity},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Blog post record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    #[serde(skip)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: i64,
}

impl Entity for BlogPost {
    const COLLECTION: Collection = Collection::Blogs;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn created_at(&self) -> i64 {
        self.created_at
    }
}

impl BlogPost {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Split on commas, trim, drop empties and duplicates (first occurrence wins)
pub fn parse_tags(input: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in input.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

/// Blog creation form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BlogForm {
    pub title: String,
    pub content: String,
    pub tags_input: String,
}

impl BlogForm {
    pub fn is_submittable(&self) -> bool {
        !self.title.trim().is_empty() && !self.content.trim().is_empty()
    }

    pub fn build(&self, created_at: i64) -> PanelResult<BlogPost> {
        if !self.is_submittable() {
            return Err(PanelError::Validation(
                "Title and content are required".to_string(),
            ));
        }

        Ok(BlogPost {
            id: String::new(),
            title: self.title.trim().to_string(),
            content: self.content.trim().to_string(),
            tags: parse_tags(&self.tags_input),
            created_at,
        })
    }
}

/// Blog edit form. Title, content and tags are replaced together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BlogEdit {
    pub title: String,
    pub content: String,
    pub tags_input: String,
}

impl BlogEdit {
    pub fn from_post(post: &BlogPost) -> Self {
        Self {
            title: post.title.clone(),
            content: post.content.clone(),
            tags_input: post.tags.join(", "),
        }
    }

    pub fn patch(&self, current: &BlogPost) -> Map<String, Value> {
        let title = match self.title.trim() {
            "" => current.title.clone(),
            t => t.to_string(),
        };
        let content = match self.content.trim() {
            "" => current.content.clone(),
            c => c.to_string(),
        };

        let mut patch = Map::new();
        patch.insert("title".into(), Value::String(title));
        patch.insert("content".into(), Value::String(content));
        patch.insert(
            "tags".into(),
            Value::Array(
                parse_tags(&self.tags_input)
                    .into_iter()
                    .map(Value::String)
                    .collect(),
            ),
        );
        patch
    }
}
