/// Markdown composition toolbar for blog posts
use crate::error::{PanelError, PanelResult};
use serde::{Deserialize, Serialize};
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ToolbarAction {
    Bold,
    Italic,
    InlineCode,
    Heading,
    BulletList,
    CodeBlock,
}

impl ToolbarAction {
    fn placeholder(&self) -> &'static str {
        match self {
            ToolbarAction::Bold => "bold text",
            ToolbarAction::Italic => "italic",
            ToolbarAction::InlineCode => "code",
            ToolbarAction::Heading => "heading",
            ToolbarAction::BulletList => "item 1\nitem 2",
            ToolbarAction::CodeBlock => "code here",
        }
    }

    /// Replacement text and the selection inside it
    fn render(&self, text: &str) -> (String, Range<usize>) {
        match self {
            ToolbarAction::Bold => wrap("**", text, "**"),
            ToolbarAction::Italic => wrap("*", text, "*"),
            ToolbarAction::InlineCode => wrap("`", text, "`"),
            ToolbarAction::Heading => wrap("\n## ", text, "\n"),
            ToolbarAction::CodeBlock => wrap("\n```\n", text, "\n```\n"),
            ToolbarAction::BulletList => {
                let lines: Vec<String> = text
                    .split('\n')
                    .map(|line| format!("- {}", line))
                    .collect();
                let insert = format!("\n{}\n", lines.join("\n"));
                // From the first item's text up to the trailing newline
                let selection = 3..insert.len() - 1;
                (insert, selection)
            }
        }
    }
}

fn wrap(prefix: &str, text: &str, suffix: &str) -> (String, Range<usize>) {
    let insert = format!("{}{}{}", prefix, text, suffix);
    let selection = prefix.len()..prefix.len() + text.len();
    (insert, selection)
}

/// Blog body being written, with its selection
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Composer {
    buffer: String,
    selection: Range<usize>,
    image_uploading: bool,
}

impl Composer {
    pub fn new(buffer: &str) -> Self {
        let end = buffer.len();
        Self {
            buffer: buffer.to_string(),
            selection: end..end,
            image_uploading: false,
        }
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn selection(&self) -> Range<usize> {
        self.selection.clone()
    }

    pub fn selected_text(&self) -> &str {
        &self.buffer[self.selection.clone()]
    }

    pub fn set_buffer(&mut self, buffer: &str) {
        self.buffer = buffer.to_string();
        let end = self.buffer.len();
        self.selection = end..end;
    }

    /// Move the selection; out-of-range or split-character bounds are rejected
    pub fn select(&mut self, selection: Range<usize>) -> PanelResult<()> {
        let valid = selection.start <= selection.end
            && selection.end <= self.buffer.len()
            && self.buffer.is_char_boundary(selection.start)
            && self.buffer.is_char_boundary(selection.end);

        if !valid {
            return Err(PanelError::Validation(format!(
                "Selection {}..{} is not within the text",
                selection.start, selection.end
            )));
        }

        self.selection = selection;
        Ok(())
    }

    /// Splice the action's markup around the selection (or its placeholder)
    pub fn apply(&mut self, action: ToolbarAction) {
        let range = self.selection.clone();
        let selected = &self.buffer[range.clone()];
        let text = if selected.is_empty() {
            action.placeholder()
        } else {
            selected
        };

        let (insert, inner) = action.render(text);
        self.buffer.replace_range(range.clone(), &insert);
        self.selection = range.start + inner.start..range.start + inner.end;
    }

    pub fn is_image_uploading(&self) -> bool {
        self.image_uploading
    }

    /// Mark an image upload as started; refused while one is running
    pub fn begin_image_upload(&mut self) -> PanelResult<()> {
        if self.image_uploading {
            return Err(PanelError::Conflict(
                "An image is already uploading".to_string(),
            ));
        }
        self.image_uploading = true;
        Ok(())
    }

    /// Finish an image upload, appending the image on success
    pub fn finish_image_upload(&mut self, url: Option<&str>) {
        self.image_uploading = false;
        if let Some(url) = url {
            self.buffer.push_str(&image_snippet(url));
        }
    }
}

/// Markdown appended for an uploaded image
pub fn image_snippet(url: &str) -> String {
    format!("\n![]({})\n", url)
}
