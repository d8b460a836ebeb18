/// Semester/subject-scoped exams with answer keys
use crate::{
    error::{PanelError, PanelResult},
    media::{self, UploadFile},
    models::{Collection, Entity},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Exam record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    #[serde(skip)]
    pub id: String,
    #[serde(default)]
    pub semester: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub exam_name: String,
    #[serde(default)]
    pub answers: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub created_at: i64,
}

impl Entity for Exam {
    const COLLECTION: Collection = Collection::Exams;

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

/// Exam creation form
#[derive(Debug, Clone, Default)]
pub struct ExamForm {
    pub semester: String,
    pub subject: String,
    pub exam_name: String,
    pub answers: String,
    pub images: Vec<UploadFile>,
}

impl ExamForm {
    /// Keep only image files; reject the pick if none remain
    pub fn pick_images(&mut self, files: Vec<UploadFile>) -> PanelResult<()> {
        self.images = media::admit_images(files)?;
        Ok(())
    }

    pub fn is_submittable(&self) -> bool {
        !self.semester.trim().is_empty()
            && !self.subject.trim().is_empty()
            && !self.exam_name.trim().is_empty()
    }

    pub fn build(&self, image_urls: Vec<String>, created_at: i64) -> PanelResult<Exam> {
        if !self.is_submittable() {
            return Err(PanelError::Validation(
                "Semester, subject and exam name are required".to_string(),
            ));
        }

        Ok(Exam {
            id: String::new(),
            semester: self.semester.trim().to_string(),
            subject: self.subject.trim().to_string(),
            exam_name: self.exam_name.trim().to_string(),
            answers: self.answers.trim().to_string(),
            image_urls,
            created_at,
        })
    }
}

/// Exam edit form. Images cannot be changed after creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExamEdit {
    pub semester: String,
    pub subject: String,
    pub exam_name: String,
    pub answers: String,
}

impl ExamEdit {
    pub fn from_exam(exam: &Exam) -> Self {
        Self {
            semester: exam.semester.clone(),
            subject: exam.subject.clone(),
            exam_name: exam.exam_name.clone(),
            answers: exam.answers.clone(),
        }
    }

    /// Empty labels keep the current value; answers are always replaced
    pub fn patch(&self, current: &Exam) -> Map<String, Value> {
        let keep = |input: &str, existing: &str| {
            let trimmed = input.trim();
            if trimmed.is_empty() {
                existing.to_string()
            } else {
                trimmed.to_string()
            }
        };

        let mut patch = Map::new();
        patch.insert(
            "semester".into(),
            Value::String(keep(&self.semester, &current.semester)),
        );
        patch.insert(
            "subject".into(),
            Value::String(keep(&self.subject, &current.subject)),
        );
        patch.insert(
            "examName".into(),
            Value::String(keep(&self.exam_name, &current.exam_name)),
        );
        patch.insert(
            "answers".into(),
            Value::String(self.answers.trim().to_string()),
        );
        patch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StoredRecord;
    use serde_json::json;

    #[test]
    fn test_decode_tolerates_missing_labels() {
        let record = StoredRecord {
            id: "e1".into(),
            fields: json!({"examName": "Final", "createdAt": 3})
                .as_object()
                .unwrap()
                .clone(),
        };
        let exam = Exam::from_record(&record).unwrap();
        assert_eq!(exam.semester, "");
        assert!(exam.image_urls.is_empty());
        assert_eq!(exam.created_at, 3);
    }

    #[test]
    fn test_form_requires_labels() {
        let mut form = ExamForm {
            semester: "S1".into(),
            subject: " ".into(),
            exam_name: "Midterm".into(),
            ..Default::default()
        };
        assert!(!form.is_submittable());

        form.subject = "M1".into();
        let exam = form.build(vec!["https://h/p1.png".into()], 7).unwrap();
        assert_eq!(exam.subject, "M1");
        assert_eq!(exam.answers, "");
        assert_eq!(exam.image_urls.len(), 1);
    }

    #[test]
    fn test_edit_keeps_labels_when_blank() {
        let exam = ExamForm {
            semester: "S1".into(),
            subject: "M1".into(),
            exam_name: "Midterm".into(),
            answers: "1A 2B".into(),
            images: Vec::new(),
        }
        .build(Vec::new(), 1)
        .unwrap();

        let edit = ExamEdit {
            semester: "".into(),
            subject: "M2".into(),
            exam_name: " ".into(),
            answers: "".into(),
        };
        let patch = edit.patch(&exam);
        assert_eq!(patch.get("semester"), Some(&json!("S1")));
        assert_eq!(patch.get("subject"), Some(&json!("M2")));
        assert_eq!(patch.get("examName"), Some(&json!("Midterm")));
        assert_eq!(patch.get("answers"), Some(&json!("")));
        assert!(patch.get("imageUrls").is_none());
    }
}
