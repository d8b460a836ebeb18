/// Exam browsing and admin endpoints
use crate::{
    api::{decode_files, Created, Identified, UploadFileBody},
    auth::AdminAuthContext,
    browse::group_exams,
    context::AppContext,
    error::{PanelError, PanelResult},
    models::{Exam, ExamEdit, ExamForm},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/exams", get(list_exams))
        .route("/api/admin/exams", post(create_exam))
        .route("/api/admin/exams/:id", patch(update_exam).delete(delete_exam))
}

#[derive(Debug, Serialize)]
pub struct SubjectGroup {
    pub subject: String,
    pub exams: Vec<Identified<Exam>>,
}

#[derive(Debug, Serialize)]
pub struct SemesterGroup {
    pub semester: String,
    pub subjects: Vec<SubjectGroup>,
}

/// Exams grouped by semester then subject, both sorted
async fn list_exams(State(ctx): State<AppContext>) -> Json<Vec<SemesterGroup>> {
    let groups = group_exams(&ctx.sync.exams());
    Json(
        groups
            .into_iter()
            .map(|(semester, subjects)| SemesterGroup {
                semester,
                subjects: subjects
                    .into_iter()
                    .map(|(subject, exams)| SubjectGroup {
                        subject,
                        exams: exams.into_iter().map(Identified::from).collect(),
                    })
                    .collect(),
            })
            .collect(),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExamRequest {
    pub semester: String,
    pub subject: String,
    pub exam_name: String,
    #[serde(default)]
    pub answers: String,
    #[serde(default)]
    pub images: Vec<UploadFileBody>,
}

impl CreateExamRequest {
    pub fn into_form(self) -> PanelResult<ExamForm> {
        let mut form = ExamForm {
            semester: self.semester,
            subject: self.subject,
            exam_name: self.exam_name,
            answers: self.answers,
            images: Vec::new(),
        };
        if !self.images.is_empty() {
            form.pick_images(decode_files(self.images)?)?;
        }
        Ok(form)
    }
}

async fn create_exam(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
    Json(req): Json<CreateExamRequest>,
) -> PanelResult<(StatusCode, Json<Created>)> {
    let form = req.into_form()?;
    let id = ctx.service.create_exam(&form).await?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

/// Fields to change; omitted fields keep their current value
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExamRequest {
    pub semester: Option<String>,
    pub subject: Option<String>,
    pub exam_name: Option<String>,
    pub answers: Option<String>,
}

impl UpdateExamRequest {
    pub fn into_edit(self, current: &Exam) -> ExamEdit {
        let mut edit = ExamEdit::from_exam(current);
        if let Some(semester) = self.semester {
            edit.semester = semester;
        }
        if let Some(subject) = self.subject {
            edit.subject = subject;
        }
        if let Some(exam_name) = self.exam_name {
            edit.exam_name = exam_name;
        }
        if let Some(answers) = self.answers {
            edit.answers = answers;
        }
        edit
    }
}

async fn update_exam(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
    Path(id): Path<String>,
    Json(req): Json<UpdateExamRequest>,
) -> PanelResult<StatusCode> {
    let current = ctx
        .sync
        .exam(&id)
        .ok_or_else(|| PanelError::NotFound(format!("Exam {}", id)))?;
    let edit = req.into_edit(&current);
    ctx.service.update_exam(&current, &edit).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_exam(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
    Path(id): Path<String>,
) -> PanelResult<StatusCode> {
    ctx.service.delete_exam(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
