/// Blog reading and admin endpoints
use crate::{
    api::{Created, Identified, UploadFileBody},
    auth::AdminAuthContext,
    browse::{filter_posts, tag_universe},
    compose::image_snippet,
    context::AppContext,
    error::{PanelError, PanelResult},
    models::{BlogEdit, BlogForm, BlogPost},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/blogs", get(list_blogs))
        .route("/api/blogs/:id", get(get_blog))
        .route("/api/admin/blogs", post(create_blog))
        .route("/api/admin/blogs/images", post(upload_image))
        .route("/api/admin/blogs/:id", patch(update_blog).delete(delete_blog))
}

#[derive(Debug, Default, Deserialize)]
pub struct BlogQuery {
    #[serde(default)]
    pub search: String,
    pub tag: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BlogListing {
    pub posts: Vec<Identified<BlogPost>>,
    /// Every tag across all posts, first-seen order
    pub tags: Vec<String>,
}

async fn list_blogs(
    State(ctx): State<AppContext>,
    Query(query): Query<BlogQuery>,
) -> Json<BlogListing> {
    let posts = ctx.sync.blogs();
    let tag = query.tag.as_deref().filter(|t| !t.is_empty());

    Json(BlogListing {
        posts: filter_posts(&posts, &query.search, tag)
            .into_iter()
            .cloned()
            .map(Identified::from)
            .collect(),
        tags: tag_universe(&posts),
    })
}

async fn get_blog(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> PanelResult<Json<Identified<BlogPost>>> {
    ctx.sync
        .blog(&id)
        .map(|post| Json(Identified::from(post)))
        .ok_or_else(|| PanelError::NotFound(format!("Blog post {}", id)))
}

async fn create_blog(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
    Json(form): Json<BlogForm>,
) -> PanelResult<(StatusCode, Json<Created>)> {
    let id = ctx.service.create_blog(&form).await?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

#[derive(Debug, Deserialize)]
pub struct UploadImageRequest {
    pub file: UploadFileBody,
}

#[derive(Debug, Serialize)]
pub struct UploadedImage {
    pub url: String,
    /// Markdown to append to the post body
    pub markdown: String,
}

async fn upload_image(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
    Json(req): Json<UploadImageRequest>,
) -> PanelResult<Json<UploadedImage>> {
    let file = req.file.decode()?;
    let url = ctx.service.upload_blog_image(&file).await?;
    Ok(Json(UploadedImage {
        markdown: image_snippet(&url),
        url,
    }))
}

/// Fields to change; omitted fields keep their current value
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBlogRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags_input: Option<String>,
}

impl UpdateBlogRequest {
    pub fn into_edit(self, current: &BlogPost) -> BlogEdit {
        let mut edit = BlogEdit::from_post(current);
        if let Some(title) = self.title {
            edit.title = title;
        }
        if let Some(content) = self.content {
            edit.content = content;
        }
        if let Some(tags_input) = self.tags_input {
            edit.tags_input = tags_input;
        }
        edit
    }
}

async fn update_blog(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
    Path(id): Path<String>,
    Json(req): Json<UpdateBlogRequest>,
) -> PanelResult<StatusCode> {
    let current = ctx
        .sync
        .blog(&id)
        .ok_or_else(|| PanelError::NotFound(format!("Blog post {}", id)))?;
    let edit = req.into_edit(&current);
    ctx.service.update_blog(&current, &edit).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_blog(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
    Path(id): Path<String>,
) -> PanelResult<StatusCode> {
    ctx.service.delete_blog(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
