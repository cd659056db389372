/// Image bookmarking: paginated listing, URL-backed creation, detail view,
/// and the like/unlike toggle.
use actix_web::{http::header, web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::{image_repo, user_repo};
use crate::error::{AppError, Result};
use crate::forms::{FormErrors, ImageCreateForm};
use crate::handlers::{page_context, render, resolve_session};
use crate::metrics::{IMAGES_CREATED_TOTAL, LIKE_EVENTS_TOTAL};
use crate::middleware::{SessionToken, UserId};
use crate::pagination::{Paginator, IMAGES_PER_PAGE};
use crate::services::sessions::Flash;
use crate::text::{slugify, url_extension};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub images_only: Option<String>,
}

/// GET /images/
///
/// Newest-first listing, 8 per page. A non-integer `page` falls back to
/// page 1 and an out-of-range page to the last one -- unless the request
/// asks for the grid fragment only (`images_only`), in which case an
/// out-of-range page yields an empty body so the infinite scroll knows it
/// reached the end.
pub async fn image_list(
    state: web::Data<AppState>,
    user_id: UserId,
    token: SessionToken,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse> {
    let fragment_only = query.images_only.is_some();

    let total = image_repo::count(&state.db).await?;
    let selection = Paginator::new(total, IMAGES_PER_PAGE).select(query.page.as_deref());

    if selection.out_of_range && fragment_only {
        return Ok(HttpResponse::Ok().body(""));
    }

    let images = image_repo::page(
        &state.db,
        selection.page.limit(),
        selection.page.offset(),
    )
    .await?;

    let user = user_repo::find_by_id(&state.db, user_id.0)
        .await?
        .ok_or_else(|| AppError::Authentication("Unknown session user".to_string()))?;

    let mut ctx = page_context(&state, Some(&user), Some(&token.0), "images").await?;
    ctx.insert("images", &images);
    ctx.insert("page", &selection.page);

    let template = if fragment_only {
        "images/list_images.html"
    } else {
        "images/list.html"
    };
    render(&state, template, &ctx)
}

async fn render_create(
    state: &AppState,
    user_id: UserId,
    token: &str,
    form: &ImageCreateForm,
    errors: &FormErrors,
) -> Result<HttpResponse> {
    let user = user_repo::find_by_id(&state.db, user_id.0)
        .await?
        .ok_or_else(|| AppError::Authentication("Unknown session user".to_string()))?;

    let mut ctx = page_context(state, Some(&user), Some(token), "images").await?;
    ctx.insert("form", form);
    ctx.insert("errors", errors);
    render(state, "images/create.html", &ctx)
}

/// GET /images/create/
///
/// The form arrives pre-filled from the query string (bookmarklet style:
/// `?title=...&url=...`), with the URL as a hidden field.
pub async fn create_page(
    state: web::Data<AppState>,
    user_id: UserId,
    token: SessionToken,
    query: web::Query<ImageCreateForm>,
) -> Result<HttpResponse> {
    render_create(&state, user_id, &token.0, &query, &FormErrors::default()).await
}

/// POST /images/create/
///
/// Validates the extension allow-list, fetches the remote bytes within
/// this request, stores them under the media root, and persists the
/// bookmark with the caller as owner. A failed fetch is reported as a
/// form error rather than a hard failure.
pub async fn create(
    state: web::Data<AppState>,
    user_id: UserId,
    token: SessionToken,
    form: web::Form<ImageCreateForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    let mut errors = form.form_errors();
    if !errors.is_empty() {
        return render_create(&state, user_id, &token.0, &form, &errors).await;
    }

    let slug = slugify(&form.title);
    // Validated above, so the extension is present and allow-listed.
    let extension = url_extension(&form.url)
        .ok_or_else(|| AppError::Validation("URL has no extension".to_string()))?;

    let image_path = match state.fetcher.fetch_and_store(&form.url, &slug, &extension).await {
        Ok(path) => path,
        Err(AppError::BadRequest(message)) => {
            IMAGES_CREATED_TOTAL
                .with_label_values(&["fetch_failed"])
                .inc();
            errors.add_non_field(message);
            return render_create(&state, user_id, &token.0, &form, &errors).await;
        }
        Err(other) => return Err(other),
    };

    let image = image_repo::insert(
        &state.db,
        image_repo::NewImage {
            user_id: user_id.0,
            title: &form.title,
            slug: &slug,
            url: &form.url,
            image_path: &image_path,
            description: &form.description,
        },
    )
    .await?;

    IMAGES_CREATED_TOTAL.with_label_values(&["success"]).inc();
    tracing::info!(image_id = %image.id, user_id = %user_id.0, "image bookmarked");

    state
        .sessions
        .push_flash(&token.0, Flash::success("Image added successfully"))
        .await?;

    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, image.absolute_url()))
        .finish())
}

/// GET /images/detail/{id}/{slug}/
///
/// The slug segment must match the stored one, otherwise 404. The route is
/// public, but a logged-in caller still gets their header, pending flashes
/// (the create flow redirects here), and the correct like-button state.
pub async fn detail(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<(Uuid, String)>,
) -> Result<HttpResponse> {
    let (id, slug) = path.into_inner();

    let image = image_repo::find_by_id(&state.db, id)
        .await?
        .filter(|image| image.slug == slug)
        .ok_or_else(|| AppError::NotFound("No image found matching the query".to_string()))?;

    let like_count = image_repo::like_count(&state.db, image.id).await?;
    let likers = image_repo::liker_usernames(&state.db, image.id, 20).await?;
    let owner = user_repo::find_by_id(&state.db, image.user_id).await?;

    let session = resolve_session(&state, &req).await?;
    let viewer_likes = match &session {
        Some((viewer, _)) => image_repo::user_likes(&state.db, viewer.id, image.id).await?,
        None => false,
    };

    let mut ctx = match &session {
        Some((viewer, token)) => {
            page_context(&state, Some(viewer), Some(token.as_str()), "images").await?
        }
        None => page_context(&state, None, None, "images").await?,
    };
    ctx.insert("image", &image);
    ctx.insert("like_count", &like_count);
    ctx.insert("likers", &likers);
    ctx.insert("owner", &owner);
    ctx.insert("viewer_likes", &viewer_likes);
    render(&state, "images/detail.html", &ctx)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeAction {
    Like,
    Unlike,
}

pub(crate) fn parse_like_action(raw: &str) -> Option<LikeAction> {
    match raw {
        "like" => Some(LikeAction::Like),
        "unlike" => Some(LikeAction::Unlike),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
pub struct LikeForm {
    pub id: Option<String>,
    pub action: Option<String>,
}

/// POST /images/like/
///
/// Toggles the caller's membership in the image's liker set. Every
/// outcome is an HTTP 200 with a JSON status payload; failure cases carry
/// a distinct `message`.
pub async fn like(
    state: web::Data<AppState>,
    user_id: UserId,
    form: web::Form<LikeForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();

    let (Some(raw_id), Some(raw_action)) = (form.id, form.action) else {
        return Ok(HttpResponse::Ok().json(json!({
            "status": "error",
            "message": "Missing image ID or action",
        })));
    };

    let image = match Uuid::parse_str(&raw_id) {
        Ok(id) => image_repo::find_by_id(&state.db, id).await?,
        Err(_) => None,
    };
    let Some(image) = image else {
        return Ok(HttpResponse::Ok().json(json!({
            "status": "error",
            "message": "Image does not exist",
        })));
    };

    let Some(action) = parse_like_action(&raw_action) else {
        return Ok(HttpResponse::Ok().json(json!({
            "status": "error",
            "message": "Invalid action",
        })));
    };

    match action {
        LikeAction::Like => {
            image_repo::like(&state.db, user_id.0, image.id).await?;
            LIKE_EVENTS_TOTAL.with_label_values(&["like"]).inc();
        }
        LikeAction::Unlike => {
            image_repo::unlike(&state.db, user_id.0, image.id).await?;
            LIKE_EVENTS_TOTAL.with_label_values(&["unlike"]).inc();
        }
    }

    Ok(HttpResponse::Ok().json(json!({"status": "ok"})))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_action_parsing() {
        assert_eq!(parse_like_action("like"), Some(LikeAction::Like));
        assert_eq!(parse_like_action("unlike"), Some(LikeAction::Unlike));
        assert_eq!(parse_like_action("dislike"), None);
    }
}
