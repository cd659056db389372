/// Registration, profile edit, and password change.
use actix_multipart::Multipart;
use actix_web::{http::header, web, HttpResponse};
use futures_util::StreamExt;

use crate::app_state::AppState;
use crate::db::{profile_repo, user_repo};
use crate::error::{AppError, Result};
use crate::forms::{FormErrors, PasswordChangeForm, ProfileEditForm, RegistrationForm, UserEditForm};
use crate::handlers::{page_context, render};
use crate::metrics::REGISTRATION_TOTAL;
use crate::middleware::{SessionToken, UserId};
use crate::models::{Profile, User};
use crate::security::password;
use crate::services::image_fetch::extension_allowed;
use crate::services::sessions::Flash;
use crate::text::slugify;

async fn render_register(
    state: &AppState,
    form: &RegistrationForm,
    errors: &FormErrors,
) -> Result<HttpResponse> {
    let mut ctx = page_context(state, None, None, "register").await?;
    ctx.insert("form", form);
    ctx.insert("errors", errors);
    render(state, "account/register.html", &ctx)
}

/// GET /account/register/
pub async fn register_page(state: web::Data<AppState>) -> Result<HttpResponse> {
    render_register(&state, &RegistrationForm::default(), &FormErrors::default()).await
}

/// POST /account/register/
///
/// Field validation plus uniqueness checks; on success the user row and
/// its blank profile are created together and the confirmation view is
/// shown.
pub async fn register(
    state: web::Data<AppState>,
    form: web::Form<RegistrationForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    let mut errors = form.form_errors();

    if errors.fields.get("username").is_none()
        && user_repo::username_taken(&state.db, &form.username).await?
    {
        errors.add_field("username", "A user with that username already exists.");
    }
    if errors.fields.get("email").is_none()
        && user_repo::email_taken(&state.db, &form.email, None).await?
    {
        errors.add_field("email", "A user with that email address already exists.");
    }

    if !errors.is_empty() {
        REGISTRATION_TOTAL.with_label_values(&["failed"]).inc();
        return render_register(&state, &form, &errors).await;
    }

    let password_hash = password::hash_password(&form.password)?;
    let user = user_repo::create_with_profile(
        &state.db,
        &form.username,
        &form.email,
        &form.first_name,
        &password_hash,
    )
    .await?;

    REGISTRATION_TOTAL.with_label_values(&["success"]).inc();
    tracing::info!(user_id = %user.id, "user registered");

    let mut ctx = page_context(&state, None, None, "register").await?;
    ctx.insert("new_user", &user);
    render(&state, "account/register_done.html", &ctx)
}

async fn render_edit(
    state: &AppState,
    user: &User,
    profile: &Profile,
    token: &str,
    user_form: &UserEditForm,
    profile_form: &ProfileEditForm,
    user_errors: &FormErrors,
    profile_errors: &FormErrors,
) -> Result<HttpResponse> {
    let mut ctx = page_context(state, Some(user), Some(token), "edit").await?;
    ctx.insert("profile", profile);
    ctx.insert("user_form", user_form);
    ctx.insert("profile_form", profile_form);
    ctx.insert("user_errors", user_errors);
    ctx.insert("profile_errors", profile_errors);
    render(state, "account/edit.html", &ctx)
}

async fn load_user_and_profile(state: &AppState, user_id: UserId) -> Result<(User, Profile)> {
    let user = user_repo::find_by_id(&state.db, user_id.0)
        .await?
        .ok_or_else(|| AppError::Authentication("Unknown session user".to_string()))?;
    let profile = profile_repo::find_by_user(&state.db, user.id)
        .await?
        .ok_or_else(|| AppError::Internal("Profile missing for user".to_string()))?;
    Ok((user, profile))
}

/// GET /account/edit/
pub async fn edit_page(
    state: web::Data<AppState>,
    user_id: UserId,
    token: SessionToken,
) -> Result<HttpResponse> {
    let (user, profile) = load_user_and_profile(&state, user_id).await?;

    let user_form = UserEditForm {
        first_name: user.first_name.clone(),
        email: user.email.clone(),
    };
    let profile_form = ProfileEditForm {
        date_of_birth: profile
            .date_of_birth
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
    };

    render_edit(
        &state,
        &user,
        &profile,
        &token.0,
        &user_form,
        &profile_form,
        &FormErrors::default(),
        &FormErrors::default(),
    )
    .await
}

struct EditSubmission {
    user_form: UserEditForm,
    profile_form: ProfileEditForm,
    photo: Option<(String, Vec<u8>)>,
}

async fn read_edit_submission(mut payload: Multipart) -> Result<EditSubmission> {
    let mut user_form = UserEditForm::default();
    let mut profile_form = ProfileEditForm::default();
    let mut photo: Option<(String, Vec<u8>)> = None;

    while let Some(field) = payload.next().await {
        let mut field =
            field.map_err(|e| AppError::BadRequest(format!("Multipart error: {e}")))?;

        let name = field.name().to_string();
        let filename = field
            .content_disposition()
            .get_filename()
            .map(|f| f.to_string());

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| AppError::BadRequest(format!("Read error: {e}")))?;
            data.extend_from_slice(&chunk);
        }

        match name.as_str() {
            "first_name" => user_form.first_name = String::from_utf8_lossy(&data).into_owned(),
            "email" => user_form.email = String::from_utf8_lossy(&data).into_owned(),
            "date_of_birth" => {
                profile_form.date_of_birth = String::from_utf8_lossy(&data).into_owned()
            }
            "photo" => {
                if let Some(filename) = filename {
                    if !filename.is_empty() && !data.is_empty() {
                        photo = Some((filename, data));
                    }
                }
            }
            _ => {}
        }
    }

    Ok(EditSubmission {
        user_form,
        profile_form,
        photo,
    })
}

/// POST /account/edit/
///
/// Both sub-forms must validate before either is persisted; success and
/// failure each leave a distinct flash notification.
pub async fn edit(
    state: web::Data<AppState>,
    user_id: UserId,
    token: SessionToken,
    payload: Multipart,
) -> Result<HttpResponse> {
    let (user, profile) = load_user_and_profile(&state, user_id).await?;
    let submission = read_edit_submission(payload).await?;

    let mut user_errors = submission.user_form.form_errors();
    let mut profile_errors = submission.profile_form.form_errors();

    if user_errors.fields.get("email").is_none()
        && user_repo::email_taken(&state.db, &submission.user_form.email, Some(user.id)).await?
    {
        user_errors.add_field("email", "A user with that email address already exists.");
    }

    let photo_extension = submission.photo.as_ref().map(|(filename, _)| {
        filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default()
    });
    if let Some(ext) = &photo_extension {
        if !extension_allowed(ext) {
            profile_errors.add_field("photo", "Upload a valid image (jpg, jpeg or png).");
        }
    }

    if !user_errors.is_empty() || !profile_errors.is_empty() {
        state
            .sessions
            .push_flash(&token.0, Flash::error("Error updating your profile"))
            .await?;
        return render_edit(
            &state,
            &user,
            &profile,
            &token.0,
            &submission.user_form,
            &submission.profile_form,
            &user_errors,
            &profile_errors,
        )
        .await;
    }

    let photo_path = match (&submission.photo, &photo_extension) {
        (Some((_, bytes)), Some(ext)) => Some(
            state
                .fetcher
                .store_photo(&slugify(&user.username), ext, bytes)
                .await?,
        ),
        _ => None,
    };

    let date_of_birth = submission
        .profile_form
        .parsed_date()
        .map_err(|_| AppError::Validation("Invalid date".to_string()))?;

    let user = user_repo::update_account_fields(
        &state.db,
        user.id,
        &submission.user_form.first_name,
        &submission.user_form.email,
    )
    .await?;
    let profile =
        profile_repo::update(&state.db, user.id, date_of_birth, photo_path.as_deref()).await?;

    state
        .sessions
        .push_flash(&token.0, Flash::success("Profile updated successfully"))
        .await?;
    tracing::info!(user_id = %user.id, "profile updated");

    render_edit(
        &state,
        &user,
        &profile,
        &token.0,
        &submission.user_form,
        &submission.profile_form,
        &FormErrors::default(),
        &FormErrors::default(),
    )
    .await
}

async fn render_password_change(
    state: &AppState,
    user: &User,
    token: &str,
    errors: &FormErrors,
) -> Result<HttpResponse> {
    let mut ctx = page_context(state, Some(user), Some(token), "password_change").await?;
    ctx.insert("errors", errors);
    render(state, "account/password_change.html", &ctx)
}

/// GET /account/password-change/
pub async fn password_change_page(
    state: web::Data<AppState>,
    user_id: UserId,
    token: SessionToken,
) -> Result<HttpResponse> {
    let (user, _) = load_user_and_profile(&state, user_id).await?;
    render_password_change(&state, &user, &token.0, &FormErrors::default()).await
}

/// POST /account/password-change/
///
/// Verifies the current password, stores the new hash, and invalidates
/// every other session of the account.
pub async fn password_change(
    state: web::Data<AppState>,
    user_id: UserId,
    token: SessionToken,
    form: web::Form<PasswordChangeForm>,
) -> Result<HttpResponse> {
    let (user, _) = load_user_and_profile(&state, user_id).await?;
    let form = form.into_inner();
    let mut errors = form.form_errors();

    if errors.fields.get("old_password").is_none()
        && !password::verify_password(&form.old_password, &user.password_hash)
    {
        errors.add_field("old_password", "Your old password was entered incorrectly.");
    }

    if !errors.is_empty() {
        return render_password_change(&state, &user, &token.0, &errors).await;
    }

    let new_hash = password::hash_password(&form.new_password1)?;
    user_repo::update_password(&state.db, user.id, &new_hash).await?;
    state
        .sessions
        .destroy_other_sessions(user.id, &token.0)
        .await?;

    state
        .sessions
        .push_flash(&token.0, Flash::success("Password changed successfully"))
        .await?;
    tracing::info!(user_id = %user.id, "password changed");

    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, "/"))
        .finish())
}
