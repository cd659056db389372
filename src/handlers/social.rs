/// Follow/unfollow toggle endpoint.
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::{contact_repo, user_repo};
use crate::error::Result;
use crate::metrics::FOLLOW_EVENTS_TOTAL;
use crate::middleware::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowAction {
    Follow,
    Unfollow,
}

pub(crate) fn parse_follow_action(raw: &str) -> Option<FollowAction> {
    match raw {
        "follow" => Some(FollowAction::Follow),
        "unfollow" => Some(FollowAction::Unfollow),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
pub struct FollowForm {
    pub id: Option<String>,
    pub action: Option<String>,
}

/// POST /user_follow/
///
/// Creates or deletes the follow edge for the caller. Both directions are
/// idempotent. An unknown target id is a 404; a malformed request gets the
/// soft `{"status":"error"}` payload.
pub async fn user_follow(
    state: web::Data<AppState>,
    user_id: UserId,
    form: web::Form<FollowForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();

    let (Some(raw_id), Some(raw_action)) = (form.id, form.action) else {
        return Ok(HttpResponse::Ok().json(json!({"status": "error"})));
    };

    let Some(action) = parse_follow_action(&raw_action) else {
        return Ok(HttpResponse::Ok().json(json!({"status": "error"})));
    };

    let Ok(target_id) = Uuid::parse_str(&raw_id) else {
        return Ok(HttpResponse::NotFound().json(json!({"status": "error"})));
    };

    if !user_repo::exists(&state.db, target_id).await? {
        return Ok(HttpResponse::NotFound().json(json!({"status": "error"})));
    }

    match action {
        FollowAction::Follow => {
            contact_repo::follow(&state.db, user_id.0, target_id).await?;
            FOLLOW_EVENTS_TOTAL.with_label_values(&["follow"]).inc();
        }
        FollowAction::Unfollow => {
            contact_repo::unfollow(&state.db, user_id.0, target_id).await?;
            FOLLOW_EVENTS_TOTAL.with_label_values(&["unfollow"]).inc();
        }
    }

    Ok(HttpResponse::Ok().json(json!({"status": "ok"})))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_parsing() {
        assert_eq!(parse_follow_action("follow"), Some(FollowAction::Follow));
        assert_eq!(parse_follow_action("unfollow"), Some(FollowAction::Unfollow));
        assert_eq!(parse_follow_action("FOLLOW"), None);
        assert_eq!(parse_follow_action(""), None);
    }
}
