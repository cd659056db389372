/// Form parsing and validation. Each form mirrors one submission surface
/// and reports field-level errors that the templates render back inline.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

use crate::services::image_fetch::extension_allowed;
use crate::text::url_extension;

/// Field-level and form-level validation errors.
#[derive(Debug, Default, Clone, Serialize)]
pub struct FormErrors {
    pub fields: BTreeMap<String, Vec<String>>,
    pub non_field: Vec<String>,
}

impl FormErrors {
    pub fn add_field(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn add_non_field(&mut self, message: impl Into<String>) {
        self.non_field.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.non_field.is_empty()
    }

    fn absorb(&mut self, result: Result<(), validator::ValidationErrors>) {
        let Err(errors) = result else { return };
        for (field, field_errors) in errors.field_errors() {
            for error in field_errors {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Enter a valid value.".to_string());
                self.add_field(field, message);
            }
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct LoginForm {
    #[validate(length(min = 1, message = "This field is required."))]
    #[serde(default)]
    pub username: String,

    #[validate(length(min = 1, message = "This field is required."))]
    #[serde(default)]
    pub password: String,

    /// Carried through the form so a successful login can bounce back to
    /// the originally requested page.
    #[serde(default)]
    pub next: String,
}

impl LoginForm {
    pub fn form_errors(&self) -> FormErrors {
        let mut errors = FormErrors::default();
        errors.absorb(self.validate());
        errors
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct RegistrationForm {
    #[validate(length(min = 3, max = 150, message = "Username must be 3-150 characters."))]
    #[serde(default)]
    pub username: String,

    #[validate(length(max = 150, message = "First name is too long."))]
    #[serde(default)]
    pub first_name: String,

    #[validate(email(message = "Enter a valid email address."))]
    #[serde(default)]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters."))]
    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub password2: String,
}

impl RegistrationForm {
    pub fn form_errors(&self) -> FormErrors {
        let mut errors = FormErrors::default();
        errors.absorb(self.validate());

        if !self
            .username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "@.+-_".contains(c))
        {
            errors.add_field(
                "username",
                "Username may contain letters, digits and @.+-_ only.",
            );
        }

        if self.password != self.password2 {
            errors.add_field("password2", "Passwords don't match.");
        }

        errors
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct UserEditForm {
    #[validate(length(max = 150, message = "First name is too long."))]
    #[serde(default)]
    pub first_name: String,

    #[validate(email(message = "Enter a valid email address."))]
    #[serde(default)]
    pub email: String,
}

impl UserEditForm {
    pub fn form_errors(&self) -> FormErrors {
        let mut errors = FormErrors::default();
        errors.absorb(self.validate());
        errors
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProfileEditForm {
    /// ISO date (`YYYY-MM-DD`) or empty.
    #[serde(default)]
    pub date_of_birth: String,
}

impl ProfileEditForm {
    pub fn parsed_date(&self) -> Result<Option<NaiveDate>, ()> {
        let raw = self.date_of_birth.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| ())
    }

    pub fn form_errors(&self) -> FormErrors {
        let mut errors = FormErrors::default();
        if self.parsed_date().is_err() {
            errors.add_field("date_of_birth", "Enter a valid date.");
        }
        errors
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct ImageCreateForm {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters."))]
    #[serde(default)]
    pub title: String,

    #[validate(length(min = 1, max = 2000, message = "This field is required."))]
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub description: String,
}

impl ImageCreateForm {
    pub fn form_errors(&self) -> FormErrors {
        let mut errors = FormErrors::default();
        errors.absorb(self.validate());

        if !self.url.is_empty() {
            let allowed = url_extension(&self.url)
                .map(|ext| extension_allowed(&ext))
                .unwrap_or(false);
            if !allowed {
                errors.add_field(
                    "url",
                    "The given URL does not match valid image extensions.",
                );
            }
        }

        errors
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct PasswordChangeForm {
    #[validate(length(min = 1, message = "This field is required."))]
    #[serde(default)]
    pub old_password: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters."))]
    #[serde(default)]
    pub new_password1: String,

    #[serde(default)]
    pub new_password2: String,
}

impl PasswordChangeForm {
    pub fn form_errors(&self) -> FormErrors {
        let mut errors = FormErrors::default();
        errors.absorb(self.validate());

        if self.new_password1 != self.new_password2 {
            errors.add_field("new_password2", "Passwords don't match.");
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_requires_both_fields() {
        let form = LoginForm {
            username: "alice".into(),
            password: "".into(),
            next: String::new(),
        };
        let errors = form.form_errors();
        assert!(errors.fields.contains_key("password"));
        assert!(!errors.fields.contains_key("username"));
    }

    #[test]
    fn registration_rejects_password_mismatch() {
        let form = RegistrationForm {
            username: "alice".into(),
            first_name: "Alice".into(),
            email: "alice@example.com".into(),
            password: "letmein-please".into(),
            password2: "letmein-pls".into(),
        };
        let errors = form.form_errors();
        assert_eq!(
            errors.fields.get("password2").unwrap(),
            &vec!["Passwords don't match.".to_string()]
        );
    }

    #[test]
    fn registration_rejects_bad_email_and_username() {
        let form = RegistrationForm {
            username: "al ice".into(),
            email: "not-an-email".into(),
            password: "letmein-please".into(),
            password2: "letmein-please".into(),
            ..Default::default()
        };
        let errors = form.form_errors();
        assert!(errors.fields.contains_key("email"));
        assert!(errors.fields.contains_key("username"));
    }

    #[test]
    fn registration_accepts_valid_submission() {
        let form = RegistrationForm {
            username: "alice".into(),
            first_name: "Alice".into(),
            email: "alice@example.com".into(),
            password: "letmein-please".into(),
            password2: "letmein-please".into(),
        };
        assert!(form.form_errors().is_empty());
    }

    #[test]
    fn image_form_enforces_extension_allow_list() {
        for url in [
            "https://example.com/a.jpg",
            "https://example.com/a.JPEG",
            "https://example.com/a.png",
        ] {
            let form = ImageCreateForm {
                title: "A title".into(),
                url: url.into(),
                description: String::new(),
            };
            assert!(form.form_errors().is_empty(), "{url} should validate");
        }

        let form = ImageCreateForm {
            title: "A title".into(),
            url: "https://example.com/a.gif".into(),
            description: String::new(),
        };
        let errors = form.form_errors();
        assert_eq!(
            errors.fields.get("url").unwrap(),
            &vec!["The given URL does not match valid image extensions.".to_string()]
        );
    }

    #[test]
    fn image_form_rejects_url_without_extension() {
        let form = ImageCreateForm {
            title: "A title".into(),
            url: "https://example,com/noext".into(),
            description: String::new(),
        };
        assert!(form.form_errors().fields.contains_key("url"));
    }

    #[test]
    fn profile_form_parses_iso_dates() {
        let form = ProfileEditForm {
            date_of_birth: "1990-05-17".into(),
        };
        assert!(form.form_errors().is_empty());
        assert_eq!(
            form.parsed_date().unwrap(),
            NaiveDate::from_ymd_opt(1990, 5, 17)
        );

        let empty = ProfileEditForm::default();
        assert_eq!(empty.parsed_date().unwrap(), None);

        let bad = ProfileEditForm {
            date_of_birth: "17/05/1990".into(),
        };
        assert!(bad.form_errors().fields.contains_key("date_of_birth"));
    }

    #[test]
    fn password_change_checks_match() {
        let form = PasswordChangeForm {
            old_password: "old-password".into(),
            new_password1: "new-password-1".into(),
            new_password2: "new-password-2".into(),
        };
        assert!(form.form_errors().fields.contains_key("new_password2"));
    }
}
