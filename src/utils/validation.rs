use crate::error::{AppError, FieldErrors};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9][0-9 \-]{5,19}$").expect("valid phone regex"));

/// Request payloads that check themselves before any database work.
pub trait Validate {
    fn validate(&self, errors: &mut FieldErrors);

    fn check(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        self.validate(&mut errors);
        errors.into_result()
    }
}

pub fn require_text(errors: &mut FieldErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.add(field, "must not be empty");
    }
}

pub fn optional_text(errors: &mut FieldErrors, field: &str, value: Option<&str>) {
    if let Some(v) = value {
        require_text(errors, field, v);
    }
}

pub fn max_len(errors: &mut FieldErrors, field: &str, value: &str, max: usize) {
    if value.chars().count() > max {
        errors.add(field, format!("must be at most {} characters", max));
    }
}

pub fn email(errors: &mut FieldErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.add(field, "must not be empty");
    } else if !EMAIL_RE.is_match(value.trim()) {
        errors.add(field, "must be a valid email address");
    }
}

pub fn phone(errors: &mut FieldErrors, field: &str, value: Option<&str>) {
    if let Some(v) = value {
        if !PHONE_RE.is_match(v.trim()) {
            errors.add(field, "must be a valid phone number");
        }
    }
}

pub fn non_negative(errors: &mut FieldErrors, field: &str, value: Option<f64>) {
    if let Some(v) = value {
        if !v.is_finite() || v < 0.0 {
            errors.add(field, "must be a non-negative number");
        }
    }
}

/// `end` may equal `start` (single-day ranges are inclusive).
pub fn date_range(
    errors: &mut FieldErrors,
    start_field: &str,
    start: NaiveDate,
    end_field: &str,
    end: NaiveDate,
) {
    if end < start {
        errors.add(end_field, format!("must not be before {}", start_field));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_rules() {
        let mut errors = FieldErrors::new();
        email(&mut errors, "a", "jane@company.com");
        email(&mut errors, "b", "jane.company.com");
        email(&mut errors, "c", "  ");

        assert!(errors.get("a").is_none());
        assert_eq!(errors.get("b").unwrap()[0], "must be a valid email address");
        assert_eq!(errors.get("c").unwrap()[0], "must not be empty");
    }

    #[test]
    fn phone_is_optional_but_checked() {
        let mut errors = FieldErrors::new();
        phone(&mut errors, "phone", None);
        phone(&mut errors, "phone", Some("+8801712345678"));
        assert!(errors.is_empty());

        phone(&mut errors, "phone", Some("call me"));
        assert!(errors.get("phone").is_some());
    }

    #[test]
    fn same_day_range_is_valid() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let mut errors = FieldErrors::new();
        date_range(&mut errors, "start_date", d, "end_date", d);
        assert!(errors.is_empty());

        date_range(&mut errors, "start_date", d, "end_date", d.pred_opt().unwrap());
        assert_eq!(
            errors.get("end_date").unwrap()[0],
            "must not be before start_date"
        );
    }

    #[test]
    fn negative_rates_rejected() {
        let mut errors = FieldErrors::new();
        non_negative(&mut errors, "hourly_rate", Some(-1.0));
        non_negative(&mut errors, "bonus", Some(f64::NAN));
        non_negative(&mut errors, "deductions", Some(0.0));

        assert!(errors.get("hourly_rate").is_some());
        assert!(errors.get("bonus").is_some());
        assert!(errors.get("deductions").is_none());
    }
}
