//! Notification formatter — message record to human-readable text.
//!
//! Formatting never blocks delivery: any internal failure degrades to a
//! one-line fallback instead of propagating.

use std::sync::OnceLock;

use chrono::DateTime;
use regex::Regex;

use crate::mailbox::MailMessage;

/// Maximum characters of body included in the preview.
const EXCERPT_CHARS: usize = 180;

/// Render a notification for an important message.
pub fn format_notification(msg: &MailMessage) -> String {
    try_format(msg)
        .unwrap_or_else(|| format!("New email from {}: {}", msg.sender, msg.subject))
}

fn try_format(msg: &MailMessage) -> Option<String> {
    let received = DateTime::from_timestamp_millis(msg.received_at_millis)?;
    let time = received.format("%Y-%m-%d %H:%M:%S");

    let mut out = String::new();
    out.push_str("📬 New Important Email\n\n");
    out.push_str(&format!("From: {}\n", msg.sender));
    out.push_str(&format!("Subject: {}\n", msg.subject));
    out.push_str(&format!("Time: {time}\n"));

    let details = extract_job_details(&msg.body);
    if let Some(position) = details.position {
        out.push_str(&format!("Position: {position}\n"));
    }
    if let Some(company) = details.company {
        out.push_str(&format!("Company: {company}\n"));
    }
    if let Some(location) = details.location {
        out.push_str(&format!("Location: {location}\n"));
    }
    if let Some(salary) = details.salary {
        out.push_str(&format!("Salary: {salary}\n"));
    }

    out.push_str(&format!("\nPreview:\n{}", excerpt(&msg.body, EXCERPT_CHARS)));
    Some(out)
}

/// Bounded, char-boundary-safe body excerpt with an ellipsis when cut.
pub(crate) fn excerpt(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    let mut taken: String = trimmed.chars().take(max_chars).collect();
    if trimmed.chars().count() > max_chars {
        taken.push('…');
    }
    taken
}

// ── Best-effort job-detail extraction ───────────────────────────────

/// Structured fields pattern-mined from the body. All optional; absent
/// fields are omitted from the notification, never rendered empty.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct JobDetails {
    pub position: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub salary: Option<String>,
}

fn position_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:position|role|job title)\s*[:\-]\s*([^\n.;,]{2,60})")
            .expect("static regex")
    })
}

fn company_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:company|employer)\s*[:\-]\s*([^\n.;,]{2,60})").expect("static regex")
    })
}

fn location_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\blocation\s*[:\-]\s*([^\n.;]{2,60})").expect("static regex")
    })
}

fn salary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:salary|compensation)\s*[:\-]\s*([^\n.;]{2,60})")
            .expect("static regex")
    })
}

fn money_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[$€£]\s?\d[\d,]*(?:k|K)?(?:\s*[-–]\s*[$€£]?\s?\d[\d,]*(?:k|K)?)?")
            .expect("static regex")
    })
}

/// Pattern-mine position/company/location/salary from a body.
pub fn extract_job_details(body: &str) -> JobDetails {
    let capture = |re: &Regex| {
        re.captures(body)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
    };

    let salary = capture(salary_re()).or_else(|| {
        money_re().find(body).map(|m| m.as_str().trim().to_string())
    });

    JobDetails {
        position: capture(position_re()),
        company: capture(company_re()),
        location: capture(location_re()),
        salary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_with_body(body: &str) -> MailMessage {
        MailMessage {
            body: body.to_string(),
            received_at_millis: 1_754_600_000_000,
            ..MailMessage::stub("m-1", "hr@corp.com", "Interview invitation")
        }
    }

    #[test]
    fn includes_sender_subject_and_time() {
        let text = format_notification(&message_with_body("Please join us Monday."));
        assert!(text.contains("From: hr@corp.com"));
        assert!(text.contains("Subject: Interview invitation"));
        assert!(text.contains("Time: 2025-08-07"));
        assert!(text.contains("Preview:\nPlease join us Monday."));
    }

    #[test]
    fn excerpt_is_bounded_and_char_safe() {
        let long = "é".repeat(500);
        let cut = excerpt(&long, 180);
        assert_eq!(cut.chars().count(), 181); // 180 + ellipsis
        assert!(cut.ends_with('…'));

        let short = excerpt("short body", 180);
        assert_eq!(short, "short body");
    }

    #[test]
    fn extracts_labeled_job_fields() {
        let body = "Position: Senior Rust Engineer\nCompany: Ferrous Ltd\n\
                    Location: Berlin, Germany\nSalary: €90,000 - €110,000\nApply soon.";
        let details = extract_job_details(body);
        assert_eq!(details.position.as_deref(), Some("Senior Rust Engineer"));
        assert_eq!(details.company.as_deref(), Some("Ferrous Ltd"));
        assert_eq!(details.location.as_deref(), Some("Berlin, Germany"));
        assert_eq!(details.salary.as_deref(), Some("€90,000 - €110,000"));
    }

    #[test]
    fn salary_falls_back_to_money_pattern() {
        let details = extract_job_details("We pay up to $150,000 for this role.");
        assert_eq!(details.salary.as_deref(), Some("$150,000"));
    }

    #[test]
    fn absent_fields_are_omitted() {
        let text = format_notification(&message_with_body("No structured data here."));
        assert!(!text.contains("Position:"));
        assert!(!text.contains("Company:"));
        assert!(!text.contains("Location:"));
        assert!(!text.contains("Salary:"));
    }

    #[test]
    fn present_fields_are_rendered() {
        let text = format_notification(&message_with_body(
            "Role: Backend Developer\nCompany: Acme",
        ));
        assert!(text.contains("Position: Backend Developer"));
        assert!(text.contains("Company: Acme"));
    }

    #[test]
    fn unconvertible_timestamp_degrades_to_fallback() {
        let msg = MailMessage {
            received_at_millis: i64::MAX,
            ..MailMessage::stub("m-1", "hr@corp.com", "Interview invitation")
        };
        assert_eq!(
            format_notification(&msg),
            "New email from hr@corp.com: Interview invitation"
        );
    }
}
