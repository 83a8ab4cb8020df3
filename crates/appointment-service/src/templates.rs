//! Email templates
//!
//! Pure functions: no I/O, no clock. Values interpolated into the HTML part
//! are escaped.

use serde::Serialize;

const SIGN_OFF: &str = "Best regards,\nClassBook Team";
const HTML_SIGN_OFF: &str = "<p>Best regards,<br>ClassBook Team</p>";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedEmail {
    pub subject: String,
    pub body: String,
    pub html: String,
}

pub fn approval(
    student_name: &str,
    course_title: &str,
    date: &str,
    time: &str,
    meeting_link: Option<&str>,
) -> RenderedEmail {
    let meeting_link = meeting_link.filter(|link| !link.trim().is_empty());

    let link_line = meeting_link
        .map(|link| format!("\nMeeting Link: {}\n", link))
        .unwrap_or_default();
    let link_html = meeting_link
        .map(|link| {
            let link = escape_html(link);
            format!(
                "<p><strong>Meeting Link:</strong> <a href=\"{link}\">{link}</a></p>",
                link = link
            )
        })
        .unwrap_or_default();

    RenderedEmail {
        subject: "Class Appointment Approved ✅".to_string(),
        body: format!(
            "Hi {student_name},\n\nYour class appointment has been approved!\n\n\
             Topic: {course_title}\nDate: {date}\nTime: {time}\n{link_line}\n\
             See you in class!\n\n{SIGN_OFF}"
        ),
        html: layout(
            "#4F46E5",
            "Class Appointment Approved ✅",
            &format!(
                "<p>Hi {name},</p>\n<p>Your class appointment has been approved!</p>\n\
                 {details}\n<p>See you in class!</p>",
                name = escape_html(student_name),
                details = detail_box(&format!(
                    "<p><strong>Topic:</strong> {}</p><p><strong>Date:</strong> {}</p>\
                     <p><strong>Time:</strong> {}</p>{}",
                    escape_html(course_title),
                    escape_html(date),
                    escape_html(time),
                    link_html
                )),
            ),
        ),
    }
}

pub fn rejection(student_name: &str, course_title: &str, reason: Option<&str>) -> RenderedEmail {
    let reason = reason.filter(|r| !r.trim().is_empty());

    let reason_line = reason
        .map(|r| format!("\nReason: {}\n", r))
        .unwrap_or_default();
    let reason_html = reason
        .map(|r| format!("<p><em>Reason: {}</em></p>\n", escape_html(r)))
        .unwrap_or_default();

    RenderedEmail {
        subject: "Class Appointment Update".to_string(),
        body: format!(
            "Hi {student_name},\n\nUnfortunately, your class appointment for \"{course_title}\" \
             could not be approved at this time.\n{reason_line}\n\
             Please try booking another slot or contact your trainer for more information.\n\n\
             {SIGN_OFF}"
        ),
        html: layout(
            "#DC2626",
            "Class Appointment Update",
            &format!(
                "<p>Hi {name},</p>\n<p>Unfortunately, your class appointment for \
                 \"<strong>{title}</strong>\" could not be approved at this time.</p>\n\
                 {reason_html}<p>Please try booking another slot or contact your trainer \
                 for more information.</p>",
                name = escape_html(student_name),
                title = escape_html(course_title),
                reason_html = reason_html,
            ),
        ),
    }
}

pub fn meeting_link(
    student_name: &str,
    course_title: &str,
    link: &str,
    description: Option<&str>,
) -> RenderedEmail {
    let description = description.unwrap_or("");

    RenderedEmail {
        subject: "Meeting Link for Your Class 🎓".to_string(),
        body: format!(
            "Hi {student_name},\n\nYour meeting link is ready!\n\n\
             Class: {course_title}\nDescription: {description}\n\n\
             Join here: {link}\n\n{SIGN_OFF}"
        ),
        html: layout(
            "#10B981",
            "Meeting Link Ready 🎓",
            &format!(
                "<p>Hi {name},</p>\n<p>Your meeting link is ready!</p>\n{details}",
                name = escape_html(student_name),
                details = detail_box(&format!(
                    "<p><strong>Class:</strong> {}</p><p><strong>Description:</strong> {}</p>\
                     <a href=\"{}\" style=\"display: inline-block; background: #4F46E5; \
                     color: white; padding: 12px 24px; text-decoration: none; \
                     border-radius: 6px; margin-top: 10px;\">Join Meeting</a>",
                    escape_html(course_title),
                    escape_html(description),
                    escape_html(link)
                )),
            ),
        ),
    }
}

pub fn completion(student_name: &str, course_title: &str) -> RenderedEmail {
    RenderedEmail {
        subject: "Class Completed 🎉".to_string(),
        body: format!(
            "Hi {student_name},\n\nYour class \"{course_title}\" has been marked as completed.\n\n\
             Thanks for attending!\n\n{SIGN_OFF}"
        ),
        html: layout(
            "#10B981",
            "Class Completed 🎉",
            &format!(
                "<p>Hi {name},</p>\n<p>Your class \"<strong>{title}</strong>\" has been \
                 marked as completed.</p>\n<p>Thanks for attending!</p>",
                name = escape_html(student_name),
                title = escape_html(course_title),
            ),
        ),
    }
}

fn layout(color: &str, heading: &str, content: &str) -> String {
    format!(
        "<div style=\"font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;\">\n\
         <h2 style=\"color: {color};\">{heading}</h2>\n{content}\n{HTML_SIGN_OFF}\n</div>"
    )
}

fn detail_box(content: &str) -> String {
    format!(
        "<div style=\"background: #F3F4F6; padding: 20px; border-radius: 8px; \
         margin: 20px 0;\">{content}</div>"
    )
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approval_with_link() {
        let email = approval(
            "Ada",
            "Rust 101",
            "2025-05-01",
            "10:00",
            Some("https://meet.example/abc"),
        );

        assert_eq!(email.subject, "Class Appointment Approved ✅");
        assert!(email.body.starts_with("Hi Ada,"));
        assert!(email.body.contains("Topic: Rust 101"));
        assert!(email.body.contains("Meeting Link: https://meet.example/abc"));
        assert!(email.body.ends_with("ClassBook Team"));
        assert!(email
            .html
            .contains("<a href=\"https://meet.example/abc\">https://meet.example/abc</a>"));
    }

    #[test]
    fn test_approval_without_link_omits_line() {
        for link in [None, Some(""), Some("   ")] {
            let email = approval("Ada", "Rust 101", "2025-05-01", "10:00", link);
            assert!(!email.body.contains("Meeting Link"));
            assert!(!email.html.contains("Meeting Link"));
        }
    }

    #[test]
    fn test_rejection_reason() {
        let email = rejection("Ada", "Rust 101", Some("Trainer unavailable"));
        assert_eq!(email.subject, "Class Appointment Update");
        assert!(email.body.contains("\"Rust 101\""));
        assert!(email.body.contains("Reason: Trainer unavailable"));

        let email = rejection("Ada", "Rust 101", None);
        assert!(!email.body.contains("Reason:"));
    }

    #[test]
    fn test_meeting_link_template() {
        let email = meeting_link("Ada", "Rust 101", "https://meet.example/x", Some("Room 2"));
        assert_eq!(email.subject, "Meeting Link for Your Class 🎓");
        assert!(email.body.contains("Join here: https://meet.example/x"));
        assert!(email.body.contains("Description: Room 2"));
        assert!(email.html.contains("Join Meeting"));
    }

    #[test]
    fn test_completion_template() {
        let email = completion("Ada", "Rust 101");
        assert!(email.body.contains("has been marked as completed"));
    }

    #[test]
    fn test_html_values_are_escaped() {
        let email = rejection("<b>Eve</b>", "A & B", Some("\"quoted\""));
        assert!(email.html.contains("&lt;b&gt;Eve&lt;/b&gt;"));
        assert!(email.html.contains("A &amp; B"));
        assert!(email.html.contains("&quot;quoted&quot;"));
        // The plain-text part is left as written
        assert!(email.body.contains("<b>Eve</b>"));
    }
}
