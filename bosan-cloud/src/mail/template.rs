//! Invitation email template

use std::sync::LazyLock;

use regex::Regex;

/// Subject line for invitation emails.
pub const INVITATION_SUBJECT: &str = "Activate Your BOSAN Membership Account";

/// Render the activation invitation email body.
pub fn activation_email(display_name: &str, activation_link: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
</head>
<body style="margin: 0; padding: 0; background-color: #f4f4f4; font-family: Georgia, 'Times New Roman', serif;">
  <table role="presentation" width="100%" cellpadding="0" cellspacing="0">
    <tr>
      <td align="center" style="padding: 24px 12px;">
        <table role="presentation" width="600" cellpadding="0" cellspacing="0" style="background-color: #ffffff; border-radius: 8px; overflow: hidden;">
          <tr>
            <td style="background-color: #0b2545; padding: 28px 40px; text-align: center;">
              <h1 style="margin: 0; color: #d4af37; font-size: 22px;">Body of Senior Advocates of Nigeria</h1>
              <p style="margin: 8px 0 0; color: #ffffff; font-size: 14px;">Membership Portal</p>
            </td>
          </tr>
          <tr>
            <td style="padding: 36px 40px;">
              <p style="margin: 0 0 16px; color: #333333; font-size: 16px;">Dear {display_name},</p>
              <p style="margin: 0 0 16px; color: #333333; font-size: 15px; line-height: 1.6;">
                You have been added to the BOSAN membership portal. To complete your
                registration, please activate your account and set your password using
                the button below.
              </p>
              <table role="presentation" cellpadding="0" cellspacing="0" align="center" style="margin: 28px auto;">
                <tr>
                  <td style="background-color: #0b2545; border-radius: 6px;">
                    <a href="{activation_link}" style="display: inline-block; padding: 14px 32px; color: #d4af37; font-size: 16px; text-decoration: none;">Activate Your Account</a>
                  </td>
                </tr>
              </table>
              <p style="margin: 0 0 8px; color: #666666; font-size: 13px; line-height: 1.6;">
                If the button does not work, copy and paste this link into your browser:
              </p>
              <p style="margin: 0 0 16px; color: #0b2545; font-size: 13px; word-break: break-all;">{activation_link}</p>
              <p style="margin: 0; color: #666666; font-size: 13px;">This activation link expires in 7 days.</p>
            </td>
          </tr>
          <tr>
            <td style="background-color: #f0f0f0; padding: 20px 40px; text-align: center;">
              <p style="margin: 0; color: #999999; font-size: 12px;">
                If you did not expect this invitation, you can safely ignore this email.
              </p>
            </td>
          </tr>
        </table>
      </td>
    </tr>
  </table>
</body>
</html>"#
    )
}

static STYLE_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(style|script|head)[^>]*>.*?</(style|script|head)>").expect("block regex")
});
static LINE_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(br\s*/?|/p|/tr|/h[1-6])>").expect("break regex"));
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag regex"));
static BLANK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").expect("blank regex"));
static MULTI_NEWLINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("newline regex"));

/// Derive a plain-text alternative body from an HTML email.
pub fn html_to_text(html: &str) -> String {
    let text = STYLE_BLOCK_RE.replace_all(html, "");
    let text = LINE_BREAK_RE.replace_all(&text, "\n");
    let text = TAG_RE.replace_all(&text, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    let text = BLANK_RE.replace_all(&text, " ");
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let joined = lines.join("\n");
    MULTI_NEWLINE_RE.replace_all(&joined, "\n\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_contains_link_and_name() {
        let html = activation_email("A. Bello", "https://portal.example.org/activate?token=abc");
        assert!(html.contains("Dear A. Bello,"));
        // Link appears in both the button and the fallback paragraph.
        assert_eq!(
            html.matches("https://portal.example.org/activate?token=abc")
                .count(),
            2
        );
        assert!(html.contains("expires in 7 days"));
    }

    #[test]
    fn test_html_to_text_strips_markup() {
        let html = activation_email("A. Bello", "https://x.example/activate?token=t");
        let text = html_to_text(&html);
        assert!(!text.contains('<'));
        assert!(text.contains("Dear A. Bello,"));
        assert!(text.contains("https://x.example/activate?token=t"));
    }

    #[test]
    fn test_html_to_text_entities_and_breaks() {
        let text = html_to_text("<p>Tom &amp; Jerry</p><p>Second&nbsp;line</p>");
        assert!(text.contains("Tom & Jerry"));
        assert!(text.contains("Second line"));
    }
}
