//! MIME composition of outgoing messages

use std::fs;
use std::path::Path;

use lettre::Message;
use lettre::message::header::ContentType;
use lettre::message::{Attachment as MimeAttachment, Mailbox, MultiPart, SinglePart};

use crate::smtp::error::MailError;
use crate::smtp::grammar::Address;

/// A file attached to an outgoing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
}

impl Attachment {
    pub fn new(filename: &str, content: Vec<u8>) -> Self {
        Self {
            filename: filename.to_owned(),
            content,
        }
    }

    /// Read an attachment from disk, naming it after the file
    pub fn from_path(path: &Path) -> Result<Self, MailError> {
        let content = fs::read(path)?;
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("attachment")
            .to_owned();
        Ok(Self { filename, content })
    }

    /// MIME type guessed from the file extension
    pub fn content_type(&self) -> &'static str {
        let extension = Path::new(&self.filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("png") => "image/png",
            Some("jpg" | "jpeg") => "image/jpeg",
            Some("gif") => "image/gif",
            Some("txt") => "text/plain",
            _ => "application/octet-stream",
        }
    }
}

/// Everything the user supplied for one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub sender: Address,
    pub recipients: Vec<Address>,
    pub subject: String,
    pub body: String,
    pub attachment: Option<Attachment>,
}

/// Build the message payload: a multipart/mixed message with the body as
/// text/plain and the attachment (if any) base64-encoded
pub fn compose(draft: &Draft) -> Result<String, MailError> {
    let mut builder = Message::builder()
        .from(mailbox(&draft.sender)?)
        .subject(draft.subject.as_str());
    for recipient in &draft.recipients {
        builder = builder.to(mailbox(recipient)?);
    }

    let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(draft.body.clone()));
    if let Some(attachment) = &draft.attachment {
        let content_type = ContentType::parse(attachment.content_type())
            .map_err(|e| MailError::Compose(e.to_string()))?;
        parts = parts.singlepart(
            MimeAttachment::new(attachment.filename.clone())
                .body(attachment.content.clone(), content_type),
        );
    }

    let message = builder
        .multipart(parts)
        .map_err(|e| MailError::Compose(e.to_string()))?;
    String::from_utf8(message.formatted()).map_err(|e| MailError::Compose(e.to_string()))
}

fn mailbox(address: &Address) -> Result<Mailbox, MailError> {
    address
        .to_string()
        .parse::<Mailbox>()
        .map_err(|e| MailError::InvalidAddress(format!("{address}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(attachment: Option<Attachment>) -> Draft {
        Draft {
            sender: "alice@example.com".parse().unwrap(),
            recipients: vec![
                "bob@example.org".parse().unwrap(),
                "carol@example.net".parse().unwrap(),
            ],
            subject: "Greetings".to_string(),
            body: "Hello Bob\n".to_string(),
            attachment,
        }
    }

    #[test]
    fn test_compose_headers_and_body() {
        let text = compose(&draft(None)).unwrap();
        assert!(text.contains("From: alice@example.com"));
        assert!(text.contains("bob@example.org"));
        assert!(text.contains("carol@example.net"));
        assert!(text.contains("Subject: Greetings"));
        assert!(text.contains("multipart/mixed"));
        assert!(text.contains("text/plain"));
        assert!(text.contains("Hello Bob"));
    }

    #[test]
    fn test_compose_with_attachment() {
        let attachment = Attachment::new("pixel.png", vec![0x89, b'P', b'N', b'G', 0, 1, 2, 3]);
        let text = compose(&draft(Some(attachment))).unwrap();
        assert!(text.contains("image/png"));
        assert!(text.contains("pixel.png"));
        assert!(text.contains("Content-Transfer-Encoding: base64"));
        assert!(text.is_ascii());
    }

    #[test]
    fn test_content_type_by_extension() {
        let guess = |name: &str| Attachment::new(name, Vec::new()).content_type();
        assert_eq!(guess("a.png"), "image/png");
        assert_eq!(guess("a.JPG"), "image/jpeg");
        assert_eq!(guess("a.jpeg"), "image/jpeg");
        assert_eq!(guess("a.gif"), "image/gif");
        assert_eq!(guess("notes.txt"), "text/plain");
        assert_eq!(guess("archive"), "application/octet-stream");
    }

    #[test]
    fn test_attachment_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.gif");
        fs::write(&path, b"GIF89a").unwrap();

        let attachment = Attachment::from_path(&path).unwrap();
        assert_eq!(attachment.filename, "photo.gif");
        assert_eq!(attachment.content, b"GIF89a");

        assert!(matches!(
            Attachment::from_path(&dir.path().join("missing.png")),
            Err(MailError::Io(_))
        ));
    }
}
