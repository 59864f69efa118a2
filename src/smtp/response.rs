//! Reply codes, server replies and client-side reply parsing

use std::fmt;

use crate::smtp::error::MailError;

/// The fixed set of reply codes the server emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyCode {
    /// 220
    ServiceReady,
    /// 250
    Ok,
    /// 354
    StartMailInput,
    /// 221
    Closing,
    /// 500
    Unrecognized,
    /// 501
    BadParameters,
    /// 503
    BadSequence,
}

impl ReplyCode {
    pub const fn as_u16(self) -> u16 {
        match self {
            ReplyCode::ServiceReady => 220,
            ReplyCode::Ok => 250,
            ReplyCode::StartMailInput => 354,
            ReplyCode::Closing => 221,
            ReplyCode::Unrecognized => 500,
            ReplyCode::BadParameters => 501,
            ReplyCode::BadSequence => 503,
        }
    }

    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            220 => Some(ReplyCode::ServiceReady),
            250 => Some(ReplyCode::Ok),
            354 => Some(ReplyCode::StartMailInput),
            221 => Some(ReplyCode::Closing),
            500 => Some(ReplyCode::Unrecognized),
            501 => Some(ReplyCode::BadParameters),
            503 => Some(ReplyCode::BadSequence),
            _ => None,
        }
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// A reply the server sends to its peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: ReplyCode,
    /// The human-readable reason text
    pub message: String,
}

impl Reply {
    pub fn new(code: ReplyCode, message: &str) -> Self {
        Self {
            code,
            message: message.to_owned(),
        }
    }

    /// 250 OK
    pub fn ok() -> Self {
        Self::new(ReplyCode::Ok, "OK")
    }

    /// 220 greeting naming the server host
    pub fn greeting(hostname: &str) -> Self {
        Self::new(ReplyCode::ServiceReady, hostname)
    }

    /// 250 reply to a HELO
    pub fn helo(client_domain: &str) -> Self {
        Self::new(
            ReplyCode::Ok,
            &format!("Hello {client_domain} pleased to meet you"),
        )
    }

    /// 354 reply to DATA
    pub fn data_start() -> Self {
        Self::new(
            ReplyCode::StartMailInput,
            "Start mail input; end with <CRLF>.<CRLF>",
        )
    }

    /// 221 reply to QUIT
    pub fn quit(hostname: &str) -> Self {
        Self::new(ReplyCode::Closing, &format!("{hostname} closing connection"))
    }

    pub fn unrecognized() -> Self {
        Self::new(ReplyCode::Unrecognized, "Syntax error: command unrecognized")
    }

    pub fn bad_parameters() -> Self {
        Self::new(
            ReplyCode::BadParameters,
            "Syntax error in parameters or arguments",
        )
    }

    pub fn bad_sequence() -> Self {
        Self::new(ReplyCode::BadSequence, "Bad sequence of commands")
    }

    /// Format the reply for sending over the wire
    pub fn format(&self) -> String {
        format!("{} {}\n", self.code, self.message)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.message)
    }
}

/// A reply line as read by the client
///
/// The code is kept numeric so codes outside [`ReplyCode`] can be reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedReply {
    pub code: u16,
    pub text: String,
}

impl ReceivedReply {
    /// Parse `<3 digits>[<space><text>]` followed by an optional line ending
    pub fn parse(line: &str) -> Result<Self, MailError> {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        let malformed = || MailError::MalformedReply(trimmed.to_owned());

        let digits = trimmed.get(..3).ok_or_else(malformed)?;
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let code = digits.parse::<u16>().map_err(|_| malformed())?;

        let rest = &trimmed[3..];
        let text = if rest.is_empty() {
            ""
        } else if let Some(text) = rest.strip_prefix(' ') {
            text
        } else {
            return Err(malformed());
        };

        Ok(Self {
            code,
            text: text.to_owned(),
        })
    }

    /// The known code this reply carries, if any
    pub fn reply_code(&self) -> Option<ReplyCode> {
        ReplyCode::from_u16(self.code)
    }

    pub fn is(&self, expected: ReplyCode) -> bool {
        self.reply_code() == Some(expected)
    }
}

impl fmt::Display for ReceivedReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_creation() {
        let reply = Reply::new(ReplyCode::Ok, "OK");
        assert_eq!(reply.code, ReplyCode::Ok);
        assert_eq!(reply.message, "OK");
    }

    #[test]
    fn test_ok_reply() {
        assert_eq!(Reply::ok().format(), "250 OK\n");
    }

    #[test]
    fn test_greeting_reply() {
        let reply = Reply::greeting("mail.local");
        assert_eq!(reply.format(), "220 mail.local\n");
    }

    #[test]
    fn test_helo_reply() {
        let reply = Reply::helo("client.test");
        assert_eq!(reply.code, ReplyCode::Ok);
        assert_eq!(reply.message, "Hello client.test pleased to meet you");
    }

    #[test]
    fn test_data_start_reply() {
        let reply = Reply::data_start();
        assert_eq!(reply.code.as_u16(), 354);
        assert_eq!(reply.message, "Start mail input; end with <CRLF>.<CRLF>");
    }

    #[test]
    fn test_quit_reply() {
        let reply = Reply::quit("mail.local");
        assert_eq!(reply.format(), "221 mail.local closing connection\n");
    }

    #[test]
    fn test_error_replies() {
        assert_eq!(
            Reply::unrecognized().format(),
            "500 Syntax error: command unrecognized\n"
        );
        assert_eq!(
            Reply::bad_parameters().format(),
            "501 Syntax error in parameters or arguments\n"
        );
        assert_eq!(Reply::bad_sequence().format(), "503 Bad sequence of commands\n");
    }

    #[test]
    fn test_code_round_trip() {
        for code in [220, 250, 354, 221, 500, 501, 503] {
            assert_eq!(ReplyCode::from_u16(code).unwrap().as_u16(), code);
        }
        assert_eq!(ReplyCode::from_u16(421), None);
    }

    #[test]
    fn test_parse_received_reply() {
        let reply = ReceivedReply::parse("250 OK\r\n").unwrap();
        assert_eq!(reply.code, 250);
        assert_eq!(reply.text, "OK");
        assert!(reply.is(ReplyCode::Ok));

        let reply = ReceivedReply::parse("221\n").unwrap();
        assert!(reply.is(ReplyCode::Closing));
        assert_eq!(reply.text, "");

        let reply = ReceivedReply::parse("421 Service not available\n").unwrap();
        assert_eq!(reply.code, 421);
        assert_eq!(reply.reply_code(), None);
        assert!(!reply.is(ReplyCode::Ok));
    }

    #[test]
    fn test_parse_malformed_reply() {
        for line in ["", "25", "2x0 OK", "250-OK", "OK 250", "250OK"] {
            assert!(
                matches!(ReceivedReply::parse(line), Err(MailError::MalformedReply(_))),
                "{line:?}"
            );
        }
    }
}
