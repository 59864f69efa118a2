//! Command grammars and line classification
//!
//! ```text
//! HELO      = "HELO" whitespace domain nullspace terminator
//! MAIL-FROM = "MAIL" whitespace "FROM:" nullspace reverse-path nullspace terminator
//! RCPT-TO   = "RCPT" whitespace "TO:" nullspace forward-path nullspace terminator
//! DATA      = "DATA" nullspace terminator
//! DATA-END  = "." terminator
//! QUIT      = "QUIT" nullspace terminator
//! ```
//!
//! Each verb is matched in two phases. If the keyword does not match, the
//! line is simply not that verb. If the keyword matches but the rest does
//! not, the line is that verb with malformed parameters. Keywords are
//! disjoint, so at most one verb ever claims a line.

use std::fmt;

use crate::smtp::grammar::{Address, Cursor, ParseResult};

/// The protocol verbs a client may send outside of DATA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Helo,
    MailFrom,
    RcptTo,
    Data,
    Quit,
}

impl Verb {
    pub const ALL: [Verb; 5] = [
        Verb::Helo,
        Verb::MailFrom,
        Verb::RcptTo,
        Verb::Data,
        Verb::Quit,
    ];

    /// Try this verb's grammar against `line`
    ///
    /// Returns `None` when the keyword does not match.
    pub fn recognize(self, line: &str) -> Option<Classified> {
        let mut cursor = Cursor::new(line);
        self.keyword(&mut cursor).ok()?;
        Some(match self.parameters(&mut cursor) {
            Ok(command) => Classified::Valid(command),
            Err(_) => Classified::Malformed(self),
        })
    }

    fn keyword(self, cursor: &mut Cursor<'_>) -> ParseResult<()> {
        match self {
            Verb::Helo => cursor.literal("HELO"),
            Verb::MailFrom => cursor.attempt(|c| {
                c.literal("MAIL")?;
                c.whitespace()?;
                c.literal("FROM:")
            }),
            Verb::RcptTo => cursor.attempt(|c| {
                c.literal("RCPT")?;
                c.whitespace()?;
                c.literal("TO:")
            }),
            Verb::Data => cursor.literal("DATA"),
            Verb::Quit => cursor.literal("QUIT"),
        }
    }

    fn parameters(self, cursor: &mut Cursor<'_>) -> ParseResult<Command> {
        cursor.attempt(|c| match self {
            Verb::Helo => {
                c.whitespace()?;
                let domain = c.domain()?;
                c.nullspace();
                c.terminator()?;
                Ok(Command::Helo {
                    domain: domain.to_owned(),
                })
            }
            Verb::MailFrom => {
                c.nullspace();
                let reverse_path = c.reverse_path()?;
                c.nullspace();
                c.terminator()?;
                Ok(Command::MailFrom { reverse_path })
            }
            Verb::RcptTo => {
                c.nullspace();
                let forward_path = c.forward_path()?;
                c.nullspace();
                c.terminator()?;
                Ok(Command::RcptTo { forward_path })
            }
            Verb::Data => {
                c.nullspace();
                c.terminator()?;
                Ok(Command::Data)
            }
            Verb::Quit => {
                c.nullspace();
                c.terminator()?;
                Ok(Command::Quit)
            }
        })
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verb::Helo => "HELO",
            Verb::MailFrom => "MAIL FROM",
            Verb::RcptTo => "RCPT TO",
            Verb::Data => "DATA",
            Verb::Quit => "QUIT",
        })
    }
}

/// A well-formed command with its parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Helo { domain: String },
    MailFrom { reverse_path: Address },
    RcptTo { forward_path: Address },
    Data,
    Quit,
}

impl Command {
    pub fn verb(&self) -> Verb {
        match self {
            Command::Helo { .. } => Verb::Helo,
            Command::MailFrom { .. } => Verb::MailFrom,
            Command::RcptTo { .. } => Verb::RcptTo,
            Command::Data => Verb::Data,
            Command::Quit => Verb::Quit,
        }
    }
}

/// Result of classifying one input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    /// No verb's keyword matched
    Unrecognized,
    /// A keyword matched but its parameters did not
    Malformed(Verb),
    Valid(Command),
}

impl Classified {
    /// The verb that claimed the line, if any
    pub fn verb(&self) -> Option<Verb> {
        match self {
            Classified::Unrecognized => None,
            Classified::Malformed(verb) => Some(*verb),
            Classified::Valid(command) => Some(command.verb()),
        }
    }
}

/// Classify a line against every verb grammar
pub fn classify(line: &str) -> Classified {
    classify_among(line, &Verb::ALL)
}

/// Classify a line against a subset of verb grammars
pub fn classify_among(line: &str, candidates: &[Verb]) -> Classified {
    candidates
        .iter()
        .find_map(|verb| verb.recognize(line))
        .unwrap_or(Classified::Unrecognized)
}

/// True when `line` is the end-of-data marker. `..` is not.
pub fn is_data_end(line: &str) -> bool {
    let mut cursor = Cursor::new(line);
    cursor.expect(b'.', "data-end").is_ok() && cursor.terminator().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORPUS: &[&str] = &[
        "HELO client.test\n",
        "HELO client.test \r\n",
        "HELO\n",
        "HELO cl!ent\n",
        "HELOclient.test\n",
        "MAIL FROM:<a@x.com>\n",
        "MAIL FROM: <a@x.com>  \n",
        "MAIL\tFROM:\t<a@x.com>\n",
        "MAIL FROM:<a.b@x.com>\n",
        "MAIL FROM:a@x.com\n",
        "MAIL FROM:<a@x.com> junk\n",
        "MAIL TO:<a@x.com>\n",
        "MAILFROM:<a@x.com>\n",
        "RCPT TO:<b@y.com>\n",
        "RCPT TO:<b@y.com\n",
        "RCPT  TO:<b@y.com>\n",
        "RCPT FROM:<b@y.com>\n",
        "DATA\n",
        "DATA  \n",
        "DATAX\n",
        "DATA now\n",
        "QUIT\n",
        "QUIT \n",
        "QUITX\n",
        "quit\n",
        "NOOP\n",
        ".\n",
        "..\n",
        "\n",
        "",
        "\u{fffd}\u{fffd} HELO client.local\n",
    ];

    #[test]
    fn test_valid_helo() {
        assert_eq!(
            classify("HELO client.test\n"),
            Classified::Valid(Command::Helo {
                domain: "client.test".to_string()
            })
        );
    }

    #[test]
    fn test_valid_mail_from_with_spacing() {
        for line in [
            "MAIL FROM:<a@x.com>\n",
            "MAIL FROM: <a@x.com>\n",
            "MAIL  FROM:\t<a@x.com> \n",
        ] {
            match classify(line) {
                Classified::Valid(Command::MailFrom { reverse_path }) => {
                    assert_eq!(reverse_path.to_string(), "a@x.com");
                }
                other => panic!("{line:?} classified as {other:?}"),
            }
        }
    }

    #[test]
    fn test_valid_rcpt_to() {
        match classify("RCPT TO:<b@y.com>\r\n") {
            Classified::Valid(Command::RcptTo { forward_path }) => {
                assert_eq!(forward_path.domain(), "y.com");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_valid_data_and_quit() {
        assert_eq!(classify("DATA\n"), Classified::Valid(Command::Data));
        assert_eq!(classify("DATA \t\n"), Classified::Valid(Command::Data));
        assert_eq!(classify("QUIT\n"), Classified::Valid(Command::Quit));
        assert_eq!(classify("QUIT \r"), Classified::Valid(Command::Quit));
    }

    #[test]
    fn test_malformed_parameters() {
        assert_eq!(classify("HELO\n"), Classified::Malformed(Verb::Helo));
        assert_eq!(classify("HELO cl!ent\n"), Classified::Malformed(Verb::Helo));
        assert_eq!(
            classify("MAIL FROM:<a b@x.com>\n"),
            Classified::Malformed(Verb::MailFrom)
        );
        assert_eq!(
            classify("MAIL FROM:<a.b@x.com>\n"),
            Classified::Malformed(Verb::MailFrom)
        );
        assert_eq!(
            classify("MAIL FROM:<a@b@x.com>\n"),
            Classified::Malformed(Verb::MailFrom)
        );
        assert_eq!(
            classify("RCPT TO:b@y.com\n"),
            Classified::Malformed(Verb::RcptTo)
        );
        assert_eq!(classify("DATAX\n"), Classified::Malformed(Verb::Data));
        assert_eq!(classify("QUITX\n"), Classified::Malformed(Verb::Quit));
    }

    #[test]
    fn test_missing_terminator_is_malformed() {
        assert_eq!(
            classify("HELO client.test"),
            Classified::Malformed(Verb::Helo)
        );
        assert_eq!(classify("DATA"), Classified::Malformed(Verb::Data));
    }

    #[test]
    fn test_unrecognized() {
        for line in ["NOOP\n", "quit\n", "MAILFROM:<a@x.com>\n", "MAIL TO:<a@x.com>\n", ".\n", "\n", ""] {
            assert_eq!(classify(line), Classified::Unrecognized, "{line:?}");
        }
    }

    #[test]
    fn test_keywords_are_disjoint() {
        for line in CORPUS {
            let claims = Verb::ALL
                .iter()
                .filter(|verb| verb.recognize(line).is_some())
                .count();
            assert!(claims <= 1, "{line:?} claimed by {claims} verbs");
        }
    }

    #[test]
    fn test_classification_independent_of_candidate_order() {
        let mut reversed = Verb::ALL;
        reversed.reverse();
        for line in CORPUS {
            assert_eq!(classify(line), classify_among(line, &reversed), "{line:?}");
        }
    }

    #[test]
    fn test_restricted_classification_agrees_with_full() {
        // Restricting the candidates to one expected verb plus QUIT must
        // agree with full classification on every line either of them
        // attributes to a restricted verb, and must report everything else
        // as unrecognized.
        for expected in Verb::ALL {
            let candidates = [expected, Verb::Quit];
            for line in CORPUS {
                let full = classify(line);
                let restricted = classify_among(line, &candidates);
                match full.verb() {
                    Some(verb) if candidates.contains(&verb) => assert_eq!(full, restricted),
                    _ => assert_eq!(restricted, Classified::Unrecognized),
                }
            }
        }
    }

    #[test]
    fn test_data_end() {
        assert!(is_data_end(".\n"));
        assert!(is_data_end(".\r\n"));
        assert!(is_data_end(".\r"));
        assert!(!is_data_end("..\n"));
        assert!(!is_data_end(". \n"));
        assert!(!is_data_end(".text\n"));
        assert!(!is_data_end("\n"));
        assert!(!is_data_end("."));
    }

    #[test]
    fn test_verb_display() {
        assert_eq!(Verb::MailFrom.to_string(), "MAIL FROM");
        assert_eq!(Verb::RcptTo.to_string(), "RCPT TO");
        assert_eq!(Verb::Helo.to_string(), "HELO");
    }
}
