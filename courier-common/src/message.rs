use std::{
    fmt::{self, Debug},
    io::{self, Write},
    ops::Deref,
    sync::Arc,
};

use crate::{
    address::{AddressKind, RecipientAddress},
    error::MessageParseError,
};

pub const END_OF_HEADER: &[u8] = b"\r\n";

const RECIPIENT_HEADERS: [&str; 3] = ["To", "Cc", "Bcc"];
const NEWSGROUPS_HEADER: &str = "Newsgroups";

/// A single header line.
///
/// The raw bytes are what gets serialized. `value` is a decoded view of them
/// for lookups and display; bytes that are not UTF-8 show up there as U+FFFD.
#[derive(Clone, PartialEq, Eq)]
pub struct Header {
    name: String,
    raw: Vec<u8>,
    value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            name: name.into(),
            raw: value.as_bytes().to_vec(),
            value,
        }
    }

    pub fn from_raw(name: impl Into<String>, raw: impl Into<Vec<u8>>) -> Self {
        let raw = raw.into();
        Self {
            name: name.into(),
            value: String::from_utf8_lossy(&raw).into_owned(),
            raw,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The value as it appears on the wire, folding included.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn raw_value(&self) -> &[u8] {
        &self.raw
    }

    fn append(&mut self, text: &str) {
        self.raw.extend_from_slice(text.as_bytes());
        self.value.push_str(text);
    }

    /// Header names compare ASCII case-insensitively.
    pub fn named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    fn unfolded(&self) -> String {
        self.value.replace("\r\n", "").replace('\n', "")
    }
}

impl Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Header")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("raw_len", &self.raw.len())
            .finish()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Headers(Vec<Header>);

impl Deref for Headers {
    type Target = Vec<Header>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Headers {
    /// First value of the named header, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.iter().find(|h| h.named(name)).map(Header::value)
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0.iter().filter(move |h| h.named(name)).map(Header::value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|h| h.named(name))
    }

    fn push(&mut self, header: Header) {
        self.0.push(header);
    }

    fn remove(&mut self, name: &str) {
        self.0.retain(|h| !h.named(name));
    }
}

/// A composed mail message on its way out.
///
/// Once built (or parsed) the message is never mutated; operations that need
/// a different header set produce a new message instead. The body is shared,
/// so cloning is cheap.
#[derive(Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    headers: Headers,
    body: Arc<[u8]>,
}

impl Debug for OutboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutboundMessage")
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .finish()
    }
}

impl OutboundMessage {
    pub fn builder() -> MessageBuilder {
        MessageBuilder::default()
    }

    ///
    /// Parse a raw RFC 5322 message into its headers and body.
    ///
    /// Header values are kept verbatim so that [`write_to`](Self::write_to)
    /// reproduces them byte for byte.
    ///
    /// # Errors
    ///
    /// If the header block is malformed, or there are no headers at all.
    ///
    pub fn parse(raw: &[u8]) -> Result<Self, MessageParseError> {
        let (parsed, offset) = mailparse::parse_headers(raw)?;
        if parsed.is_empty() {
            return Err(MessageParseError::Empty);
        }

        let headers = parsed
            .iter()
            .map(|h| Header::from_raw(h.get_key(), h.get_value_raw()))
            .collect();

        Ok(Self {
            headers: Headers(headers),
            body: Arc::from(&raw[offset.min(raw.len())..]),
        })
    }

    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn subject(&self) -> Option<&str> {
        self.header("Subject")
    }

    pub fn message_id(&self) -> Option<&str> {
        self.header("Message-ID")
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    ///
    /// Every recipient the message itself names: the `To`, `Cc` and `Bcc`
    /// mailboxes in that order (groups flattened), followed by any
    /// `Newsgroups`.
    ///
    /// Values that fail to parse as address lists are skipped.
    ///
    pub fn all_recipients(&self) -> Vec<RecipientAddress> {
        let mut recipients = Vec::new();

        for name in RECIPIENT_HEADERS {
            for header in self.headers.iter().filter(|h| h.named(name)) {
                let Ok(list) = mailparse::addrparse(&header.unfolded()) else {
                    continue;
                };

                for addr in list.iter() {
                    match addr {
                        mailparse::MailAddr::Single(info) => {
                            recipients.push(RecipientAddress::rfc822(info.addr.clone()));
                        }
                        mailparse::MailAddr::Group(group) => recipients.extend(
                            group
                                .addrs
                                .iter()
                                .map(|info| RecipientAddress::rfc822(info.addr.clone())),
                        ),
                    }
                }
            }
        }

        for header in self.headers.iter().filter(|h| h.named(NEWSGROUPS_HEADER)) {
            recipients.extend(
                header
                    .unfolded()
                    .split(',')
                    .map(str::trim)
                    .filter(|group| !group.is_empty())
                    .map(|group| RecipientAddress::new(AddressKind::News, group)),
            );
        }

        recipients
    }

    /// A copy of this message with every instance of `name` removed.
    #[must_use]
    pub fn without_header(&self, name: &str) -> Self {
        let mut headers = self.headers.clone();
        headers.remove(name);

        Self {
            headers,
            body: Arc::clone(&self.body),
        }
    }

    ///
    /// Serialize the full message, headers then body.
    ///
    /// # Errors
    ///
    /// Any error reported by the writer.
    ///
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        for header in self.headers.iter() {
            writer.write_all(header.name.as_bytes())?;
            writer.write_all(b": ")?;
            writer.write_all(&header.raw)?;
            writer.write_all(END_OF_HEADER)?;
        }
        writer.write_all(END_OF_HEADER)?;
        writer.write_all(&self.body)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.body.len() + 64 * self.headers.len());
        // Writing into a Vec cannot fail
        let _ = self.write_to(&mut buf);
        buf
    }
}

#[derive(Debug, Default)]
pub struct MessageBuilder {
    headers: Headers,
    body: Vec<u8>,
}

impl MessageBuilder {
    /// Append a header, keeping any existing headers with the same name.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }

    #[must_use]
    pub fn subject(self, subject: impl Into<String>) -> Self {
        self.header("Subject", subject)
    }

    #[must_use]
    pub fn message_id(self, id: impl Into<String>) -> Self {
        self.header("Message-ID", id)
    }

    #[must_use]
    pub fn from(self, address: impl Into<String>) -> Self {
        self.header("From", address)
    }

    #[must_use]
    pub fn to(self, address: &str) -> Self {
        self.append_address("To", address)
    }

    #[must_use]
    pub fn cc(self, address: &str) -> Self {
        self.append_address("Cc", address)
    }

    #[must_use]
    pub fn bcc(self, address: &str) -> Self {
        self.append_address("Bcc", address)
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn build(self) -> OutboundMessage {
        OutboundMessage {
            headers: self.headers,
            body: Arc::from(self.body),
        }
    }

    fn append_address(mut self, name: &str, address: &str) -> Self {
        if let Some(existing) = self.headers.0.iter_mut().find(|h| h.named(name)) {
            existing.append(", ");
            existing.append(address);
            self
        } else {
            self.header(name, address)
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const RAW: &[u8] = b"From: sender@example.org\r\n\
To: Alice <alice@example.com>, bob@example.com\r\n\
Cc: team: carol@example.com, dave@example.com;\r\n\
Subject: Quarterly report\r\n\
Message-ID: <1234@example.org>\r\n\
X-Send-priority: high\r\n\
\r\n\
Body Here\r\n";

    #[test]
    fn headers_are_case_insensitive() {
        let head = Header::new("From", "test@test.com");
        assert!(head.named("FROM"));
        assert!(head.named("from"));
        assert!(!head.named("Fro"));
    }

    #[test]
    fn parse_message() {
        let message = OutboundMessage::parse(RAW).expect("valid message");

        assert_eq!(message.subject(), Some("Quarterly report"));
        assert_eq!(message.message_id(), Some("<1234@example.org>"));
        assert_eq!(message.header("x-send-PRIORITY"), Some("high"));
        assert_eq!(message.body(), b"Body Here\r\n");
        assert_eq!(message.headers().len(), 6);
    }

    #[test]
    fn parse_then_write_reproduces_message() {
        let message = OutboundMessage::parse(RAW).expect("valid message");
        assert_eq!(message.to_bytes(), RAW);
    }

    #[test]
    fn eight_bit_headers_survive_a_round_trip() {
        let raw: &[u8] = b"To: a@example.com\r\nSubject: caf\xe9\r\n\r\nbody";
        let message = OutboundMessage::parse(raw).expect("valid message");

        assert_eq!(message.to_bytes(), raw);
        assert_eq!(message.subject(), Some("caf\u{fffd}"));
        assert_eq!(message.headers()[1].raw_value(), b"caf\xe9".as_slice());
        assert_eq!(message.without_header("X-Other").to_bytes(), raw);
    }

    #[test]
    fn parse_empty_message() {
        assert!(OutboundMessage::parse(b"").is_err());
        assert!(OutboundMessage::parse(b"\r\n").is_err());
    }

    #[test]
    fn all_recipients_flattens_groups() {
        let message = OutboundMessage::parse(RAW).expect("valid message");

        assert_eq!(
            message.all_recipients(),
            vec![
                RecipientAddress::rfc822("alice@example.com"),
                RecipientAddress::rfc822("bob@example.com"),
                RecipientAddress::rfc822("carol@example.com"),
                RecipientAddress::rfc822("dave@example.com"),
            ]
        );
    }

    #[test]
    fn all_recipients_includes_newsgroups() {
        let message = OutboundMessage::builder()
            .to("alice@example.com")
            .bcc("hidden@example.com")
            .header("Newsgroups", "comp.lang.rust, comp.mail.misc")
            .build();

        assert_eq!(
            message.all_recipients(),
            vec![
                RecipientAddress::rfc822("alice@example.com"),
                RecipientAddress::rfc822("hidden@example.com"),
                RecipientAddress::news("comp.lang.rust"),
                RecipientAddress::news("comp.mail.misc"),
            ]
        );
    }

    #[test]
    fn without_header_leaves_original_untouched() {
        let message = OutboundMessage::parse(RAW).expect("valid message");
        let stripped = message.without_header("X-SEND-PRIORITY");

        assert!(message.headers().contains("X-Send-priority"));
        assert!(!stripped.headers().contains("X-Send-priority"));
        assert_eq!(stripped.headers().len(), message.headers().len() - 1);
        assert_eq!(stripped.body(), message.body());
    }

    #[test]
    fn builder_joins_addresses() {
        let message = OutboundMessage::builder()
            .from("sender@example.org")
            .to("a@example.com")
            .to("b@example.com")
            .subject("Hi")
            .body("Hello")
            .build();

        assert_eq!(message.header("To"), Some("a@example.com, b@example.com"));
        assert_eq!(
            message.to_bytes(),
            b"From: sender@example.org\r\nTo: a@example.com, b@example.com\r\nSubject: Hi\r\n\r\nHello"
        );
    }
}
