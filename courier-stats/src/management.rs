//! Self-describing attribute interface for monitoring tools.
//!
//! A managed object publishes a [`ManagementInfo`] schema naming its
//! attributes, operations and notifications together with their
//! [`OpenType`]s, so a generic console can render it without knowing the
//! concrete type. Values are exchanged as [`AttributeValue`]s and serialize
//! to JSON.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{DeliveryOutcome, ManagementError};

/// Type of an attribute, operation result or composite item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OpenType {
    String,
    Long,
    Date,
    Composite(CompositeType),
    Tabular(TabularType),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub open_type: OpenType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompositeType {
    pub name: &'static str,
    pub description: &'static str,
    pub items: Vec<ItemInfo>,
}

/// A table of composite rows. `index` names the items identifying a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TabularType {
    pub name: &'static str,
    pub description: &'static str,
    pub row_type: CompositeType,
    pub index: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub open_type: OpenType,
    pub readable: bool,
    pub writable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Impact {
    Info,
    Action,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub return_type: OpenType,
    pub impact: Impact,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub types: Vec<&'static str>,
}

/// Everything a console needs to render a managed object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagementInfo {
    pub class_name: &'static str,
    pub description: &'static str,
    pub attributes: Vec<AttributeInfo>,
    pub operations: Vec<OperationInfo>,
    pub notifications: Vec<NotificationInfo>,
}

impl ManagementInfo {
    /// Case-insensitive attribute lookup.
    pub fn attribute(&self, name: &str) -> Option<&AttributeInfo> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name.eq_ignore_ascii_case(name))
    }

    pub fn operation(&self, name: &str) -> Option<&OperationInfo> {
        self.operations
            .iter()
            .find(|operation| operation.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressRow {
    #[serde(rename = "addressType")]
    pub address_type: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderRow {
    #[serde(rename = "header-name")]
    pub name: String,
    #[serde(rename = "header-value")]
    pub value: String,
}

/// Snapshot of a [`DeliveryOutcome`] as exposed to monitoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MailInfo {
    pub message_id: Option<String>,
    pub date: DateTime<Utc>,
    pub subject: Option<String>,
    pub to_addresses: Vec<AddressRow>,
    /// Every header in message order, repeated names included.
    pub headers: Vec<HeaderRow>,
    pub error_description: Option<String>,
}

impl MailInfo {
    pub fn open_type() -> CompositeType {
        let address_row = CompositeType {
            name: "MailAddress",
            description: "Mail single address",
            items: vec![
                ItemInfo {
                    name: "addressType",
                    description: "Address type",
                    open_type: OpenType::String,
                },
                ItemInfo {
                    name: "address",
                    description: "Email address",
                    open_type: OpenType::String,
                },
            ],
        };

        let header_row = CompositeType {
            name: "MailHeaders",
            description: "Mail headers",
            items: vec![
                ItemInfo {
                    name: "header-name",
                    description: "Name",
                    open_type: OpenType::String,
                },
                ItemInfo {
                    name: "header-value",
                    description: "Value",
                    open_type: OpenType::String,
                },
            ],
        };

        CompositeType {
            name: "MailInfo",
            description: "Mail info",
            items: vec![
                ItemInfo {
                    name: "messageId",
                    description: "Message ID",
                    open_type: OpenType::String,
                },
                ItemInfo {
                    name: "date",
                    description: "Sent date",
                    open_type: OpenType::Date,
                },
                ItemInfo {
                    name: "subject",
                    description: "Message subject",
                    open_type: OpenType::String,
                },
                ItemInfo {
                    name: "toAddresses",
                    description: "Table of addresses",
                    open_type: OpenType::Tabular(TabularType {
                        name: "Addresses",
                        description: "Mail addresses",
                        row_type: address_row,
                        index: vec!["addressType", "address"],
                    }),
                },
                ItemInfo {
                    name: "headers",
                    description: "Message headers",
                    open_type: OpenType::Tabular(TabularType {
                        name: "Headers",
                        description: "Mail headers",
                        row_type: header_row,
                        index: vec!["header-name"],
                    }),
                },
                ItemInfo {
                    name: "errorDescription",
                    description: "Error description if any",
                    open_type: OpenType::String,
                },
            ],
        }
    }
}

impl From<&DeliveryOutcome> for MailInfo {
    fn from(outcome: &DeliveryOutcome) -> Self {
        let message = outcome.message();

        Self {
            message_id: message.message_id().map(str::to_string),
            date: outcome.timestamp(),
            subject: message.subject().map(str::to_string),
            to_addresses: outcome
                .recipients()
                .iter()
                .map(|recipient| AddressRow {
                    address_type: recipient.kind().as_str().to_string(),
                    address: recipient.address().to_string(),
                })
                .collect(),
            headers: message
                .headers()
                .iter()
                .map(|header| HeaderRow {
                    name: header.name().to_string(),
                    value: header.value().to_string(),
                })
                .collect(),
            error_description: outcome
                .failure_cause()
                .map(|cause| cause.description().to_string()),
        }
    }
}

/// Value of an attribute, or the result of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Date(DateTime<Utc>),
    Long(u64),
    /// `None` when no outcome has been recorded; not an error.
    MailInfo(Option<Box<MailInfo>>),
}

impl AttributeValue {
    pub const fn as_long(&self) -> Option<u64> {
        match self {
            Self::Long(value) => Some(*value),
            _ => None,
        }
    }

    pub const fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Date(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_mail_info(&self) -> Option<&MailInfo> {
        match self {
            Self::MailInfo(info) => info.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribute {
    pub name: String,
    pub value: AttributeValue,
}

/// An object whose state is exposed through named attributes.
pub trait Managed: Send + Sync {
    fn info(&self) -> &ManagementInfo;

    ///
    /// # Errors
    ///
    /// [`ManagementError::AttributeNotFound`] for a name not in the schema.
    ///
    fn get_attribute(&self, name: &str) -> Result<AttributeValue, ManagementError>;

    ///
    /// # Errors
    ///
    /// The first failing lookup; no partial list is returned.
    ///
    fn get_attributes(&self, names: &[&str]) -> Result<Vec<Attribute>, ManagementError> {
        names
            .iter()
            .map(|name| {
                self.get_attribute(name).map(|value| Attribute {
                    name: (*name).to_string(),
                    value,
                })
            })
            .collect()
    }

    ///
    /// # Errors
    ///
    /// If the attribute is unknown or not writable.
    ///
    fn set_attribute(&self, attribute: Attribute) -> Result<(), ManagementError>;

    ///
    /// # Errors
    ///
    /// The first attribute that could not be written.
    ///
    fn set_attributes(&self, attributes: Vec<Attribute>) -> Result<(), ManagementError> {
        attributes
            .into_iter()
            .try_for_each(|attribute| self.set_attribute(attribute))
    }

    ///
    /// # Errors
    ///
    /// [`ManagementError::OperationNotFound`] for an operation not in the
    /// schema.
    ///
    fn invoke(&self, operation: &str) -> Result<AttributeValue, ManagementError>;
}

#[cfg(test)]
mod tests {
    use courier_common::{OutboundMessage, RecipientAddress};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("refused")]
    struct Refused;

    #[test]
    fn mail_info_snapshot() {
        let message = OutboundMessage::builder()
            .message_id("<1@example.org>")
            .subject("Status")
            .header("Received", "from a")
            .header("Received", "from b")
            .build();
        let recipients = [RecipientAddress::rfc822("ops@example.com")];
        let outcome = DeliveryOutcome::failure(&message, &recipients, &Refused);

        let info = MailInfo::from(&outcome);
        assert_eq!(info.message_id.as_deref(), Some("<1@example.org>"));
        assert_eq!(info.subject.as_deref(), Some("Status"));
        assert_eq!(info.error_description.as_deref(), Some("refused"));
        assert_eq!(
            info.to_addresses,
            [AddressRow {
                address_type: "rfc822".to_string(),
                address: "ops@example.com".to_string(),
            }]
        );

        let received: Vec<&str> = info
            .headers
            .iter()
            .filter(|row| row.name == "Received")
            .map(|row| row.value.as_str())
            .collect();
        assert_eq!(received, ["from a", "from b"]);
    }

    #[test]
    fn mail_info_serializes_with_console_names() {
        let message = OutboundMessage::builder().subject("S").build();
        let info = MailInfo::from(&DeliveryOutcome::success(
            &message,
            &[RecipientAddress::news("comp.mail")],
        ));

        let value = serde_json::to_value(&info).expect("serializes");
        assert_eq!(
            value["toAddresses"],
            json!([{ "addressType": "news", "address": "comp.mail" }])
        );
        assert_eq!(
            value["headers"],
            json!([{ "header-name": "Subject", "header-value": "S" }])
        );
        assert_eq!(value["errorDescription"], serde_json::Value::Null);
    }

    #[test]
    fn absent_snapshot_is_null() {
        assert_eq!(
            serde_json::to_value(AttributeValue::MailInfo(None)).expect("serializes"),
            serde_json::Value::Null
        );
        assert_eq!(
            serde_json::to_value(AttributeValue::Long(4)).expect("serializes"),
            json!(4)
        );
    }
}
