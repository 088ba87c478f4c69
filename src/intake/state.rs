//! Intake phase and collected fields

use std::fmt;

/// Where a session is in the intake dialogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Phase {
    #[default]
    AwaitingInquiry,
    AwaitingContact,
    AwaitingPhone,
    Bridged,
}

impl Phase {
    pub fn is_bridged(self) -> bool {
        matches!(self, Phase::Bridged)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::AwaitingInquiry => "awaiting_inquiry",
            Phase::AwaitingContact => "awaiting_contact",
            Phase::AwaitingPhone => "awaiting_phone",
            Phase::Bridged => "bridged",
        };
        f.write_str(name)
    }
}

/// One of the three intake answers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Inquiry,
    Contact,
    Phone,
}

/// Answers collected during intake. Each slot is written at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntakeRecord {
    pub inquiry: Option<String>,
    pub contact: Option<String>,
    pub phone: Option<String>,
}

impl IntakeRecord {
    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Inquiry => &mut self.inquiry,
            Field::Contact => &mut self.contact,
            Field::Phone => &mut self.phone,
        }
    }

    /// Store `value` unless the field already holds one. Returns whether it was stored.
    pub fn set_once(&mut self, field: Field, value: impl Into<String>) -> bool {
        let slot = self.slot(field);
        if slot.is_some() {
            return false;
        }
        *slot = Some(value.into());
        true
    }

    #[cfg(test)]
    pub fn is_complete(&self) -> bool {
        self.inquiry.is_some() && self.contact.is_some() && self.phone.is_some()
    }
}
