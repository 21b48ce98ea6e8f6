//! Closed domain enums for the fiscal protocol
//!
//! Document types, fiscal-day states, money types and counter kinds are
//! all closed variants resolved once at entry, never re-parsed from
//! strings inside the pipeline.

use serde::{Deserialize, Serialize};

/// Fiscalized document type.
///
/// Sign conventions hang off this: invoices and debit notes carry
/// uniformly non-negative monetary fields, credit notes uniformly
/// negative (quantities stay positive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    #[serde(rename = "INVOICE")]
    Invoice,
    #[serde(rename = "CREDIT_NOTE")]
    CreditNote,
    #[serde(rename = "DEBIT_NOTE")]
    DebitNote,
}

impl DocumentType {
    /// Upper-case token used in the canonical string and the wire payload.
    pub fn wire_name(&self) -> &'static str {
        match self {
            DocumentType::Invoice => "FISCALINVOICE",
            DocumentType::CreditNote => "CREDITNOTE",
            DocumentType::DebitNote => "DEBITNOTE",
        }
    }

    pub fn is_adjustment(&self) -> bool {
        matches!(self, DocumentType::CreditNote | DocumentType::DebitNote)
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Fiscal day state as reported by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FiscalDayStatus {
    #[serde(rename = "FiscalDayClosed")]
    Closed,
    #[serde(rename = "FiscalDayOpened")]
    Opened,
    #[serde(rename = "FiscalDayCloseInitiated")]
    CloseInitiated,
    #[serde(rename = "FiscalDayCloseFailed")]
    CloseFailed,
}

impl FiscalDayStatus {
    /// Receipts may only be submitted while the day is opened, or after a
    /// failed close (the day is then still legally open).
    pub fn accepts_receipts(&self) -> bool {
        matches!(self, FiscalDayStatus::Opened | FiscalDayStatus::CloseFailed)
    }
}

/// Payment method on the wire (`moneyTypeCode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoneyType {
    Cash,
    Card,
    MobileWallet,
    Coupon,
    Credit,
    BankTransfer,
    Other,
}

impl MoneyType {
    /// Parse a free-form method string from a caller (e.g. "CASH",
    /// "bank_transfer", "ecocash"). Unknown methods map to `Other`.
    pub fn from_method(method: &str) -> Self {
        match method.trim().to_uppercase().as_str() {
            "CASH" => MoneyType::Cash,
            "CARD" => MoneyType::Card,
            "MOBILE" | "MOBILEWALLET" | "ECOCASH" => MoneyType::MobileWallet,
            "COUPON" => MoneyType::Coupon,
            "CREDIT" | "OFFSET" => MoneyType::Credit,
            "BANK_TRANSFER" | "BANKTRANSFER" => MoneyType::BankTransfer,
            _ => MoneyType::Other,
        }
    }

    /// Payload code (`moneyTypeCode` field).
    pub fn payload_code(&self) -> &'static str {
        match self {
            MoneyType::Cash => "Cash",
            MoneyType::Card => "Card",
            MoneyType::MobileWallet => "MobileWallet",
            MoneyType::Coupon => "Coupon",
            MoneyType::Credit => "Credit",
            MoneyType::BankTransfer => "BankTransfer",
            MoneyType::Other => "Other",
        }
    }

    /// Bucket used by the day-close balance counter. The protocol only
    /// distinguishes cash from everything else there.
    pub fn balance_bucket(&self) -> &'static str {
        match self {
            MoneyType::Cash => "CASH",
            _ => "CARD",
        }
    }
}

/// Offline queue entry state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueState {
    #[serde(rename = "QUEUED")]
    Queued,
    #[serde(rename = "SUBMITTING")]
    Submitting,
    #[serde(rename = "SUBMITTED")]
    Submitted,
    #[serde(rename = "FAILED")]
    Failed,
}

/// Cumulative adjustment status of an invoice, recomputed after every
/// confirmed credit or debit note against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreditStatus {
    #[serde(rename = "ISSUED")]
    Issued,
    #[serde(rename = "PARTIALLY_CREDITED")]
    PartiallyCredited,
    #[serde(rename = "FULLY_CREDITED")]
    FullyCredited,
    #[serde(rename = "ADJUSTED_UP")]
    AdjustedUp,
}

impl Default for CreditStatus {
    fn default() -> Self {
        Self::Issued
    }
}

/// Day-close counter kind. Kinds are never netted against each other:
/// sales, credit notes and debit notes each keep their own buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CounterKind {
    SaleByTax,
    SaleTaxByTax,
    CreditNoteByTax,
    CreditNoteTaxByTax,
    DebitNoteByTax,
    DebitNoteTaxByTax,
    BalanceByMoneyType,
}

impl CounterKind {
    /// Fixed sort rank in the day-close canonical string.
    pub fn rank(&self) -> u8 {
        match self {
            CounterKind::SaleByTax => 0,
            CounterKind::SaleTaxByTax => 1,
            CounterKind::CreditNoteByTax => 2,
            CounterKind::CreditNoteTaxByTax => 3,
            CounterKind::DebitNoteByTax => 4,
            CounterKind::DebitNoteTaxByTax => 5,
            CounterKind::BalanceByMoneyType => 6,
        }
    }

    /// Upper-case token in the day-close canonical string.
    pub fn canonical_token(&self) -> &'static str {
        match self {
            CounterKind::SaleByTax => "SALEBYTAX",
            CounterKind::SaleTaxByTax => "SALETAXBYTAX",
            CounterKind::CreditNoteByTax => "CREDITNOTEBYTAX",
            CounterKind::CreditNoteTaxByTax => "CREDITNOTETAXBYTAX",
            CounterKind::DebitNoteByTax => "DEBITNOTEBYTAX",
            CounterKind::DebitNoteTaxByTax => "DEBITNOTETAXBYTAX",
            CounterKind::BalanceByMoneyType => "BALANCEBYMONEYTYPE",
        }
    }

    /// Wire name (`fiscalCounterType` field).
    pub fn wire_name(&self) -> &'static str {
        match self {
            CounterKind::SaleByTax => "SaleByTax",
            CounterKind::SaleTaxByTax => "SaleTaxByTax",
            CounterKind::CreditNoteByTax => "CreditNoteByTax",
            CounterKind::CreditNoteTaxByTax => "CreditNoteTaxByTax",
            CounterKind::DebitNoteByTax => "DebitNoteByTax",
            CounterKind::DebitNoteTaxByTax => "DebitNoteTaxByTax",
            CounterKind::BalanceByMoneyType => "BalanceByMoneyType",
        }
    }
}
