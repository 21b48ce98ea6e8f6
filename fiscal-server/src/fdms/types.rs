//! Wire DTOs for the remote fiscal service (camelCase JSON)

use crate::db::models::{DayCounter, Receipt};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::types::FiscalDayStatus;

/// Authoritative device state as the remote service sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub fiscal_day_status: FiscalDayStatus,
    pub last_fiscal_day_no: Option<i32>,
    pub last_receipt_global_no: Option<i64>,
    #[serde(default)]
    pub fiscal_day_closing_error_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxDto {
    pub tax_id: i32,
    pub tax_code: String,
    pub tax_percent: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    pub currencies: Vec<String>,
    pub applicable_taxes: Vec<TaxDto>,
}

/// Device-side digest and signature pair, base64.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureDto {
    pub hash: String,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptLineDto {
    pub receipt_line_no: u32,
    pub receipt_line_name: String,
    pub receipt_line_quantity: Decimal,
    pub receipt_line_price: Decimal,
    pub receipt_line_total: Decimal,
    pub tax_id: i32,
    pub tax_code: String,
    pub tax_percent: Option<Decimal>,
    pub receipt_line_hs_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptTaxDto {
    pub tax_id: i32,
    pub tax_code: String,
    pub tax_percent: Option<Decimal>,
    pub tax_amount: Decimal,
    pub sales_amount_with_tax: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDto {
    pub money_type_code: String,
    pub payment_amount: Decimal,
}

/// Reference block on credit and debit note submissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditDebitNoteDto {
    pub device_id: i64,
    pub receipt_global_no: i64,
    pub fiscal_day_no: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptDto {
    pub receipt_type: String,
    pub receipt_currency: String,
    pub receipt_counter: i32,
    pub receipt_global_no: i64,
    pub invoice_no: String,
    pub receipt_date: String,
    pub receipt_lines_tax_inclusive: bool,
    pub receipt_lines: Vec<ReceiptLineDto>,
    pub receipt_taxes: Vec<ReceiptTaxDto>,
    pub receipt_payments: Vec<PaymentDto>,
    pub receipt_total: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_debit_note: Option<CreditDebitNoteDto>,
    pub receipt_device_signature: SignatureDto,
}

impl ReceiptDto {
    /// Build the submission payload from a signed receipt.
    pub fn from_receipt(receipt: &Receipt) -> Self {
        Self {
            receipt_type: receipt.document_type.wire_name().to_string(),
            receipt_currency: receipt.currency.to_uppercase(),
            receipt_counter: receipt.receipt_counter,
            receipt_global_no: receipt.receipt_global_no,
            invoice_no: receipt.invoice_no.clone(),
            receipt_date: shared::util::format_receipt_date(&receipt.receipt_date),
            receipt_lines_tax_inclusive: receipt.lines_tax_inclusive,
            receipt_lines: receipt
                .lines
                .iter()
                .map(|l| ReceiptLineDto {
                    receipt_line_no: l.line_no,
                    receipt_line_name: l.name.clone(),
                    receipt_line_quantity: l.quantity,
                    receipt_line_price: l.unit_price,
                    receipt_line_total: l.total,
                    tax_id: l.tax_id,
                    tax_code: l.tax_code.clone(),
                    tax_percent: l.tax_percent,
                    receipt_line_hs_code: l.hs_code.clone(),
                })
                .collect(),
            receipt_taxes: receipt
                .taxes
                .iter()
                .map(|t| ReceiptTaxDto {
                    tax_id: t.tax_id,
                    tax_code: t.tax_code.clone(),
                    tax_percent: t.tax_percent,
                    tax_amount: t.tax_amount,
                    sales_amount_with_tax: t.sales_amount_with_tax,
                })
                .collect(),
            receipt_payments: receipt
                .payments
                .iter()
                .map(|p| PaymentDto {
                    money_type_code: p.money_type.payload_code().to_string(),
                    payment_amount: p.amount,
                })
                .collect(),
            receipt_total: receipt.total,
            credit_debit_note: receipt.adjustment.as_ref().map(|a| CreditDebitNoteDto {
                device_id: receipt.device_id,
                receipt_global_no: a.original_receipt_global_no,
                fiscal_day_no: a.original_fiscal_day_no,
                receipt_id: a.original_remote_id,
            }),
            receipt_device_signature: SignatureDto {
                hash: receipt.digest.clone(),
                signature: receipt.signature.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceiptRequest {
    pub receipt: ReceiptDto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceiptResponse {
    pub receipt_id: i64,
    #[serde(default)]
    pub operation_id: Option<String>,
    #[serde(default)]
    pub receipt_server_signature: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenDayRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fiscal_day_no: Option<i32>,
    pub fiscal_day_opened: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenDayResponse {
    pub fiscal_day_no: i32,
    #[serde(default)]
    pub operation_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterDto {
    pub fiscal_counter_type: String,
    pub fiscal_counter_currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fiscal_counter_tax_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fiscal_counter_tax_percent: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fiscal_counter_money_type: Option<String>,
    pub fiscal_counter_value: Decimal,
}

impl From<&DayCounter> for CounterDto {
    fn from(c: &DayCounter) -> Self {
        Self {
            fiscal_counter_type: c.kind.wire_name().to_string(),
            fiscal_counter_currency: c.currency.to_uppercase(),
            fiscal_counter_tax_id: c.tax_id,
            fiscal_counter_tax_percent: c.tax_percent,
            fiscal_counter_money_type: c.money_type.clone(),
            fiscal_counter_value: c.value,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseDayRequest {
    pub fiscal_day_no: i32,
    pub fiscal_day_counters: Vec<CounterDto>,
    pub fiscal_day_device_signature: SignatureDto,
    /// Number of receipts fiscalized in the day.
    pub receipt_counter: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseDayResponse {
    pub operation_id: String,
}
