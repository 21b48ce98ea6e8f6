//! Integrity audit
//!
//! Replays the whole receipt history of a device: rebuilds every
//! canonical string, recomputes the digest chain from scratch, verifies
//! every stored signature against the device certificate, and rebuilds
//! each closed day's counter set. The stored digests are never trusted;
//! the chain is recomputed independently so a mutated ancestor cannot
//! hide behind consistent-looking descendants.

use crate::canonical::{ReceiptFields, encode_receipt};
use crate::common::error::FiscalResult;
use crate::counters::{aggregate_day_counters, counters_match};
use crate::db::models::{FiscalDay, FiscalDevice, Receipt};
use crate::db::repository::{FiscalDayRepository, ReceiptRepository};
use fdms_cert::{SignatureEngine, VerifyFailure, digest_b64};

/// One receipt-level finding.
#[derive(Debug, Clone)]
pub struct ReceiptDefect {
    pub device_id: i64,
    pub fiscal_day_no: i32,
    pub receipt_global_no: i64,
    pub detail: String,
}

/// One day-level finding.
#[derive(Debug, Clone)]
pub struct CounterDefect {
    pub device_id: i64,
    pub fiscal_day_no: i32,
    pub detail: String,
}

/// Everything one audit pass found, split by defect class.
///
/// A single mutated receipt shows up exactly once as a digest defect;
/// its descendants surface as chain defects because their stored
/// previous-hash no longer matches the recomputed chain.
#[derive(Debug, Default)]
pub struct AuditReport {
    pub receipts_checked: usize,
    pub days_checked: usize,
    /// Counter sequence breaks and links onto corrupted predecessors.
    pub chain_defects: Vec<ReceiptDefect>,
    /// Receipts whose own stored fields no longer produce their digest.
    pub digest_defects: Vec<ReceiptDefect>,
    /// Digest intact but the signature fails against the certificate.
    pub signature_defects: Vec<ReceiptDefect>,
    /// Day counter sets that disagree with an independent rebuild.
    pub counter_defects: Vec<CounterDefect>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.chain_defects.is_empty()
            && self.digest_defects.is_empty()
            && self.signature_defects.is_empty()
            && self.counter_defects.is_empty()
    }

    /// Fold another device's report into this one.
    pub fn merge(&mut self, other: AuditReport) {
        self.receipts_checked += other.receipts_checked;
        self.days_checked += other.days_checked;
        self.chain_defects.extend(other.chain_defects);
        self.digest_defects.extend(other.digest_defects);
        self.signature_defects.extend(other.signature_defects);
        self.counter_defects.extend(other.counter_defects);
    }
}

#[derive(Clone)]
pub struct IntegrityAuditor {
    receipts: ReceiptRepository,
    days: FiscalDayRepository,
}

impl IntegrityAuditor {
    pub fn new(receipts: ReceiptRepository, days: FiscalDayRepository) -> Self {
        Self { receipts, days }
    }

    /// Audit one device's full history.
    pub async fn audit_device(&self, device: &FiscalDevice) -> FiscalResult<AuditReport> {
        let engine = SignatureEngine::new(&device.certificate_pem, &device.private_key_pem)?;
        let all = self.receipts.list_all(device.device_id).await?;

        let mut report = AuditReport::default();
        audit_receipts(&engine, &all, &mut report);

        for day in self.days.list_all(device.device_id).await? {
            if day.counters.is_empty() {
                // Close never attempted for this day; nothing recorded
                // to compare against.
                continue;
            }
            let day_receipts = self
                .receipts
                .list_day(device.device_id, day.fiscal_day_no)
                .await?;
            audit_day_counters(&day, &day_receipts, &mut report);
        }

        if report.is_clean() {
            tracing::info!(
                device_id = device.device_id,
                receipts = report.receipts_checked,
                days = report.days_checked,
                "Integrity audit clean"
            );
        } else {
            tracing::error!(
                device_id = device.device_id,
                chain = report.chain_defects.len(),
                digest = report.digest_defects.len(),
                signature = report.signature_defects.len(),
                counters = report.counter_defects.len(),
                "Integrity audit found defects"
            );
        }
        Ok(report)
    }
}

/// Walk receipts in (fiscal day, counter) order, recomputing the digest
/// chain per day and verifying each stored signature.
pub fn audit_receipts(engine: &SignatureEngine, receipts: &[Receipt], report: &mut AuditReport) {
    let mut current_day: Option<i32> = None;
    // Digest chain rebuilt from scratch, independent of stored digests.
    let mut prev_recomputed: Option<String> = None;
    // Stored digest of the predecessor, used only for classification.
    let mut prev_stored: Option<String> = None;
    let mut prev_counter: Option<i32> = None;

    for receipt in receipts {
        report.receipts_checked += 1;
        if current_day != Some(receipt.fiscal_day_no) {
            current_day = Some(receipt.fiscal_day_no);
            prev_recomputed = None;
            prev_stored = None;
            prev_counter = None;
        }

        match prev_counter {
            None if receipt.receipt_counter != 1 => report.chain_defects.push(defect(
                receipt,
                format!(
                    "Day starts at counter {} instead of 1",
                    receipt.receipt_counter
                ),
            )),
            Some(prev) if receipt.receipt_counter != prev + 1 => report.chain_defects.push(
                defect(
                    receipt,
                    format!("Counter jumps from {} to {}", prev, receipt.receipt_counter),
                ),
            ),
            _ => {}
        }

        let rebuilt = canonical_with_prev(receipt, prev_recomputed.as_deref());
        let rebuilt_digest = digest_b64(&rebuilt);

        if rebuilt_digest == receipt.digest {
            verify_signature(engine, receipt, &rebuilt, report);
        } else {
            // Distinguish a mutated receipt from one that merely chains
            // onto a corrupted predecessor: re-encode with the stored
            // previous digest and see whether the receipt is internally
            // consistent.
            let with_stored_prev = canonical_with_prev(receipt, prev_stored.as_deref());
            if digest_b64(&with_stored_prev) == receipt.digest {
                report.chain_defects.push(defect(
                    receipt,
                    "Chains onto a predecessor whose digest no longer verifies".to_string(),
                ));
                verify_signature(engine, receipt, &with_stored_prev, report);
            } else {
                report.digest_defects.push(defect(
                    receipt,
                    "Stored fields no longer produce the stored digest".to_string(),
                ));
            }
        }

        prev_recomputed = Some(rebuilt_digest);
        prev_stored = Some(receipt.digest.clone());
        prev_counter = Some(receipt.receipt_counter);
    }
}

/// Rebuild a day's counters from its receipts and compare against the
/// set recorded at close, along with the recorded close digest.
pub fn audit_day_counters(day: &FiscalDay, receipts: &[Receipt], report: &mut AuditReport) {
    report.days_checked += 1;

    match aggregate_day_counters(receipts) {
        Ok(rebuilt) => {
            if !counters_match(&rebuilt, &day.counters) {
                report.counter_defects.push(CounterDefect {
                    device_id: day.device_id,
                    fiscal_day_no: day.fiscal_day_no,
                    detail: "Recorded counters disagree with a rebuild from receipts".to_string(),
                });
            }
        }
        Err(e) => report.counter_defects.push(CounterDefect {
            device_id: day.device_id,
            fiscal_day_no: day.fiscal_day_no,
            detail: format!("Counter rebuild failed: {}", e),
        }),
    }

    if let (Some(canonical), Some(digest)) = (&day.close_canonical, &day.close_digest)
        && &digest_b64(canonical) != digest
    {
        report.counter_defects.push(CounterDefect {
            device_id: day.device_id,
            fiscal_day_no: day.fiscal_day_no,
            detail: "Close canonical no longer produces the recorded digest".to_string(),
        });
    }
}

fn canonical_with_prev(receipt: &Receipt, previous_hash: Option<&str>) -> String {
    encode_receipt(&ReceiptFields {
        device_id: receipt.device_id,
        document_type: receipt.document_type,
        currency: &receipt.currency,
        receipt_global_no: receipt.receipt_global_no,
        receipt_date: receipt.receipt_date,
        total: receipt.total,
        taxes: &receipt.taxes,
        previous_hash,
    })
}

fn verify_signature(
    engine: &SignatureEngine,
    receipt: &Receipt,
    canonical: &str,
    report: &mut AuditReport,
) {
    match engine.verify(canonical, &receipt.digest, &receipt.signature) {
        Ok(Ok(())) => {}
        Ok(Err(VerifyFailure::DigestMismatch)) => {
            // Unreachable when the caller already matched the digest,
            // but recorded rather than silently dropped.
            report.digest_defects.push(defect(
                receipt,
                "Digest mismatch during signature verification".to_string(),
            ));
        }
        Ok(Err(VerifyFailure::BadSignature(e))) => {
            report.signature_defects.push(defect(receipt, e));
        }
        Err(e) => {
            report
                .signature_defects
                .push(defect(receipt, format!("Unverifiable signature: {}", e)));
        }
    }
}

fn defect(receipt: &Receipt, detail: String) -> ReceiptDefect {
    ReceiptDefect {
        device_id: receipt.device_id,
        fiscal_day_no: receipt.fiscal_day_no,
        receipt_global_no: receipt.receipt_global_no,
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainState;
    use rust_decimal::Decimal;
    use shared::types::DocumentType;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn engine() -> SignatureEngine {
        let key_pair = rcgen::KeyPair::generate().unwrap();
        let cert = rcgen::CertificateParams::new(vec!["device-1.fiscal.local".to_string()])
            .unwrap()
            .self_signed(&key_pair)
            .unwrap();
        SignatureEngine::new(&cert.pem(), &key_pair.serialize_pem()).unwrap()
    }

    fn signed_receipt(
        engine: &SignatureEngine,
        global_no: i64,
        counter: i32,
        total: &str,
        prev: Option<&str>,
    ) -> Receipt {
        let mut receipt = Receipt {
            id: None,
            device_id: 1,
            fiscal_day_no: 1,
            receipt_global_no: global_no,
            receipt_counter: counter,
            document_type: DocumentType::Invoice,
            currency: "USD".to_string(),
            invoice_no: format!("INV-{}", global_no),
            receipt_date: chrono::NaiveDate::from_ymd_opt(2025, 2, 11)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            lines: vec![],
            taxes: vec![],
            payments: vec![],
            lines_tax_inclusive: true,
            total: d(total),
            canonical_string: String::new(),
            digest: String::new(),
            signature: String::new(),
            server_signature: None,
            remote_id: Some(global_no),
            adjustment: None,
            credit_status: Default::default(),
            credited_total: Decimal::ZERO,
            debited_total: Decimal::ZERO,
            created_at: 0,
        };
        let canonical = canonical_with_prev(&receipt, prev);
        let signed = engine.sign(&canonical).unwrap();
        receipt.canonical_string = canonical;
        receipt.digest = signed.hash;
        receipt.signature = signed.signature;
        receipt
    }

    fn chain_of_three(engine: &SignatureEngine) -> Vec<Receipt> {
        let r1 = signed_receipt(engine, 1, 1, "10.00", None);
        let r2 = signed_receipt(
            engine,
            2,
            2,
            "20.00",
            ChainState::from_last(Some(&r1)).previous_hash(),
        );
        let r3 = signed_receipt(
            engine,
            3,
            3,
            "30.00",
            ChainState::from_last(Some(&r2)).previous_hash(),
        );
        vec![r1, r2, r3]
    }

    #[test]
    fn untouched_chain_is_clean() {
        let engine = engine();
        let receipts = chain_of_three(&engine);
        let mut report = AuditReport::default();
        audit_receipts(&engine, &receipts, &mut report);
        assert!(report.is_clean(), "{:?}", report);
        assert_eq!(report.receipts_checked, 3);
    }

    #[test]
    fn mutated_receipt_is_one_digest_defect_and_one_chain_defect() {
        let engine = engine();
        let mut receipts = chain_of_three(&engine);
        receipts[1].total = d("99.00");

        let mut report = AuditReport::default();
        audit_receipts(&engine, &receipts, &mut report);

        assert_eq!(report.digest_defects.len(), 1);
        assert_eq!(report.digest_defects[0].receipt_global_no, 2);
        // Receipt 3 itself still verifies against its stored
        // predecessor digest, so it surfaces as a chain defect only.
        assert_eq!(report.chain_defects.len(), 1);
        assert_eq!(report.chain_defects[0].receipt_global_no, 3);
        assert!(report.signature_defects.is_empty());
    }

    #[test]
    fn foreign_signature_is_a_signature_defect() {
        let signer = engine();
        let verifier = engine();
        let receipts = chain_of_three(&signer);

        let mut report = AuditReport::default();
        audit_receipts(&verifier, &receipts, &mut report);

        assert_eq!(report.signature_defects.len(), 3);
        assert!(report.digest_defects.is_empty());
    }

    #[test]
    fn counter_gap_is_a_chain_defect() {
        let engine = engine();
        let r1 = signed_receipt(&engine, 1, 1, "10.00", None);
        let r2 = signed_receipt(
            &engine,
            2,
            3,
            "20.00",
            ChainState::from_last(Some(&r1)).previous_hash(),
        );

        let mut report = AuditReport::default();
        audit_receipts(&engine, &[r1, r2], &mut report);
        assert_eq!(report.chain_defects.len(), 1);
        assert!(report.digest_defects.is_empty());
    }
}
