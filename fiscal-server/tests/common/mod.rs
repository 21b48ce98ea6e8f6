//! Shared test harness: an in-memory database, a scripted mock of the
//! remote fiscal service, and a registered device with a generated
//! credential pair.

#![allow(dead_code)]

use async_trait::async_trait;
use fiscal_server::FiscalService;
use fiscal_server::db::models::FiscalDevice;
use fiscal_server::config::ConfigSource;
use fiscal_server::db::repository::{DeviceConfigRepository, ReceiptRepository};
use fiscal_server::fdms::{
    CloseDayRequest, CloseDayResponse, ConfigResponse, FdmsApi, FdmsError, FdmsResult,
    OpenDayRequest, OpenDayResponse, ReceiptDto, StatusResponse, SubmitReceiptRequest,
    SubmitReceiptResponse, TaxDto,
};
use fiscal_server::submit::ReceiptDraft;
use rust_decimal::Decimal;
use shared::types::{DocumentType, FiscalDayStatus, MoneyType};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

pub const DEVICE_ID: i64 = 12345;

pub struct MockState {
    pub online: bool,
    pub day_status: FiscalDayStatus,
    pub day_no: i32,
    pub last_global_no: i64,
    pub next_remote_id: i64,
    /// Sequence numbers the mock rejects with a 400.
    pub reject: HashSet<i64>,
    /// Every accepted receipt payload, in acceptance order.
    pub submitted: Vec<ReceiptDto>,
    pub close_requests: Vec<CloseDayRequest>,
}

pub struct MockFdms {
    pub state: Mutex<MockState>,
}

impl MockFdms {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                online: true,
                day_status: FiscalDayStatus::Closed,
                day_no: 0,
                last_global_no: 0,
                next_remote_id: 1,
                reject: HashSet::new(),
                submitted: Vec::new(),
                close_requests: Vec::new(),
            }),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.state.lock().unwrap().online = online;
    }

    pub fn reject_global_no(&self, global_no: i64) {
        self.state.lock().unwrap().reject.insert(global_no);
    }

    pub fn accepted_count(&self) -> usize {
        self.state.lock().unwrap().submitted.len()
    }
}

#[async_trait]
impl FdmsApi for MockFdms {
    async fn get_status(&self, _device_id: i64) -> FdmsResult<StatusResponse> {
        let state = self.state.lock().unwrap();
        if !state.online {
            return Err(FdmsError::Network("connection refused".to_string()));
        }
        Ok(StatusResponse {
            fiscal_day_status: state.day_status,
            last_fiscal_day_no: Some(state.day_no),
            last_receipt_global_no: Some(state.last_global_no),
            fiscal_day_closing_error_code: None,
        })
    }

    async fn get_config(&self, _device_id: i64) -> FdmsResult<ConfigResponse> {
        let state = self.state.lock().unwrap();
        if !state.online {
            return Err(FdmsError::Network("connection refused".to_string()));
        }
        Ok(ConfigResponse {
            currencies: vec!["USD".to_string()],
            applicable_taxes: vec![
                TaxDto {
                    tax_id: 1,
                    tax_code: "A".to_string(),
                    tax_percent: Some(Decimal::ZERO),
                },
                TaxDto {
                    tax_id: 3,
                    tax_code: "C".to_string(),
                    tax_percent: Some("15".parse().unwrap()),
                },
            ],
        })
    }

    async fn submit_receipt(
        &self,
        _device_id: i64,
        request: &SubmitReceiptRequest,
    ) -> FdmsResult<SubmitReceiptResponse> {
        let mut state = self.state.lock().unwrap();
        if !state.online {
            return Err(FdmsError::Network("connection refused".to_string()));
        }
        let global_no = request.receipt.receipt_global_no;
        if state.reject.contains(&global_no) {
            return Err(FdmsError::Rejected {
                status: 400,
                message: format!("receipt {} rejected", global_no),
            });
        }
        state.last_global_no = state.last_global_no.max(global_no);
        state.submitted.push(request.receipt.clone());
        let receipt_id = state.next_remote_id;
        state.next_remote_id += 1;
        Ok(SubmitReceiptResponse {
            receipt_id,
            operation_id: Some(format!("op-{}", receipt_id)),
            receipt_server_signature: None,
        })
    }

    async fn open_day(
        &self,
        _device_id: i64,
        request: &OpenDayRequest,
    ) -> FdmsResult<OpenDayResponse> {
        let mut state = self.state.lock().unwrap();
        if !state.online {
            return Err(FdmsError::Network("connection refused".to_string()));
        }
        state.day_no = request.fiscal_day_no.unwrap_or(state.day_no + 1);
        state.day_status = FiscalDayStatus::Opened;
        Ok(OpenDayResponse {
            fiscal_day_no: state.day_no,
            operation_id: Some("op-open".to_string()),
        })
    }

    async fn close_day(
        &self,
        _device_id: i64,
        request: &CloseDayRequest,
    ) -> FdmsResult<CloseDayResponse> {
        let mut state = self.state.lock().unwrap();
        if !state.online {
            return Err(FdmsError::Network("connection refused".to_string()));
        }
        state.close_requests.push(request.clone());
        // The mock resolves the asynchronous close immediately.
        state.day_status = FiscalDayStatus::Closed;
        Ok(CloseDayResponse {
            operation_id: "op-close".to_string(),
        })
    }
}

pub fn credential() -> (String, String) {
    let key_pair = rcgen::KeyPair::generate().unwrap();
    let cert = rcgen::CertificateParams::new(vec!["device-12345.fiscal.local".to_string()])
        .unwrap()
        .self_signed(&key_pair)
        .unwrap();
    (cert.pem(), key_pair.serialize_pem())
}

/// In-memory service with one registered device and the mock remote.
pub async fn setup() -> (FiscalService, Arc<MockFdms>, Surreal<Db>) {
    let db = fiscal_server::db::connect_memory().await.unwrap();
    let mock = Arc::new(MockFdms::new());
    let service = FiscalService::new(db.clone(), mock.clone());

    let (certificate_pem, private_key_pem) = credential();
    service
        .register_device(FiscalDevice {
            id: None,
            device_id: DEVICE_ID,
            certificate_pem,
            private_key_pem,
            is_registered: true,
            last_fiscal_day_no: None,
            last_receipt_global_no: None,
            fiscal_day_status: None,
            created_at: shared::util::now_millis(),
        })
        .await
        .unwrap();

    // Cache a configuration snapshot so offline scenarios start from a
    // device that has talked to the remote at least once.
    ConfigSource::new(DeviceConfigRepository::new(db.clone()))
        .ensure_fresh(mock.as_ref(), DEVICE_ID)
        .await
        .unwrap();

    (service, mock, db)
}

pub fn d(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// One-line tax-inclusive invoice: 115.00 USD at 15% VAT, paid cash.
pub fn invoice_draft(invoice_no: &str) -> ReceiptDraft {
    ReceiptDraft {
        document_type: DocumentType::Invoice,
        currency: "USD".to_string(),
        invoice_no: invoice_no.to_string(),
        // Wall-clock date, so adjustment age checks hold whenever the
        // suite runs.
        receipt_date: shared::util::now_naive(),
        lines: vec![fiscal_server::db::models::ReceiptLine {
            line_no: 1,
            name: "Widget".to_string(),
            quantity: Decimal::ONE,
            unit_price: d("115.00"),
            total: d("115.00"),
            tax_id: 3,
            tax_code: "C".to_string(),
            tax_percent: Some(d("15")),
            hs_code: "8471".to_string(),
        }],
        payments: vec![fiscal_server::db::models::ReceiptPayment {
            money_type: MoneyType::Cash,
            amount: d("115.00"),
        }],
        lines_tax_inclusive: true,
        taxes: None,
        adjustment: None,
    }
}

pub fn receipt_repo(db: &Surreal<Db>) -> ReceiptRepository {
    ReceiptRepository::new(db.clone())
}
