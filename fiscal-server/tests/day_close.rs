//! Day lifecycle: open, accumulate, close with signed counters.

mod common;

use common::{DEVICE_ID, d, invoice_draft, setup};
use fdms_cert::digest_b64;
use fiscal_server::db::repository::FiscalDayRepository;
use shared::types::FiscalDayStatus;

#[tokio::test(start_paused = true)]
async fn closing_a_day_submits_signed_counters() {
    let (service, mock, db) = setup().await;
    let day = service.open_day(DEVICE_ID).await.unwrap();
    assert_eq!(day.fiscal_day_no, 1);
    assert_eq!(day.status, FiscalDayStatus::Opened);

    service
        .submit_receipt(DEVICE_ID, invoice_draft("INV-1"))
        .await
        .unwrap();
    service
        .submit_receipt(DEVICE_ID, invoice_draft("INV-2"))
        .await
        .unwrap();

    let operation_id = service.close_day(DEVICE_ID, 1).await.unwrap();
    assert_eq!(operation_id, "op-close");

    {
        let state = mock.state.lock().unwrap();
        assert_eq!(state.close_requests.len(), 1);
        let request = &state.close_requests[0];
        assert_eq!(request.fiscal_day_no, 1);
        assert_eq!(request.receipt_counter, 2);

        let kinds: Vec<&str> = request
            .fiscal_day_counters
            .iter()
            .map(|c| c.fiscal_counter_type.as_str())
            .collect();
        assert_eq!(kinds, vec!["SaleByTax", "SaleTaxByTax", "BalanceByMoneyType"]);
        assert_eq!(request.fiscal_day_counters[0].fiscal_counter_value, d("230.00"));
        assert_eq!(request.fiscal_day_counters[1].fiscal_counter_value, d("30.00"));
        assert_eq!(
            request.fiscal_day_counters[2].fiscal_counter_money_type.as_deref(),
            Some("CASH")
        );
    }

    // Local day record reflects the resolved close and keeps the
    // submitted counter set for the auditor.
    let days = FiscalDayRepository::new(db);
    let closed = days.find(DEVICE_ID, 1).await.unwrap().unwrap();
    assert_eq!(closed.status, FiscalDayStatus::Closed);
    assert!(closed.closed_at.is_some());
    assert_eq!(closed.counters.len(), 3);
    let canonical = closed.close_canonical.unwrap();
    assert_eq!(digest_b64(&canonical), closed.close_digest.unwrap());
    assert!(canonical.starts_with("123451"));
}

#[tokio::test(start_paused = true)]
async fn an_empty_day_closes_with_no_counters() {
    let (service, mock, db) = setup().await;
    service.open_day(DEVICE_ID).await.unwrap();

    service.close_day(DEVICE_ID, 1).await.unwrap();

    let state = mock.state.lock().unwrap();
    assert!(state.close_requests[0].fiscal_day_counters.is_empty());
    assert_eq!(state.close_requests[0].receipt_counter, 0);
    drop(state);

    let days = FiscalDayRepository::new(db);
    let closed = days.find(DEVICE_ID, 1).await.unwrap().unwrap();
    assert_eq!(closed.status, FiscalDayStatus::Closed);
}

#[tokio::test(start_paused = true)]
async fn closing_an_already_closed_day_is_rejected() {
    let (service, _mock, _db) = setup().await;
    service.open_day(DEVICE_ID).await.unwrap();
    service.close_day(DEVICE_ID, 1).await.unwrap();

    let err = service.close_day(DEVICE_ID, 1).await.unwrap_err();
    assert!(matches!(err, fiscal_server::FiscalError::Validation(_)));
}

#[tokio::test(start_paused = true)]
async fn reopening_continues_the_day_numbering() {
    let (service, _mock, _db) = setup().await;
    service.open_day(DEVICE_ID).await.unwrap();
    service.close_day(DEVICE_ID, 1).await.unwrap();

    let next = service.open_day(DEVICE_ID).await.unwrap();
    assert_eq!(next.fiscal_day_no, 2);

    // Opening while a day is already open returns the same day.
    let same = service.open_day(DEVICE_ID).await.unwrap();
    assert_eq!(same.fiscal_day_no, 2);
}
