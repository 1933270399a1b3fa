mod common;

use chrono::{Duration, Utc};
use common::{count, file_pool, test_pool};
use payment_service::{
    domain::{NewPayment, PaymentListParams, PaymentStatus, SortColumn, SortOrder, UpdatePayment},
    error::AppError,
    repository::{
        PaymentHistoryRepository, PaymentRepository, SqlitePaymentHistoryRepository,
        SqlitePaymentRepository, WriteTransaction,
    },
};

fn new_payment(order_id: &str, amount: i64) -> NewPayment {
    NewPayment {
        order_id: order_id.to_string(),
        amount,
        status: PaymentStatus::Initial,
        payment_link: format!("https://pay.test/snap/{}", order_id),
        description: None,
        expired_at: Utc::now() + Duration::hours(1),
    }
}

#[tokio::test]
async fn test_payment_crud() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = SqlitePaymentRepository::new(pool.clone());

    let mut tx = pool.begin().await?;
    let payment = repo.create(&mut *tx, new_payment("ORD-1", 50_000)).await?;
    tx.commit().await?;

    assert_eq!(payment.order_id, "ORD-1");
    assert_eq!(payment.status, PaymentStatus::Initial);
    assert!(payment.invoice_link.is_none());

    // Find by UUID
    let found = repo.find_by_uuid(payment.uuid).await?;
    assert_eq!(found.map(|p| p.id), Some(payment.id));
    assert!(repo.find_by_uuid(uuid::Uuid::new_v4()).await?.is_none());

    // Partial updates only touch what they carry
    let mut conn = pool.acquire().await?;
    repo.update(&mut *conn, "ORD-1", UpdatePayment {
        status: Some(PaymentStatus::Settlement),
        bank: Some("bni".to_string()),
        va_number: Some("999".to_string()),
        invoice_link: Some("https://storage.test/a.pdf".to_string()),
        invoice_number: Some("INV/2024-03-05/ORD/123456".to_string()),
        paid_at: Some(Utc::now()),
        ..Default::default()
    }).await?;
    repo.update(&mut *conn, "ORD-1", UpdatePayment {
        transaction_id: Some("trx-9".to_string()),
        ..Default::default()
    }).await?;

    let updated = repo.find_by_order_id(&mut *conn, "ORD-1").await?.unwrap();
    assert_eq!(updated.status, PaymentStatus::Settlement);
    assert_eq!(updated.transaction_id.as_deref(), Some("trx-9"));
    assert_eq!(updated.bank.as_deref(), Some("bni"));
    assert_eq!(updated.va_number.as_deref(), Some("999"));
    assert_eq!(updated.invoice_link.as_deref(), Some("https://storage.test/a.pdf"));
    assert!(updated.paid_at.is_some());
    assert!(updated.updated_at >= payment.updated_at);

    assert!(repo.invoice_number_exists(&mut *conn, "INV/2024-03-05/ORD/123456").await?);
    assert!(!repo.invoice_number_exists(&mut *conn, "INV/2024-03-05/ORD/654321").await?);

    let err = repo
        .update(&mut *conn, "ORD-404", UpdatePayment::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PaymentNotFound));

    Ok(())
}

#[tokio::test]
async fn test_status_stored_as_code_and_token() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = SqlitePaymentRepository::new(pool.clone());
    let history_repo = SqlitePaymentHistoryRepository::new(pool.clone());

    let mut tx = pool.begin().await?;
    let payment = repo.create(&mut *tx, new_payment("ORD-1", 50_000)).await?;
    repo.update(&mut *tx, "ORD-1", UpdatePayment {
        status: Some(PaymentStatus::Expired),
        ..Default::default()
    }).await?;
    history_repo.create(&mut *tx, payment.id, PaymentStatus::Expired).await?;
    tx.commit().await?;

    let code: i32 = sqlx::query_scalar("SELECT status FROM payments WHERE id = ?")
        .bind(payment.id)
        .fetch_one(&pool)
        .await?;
    assert_eq!(code, 300);

    let token: String = sqlx::query_scalar("SELECT status FROM payment_histories WHERE payment_id = ?")
        .bind(payment.id)
        .fetch_one(&pool)
        .await?;
    assert_eq!(token, "expired");

    Ok(())
}

#[tokio::test]
async fn test_unknown_stored_status_is_an_error() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = SqlitePaymentRepository::new(pool.clone());

    let mut tx = pool.begin().await?;
    let payment = repo.create(&mut *tx, new_payment("ORD-1", 50_000)).await?;
    tx.commit().await?;

    sqlx::query("UPDATE payments SET status = 150 WHERE id = ?")
        .bind(payment.id)
        .execute(&pool)
        .await?;

    let err = repo.find_by_uuid(payment.uuid).await.unwrap_err();
    assert!(matches!(err, AppError::Database(_)));

    Ok(())
}

#[tokio::test]
async fn test_dropped_transaction_rolls_back() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = SqlitePaymentRepository::new(pool.clone());
    let history_repo = SqlitePaymentHistoryRepository::new(pool.clone());

    {
        let mut tx = pool.begin().await?;
        let payment = repo.create(&mut *tx, new_payment("ORD-1", 50_000)).await?;
        history_repo.create(&mut *tx, payment.id, PaymentStatus::Initial).await?;
        // no commit
    }

    let payments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments")
        .fetch_one(&pool)
        .await?;
    let histories: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payment_histories")
        .fetch_one(&pool)
        .await?;
    assert_eq!((payments, histories), (0, 0));

    Ok(())
}

#[tokio::test]
async fn test_write_transaction_commit_rollback_and_drop() -> anyhow::Result<()> {
    let (pool, _db) = file_pool(2).await?;
    let repo = SqlitePaymentRepository::new(pool.clone());

    let mut tx = WriteTransaction::begin(&pool).await?;
    repo.create(&mut tx, new_payment("ORD-1", 10_000)).await?;
    tx.rollback().await?;
    assert_eq!(count(&pool, "payments").await?, 0);

    let mut tx = WriteTransaction::begin(&pool).await?;
    repo.create(&mut tx, new_payment("ORD-2", 20_000)).await?;
    tx.commit().await?;
    assert_eq!(count(&pool, "payments").await?, 1);

    {
        let mut tx = WriteTransaction::begin(&pool).await?;
        repo.create(&mut tx, new_payment("ORD-3", 30_000)).await?;
        // no commit
    }
    let orders: Vec<String> = sqlx::query_scalar("SELECT order_id FROM payments")
        .fetch_all(&pool)
        .await?;
    assert_eq!(orders, vec!["ORD-2"]);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_write_transactions_wait_for_each_other() -> anyhow::Result<()> {
    let (pool, _db) = file_pool(2).await?;
    let repo = SqlitePaymentRepository::new(pool.clone());

    let mut first = WriteTransaction::begin(&pool).await?;
    repo.find_by_order_id(&mut first, "ORD-1").await?;

    let second = tokio::spawn({
        let pool = pool.clone();
        async move {
            let mut tx = WriteTransaction::begin(&pool).await?;
            let repo = SqlitePaymentRepository::new(pool.clone());
            let found = repo.find_by_order_id(&mut tx, "ORD-1").await?;
            tx.commit().await?;
            payment_service::error::Result::Ok(found.map(|p| p.amount))
        }
    });

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert!(!second.is_finished());

    repo.create(&mut first, new_payment("ORD-1", 10_000)).await?;
    first.commit().await?;

    // The second writer starts after the first commits and sees its row.
    assert_eq!(second.await??, Some(10_000));

    Ok(())
}

#[tokio::test]
async fn test_list_sorts_and_paginates() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = SqlitePaymentRepository::new(pool.clone());

    let mut tx = pool.begin().await?;
    for (order, amount) in [("ORD-1", 40_000), ("ORD-2", 10_000), ("ORD-3", 30_000), ("ORD-4", 20_000)] {
        repo.create(&mut *tx, new_payment(order, amount)).await?;
    }
    tx.commit().await?;

    let (first, total) = repo.list(&PaymentListParams {
        page: 1,
        limit: 3,
        sort_column: SortColumn::Amount,
        sort_order: SortOrder::Desc,
    }).await?;
    assert_eq!(total, 4);
    let amounts: Vec<i64> = first.iter().map(|p| p.amount).collect();
    assert_eq!(amounts, vec![40_000, 30_000, 20_000]);

    let (second, _) = repo.list(&PaymentListParams {
        page: 2,
        limit: 3,
        sort_column: SortColumn::Amount,
        sort_order: SortOrder::Desc,
    }).await?;
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].order_id, "ORD-2");

    let (by_order, _) = repo.list(&PaymentListParams {
        sort_column: SortColumn::OrderId,
        sort_order: SortOrder::Asc,
        ..PaymentListParams::default()
    }).await?;
    let orders: Vec<&str> = by_order.iter().map(|p| p.order_id.as_str()).collect();
    assert_eq!(orders, vec!["ORD-1", "ORD-2", "ORD-3", "ORD-4"]);

    Ok(())
}

#[tokio::test]
async fn test_history_is_listed_oldest_first() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = SqlitePaymentRepository::new(pool.clone());
    let history_repo = SqlitePaymentHistoryRepository::new(pool.clone());

    let mut tx = pool.begin().await?;
    let payment = repo.create(&mut *tx, new_payment("ORD-1", 50_000)).await?;
    for status in [PaymentStatus::Initial, PaymentStatus::Pending, PaymentStatus::Settlement] {
        history_repo.create(&mut *tx, payment.id, status).await?;
    }
    tx.commit().await?;

    let history = history_repo.list_by_payment(payment.id).await?;
    let statuses: Vec<PaymentStatus> = history.iter().map(|h| h.status).collect();
    assert_eq!(
        statuses,
        vec![PaymentStatus::Initial, PaymentStatus::Pending, PaymentStatus::Settlement]
    );
    assert!(history.iter().all(|h| h.payment_id == payment.id));
    assert!(history_repo.list_by_payment(payment.id + 1).await?.is_empty());

    Ok(())
}
