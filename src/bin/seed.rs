use chrono::{Duration, Utc};
use clap::Parser;
use fake::{
    faker::{company::en::Buzzword, lorem::en::Sentence},
    Fake,
};
use rand::seq::SliceRandom;
use sqlx::sqlite::SqlitePoolOptions;

use payment_service::{
    domain::{NewPayment, PaymentStatus, UpdatePayment},
    invoice::{generate_invoice_number, wib},
    repository::{
        PaymentHistoryRepository, PaymentRepository, SqlitePaymentHistoryRepository,
        SqlitePaymentRepository,
    },
};

/// Fill a development database with sample payments.
#[derive(Debug, Parser)]
struct Args {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://payment.db?mode=rwc")]
    database_url: String,

    /// Number of payments to create
    #[arg(long, default_value_t = 25)]
    count: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    println!("🌱 Seeding {} payments into {}", args.count, args.database_url);

    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&args.database_url)
        .await?;

    println!("📋 Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let payment_repo = SqlitePaymentRepository::new(db_pool.clone());
    let history_repo = SqlitePaymentHistoryRepository::new(db_pool.clone());
    let banks = ["bca", "bni", "bri", "mandiri", "permata"];
    let now = Utc::now();

    let mut tx = db_pool.begin().await?;
    for n in 0..args.count {
        let order_id = format!("SEED-{}-{:04}", now.timestamp(), n);
        let label: String = Buzzword().fake();
        let description: String = Sentence(3..6).fake();

        let payment = payment_repo
            .create(&mut *tx, NewPayment {
                order_id: order_id.clone(),
                amount: (10_000..2_000_000i64).fake::<i64>() / 1_000 * 1_000,
                status: PaymentStatus::Initial,
                payment_link: format!("https://app.sandbox.midtrans.com/snap/v2/vtweb/{}", uuid::Uuid::new_v4()),
                description: Some(format!("{}: {}", label, description)),
                expired_at: now + Duration::hours((1..72i64).fake::<i64>()),
            })
            .await?;
        history_repo.create(&mut *tx, payment.id, PaymentStatus::Initial).await?;

        let status = *PaymentStatus::ALL
            .choose(&mut rand::thread_rng())
            .unwrap_or(&PaymentStatus::Initial);
        if status == PaymentStatus::Initial {
            continue;
        }

        let bank = banks.choose(&mut rand::thread_rng()).copied().unwrap_or("bca");
        let settled = status == PaymentStatus::Settlement;
        payment_repo
            .update(&mut *tx, &order_id, UpdatePayment {
                transaction_id: Some(uuid::Uuid::new_v4().to_string()),
                status: Some(status),
                va_number: Some(format!("{:011}", (0..99_999_999_999u64).fake::<u64>())),
                bank: Some(bank.to_string()),
                paid_at: settled.then_some(now),
                invoice_number: settled
                    .then(|| generate_invoice_number(now.with_timezone(&wib()).date_naive(), &mut rand::thread_rng())),
                ..Default::default()
            })
            .await?;
        history_repo.create(&mut *tx, payment.id, status).await?;
    }
    tx.commit().await?;

    println!("  ✅ Created {} payments", args.count);
    Ok(())
}
