use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokenledger::application::engine::LedgerEngine;
use tokenledger::domain::plan::{BillingPeriod, PlanTier};
use tokenledger::domain::ports::{LedgerStore, SystemClock};
use tokenledger::error::LedgerError;
use tokenledger::infrastructure::in_memory::InMemoryStore;
#[cfg(feature = "storage-rocksdb")]
use tokenledger::infrastructure::rocksdb::RocksStore;
use tokenledger::infrastructure::sandbox::{NullProvisioner, SandboxGateway};
use tokenledger::interfaces::csv::op_reader::{OpKind, OpReader, Operation};
use tokenledger::interfaces::csv::report_writer::{ReportRow, ReportWriter};

/// Session marker stamped into sandbox payment orders created by this driver.
const CLI_SESSION: &str = "cli";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input operations CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(db_path) => {
            let store = RocksStore::open(db_path).into_diagnostic()?;
            run(make_engine(store), &cli.input).await
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => Err(miette::miette!(
            "--db-path requires the storage-rocksdb feature"
        )),
        None => run(make_engine(InMemoryStore::new()), &cli.input).await,
    }
}

fn make_engine<S: LedgerStore>(store: S) -> LedgerEngine<S> {
    LedgerEngine::new(
        store,
        Arc::new(SandboxGateway::new()),
        Arc::new(NullProvisioner),
        Arc::new(SystemClock),
    )
}

async fn run<S: LedgerStore>(engine: LedgerEngine<S>, input: &PathBuf) -> Result<()> {
    let file = File::open(input).into_diagnostic()?;
    let reader = OpReader::new(file);
    for op_result in reader.operations() {
        match op_result {
            Ok(op) => {
                if let Err(e) = execute(&engine, &op).await {
                    eprintln!("Error executing operation: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading operation: {}", e);
            }
        }
    }

    // Reconcile every user first; a due transition may still move tokens.
    let mut statuses = std::collections::HashMap::new();
    for user in engine.store().list_users().into_diagnostic()? {
        let status = engine
            .subscription_status(&user.user_id)
            .await
            .into_diagnostic()?;
        statuses.insert(user.user_id, status);
    }

    let mut rows = Vec::new();
    for user in engine.store().list_users().into_diagnostic()? {
        let status = statuses.remove(&user.user_id);
        let (plan, state, days_remaining) = match status.as_ref().and_then(|s| s.subscription.as_ref())
        {
            Some(sub) => (
                sub.tier.as_str().to_string(),
                sub.status.as_str().to_string(),
                status.as_ref().map_or(0, |s| s.days_remaining),
            ),
            None => ("-".to_string(), "none".to_string(), 0),
        };
        rows.push(ReportRow {
            user: user.user_id,
            balance: user.token_balance,
            plan,
            status: state,
            days_remaining,
        });
    }

    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    writer.write_rows(rows).into_diagnostic()?;

    Ok(())
}

async fn execute<S: LedgerStore>(
    engine: &LedgerEngine<S>,
    op: &Operation,
) -> tokenledger::error::Result<()> {
    match op.op {
        OpKind::Register => {
            let email = op.require(&op.a, "email")?;
            let username = op.require(&op.b, "username")?;
            engine.create_user(&op.user, email, username).await?;
        }
        OpKind::Link => {
            let service = op.require(&op.a, "service")?;
            let account_id = op.require(&op.b, "account_id")?;
            engine.link_service(&op.user, service, account_id).await?;
        }
        OpKind::Purchase => {
            let tokens = parse_u64(op.require(&op.a, "tokens")?)?;
            let order_id = engine
                .create_purchase_order(&op.user, CLI_SESSION, tokens)
                .await?;
            engine
                .apply_purchase(&op.user, CLI_SESSION, &order_id)
                .await?;
        }
        OpKind::Tip => {
            let amount = op.require(&op.a, "amount")?;
            let order_id = engine
                .create_tip_order(&op.user, CLI_SESSION, amount)
                .await?;
            engine.apply_tip(&op.user, CLI_SESSION, &order_id).await?;
        }
        OpKind::Trade => {
            let receiver = op.require(&op.a, "receiver")?;
            let tokens = parse_u64(op.require(&op.b, "tokens")?)?;
            engine.trade_tokens(&op.user, receiver, tokens).await?;
        }
        OpKind::Subscribe => {
            let tier = PlanTier::parse(op.require(&op.a, "tier")?)?;
            let period = BillingPeriod::parse(op.require(&op.b, "period")?)?;
            let duration = parse_u64(op.require(&op.c, "duration")?)? as u32;
            let pro_rate_credit = match op.d.as_deref().filter(|s| !s.is_empty()) {
                Some(s) => parse_u64(s)?,
                None => 0,
            };
            engine
                .change_subscription(&op.user, tier, period, duration, pro_rate_credit)
                .await?;
        }
        OpKind::CancelDowngrade => {
            engine.cancel_scheduled_downgrade(&op.user).await?;
        }
        OpKind::Status => {
            engine.subscription_status(&op.user).await?;
        }
    }
    Ok(())
}

fn parse_u64(s: &str) -> tokenledger::error::Result<u64> {
    s.parse::<u64>()
        .map_err(|_| LedgerError::InvalidArgument(format!("malformed number: {s:?}")))
}
