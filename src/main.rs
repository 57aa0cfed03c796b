//! Command-line client for the lending ledger: submits and evaluates named operations
//! against a local sled-backed ledger.

use anyhow::Context;
use clap::{Parser, Subcommand};
use loan_ledger::{
    CallerIdentity, LendingConfig, LendingContract, LendingError, LoanService, Operation,
    SledLedger, utils,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "loan-ledger", version, about = "Peer-to-peer loan lifecycle on a local ledger")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// sled database directory (overrides LENDING_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Organisation the caller presents (overrides LENDING_CALLER_ORG)
    #[arg(long, global = true)]
    org: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a transaction and commit its writes
    Submit {
        function: String,
        args: Vec<String>,
    },
    /// Evaluate an operation without committing anything
    Evaluate {
        function: String,
        args: Vec<String>,
    },
    /// Print and verify the write history of a loan
    History { loan_id: String },
    /// Request, approve, disburse, repay and default a loan, querying it after each step
    Demo {
        #[arg(long)]
        loan_id: Option<String>,
    },
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = match LendingConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(db) = cli.db.clone() {
        config.db_path = db;
    }
    if let Some(org) = cli.org.clone() {
        config.caller_org = org;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    match run(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<LendingError>() {
                Some(e) => eprintln!("{}: {e}", e.kind()),
                None => eprintln!("error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands, config: &LendingConfig) -> anyhow::Result<()> {
    let ledger = SledLedger::open(&config.db_path)
        .with_context(|| format!("opening ledger at {}", config.db_path.display()))?;
    let contract = LendingContract::new(LoanService::from_config(config));
    let caller = CallerIdentity::new(config.caller_org.clone());

    match command {
        Commands::Submit { function, args } => {
            let payload = submit(&ledger, &contract, &caller, &function, &args)?;
            print_payload(&payload);
            println!("*** Transaction committed successfully");
        }
        Commands::Evaluate { function, args } => {
            let payload = evaluate(&ledger, &contract, &caller, &function, &args)?;
            print_payload(&payload);
        }
        Commands::History { loan_id } => {
            for witness in ledger.history(&loan_id)? {
                println!(
                    "{:>4}  {}  {}  {}  {}",
                    witness.sequence,
                    witness.timestamp.to_datetime_utc().to_rfc3339(),
                    witness.tx_id,
                    witness.submitter,
                    witness.value_hash
                );
            }
            let writes = ledger.verify_history(&loan_id)?;
            println!("*** {writes} writes verified for {loan_id}");
        }
        Commands::Demo { loan_id } => {
            let loan_id = match loan_id {
                Some(id) => id,
                None => utils::new_uuid_to_bech32("loan")?,
            };
            demo(&ledger, &contract, &caller, &loan_id)?;
        }
    }

    ledger.flush()?;
    Ok(())
}

fn submit(
    ledger: &SledLedger,
    contract: &LendingContract,
    caller: &CallerIdentity,
    function: &str,
    args: &[String],
) -> Result<Vec<u8>, LendingError> {
    ledger.submit(caller, |tx| contract.invoke(tx, caller, function, args))
}

fn evaluate(
    ledger: &SledLedger,
    contract: &LendingContract,
    caller: &CallerIdentity,
    function: &str,
    args: &[String],
) -> Result<Vec<u8>, LendingError> {
    ledger.evaluate(caller, |tx| contract.invoke(tx, caller, function, args))
}

fn demo(
    ledger: &SledLedger,
    contract: &LendingContract,
    caller: &CallerIdentity,
    loan_id: &str,
) -> anyhow::Result<()> {
    let steps: [(Operation, Vec<&str>); 5] = [
        (
            Operation::RequestLoan,
            vec![loan_id, "borrower0001", "1000", "5", "365"],
        ),
        (Operation::ApproveLoan, vec![loan_id, "lender0001"]),
        (Operation::DisburseLoan, vec![loan_id, "31/03/2025"]),
        (Operation::RepayLoan, vec![loan_id, "300"]),
        (Operation::MarkAsDefaulted, vec![loan_id]),
    ];

    for (op, args) in steps {
        let args: Vec<String> = args.into_iter().map(str::to_string).collect();
        println!("\n--> Submit Transaction: {op}");
        submit(ledger, contract, caller, op.name(), &args)
            .with_context(|| format!("failed to submit {op}"))?;
        println!("*** Transaction committed successfully");

        println!("\n--> Evaluate Transaction: {}", Operation::QueryLoan);
        let payload = evaluate(
            ledger,
            contract,
            caller,
            Operation::QueryLoan.name(),
            &[loan_id.to_string()],
        )
        .context("failed to evaluate QueryLoan")?;
        println!("*** Query Loan by Id result: {}", String::from_utf8_lossy(&payload));
    }

    Ok(())
}

fn print_payload(payload: &[u8]) {
    if !payload.is_empty() {
        println!("{}", String::from_utf8_lossy(payload));
    }
}
