//! Named-operation entry point: routes `function` + positional string arguments to the lifecycle
use super::error::LendingError;
use super::identity::IdentityResolver;
use super::service::LoanService;
use super::state::WorldState;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    RequestLoan,
    ApproveLoan,
    DisburseLoan,
    RepayLoan,
    MarkAsDefaulted,
    AddCollateral,
    CheckLoanStatus,
    QueryLoan,
    GetLoanHistory,
}

impl Operation {
    pub const ALL: [Operation; 9] = [
        Operation::RequestLoan,
        Operation::ApproveLoan,
        Operation::DisburseLoan,
        Operation::RepayLoan,
        Operation::MarkAsDefaulted,
        Operation::AddCollateral,
        Operation::CheckLoanStatus,
        Operation::QueryLoan,
        Operation::GetLoanHistory,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Operation::RequestLoan => "RequestLoan",
            Operation::ApproveLoan => "ApproveLoan",
            Operation::DisburseLoan => "DisburseLoan",
            Operation::RepayLoan => "RepayLoan",
            Operation::MarkAsDefaulted => "MarkAsDefaulted",
            Operation::AddCollateral => "AddCollateral",
            Operation::CheckLoanStatus => "CheckLoanStatus",
            Operation::QueryLoan => "QueryLoan",
            Operation::GetLoanHistory => "GetLoanHistory",
        }
    }

    /// Positional parameter names, in order
    pub fn params(&self) -> &'static [&'static str] {
        match self {
            Operation::RequestLoan => &["loanId", "borrowerId", "amount", "interestRate", "durationDays"],
            Operation::ApproveLoan => &["loanId", "lenderId"],
            Operation::DisburseLoan => &["loanId", "date"],
            Operation::RepayLoan => &["loanId", "amount"],
            Operation::AddCollateral => &["loanId", "description"],
            Operation::MarkAsDefaulted
            | Operation::CheckLoanStatus
            | Operation::QueryLoan
            | Operation::GetLoanHistory => &["loanId"],
        }
    }

    /// Read-only operations are evaluated by clients rather than submitted for commit.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            Operation::CheckLoanStatus | Operation::QueryLoan | Operation::GetLoanHistory
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = LendingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| LendingError::validation("function", format!("{s:?} is not a lending operation")))
    }
}

#[derive(Debug, Clone, Default)]
pub struct LendingContract {
    service: LoanService,
}

impl LendingContract {
    pub fn new(service: LoanService) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &LoanService {
        &self.service
    }

    /// Run `function` with `args` against `state`. Writes return an empty payload,
    /// `CheckLoanStatus` the status label, `QueryLoan` and `GetLoanHistory` JSON.
    pub fn invoke<S, R>(
        &self,
        state: &S,
        identity: &R,
        function: &str,
        args: &[String],
    ) -> Result<Vec<u8>, LendingError>
    where
        S: WorldState + ?Sized,
        R: IdentityResolver + ?Sized,
    {
        let op: Operation = function.parse()?;
        let params = op.params();
        if args.len() != params.len() {
            return Err(LendingError::validation(
                "args",
                format!(
                    "{op} takes {} arguments ({}), got {}",
                    params.len(),
                    params.join(", "),
                    args.len()
                ),
            ));
        }
        debug!(function = op.name(), "invoking");

        let service = &self.service;
        match op {
            Operation::RequestLoan => {
                let amount = parse_decimal("amount", &args[2])?;
                let rate = parse_decimal("interestRate", &args[3])?;
                let duration = parse_duration(&args[4])?;
                service.request_loan(state, &args[0], &args[1], amount, rate, duration)?;
                Ok(Vec::new())
            }
            Operation::ApproveLoan => {
                service.approve_loan(state, &args[0], &args[1])?;
                Ok(Vec::new())
            }
            Operation::DisburseLoan => {
                service.disburse_loan(state, &args[0], &args[1])?;
                Ok(Vec::new())
            }
            Operation::RepayLoan => {
                let amount = parse_decimal("amount", &args[1])?;
                service.repay_loan(state, &args[0], amount)?;
                Ok(Vec::new())
            }
            Operation::MarkAsDefaulted => {
                service.mark_as_defaulted(state, &args[0])?;
                Ok(Vec::new())
            }
            Operation::AddCollateral => {
                service.add_collateral(state, &args[0], &args[1])?;
                Ok(Vec::new())
            }
            Operation::CheckLoanStatus => {
                let status = service.check_loan_status(state, &args[0])?;
                Ok(status.as_str().as_bytes().to_vec())
            }
            Operation::QueryLoan => {
                let loan = service.query_loan(state, &args[0])?;
                to_json(&args[0], &loan)
            }
            Operation::GetLoanHistory => {
                let caller = identity.resolve_org_identity()?;
                let history = service.get_loan_history(state, &caller, &args[0])?;
                to_json(&args[0], &history)
            }
        }
    }
}

fn parse_decimal(field: &'static str, raw: &str) -> Result<Decimal, LendingError> {
    Decimal::from_str(raw.trim())
        .map_err(|e| LendingError::validation(field, format!("{raw:?} is not a number: {e}")))
}

fn parse_duration(raw: &str) -> Result<u32, LendingError> {
    raw.trim().parse::<u32>().map_err(|_| {
        LendingError::validation("durationDays", format!("{raw:?} is not a positive integer"))
    })
}

fn to_json<T: serde::Serialize>(key: &str, value: &T) -> Result<Vec<u8>, LendingError> {
    serde_json::to_vec(value).map_err(|source| LendingError::CorruptRecord {
        key: key.to_string(),
        source,
    })
}
