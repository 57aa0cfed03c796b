//! Loan record, status graph and the field-level validation applied before any write
use super::error::LendingError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoanStatus {
    Pending,
    Approved,
    Active,
    Repaid,
    Defaulted,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Pending => "Pending",
            LoanStatus::Approved => "Approved",
            LoanStatus::Active => "Active",
            LoanStatus::Repaid => "Repaid",
            LoanStatus::Defaulted => "Defaulted",
        }
    }

    /// Repaid and Defaulted end the mutable life of a loan.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanStatus::Repaid | LoanStatus::Defaulted)
    }

    /// Edges of the lifecycle graph: Pending -> Approved -> Active -> {Repaid | Defaulted}
    pub fn can_transition_to(&self, next: LoanStatus) -> bool {
        matches!(
            (self, next),
            (LoanStatus::Pending, LoanStatus::Approved)
                | (LoanStatus::Approved, LoanStatus::Active)
                | (LoanStatus::Active, LoanStatus::Repaid)
                | (LoanStatus::Active, LoanStatus::Defaulted)
        )
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoanStatus {
    type Err = LendingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(LoanStatus::Pending),
            "Approved" => Ok(LoanStatus::Approved),
            "Active" => Ok(LoanStatus::Active),
            "Repaid" => Ok(LoanStatus::Repaid),
            "Defaulted" => Ok(LoanStatus::Defaulted),
            other => Err(LendingError::validation(
                "status",
                format!("{other:?} is not a loan status"),
            )),
        }
    }
}

/// Which figure a repayment is subtracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepaymentAccounting {
    /// Subtract from the outstanding `repaymentDue`, so partial repayments accumulate.
    #[default]
    OutstandingBalance,
    /// Subtract from the original principal on every repayment.
    Principal,
}

impl FromStr for RepaymentAccounting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "balance" | "outstanding" => Ok(RepaymentAccounting::OutstandingBalance),
            "principal" => Ok(RepaymentAccounting::Principal),
            other => Err(format!(
                "invalid repayment accounting '{other}'. Expected: balance or principal"
            )),
        }
    }
}

/// Ordered status labels, one per applied transition. Only grows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditHistory(Vec<LoanStatus>);

impl AuditHistory {
    fn starting_at(status: LoanStatus) -> Self {
        Self(vec![status])
    }

    fn append(&mut self, status: LoanStatus) {
        self.0.push(status);
    }

    pub fn entries(&self) -> &[LoanStatus] {
        &self.0
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.0.iter().map(LoanStatus::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<LoanStatus> {
        self.0.last().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanRecord {
    loan_id: String,
    borrower_id: String,
    lender_id: String,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    amount: Decimal,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    interest_rate: Decimal,
    duration_days: u32,
    status: LoanStatus,
    disbursement_date: String,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    repayment_due: Decimal,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    remaining_balance: Decimal,
    collateral: String,
    defaulted: bool,
    audit_history: AuditHistory,
}

impl LoanRecord {
    /// Validate request terms and build a Pending record.
    pub fn request(
        loan_id: &str,
        borrower_id: &str,
        amount: Decimal,
        interest_rate: Decimal,
        duration_days: u32,
    ) -> Result<Self, LendingError> {
        require_non_empty("loanId", loan_id)?;
        require_non_empty("borrowerId", borrower_id)?;
        require_positive("amount", amount)?;
        require_positive("interestRate", interest_rate)?;
        if duration_days == 0 {
            return Err(LendingError::validation(
                "durationDays",
                "must be a positive integer",
            ));
        }

        Ok(Self {
            loan_id: loan_id.to_string(),
            borrower_id: borrower_id.to_string(),
            lender_id: String::new(),
            amount,
            interest_rate,
            duration_days,
            status: LoanStatus::Pending,
            disbursement_date: String::new(),
            repayment_due: Decimal::ZERO,
            remaining_balance: Decimal::ZERO,
            collateral: String::new(),
            defaulted: false,
            audit_history: AuditHistory::starting_at(LoanStatus::Pending),
        })
    }

    pub fn loan_id(&self) -> &str {
        &self.loan_id
    }
    pub fn borrower_id(&self) -> &str {
        &self.borrower_id
    }
    pub fn lender_id(&self) -> &str {
        &self.lender_id
    }
    pub fn amount(&self) -> Decimal {
        self.amount
    }
    pub fn interest_rate(&self) -> Decimal {
        self.interest_rate
    }
    pub fn duration_days(&self) -> u32 {
        self.duration_days
    }
    pub fn status(&self) -> LoanStatus {
        self.status
    }
    pub fn disbursement_date(&self) -> &str {
        &self.disbursement_date
    }
    pub fn repayment_due(&self) -> Decimal {
        self.repayment_due
    }
    pub fn remaining_balance(&self) -> Decimal {
        self.remaining_balance
    }
    pub fn collateral(&self) -> &str {
        &self.collateral
    }
    pub fn is_defaulted(&self) -> bool {
        self.defaulted
    }
    pub fn audit_history(&self) -> &AuditHistory {
        &self.audit_history
    }

    pub(crate) fn approve(&mut self, lender_id: &str) -> Result<(), LendingError> {
        require_non_empty("lenderId", lender_id)?;
        if lender_id == self.borrower_id {
            return Err(self.invalid_state("lender cannot be the borrower"));
        }
        match self.status {
            LoanStatus::Pending => {}
            LoanStatus::Approved => return Err(self.invalid_state("loan already approved")),
            _ => return Err(self.invalid_state("only pending loans can be approved")),
        }

        self.lender_id = lender_id.to_string();
        self.advance(LoanStatus::Approved)
    }

    pub(crate) fn disburse(&mut self, date: &str) -> Result<(), LendingError> {
        require_non_empty("disbursementDate", date)?;
        self.require_status(LoanStatus::Approved, "loan is not approved")?;

        self.repayment_due = self.amount;
        self.disbursement_date = date.to_string();
        self.advance(LoanStatus::Active)
    }

    /// Applies a repayment and returns the remaining amount owed.
    pub(crate) fn repay(
        &mut self,
        paid: Decimal,
        accounting: RepaymentAccounting,
    ) -> Result<Decimal, LendingError> {
        require_positive("amount", paid)?;
        self.require_status(LoanStatus::Active, "loan is not active")?;

        let base = match accounting {
            RepaymentAccounting::OutstandingBalance => self.repayment_due,
            RepaymentAccounting::Principal => self.amount,
        };
        let remaining = base - paid;
        self.repayment_due = remaining;
        self.remaining_balance = remaining;

        if remaining <= Decimal::ZERO {
            self.advance(LoanStatus::Repaid)?;
        }
        Ok(remaining)
    }

    pub(crate) fn mark_defaulted(&mut self) -> Result<(), LendingError> {
        self.require_status(LoanStatus::Active, "loan is not active")?;

        self.defaulted = true;
        self.advance(LoanStatus::Defaulted)
    }

    pub(crate) fn set_collateral(&mut self, description: &str) -> Result<(), LendingError> {
        require_non_empty("collateral", description)?;
        self.require_status(LoanStatus::Active, "loan is not active")?;

        self.collateral = description.to_string();
        Ok(())
    }

    // the only writer of `status` and `audit_history` after creation
    fn advance(&mut self, next: LoanStatus) -> Result<(), LendingError> {
        if !self.status.can_transition_to(next) {
            return Err(self.invalid_state("transition is not permitted"));
        }
        self.status = next;
        self.audit_history.append(next);
        Ok(())
    }

    fn require_status(&self, expected: LoanStatus, reason: &'static str) -> Result<(), LendingError> {
        if self.status != expected {
            return Err(self.invalid_state(reason));
        }
        Ok(())
    }

    fn invalid_state(&self, reason: &'static str) -> LendingError {
        LendingError::InvalidState {
            loan_id: self.loan_id.clone(),
            status: self.status,
            reason,
        }
    }
}

pub(crate) fn require_non_empty(field: &'static str, value: &str) -> Result<(), LendingError> {
    if value.trim().is_empty() {
        return Err(LendingError::validation(field, "cannot be empty"));
    }
    Ok(())
}

pub(crate) fn require_positive(field: &'static str, value: Decimal) -> Result<(), LendingError> {
    if value <= Decimal::ZERO {
        return Err(LendingError::validation(
            field,
            format!("must be greater than 0, got {value}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use rust_decimal_macros::dec;

    fn active_loan() -> LoanRecord {
        let mut loan =
            LoanRecord::request("loan0001", "borrower0001", dec!(1000), dec!(5), 365).unwrap();
        loan.approve("lender0001").unwrap();
        loan.disburse("31/03/2025").unwrap();
        loan
    }

    #[test]
    fn status_graph_only_moves_forward() {
        use LoanStatus::*;
        let all = [Pending, Approved, Active, Repaid, Defaulted];

        for from in all {
            for to in all {
                if from.can_transition_to(to) {
                    assert_ne!(to, Pending);
                    assert!(!from.is_terminal());
                }
            }
        }
        assert!(Active.can_transition_to(Repaid));
        assert!(!Pending.can_transition_to(Active));
    }

    #[test]
    fn record_serialises_with_ledger_field_names() {
        let loan = active_loan();
        let json: serde_json::Value = serde_json::to_value(&loan).unwrap();

        assert_eq!(json["loanId"], "loan0001");
        assert_eq!(json["durationDays"], 365);
        assert_eq!(json["repaymentDue"], 1000.0);
        assert_eq!(json["disbursementDate"], "31/03/2025");
        assert_eq!(
            json["auditHistory"],
            serde_json::json!(["Pending", "Approved", "Active"])
        );
    }

    #[test]
    fn record_reads_back_from_json() {
        let loan = active_loan();
        let bytes = serde_json::to_vec(&loan).unwrap();
        let decoded: LoanRecord = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(decoded, loan);
    }

    #[test]
    fn money_is_stored_without_rounding() {
        let amount = Decimal::from_str("0.12345678901234567890123").unwrap();
        let loan = LoanRecord::request("loan0001", "b", amount, Decimal::MAX, 1).unwrap();

        let json = serde_json::to_string(&loan).unwrap();
        assert!(json.contains(r#""amount":0.12345678901234567890123"#));
        assert!(json.contains(r#""interestRate":79228162514264337593543950335"#));

        let decoded: LoanRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.amount(), amount);
        assert_eq!(decoded.interest_rate(), Decimal::MAX);
    }

    #[test]
    fn failed_transition_leaves_history_alone() {
        let mut loan = LoanRecord::request("loan0001", "b", dec!(10), dec!(1), 1).unwrap();

        let err = loan.disburse("01/01/2025").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(loan.status(), LoanStatus::Pending);
        assert_eq!(loan.audit_history().labels(), vec!["Pending"]);
    }

    #[test]
    fn principal_accounting_ignores_earlier_repayments() {
        let mut loan = active_loan();

        loan.repay(dec!(300), RepaymentAccounting::Principal).unwrap();
        let remaining = loan.repay(dec!(300), RepaymentAccounting::Principal).unwrap();

        assert_eq!(remaining, dec!(700));
        assert_eq!(loan.status(), LoanStatus::Active);
    }

    #[test]
    fn balance_accounting_accumulates() {
        let mut loan = active_loan();

        loan.repay(dec!(600), RepaymentAccounting::OutstandingBalance)
            .unwrap();
        let remaining = loan
            .repay(dec!(400), RepaymentAccounting::OutstandingBalance)
            .unwrap();

        assert_eq!(remaining, dec!(0));
        assert_eq!(loan.status(), LoanStatus::Repaid);
        assert_eq!(loan.audit_history().len(), 4);
    }

    #[test]
    fn repayment_accounting_parses() {
        assert_eq!(
            "Principal".parse::<RepaymentAccounting>(),
            Ok(RepaymentAccounting::Principal)
        );
        assert_eq!(
            "balance".parse::<RepaymentAccounting>(),
            Ok(RepaymentAccounting::OutstandingBalance)
        );
        assert!("interest".parse::<RepaymentAccounting>().is_err());
    }
}
