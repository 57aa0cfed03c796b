//! Service layer API for loan lifecycle operations
use super::config::LendingConfig;
use super::error::LendingError;
use super::identity::CallerIdentity;
use super::loan::{
    AuditHistory, LoanRecord, LoanStatus, RepaymentAccounting, require_non_empty, require_positive,
};
use super::state::WorldState;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

/// Each operation is one read, validation in memory, and at most one write of the same key.
/// Nothing is written unless every precondition holds.
#[derive(Debug, Clone)]
pub struct LoanService {
    regulator_org: String,
    accounting: RepaymentAccounting,
}

impl LoanService {
    pub fn new(regulator_org: impl Into<String>, accounting: RepaymentAccounting) -> Self {
        Self {
            regulator_org: regulator_org.into(),
            accounting,
        }
    }

    pub fn from_config(config: &LendingConfig) -> Self {
        Self::new(config.regulator_org.clone(), config.repayment_accounting)
    }

    pub fn regulator_org(&self) -> &str {
        &self.regulator_org
    }

    /// Load a loan record from world state
    fn load<S: WorldState + ?Sized>(
        &self,
        state: &S,
        loan_id: &str,
    ) -> Result<LoanRecord, LendingError> {
        require_non_empty("loanId", loan_id)?;

        let bytes = state
            .get_state(loan_id)?
            .ok_or_else(|| LendingError::NotFound(loan_id.to_string()))?;

        serde_json::from_slice(&bytes).map_err(|source| LendingError::CorruptRecord {
            key: loan_id.to_string(),
            source,
        })
    }

    fn save<S: WorldState + ?Sized>(&self, state: &S, loan: &LoanRecord) -> Result<(), LendingError> {
        let bytes = serde_json::to_vec(loan).map_err(|source| LendingError::CorruptRecord {
            key: loan.loan_id().to_string(),
            source,
        })?;
        state.put_state(loan.loan_id(), &bytes)?;
        Ok(())
    }

    /// Create a new Pending loan request
    pub fn request_loan<S: WorldState + ?Sized>(
        &self,
        state: &S,
        loan_id: &str,
        borrower_id: &str,
        amount: Decimal,
        interest_rate: Decimal,
        duration_days: u32,
    ) -> Result<LoanRecord, LendingError> {
        let loan = LoanRecord::request(loan_id, borrower_id, amount, interest_rate, duration_days)?;

        if state.get_state(loan_id)?.is_some() {
            return Err(LendingError::AlreadyExists(loan_id.to_string()));
        }

        self.save(state, &loan)?;
        info!(loan_id, borrower_id, %amount, "loan requested");

        Ok(loan)
    }

    /// Approve a Pending loan on behalf of a lender
    pub fn approve_loan<S: WorldState + ?Sized>(
        &self,
        state: &S,
        loan_id: &str,
        lender_id: &str,
    ) -> Result<LoanRecord, LendingError> {
        require_non_empty("loanId", loan_id)?;
        require_non_empty("lenderId", lender_id)?;
        let mut loan = self.load(state, loan_id)?;

        loan.approve(lender_id)?;

        self.save(state, &loan)?;
        info!(loan_id, lender_id, status = %loan.status(), "loan approved");

        Ok(loan)
    }

    /// Move an approved loan to Active, recording when the funds left
    pub fn disburse_loan<S: WorldState + ?Sized>(
        &self,
        state: &S,
        loan_id: &str,
        date: &str,
    ) -> Result<LoanRecord, LendingError> {
        require_non_empty("loanId", loan_id)?;
        require_non_empty("disbursementDate", date)?;
        let mut loan = self.load(state, loan_id)?;

        loan.disburse(date)?;

        self.save(state, &loan)?;
        info!(loan_id, date, status = %loan.status(), "loan disbursed");

        Ok(loan)
    }

    /// Record a repayment; the loan becomes Repaid once nothing remains owed
    pub fn repay_loan<S: WorldState + ?Sized>(
        &self,
        state: &S,
        loan_id: &str,
        amount: Decimal,
    ) -> Result<LoanRecord, LendingError> {
        require_non_empty("loanId", loan_id)?;
        require_positive("amount", amount)?;
        let mut loan = self.load(state, loan_id)?;

        let remaining = loan.repay(amount, self.accounting)?;

        self.save(state, &loan)?;
        info!(loan_id, %amount, %remaining, status = %loan.status(), "repayment recorded");

        Ok(loan)
    }

    pub fn mark_as_defaulted<S: WorldState + ?Sized>(
        &self,
        state: &S,
        loan_id: &str,
    ) -> Result<LoanRecord, LendingError> {
        let mut loan = self.load(state, loan_id)?;

        loan.mark_defaulted()?;

        self.save(state, &loan)?;
        info!(loan_id, status = %loan.status(), "loan marked as defaulted");

        Ok(loan)
    }

    /// Replace the collateral description of an Active loan
    pub fn add_collateral<S: WorldState + ?Sized>(
        &self,
        state: &S,
        loan_id: &str,
        description: &str,
    ) -> Result<LoanRecord, LendingError> {
        require_non_empty("loanId", loan_id)?;
        require_non_empty("collateral", description)?;
        let mut loan = self.load(state, loan_id)?;

        loan.set_collateral(description)?;

        self.save(state, &loan)?;
        info!(loan_id, "collateral updated");

        Ok(loan)
    }

    pub fn check_loan_status<S: WorldState + ?Sized>(
        &self,
        state: &S,
        loan_id: &str,
    ) -> Result<LoanStatus, LendingError> {
        let loan = self.load(state, loan_id)?;
        debug!(loan_id, status = %loan.status(), "status checked");
        Ok(loan.status())
    }

    pub fn query_loan<S: WorldState + ?Sized>(
        &self,
        state: &S,
        loan_id: &str,
    ) -> Result<LoanRecord, LendingError> {
        let loan = self.load(state, loan_id)?;
        debug!(loan_id, "loan queried");
        Ok(loan)
    }

    /// Audit trail of a loan. Restricted to the regulator; the role is checked
    /// before the key is looked at, so other callers learn nothing about existence.
    pub fn get_loan_history<S: WorldState + ?Sized>(
        &self,
        state: &S,
        caller: &CallerIdentity,
        loan_id: &str,
    ) -> Result<AuditHistory, LendingError> {
        if !caller.belongs_to(&self.regulator_org) {
            warn!(caller = caller.org_id(), loan_id, "loan history denied");
            return Err(LendingError::Authorization {
                caller: caller.org_id().to_string(),
                action: "read loan history",
            });
        }

        let loan = self.load(state, loan_id)?;
        debug!(loan_id, entries = loan.audit_history().len(), "loan history read");
        Ok(loan.audit_history().clone())
    }
}

impl Default for LoanService {
    fn default() -> Self {
        Self::from_config(&LendingConfig::default())
    }
}
